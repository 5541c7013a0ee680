#![warn(missing_docs)]
//! # ruter-core
//!
//! ## Purpose
//! Defines the typed transit records returned by the Ruter Reis API.
//!
//! ## Responsibilities
//! - Represent stops, lines, departures, journeys, heartbeats, validities,
//!   places and streets with the upstream PascalCase wire names.
//! - Keep unknown upstream fields in a flattened `extra` map so records can be
//!   compared and re-serialized without losing data.
//! - Parse departure timestamps into [`time::OffsetDateTime`].
//!
//! ## Data flow
//! `ruter-schema` checks the runtime kinds of a raw JSON response, then
//! deserializes it into the records defined here. `ruter-client` hands the
//! records to callers; `ruter-contract-tests` uses them where a scenario needs
//! typed values.
//!
//! ## Ownership and lifetimes
//! Records own all of their strings and nested values. They are built fresh
//! for every response and never borrowed from network buffers.
//!
//! ## Error model
//! Timestamp failures return [`CoreError`].
//!
//! ## Example
//! ```rust
//! use ruter_core::{Place, PLACE_TYPE_STOP};
//!
//! let place: Place = serde_json::from_str(
//!     r#"{"PlaceType":"Area","ID":1,"Name":"Majorstuen","Stops":[]}"#,
//! )
//! .unwrap();
//! assert_ne!(place.place_type(), PLACE_TYPE_STOP);
//! assert!(place.stops().is_empty());
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// `PlaceType` value marking a place that is itself a stop.
pub const PLACE_TYPE_STOP: &str = "Stop";

/// Upstream object fields not modelled by a typed record.
pub type ExtraFields = Map<String, Value>;

/// One stop (platform group) in the Ruter network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stop {
    /// Numeric stop identifier.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Full stop name.
    pub name: String,
    /// Abbreviated stop name.
    pub short_name: String,
    /// UTM easting.
    #[serde(rename = "X")]
    pub x: i64,
    /// UTM northing.
    #[serde(rename = "Y")]
    pub y: i64,
    /// Fare zone name.
    pub zone: String,
    /// Whether the stop is a transfer hub.
    pub is_hub: bool,
    /// District name.
    pub district: String,
    /// District identifier, `null` upstream for some stops.
    #[serde(rename = "DistrictID")]
    pub district_id: Option<String>,
    /// Lines serving the stop. Only present on place-search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<Line>>,
    /// Remaining upstream fields (for example `PlaceType`).
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Stop {
    /// Returns `true` when the record lists at least one serving line.
    pub fn has_lines(&self) -> bool {
        self.lines.as_ref().is_some_and(|lines| !lines.is_empty())
    }
}

/// One public transport line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Line {
    /// Numeric line identifier.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Public line name, for example `"5"` or `"Ringen"`.
    pub name: String,
    /// Transportation mode code.
    pub transportation: i64,
    /// Line colour as a hex string without `#`.
    pub line_colour: String,
    /// Remaining upstream fields (extended line listings carry more).
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Validity window of the published timetable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Validities {
    /// Start of the validity window; `None` when upstream sends `null`.
    pub valid_from: Option<String>,
    /// End of the validity window; `None` when upstream sends `null`.
    pub valid_to: Option<String>,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Service health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Heartbeat {
    /// Trip planner (OTP) version.
    pub otp_version: String,
    /// Trip planner availability.
    pub otp: bool,
    /// Start of the loaded transit service window.
    pub transit_service_starts: String,
    /// End of the loaded transit service window.
    pub transit_service_ends: String,
    /// Overall API version.
    pub reis_version: String,
    /// Trip planner response time in milliseconds.
    pub otp_response_time: i64,
    /// SQL backend availability.
    pub sql: bool,
    /// SQL backend response time in milliseconds.
    pub sql_response_time: i64,
    /// Els backend availability.
    pub els: bool,
    /// Els backend version.
    pub els_version: String,
    /// Els backend response time in milliseconds.
    ///
    /// The upstream spells this field `ElseResponsetime`; the wire name is
    /// kept as published.
    #[serde(rename = "ElseResponsetime")]
    pub els_response_time: i64,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// One departure (SIRI `MonitoredStopVisit`) from a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Departure {
    /// Time the visit was recorded.
    pub recorded_at_time: String,
    /// Monitored stop reference.
    pub monitoring_ref: String,
    /// Vehicle journey serving the visit.
    pub monitored_vehicle_journey: Journey,
    /// Opaque provider extensions.
    pub extensions: ExtraFields,
    /// Free-form visit notes.
    pub stop_visit_note: Vec<Value>,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Departure {
    /// Returns the best known departure time text: expected, else aimed.
    pub fn departure_time_text(&self) -> Option<&str> {
        let call = &self.monitored_vehicle_journey.monitored_call;
        call.expected_departure_time
            .as_deref()
            .or(call.aimed_departure_time.as_deref())
    }

    /// Parses [`Departure::departure_time_text`].
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTimestamp`] when the text is not RFC 3339.
    pub fn departure_time(&self) -> Result<Option<OffsetDateTime>, CoreError> {
        self.departure_time_text().map(parse_timestamp).transpose()
    }

    /// Returns `true` when this departure belongs to `line`.
    ///
    /// Matches either the published line name or the line reference.
    pub fn serves_line(&self, line: &str) -> bool {
        let journey = &self.monitored_vehicle_journey;
        journey.published_line_name == line || journey.line_ref == line
    }

    /// Returns `true` when this departure runs in `direction`.
    pub fn runs_in_direction(&self, direction: &str) -> bool {
        self.monitored_vehicle_journey.direction_ref.as_deref() == Some(direction)
    }
}

/// Vehicle journey embedded in a departure as `MonitoredVehicleJourney`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Journey {
    /// Line reference.
    pub line_ref: String,
    /// Direction reference.
    pub direction_ref: Option<String>,
    /// Dated vehicle journey reference object.
    pub framed_vehicle_journey_ref: Option<ExtraFields>,
    /// Line name shown to passengers.
    pub published_line_name: String,
    /// Direction name.
    pub direction_name: Option<String>,
    /// Operator reference.
    pub operator_ref: Option<String>,
    /// Origin stop name.
    pub origin_name: String,
    /// Origin stop reference.
    pub origin_ref: String,
    /// Destination stop reference.
    pub destination_ref: String,
    /// Destination stop name.
    pub destination_name: String,
    /// Planned departure time from the origin.
    pub origin_aimed_departure_time: String,
    /// Planned arrival time at the destination.
    pub destination_aimed_arrival_time: String,
    /// Whether the vehicle is tracked in real time.
    pub monitored: bool,
    /// Whether the vehicle is delayed by congestion.
    pub in_congestion: bool,
    /// Delay as an ISO 8601 duration, for example `PT2M`.
    pub delay: Option<String>,
    /// Train block part object.
    pub train_block_part: Option<ExtraFields>,
    /// Block reference.
    pub block_ref: Option<String>,
    /// Vehicle reference.
    pub vehicle_ref: Option<String>,
    /// Vehicle mode code.
    pub vehicle_mode: i64,
    /// Vehicle journey name.
    pub vehicle_journey_name: String,
    /// Call at the monitored stop.
    pub monitored_call: MonitoredCall,
    /// Vehicle feature reference.
    pub vehicle_feature_ref: Option<String>,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Call of a journey at the monitored stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredCall {
    /// Planned arrival time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aimed_arrival_time: Option<String>,
    /// Predicted arrival time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<String>,
    /// Planned departure time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aimed_departure_time: Option<String>,
    /// Predicted departure time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_departure_time: Option<String>,
    /// Destination text on the vehicle sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_display: Option<String>,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Place-search result.
///
/// A place is either a stop (`PlaceType == "Stop"`) or a composite place
/// (area, point of interest, street) that contains nested stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Place {
    /// The place is a stop.
    Stop(Stop),
    /// The place groups several stops.
    Area(Area),
}

/// Composite place holding nested stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Area {
    /// Upstream place type, for example `Area` or `POI`.
    pub place_type: String,
    /// Place identifier, when the upstream provides one.
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Place name, when the upstream provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stops belonging to the place.
    pub stops: Vec<Stop>,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Place {
    /// Returns the upstream `PlaceType`.
    pub fn place_type(&self) -> &str {
        match self {
            Self::Stop(stop) => stop
                .extra
                .get("PlaceType")
                .and_then(Value::as_str)
                .unwrap_or(PLACE_TYPE_STOP),
            Self::Area(area) => &area.place_type,
        }
    }

    /// Returns the stop when this place is one.
    pub fn as_stop(&self) -> Option<&Stop> {
        match self {
            Self::Stop(stop) => Some(stop),
            Self::Area(_) => None,
        }
    }

    /// Returns the stops nested in a composite place; empty for stop places.
    pub fn stops(&self) -> &[Stop] {
        match self {
            Self::Stop(_) => &[],
            Self::Area(area) => &area.stops,
        }
    }
}

impl<'de> Deserialize<'de> for Place {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let place_type = value
            .get("PlaceType")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::missing_field("PlaceType"))?;

        if place_type == PLACE_TYPE_STOP {
            serde_json::from_value(value)
                .map(Self::Stop)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Self::Area)
                .map_err(D::Error::custom)
        }
    }
}

/// Street with its house numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Street {
    /// Street identifier.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Street name.
    pub name: String,
    /// Addresses along the street.
    #[serde(default)]
    pub houses: Vec<House>,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// One address on a street.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct House {
    /// House number, possibly with a letter.
    pub name: String,
    /// UTM easting.
    #[serde(rename = "X")]
    pub x: i64,
    /// UTM northing.
    #[serde(rename = "Y")]
    pub y: i64,
    /// Remaining upstream fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Parses an offset-bearing upstream timestamp.
///
/// # Errors
/// Returns [`CoreError::InvalidTimestamp`] when `raw` is not RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, CoreError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|error| CoreError::InvalidTimestamp {
        value: raw.to_string(),
        reason: error.to_string(),
    })
}

/// Error type for record conversions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Timestamp text could not be parsed.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// Raw timestamp text.
        value: String,
        /// Parser message.
        reason: String,
    },
}
