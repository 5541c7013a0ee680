#![warn(missing_docs)]
//! # ruter-schema
//!
//! ## Purpose
//! Defines the response shape contract of the Ruter Reis API and checks raw
//! JSON responses against it before they become typed records.
//!
//! ## Responsibilities
//! - Classify runtime JSON values into [`ValueKind`]s.
//! - Declare per-record field tables ([`RecordSchema`]) listing the acceptable
//!   kinds of every required field, `null` included where the upstream allows it.
//! - Validate records ([`validate`]) and decode them into `ruter-core` types
//!   only after validation passes.
//!
//! ## Data flow
//! Raw JSON body -> [`validate`] against a named schema -> `serde` decode into
//! [`ruter_core`] records -> client caller.
//!
//! ## Ownership and lifetimes
//! Schemas are `'static` tables. Decoders take the response [`Value`] by value
//! so no borrowed network data outlives the call.
//!
//! ## Error model
//! The first violation found is returned as a [`SchemaError`]. Fields present
//! in a record but absent from its schema are ignored: a schema is a lower
//! bound on the shape, not an exact shape.
//!
//! ## Example
//! ```rust
//! use ruter_schema::{LINE_SCHEMA, validate};
//!
//! let line = serde_json::json!({
//!     "ID": 5, "Name": "5", "Transportation": 8, "LineColour": "EC700C"
//! });
//! assert!(validate(&line, &LINE_SCHEMA).is_ok());
//! ```

use std::fmt;

use ruter_core::{Departure, PLACE_TYPE_STOP, Place};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Runtime kind of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// JSON string.
    Text,
    /// JSON number without a fractional part.
    Integer,
    /// JSON number with a fractional part.
    Float,
    /// JSON `true` / `false`.
    Boolean,
    /// JSON object.
    Mapping,
    /// JSON array.
    Sequence,
    /// JSON `null`.
    Null,
}

impl ValueKind {
    /// Classifies a runtime value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(number) if number.is_i64() || number.is_u64() => Self::Integer,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::Text,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }

    /// Short lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Mapping => "mapping",
            Self::Sequence => "sequence",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One required field and the kinds its value may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Upstream field name.
    pub name: &'static str,
    /// Acceptable kinds; never empty.
    pub kinds: &'static [ValueKind],
}

impl FieldSpec {
    /// Declares a required field.
    pub const fn new(name: &'static str, kinds: &'static [ValueKind]) -> Self {
        Self { name, kinds }
    }

    /// Returns `true` when `kind` is acceptable for this field.
    pub fn accepts(&self, kind: ValueKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns `true` when the field may be `null`.
    pub fn is_nullable(&self) -> bool {
        self.accepts(ValueKind::Null)
    }

    fn expected(&self) -> String {
        self.kinds
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Named table of required fields for one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    /// Record type name used in errors.
    pub name: &'static str,
    /// Required fields in check order.
    pub fields: &'static [FieldSpec],
}

impl RecordSchema {
    /// Looks up the spec of one field.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

const TEXT: &[ValueKind] = &[ValueKind::Text];
const TEXT_OR_NULL: &[ValueKind] = &[ValueKind::Text, ValueKind::Null];
const INTEGER: &[ValueKind] = &[ValueKind::Integer];
const BOOLEAN: &[ValueKind] = &[ValueKind::Boolean];
const MAPPING: &[ValueKind] = &[ValueKind::Mapping];
const MAPPING_OR_NULL: &[ValueKind] = &[ValueKind::Mapping, ValueKind::Null];
const SEQUENCE: &[ValueKind] = &[ValueKind::Sequence];

/// Health snapshot returned by `Heartbeat/Index`.
///
/// `ElseResponsetime` is the upstream's literal field name.
pub static HEARTBEAT_SCHEMA: RecordSchema = RecordSchema {
    name: "Heartbeat",
    fields: &[
        FieldSpec::new("OtpVersion", TEXT),
        FieldSpec::new("Otp", BOOLEAN),
        FieldSpec::new("TransitServiceStarts", TEXT),
        FieldSpec::new("TransitServiceEnds", TEXT),
        FieldSpec::new("ReisVersion", TEXT),
        FieldSpec::new("OtpResponseTime", INTEGER),
        FieldSpec::new("Sql", BOOLEAN),
        FieldSpec::new("SqlResponseTime", INTEGER),
        FieldSpec::new("Els", BOOLEAN),
        FieldSpec::new("ElsVersion", TEXT),
        FieldSpec::new("ElseResponsetime", INTEGER),
    ],
};

/// Stop record.
pub static STOP_SCHEMA: RecordSchema = RecordSchema {
    name: "Stop",
    fields: &[
        FieldSpec::new("X", INTEGER),
        FieldSpec::new("Y", INTEGER),
        FieldSpec::new("Zone", TEXT),
        FieldSpec::new("ShortName", TEXT),
        FieldSpec::new("IsHub", BOOLEAN),
        FieldSpec::new("ID", INTEGER),
        FieldSpec::new("Name", TEXT),
        FieldSpec::new("District", TEXT),
        FieldSpec::new("DistrictID", TEXT_OR_NULL),
    ],
};

/// Line record.
pub static LINE_SCHEMA: RecordSchema = RecordSchema {
    name: "Line",
    fields: &[
        FieldSpec::new("ID", INTEGER),
        FieldSpec::new("Name", TEXT),
        FieldSpec::new("Transportation", INTEGER),
        FieldSpec::new("LineColour", TEXT),
    ],
};

/// Departure (monitored stop visit) record.
pub static DEPARTURE_SCHEMA: RecordSchema = RecordSchema {
    name: "Departure",
    fields: &[
        FieldSpec::new("RecordedAtTime", TEXT),
        FieldSpec::new("MonitoringRef", TEXT),
        FieldSpec::new("MonitoredVehicleJourney", MAPPING),
        FieldSpec::new("Extensions", MAPPING),
        FieldSpec::new("StopVisitNote", SEQUENCE),
    ],
};

/// Journey record, embedded in departures as `MonitoredVehicleJourney`.
pub static JOURNEY_SCHEMA: RecordSchema = RecordSchema {
    name: "Journey",
    fields: &[
        FieldSpec::new("LineRef", TEXT),
        FieldSpec::new("DirectionRef", TEXT_OR_NULL),
        FieldSpec::new("FramedVehicleJourneyRef", MAPPING_OR_NULL),
        FieldSpec::new("PublishedLineName", TEXT),
        FieldSpec::new("DirectionName", TEXT_OR_NULL),
        FieldSpec::new("OperatorRef", TEXT_OR_NULL),
        FieldSpec::new("OriginName", TEXT),
        FieldSpec::new("OriginRef", TEXT),
        FieldSpec::new("DestinationRef", TEXT),
        FieldSpec::new("DestinationName", TEXT),
        FieldSpec::new("OriginAimedDepartureTime", TEXT),
        FieldSpec::new("DestinationAimedArrivalTime", TEXT),
        FieldSpec::new("Monitored", BOOLEAN),
        FieldSpec::new("InCongestion", BOOLEAN),
        FieldSpec::new("Delay", TEXT_OR_NULL),
        FieldSpec::new("TrainBlockPart", MAPPING_OR_NULL),
        FieldSpec::new("BlockRef", TEXT_OR_NULL),
        FieldSpec::new("VehicleRef", TEXT_OR_NULL),
        FieldSpec::new("VehicleMode", INTEGER),
        FieldSpec::new("VehicleJourneyName", TEXT),
        FieldSpec::new("MonitoredCall", MAPPING),
        FieldSpec::new("VehicleFeatureRef", TEXT_OR_NULL),
    ],
};

/// Timetable validity window. Either bound may be `null`.
pub static VALIDITIES_SCHEMA: RecordSchema = RecordSchema {
    name: "Validities",
    fields: &[
        FieldSpec::new("ValidFrom", TEXT_OR_NULL),
        FieldSpec::new("ValidTo", TEXT_OR_NULL),
    ],
};

/// Street with house numbers.
pub static STREET_SCHEMA: RecordSchema = RecordSchema {
    name: "Street",
    fields: &[
        FieldSpec::new("ID", INTEGER),
        FieldSpec::new("Name", TEXT),
        FieldSpec::new("Houses", SEQUENCE),
    ],
};

/// Checks that `record` carries every field of `schema` with an acceptable kind.
///
/// # Errors
/// Returns [`SchemaError::NotAMapping`] when `record` is not a JSON object,
/// [`SchemaError::MissingField`] for the first absent field and
/// [`SchemaError::WrongKind`] for the first field with an unacceptable kind.
pub fn validate(record: &Value, schema: &RecordSchema) -> Result<(), SchemaError> {
    let Value::Object(map) = record else {
        return Err(SchemaError::NotAMapping {
            record: schema.name,
            actual: ValueKind::of(record),
        });
    };

    for field in schema.fields {
        let value = map.get(field.name).ok_or(SchemaError::MissingField {
            record: schema.name,
            field: field.name,
        })?;

        let actual = ValueKind::of(value);
        if !field.accepts(actual) {
            return Err(SchemaError::WrongKind {
                record: schema.name,
                field: field.name,
                expected: field.expected(),
                actual,
            });
        }
    }

    Ok(())
}

/// Validates `record` against [`STOP_SCHEMA`].
///
/// # Errors
/// See [`validate`].
pub fn ensure_is_stop(record: &Value) -> Result<(), SchemaError> {
    validate(record, &STOP_SCHEMA)
}

/// Validates `record` against [`LINE_SCHEMA`].
///
/// # Errors
/// See [`validate`].
pub fn ensure_is_line(record: &Value) -> Result<(), SchemaError> {
    validate(record, &LINE_SCHEMA)
}

/// Validates `record` against [`DEPARTURE_SCHEMA`].
///
/// # Errors
/// See [`validate`].
pub fn ensure_is_departure(record: &Value) -> Result<(), SchemaError> {
    validate(record, &DEPARTURE_SCHEMA)
}

/// Validates `record` against [`JOURNEY_SCHEMA`].
///
/// # Errors
/// See [`validate`].
pub fn ensure_is_journey(record: &Value) -> Result<(), SchemaError> {
    validate(record, &JOURNEY_SCHEMA)
}

/// Validates `record` against [`HEARTBEAT_SCHEMA`].
///
/// # Errors
/// See [`validate`].
pub fn ensure_is_heartbeat(record: &Value) -> Result<(), SchemaError> {
    validate(record, &HEARTBEAT_SCHEMA)
}

/// Validates one record and decodes it into `T`.
///
/// # Errors
/// Returns the validation error, or [`SchemaError::Decode`] when the typed
/// model rejects a record that passed the kind check.
pub fn decode_record<T: DeserializeOwned>(
    value: Value,
    schema: &RecordSchema,
) -> Result<T, SchemaError> {
    validate(&value, schema)?;
    serde_json::from_value(value).map_err(|source| SchemaError::Decode {
        record: schema.name,
        source,
    })
}

/// Validates every element of a JSON array and decodes it into `Vec<T>`.
///
/// # Errors
/// Returns [`SchemaError::NotASequence`] when `value` is not an array and
/// [`SchemaError::AtIndex`] wrapping the first element violation.
pub fn decode_records<T: DeserializeOwned>(
    value: Value,
    schema: &RecordSchema,
) -> Result<Vec<T>, SchemaError> {
    into_elements(value, schema.name)?
        .into_iter()
        .enumerate()
        .map(|(index, element)| {
            decode_record(element, schema).map_err(|error| error.at_index(index))
        })
        .collect()
}

/// Validates one place-search result and decodes it into a [`Place`].
///
/// Stop places must match [`STOP_SCHEMA`]. Every other place type must carry
/// a `Stops` sequence whose elements match [`STOP_SCHEMA`].
///
/// # Errors
/// Returns [`SchemaError`] describing the first violation.
pub fn decode_place(value: Value) -> Result<Place, SchemaError> {
    const RECORD: &str = "Place";

    let Value::Object(map) = &value else {
        return Err(SchemaError::NotAMapping {
            record: RECORD,
            actual: ValueKind::of(&value),
        });
    };
    let place_type = map.get("PlaceType").ok_or(SchemaError::MissingField {
        record: RECORD,
        field: "PlaceType",
    })?;
    let Value::String(place_type) = place_type else {
        return Err(SchemaError::WrongKind {
            record: RECORD,
            field: "PlaceType",
            expected: ValueKind::Text.name().to_string(),
            actual: ValueKind::of(place_type),
        });
    };

    if place_type == PLACE_TYPE_STOP {
        validate(&value, &STOP_SCHEMA)?;
    } else {
        let stops = map.get("Stops").ok_or(SchemaError::MissingField {
            record: RECORD,
            field: "Stops",
        })?;
        let Value::Array(stops) = stops else {
            return Err(SchemaError::WrongKind {
                record: RECORD,
                field: "Stops",
                expected: ValueKind::Sequence.name().to_string(),
                actual: ValueKind::of(stops),
            });
        };
        for (index, stop) in stops.iter().enumerate() {
            ensure_is_stop(stop).map_err(|error| error.at_index(index))?;
        }
    }

    serde_json::from_value(value).map_err(|source| SchemaError::Decode {
        record: RECORD,
        source,
    })
}

/// Decodes a JSON array of place-search results.
///
/// # Errors
/// See [`decode_place`].
pub fn decode_places(value: Value) -> Result<Vec<Place>, SchemaError> {
    into_elements(value, "Place")?
        .into_iter()
        .enumerate()
        .map(|(index, element)| decode_place(element).map_err(|error| error.at_index(index)))
        .collect()
}

/// Validates a departure and its embedded journey, then decodes it.
///
/// # Errors
/// Returns [`SchemaError`] for departure or journey violations.
pub fn decode_departure(value: Value) -> Result<Departure, SchemaError> {
    ensure_is_departure(&value)?;
    if let Some(journey) = value.get("MonitoredVehicleJourney") {
        ensure_is_journey(journey)?;
    }
    serde_json::from_value(value).map_err(|source| SchemaError::Decode {
        record: DEPARTURE_SCHEMA.name,
        source,
    })
}

/// Decodes a JSON array of departures.
///
/// # Errors
/// See [`decode_departure`].
pub fn decode_departures(value: Value) -> Result<Vec<Departure>, SchemaError> {
    into_elements(value, DEPARTURE_SCHEMA.name)?
        .into_iter()
        .enumerate()
        .map(|(index, element)| decode_departure(element).map_err(|error| error.at_index(index)))
        .collect()
}

fn into_elements(value: Value, record: &'static str) -> Result<Vec<Value>, SchemaError> {
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(SchemaError::NotASequence {
            record,
            actual: ValueKind::of(&other),
        }),
    }
}

/// Response shape violations.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Record is not a JSON object.
    #[error("{record}: expected a mapping, got {actual}")]
    NotAMapping {
        /// Record type name.
        record: &'static str,
        /// Kind actually received.
        actual: ValueKind,
    },
    /// List response is not a JSON array.
    #[error("{record} list: expected a sequence, got {actual}")]
    NotASequence {
        /// Element record type name.
        record: &'static str,
        /// Kind actually received.
        actual: ValueKind,
    },
    /// Required field is absent.
    #[error("{record}: missing field '{field}'")]
    MissingField {
        /// Record type name.
        record: &'static str,
        /// Missing field name.
        field: &'static str,
    },
    /// Field value has an unacceptable kind.
    #[error("{record}: wrong kind for '{field}': expected {expected}, got {actual}")]
    WrongKind {
        /// Record type name.
        record: &'static str,
        /// Offending field name.
        field: &'static str,
        /// Acceptable kinds, `|`-separated.
        expected: String,
        /// Kind actually received.
        actual: ValueKind,
    },
    /// Violation inside one element of a list response.
    #[error("element {index}: {source}")]
    AtIndex {
        /// Zero-based element position.
        index: usize,
        /// Violation found in that element.
        #[source]
        source: Box<SchemaError>,
    },
    /// Typed decode failed after the kind check passed.
    #[error("{record}: decode failure: {source}")]
    Decode {
        /// Record type name.
        record: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl SchemaError {
    fn at_index(self, index: usize) -> Self {
        Self::AtIndex {
            index,
            source: Box::new(self),
        }
    }

    /// Returns the innermost violation, unwrapping list positions.
    pub fn root(&self) -> &SchemaError {
        match self {
            Self::AtIndex { source, .. } => source.root(),
            other => other,
        }
    }
}
