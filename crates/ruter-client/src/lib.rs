#![warn(missing_docs)]
//! # ruter-client
//!
//! ## Purpose
//! Blocking client for the Ruter Reis API (stops, lines, departures,
//! heartbeat).
//!
//! ## Responsibilities
//! - Resolve and validate the API base URL from [`ClientConfig`].
//! - Build endpoint URLs with percent-encoded path segments.
//! - Fetch JSON through an injectable [`RuterTransport`], either as received
//!   ([`Ruter::get_json`]) or checked and typed.
//! - Check every response against `ruter-schema` before returning typed
//!   records.
//! - Select the next departure from a stop, optionally per line/direction.
//!
//! ## Data flow
//! Caller -> [`Ruter`] operation -> endpoint [`Url`] -> [`RuterTransport`]
//! (HTTP by default) -> raw JSON -> schema check -> `ruter-core` record.
//!
//! ## Ownership and lifetimes
//! The client owns its configuration and shares the transport through an
//! `Arc`, so one client can serve several threads. Returned records are owned.
//!
//! ## Error model
//! Configuration, transport, HTTP status, JSON and contract failures are all
//! reported as [`ClientError`]. Nothing is retried.
//!
//! ## Example
//! ```rust
//! use ruter_client::{ClientConfig, validate_base_url};
//!
//! let config = ClientConfig::default();
//! let url = validate_base_url(&config.base_url, config.allow_http).unwrap();
//! assert_eq!(url.scheme(), "https");
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration as StdDuration;

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use ruter_core::{CoreError, Departure, Heartbeat, Line, Place, Stop, Street, Validities};
use ruter_schema::{
    HEARTBEAT_SCHEMA, LINE_SCHEMA, STOP_SCHEMA, STREET_SCHEMA, SchemaError, VALIDITIES_SCHEMA,
    decode_departures, decode_places, decode_record, decode_records,
};
use serde_json::Value;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use url::Url;

/// Build-time crate version loaded from root `VERSION`.
pub const CLIENT_VERSION: &str = env!("RUTER_CLIENT_VERSION");

/// Public Reis API root.
pub const DEFAULT_BASE_URL: &str = "https://reisapi.ruter.no/";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Env var overriding [`ClientConfig::base_url`].
pub const ENV_BASE_URL: &str = "RUTER_API_BASE_URL";
/// Env var overriding [`ClientConfig::timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "RUTER_API_TIMEOUT_MS";
/// Env var overriding [`ClientConfig::allow_http`].
pub const ENV_ALLOW_HTTP: &str = "RUTER_API_ALLOW_HTTP";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root URL; endpoint paths are appended to it.
    pub base_url: String,
    /// Timeout for one whole request, in milliseconds.
    pub timeout_ms: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Accept cleartext `http://` base URLs.
    pub allow_http: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("ruter-rs/{CLIENT_VERSION}"),
            allow_http: false,
        }
    }
}

impl ClientConfig {
    /// Builds configuration from defaults overridden by process env vars.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidConfig`] for unparsable overrides.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from defaults overridden by `lookup`.
    ///
    /// Semantics:
    /// - [`ENV_BASE_URL`] replaces the base URL when non-blank.
    /// - [`ENV_TIMEOUT_MS`] must be a positive integer.
    /// - [`ENV_ALLOW_HTTP`] is enabled by `1`, `true`, `on` or `yes`
    ///   (case-insensitive); anything else disables it.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidConfig`] for unparsable overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL)
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = match raw.trim().parse::<u64>() {
                Ok(0) | Err(_) => {
                    return Err(ClientError::InvalidConfig(format!(
                        "{ENV_TIMEOUT_MS} must be a positive integer, got '{raw}'"
                    )));
                }
                Ok(timeout_ms) => timeout_ms,
            };
        }

        if let Some(raw) = lookup(ENV_ALLOW_HTTP) {
            let normalized = raw.trim().to_ascii_lowercase();
            config.allow_http = matches!(normalized.as_str(), "1" | "true" | "on" | "yes");
        }

        Ok(config)
    }
}

/// Validates the API base URL and normalizes it to end with `/`.
///
/// # Errors
/// Returns [`ClientError::InvalidEndpoint`] when the URL does not parse, is not
/// http(s), uses cleartext HTTP without `allow_http`, or embeds credentials.
pub fn validate_base_url(raw: &str, allow_http: bool) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw)
        .map_err(|error| ClientError::InvalidEndpoint(format!("invalid base url: {error}")))?;

    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(ClientError::InvalidEndpoint(
                "base url must use https".to_string(),
            ));
        }
        other => {
            return Err(ClientError::InvalidEndpoint(format!(
                "unsupported base url scheme '{other}'"
            )));
        }
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(ClientError::InvalidEndpoint(
            "base url must not embed credentials".to_string(),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Abstract transport used by [`Ruter`].
pub trait RuterTransport: Send + Sync {
    /// Fetches `url` and returns the decoded JSON body.
    ///
    /// # Errors
    /// Returns [`ClientError`] for transport, status or decode failures.
    fn get_json(&self, url: &Url) -> Result<Value, ClientError>;
}

/// Blocking HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the HTTP client with timeout and user agent from `config`.
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] when the client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(StdDuration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|error| ClientError::Transport(format!("http client build failed: {error}")))?;
        Ok(Self { client })
    }
}

impl RuterTransport for HttpTransport {
    fn get_json(&self, url: &Url) -> Result<Value, ClientError> {
        let response = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|error| ClientError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("GET {url} returned HTTP {}", status.as_u16());
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .map_err(|error| ClientError::Transport(error.to_string()))?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }
}

/// One Reis API resource, addressed relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `Meta/GetValidities`
    Validities,
    /// `Heartbeat/Index`
    Heartbeat,
    /// `Place/GetPlaces/{location}`
    Places(String),
    /// `Place/GetStop/{id}`
    Stop(i64),
    /// `Line/GetLinesByStopID/{id}`
    LinesByStopId(i64),
    /// `Place/GetStopsRuter`
    StopsRuter,
    /// `Line/GetLines` or `Line/GetLinesRuter`, optionally `/Extended`.
    Lines {
        /// Restrict to Ruter-operated lines.
        ruter_operated_only: bool,
        /// Request the extended listing.
        extended: bool,
    },
    /// `Line/GetStopsByLineID/{id}`
    StopsByLineId(i64),
    /// `Line/GetDataByLineID/{id}`
    DataByLineId(i64),
    /// `StopVisit/GetDepartures/{id}`
    Departures(i64),
    /// `Street/GetStreet/{id}`
    Street(i64),
}

impl Endpoint {
    /// Unencoded path segments below the base URL.
    pub fn segments(&self) -> Vec<String> {
        let (controller, action) = match self {
            Self::Validities => ("Meta", "GetValidities"),
            Self::Heartbeat => ("Heartbeat", "Index"),
            Self::Places(_) => ("Place", "GetPlaces"),
            Self::Stop(_) => ("Place", "GetStop"),
            Self::LinesByStopId(_) => ("Line", "GetLinesByStopID"),
            Self::StopsRuter => ("Place", "GetStopsRuter"),
            Self::Lines {
                ruter_operated_only: true,
                ..
            } => ("Line", "GetLinesRuter"),
            Self::Lines { .. } => ("Line", "GetLines"),
            Self::StopsByLineId(_) => ("Line", "GetStopsByLineID"),
            Self::DataByLineId(_) => ("Line", "GetDataByLineID"),
            Self::Departures(_) => ("StopVisit", "GetDepartures"),
            Self::Street(_) => ("Street", "GetStreet"),
        };
        let mut segments = vec![controller.to_string(), action.to_string()];

        match self {
            Self::Places(location) => segments.push(location.clone()),
            Self::Stop(id)
            | Self::LinesByStopId(id)
            | Self::StopsByLineId(id)
            | Self::DataByLineId(id)
            | Self::Departures(id)
            | Self::Street(id) => segments.push(id.to_string()),
            Self::Lines { extended: true, .. } => segments.push("Extended".to_string()),
            Self::Validities | Self::Heartbeat | Self::StopsRuter | Self::Lines { .. } => {}
        }
        segments
    }
}

/// Ruter Reis API client.
pub struct Ruter {
    base_url: Url,
    transport: Arc<dyn RuterTransport>,
    location: RwLock<Option<String>>,
}

impl Ruter {
    /// Creates an HTTP client from `config`.
    ///
    /// # Errors
    /// Returns [`ClientError`] when the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Self::with_transport(config, transport)
    }

    /// Creates an HTTP client configured from the process environment.
    ///
    /// # Errors
    /// See [`ClientConfig::from_env`] and [`Ruter::new`].
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(&ClientConfig::from_env()?)
    }

    /// Creates a client over a caller-provided transport.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidEndpoint`] when the base URL is invalid.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn RuterTransport>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: validate_base_url(&config.base_url, config.allow_http)?,
            transport,
            location: RwLock::new(None),
        })
    }

    /// Returns the validated base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Records the caller's current location text.
    pub fn set_location(&self, location: impl Into<String>) {
        let mut slot = self.location.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(location.into());
    }

    /// Returns the last location set, if any.
    pub fn location(&self) -> Option<String> {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches the timetable validity window.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_validities(&self) -> Result<Validities, ClientError> {
        let body = self.get_json(&Endpoint::Validities)?;
        checked(decode_record(body, &VALIDITIES_SCHEMA))
    }

    /// Fetches the service health snapshot.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_heartbeat(&self) -> Result<Heartbeat, ClientError> {
        let body = self.get_json(&Endpoint::Heartbeat)?;
        checked(decode_record(body, &HEARTBEAT_SCHEMA))
    }

    /// Searches stops, areas and points of interest by free text.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_places(&self, location: &str) -> Result<Vec<Place>, ClientError> {
        let body = self.get_json(&Endpoint::Places(location.to_string()))?;
        checked(decode_places(body))
    }

    /// Fetches one stop by identifier.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_stop(&self, stop_id: i64) -> Result<Stop, ClientError> {
        let body = self.get_json(&Endpoint::Stop(stop_id))?;
        checked(decode_record(body, &STOP_SCHEMA))
    }

    /// Fetches the lines serving a stop.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_lines_by_stop_id(&self, stop_id: i64) -> Result<Vec<Line>, ClientError> {
        let body = self.get_json(&Endpoint::LinesByStopId(stop_id))?;
        checked(decode_records(body, &LINE_SCHEMA))
    }

    /// Fetches every stop operated by Ruter.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_stops_ruter(&self) -> Result<Vec<Stop>, ClientError> {
        let body = self.get_json(&Endpoint::StopsRuter)?;
        checked(decode_records(body, &STOP_SCHEMA))
    }

    /// Fetches the line list.
    ///
    /// `ruter_operated_only` restricts the list to Ruter-operated lines;
    /// `extended` requests the extended listing.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_lines(
        &self,
        ruter_operated_only: bool,
        extended: bool,
    ) -> Result<Vec<Line>, ClientError> {
        let body = self.get_json(&Endpoint::Lines {
            ruter_operated_only,
            extended,
        })?;
        checked(decode_records(body, &LINE_SCHEMA))
    }

    /// Fetches the stops along a line.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_stops_by_line_id(&self, line_id: i64) -> Result<Vec<Stop>, ClientError> {
        let body = self.get_json(&Endpoint::StopsByLineId(line_id))?;
        checked(decode_records(body, &STOP_SCHEMA))
    }

    /// Fetches one line by identifier.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_data_by_line_id(&self, line_id: i64) -> Result<Line, ClientError> {
        let body = self.get_json(&Endpoint::DataByLineId(line_id))?;
        checked(decode_record(body, &LINE_SCHEMA))
    }

    /// Fetches upcoming departures from a stop.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_departures(&self, stop_id: i64) -> Result<Vec<Departure>, ClientError> {
        let body = self.get_json(&Endpoint::Departures(stop_id))?;
        checked(decode_departures(body))
    }

    /// Returns the earliest upcoming departure from a stop.
    ///
    /// `line` matches the published line name or line reference; `direction`
    /// matches the direction reference.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request, contract or timestamp failures.
    pub fn get_next_departure(
        &self,
        stop_id: i64,
        line: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Option<Departure>, ClientError> {
        let departures = self.get_departures(stop_id)?;
        next_departure(departures, line, direction)
    }

    /// Returns the time from `now` until the next matching departure.
    ///
    /// Departures already due yield [`Duration::ZERO`].
    ///
    /// # Errors
    /// See [`Ruter::get_next_departure`].
    pub fn get_time_until_next_departure(
        &self,
        stop_id: i64,
        line: Option<&str>,
        direction: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<Option<Duration>, ClientError> {
        let Some(departure) = self.get_next_departure(stop_id, line, direction)? else {
            return Ok(None);
        };
        time_until(&departure, now)
    }

    /// Fetches a street and its house numbers.
    ///
    /// # Errors
    /// Returns [`ClientError`] for request or contract failures.
    pub fn get_street(&self, street_id: i64) -> Result<Street, ClientError> {
        let body = self.get_json(&Endpoint::Street(street_id))?;
        checked(decode_record(body, &STREET_SCHEMA))
    }

    /// Builds the URL of `endpoint` below the base URL.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidEndpoint`] when the base URL cannot carry
    /// path segments.
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::InvalidEndpoint("base url cannot carry path segments".to_string())
            })?
            .pop_if_empty()
            .extend(endpoint.segments());
        Ok(url)
    }

    /// Fetches the response body of `endpoint` as received, without any
    /// contract check.
    ///
    /// # Errors
    /// Returns [`ClientError`] for endpoint, transport, status or JSON
    /// failures.
    pub fn get_json(&self, endpoint: &Endpoint) -> Result<Value, ClientError> {
        let url = self.url_for(endpoint)?;
        debug!("GET {url}");
        self.transport.get_json(&url)
    }
}

fn checked<T>(decoded: Result<T, SchemaError>) -> Result<T, ClientError> {
    decoded.map_err(|error| {
        warn!("response violates contract: {error}");
        ClientError::Contract(error)
    })
}

/// Picks the earliest departure matching the optional line and direction.
///
/// Departures without any departure time are ignored. Ties keep upstream
/// order.
///
/// # Errors
/// Returns [`ClientError::Core`] when a departure time is not RFC 3339.
pub fn next_departure(
    departures: Vec<Departure>,
    line: Option<&str>,
    direction: Option<&str>,
) -> Result<Option<Departure>, ClientError> {
    let mut best: Option<(OffsetDateTime, Departure)> = None;

    for departure in departures {
        if line.is_some_and(|line| !departure.serves_line(line)) {
            continue;
        }
        if direction.is_some_and(|direction| !departure.runs_in_direction(direction)) {
            continue;
        }
        let Some(at) = departure.departure_time()? else {
            continue;
        };
        if best.as_ref().is_none_or(|(best_at, _)| at < *best_at) {
            best = Some((at, departure));
        }
    }

    Ok(best.map(|(_, departure)| departure))
}

/// Returns the non-negative time from `now` until `departure` leaves.
///
/// # Errors
/// Returns [`ClientError::Core`] when the departure time is not RFC 3339.
pub fn time_until(
    departure: &Departure,
    now: OffsetDateTime,
) -> Result<Option<Duration>, ClientError> {
    Ok(departure
        .departure_time()?
        .map(|at| (at - now).max(Duration::ZERO)))
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration value could not be used.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Base URL or endpoint violates policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Connection, timeout or body read failure.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Upstream answered with a non-success HTTP status.
    #[error("unexpected http status {0}")]
    Status(u16),
    /// Body is not valid JSON.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Body does not match the response contract.
    #[error("response contract violation: {0}")]
    Contract(#[from] SchemaError),
    /// Record conversion failure.
    #[error("record error: {0}")]
    Core(#[from] CoreError),
}
