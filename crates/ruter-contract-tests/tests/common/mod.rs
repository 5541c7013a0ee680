//! Shared mock Reis API for contract suite integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use ruter_client::{ClientConfig, Ruter};
use serde_json::Value;
use tiny_http::{Header, Response, Server};

/// Local HTTP server answering upstream paths from a fixture table.
pub struct MockApi {
    base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
}

impl MockApi {
    /// Starts a server answering `routes` (path without leading slash -> body).
    /// Unknown paths answer 404.
    pub fn start(routes: HashMap<String, Value>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = Server::http("127.0.0.1:0").expect("mock server should bind");
        let addr = server.server_addr().to_ip().expect("mock server should use tcp");
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let total = Arc::new(AtomicUsize::new(0));

        let thread_hits = Arc::clone(&hits);
        let thread_total = Arc::clone(&total);
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let path = request.url().trim_start_matches('/').to_string();
                thread_total.fetch_add(1, Ordering::SeqCst);
                *thread_hits
                    .lock()
                    .expect("hit counter lock")
                    .entry(path.clone())
                    .or_insert(0) += 1;

                let content_type = Header::from_bytes("Content-Type", "application/json")
                    .expect("static header should parse");
                let response = match routes.get(&path) {
                    Some(body) => Response::from_string(body.to_string()),
                    None => Response::from_string("{}").with_status_code(404),
                };
                let _ = request.respond(response.with_header(content_type));
            }
        });

        Self {
            base_url: format!("http://{addr}/"),
            hits,
            total,
        }
    }

    /// Starts a server answering the default fixture table.
    #[allow(dead_code)]
    pub fn with_default_routes() -> Self {
        Self::start(default_routes())
    }

    /// Builds an HTTP client pointed at this server.
    pub fn client(&self) -> Ruter {
        Ruter::new(&ClientConfig {
            base_url: self.base_url.clone(),
            allow_http: true,
            timeout_ms: 5_000,
            ..ClientConfig::default()
        })
        .expect("client should build")
    }

    /// Number of requests received for `path`.
    #[allow(dead_code)]
    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("hit counter lock")
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests received overall.
    #[allow(dead_code)]
    pub fn total_hits(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Reads one shared contract fixture.
pub fn fixture(name: &str) -> Value {
    let path = format!(
        "{}/../../contracts/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    );
    let raw = std::fs::read_to_string(path).expect("fixture should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

/// Upstream path -> fixture table covering every scenario.
pub fn default_routes() -> HashMap<String, Value> {
    [
        ("Meta/GetValidities", "validities.json"),
        ("Heartbeat/Index", "heartbeat.json"),
        ("Place/GetPlaces/Majorstuen", "places-majorstuen.json"),
        ("Place/GetStop/3010200", "stop-3010200.json"),
        ("Line/GetLinesByStopID/3010200", "lines-by-stop-3010200.json"),
        ("Place/GetStopsRuter", "stops-ruter.json"),
        ("Line/GetLines", "lines.json"),
        ("Line/GetLines/Extended", "lines.json"),
        ("Line/GetLinesRuter", "lines-ruter.json"),
        ("Line/GetLinesRuter/Extended", "lines-ruter.json"),
        ("Line/GetStopsByLineID/1", "stops-by-line-1.json"),
        ("Line/GetDataByLineID/1", "line-1.json"),
        ("StopVisit/GetDepartures/3010200", "departures-3010200.json"),
        ("Street/GetStreet/1234", "street-1234.json"),
    ]
    .into_iter()
    .map(|(path, name)| (path.to_string(), fixture(name)))
    .collect()
}
