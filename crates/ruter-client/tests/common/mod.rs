//! Shared fixtures for client integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ruter_client::{ClientConfig, ClientError, Ruter, RuterTransport};
use serde_json::Value;
use url::Url;

/// Transport answering from an in-memory path -> body table and recording
/// every requested URL.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: HashMap<String, Value>,
    requested: Mutex<Vec<String>>,
}

impl RecordingTransport {
    /// Registers the body returned for `path` (without leading slash).
    #[allow(dead_code)]
    pub fn respond(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), body);
        self
    }

    /// Returns every URL path requested so far.
    #[allow(dead_code)]
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("request log lock").clone()
    }
}

impl RuterTransport for RecordingTransport {
    fn get_json(&self, url: &Url) -> Result<Value, ClientError> {
        let path = url.path().trim_start_matches('/').to_string();
        self.requested
            .lock()
            .expect("request log lock")
            .push(path.clone());
        self.responses
            .get(&path)
            .cloned()
            .ok_or(ClientError::Status(404))
    }
}

/// Reads one shared contract fixture.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Value {
    let path = format!(
        "{}/../../contracts/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    );
    let raw = std::fs::read_to_string(path).expect("fixture should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

/// Builds a client over `transport` with default config.
#[allow(dead_code)]
pub fn client(transport: Arc<RecordingTransport>) -> Ruter {
    Ruter::with_transport(&ClientConfig::default(), transport).expect("client should build")
}
