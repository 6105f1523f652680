//! Mock room server for testing address discovery
//!
//! Serves the per-channel socket configuration document that lists the
//! real-time endpoints a client may connect to.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock room server exposing `/socketconfig/{channel}.json`
pub struct MockRoomServer {
    server: MockServer,
}

impl MockRoomServer {
    /// Start a new mock room server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL (with a trailing slash, like a configured base URL)
    pub fn url(&self) -> String {
        format!("{}/", self.server.uri())
    }

    /// Mount a socket configuration listing `(url, secure)` servers
    pub async fn mock_socket_config(&self, channel: &str, servers: &[(&str, bool)]) {
        let servers: Vec<serde_json::Value> = servers
            .iter()
            .map(|(url, secure)| json!({ "url": url, "secure": secure }))
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("/socketconfig/{}.json", channel)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "servers": servers })))
            .mount(&self.server)
            .await;
    }

    /// Mount an error status for a channel's socket configuration
    pub async fn mock_socket_config_status(&self, channel: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/socketconfig/{}.json", channel)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}
