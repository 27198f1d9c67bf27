//! Configuration for the fleet API client

use std::time::Duration;

/// Default GraphQL endpoint of a locally running fleet API
pub const DEFAULT_API_URL: &str = "http://localhost:8080/query";

/// Configuration for talking to a fleet API server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// GraphQL endpoint URL (e.g., "http://localhost:8080/query")
    pub url: String,

    /// Per-request timeout. `None` waits for as long as the server takes.
    pub request_timeout: Option<Duration>,

    /// Value sent in the `User-Agent` header
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new configuration for the given endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: None,
            user_agent: format!("fleetdesk/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Bound every request by the given timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
