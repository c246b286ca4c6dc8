use std::time::Duration;

use serde::{Deserialize, Serialize};

use crosslink_core::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUERY_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RPC_URL,
};

/// Connection and polling settings for a `CrossClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Node JSON-RPC endpoint.
    pub url: String,
    /// Per-request timeout applied by the HTTP transport.
    pub request_timeout_secs: u64,
    /// Extra attempts for idempotent queries after a transport failure.
    pub query_retries: u32,
    /// Interval between status polls while waiting on a key generation round.
    pub poll_interval_ms: u64,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            query_retries: DEFAULT_QUERY_RETRIES,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}
