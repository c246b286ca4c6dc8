use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crosslink_core::constants::DEFAULT_DEVNODE_PORT;

/// Settings of a development node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevNodeConfig {
    /// JSON-RPC listen address. Port 0 picks a free port.
    pub rpc_addr: SocketAddr,
    /// Duration of each simulated key generation phase
    /// (NOT_STARTED, then IN_PROGRESS, then settled).
    pub keygen_step_ms: u64,
    /// Activate a freshly generated key when no key is active yet.
    pub auto_activate: bool,
}

impl DevNodeConfig {
    pub fn keygen_step(&self) -> Duration {
        Duration::from_millis(self.keygen_step_ms)
    }
}

impl Default for DevNodeConfig {
    fn default() -> Self {
        Self {
            rpc_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_DEVNODE_PORT)),
            keygen_step_ms: 200,
            auto_activate: true,
        }
    }
}
