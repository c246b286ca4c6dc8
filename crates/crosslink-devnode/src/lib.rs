//! crosslink-devnode
//!
//! In-memory development node serving the `cross` and `priv` JSON-RPC
//! namespaces.
//!
//! It simulates what a real node set does behind the client: key generation
//! rounds that progress with time, lock records versioned by block height,
//! and subordinate view verification against the active key. The threshold
//! cryptography is stood in for by BLAKE3 keyed hashes; nothing here is
//! meant for production use.

pub mod config;
pub mod ledger;
pub mod privacy;
pub mod server;
pub mod views;

pub use config::DevNodeConfig;
pub use ledger::{Ledger, LedgerError};
pub use server::{DevNode, DevNodeState};
