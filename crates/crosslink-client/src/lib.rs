//! crosslink-client
//!
//! Client for the cross-chain locking and threshold key generation protocol.
//!
//! `CrossClient` owns the transport and hands out per-component views:
//!   keygen()   key generation session tracker (start, poll, activate)
//!   registry() linked nodes, coordination contracts, key-gen contract
//!   locks()    lockable/locked queries and subordinate views
//!   relay()    cross-chain raw transaction submission
//!   privacy()  privacy groups and private transaction lookups
//!   operator() block production control and transaction traces
//!
//! All state is polled; nothing here retries a mutating call.

pub mod client;
pub mod config;
pub mod keygen;
pub mod lock;
pub mod operator;
pub mod privacy;
pub mod registry;
pub mod relay;

#[cfg(test)]
mod testing;

pub use client::CrossClient;
pub use config::ClientConfig;
pub use keygen::KeyGenSession;
pub use lock::LockCoordinator;
pub use operator::NodeOperator;
pub use privacy::PrivacyClient;
pub use registry::RegistryClient;
pub use relay::Relay;
