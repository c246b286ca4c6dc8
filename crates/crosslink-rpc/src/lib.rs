//! crosslink-rpc
//!
//! Wire layer for the `cross` JSON-RPC namespace and the node's `priv`,
//! `miner` and `debug` calls.
//!
//!   api        jsonrpsee traits describing the `cross_*` and `priv_*` methods
//!   types      JSON shapes of structured results
//!   call       typed call descriptors (`RpcCall<T>`), one per method
//!   transport  `Transport` seam and the reqwest-backed `HttpTransport`

pub mod api;
pub mod call;
pub mod transport;
pub mod types;

pub use call::{methods, RpcCall};
pub use jsonrpsee::core::async_trait;
pub use transport::{HttpTransport, Transport};
pub use types::{
    RpcCoordinationContract, RpcCreatePrivacyGroupRequest, RpcLinkedNode, RpcPrivacyGroup,
    RpcSubordinateViewResult, TransactionTrace,
};
