use thiserror::Error;

use crate::constants::{
    ERR_INVALID_PARAMS, ERR_INVALID_STATE, ERR_NO_ACTIVE_KEY, ERR_VERIFICATION_FAILED,
};
use crate::types::KeyVersion;

/// Failure of a single JSON-RPC round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcFailure {
    /// Connection refused, timeout, malformed envelope, non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC `error` object reported by the node.
    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },
}

#[derive(Debug, Error)]
pub enum CrossError {
    // ── Wire ─────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Rpc(#[from] RpcFailure),

    #[error("cannot decode result of {method}: {reason}")]
    Decode { method: String, reason: String },

    // ── Protocol ─────────────────────────────────────────────────────────────
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("no active key: {0}")]
    NoActiveKey(String),

    // ── Polling ──────────────────────────────────────────────────────────────
    #[error("key version {version} did not reach a terminal state within {waited_ms} ms")]
    Timeout { version: KeyVersion, waited_ms: u64 },
}

impl CrossError {
    /// Map a node-reported failure onto the protocol taxonomy.
    ///
    /// `context` names the subject of the call (version, address, chain id)
    /// and is prefixed to the message of every kind. Unknown codes stay
    /// `Remote` with their code intact.
    pub fn classify(failure: RpcFailure, context: &str) -> Self {
        match failure {
            RpcFailure::Remote { code, message } => {
                let detail = format!("{context}: {message}");
                match code {
                    ERR_INVALID_PARAMS => CrossError::InvalidParameter(detail),
                    ERR_INVALID_STATE => CrossError::InvalidState(detail),
                    ERR_VERIFICATION_FAILED => CrossError::VerificationFailed(detail),
                    ERR_NO_ACTIVE_KEY => CrossError::NoActiveKey(detail),
                    _ => CrossError::Rpc(RpcFailure::Remote { code, message: detail }),
                }
            }
            RpcFailure::Transport(reason) => {
                CrossError::Rpc(RpcFailure::Transport(format!("{context}: {reason}")))
            }
        }
    }

    /// Classify a wire failure raised while acting on `context`; other kinds
    /// pass through untouched.
    pub fn in_context(self, context: &str) -> Self {
        match self {
            CrossError::Rpc(failure) => CrossError::classify(failure, context),
            other => other,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CrossError::Rpc(RpcFailure::Transport(_)))
    }
}
