/// ─── Crosslink Protocol Constants ───────────────────────────────────────────
///
/// Shared by the client, the wire layer and the development node so that both
/// ends of a `cross_*` call agree on names, limits and error codes.

// ── Wire ─────────────────────────────────────────────────────────────────────

/// JSON-RPC namespace of the cross-chain methods (`cross_<method>`).
pub const CROSS_NAMESPACE: &str = "cross";

/// Default node endpoint used by the CLI and `ClientConfig::default()`.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default development node listen port (on loopback).
pub const DEFAULT_DEVNODE_PORT: u16 = 8545;

// ── Error codes reported by nodes ────────────────────────────────────────────

/// Standard JSON-RPC "invalid params".
pub const ERR_INVALID_PARAMS: i32 = -32602;

/// Standard JSON-RPC "internal error".
pub const ERR_INTERNAL: i32 = -32603;

/// Signature or threshold proof on a subordinate view did not validate.
pub const ERR_VERIFICATION_FAILED: i32 = -32010;

/// No threshold key is active on the node.
pub const ERR_NO_ACTIVE_KEY: i32 = -32011;

/// Operation requested against a key version in the wrong lifecycle state.
pub const ERR_INVALID_STATE: i32 = -32012;

// ── Limits ───────────────────────────────────────────────────────────────────

/// Length of an account / contract address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a block hash in bytes.
pub const BLOCK_HASH_LEN: usize = 32;

/// Length of a transaction hash in bytes.
pub const TX_HASH_LEN: usize = 32;

/// Minimum signature threshold for a key generation round.
pub const MIN_THRESHOLD: u32 = 1;

// ── Client defaults ──────────────────────────────────────────────────────────

/// Per-request timeout applied by the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Interval between key status polls in `wait_for_terminal`.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Retries for idempotent queries after a transport failure. Mutating calls
/// are never retried.
pub const DEFAULT_QUERY_RETRIES: u32 = 0;
