use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{ADDRESS_LEN, BLOCK_HASH_LEN};
use crate::encoding::{from_prefixed_hex, from_prefixed_hex_array, to_prefixed_hex};
use crate::error::CrossError;

// ── KeyVersion ───────────────────────────────────────────────────────────────

/// Ordinal of one threshold key generation round. Assigned by the node,
/// monotonic and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct KeyVersion(pub u64);

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── KeyGenerationStatus ──────────────────────────────────────────────────────

/// Node-reported state of a key generation round.
///
/// `NotStarted -> InProgress -> { Generated -> Active | Active | Failed }`.
/// `Active` and `Failed` are terminal for a version; a later round gets a new
/// version instead of moving this one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyGenerationStatus {
    NotStarted,
    InProgress,
    /// Round completed; waiting for `activateKey`.
    Generated,
    Active,
    Failed,
}

impl KeyGenerationStatus {
    /// States in which polling can stop.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            KeyGenerationStatus::Generated | KeyGenerationStatus::Active | KeyGenerationStatus::Failed
        )
    }
}

impl fmt::Display for KeyGenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyGenerationStatus::NotStarted => "NOT_STARTED",
            KeyGenerationStatus::InProgress => "IN_PROGRESS",
            KeyGenerationStatus::Generated => "GENERATED",
            KeyGenerationStatus::Active => "ACTIVE",
            KeyGenerationStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

// ── ThresholdCryptoSystem ────────────────────────────────────────────────────

/// Threshold signature scheme the node set runs key generation for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
pub enum ThresholdCryptoSystem {
    #[default]
    #[serde(rename = "ALT_BN_128_WITH_KECCAK256")]
    AltBn128WithKeccak256,
}

impl FromStr for ThresholdCryptoSystem {
    type Err = CrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALT_BN_128_WITH_KECCAK256" => Ok(ThresholdCryptoSystem::AltBn128WithKeccak256),
            other => Err(CrossError::InvalidParameter(format!(
                "unknown threshold crypto system: {other}"
            ))),
        }
    }
}

// ── BlockchainId ─────────────────────────────────────────────────────────────

/// Chain identifier of a linked blockchain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct BlockchainId(pub u64);

impl fmt::Display for BlockchainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlockchainId {
    type Err = CrossError;

    /// Decimal or `0x` hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x") {
            Some(digits) => u64::from_str_radix(digits, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(BlockchainId)
            .map_err(|e| CrossError::InvalidParameter(format!("blockchain id {s:?}: {e}")))
    }
}

// ── BlockParameter ───────────────────────────────────────────────────────────

/// Chain state a lock query is evaluated against.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BlockParameter {
    #[default]
    Latest,
    Pending,
    Earliest,
    Number(u64),
    Hash([u8; BLOCK_HASH_LEN]),
}

impl fmt::Display for BlockParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockParameter::Latest => f.write_str("latest"),
            BlockParameter::Pending => f.write_str("pending"),
            BlockParameter::Earliest => f.write_str("earliest"),
            BlockParameter::Number(n) => write!(f, "0x{n:x}"),
            BlockParameter::Hash(h) => f.write_str(&to_prefixed_hex(h)),
        }
    }
}

impl FromStr for BlockParameter {
    type Err = CrossError;

    /// Accepts the symbolic tags, a decimal height, a `0x` hex quantity or a
    /// `0x` 32-byte block hash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => return Ok(BlockParameter::Latest),
            "pending" => return Ok(BlockParameter::Pending),
            "earliest" => return Ok(BlockParameter::Earliest),
            _ => {}
        }
        if let Some(digits) = s.strip_prefix("0x") {
            if digits.len() == BLOCK_HASH_LEN * 2 {
                return from_prefixed_hex_array::<BLOCK_HASH_LEN>(s, "block hash").map(BlockParameter::Hash);
            }
            return u64::from_str_radix(digits, 16)
                .map(BlockParameter::Number)
                .map_err(|e| CrossError::InvalidParameter(format!("block number {s:?}: {e}")));
        }
        s.parse::<u64>()
            .map(BlockParameter::Number)
            .map_err(|_| CrossError::InvalidParameter(format!("unrecognised block parameter {s:?}")))
    }
}

impl Serialize for BlockParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockParameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Address ──────────────────────────────────────────────────────────────────

/// 20-byte account or contract address, `0x` hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

impl FromStr for Address {
    type Err = CrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with("0x") && !s.starts_with("0X") {
            return Err(CrossError::InvalidParameter(format!("address {s:?} must be 0x-prefixed")));
        }
        from_prefixed_hex_array::<ADDRESS_LEN>(s, "address").map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Endpoint ─────────────────────────────────────────────────────────────────

/// Check that `endpoint` has the `host:port` shape nodes expect.
pub fn validate_endpoint(endpoint: &str) -> Result<(), CrossError> {
    let invalid = |why: &str| CrossError::InvalidParameter(format!("endpoint {endpoint:?}: {why}"));
    let (host, port) = endpoint.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid("port must be 1-65535")),
        Ok(_) => Ok(()),
    }
}

// ── Registry entries ─────────────────────────────────────────────────────────

/// A linked blockchain and the node endpoint that serves it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct LinkedNode {
    pub blockchain_id: BlockchainId,
    pub endpoint: String,
}

/// The contract mediating lock state for one blockchain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CoordinationContract {
    pub blockchain_id: BlockchainId,
    pub address: Address,
    pub endpoint: String,
}

/// Node receipt for an accepted subordinate view.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SubordinateViewReceipt {
    pub view_hash: Vec<u8>,
    /// Key version the view's signature was checked against.
    pub key_version: KeyVersion,
}

/// Public component of a threshold key.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockchainPublicKey(pub Vec<u8>);

impl BlockchainPublicKey {
    pub fn from_hex(s: &str) -> Result<Self, CrossError> {
        from_prefixed_hex(s, "public key").map(BlockchainPublicKey)
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BlockchainPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockchainPublicKey({}b)", self.0.len())
    }
}
