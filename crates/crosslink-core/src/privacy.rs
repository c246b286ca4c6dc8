//! Types of the node's private transaction (`priv`) calls.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CrossError;

/// Standard-alphabet base64 value: privacy group ids and enclave public keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Base64String(Vec<u8>);

impl Base64String {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        B64.encode(&self.0)
    }
}

impl FromStr for Base64String {
    type Err = CrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B64.decode(s)
            .map(Base64String)
            .map_err(|e| CrossError::InvalidParameter(format!("{s:?} is not base64: {e}")))
    }
}

impl fmt::Display for Base64String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Base64String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base64String({})", self.to_base64())
    }
}

impl Serialize for Base64String {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Base64String {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A privacy group as reported by `priv_findPrivacyGroup`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PrivacyGroup {
    pub id: Base64String,
    pub name: String,
    pub description: String,
    /// Group flavour reported by the node, e.g. `LEGACY` or `PANTHEON`.
    pub kind: String,
    pub members: Vec<Base64String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCLAVE_KEY: &str = "A1aVtMxLCUHmBVHXoZzzBgPbW/wj5axDpW9X8l91SGo=";

    #[test]
    fn enclave_keys_round_trip_through_text() {
        let key: Base64String = ENCLAVE_KEY.parse().unwrap();
        assert_eq!(key.as_bytes().len(), 32);
        assert_eq!(key.to_string(), ENCLAVE_KEY);
        assert_eq!(serde_json::to_value(&key).unwrap(), serde_json::json!(ENCLAVE_KEY));
    }

    #[test]
    fn non_base64_is_invalid_parameter() {
        let err = "not base64!".parse::<Base64String>().unwrap_err();
        assert!(matches!(err, CrossError::InvalidParameter(_)));
        assert!(serde_json::from_value::<Base64String>(serde_json::json!("%%")).is_err());
    }
}
