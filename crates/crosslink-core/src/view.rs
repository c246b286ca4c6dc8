use std::fmt;
use std::str::FromStr;

use crate::encoding::{from_prefixed_hex, to_prefixed_hex};
use crate::error::CrossError;

/// A signed attestation produced on a subordinate chain, as the
/// `0x`-prefixed hex string the node accepts for `signedViewData`.
///
/// The client never looks inside: its layout belongs to the subordinate
/// chain and the node, and the string goes on the wire exactly as it was
/// supplied. Only the hex shape is checked on construction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SignedSubordinateView(String);

impl SignedSubordinateView {
    /// Wrap an already encoded view. Letter case and leading zeros are kept.
    pub fn from_hex(s: &str) -> Result<Self, CrossError> {
        if !s.starts_with("0x") && !s.starts_with("0X") {
            return Err(CrossError::InvalidParameter("signed view: missing 0x prefix".into()));
        }
        from_prefixed_hex(s, "signed view")?;
        Ok(Self(s.to_string()))
    }

    /// Encode raw view bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(to_prefixed_hex(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The raw view bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated in every constructor.
        from_prefixed_hex(&self.0, "signed view").unwrap_or_default()
    }

    /// True when the view carries no bytes at all (`"0x"`).
    pub fn is_empty(&self) -> bool {
        self.0.len() <= 2
    }
}

impl FromStr for SignedSubordinateView {
    type Err = CrossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for SignedSubordinateView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedSubordinateView({})", self.0)
    }
}

impl fmt::Display for SignedSubordinateView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
