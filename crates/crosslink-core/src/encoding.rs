//! `0x`-prefixed hex helpers used for every byte payload on the wire.

use crate::error::CrossError;

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed (or bare) hex. `what` names the field for the error.
pub fn from_prefixed_hex(s: &str, what: &str) -> Result<Vec<u8>, CrossError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits).map_err(|e| CrossError::InvalidParameter(format!("{what}: invalid hex: {e}")))
}

/// Decode hex that must be exactly `N` bytes long.
pub fn from_prefixed_hex_array<const N: usize>(s: &str, what: &str) -> Result<[u8; N], CrossError> {
    let bytes = from_prefixed_hex(s, what)?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CrossError::InvalidParameter(format!("{what}: expected {N} bytes, got {}", b.len()))
    })
}

/// Parse a `0x` hex quantity such as a transaction count.
pub fn from_quantity(s: &str, what: &str) -> Result<u64, CrossError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| CrossError::InvalidParameter(format!("{what}: {s:?} is not a 0x quantity")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| CrossError::InvalidParameter(format!("{what}: {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_and_prefixed_hex() {
        assert_eq!(from_prefixed_hex("0xdead", "x").unwrap(), vec![0xde, 0xad]);
        assert_eq!(from_prefixed_hex("beef", "x").unwrap(), vec![0xbe, 0xef]);
        assert_eq!(to_prefixed_hex(&[0x01, 0xff]), "0x01ff");
    }

    #[test]
    fn quantities_are_hex() {
        assert_eq!(from_quantity("0x1f", "nonce").unwrap(), 31);
        assert_eq!(from_quantity("0x0", "nonce").unwrap(), 0);
        assert!(from_quantity("31", "nonce").is_err());
        assert!(from_quantity("0x", "nonce").is_err());
    }

    #[test]
    fn fixed_length_mismatch_is_invalid_parameter() {
        let err = from_prefixed_hex_array::<4>("0x0102", "hash").unwrap_err();
        assert!(matches!(err, CrossError::InvalidParameter(m) if m.contains("expected 4 bytes")));
    }
}
