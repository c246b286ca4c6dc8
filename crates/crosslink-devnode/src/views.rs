//! Payload conventions the development node assigns to opaque subordinate
//! views and cross-chain transactions, plus the keyed-hash stand-in for
//! threshold signatures.
//!
//! A directive is one tag byte followed by a 20-byte address. A signed view
//! is framed as `len(data) as u32 BE || data || signature`; clients carry the
//! frame as an opaque payload.

use crosslink_core::constants::ADDRESS_LEN;
use crosslink_core::Address;

/// Subordinate chain executed a transaction that locks the address.
pub const LOCK_TAG: u8 = 0x01;
/// Subordinate chain proved the event that releases the lock.
pub const UNLOCK_PROOF_TAG: u8 = 0x02;
/// Cross-chain transaction that releases a lock whose proof is recorded.
pub const UNLOCK_TX_TAG: u8 = 0x03;

const PUBLIC_KEY_CONTEXT: &str = "crosslink-devnode 2024 threshold public key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Lock(Address),
    UnlockProof(Address),
    UnlockTx(Address),
}

fn directive(tag: u8, address: &Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + ADDRESS_LEN);
    out.push(tag);
    out.extend_from_slice(&address.0);
    out
}

pub fn lock_view(address: &Address) -> Vec<u8> {
    directive(LOCK_TAG, address)
}

pub fn unlock_proof_view(address: &Address) -> Vec<u8> {
    directive(UNLOCK_PROOF_TAG, address)
}

pub fn unlock_transaction(address: &Address) -> Vec<u8> {
    directive(UNLOCK_TX_TAG, address)
}

pub fn parse_directive(bytes: &[u8]) -> Option<Directive> {
    let (&tag, rest) = bytes.split_first()?;
    let address = Address(rest.try_into().ok()?);
    match tag {
        LOCK_TAG => Some(Directive::Lock(address)),
        UNLOCK_PROOF_TAG => Some(Directive::UnlockProof(address)),
        UNLOCK_TX_TAG => Some(Directive::UnlockTx(address)),
        _ => None,
    }
}

/// Frame view `data` with its `signature`.
pub fn frame(data: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len() + signature.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(signature);
    out
}

/// Split a framed view into data and signature. `None` when the frame is
/// shorter than its length prefix claims.
pub fn split_frame(framed: &[u8]) -> Option<(&[u8], &[u8])> {
    let (prefix, rest) = framed.split_first_chunk::<4>()?;
    let len = usize::try_from(u32::from_be_bytes(*prefix)).ok()?;
    (rest.len() >= len).then(|| rest.split_at(len))
}

/// Signature of `data` under the group secret.
pub fn sign(secret: &[u8; 32], data: &[u8]) -> Vec<u8> {
    blake3::keyed_hash(secret, data).as_bytes().to_vec()
}

/// Public material published for a group secret.
pub fn public_key(secret: &[u8; 32]) -> Vec<u8> {
    blake3::derive_key(PUBLIC_KEY_CONTEXT, secret).to_vec()
}
