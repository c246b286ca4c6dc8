use tracing::info;

use crosslink_core::encoding::to_prefixed_hex;
use crosslink_core::CrossError;
use crosslink_rpc::{call, Transport};

use crate::client::CrossClient;

/// Final step of a cross-chain operation: hand a fully signed transaction to
/// the node. No lock logic lives here.
pub struct Relay<'a, T> {
    client: &'a CrossClient<T>,
}

impl<'a, T: Transport> Relay<'a, T> {
    pub(crate) fn new(client: &'a CrossClient<T>) -> Self {
        Self { client }
    }

    /// Submit `signed_tx` and return the transaction hash reported by the node.
    pub async fn send_cross_chain_raw_transaction(&self, signed_tx: &[u8]) -> Result<String, CrossError> {
        if signed_tx.is_empty() {
            return Err(CrossError::InvalidParameter("signed transaction is empty".into()));
        }
        let hash = self
            .client
            .execute(
                call::send_cross_chain_raw_transaction(&to_prefixed_hex(signed_tx)),
                &format!("cross-chain transaction ({} bytes)", signed_tx.len()),
            )
            .await?;
        info!(tx_hash = %hash, "cross-chain transaction submitted");
        Ok(hash)
    }
}
