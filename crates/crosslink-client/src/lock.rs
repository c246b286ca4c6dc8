use tracing::{info, warn};

use crosslink_core::{
    Address, BlockParameter, CrossError, KeyVersion, SignedSubordinateView, SubordinateViewReceipt,
};
use crosslink_rpc::{call, methods, Transport};

use crate::client::CrossClient;

/// Lock state queries and subordinate view submission.
///
/// Lock state is never cached: every query is evaluated by the node at the
/// block the caller names.
pub struct LockCoordinator<'a, T> {
    client: &'a CrossClient<T>,
}

impl<'a, T: Transport> LockCoordinator<'a, T> {
    pub(crate) fn new(client: &'a CrossClient<T>) -> Self {
        Self { client }
    }

    /// Whether the asset at `address` may be locked at `block`.
    pub async fn is_lockable(&self, address: &Address, block: BlockParameter) -> Result<bool, CrossError> {
        self.client
            .execute(
                call::is_lockable(&address.to_hex(), block),
                &format!("lockability of {address} at {block}"),
            )
            .await
    }

    pub async fn is_locked(&self, address: &Address, block: BlockParameter) -> Result<bool, CrossError> {
        self.client
            .execute(
                call::is_locked(&address.to_hex(), block),
                &format!("lock state of {address} at {block}"),
            )
            .await
    }

    /// Whether the conditions to unlock `address` hold now. Always evaluated
    /// against the latest state.
    pub async fn check_unlock(&self, address: &Address) -> Result<bool, CrossError> {
        self.client
            .execute(call::check_unlock(&address.to_hex()), &format!("unlock check of {address}"))
            .await
    }

    /// Submit a signed subordinate view for verification against the node's
    /// active threshold key.
    ///
    /// With `expected_key` set, the node's active key version is confirmed
    /// first and a mismatch is `InvalidState`; with `None` the view is checked
    /// against whatever key the node holds active.
    pub async fn process_subordinate_view(
        &self,
        view: &SignedSubordinateView,
        expected_key: Option<KeyVersion>,
    ) -> Result<SubordinateViewReceipt, CrossError> {
        if view.is_empty() {
            return Err(CrossError::InvalidParameter("subordinate view carries no data".into()));
        }
        if let Some(expected) = expected_key {
            let active = self.client.keygen().get_active_key_version().await?;
            if active != expected {
                return Err(CrossError::InvalidState(format!(
                    "subordinate view targets key version {expected}, node has {active} active"
                )));
            }
        }

        let raw = self
            .client
            .execute(call::process_subordinate_view(view.as_str()), "subordinate view")
            .await?;
        let receipt = SubordinateViewReceipt::try_from(raw).map_err(|e| CrossError::Decode {
            method: methods::PROCESS_SUBORDINATE_VIEW.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(expected) = expected_key {
            if receipt.key_version != expected {
                warn!(
                    expected = %expected,
                    verified_with = %receipt.key_version,
                    "active key changed while the view was in flight"
                );
            }
        }
        info!(key_version = %receipt.key_version, "subordinate view accepted");
        Ok(receipt)
    }
}
