use tracing::info;

use crosslink_core::constants::TX_HASH_LEN;
use crosslink_core::encoding::{from_prefixed_hex_array, from_quantity, to_prefixed_hex};
use crosslink_core::{Address, Base64String, CrossError, PrivacyGroup};
use crosslink_rpc::{call, methods, Transport};
use serde_json::Value;

use crate::client::CrossClient;

/// Private transaction calls: privacy group management and private
/// transaction lookups.
pub struct PrivacyClient<'a, T> {
    client: &'a CrossClient<T>,
}

fn tx_hash(hash: &str) -> Result<String, CrossError> {
    from_prefixed_hex_array::<TX_HASH_LEN>(hash, "transaction hash").map(|b| to_prefixed_hex(&b))
}

impl<'a, T: Transport> PrivacyClient<'a, T> {
    pub(crate) fn new(client: &'a CrossClient<T>) -> Self {
        Self { client }
    }

    /// Number of private transactions `address` has sent within the group.
    pub async fn get_transaction_count(
        &self,
        address: &Address,
        privacy_group_id: &Base64String,
    ) -> Result<u64, CrossError> {
        let quantity = self
            .client
            .execute(
                call::priv_get_transaction_count(&address.to_hex(), privacy_group_id),
                &format!("private nonce of {address} in group {privacy_group_id}"),
            )
            .await?;
        from_quantity(&quantity, "private transaction count").map_err(|e| CrossError::Decode {
            method: methods::PRIV_GET_TRANSACTION_COUNT.to_string(),
            reason: e.to_string(),
        })
    }

    /// The private payload behind a privacy marker transaction; `None` when
    /// this node is not a party to it.
    pub async fn get_private_transaction(&self, hash: &str) -> Result<Option<Value>, CrossError> {
        let hash = tx_hash(hash)?;
        self.client
            .execute(call::priv_get_private_transaction(&hash), &format!("private transaction {hash}"))
            .await
    }

    pub async fn get_privacy_precompile_address(&self) -> Result<Address, CrossError> {
        let address = self
            .client
            .execute(call::priv_get_privacy_precompile_address(), "privacy precompile address")
            .await?;
        address.parse().map_err(|e: CrossError| CrossError::Decode {
            method: methods::PRIV_GET_PRIVACY_PRECOMPILE_ADDRESS.to_string(),
            reason: e.to_string(),
        })
    }

    /// Create a group over the enclave keys in `members` and return its id.
    pub async fn create_privacy_group(
        &self,
        members: &[Base64String],
        name: &str,
        description: &str,
    ) -> Result<Base64String, CrossError> {
        if members.is_empty() {
            return Err(CrossError::InvalidParameter("privacy group needs at least one member".into()));
        }
        let id: String = self
            .client
            .execute(
                call::priv_create_privacy_group(members, name, description),
                &format!("privacy group {name:?}"),
            )
            .await?;
        let id: Base64String = id.parse().map_err(|e: CrossError| CrossError::Decode {
            method: methods::PRIV_CREATE_PRIVACY_GROUP.to_string(),
            reason: e.to_string(),
        })?;
        info!(group = %id, name, members = members.len(), "privacy group created");
        Ok(id)
    }

    /// Groups whose membership is exactly `members`.
    pub async fn find_privacy_group(&self, members: &[Base64String]) -> Result<Vec<PrivacyGroup>, CrossError> {
        self.client
            .execute(call::priv_find_privacy_group(members), "privacy group lookup")
            .await?
            .into_iter()
            .map(|g| {
                PrivacyGroup::try_from(g).map_err(|e| CrossError::Decode {
                    method: methods::PRIV_FIND_PRIVACY_GROUP.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Whether the node deleted the group.
    pub async fn delete_privacy_group(&self, privacy_group_id: &Base64String) -> Result<bool, CrossError> {
        let deleted = self
            .client
            .execute(
                call::priv_delete_privacy_group(privacy_group_id),
                &format!("privacy group {privacy_group_id}"),
            )
            .await?;
        info!(group = %privacy_group_id, deleted, "privacy group deletion");
        Ok(deleted)
    }

    /// Receipt of a private transaction; `None` while it is pending or when
    /// this node is not a party to it.
    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Value>, CrossError> {
        let hash = tx_hash(hash)?;
        self.client
            .execute(call::priv_get_transaction_receipt(&hash), &format!("private receipt {hash}"))
            .await
    }
}
