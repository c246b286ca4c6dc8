use tracing::info;

use crosslink_core::{validate_endpoint, Address, BlockchainId, CoordinationContract, CrossError, LinkedNode};
use crosslink_rpc::{call, Transport};

use crate::client::CrossClient;

/// Linked nodes and coordination contracts known to the node.
///
/// Every successful linked-node call refreshes or patches the client's
/// membership snapshot, which is what threshold validation counts.
pub struct RegistryClient<'a, T> {
    client: &'a CrossClient<T>,
}

impl<'a, T: Transport> RegistryClient<'a, T> {
    pub(crate) fn new(client: &'a CrossClient<T>) -> Self {
        Self { client }
    }

    // ── Linked nodes ─────────────────────────────────────────────────────────

    /// Link the node at `endpoint` (`host:port`) serving `blockchain_id`.
    pub async fn add_linked_node(&self, blockchain_id: BlockchainId, endpoint: &str) -> Result<(), CrossError> {
        validate_endpoint(endpoint)?;
        self.client
            .execute(
                call::add_linked_node(blockchain_id, endpoint),
                &format!("linked node for blockchain {blockchain_id}"),
            )
            .await?;
        self.client.update_membership(|nodes| {
            nodes.retain(|n| n.blockchain_id != blockchain_id);
            nodes.push(LinkedNode { blockchain_id, endpoint: endpoint.to_string() });
        });
        info!(%blockchain_id, endpoint, "linked node added");
        Ok(())
    }

    /// Unlink `blockchain_id`. Unknown ids succeed as a no-op, so a retried
    /// or duplicated removal is harmless.
    pub async fn remove_linked_node(&self, blockchain_id: BlockchainId) -> Result<(), CrossError> {
        self.client
            .execute(
                call::remove_linked_node(blockchain_id),
                &format!("linked node for blockchain {blockchain_id}"),
            )
            .await?;
        self.client
            .update_membership(|nodes| nodes.retain(|n| n.blockchain_id != blockchain_id));
        info!(%blockchain_id, "linked node removed");
        Ok(())
    }

    pub async fn list_linked_nodes(&self) -> Result<Vec<LinkedNode>, CrossError> {
        let nodes: Vec<LinkedNode> = self
            .client
            .execute(call::list_linked_nodes(), "linked nodes")
            .await?
            .into_iter()
            .map(LinkedNode::from)
            .collect();
        self.client.replace_membership(nodes.clone());
        Ok(nodes)
    }

    // ── Coordination contracts ───────────────────────────────────────────────

    /// Register the coordination contract for `blockchain_id`, replacing any
    /// contract already registered for it.
    pub async fn add_coordination_contract(
        &self,
        blockchain_id: BlockchainId,
        address: &Address,
        endpoint: &str,
    ) -> Result<(), CrossError> {
        validate_endpoint(endpoint)?;
        self.client
            .execute(
                call::add_coordination_contract(blockchain_id, &address.to_hex(), endpoint),
                &format!("coordination contract {address} on blockchain {blockchain_id}"),
            )
            .await?;
        info!(%blockchain_id, %address, endpoint, "coordination contract registered");
        Ok(())
    }

    pub async fn remove_coordination_contract(
        &self,
        blockchain_id: BlockchainId,
        address: &Address,
    ) -> Result<(), CrossError> {
        self.client
            .execute(
                call::remove_coordination_contract(blockchain_id, &address.to_hex()),
                &format!("coordination contract {address} on blockchain {blockchain_id}"),
            )
            .await?;
        info!(%blockchain_id, %address, "coordination contract removed");
        Ok(())
    }

    pub async fn list_coordination_contracts(&self) -> Result<Vec<CoordinationContract>, CrossError> {
        let raw = self
            .client
            .execute(call::list_coordination_contracts(), "coordination contracts")
            .await?;
        raw.into_iter()
            .map(|c| {
                CoordinationContract::try_from(c).map_err(|e| CrossError::Decode {
                    method: crosslink_rpc::methods::LIST_COORDINATION_CONTRACTS.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    // ── Key generation contract ──────────────────────────────────────────────

    /// Point future key generation rounds at the membership contract at
    /// `address`. A round already in flight keeps its membership.
    pub async fn set_key_generation_contract_address(&self, address: &Address) -> Result<(), CrossError> {
        self.client
            .execute(
                call::set_key_generation_contract_address(&address.to_hex()),
                &format!("key generation contract {address}"),
            )
            .await?;
        info!(%address, "key generation contract set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::ClientConfig;
    use serde_json::json;

    fn client(responses: Vec<Result<serde_json::Value, crosslink_core::RpcFailure>>) -> CrossClient<ScriptedTransport> {
        CrossClient::new(ScriptedTransport::new(responses), ClientConfig::default())
    }

    #[tokio::test]
    async fn malformed_endpoint_is_rejected_locally() {
        let c = client(vec![]);
        let err = c.registry().add_linked_node(BlockchainId(2), "no-port").await.unwrap_err();
        assert!(matches!(err, CrossError::InvalidParameter(_)));
        assert!(c.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn membership_snapshot_tracks_add_and_remove() {
        let c = client(vec![
            Ok(json!([{ "blockchainId": 1, "ipAddressAndPort": "10.0.0.1:8545" }])),
            Ok(json!(null)),
            Ok(json!(null)),
            Ok(json!(null)),
        ]);
        let registry = c.registry();
        registry.list_linked_nodes().await.unwrap();
        assert_eq!(c.membership_size(), Some(1));

        registry.add_linked_node(BlockchainId(2), "10.0.0.2:8545").await.unwrap();
        assert_eq!(c.membership_size(), Some(2));

        // Re-adding the same chain replaces its endpoint.
        registry.add_linked_node(BlockchainId(2), "10.0.0.9:8545").await.unwrap();
        assert_eq!(c.membership_size(), Some(2));

        registry.remove_linked_node(BlockchainId(1)).await.unwrap();
        assert_eq!(c.membership_size(), Some(1));
    }

    #[tokio::test]
    async fn addresses_travel_as_prefixed_hex() {
        let c = client(vec![Ok(json!(null))]);
        let address: Address = format!("0x{}", "ab".repeat(20)).parse().unwrap();
        c.registry()
            .add_coordination_contract(BlockchainId(5), &address, "10.0.0.5:8545")
            .await
            .unwrap();
        let (method, params) = c.transport().calls().remove(0);
        assert_eq!(method, "cross_addCoordinationContract");
        assert_eq!(params, vec![json!(5), json!(address.to_hex()), json!("10.0.0.5:8545")]);
    }

    #[tokio::test]
    async fn undecodable_contract_listing_is_decode_error() {
        let c = client(vec![Ok(json!([
            { "blockchainId": 5, "address": "0x01", "ipAddressAndPort": "h:1" }
        ]))]);
        let err = c.registry().list_coordination_contracts().await.unwrap_err();
        assert!(matches!(err, CrossError::Decode { .. }));
    }
}
