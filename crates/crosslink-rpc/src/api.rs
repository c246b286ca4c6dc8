use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crosslink_core::{BlockParameter, KeyGenerationStatus, ThresholdCryptoSystem};

use crate::types::{
    RpcCoordinationContract, RpcCreatePrivacyGroupRequest, RpcLinkedNode, RpcPrivacyGroup,
    RpcSubordinateViewResult,
};

/// Cross-chain JSON-RPC API definition.
///
/// All method names are prefixed with "cross_" via `namespace = "cross"`.
/// Byte payloads travel as `0x` hex strings; key versions and blockchain ids
/// as JSON numbers.
#[rpc(server, namespace = "cross")]
pub trait CrossApi {
    // ── Threshold key generation ──────────────────────────────────────────────

    /// Start a key generation round. Returns the new key version.
    #[method(name = "startThresholdKeyGeneration")]
    async fn start_threshold_key_generation(
        &self,
        threshold: u32,
        crypto_system: ThresholdCryptoSystem,
    ) -> RpcResult<u64>;

    #[method(name = "getKeyStatus")]
    async fn get_key_status(&self, key_version: u64) -> RpcResult<KeyGenerationStatus>;

    /// Only valid for a FAILED round.
    #[method(name = "getKeyGenFailureReason")]
    async fn get_key_gen_failure_reason(&self, key_version: u64) -> RpcResult<String>;

    #[method(name = "getKeyGenNodesDroppedOutOfKeyGeneration")]
    async fn get_key_gen_nodes_dropped_out_of_key_generation(
        &self,
        key_version: u64,
    ) -> RpcResult<Vec<String>>;

    /// Nodes holding a share of the key for `key_version`.
    #[method(name = "getKeyActiveNodes")]
    async fn get_key_active_nodes(&self, key_version: u64) -> RpcResult<Vec<String>>;

    #[method(name = "getActiveKeyVersion")]
    async fn get_active_key_version(&self) -> RpcResult<u64>;

    #[method(name = "activateKey")]
    async fn activate_key(&self, key_version: u64) -> RpcResult<()>;

    /// Public key of `key_version`, or of the active key when omitted.
    #[method(name = "getBlockchainPublicKey")]
    async fn get_blockchain_public_key(&self, key_version: Option<u64>) -> RpcResult<String>;

    // ── Registry ──────────────────────────────────────────────────────────────

    #[method(name = "addLinkedNode")]
    async fn add_linked_node(&self, blockchain_id: u64, ip_address_and_port: String) -> RpcResult<()>;

    /// Removing an unknown blockchain id succeeds.
    #[method(name = "removeLinkedNode")]
    async fn remove_linked_node(&self, blockchain_id: u64) -> RpcResult<()>;

    #[method(name = "listLinkedNodes")]
    async fn list_linked_nodes(&self) -> RpcResult<Vec<RpcLinkedNode>>;

    /// Replaces any contract already registered for `blockchain_id`.
    #[method(name = "addCoordinationContract")]
    async fn add_coordination_contract(
        &self,
        blockchain_id: u64,
        address: String,
        ip_address_and_port: String,
    ) -> RpcResult<()>;

    #[method(name = "removeCoordinationContract")]
    async fn remove_coordination_contract(&self, blockchain_id: u64, address: String) -> RpcResult<()>;

    #[method(name = "listCoordinationContracts")]
    async fn list_coordination_contracts(&self) -> RpcResult<Vec<RpcCoordinationContract>>;

    #[method(name = "setKeyGenerationContractAddress")]
    async fn set_key_generation_contract_address(&self, address: String) -> RpcResult<()>;

    // ── Locking ───────────────────────────────────────────────────────────────

    #[method(name = "isLockable")]
    async fn is_lockable(&self, address: String, block: BlockParameter) -> RpcResult<bool>;

    #[method(name = "isLocked")]
    async fn is_locked(&self, address: String, block: BlockParameter) -> RpcResult<bool>;

    /// Evaluated against the latest state only.
    #[method(name = "checkUnlock")]
    async fn check_unlock(&self, address: String) -> RpcResult<bool>;

    #[method(name = "processSubordinateView")]
    async fn process_subordinate_view(
        &self,
        signed_view_data: String,
    ) -> RpcResult<RpcSubordinateViewResult>;

    // ── Relay ─────────────────────────────────────────────────────────────────

    /// Returns the transaction hash.
    #[method(name = "sendCrossChainRawTransaction")]
    async fn send_cross_chain_raw_transaction(&self, signed_tx_data: String) -> RpcResult<String>;
}

/// Private transaction API: the `priv_*` methods a node serves next to
/// `cross_*`. Group ids and enclave keys travel as base64 strings.
#[rpc(server, namespace = "priv")]
pub trait PrivApi {
    /// Hex quantity of private transactions `address` sent within the group.
    #[method(name = "getTransactionCount")]
    async fn get_transaction_count(&self, address: String, privacy_group_id: String) -> RpcResult<String>;

    #[method(name = "getPrivateTransaction")]
    async fn get_private_transaction(&self, transaction_hash: String) -> RpcResult<Option<serde_json::Value>>;

    #[method(name = "getPrivacyPrecompileAddress")]
    async fn get_privacy_precompile_address(&self) -> RpcResult<String>;

    /// Returns the id of the new group.
    #[method(name = "createPrivacyGroup")]
    async fn create_privacy_group(&self, options: RpcCreatePrivacyGroupRequest) -> RpcResult<String>;

    /// Groups whose members are exactly `addresses`.
    #[method(name = "findPrivacyGroup")]
    async fn find_privacy_group(&self, addresses: Vec<String>) -> RpcResult<Vec<RpcPrivacyGroup>>;

    #[method(name = "deletePrivacyGroup")]
    async fn delete_privacy_group(&self, privacy_group_id: String) -> RpcResult<bool>;

    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, transaction_hash: String) -> RpcResult<Option<serde_json::Value>>;
}
