use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{json, Value};
use tracing::debug;

use crosslink_core::{
    Base64String, BlockParameter, BlockchainId, CrossError, KeyGenerationStatus, KeyVersion,
    ThresholdCryptoSystem,
};

use crate::transport::Transport;
use crate::types::{
    RpcCoordinationContract, RpcLinkedNode, RpcPrivacyGroup, RpcSubordinateViewResult, TransactionTrace,
};

/// Fully qualified wire names. The `cross_*` and `priv_*` names must stay in
/// step with `api::CrossApi` and `api::PrivApi`.
pub mod methods {
    pub const START_THRESHOLD_KEY_GENERATION: &str = "cross_startThresholdKeyGeneration";
    pub const GET_KEY_STATUS: &str = "cross_getKeyStatus";
    pub const GET_KEY_GEN_FAILURE_REASON: &str = "cross_getKeyGenFailureReason";
    pub const GET_KEY_GEN_NODES_DROPPED_OUT_OF_KEY_GENERATION: &str =
        "cross_getKeyGenNodesDroppedOutOfKeyGeneration";
    pub const GET_KEY_ACTIVE_NODES: &str = "cross_getKeyActiveNodes";
    pub const GET_ACTIVE_KEY_VERSION: &str = "cross_getActiveKeyVersion";
    pub const ACTIVATE_KEY: &str = "cross_activateKey";
    pub const GET_BLOCKCHAIN_PUBLIC_KEY: &str = "cross_getBlockchainPublicKey";
    pub const ADD_LINKED_NODE: &str = "cross_addLinkedNode";
    pub const REMOVE_LINKED_NODE: &str = "cross_removeLinkedNode";
    pub const LIST_LINKED_NODES: &str = "cross_listLinkedNodes";
    pub const ADD_COORDINATION_CONTRACT: &str = "cross_addCoordinationContract";
    pub const REMOVE_COORDINATION_CONTRACT: &str = "cross_removeCoordinationContract";
    pub const LIST_COORDINATION_CONTRACTS: &str = "cross_listCoordinationContracts";
    pub const SET_KEY_GENERATION_CONTRACT_ADDRESS: &str = "cross_setKeyGenerationContractAddress";
    pub const IS_LOCKABLE: &str = "cross_isLockable";
    pub const IS_LOCKED: &str = "cross_isLocked";
    pub const CHECK_UNLOCK: &str = "cross_checkUnlock";
    pub const PROCESS_SUBORDINATE_VIEW: &str = "cross_processSubordinateView";
    pub const SEND_CROSS_CHAIN_RAW_TRANSACTION: &str = "cross_sendCrossChainRawTransaction";

    pub const PRIV_GET_TRANSACTION_COUNT: &str = "priv_getTransactionCount";
    pub const PRIV_GET_PRIVATE_TRANSACTION: &str = "priv_getPrivateTransaction";
    pub const PRIV_GET_PRIVACY_PRECOMPILE_ADDRESS: &str = "priv_getPrivacyPrecompileAddress";
    pub const PRIV_CREATE_PRIVACY_GROUP: &str = "priv_createPrivacyGroup";
    pub const PRIV_FIND_PRIVACY_GROUP: &str = "priv_findPrivacyGroup";
    pub const PRIV_DELETE_PRIVACY_GROUP: &str = "priv_deletePrivacyGroup";
    pub const PRIV_GET_TRANSACTION_RECEIPT: &str = "priv_getTransactionReceipt";

    pub const MINER_START: &str = "miner_start";
    pub const MINER_STOP: &str = "miner_stop";
    pub const DEBUG_TRACE_TRANSACTION: &str = "debug_traceTransaction";
}

/// A typed JSON-RPC call: method name, positional params and the result type
/// `T` the `result` field decodes into.
///
/// Idempotent calls (queries) may be retried by the caller after a transport
/// failure; mutating calls are marked non-idempotent and must not be.
pub struct RpcCall<T> {
    method: &'static str,
    params: Vec<Value>,
    idempotent: bool,
    _result: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for RpcCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcCall")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("idempotent", &self.idempotent)
            .finish()
    }
}

impl<T: DeserializeOwned> RpcCall<T> {
    fn query(method: &'static str, params: Vec<Value>) -> Self {
        Self { method, params, idempotent: true, _result: PhantomData }
    }

    fn mutation(method: &'static str, params: Vec<Value>) -> Self {
        Self { method, params, idempotent: false, _result: PhantomData }
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Decode a raw `result` payload.
    pub fn decode(&self, result: Value) -> Result<T, CrossError> {
        serde_json::from_value(result).map_err(|e| CrossError::Decode {
            method: self.method.to_string(),
            reason: e.to_string(),
        })
    }

    /// Execute once over `transport`. Remote errors come back unclassified as
    /// `CrossError::Rpc`; callers attach context with `CrossError::in_context`.
    pub async fn send<Tr: Transport + ?Sized>(&self, transport: &Tr) -> Result<T, CrossError> {
        debug!(method = self.method, params = self.params.len(), "rpc call");
        let result = transport.call(self.method, self.params.clone()).await?;
        self.decode(result)
    }
}

// ── Threshold key generation ─────────────────────────────────────────────────

pub fn start_threshold_key_generation(
    threshold: u32,
    crypto_system: ThresholdCryptoSystem,
) -> RpcCall<KeyVersion> {
    RpcCall::mutation(
        methods::START_THRESHOLD_KEY_GENERATION,
        vec![json!(threshold), json!(crypto_system)],
    )
}

pub fn get_key_status(version: KeyVersion) -> RpcCall<KeyGenerationStatus> {
    RpcCall::query(methods::GET_KEY_STATUS, vec![json!(version)])
}

pub fn get_key_gen_failure_reason(version: KeyVersion) -> RpcCall<String> {
    RpcCall::query(methods::GET_KEY_GEN_FAILURE_REASON, vec![json!(version)])
}

pub fn get_key_gen_nodes_dropped_out_of_key_generation(version: KeyVersion) -> RpcCall<Vec<String>> {
    RpcCall::query(
        methods::GET_KEY_GEN_NODES_DROPPED_OUT_OF_KEY_GENERATION,
        vec![json!(version)],
    )
}

pub fn get_key_active_nodes(version: KeyVersion) -> RpcCall<Vec<String>> {
    RpcCall::query(methods::GET_KEY_ACTIVE_NODES, vec![json!(version)])
}

pub fn get_active_key_version() -> RpcCall<KeyVersion> {
    RpcCall::query(methods::GET_ACTIVE_KEY_VERSION, vec![])
}

pub fn activate_key(version: KeyVersion) -> RpcCall<()> {
    RpcCall::mutation(methods::ACTIVATE_KEY, vec![json!(version)])
}

/// `None` sends no parameter, asking for the active key.
pub fn get_blockchain_public_key(version: Option<KeyVersion>) -> RpcCall<String> {
    let params = version.map(|v| vec![json!(v)]).unwrap_or_default();
    RpcCall::query(methods::GET_BLOCKCHAIN_PUBLIC_KEY, params)
}

// ── Registry ─────────────────────────────────────────────────────────────────

pub fn add_linked_node(blockchain_id: BlockchainId, endpoint: &str) -> RpcCall<()> {
    RpcCall::mutation(methods::ADD_LINKED_NODE, vec![json!(blockchain_id), json!(endpoint)])
}

pub fn remove_linked_node(blockchain_id: BlockchainId) -> RpcCall<()> {
    RpcCall::mutation(methods::REMOVE_LINKED_NODE, vec![json!(blockchain_id)])
}

pub fn list_linked_nodes() -> RpcCall<Vec<RpcLinkedNode>> {
    RpcCall::query(methods::LIST_LINKED_NODES, vec![])
}

pub fn add_coordination_contract(
    blockchain_id: BlockchainId,
    address: &str,
    endpoint: &str,
) -> RpcCall<()> {
    RpcCall::mutation(
        methods::ADD_COORDINATION_CONTRACT,
        vec![json!(blockchain_id), json!(address), json!(endpoint)],
    )
}

pub fn remove_coordination_contract(blockchain_id: BlockchainId, address: &str) -> RpcCall<()> {
    RpcCall::mutation(
        methods::REMOVE_COORDINATION_CONTRACT,
        vec![json!(blockchain_id), json!(address)],
    )
}

pub fn list_coordination_contracts() -> RpcCall<Vec<RpcCoordinationContract>> {
    RpcCall::query(methods::LIST_COORDINATION_CONTRACTS, vec![])
}

pub fn set_key_generation_contract_address(address: &str) -> RpcCall<()> {
    RpcCall::mutation(methods::SET_KEY_GENERATION_CONTRACT_ADDRESS, vec![json!(address)])
}

// ── Locking ──────────────────────────────────────────────────────────────────

pub fn is_lockable(address: &str, block: BlockParameter) -> RpcCall<bool> {
    RpcCall::query(methods::IS_LOCKABLE, vec![json!(address), json!(block)])
}

pub fn is_locked(address: &str, block: BlockParameter) -> RpcCall<bool> {
    RpcCall::query(methods::IS_LOCKED, vec![json!(address), json!(block)])
}

pub fn check_unlock(address: &str) -> RpcCall<bool> {
    RpcCall::query(methods::CHECK_UNLOCK, vec![json!(address)])
}

pub fn process_subordinate_view(signed_view_data: &str) -> RpcCall<RpcSubordinateViewResult> {
    RpcCall::mutation(methods::PROCESS_SUBORDINATE_VIEW, vec![json!(signed_view_data)])
}

// ── Relay ────────────────────────────────────────────────────────────────────

pub fn send_cross_chain_raw_transaction(signed_tx_data: &str) -> RpcCall<String> {
    RpcCall::mutation(methods::SEND_CROSS_CHAIN_RAW_TRANSACTION, vec![json!(signed_tx_data)])
}

// ── Private transactions ─────────────────────────────────────────────────────

/// Result is a `0x` hex quantity.
pub fn priv_get_transaction_count(address: &str, privacy_group_id: &Base64String) -> RpcCall<String> {
    RpcCall::query(
        methods::PRIV_GET_TRANSACTION_COUNT,
        vec![json!(address), json!(privacy_group_id)],
    )
}

/// `None` when the node holds no private payload for `tx_hash`.
pub fn priv_get_private_transaction(tx_hash: &str) -> RpcCall<Option<Value>> {
    RpcCall::query(methods::PRIV_GET_PRIVATE_TRANSACTION, vec![json!(tx_hash)])
}

pub fn priv_get_privacy_precompile_address() -> RpcCall<String> {
    RpcCall::query(methods::PRIV_GET_PRIVACY_PRECOMPILE_ADDRESS, vec![])
}

/// Sent as a single options object. Returns the new group id.
pub fn priv_create_privacy_group(
    addresses: &[Base64String],
    name: &str,
    description: &str,
) -> RpcCall<String> {
    RpcCall::mutation(
        methods::PRIV_CREATE_PRIVACY_GROUP,
        vec![json!({ "addresses": addresses, "name": name, "description": description })],
    )
}

pub fn priv_find_privacy_group(addresses: &[Base64String]) -> RpcCall<Vec<RpcPrivacyGroup>> {
    RpcCall::query(methods::PRIV_FIND_PRIVACY_GROUP, vec![json!(addresses)])
}

pub fn priv_delete_privacy_group(privacy_group_id: &Base64String) -> RpcCall<bool> {
    RpcCall::mutation(methods::PRIV_DELETE_PRIVACY_GROUP, vec![json!(privacy_group_id)])
}

pub fn priv_get_transaction_receipt(tx_hash: &str) -> RpcCall<Option<Value>> {
    RpcCall::query(methods::PRIV_GET_TRANSACTION_RECEIPT, vec![json!(tx_hash)])
}

// ── Node operation ───────────────────────────────────────────────────────────

/// Nodes disagree on what `miner_start` returns; the result is not read.
pub fn miner_start() -> RpcCall<IgnoredAny> {
    RpcCall::mutation(methods::MINER_START, vec![])
}

pub fn miner_stop() -> RpcCall<bool> {
    RpcCall::mutation(methods::MINER_STOP, vec![])
}

/// `options` toggles trace sections, e.g. `disableStorage`.
pub fn debug_trace_transaction(tx_hash: &str, options: &BTreeMap<String, bool>) -> RpcCall<TransactionTrace> {
    RpcCall::query(methods::DEBUG_TRACE_TRANSACTION, vec![json!(tx_hash), json!(options)])
}
