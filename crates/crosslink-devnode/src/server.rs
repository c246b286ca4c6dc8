use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use jsonrpsee::core::{async_trait, RpcResult};
use serde_json::Value;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tracing::{info, warn};

use crosslink_core::constants::ERR_INVALID_PARAMS;
use crosslink_core::encoding::{from_prefixed_hex, to_prefixed_hex};
use crosslink_core::{
    Address, Base64String, BlockParameter, BlockchainId, CoordinationContract, KeyGenerationStatus,
    KeyVersion, ThresholdCryptoSystem,
};
use crosslink_rpc::api::{CrossApiServer, PrivApiServer};
use crosslink_rpc::{
    RpcCoordinationContract, RpcCreatePrivacyGroupRequest, RpcLinkedNode, RpcPrivacyGroup,
    RpcSubordinateViewResult,
};

use crate::config::DevNodeConfig;
use crate::ledger::{Ledger, LedgerError};
use crate::privacy::{PrivacyGroups, PRIVACY_PRECOMPILE};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn ledger_err(method: &str, e: LedgerError) -> ErrorObject<'static> {
    warn!(method, error = %e, "request rejected");
    rpc_err(e.code(), e.to_string())
}

fn parse_address(s: &str) -> Result<Address, ErrorObject<'static>> {
    s.parse::<Address>()
        .map_err(|e| rpc_err(ERR_INVALID_PARAMS, e.to_string()))
}

fn parse_base64(s: &str) -> Result<Base64String, ErrorObject<'static>> {
    s.parse::<Base64String>()
        .map_err(|e| rpc_err(ERR_INVALID_PARAMS, e.to_string()))
}

/// Shared state behind the RPC server. Tests hold an `Arc` to it to sign
/// views or inject failures while the server runs.
pub struct DevNodeState {
    ledger: Mutex<Ledger>,
    privacy: Mutex<PrivacyGroups>,
}

impl DevNodeState {
    pub fn new(config: &DevNodeConfig) -> Self {
        Self {
            ledger: Mutex::new(Ledger::new(config)),
            privacy: Mutex::new(PrivacyGroups::default()),
        }
    }

    pub fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn privacy(&self) -> MutexGuard<'_, PrivacyGroups> {
        self.privacy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sign `data` with the currently active threshold key.
    pub fn sign_with_active_key(&self, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        self.ledger().sign_with_active_key(data, Instant::now())
    }

    /// Membership contract recorded for `version`; `None` when the round was
    /// started before any contract was set.
    pub fn membership_contract(&self, version: KeyVersion) -> Result<Option<Address>, LedgerError> {
        self.ledger().membership_contract(version)
    }

    pub fn fail_next_round(&self, reason: &str, dropped: Vec<String>) {
        self.ledger().fail_next_round(reason, dropped);
    }

    pub fn exclude(&self, address: Address) {
        self.ledger().exclude(address);
    }
}

/// The development node's RPC server.
#[derive(Clone)]
pub struct DevNode {
    state: Arc<DevNodeState>,
}

impl DevNode {
    pub fn new(state: Arc<DevNodeState>) -> Self {
        Self { state }
    }

    /// Start serving on `addr`. Returns the bound address (useful with port 0)
    /// and a handle to stop the server.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<(SocketAddr, ServerHandle)> {
        let server = Server::builder().build(addr).await?;
        let local_addr = server.local_addr()?;
        let mut module = CrossApiServer::into_rpc(self.clone());
        module.merge(PrivApiServer::into_rpc(self))?;
        let handle = server.start(module);
        info!(%local_addr, "cross-chain dev node RPC started");
        Ok((local_addr, handle))
    }
}

#[async_trait]
impl CrossApiServer for DevNode {
    // ── Threshold key generation ──────────────────────────────────────────────

    async fn start_threshold_key_generation(
        &self,
        threshold: u32,
        crypto_system: ThresholdCryptoSystem,
    ) -> RpcResult<u64> {
        self.state
            .ledger()
            .start_round(threshold, crypto_system, Instant::now())
            .map(|v| v.0)
            .map_err(|e| ledger_err("startThresholdKeyGeneration", e))
    }

    async fn get_key_status(&self, key_version: u64) -> RpcResult<KeyGenerationStatus> {
        Ok(self.state.ledger().status(KeyVersion(key_version), Instant::now()))
    }

    async fn get_key_gen_failure_reason(&self, key_version: u64) -> RpcResult<String> {
        self.state
            .ledger()
            .failure_reason(KeyVersion(key_version), Instant::now())
            .map_err(|e| ledger_err("getKeyGenFailureReason", e))
    }

    async fn get_key_gen_nodes_dropped_out_of_key_generation(
        &self,
        key_version: u64,
    ) -> RpcResult<Vec<String>> {
        self.state
            .ledger()
            .dropped_nodes(KeyVersion(key_version), Instant::now())
            .map_err(|e| ledger_err("getKeyGenNodesDroppedOutOfKeyGeneration", e))
    }

    async fn get_key_active_nodes(&self, key_version: u64) -> RpcResult<Vec<String>> {
        self.state
            .ledger()
            .active_nodes(KeyVersion(key_version), Instant::now())
            .map_err(|e| ledger_err("getKeyActiveNodes", e))
    }

    async fn get_active_key_version(&self) -> RpcResult<u64> {
        self.state
            .ledger()
            .active_version(Instant::now())
            .map(|v| v.0)
            .map_err(|e| ledger_err("getActiveKeyVersion", e))
    }

    async fn activate_key(&self, key_version: u64) -> RpcResult<()> {
        self.state
            .ledger()
            .activate(KeyVersion(key_version), Instant::now())
            .map_err(|e| ledger_err("activateKey", e))
    }

    async fn get_blockchain_public_key(&self, key_version: Option<u64>) -> RpcResult<String> {
        self.state
            .ledger()
            .public_key(key_version.map(KeyVersion), Instant::now())
            .map(|pk| to_prefixed_hex(&pk))
            .map_err(|e| ledger_err("getBlockchainPublicKey", e))
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    async fn add_linked_node(&self, blockchain_id: u64, ip_address_and_port: String) -> RpcResult<()> {
        crosslink_core::validate_endpoint(&ip_address_and_port)
            .map_err(|e| rpc_err(ERR_INVALID_PARAMS, e.to_string()))?;
        self.state
            .ledger()
            .add_linked_node(BlockchainId(blockchain_id), ip_address_and_port);
        Ok(())
    }

    async fn remove_linked_node(&self, blockchain_id: u64) -> RpcResult<()> {
        self.state.ledger().remove_linked_node(BlockchainId(blockchain_id));
        Ok(())
    }

    async fn list_linked_nodes(&self) -> RpcResult<Vec<RpcLinkedNode>> {
        Ok(self.state.ledger().linked_nodes().iter().map(RpcLinkedNode::from).collect())
    }

    async fn add_coordination_contract(
        &self,
        blockchain_id: u64,
        address: String,
        ip_address_and_port: String,
    ) -> RpcResult<()> {
        let address = parse_address(&address)?;
        crosslink_core::validate_endpoint(&ip_address_and_port)
            .map_err(|e| rpc_err(ERR_INVALID_PARAMS, e.to_string()))?;
        self.state.ledger().add_contract(CoordinationContract {
            blockchain_id: BlockchainId(blockchain_id),
            address,
            endpoint: ip_address_and_port,
        });
        Ok(())
    }

    async fn remove_coordination_contract(&self, blockchain_id: u64, address: String) -> RpcResult<()> {
        let address = parse_address(&address)?;
        self.state
            .ledger()
            .remove_contract(BlockchainId(blockchain_id), &address)
            .map_err(|e| ledger_err("removeCoordinationContract", e))
    }

    async fn list_coordination_contracts(&self) -> RpcResult<Vec<RpcCoordinationContract>> {
        Ok(self
            .state
            .ledger()
            .contracts()
            .iter()
            .map(RpcCoordinationContract::from)
            .collect())
    }

    async fn set_key_generation_contract_address(&self, address: String) -> RpcResult<()> {
        let address = parse_address(&address)?;
        self.state.ledger().set_keygen_contract(address);
        Ok(())
    }

    // ── Locking ───────────────────────────────────────────────────────────────

    async fn is_lockable(&self, address: String, block: BlockParameter) -> RpcResult<bool> {
        let address = parse_address(&address)?;
        self.state
            .ledger()
            .is_lockable(&address, block)
            .map_err(|e| ledger_err("isLockable", e))
    }

    async fn is_locked(&self, address: String, block: BlockParameter) -> RpcResult<bool> {
        let address = parse_address(&address)?;
        self.state
            .ledger()
            .is_locked(&address, block)
            .map_err(|e| ledger_err("isLocked", e))
    }

    async fn check_unlock(&self, address: String) -> RpcResult<bool> {
        let address = parse_address(&address)?;
        Ok(self.state.ledger().check_unlock(&address))
    }

    async fn process_subordinate_view(&self, signed_view_data: String) -> RpcResult<RpcSubordinateViewResult> {
        let view = from_prefixed_hex(&signed_view_data, "signed view")
            .map_err(|e| rpc_err(ERR_INVALID_PARAMS, e.to_string()))?;
        let (hash, version) = self
            .state
            .ledger()
            .process_view(&view, Instant::now())
            .map_err(|e| ledger_err("processSubordinateView", e))?;
        Ok(RpcSubordinateViewResult {
            view_hash: to_prefixed_hex(&hash),
            key_version: version.0,
        })
    }

    // ── Relay ─────────────────────────────────────────────────────────────────

    async fn send_cross_chain_raw_transaction(&self, signed_tx_data: String) -> RpcResult<String> {
        let tx = from_prefixed_hex(&signed_tx_data, "signed transaction")
            .map_err(|e| rpc_err(ERR_INVALID_PARAMS, e.to_string()))?;
        self.state
            .ledger()
            .submit_transaction(&tx)
            .map(|hash| to_prefixed_hex(&hash))
            .map_err(|e| ledger_err("sendCrossChainRawTransaction", e))
    }
}

#[async_trait]
impl PrivApiServer for DevNode {
    async fn get_transaction_count(&self, address: String, privacy_group_id: String) -> RpcResult<String> {
        let address = parse_address(&address)?;
        let group = parse_base64(&privacy_group_id)?;
        self.state
            .privacy()
            .transaction_count(&address, &group)
            .map(|n| format!("0x{n:x}"))
            .map_err(|e| ledger_err("priv_getTransactionCount", e))
    }

    async fn get_private_transaction(&self, _transaction_hash: String) -> RpcResult<Option<Value>> {
        Ok(None)
    }

    async fn get_privacy_precompile_address(&self) -> RpcResult<String> {
        Ok(PRIVACY_PRECOMPILE.to_hex())
    }

    async fn create_privacy_group(&self, options: RpcCreatePrivacyGroupRequest) -> RpcResult<String> {
        let members = options
            .addresses
            .iter()
            .map(|a| parse_base64(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.state
            .privacy()
            .create(members, options.name, options.description)
            .map(|id| id.to_base64())
            .map_err(|e| ledger_err("priv_createPrivacyGroup", e))
    }

    async fn find_privacy_group(&self, addresses: Vec<String>) -> RpcResult<Vec<RpcPrivacyGroup>> {
        let members = addresses
            .iter()
            .map(|a| parse_base64(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.state.privacy().find(&members).iter().map(RpcPrivacyGroup::from).collect())
    }

    async fn delete_privacy_group(&self, privacy_group_id: String) -> RpcResult<bool> {
        let group = parse_base64(&privacy_group_id)?;
        self.state
            .privacy()
            .delete(&group)
            .map(|()| true)
            .map_err(|e| ledger_err("priv_deletePrivacyGroup", e))
    }

    async fn get_transaction_receipt(&self, _transaction_hash: String) -> RpcResult<Option<Value>> {
        Ok(None)
    }
}
