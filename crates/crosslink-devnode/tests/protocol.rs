//! End-to-end tests of the cross-chain client against a development node.
//!
//! Each test starts a dev node on an ephemeral loopback port and drives it
//! with the real HTTP transport.
//!
//! Run with:
//!   cargo test -p crosslink-devnode --test protocol

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::server::ServerHandle;

use crosslink_client::{ClientConfig, CrossClient};
use crosslink_core::{
    Address, Base64String, BlockParameter, BlockchainId, CrossError, KeyGenerationStatus, KeyVersion,
    SignedSubordinateView, ThresholdCryptoSystem,
};
use crosslink_devnode::privacy::PRIVACY_PRECOMPILE;
use crosslink_devnode::{views, DevNode, DevNodeConfig, DevNodeState};
use crosslink_rpc::HttpTransport;

const STEP_MS: u64 = 150;

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct Harness {
    client: CrossClient<HttpTransport>,
    state: Arc<DevNodeState>,
    url: String,
    _handle: ServerHandle,
}

fn connect(url: &str) -> CrossClient<HttpTransport> {
    CrossClient::connect(ClientConfig {
        url: url.to_string(),
        request_timeout_secs: 5,
        poll_interval_ms: 10,
        ..ClientConfig::default()
    })
    .expect("build client")
}

async fn start_node(auto_activate: bool) -> Harness {
    let config = DevNodeConfig {
        rpc_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        keygen_step_ms: STEP_MS,
        auto_activate,
    };
    let state = Arc::new(DevNodeState::new(&config));
    let (addr, handle) = DevNode::new(Arc::clone(&state))
        .start(config.rpc_addr)
        .await
        .expect("start dev node");

    let url = format!("http://{addr}");
    Harness { client: connect(&url), state, url, _handle: handle }
}

async fn link_three_nodes(h: &Harness) {
    let registry = h.client.registry();
    for i in 1..=3u64 {
        registry
            .add_linked_node(BlockchainId(i), &format!("10.0.0.{i}:8545"))
            .await
            .expect("add linked node");
    }
}

/// Start a 2-of-3 round and wait until it settles.
async fn generate_key(h: &Harness) -> (KeyVersion, KeyGenerationStatus) {
    let version = h
        .client
        .keygen()
        .start_threshold_key_generation(2, ThresholdCryptoSystem::AltBn128WithKeccak256)
        .await
        .expect("start key generation");
    let status = h
        .client
        .keygen()
        .wait_for_terminal(version, Duration::from_millis(10), Duration::from_secs(5))
        .await
        .expect("round settles");
    (version, status)
}

fn address(byte: u8) -> Address {
    Address([byte; 20])
}

fn signed(h: &Harness, data: Vec<u8>) -> SignedSubordinateView {
    let signature = h.state.sign_with_active_key(&data).expect("active key signs");
    SignedSubordinateView::from_bytes(&views::frame(&data, &signature))
}

fn rank(status: KeyGenerationStatus) -> u8 {
    match status {
        KeyGenerationStatus::NotStarted => 0,
        KeyGenerationStatus::InProgress => 1,
        _ => 2,
    }
}

// ── Key generation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_of_three_round_becomes_active_after_polling() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    let keygen = h.client.keygen();

    let version = keygen
        .start_threshold_key_generation(2, ThresholdCryptoSystem::AltBn128WithKeccak256)
        .await
        .unwrap();

    let mut observed = Vec::new();
    loop {
        let status = keygen.get_key_status(version).await.unwrap();
        if observed.last() != Some(&status) {
            observed.push(status);
        }
        if status.is_settled() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(observed.first(), Some(&KeyGenerationStatus::NotStarted));
    assert!(observed.contains(&KeyGenerationStatus::InProgress));
    assert_eq!(observed.last(), Some(&KeyGenerationStatus::Active));
    assert!(observed.windows(2).all(|w| rank(w[0]) <= rank(w[1])));

    assert_eq!(keygen.get_active_key_version().await.unwrap(), version);

    let active_key = keygen.get_blockchain_public_key(None).await.unwrap();
    let versioned_key = keygen.get_blockchain_public_key(Some(version)).await.unwrap();
    assert!(!active_key.is_empty());
    assert_eq!(active_key, versioned_key);

    assert!(keygen
        .get_key_gen_nodes_dropped_out_of_key_generation(version)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(keygen.get_key_active_nodes(version).await.unwrap().len(), 3);
}

#[tokio::test]
async fn oversized_threshold_starts_no_round() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;

    let err = h
        .client
        .keygen()
        .start_threshold_key_generation(4, ThresholdCryptoSystem::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CrossError::InvalidParameter(_)));

    // Version 1 would have been assigned to the rejected round.
    let status = h.client.keygen().get_key_status(KeyVersion(1)).await.unwrap();
    assert_eq!(status, KeyGenerationStatus::NotStarted);
}

#[tokio::test]
async fn nodes_linked_by_another_client_count_towards_the_threshold() {
    let h = start_node(true).await;
    let other = connect(&h.url);

    h.client
        .registry()
        .add_linked_node(BlockchainId(1), "10.0.0.1:8545")
        .await
        .unwrap();
    assert_eq!(h.client.registry().list_linked_nodes().await.unwrap().len(), 1);

    for i in 2..=3u64 {
        other
            .registry()
            .add_linked_node(BlockchainId(i), &format!("10.0.0.{i}:8545"))
            .await
            .unwrap();
    }

    let version = h
        .client
        .keygen()
        .start_threshold_key_generation(2, ThresholdCryptoSystem::default())
        .await
        .unwrap();
    assert_eq!(version, KeyVersion(1));
}

#[tokio::test]
async fn unstarted_versions_are_never_active() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    let (version, _) = generate_key(&h).await;

    for v in [version.0 + 1, version.0 + 10, 1_000] {
        let status = h.client.keygen().get_key_status(KeyVersion(v)).await.unwrap();
        assert_ne!(status, KeyGenerationStatus::Active);
    }
}

#[tokio::test]
async fn failed_round_reports_reason_and_dropped_nodes() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;

    assert!(matches!(
        h.client.keygen().get_active_key_version().await,
        Err(CrossError::NoActiveKey(_))
    ));

    h.state
        .fail_next_round("node 10.0.0.3:8545 stopped responding", vec!["10.0.0.3:8545".into()]);
    let version = h
        .client
        .keygen()
        .start_threshold_key_generation(2, ThresholdCryptoSystem::default())
        .await
        .unwrap();

    // Not failed (yet): no reason available.
    let err = h.client.keygen().get_key_gen_failure_reason(version).await.unwrap_err();
    assert!(matches!(err, CrossError::InvalidState(_)));

    let status = h
        .client
        .keygen()
        .wait_for_terminal(version, Duration::from_millis(10), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(status, KeyGenerationStatus::Failed);

    let reason = h.client.keygen().get_key_gen_failure_reason(version).await.unwrap();
    assert!(reason.contains("stopped responding"));

    let dropped = h
        .client
        .keygen()
        .get_key_gen_nodes_dropped_out_of_key_generation(version)
        .await
        .unwrap();
    assert_eq!(dropped.into_iter().collect::<Vec<_>>(), vec!["10.0.0.3:8545".to_string()]);

    assert!(matches!(
        h.client.keygen().activate_key(version).await,
        Err(CrossError::InvalidState(_))
    ));
}

#[tokio::test]
async fn failure_reason_of_active_round_is_invalid_state() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    let (version, status) = generate_key(&h).await;
    assert_eq!(status, KeyGenerationStatus::Active);

    let err = h.client.keygen().get_key_gen_failure_reason(version).await.unwrap_err();
    assert!(matches!(err, CrossError::InvalidState(_)));
}

#[tokio::test]
async fn manual_activation_and_supersession() {
    let h = start_node(false).await;
    link_three_nodes(&h).await;
    let keygen = h.client.keygen();

    let (v1, s1) = generate_key(&h).await;
    let (v2, s2) = generate_key(&h).await;
    assert_eq!((s1, s2), (KeyGenerationStatus::Generated, KeyGenerationStatus::Generated));
    assert!(matches!(keygen.get_active_key_version().await, Err(CrossError::NoActiveKey(_))));

    keygen.activate_key(v2).await.unwrap();
    assert_eq!(keygen.get_active_key_version().await.unwrap(), v2);
    assert_eq!(keygen.get_key_status(v2).await.unwrap(), KeyGenerationStatus::Active);

    // v1 is older than the active key: superseded.
    let err = keygen.activate_key(v1).await.unwrap_err();
    assert!(matches!(err, CrossError::InvalidState(m) if m.contains("superseded")));

    // Already active: not eligible either.
    assert!(matches!(keygen.activate_key(v2).await, Err(CrossError::InvalidState(_))));
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn removing_unknown_linked_node_is_a_no_op() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    let registry = h.client.registry();

    registry.remove_linked_node(BlockchainId(77)).await.unwrap();
    registry.remove_linked_node(BlockchainId(2)).await.unwrap();
    registry.remove_linked_node(BlockchainId(2)).await.unwrap();

    let ids: Vec<BlockchainId> = registry
        .list_linked_nodes()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.blockchain_id)
        .collect();
    assert_eq!(ids, vec![BlockchainId(1), BlockchainId(3)]);
}

#[tokio::test]
async fn coordination_contract_is_replaced_per_blockchain() {
    let h = start_node(true).await;
    let registry = h.client.registry();
    let id = BlockchainId(31);

    registry
        .add_coordination_contract(id, &address(0xa1), "10.1.0.1:8545")
        .await
        .unwrap();
    let listed = registry.list_coordination_contracts().await.unwrap();
    let for_id: Vec<_> = listed.iter().filter(|c| c.blockchain_id == id).collect();
    assert_eq!(for_id.len(), 1);
    assert_eq!((for_id[0].address, for_id[0].endpoint.as_str()), (address(0xa1), "10.1.0.1:8545"));

    registry
        .add_coordination_contract(id, &address(0xa2), "10.1.0.2:8545")
        .await
        .unwrap();
    let listed = registry.list_coordination_contracts().await.unwrap();
    let for_id: Vec<_> = listed.iter().filter(|c| c.blockchain_id == id).collect();
    assert_eq!(for_id.len(), 1);
    assert_eq!((for_id[0].address, for_id[0].endpoint.as_str()), (address(0xa2), "10.1.0.2:8545"));

    // Stale address does not remove the newer registration.
    let err = registry.remove_coordination_contract(id, &address(0xa1)).await.unwrap_err();
    assert!(matches!(err, CrossError::InvalidParameter(_)));
    registry.remove_coordination_contract(id, &address(0xa2)).await.unwrap();
    assert!(registry.list_coordination_contracts().await.unwrap().is_empty());
}

#[tokio::test]
async fn key_generation_contract_applies_to_future_rounds() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;

    let (before, _) = generate_key(&h).await;
    h.client
        .registry()
        .set_key_generation_contract_address(&address(0xcc))
        .await
        .unwrap();
    let (after, status) = generate_key(&h).await;
    // A key is already active, so the later round stops at GENERATED.
    assert_eq!(status, KeyGenerationStatus::Generated);

    assert_eq!(h.state.membership_contract(before).unwrap(), None);
    assert_eq!(h.state.membership_contract(after).unwrap(), Some(address(0xcc)));
}

// ── Locking and relay ─────────────────────────────────────────────────────────

#[tokio::test]
async fn subordinate_view_locks_address() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    let (version, _) = generate_key(&h).await;
    let locks = h.client.locks();
    let target = address(0x10);

    assert!(locks.is_lockable(&target, BlockParameter::Latest).await.unwrap());
    assert!(!locks.is_locked(&target, BlockParameter::Latest).await.unwrap());

    let receipt = locks
        .process_subordinate_view(&signed(&h, views::lock_view(&target)), Some(version))
        .await
        .unwrap();
    assert_eq!(receipt.key_version, version);
    assert!(!receipt.view_hash.is_empty());

    assert!(locks.is_locked(&target, BlockParameter::Latest).await.unwrap());
    assert!(!locks.is_lockable(&target, BlockParameter::Latest).await.unwrap());
    // The lock did not exist at genesis.
    assert!(!locks.is_locked(&target, BlockParameter::Earliest).await.unwrap());
    assert!(!locks.check_unlock(&target).await.unwrap());
}

#[tokio::test]
async fn forged_signature_is_rejected_without_state_change() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    generate_key(&h).await;
    let locks = h.client.locks();
    let target = address(0x20);

    let forged = SignedSubordinateView::from_bytes(&views::frame(&views::lock_view(&target), &[0xee; 32]));
    let err = locks.process_subordinate_view(&forged, None).await.unwrap_err();
    assert!(matches!(err, CrossError::VerificationFailed(_)));

    assert!(!locks.is_locked(&target, BlockParameter::Latest).await.unwrap());
    assert!(locks.is_lockable(&target, BlockParameter::Latest).await.unwrap());
}

#[tokio::test]
async fn view_outside_the_node_framing_is_invalid_parameter() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    generate_key(&h).await;

    let view = SignedSubordinateView::from_hex("0xf86b80843b9aca00").unwrap();
    let err = h.client.locks().process_subordinate_view(&view, None).await.unwrap_err();
    assert!(matches!(err, CrossError::InvalidParameter(m) if m.contains("framed")));
}

#[tokio::test]
async fn view_without_active_key_is_no_active_key() {
    let h = start_node(true).await;
    let view = SignedSubordinateView::from_bytes(&views::frame(&views::lock_view(&address(0x30)), &[1; 32]));
    let err = h.client.locks().process_subordinate_view(&view, None).await.unwrap_err();
    assert!(matches!(err, CrossError::NoActiveKey(_)));
}

#[tokio::test]
async fn unlock_proof_then_relay_releases_lock() {
    let h = start_node(true).await;
    link_three_nodes(&h).await;
    generate_key(&h).await;
    let locks = h.client.locks();
    let target = address(0x40);

    locks
        .process_subordinate_view(&signed(&h, views::lock_view(&target)), None)
        .await
        .unwrap();

    // Without the proof the unlock transaction is refused.
    let err = h
        .client
        .relay()
        .send_cross_chain_raw_transaction(&views::unlock_transaction(&target))
        .await
        .unwrap_err();
    assert!(matches!(err, CrossError::InvalidState(_)));

    locks
        .process_subordinate_view(&signed(&h, views::unlock_proof_view(&target)), None)
        .await
        .unwrap();
    assert!(locks.check_unlock(&target).await.unwrap());

    let tx_hash = h
        .client
        .relay()
        .send_cross_chain_raw_transaction(&views::unlock_transaction(&target))
        .await
        .unwrap();
    assert!(tx_hash.starts_with("0x"));
    assert_eq!(tx_hash.len(), 66);

    assert!(!locks.is_locked(&target, BlockParameter::Latest).await.unwrap());
    assert!(locks.is_lockable(&target, BlockParameter::Latest).await.unwrap());
}

#[tokio::test]
async fn policy_excluded_address_is_not_lockable() {
    let h = start_node(true).await;
    let target = address(0x50);
    h.state.exclude(target);
    assert!(!h.client.locks().is_lockable(&target, BlockParameter::Pending).await.unwrap());
}

#[tokio::test]
async fn future_block_number_is_invalid_parameter() {
    let h = start_node(true).await;
    let err = h
        .client
        .locks()
        .is_locked(&address(0x60), BlockParameter::Number(1_000_000))
        .await
        .unwrap_err();
    assert!(matches!(err, CrossError::InvalidParameter(_)));
}

// ── Privacy groups ────────────────────────────────────────────────────────────

#[tokio::test]
async fn privacy_group_lifecycle() {
    let h = start_node(true).await;
    let privacy = h.client.privacy();
    let members = vec![Base64String::from_bytes(vec![1; 32]), Base64String::from_bytes(vec![2; 32])];

    let id = privacy.create_privacy_group(&members, "ops", "operators").await.unwrap();
    let found = privacy.find_privacy_group(&members).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!((&found[0].id, found[0].name.as_str()), (&id, "ops"));
    assert_eq!(found[0].members, members);

    assert_eq!(privacy.get_transaction_count(&address(0x70), &id).await.unwrap(), 0);
    assert_eq!(privacy.get_privacy_precompile_address().await.unwrap(), PRIVACY_PRECOMPILE);

    assert!(privacy.delete_privacy_group(&id).await.unwrap());
    assert!(privacy.find_privacy_group(&members).await.unwrap().is_empty());
    let err = privacy.delete_privacy_group(&id).await.unwrap_err();
    assert!(matches!(err, CrossError::InvalidParameter(_)));
}

#[tokio::test]
async fn unknown_private_transaction_is_none() {
    let h = start_node(true).await;
    let hash = format!("0x{}", "ef".repeat(32));
    assert!(h.client.privacy().get_private_transaction(&hash).await.unwrap().is_none());
    assert!(h.client.privacy().get_transaction_receipt(&hash).await.unwrap().is_none());
}
