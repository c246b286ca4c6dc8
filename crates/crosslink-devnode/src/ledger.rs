use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crosslink_core::constants::{
    ERR_INVALID_PARAMS, ERR_INVALID_STATE, ERR_NO_ACTIVE_KEY, ERR_VERIFICATION_FAILED,
};
use crosslink_core::{
    Address, BlockParameter, BlockchainId, CoordinationContract, KeyGenerationStatus, KeyVersion,
    LinkedNode, ThresholdCryptoSystem,
};

use crate::config::DevNodeConfig;
use crate::views::{self, Directive};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{0}")]
    InvalidParams(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("no threshold key is active")]
    NoActiveKey,

    #[error("{0}")]
    VerificationFailed(String),
}

impl LedgerError {
    /// JSON-RPC error code reported to clients.
    pub fn code(&self) -> i32 {
        match self {
            LedgerError::InvalidParams(_) => ERR_INVALID_PARAMS,
            LedgerError::InvalidState(_) => ERR_INVALID_STATE,
            LedgerError::NoActiveKey => ERR_NO_ACTIVE_KEY,
            LedgerError::VerificationFailed(_) => ERR_VERIFICATION_FAILED,
        }
    }
}

// ── Key generation rounds ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Outcome {
    Success { secret: [u8; 32] },
    Failure { reason: String, dropped: Vec<String> },
}

#[derive(Debug, Clone)]
struct KeyRound {
    threshold: u32,
    crypto_system: ThresholdCryptoSystem,
    participants: Vec<String>,
    membership_contract: Option<Address>,
    started: Instant,
    started_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    outcome: Outcome,
}

/// Failure to inject into the next round started.
#[derive(Debug, Clone)]
struct InjectedFailure {
    reason: String,
    dropped: Vec<String>,
}

// ── Locks ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct LockRecord {
    /// (block height, locked) in ascending height order.
    history: Vec<(u64, bool)>,
    unlock_proof: bool,
}

impl LockRecord {
    fn locked_at(&self, height: u64) -> bool {
        self.history
            .iter()
            .rev()
            .find(|(h, _)| *h <= height)
            .map(|(_, locked)| *locked)
            .unwrap_or(false)
    }
}

/// All state of the development node.
///
/// Key generation progresses with wall-clock time: each round spends one
/// `keygen_step` NOT_STARTED, one IN_PROGRESS, then settles. Lock changes
/// each mint a new block so historical block parameters stay meaningful.
pub struct Ledger {
    keygen_step: Duration,
    auto_activate: bool,

    linked_nodes: BTreeMap<BlockchainId, String>,
    contracts: BTreeMap<BlockchainId, CoordinationContract>,
    keygen_contract: Option<Address>,

    rounds: BTreeMap<KeyVersion, KeyRound>,
    next_version: u64,
    active: Option<KeyVersion>,
    injected_failure: Option<InjectedFailure>,

    height: u64,
    block_hashes: HashMap<[u8; 32], u64>,
    locks: HashMap<Address, LockRecord>,
    excluded: HashSet<Address>,
    transactions: Vec<[u8; 32]>,
}

impl Ledger {
    pub fn new(config: &DevNodeConfig) -> Self {
        let mut ledger = Self {
            keygen_step: config.keygen_step(),
            auto_activate: config.auto_activate,
            linked_nodes: BTreeMap::new(),
            contracts: BTreeMap::new(),
            keygen_contract: None,
            rounds: BTreeMap::new(),
            next_version: 1,
            active: None,
            injected_failure: None,
            height: 0,
            block_hashes: HashMap::new(),
            locks: HashMap::new(),
            excluded: HashSet::new(),
            transactions: Vec::new(),
        };
        ledger.block_hashes.insert(block_hash(0), 0);
        ledger
    }

    // ── Key generation ───────────────────────────────────────────────────────

    pub fn start_round(
        &mut self,
        threshold: u32,
        crypto_system: ThresholdCryptoSystem,
        now: Instant,
    ) -> Result<KeyVersion, LedgerError> {
        let participants: Vec<String> = self.linked_nodes.values().cloned().collect();
        if threshold == 0 || threshold as usize > participants.len() {
            return Err(LedgerError::InvalidParams(format!(
                "threshold {threshold} outside 1..={}",
                participants.len()
            )));
        }

        let version = KeyVersion(self.next_version);
        self.next_version += 1;

        let outcome = match self.injected_failure.take() {
            Some(f) => Outcome::Failure { reason: f.reason, dropped: f.dropped },
            None => Outcome::Success { secret: rand::random::<[u8; 32]>() },
        };
        let round = KeyRound {
            threshold,
            crypto_system,
            participants,
            membership_contract: self.keygen_contract,
            started: now,
            started_at: Utc::now(),
            activated_at: None,
            outcome,
        };
        info!(
            %version,
            threshold,
            participants = round.participants.len(),
            crypto_system = ?round.crypto_system,
            started_at = %round.started_at,
            "key generation round started"
        );
        self.rounds.insert(version, round);
        Ok(version)
    }

    pub fn status(&mut self, version: KeyVersion, now: Instant) -> KeyGenerationStatus {
        self.settle(now);
        self.status_of(version, now)
    }

    pub fn failure_reason(&mut self, version: KeyVersion, now: Instant) -> Result<String, LedgerError> {
        self.settle(now);
        match (self.status_of(version, now), self.rounds.get(&version).map(|r| &r.outcome)) {
            (KeyGenerationStatus::Failed, Some(Outcome::Failure { reason, .. })) => Ok(reason.clone()),
            (status, _) => Err(LedgerError::InvalidState(format!(
                "key version {version} is {status}, not FAILED"
            ))),
        }
    }

    pub fn dropped_nodes(&mut self, version: KeyVersion, now: Instant) -> Result<Vec<String>, LedgerError> {
        self.settle(now);
        let round = self.round(version)?;
        match (&round.outcome, self.status_of(version, now)) {
            (Outcome::Failure { dropped, .. }, KeyGenerationStatus::Failed) => Ok(dropped.clone()),
            _ => Ok(Vec::new()),
        }
    }

    pub fn active_nodes(&mut self, version: KeyVersion, now: Instant) -> Result<Vec<String>, LedgerError> {
        self.settle(now);
        match self.status_of(version, now) {
            KeyGenerationStatus::Generated | KeyGenerationStatus::Active => {
                Ok(self.round(version)?.participants.clone())
            }
            status => Err(LedgerError::InvalidState(format!(
                "key version {version} is {status}; no key shares exist"
            ))),
        }
    }

    pub fn active_version(&mut self, now: Instant) -> Result<KeyVersion, LedgerError> {
        self.settle(now);
        self.active.ok_or(LedgerError::NoActiveKey)
    }

    pub fn activate(&mut self, version: KeyVersion, now: Instant) -> Result<(), LedgerError> {
        self.settle(now);
        let status = self.status_of(version, now);
        if status != KeyGenerationStatus::Generated {
            return Err(LedgerError::InvalidState(format!(
                "key version {version} is {status}; only GENERATED keys can be activated"
            )));
        }
        if let Some(active) = self.active {
            if version < active {
                return Err(LedgerError::InvalidState(format!(
                    "key version {version} is superseded by active version {active}"
                )));
            }
        }
        self.mark_active(version);
        Ok(())
    }

    pub fn public_key(&mut self, version: Option<KeyVersion>, now: Instant) -> Result<Vec<u8>, LedgerError> {
        self.settle(now);
        let version = match version {
            Some(v) => v,
            None => self.active.ok_or(LedgerError::NoActiveKey)?,
        };
        match (&self.round(version)?.outcome, self.status_of(version, now)) {
            (Outcome::Success { secret }, KeyGenerationStatus::Generated | KeyGenerationStatus::Active) => {
                Ok(views::public_key(secret))
            }
            (_, status) => Err(LedgerError::InvalidState(format!(
                "key version {version} is {status}; no public key"
            ))),
        }
    }

    /// Make the next started round fail with `reason`, reporting `dropped`.
    pub fn fail_next_round(&mut self, reason: &str, dropped: Vec<String>) {
        self.injected_failure = Some(InjectedFailure { reason: reason.to_string(), dropped });
    }

    /// Sign `data` with the active key, as the subordinate chain's node set
    /// would.
    pub fn sign_with_active_key(&mut self, data: &[u8], now: Instant) -> Result<Vec<u8>, LedgerError> {
        let version = self.active_version(now)?;
        match &self.round(version)?.outcome {
            Outcome::Success { secret } => Ok(views::sign(secret, data)),
            Outcome::Failure { .. } => Err(LedgerError::NoActiveKey),
        }
    }

    fn round(&self, version: KeyVersion) -> Result<&KeyRound, LedgerError> {
        self.rounds
            .get(&version)
            .ok_or_else(|| LedgerError::InvalidState(format!("key version {version} was never started")))
    }

    fn status_of(&self, version: KeyVersion, now: Instant) -> KeyGenerationStatus {
        let Some(round) = self.rounds.get(&version) else {
            return KeyGenerationStatus::NotStarted;
        };
        let elapsed = now.saturating_duration_since(round.started);
        if elapsed < self.keygen_step {
            return KeyGenerationStatus::NotStarted;
        }
        if elapsed < self.keygen_step * 2 {
            return KeyGenerationStatus::InProgress;
        }
        match round.outcome {
            Outcome::Failure { .. } => KeyGenerationStatus::Failed,
            Outcome::Success { .. } if round.activated_at.is_some() => KeyGenerationStatus::Active,
            Outcome::Success { .. } => KeyGenerationStatus::Generated,
        }
    }

    /// Auto-activate the oldest generated key while none is active.
    fn settle(&mut self, now: Instant) {
        if !self.auto_activate || self.active.is_some() {
            return;
        }
        let candidate = self
            .rounds
            .keys()
            .copied()
            .find(|v| self.status_of(*v, now) == KeyGenerationStatus::Generated);
        if let Some(version) = candidate {
            self.mark_active(version);
        }
    }

    fn mark_active(&mut self, version: KeyVersion) {
        if let Some(round) = self.rounds.get_mut(&version) {
            round.activated_at = Some(Utc::now());
            info!(
                %version,
                threshold = round.threshold,
                membership_contract = ?round.membership_contract,
                "threshold key activated"
            );
        }
        self.active = Some(version);
    }

    // ── Registry ─────────────────────────────────────────────────────────────

    pub fn add_linked_node(&mut self, blockchain_id: BlockchainId, endpoint: String) {
        self.linked_nodes.insert(blockchain_id, endpoint);
    }

    /// Unknown ids are a no-op.
    pub fn remove_linked_node(&mut self, blockchain_id: BlockchainId) {
        self.linked_nodes.remove(&blockchain_id);
    }

    pub fn linked_nodes(&self) -> Vec<LinkedNode> {
        self.linked_nodes
            .iter()
            .map(|(id, endpoint)| LinkedNode { blockchain_id: *id, endpoint: endpoint.clone() })
            .collect()
    }

    /// Replaces any contract registered for the same blockchain.
    pub fn add_contract(&mut self, contract: CoordinationContract) {
        self.contracts.insert(contract.blockchain_id, contract);
    }

    /// Unknown ids are a no-op; a known id with a different address is
    /// rejected so a stale caller cannot drop a newer registration.
    pub fn remove_contract(&mut self, blockchain_id: BlockchainId, address: &Address) -> Result<(), LedgerError> {
        match self.contracts.get(&blockchain_id) {
            None => Ok(()),
            Some(c) if c.address == *address => {
                self.contracts.remove(&blockchain_id);
                Ok(())
            }
            Some(c) => Err(LedgerError::InvalidParams(format!(
                "blockchain {blockchain_id} is coordinated by {}, not {address}",
                c.address
            ))),
        }
    }

    pub fn contracts(&self) -> Vec<CoordinationContract> {
        self.contracts.values().cloned().collect()
    }

    /// Recorded on rounds started from now on.
    pub fn set_keygen_contract(&mut self, address: Address) {
        self.keygen_contract = Some(address);
    }

    /// Membership contract captured when `version` was started.
    pub fn membership_contract(&self, version: KeyVersion) -> Result<Option<Address>, LedgerError> {
        Ok(self.round(version)?.membership_contract)
    }

    // ── Locks ────────────────────────────────────────────────────────────────

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Hash the node reports for block `height`.
    pub fn block_hash_at(&self, height: u64) -> [u8; 32] {
        block_hash(height)
    }

    /// Keep `address` permanently unlockable by policy.
    pub fn exclude(&mut self, address: Address) {
        self.excluded.insert(address);
    }

    pub fn is_locked(&self, address: &Address, block: BlockParameter) -> Result<bool, LedgerError> {
        let height = self.resolve(block)?;
        Ok(self.locks.get(address).is_some_and(|r| r.locked_at(height)))
    }

    pub fn is_lockable(&self, address: &Address, block: BlockParameter) -> Result<bool, LedgerError> {
        Ok(!self.excluded.contains(address) && !self.is_locked(address, block)?)
    }

    pub fn check_unlock(&self, address: &Address) -> bool {
        self.locks
            .get(address)
            .is_some_and(|r| r.unlock_proof && r.locked_at(self.height))
    }

    /// Verify `view` against the active key and apply its directive.
    /// Nothing changes unless verification succeeds.
    pub fn process_view(
        &mut self,
        framed: &[u8],
        now: Instant,
    ) -> Result<([u8; 32], KeyVersion), LedgerError> {
        let (data, signature) = views::split_frame(framed)
            .ok_or_else(|| LedgerError::InvalidParams("signed view is not a framed view".into()))?;
        let version = self.active_version(now)?;
        let expected = self.sign_with_active_key(data, now)?;
        if expected != signature {
            return Err(LedgerError::VerificationFailed(format!(
                "signature does not verify under key version {version}"
            )));
        }

        match views::parse_directive(data) {
            Some(Directive::Lock(address)) => {
                if !self.is_lockable(&address, BlockParameter::Latest)? {
                    return Err(LedgerError::InvalidState(format!("{address} is not lockable")));
                }
                let height = self.advance_block();
                self.locks.entry(address).or_default().history.push((height, true));
                info!(%address, height, "address locked");
            }
            Some(Directive::UnlockProof(address)) => {
                let head = self.height;
                let record = self
                    .locks
                    .get_mut(&address)
                    .filter(|r| r.locked_at(head))
                    .ok_or_else(|| LedgerError::InvalidState(format!("{address} is not locked")))?;
                record.unlock_proof = true;
                info!(%address, "unlock proof recorded");
            }
            Some(Directive::UnlockTx(_)) | None => {
                return Err(LedgerError::InvalidParams("view carries no lock directive".into()));
            }
        }

        Ok((*blake3::hash(framed).as_bytes(), version))
    }

    /// Accept a signed cross-chain transaction. An unlock transaction for an
    /// address whose unlock proof is recorded releases its lock.
    pub fn submit_transaction(&mut self, tx: &[u8]) -> Result<[u8; 32], LedgerError> {
        if tx.is_empty() {
            return Err(LedgerError::InvalidParams("empty transaction".into()));
        }
        if let Some(Directive::UnlockTx(address)) = views::parse_directive(tx) {
            if !self.check_unlock(&address) {
                return Err(LedgerError::InvalidState(format!(
                    "unlock conditions for {address} are not satisfied"
                )));
            }
            let height = self.advance_block();
            if let Some(record) = self.locks.get_mut(&address) {
                record.history.push((height, false));
                record.unlock_proof = false;
            }
            info!(%address, height, "address unlocked");
        }
        let hash = *blake3::hash(tx).as_bytes();
        self.transactions.push(hash);
        debug!(tx_hash = %hex::encode(hash), pool = self.transactions.len(), "transaction accepted");
        Ok(hash)
    }

    fn advance_block(&mut self) -> u64 {
        self.height += 1;
        self.block_hashes.insert(block_hash(self.height), self.height);
        self.height
    }

    fn resolve(&self, block: BlockParameter) -> Result<u64, LedgerError> {
        match block {
            BlockParameter::Latest | BlockParameter::Pending => Ok(self.height),
            BlockParameter::Earliest => Ok(0),
            BlockParameter::Number(n) if n <= self.height => Ok(n),
            BlockParameter::Number(n) => Err(LedgerError::InvalidParams(format!(
                "block {n} is beyond head {}",
                self.height
            ))),
            BlockParameter::Hash(h) => self
                .block_hashes
                .get(&h)
                .copied()
                .ok_or_else(|| LedgerError::InvalidParams(format!("unknown block hash 0x{}", hex::encode(h)))),
        }
    }
}

fn block_hash(height: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"crosslink-devnode block");
    hasher.update(&height.to_be_bytes());
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(100);

    fn ledger(auto_activate: bool) -> Ledger {
        let config = DevNodeConfig { keygen_step_ms: 100, auto_activate, ..DevNodeConfig::default() };
        let mut l = Ledger::new(&config);
        for i in 1..=3u64 {
            l.add_linked_node(BlockchainId(i), format!("10.0.0.{i}:8545"));
        }
        l
    }

    fn start(l: &mut Ledger, t0: Instant) -> KeyVersion {
        l.start_round(2, ThresholdCryptoSystem::default(), t0).unwrap()
    }

    #[test]
    fn round_progresses_with_time_and_auto_activates() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        let v = start(&mut l, t0);

        assert_eq!(l.status(v, t0), KeyGenerationStatus::NotStarted);
        assert_eq!(l.status(v, t0 + STEP), KeyGenerationStatus::InProgress);
        assert_eq!(l.status(v, t0 + STEP * 2), KeyGenerationStatus::Active);
        assert_eq!(l.active_version(t0 + STEP * 2).unwrap(), v);
    }

    #[test]
    fn threshold_is_bounded_by_linked_nodes() {
        let mut l = ledger(true);
        let now = Instant::now();
        assert!(matches!(
            l.start_round(4, ThresholdCryptoSystem::default(), now),
            Err(LedgerError::InvalidParams(_))
        ));
        assert!(l.start_round(0, ThresholdCryptoSystem::default(), now).is_err());
    }

    #[test]
    fn unknown_versions_report_not_started() {
        let mut l = ledger(true);
        assert_eq!(l.status(KeyVersion(42), Instant::now()), KeyGenerationStatus::NotStarted);
    }

    #[test]
    fn later_round_needs_explicit_activation_and_older_one_is_superseded() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        let v1 = start(&mut l, t0);
        let v2 = start(&mut l, t0);
        let v3 = start(&mut l, t0);
        let done = t0 + STEP * 2;

        assert_eq!(l.status(v1, done), KeyGenerationStatus::Active);
        assert_eq!(l.status(v2, done), KeyGenerationStatus::Generated);

        l.activate(v3, done).unwrap();
        assert_eq!(l.active_version(done).unwrap(), v3);
        assert!(matches!(l.activate(v2, done), Err(LedgerError::InvalidState(m)) if m.contains("superseded")));
        // v1 keeps reporting ACTIVE; the status of a version never regresses.
        assert_eq!(l.status(v1, done), KeyGenerationStatus::Active);
    }

    #[test]
    fn injected_failure_reports_reason_and_dropped_nodes() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        l.fail_next_round("node 10.0.0.3:8545 timed out", vec!["10.0.0.3:8545".into()]);
        let v = start(&mut l, t0);

        assert!(matches!(l.failure_reason(v, t0), Err(LedgerError::InvalidState(_))));
        let done = t0 + STEP * 2;
        assert_eq!(l.status(v, done), KeyGenerationStatus::Failed);
        assert_eq!(l.failure_reason(v, done).unwrap(), "node 10.0.0.3:8545 timed out");
        assert_eq!(l.dropped_nodes(v, done).unwrap(), vec!["10.0.0.3:8545".to_string()]);
        assert!(matches!(l.active_version(done), Err(LedgerError::NoActiveKey)));
    }

    #[test]
    fn lock_history_is_point_in_time() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        start(&mut l, t0);
        let done = t0 + STEP * 2;
        let addr = Address([9; 20]);

        let data = views::lock_view(&addr);
        let sig = l.sign_with_active_key(&data, done).unwrap();
        l.process_view(&views::frame(&data, &sig), done).unwrap();

        assert!(l.is_locked(&addr, BlockParameter::Latest).unwrap());
        assert!(!l.is_locked(&addr, BlockParameter::Number(0)).unwrap());
        assert!(!l.is_locked(&addr, BlockParameter::Hash(l.block_hash_at(0))).unwrap());
        assert!(l.is_locked(&addr, BlockParameter::Number(l.height())).unwrap());
        assert!(l.is_locked(&addr, BlockParameter::Number(l.height() + 1)).is_err());
    }

    #[test]
    fn forged_view_changes_nothing() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        start(&mut l, t0);
        let done = t0 + STEP * 2;
        let addr = Address([5; 20]);

        let view = views::frame(&views::lock_view(&addr), &[0; 32]);
        assert!(matches!(l.process_view(&view, done), Err(LedgerError::VerificationFailed(_))));
        let unframed = [0xf8, 0x6b, 0x80, 0x84];
        assert!(matches!(l.process_view(&unframed, done), Err(LedgerError::InvalidParams(_))));
        assert!(!l.is_locked(&addr, BlockParameter::Latest).unwrap());
        assert_eq!(l.height(), 0);
    }

    #[test]
    fn full_unlock_lifecycle() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        start(&mut l, t0);
        let done = t0 + STEP * 2;
        let addr = Address([3; 20]);

        assert!(matches!(l.submit_transaction(&views::unlock_transaction(&addr)), Err(LedgerError::InvalidState(_))));

        for data in [views::lock_view(&addr), views::unlock_proof_view(&addr)] {
            let sig = l.sign_with_active_key(&data, done).unwrap();
            l.process_view(&views::frame(&data, &sig), done).unwrap();
        }
        assert!(l.check_unlock(&addr));

        l.submit_transaction(&views::unlock_transaction(&addr)).unwrap();
        assert!(!l.is_locked(&addr, BlockParameter::Latest).unwrap());
        assert!(l.is_lockable(&addr, BlockParameter::Latest).unwrap());
        assert!(!l.check_unlock(&addr));
    }

    #[test]
    fn excluded_addresses_are_never_lockable() {
        let mut l = ledger(true);
        let addr = Address([1; 20]);
        l.exclude(addr);
        assert!(!l.is_lockable(&addr, BlockParameter::Latest).unwrap());
        assert!(!l.is_locked(&addr, BlockParameter::Latest).unwrap());
    }

    #[test]
    fn keygen_contract_is_captured_at_round_start() {
        let mut l = ledger(true);
        let t0 = Instant::now();
        let before = start(&mut l, t0);
        l.set_keygen_contract(Address([0xcc; 20]));
        let after = start(&mut l, t0);

        assert_eq!(l.membership_contract(before).unwrap(), None);
        assert_eq!(l.membership_contract(after).unwrap(), Some(Address([0xcc; 20])));
        assert!(l.membership_contract(KeyVersion(99)).is_err());
    }

    #[test]
    fn contract_removal_checks_address() {
        let mut l = ledger(true);
        let a = Address([1; 20]);
        let b = Address([2; 20]);
        l.add_contract(CoordinationContract { blockchain_id: BlockchainId(7), address: a, endpoint: "h:1".into() });
        assert!(l.remove_contract(BlockchainId(7), &b).is_err());
        assert!(l.remove_contract(BlockchainId(8), &b).is_ok());
        l.remove_contract(BlockchainId(7), &a).unwrap();
        assert!(l.contracts().is_empty());
    }
}
