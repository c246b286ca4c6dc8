use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info};

use crosslink_core::constants::MIN_THRESHOLD;
use crosslink_core::{
    BlockchainPublicKey, CrossError, KeyGenerationStatus, KeyVersion, ThresholdCryptoSystem,
};
use crosslink_rpc::{call, methods, Transport};

use crate::client::CrossClient;

/// Client-side view of threshold key generation rounds.
///
/// The tracker only reports what the node set says; it never moves a round
/// between states. Every decision that depends on a round's state polls the
/// node first.
pub struct KeyGenSession<'a, T> {
    client: &'a CrossClient<T>,
}

impl<'a, T: Transport> KeyGenSession<'a, T> {
    pub(crate) fn new(client: &'a CrossClient<T>) -> Self {
        Self { client }
    }

    /// Ask the node set to start a new round. The round runs asynchronously
    /// on the nodes; poll `get_key_status` for progress.
    ///
    /// `threshold` must lie in `1..=participants`, where participants is the
    /// linked-node membership. The client's snapshot is consulted first; a
    /// threshold it rejects triggers one fresh `listLinkedNodes` before the
    /// call fails with `InvalidParameter`.
    pub async fn start_threshold_key_generation(
        &self,
        threshold: u32,
        crypto_system: ThresholdCryptoSystem,
    ) -> Result<KeyVersion, CrossError> {
        if threshold < MIN_THRESHOLD {
            return Err(CrossError::InvalidParameter(format!(
                "threshold must be at least {MIN_THRESHOLD}, got {threshold}"
            )));
        }

        let participants = match self.client.membership_size() {
            Some(n) if threshold as usize <= n => n,
            _ => self.client.registry().list_linked_nodes().await?.len(),
        };
        if threshold as usize > participants {
            return Err(CrossError::InvalidParameter(format!(
                "threshold {threshold} exceeds the {participants} participating nodes"
            )));
        }

        let version = self
            .client
            .execute(
                call::start_threshold_key_generation(threshold, crypto_system),
                &format!("start key generation (threshold {threshold})"),
            )
            .await?;
        info!(%version, threshold, participants, "threshold key generation started");
        Ok(version)
    }

    /// Poll the status of `version`. Safe to repeat.
    pub async fn get_key_status(&self, version: KeyVersion) -> Result<KeyGenerationStatus, CrossError> {
        let status = self
            .client
            .execute(call::get_key_status(version), &format!("key version {version}"))
            .await?;
        debug!(%version, %status, "key status");
        if status == KeyGenerationStatus::Active {
            self.client.observe_active(version);
        }
        Ok(status)
    }

    /// Why a round failed. `InvalidState` unless the round is FAILED.
    pub async fn get_key_gen_failure_reason(&self, version: KeyVersion) -> Result<String, CrossError> {
        let status = self.get_key_status(version).await?;
        if status != KeyGenerationStatus::Failed {
            return Err(CrossError::InvalidState(format!(
                "key version {version} is {status}; a failure reason exists only for FAILED rounds"
            )));
        }
        self.client
            .execute(call::get_key_gen_failure_reason(version), &format!("key version {version}"))
            .await
    }

    /// Participants that did not complete the round. Empty means everyone did.
    pub async fn get_key_gen_nodes_dropped_out_of_key_generation(
        &self,
        version: KeyVersion,
    ) -> Result<BTreeSet<String>, CrossError> {
        let nodes = self
            .client
            .execute(
                call::get_key_gen_nodes_dropped_out_of_key_generation(version),
                &format!("key version {version}"),
            )
            .await?;
        Ok(nodes.into_iter().collect())
    }

    /// Nodes holding a share of the key generated in `version`.
    pub async fn get_key_active_nodes(&self, version: KeyVersion) -> Result<BTreeSet<String>, CrossError> {
        let nodes = self
            .client
            .execute(call::get_key_active_nodes(version), &format!("key version {version}"))
            .await?;
        Ok(nodes.into_iter().collect())
    }

    /// The version currently ACTIVE on the node, `NoActiveKey` if none.
    ///
    /// Never goes backwards: a node reporting a version older than one this
    /// client has already seen ACTIVE yields `InvalidState`.
    pub async fn get_active_key_version(&self) -> Result<KeyVersion, CrossError> {
        let reported = self
            .client
            .execute(call::get_active_key_version(), "active key version")
            .await?;
        if let Some(seen) = self.client.highest_active() {
            if reported < seen {
                return Err(CrossError::InvalidState(format!(
                    "node reports active key version {reported}, but version {seen} was already observed ACTIVE"
                )));
            }
        }
        self.client.observe_active(reported);
        Ok(reported)
    }

    /// Activate a generated key. Only a GENERATED round is eligible; the
    /// status is polled first and anything else is `InvalidState`.
    pub async fn activate_key(&self, version: KeyVersion) -> Result<(), CrossError> {
        let status = self.get_key_status(version).await?;
        if status != KeyGenerationStatus::Generated {
            return Err(CrossError::InvalidState(format!(
                "key version {version} is {status}; only GENERATED keys can be activated"
            )));
        }
        self.client
            .execute(call::activate_key(version), &format!("key version {version}"))
            .await?;
        self.client.observe_active(version);
        info!(%version, "key activated");
        Ok(())
    }

    /// Public key of `version`, or of the active key when `None`.
    pub async fn get_blockchain_public_key(
        &self,
        version: Option<KeyVersion>,
    ) -> Result<BlockchainPublicKey, CrossError> {
        let context = match version {
            Some(v) => format!("public key of key version {v}"),
            None => "public key of the active key".to_string(),
        };
        let hex = self
            .client
            .execute(call::get_blockchain_public_key(version), &context)
            .await?;
        BlockchainPublicKey::from_hex(&hex).map_err(|e| CrossError::Decode {
            method: methods::GET_BLOCKCHAIN_PUBLIC_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    /// Poll until `version` settles (GENERATED, ACTIVE or FAILED) or
    /// `deadline` elapses. Dropping the future leaves the remote round alone.
    pub async fn wait_for_terminal(
        &self,
        version: KeyVersion,
        interval: Duration,
        deadline: Duration,
    ) -> Result<KeyGenerationStatus, CrossError> {
        let started = tokio::time::Instant::now();
        loop {
            let status = self.get_key_status(version).await?;
            if status.is_settled() {
                return Ok(status);
            }
            if started.elapsed() >= deadline {
                return Err(CrossError::Timeout {
                    version,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}
