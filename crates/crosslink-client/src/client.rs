use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tracing::warn;

use crosslink_core::{CrossError, KeyVersion, LinkedNode};
use crosslink_rpc::{HttpTransport, RpcCall, Transport};

use crate::config::ClientConfig;
use crate::keygen::KeyGenSession;
use crate::lock::LockCoordinator;
use crate::operator::NodeOperator;
use crate::privacy::PrivacyClient;
use crate::registry::RegistryClient;
use crate::relay::Relay;

/// Entry point of the cross-chain client.
///
/// Holds the transport plus the two pieces of client-side memory the
/// protocol needs: the last observed linked-node membership (used to
/// validate thresholds without a round trip) and the highest key version
/// observed ACTIVE (used to keep `getActiveKeyVersion` monotonic).
pub struct CrossClient<T> {
    transport: T,
    config: ClientConfig,
    membership: Mutex<Option<Vec<LinkedNode>>>,
    highest_active: Mutex<Option<KeyVersion>>,
}

impl CrossClient<HttpTransport> {
    /// Build a client speaking JSON-RPC over HTTP to `config.url`.
    pub fn connect(config: ClientConfig) -> Result<Self, CrossError> {
        let transport = HttpTransport::new(&config.url, config.request_timeout())?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> CrossClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            membership: Mutex::new(None),
            highest_active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn keygen(&self) -> KeyGenSession<'_, T> {
        KeyGenSession::new(self)
    }

    pub fn registry(&self) -> RegistryClient<'_, T> {
        RegistryClient::new(self)
    }

    pub fn locks(&self) -> LockCoordinator<'_, T> {
        LockCoordinator::new(self)
    }

    pub fn relay(&self) -> Relay<'_, T> {
        Relay::new(self)
    }

    pub fn privacy(&self) -> PrivacyClient<'_, T> {
        PrivacyClient::new(self)
    }

    pub fn operator(&self) -> NodeOperator<'_, T> {
        NodeOperator::new(self)
    }

    /// Run `call`, retrying transport failures only when the call is an
    /// idempotent query. Remote errors are classified against `context`.
    pub(crate) async fn execute<R: DeserializeOwned>(
        &self,
        call: RpcCall<R>,
        context: &str,
    ) -> Result<R, CrossError> {
        let mut attempt = 0;
        loop {
            match call.send(&self.transport).await {
                Err(e)
                    if e.is_transport()
                        && call.is_idempotent()
                        && attempt < self.config.query_retries =>
                {
                    attempt += 1;
                    warn!(method = call.method(), attempt, error = %e, "retrying query");
                }
                other => return other.map_err(|e| e.in_context(context)),
            }
        }
    }

    // ── Membership snapshot ──────────────────────────────────────────────────

    pub(crate) fn membership_size(&self) -> Option<usize> {
        self.membership
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Vec::len)
    }

    pub(crate) fn replace_membership(&self, nodes: Vec<LinkedNode>) {
        *self.membership.lock().unwrap_or_else(PoisonError::into_inner) = Some(nodes);
    }

    /// Apply `f` to the snapshot if one has been taken; an unknown membership
    /// stays unknown.
    pub(crate) fn update_membership(&self, f: impl FnOnce(&mut Vec<LinkedNode>)) {
        if let Some(nodes) = self
            .membership
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            f(nodes);
        }
    }

    // ── Active key watermark ─────────────────────────────────────────────────

    pub(crate) fn highest_active(&self) -> Option<KeyVersion> {
        *self.highest_active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn observe_active(&self, version: KeyVersion) {
        let mut guard = self.highest_active.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.map_or(true, |seen| version > seen) {
            *guard = Some(version);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crosslink_core::RpcFailure;
    use serde_json::json;

    #[tokio::test]
    async fn idempotent_queries_are_retried_on_transport_failure() {
        let transport = ScriptedTransport::new(vec![
            Err(RpcFailure::Transport("reset".into())),
            Ok(json!(true)),
        ]);
        let config = ClientConfig { query_retries: 1, ..ClientConfig::default() };
        let client = CrossClient::new(transport, config);

        let call = crosslink_rpc::call::check_unlock("0x00");
        assert!(client.execute(call, "unlock check").await.unwrap());
        assert_eq!(client.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn mutations_are_never_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(RpcFailure::Transport("timeout".into())),
            Ok(json!(null)),
        ]);
        let config = ClientConfig { query_retries: 5, ..ClientConfig::default() };
        let client = CrossClient::new(transport, config);

        let call = crosslink_rpc::call::activate_key(KeyVersion(1));
        let err = client.execute(call, "key version 1").await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(client.transport.calls().len(), 1);
    }

    #[test]
    fn active_watermark_only_moves_forward() {
        let client = CrossClient::new(ScriptedTransport::new(vec![]), ClientConfig::default());
        client.observe_active(KeyVersion(3));
        client.observe_active(KeyVersion(2));
        assert_eq!(client.highest_active(), Some(KeyVersion(3)));
    }
}
