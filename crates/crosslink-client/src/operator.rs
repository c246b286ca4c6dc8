use std::collections::BTreeMap;

use tracing::info;

use crosslink_core::constants::TX_HASH_LEN;
use crosslink_core::encoding::{from_prefixed_hex_array, to_prefixed_hex};
use crosslink_core::CrossError;
use crosslink_rpc::{call, Transport, TransactionTrace};

use crate::client::CrossClient;

/// Node operation calls outside the `cross` namespace: block production
/// control and transaction tracing.
pub struct NodeOperator<'a, T> {
    client: &'a CrossClient<T>,
}

impl<'a, T: Transport> NodeOperator<'a, T> {
    pub(crate) fn new(client: &'a CrossClient<T>) -> Self {
        Self { client }
    }

    pub async fn miner_start(&self) -> Result<(), CrossError> {
        self.client.execute(call::miner_start(), "starting block production").await?;
        info!("block production started");
        Ok(())
    }

    /// Whether the node stopped producing blocks.
    pub async fn miner_stop(&self) -> Result<bool, CrossError> {
        let stopped = self.client.execute(call::miner_stop(), "stopping block production").await?;
        info!(stopped, "block production stop requested");
        Ok(stopped)
    }

    /// Replay `hash` and return its opcode trace. `options` switches trace
    /// sections off, e.g. `disableStorage` or `disableMemory`.
    pub async fn debug_trace_transaction(
        &self,
        hash: &str,
        options: &BTreeMap<String, bool>,
    ) -> Result<TransactionTrace, CrossError> {
        let hash = to_prefixed_hex(&from_prefixed_hex_array::<TX_HASH_LEN>(hash, "transaction hash")?);
        self.client
            .execute(call::debug_trace_transaction(&hash, options), &format!("trace of {hash}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::ClientConfig;
    use crosslink_core::RpcFailure;
    use serde_json::json;

    #[tokio::test]
    async fn miner_start_ignores_the_result_shape() {
        let c = CrossClient::new(
            ScriptedTransport::new(vec![Ok(json!(null)), Ok(json!(true)), Ok(json!(true))]),
            ClientConfig::default(),
        );
        c.operator().miner_start().await.unwrap();
        c.operator().miner_start().await.unwrap();
        assert!(c.operator().miner_stop().await.unwrap());
        assert_eq!(c.transport().methods(), vec!["miner_start", "miner_start", "miner_stop"]);
    }

    #[tokio::test]
    async fn miner_stop_is_not_retried() {
        let c = CrossClient::new(
            ScriptedTransport::new(vec![Err(RpcFailure::Transport("reset".into()))]),
            ClientConfig { query_retries: 3, ..ClientConfig::default() },
        );
        assert!(c.operator().miner_stop().await.unwrap_err().is_transport());
        assert_eq!(c.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn trace_decodes_and_forwards_options() {
        let c = CrossClient::new(
            ScriptedTransport::new(vec![Ok(json!({
                "gas": 21000,
                "failed": false,
                "returnValue": "",
                "structLogs": [{ "pc": 0, "op": "PUSH1" }],
            }))]),
            ClientConfig::default(),
        );
        let hash = format!("0x{}", "cd".repeat(32));
        let options = BTreeMap::from([("disableStorage".to_string(), true)]);
        let trace = c.operator().debug_trace_transaction(&hash, &options).await.unwrap();

        assert_eq!(trace.gas, 21000);
        assert!(!trace.failed);
        assert_eq!(trace.struct_logs.len(), 1);
        assert_eq!(c.transport().calls()[0].1, vec![json!(hash), json!({ "disableStorage": true })]);
    }
}
