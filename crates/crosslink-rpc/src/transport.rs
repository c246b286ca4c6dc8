use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::async_trait;
use serde_json::Value;

use crosslink_core::RpcFailure;

/// Request/response channel to a node. Implementations only move JSON; they
/// know nothing about the `cross` protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `method` with positional `params` and return the `result` field.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcFailure> {
        (**self).call(method, params).await
    }
}

/// JSON-RPC 2.0 over HTTP POST.
///
/// Uses raw reqwest with serde_json rather than a generated client so every
/// call goes through the same typed `RpcCall` descriptors.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcFailure::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(format!("connecting to node at {}: {e}", self.url)))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RpcFailure::Transport(format!("reading RPC response: {e}")))?;

        interpret_response(&self.url, status, &bytes)
    }
}

/// Turn an HTTP reply into the call outcome. Nodes commonly pair a non-2xx
/// status with a regular JSON-RPC error body, and that error wins over the
/// bare status.
fn interpret_response(
    url: &str,
    status: reqwest::StatusCode,
    body: &[u8],
) -> Result<Value, RpcFailure> {
    let parsed = serde_json::from_slice::<Value>(body);
    if !status.is_success() {
        if let Ok(json) = parsed {
            if let Err(remote @ RpcFailure::Remote { .. }) = parse_envelope(json) {
                return Err(remote);
            }
        }
        return Err(RpcFailure::Transport(format!("node at {url} answered HTTP {status}")));
    }

    let json = parsed.map_err(|e| RpcFailure::Transport(format!("parsing RPC response: {e}")))?;
    parse_envelope(json)
}

/// Split a JSON-RPC 2.0 response envelope into its result or error.
pub fn parse_envelope(mut json: Value) -> Result<Value, RpcFailure> {
    if let Some(err) = json.get("error") {
        let code = err
            .get("code")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
            .ok_or_else(|| RpcFailure::Transport(format!("malformed error object: {err}")))?;
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(RpcFailure::Remote { code, message });
    }

    match json.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcFailure::Transport("response carries neither result nor error".into())),
    }
}
