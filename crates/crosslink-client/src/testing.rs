//! Scripted transport for unit tests: replays canned responses in order and
//! records every call it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use crosslink_core::RpcFailure;
use crosslink_rpc::{async_trait, Transport};
use serde_json::Value;

pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, RpcFailure>>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<Result<Value, RpcFailure>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcFailure> {
        self.calls.lock().unwrap().push((method.to_string(), params));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {method}"))
    }
}

pub(crate) fn remote(code: i32, message: &str) -> Result<Value, RpcFailure> {
    Err(RpcFailure::Remote { code, message: message.to_string() })
}
