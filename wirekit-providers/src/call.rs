use crate::{JsonRpcError, ProviderError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use wirekit_core::Param;

/// A single JSON-RPC invocation: a method name and its positional parameters
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcCall {
    pub method: String,
    pub params: Vec<Param>,
}

impl RpcCall {
    pub fn new(method: impl Into<String>, params: Vec<Param>) -> Self {
        Self { method: method.into(), params }
    }
}

/// One element of a batched call.
///
/// After execution exactly one of `result` and `error` is expected to be set.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchElem {
    pub method: String,
    pub params: Vec<Param>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

impl BatchElem {
    pub fn new(method: impl Into<String>, params: Vec<Param>) -> Self {
        Self { method: method.into(), params, result: None, error: None }
    }

    /// Decodes this element's result, or returns its JSON-RPC error
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProviderError> {
        if let Some(err) = &self.error {
            return Err(ProviderError::JsonRpc(err.clone()))
        }
        let value = self.result.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Clears the result and error slots, e.g. before the batch is re-sent
    pub fn reset(&mut self) {
        self.result = None;
        self.error = None;
    }
}

impl From<RpcCall> for BatchElem {
    fn from(call: RpcCall) -> Self {
        Self::new(call.method, call.params)
    }
}
