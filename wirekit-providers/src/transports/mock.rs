use crate::{
    BatchElem, CallContext, JsonRpcError, ProviderError, RpcCall, RpcProvider, Subscription,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc::{self, UnboundedSender};
use wirekit_core::Param;

/// Helper response type for [`MockTransport`], allowing custom JSON-RPC and
/// transport errors to be provided.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Successful response with a `serde_json::Value`.
    Value(Value),

    /// Error response with a `JsonRpcError`.
    Error(JsonRpcError),

    /// A failure to reach the node, surfaced as [`ProviderError::Transport`]
    TransportError(String),
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, VecDeque<MockResponse>>,
    requests: Vec<RpcCall>,
    subscriptions: HashMap<String, Vec<UnboundedSender<Value>>>,
    next_subscription: u64,
}

/// Mock transport used in test environments.
///
/// Responses are queued per method and consumed in FIFO order. Every call
/// that reaches the transport is recorded, including each element of a batch.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    latency: Option<Duration>,
}

impl MockTransport {
    /// Instantiates a mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queues a successful response for `method`
    pub fn push<T: Serialize>(&self, method: &str, data: T) -> Result<(), ProviderError> {
        let value = serde_json::to_value(data)?;
        self.push_response(method, MockResponse::Value(value));
        Ok(())
    }

    /// Queues a JSON-RPC error response for `method`
    pub fn push_error(&self, method: &str, error: JsonRpcError) {
        self.push_response(method, MockResponse::Error(error));
    }

    /// Queues a transport failure for `method`
    pub fn push_transport_error(&self, method: &str, reason: impl Into<String>) {
        self.push_response(method, MockResponse::TransportError(reason.into()));
    }

    /// Pushes the data or error to the responses of `method`
    pub fn push_response(&self, method: &str, response: MockResponse) {
        self.state.lock().responses.entry(method.to_owned()).or_default().push_back(response);
    }

    /// All calls received so far, in order
    pub fn requests(&self) -> Vec<RpcCall> {
        self.state.lock().requests.clone()
    }

    /// The number of calls of `method` received so far
    pub fn request_count(&self, method: &str) -> usize {
        self.state.lock().requests.iter().filter(|call| call.method == method).count()
    }

    /// Sends `notification` to every open subscription in `namespace`
    pub fn notify(&self, namespace: &str, notification: Value) {
        if let Some(senders) = self.state.lock().subscriptions.get_mut(namespace) {
            senders.retain(|tx| tx.send(notification.clone()).is_ok());
        }
    }

    fn respond(&self, call: RpcCall) -> Result<Value, ProviderError> {
        let mut state = self.state.lock();
        let response = state.responses.get_mut(&call.method).and_then(VecDeque::pop_front);
        let method = call.method.clone();
        state.requests.push(call);

        match response {
            Some(MockResponse::Value(value)) => Ok(value),
            Some(MockResponse::Error(error)) => Err(ProviderError::JsonRpc(error)),
            Some(MockResponse::TransportError(reason)) => Err(ProviderError::Transport(reason)),
            None => Err(ProviderError::Transport(format!(
                "no mock response queued for `{method}`"
            ))),
        }
    }

    fn respond_batch(&self, mut batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        if batch.is_empty() {
            return Err(ProviderError::EmptyBatch)
        }

        for elem in batch.iter_mut() {
            elem.reset();
            match self.respond(RpcCall::new(elem.method.clone(), elem.params.clone())) {
                Ok(value) => elem.result = Some(value),
                Err(ProviderError::JsonRpc(error)) => elem.error = Some(error),
                Err(err) => return Err(err),
            }
        }

        Ok(batch)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RpcProvider for MockTransport {
    async fn call(&self, call: RpcCall) -> Result<Value, ProviderError> {
        self.delay().await;
        self.respond(call)
    }

    async fn call_context(
        &self,
        ctx: &CallContext,
        call: RpcCall,
    ) -> Result<Value, ProviderError> {
        ctx.run(async move {
            self.delay().await;
            self.respond(call)
        })
        .await
    }

    async fn batch_call(&self, batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        self.delay().await;
        self.respond_batch(batch)
    }

    async fn batch_call_context(
        &self,
        ctx: &CallContext,
        batch: Vec<BatchElem>,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        ctx.run(async move {
            self.delay().await;
            self.respond_batch(batch)
        })
        .await
    }

    async fn subscribe(
        &self,
        _ctx: &CallContext,
        namespace: &str,
        params: Vec<Param>,
    ) -> Result<Subscription, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.requests.push(RpcCall::new(format!("{namespace}_subscribe"), params));
        state.subscriptions.entry(namespace.to_owned()).or_default().push(tx);
        state.next_subscription += 1;
        Ok(Subscription::new(format!("0x{:x}", state.next_subscription), rx))
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.state.lock().subscriptions.clear();
        Ok(())
    }
}
