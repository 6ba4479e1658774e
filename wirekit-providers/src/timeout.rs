use crate::{BatchElem, CallContext, ProviderError, RpcCall, RpcProvider, Subscription};
use async_trait::async_trait;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use wirekit_core::Param;

/// Bounds the timeout-unaware call shapes by a fixed duration.
///
/// [`RpcProvider::call`] and [`RpcProvider::batch_call`] derive a context
/// expiring `timeout` from now and go through the context-bearing path. Calls
/// that already carry a context are passed through unchanged.
#[derive(Debug, Clone)]
pub struct TimeoutProvider {
    inner: Arc<dyn RpcProvider>,
    timeout: Duration,
}

impl TimeoutProvider {
    pub fn new(inner: Arc<dyn RpcProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RpcProvider for TimeoutProvider {
    async fn call(&self, call: RpcCall) -> Result<Value, ProviderError> {
        let (ctx, _guard) = CallContext::background().with_timeout(self.timeout);
        self.call_context(&ctx, call).await
    }

    async fn call_context(
        &self,
        ctx: &CallContext,
        call: RpcCall,
    ) -> Result<Value, ProviderError> {
        self.inner.call_context(ctx, call).await
    }

    async fn batch_call(&self, batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        let (ctx, _guard) = CallContext::background().with_timeout(self.timeout);
        self.batch_call_context(&ctx, batch).await
    }

    async fn batch_call_context(
        &self,
        ctx: &CallContext,
        batch: Vec<BatchElem>,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        self.inner.batch_call_context(ctx, batch).await
    }

    async fn subscribe(
        &self,
        ctx: &CallContext,
        namespace: &str,
        params: Vec<Param>,
    ) -> Result<Subscription, ProviderError> {
        self.inner.subscribe(ctx, namespace, params).await
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.inner.close().await
    }
}
