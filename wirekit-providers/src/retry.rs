//! A middleware that re-issues failed calls filtered by a [RetryPolicy], with
//! a fixed delay between attempts.

use crate::{
    BatchCallContextFn, BatchCallFn, BatchElem, CallContext, CallContextFn, CallFn,
    MiddlewareProvider, ProviderError, RpcCall, RpcMiddleware, RpcProvider,
};
use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};

/// [RetryPolicy] decides which errors are worth issuing the call again for.
pub trait RetryPolicy: Send + Sync + Debug {
    fn should_retry(&self, error: &ProviderError) -> bool;
}

/// Retries transport-level failures and nothing else.
///
/// JSON-RPC errors are answers from the node and are returned as is, see
/// [`ProviderError::is_retryable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportRetryPolicy;

impl RetryPolicy for TransportRetryPolicy {
    fn should_retry(&self, error: &ProviderError) -> bool {
        error.is_retryable()
    }
}

/// [RetryMiddleware] issues every call up to `max_attempts` times, sleeping
/// `interval` between attempts.
///
/// A batch is retried as a unit. For the context-bearing shapes retrying stops
/// as soon as the caller's context is done: a cancelled context yields
/// [`ProviderError::Cancelled`], an expired one
/// [`ProviderError::RetriesExhausted`].
#[derive(Debug)]
pub struct RetryMiddleware {
    max_attempts: u32,
    interval: Duration,
    policy: Box<dyn RetryPolicy>,
}

impl RetryMiddleware {
    /// Example:
    ///
    /// ```
    /// use std::time::Duration;
    /// use wirekit_providers::RetryMiddleware;
    ///
    /// let retry = RetryMiddleware::new(3, Duration::from_millis(500));
    /// assert_eq!(retry.max_attempts(), 3);
    /// ```
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self::with_policy(max_attempts, interval, Box::new(TransportRetryPolicy))
    }

    /// `max_attempts` of zero is treated as one
    pub fn with_policy(max_attempts: u32, interval: Duration, policy: Box<dyn RetryPolicy>) -> Self {
        Self { max_attempts: max_attempts.max(1), interval, policy }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    async fn retry<T, F, Fut>(&self, ctx: Option<&CallContext>, mut attempt: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match attempt().await {
                Ok(res) => return Ok(res),
                Err(err) => err,
            };

            if !self.policy.should_retry(&err) {
                return Err(err)
            }

            if ctx.map_or(false, CallContext::is_cancelled) {
                tracing::debug!(attempts, %err, "caller cancelled, not retrying");
                return Err(ProviderError::Cancelled)
            }

            let done = ctx.map_or(false, CallContext::is_done);
            if attempts >= self.max_attempts || done {
                tracing::debug!(attempts, %err, "giving up");
                return Err(ProviderError::RetriesExhausted { attempts, source: Box::new(err) })
            }

            tracing::trace!(attempt = attempts, %err, "retrying after {:?}", self.interval);
            let sleep = async {
                tokio::time::sleep(self.interval).await;
                Ok(())
            };
            let slept = match ctx {
                Some(ctx) => ctx.run(sleep).await,
                None => sleep.await,
            };
            match slept {
                Ok(()) => {}
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(_) => {
                    return Err(ProviderError::RetriesExhausted { attempts, source: Box::new(err) })
                }
            }
        }
    }
}

#[async_trait]
impl RpcMiddleware for RetryMiddleware {
    async fn call(&self, call: RpcCall, next: CallFn) -> Result<Value, ProviderError> {
        self.retry(None, || next(call.clone())).await
    }

    async fn call_context(
        &self,
        ctx: CallContext,
        call: RpcCall,
        next: CallContextFn,
    ) -> Result<Value, ProviderError> {
        self.retry(Some(&ctx), || next(ctx.clone(), call.clone())).await
    }

    async fn batch_call(
        &self,
        batch: Vec<BatchElem>,
        next: BatchCallFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        self.retry(None, || next(batch.clone())).await
    }

    async fn batch_call_context(
        &self,
        ctx: CallContext,
        batch: Vec<BatchElem>,
        next: BatchCallContextFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        self.retry(Some(&ctx), || next(ctx.clone(), batch.clone())).await
    }
}

/// Wraps `inner` in a pipeline with a [RetryMiddleware] registered on all
/// four call shapes
pub fn new_retry_provider(
    inner: Arc<dyn RpcProvider>,
    max_attempts: u32,
    interval: Duration,
) -> MiddlewareProvider {
    let mut provider = MiddlewareProvider::new(inner);
    provider.layer(RetryMiddleware::new(max_attempts, interval));
    provider
}
