use crate::{
    BatchCallContextFn, BatchCallFn, BatchElem, CallContext, CallContextFn, CallFn, JsonRpcError,
    ProviderError, RpcCall, RpcMiddleware,
};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use tracing::{Instrument, Span};

/// Emits a `tracing` span named `rpc` around every call.
///
/// Parameters and results are logged at `trace`, failures at `debug` along
/// with whether they are retryable and whether the node reported a revert.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

fn call_span(method: &str) -> Span {
    tracing::debug_span!("rpc", method = %method)
}

fn batch_span(batch: &[BatchElem]) -> Span {
    let methods: Vec<&str> = batch.iter().map(|elem| elem.method.as_str()).collect();
    tracing::debug_span!("rpc", batch = ?methods)
}

fn log_outcome<T: Debug>(res: &Result<T, ProviderError>) {
    match res {
        Ok(value) => tracing::trace!(result = ?value, "rpc call succeeded"),
        Err(err) => {
            let revert = err.as_error_response().map_or(false, JsonRpcError::is_revert);
            tracing::debug!(%err, retryable = err.is_retryable(), revert, "rpc call failed")
        }
    }
}

#[async_trait]
impl RpcMiddleware for LoggingMiddleware {
    async fn call(&self, call: RpcCall, next: CallFn) -> Result<Value, ProviderError> {
        let span = call_span(&call.method);
        async move {
            tracing::trace!(params = ?call.params, "sending rpc call");
            let res = next(call).await;
            log_outcome(&res);
            res
        }
        .instrument(span)
        .await
    }

    async fn call_context(
        &self,
        ctx: CallContext,
        call: RpcCall,
        next: CallContextFn,
    ) -> Result<Value, ProviderError> {
        let span = call_span(&call.method);
        async move {
            tracing::trace!(params = ?call.params, deadline = ?ctx.deadline(), "sending rpc call");
            let res = next(ctx, call).await;
            log_outcome(&res);
            res
        }
        .instrument(span)
        .await
    }

    async fn batch_call(
        &self,
        batch: Vec<BatchElem>,
        next: BatchCallFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        let span = batch_span(&batch);
        async move {
            tracing::trace!(size = batch.len(), "sending rpc batch");
            let res = next(batch).await;
            log_outcome(&res);
            res
        }
        .instrument(span)
        .await
    }

    async fn batch_call_context(
        &self,
        ctx: CallContext,
        batch: Vec<BatchElem>,
        next: BatchCallContextFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        let span = batch_span(&batch);
        async move {
            tracing::trace!(size = batch.len(), deadline = ?ctx.deadline(), "sending rpc batch");
            let res = next(ctx, batch).await;
            log_outcome(&res);
            res
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MiddlewareProvider, MockTransport, RpcProvider, RpcProviderExt};
    use ethers_core::types::U64;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn logs_calls_and_failures() {
        let mock = MockTransport::new();
        mock.push("eth_chainId", U64::from(3)).unwrap();
        mock.push_error(
            "eth_gasPrice",
            JsonRpcError { code: -32000, message: "header not found".into(), data: None },
        );

        let mut provider = MiddlewareProvider::new(Arc::new(mock));
        provider.layer(LoggingMiddleware);

        provider.chain_id().await.unwrap();
        assert!(logs_contain("eth_chainId"));
        assert!(logs_contain("rpc call succeeded"));

        provider.gas_price().await.unwrap_err();
        assert!(logs_contain("rpc call failed"));
        assert!(logs_contain("header not found"));
        assert!(logs_contain("revert=false"));
    }

    #[tokio::test]
    #[traced_test]
    async fn flags_reverts() {
        let mock = MockTransport::new();
        mock.push_error(
            "eth_call",
            JsonRpcError { code: 3, message: "execution reverted".into(), data: None },
        );

        let mut provider = MiddlewareProvider::new(Arc::new(mock));
        provider.layer(LoggingMiddleware);

        provider.call(RpcCall::new("eth_call", vec![])).await.unwrap_err();
        assert!(logs_contain("revert=true"));
    }
}
