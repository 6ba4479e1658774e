use async_trait::async_trait;
use ethers_core::types::{Address, Bytes};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use wirekit_core::{Param, PopulateError, PopulateReader, TransactionArgs};
use wirekit_providers::{
    BatchCallContextFn, BatchCallFn, BatchElem, CallContext, CallContextFn, CallFn,
    MiddlewareProvider, ProviderError, ProviderReader, RpcCall, RpcMiddleware, RpcProvider,
};
use wirekit_signers::{Signer, SignerError, SignerRegistry};

pub const METHOD_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const METHOD_SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

#[derive(Error, Debug)]
/// Error thrown while signing an outgoing transaction
pub enum SignerMiddlewareError {
    /// No signer is registered for the sender, or the registry is empty
    #[error("signer not found")]
    SignerNotFound,
    /// The node did not report a chain id
    #[error("chain not ready")]
    ChainNotReady,
    /// `eth_sendTransaction` was called without a transaction object
    #[error("missing transaction argument for eth_sendTransaction")]
    MissingArgument,
    /// The transaction object could not be decoded
    #[error("invalid transaction argument: {0}")]
    InvalidArgument(serde_json::Error),
    /// Populating or converting the transaction failed
    #[error(transparent)]
    Populate(#[from] PopulateError),
    /// Thrown when the internal call to the signer fails
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// Thrown when a probe to the inner provider fails
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<SignerMiddlewareError> for ProviderError {
    fn from(err: SignerMiddlewareError) -> Self {
        match err {
            SignerMiddlewareError::Provider(err) => err,
            err => ProviderError::middleware(err),
        }
    }
}

/// Signs `eth_sendTransaction` calls locally.
///
/// The sender's signer is looked up in the [`SignerRegistry`]; a call without
/// `from` uses the registry's first signer. Missing fields are populated by
/// querying `inner` directly, outside of the pipeline this layer is installed
/// in. The signed transaction is then forwarded as `eth_sendRawTransaction`.
///
/// Every other method passes through unchanged. On error the call is never
/// forwarded.
#[derive(Debug, Clone)]
pub struct SignerMiddleware {
    inner: Arc<dyn RpcProvider>,
    registry: Arc<SignerRegistry>,
}

impl SignerMiddleware {
    pub fn new(inner: Arc<dyn RpcProvider>, registry: Arc<SignerRegistry>) -> Self {
        Self { inner, registry }
    }

    pub fn registry(&self) -> &Arc<SignerRegistry> {
        &self.registry
    }

    /// Rewrites `call` in place if it sends a transaction.
    ///
    /// Probes are bounded by `ctx` when given, and otherwise go through the
    /// plain [`RpcProvider::call`] of `inner`.
    pub async fn sign_call(
        &self,
        ctx: Option<&CallContext>,
        call: &mut RpcCall,
    ) -> Result<(), SignerMiddlewareError> {
        if call.method != METHOD_SEND_TRANSACTION {
            return Ok(())
        }
        call.params = self.sign_params(ctx, &call.params).await?;
        call.method = METHOD_SEND_RAW_TRANSACTION.to_string();
        Ok(())
    }

    /// Rewrites every transaction-sending element of `batch` in place
    pub async fn sign_batch(
        &self,
        ctx: Option<&CallContext>,
        batch: &mut [BatchElem],
    ) -> Result<(), SignerMiddlewareError> {
        for elem in batch.iter_mut().filter(|elem| elem.method == METHOD_SEND_TRANSACTION) {
            elem.params = self.sign_params(ctx, &elem.params).await?;
            elem.method = METHOD_SEND_RAW_TRANSACTION.to_string();
        }
        Ok(())
    }

    async fn sign_params(
        &self,
        ctx: Option<&CallContext>,
        params: &[Param],
    ) -> Result<Vec<Param>, SignerMiddlewareError> {
        let args = transaction_arg(params)?;
        let raw = self.sign_transaction(ctx, args).await?;
        let raw = Param::from_serialize(&raw).map_err(ProviderError::from)?;
        Ok(vec![raw])
    }

    /// Populates, signs and RLP-encodes `args`
    pub async fn sign_transaction(
        &self,
        ctx: Option<&CallContext>,
        mut args: TransactionArgs,
    ) -> Result<Bytes, SignerMiddlewareError> {
        let signer = self.resolve_signer(&mut args)?;
        let reader = match ctx {
            Some(ctx) => ProviderReader::new(self.inner.clone()).with_context(ctx.clone()),
            None => ProviderReader::new(self.inner.clone()),
        };

        let chain_id = match args.chain_id {
            Some(chain_id) => chain_id,
            None => reader.chain_id().await?.ok_or(SignerMiddlewareError::ChainNotReady)?,
        };
        args.chain_id = Some(chain_id);

        let tx = args.populate_and_into_transaction(&reader).await?;
        tracing::debug!(from = ?signer.address(), chain_id = %chain_id, "signing transaction");
        let signature = signer.sign_transaction(&tx, chain_id.as_u64())?;

        // Return the raw rlp-encoded signed transaction
        Ok(tx.rlp_signed(&signature))
    }

    fn resolve_signer(
        &self,
        args: &mut TransactionArgs,
    ) -> Result<Arc<dyn Signer>, SignerMiddlewareError> {
        let signer = match args.from {
            Some(from) => self.lookup(from)?,
            None => self.registry.default_signer().ok_or(SignerMiddlewareError::SignerNotFound)?,
        };
        args.from = Some(signer.address());
        Ok(signer)
    }

    fn lookup(&self, from: Address) -> Result<Arc<dyn Signer>, SignerMiddlewareError> {
        self.registry.get(from).map_err(|_| {
            tracing::debug!(?from, "no signer registered for sender");
            SignerMiddlewareError::SignerNotFound
        })
    }
}

fn transaction_arg(params: &[Param]) -> Result<TransactionArgs, SignerMiddlewareError> {
    match params.first() {
        Some(Param::Transaction(args)) => Ok((**args).clone()),
        Some(Param::Json(value @ Value::Object(_))) => {
            serde_json::from_value(value.clone()).map_err(SignerMiddlewareError::InvalidArgument)
        }
        _ => Err(SignerMiddlewareError::MissingArgument),
    }
}

#[async_trait]
impl RpcMiddleware for SignerMiddleware {
    async fn call(&self, mut call: RpcCall, next: CallFn) -> Result<Value, ProviderError> {
        self.sign_call(None, &mut call).await?;
        next(call).await
    }

    async fn call_context(
        &self,
        ctx: CallContext,
        mut call: RpcCall,
        next: CallContextFn,
    ) -> Result<Value, ProviderError> {
        self.sign_call(Some(&ctx), &mut call).await?;
        next(ctx, call).await
    }

    async fn batch_call(
        &self,
        mut batch: Vec<BatchElem>,
        next: BatchCallFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        self.sign_batch(None, &mut batch).await?;
        next(batch).await
    }

    async fn batch_call_context(
        &self,
        ctx: CallContext,
        mut batch: Vec<BatchElem>,
        next: BatchCallContextFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        self.sign_batch(Some(&ctx), &mut batch).await?;
        next(ctx, batch).await
    }
}

/// Wraps `inner` in a pipeline with a [`SignerMiddleware`] registered on all
/// four call shapes
pub fn new_signing_provider(
    inner: Arc<dyn RpcProvider>,
    registry: Arc<SignerRegistry>,
) -> MiddlewareProvider {
    let mut provider = MiddlewareProvider::new(inner.clone());
    provider.layer(SignerMiddleware::new(inner, registry));
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_transaction_argument() {
        let args = TransactionArgs::new().value(1u64);
        assert_eq!(transaction_arg(&[Param::from(args.clone())]).unwrap(), args);

        let raw = Param::Json(json!({ "value": "0x1" }));
        assert_eq!(transaction_arg(&[raw]).unwrap(), args);

        assert!(matches!(transaction_arg(&[]), Err(SignerMiddlewareError::MissingArgument)));
        assert!(matches!(
            transaction_arg(&[Param::Json(json!("0x1"))]),
            Err(SignerMiddlewareError::MissingArgument)
        ));
        assert!(matches!(
            transaction_arg(&[Param::Json(json!({ "type": "0x7" }))]),
            Err(SignerMiddlewareError::InvalidArgument(_))
        ));
    }

    #[test]
    fn keeps_provider_error_class() {
        let err: ProviderError =
            SignerMiddlewareError::Provider(ProviderError::Transport("reset".into())).into();
        assert!(matches!(err, ProviderError::Transport(_)));

        let err: ProviderError = SignerMiddlewareError::SignerNotFound.into();
        assert!(matches!(err, ProviderError::Middleware(_)));
        assert_eq!(err.to_string(), "signer not found");
        assert!(!err.is_retryable());

        let populate = PopulateError::Reader {
            action: "estimating gas",
            source: Box::new(ProviderError::DeadlineExceeded),
        };
        let err: ProviderError = SignerMiddlewareError::Populate(populate).into();
        assert!(err.is_retryable());
    }
}
