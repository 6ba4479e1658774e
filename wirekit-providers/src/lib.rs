#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
//! # Clients for interacting with Ethereum nodes
//!
//! Every outbound JSON-RPC call goes through an [`RpcProvider`]. Transports
//! ([`Http`], [`MockTransport`]) implement it directly; [`MiddlewareProvider`]
//! wraps another provider and folds a list of middleware around each of the
//! four call shapes:
//!
//! - [`RpcProvider::call`]
//! - [`RpcProvider::call_context`]
//! - [`RpcProvider::batch_call`]
//! - [`RpcProvider::batch_call_context`]
//!
//! The first registered middleware is the outermost layer.
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use wirekit_providers::{new_retry_provider, Http, RpcProviderExt};
//!
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let http: Http = "http://localhost:8545".parse()?;
//! let provider = new_retry_provider(Arc::new(http), 3, Duration::from_millis(500));
//! let chain_id = provider.chain_id().await?;
//! # Ok(())
//! # }
//! ```

mod call;
pub use call::{BatchElem, RpcCall};

mod context;
pub use context::CallContext;

mod errors;
pub use errors::ProviderError;

mod middleware;
pub use middleware::{
    batch_call_context_handler, batch_call_handler, call_context_handler, call_handler,
    BatchCallContextFn, BatchCallContextMiddleware, BatchCallFn, BatchCallMiddleware,
    CallContextFn, CallContextMiddleware, CallFn, CallMiddleware, HandlerFuture, Middleware,
    MiddlewareProvider, RpcMiddleware,
};

mod retry;
pub use retry::{new_retry_provider, RetryMiddleware, RetryPolicy, TransportRetryPolicy};

mod timeout;
pub use timeout::TimeoutProvider;

mod logging;
pub use logging::LoggingMiddleware;

mod reader;
pub use reader::ProviderReader;

mod subscription;
pub use subscription::Subscription;

mod transports;
pub use transports::*;

use async_trait::async_trait;
use ethers_core::types::{Address, Block, BlockNumber, Bytes, H256, U256, U64};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use wirekit_core::{Param, TransactionArgs};

/// A connection to a JSON-RPC node, or a layer wrapping one.
///
/// Results are returned as raw JSON; use [`RpcProviderExt::request`] to decode
/// them into a typed destination.
#[async_trait]
pub trait RpcProvider: Debug + Send + Sync {
    /// Issues a single call
    async fn call(&self, call: RpcCall) -> Result<Value, ProviderError>;

    /// Issues a single call bounded by `ctx`
    async fn call_context(&self, ctx: &CallContext, call: RpcCall)
        -> Result<Value, ProviderError>;

    /// Issues a batch and fills in each element's result or error slot
    async fn batch_call(&self, batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError>;

    /// Issues a batch bounded by `ctx`
    async fn batch_call_context(
        &self,
        ctx: &CallContext,
        batch: Vec<BatchElem>,
    ) -> Result<Vec<BatchElem>, ProviderError>;

    /// Opens a streaming subscription in `namespace` (e.g. `eth`)
    async fn subscribe(
        &self,
        ctx: &CallContext,
        namespace: &str,
        params: Vec<Param>,
    ) -> Result<Subscription, ProviderError>;

    /// Releases the underlying connection
    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Typed helpers on top of any [`RpcProvider`]
#[async_trait]
pub trait RpcProviderExt: RpcProvider {
    /// Sends `method` with `params` and decodes the result into `T`
    async fn request<T>(&self, method: &str, params: Vec<Param>) -> Result<T, ProviderError>
    where
        T: DeserializeOwned + Send,
    {
        let value = self.call(RpcCall::new(method, params)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// `eth_chainId`, `None` while the node does not report one
    async fn chain_id(&self) -> Result<Option<U64>, ProviderError> {
        self.request("eth_chainId", vec![]).await
    }

    /// `eth_gasPrice`
    async fn gas_price(&self) -> Result<U256, ProviderError> {
        self.request("eth_gasPrice", vec![]).await
    }

    /// `eth_estimateGas`
    async fn estimate_gas(
        &self,
        args: &TransactionArgs,
        block: BlockNumber,
    ) -> Result<U256, ProviderError> {
        let params = vec![Param::from(args.clone()), Param::from_serialize(&block)?];
        self.request("eth_estimateGas", params).await
    }

    /// `eth_getTransactionCount`
    async fn transaction_count(
        &self,
        address: Address,
        block: BlockNumber,
    ) -> Result<U256, ProviderError> {
        let params = vec![Param::from_serialize(&address)?, Param::from_serialize(&block)?];
        self.request("eth_getTransactionCount", params).await
    }

    /// `eth_getBlockByNumber`
    async fn block_by_number(
        &self,
        number: BlockNumber,
        full_transactions: bool,
    ) -> Result<Option<Block<Value>>, ProviderError> {
        let params = vec![Param::from_serialize(&number)?, Param::from(full_transactions)];
        self.request("eth_getBlockByNumber", params).await
    }

    /// `eth_sendTransaction`, returning the transaction hash
    async fn send_transaction(&self, args: TransactionArgs) -> Result<H256, ProviderError> {
        self.request("eth_sendTransaction", vec![Param::from(args)]).await
    }

    /// `eth_sendRawTransaction`, returning the transaction hash
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError> {
        self.request("eth_sendRawTransaction", vec![Param::from_serialize(&raw)?]).await
    }
}

impl<P: RpcProvider + ?Sized> RpcProviderExt for P {}
