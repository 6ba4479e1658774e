use crate::{CallContext, ProviderError, RpcCall, RpcProvider};
use async_trait::async_trait;
use ethers_core::types::{Address, Block, BlockNumber, U256, U64};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use wirekit_core::{Param, PopulateReader, TransactionArgs};

/// Answers [`PopulateReader`] queries with calls to a provider, optionally
/// bounded by a caller's [`CallContext`]
#[derive(Debug, Clone)]
pub struct ProviderReader {
    provider: Arc<dyn RpcProvider>,
    ctx: Option<CallContext>,
}

impl ProviderReader {
    pub fn new(provider: Arc<dyn RpcProvider>) -> Self {
        Self { provider, ctx: None }
    }

    /// Issues every query through the context-bearing call shape
    #[must_use]
    pub fn with_context(mut self, ctx: CallContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Param>,
    ) -> Result<T, ProviderError> {
        let call = RpcCall::new(method, params);
        let value = match &self.ctx {
            Some(ctx) => self.provider.call_context(ctx, call).await?,
            None => self.provider.call(call).await?,
        };
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl PopulateReader for ProviderReader {
    type Error = ProviderError;

    async fn chain_id(&self) -> Result<Option<U64>, ProviderError> {
        self.request("eth_chainId", vec![]).await
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        self.request("eth_gasPrice", vec![]).await
    }

    async fn estimate_gas(
        &self,
        args: &TransactionArgs,
        block: BlockNumber,
    ) -> Result<U256, ProviderError> {
        let params = vec![Param::from(args.clone()), Param::from_serialize(&block)?];
        self.request("eth_estimateGas", params).await
    }

    async fn transaction_count(
        &self,
        address: Address,
        block: BlockNumber,
    ) -> Result<U256, ProviderError> {
        let params = vec![Param::from_serialize(&address)?, Param::from_serialize(&block)?];
        self.request("eth_getTransactionCount", params).await
    }

    async fn block_by_number(
        &self,
        number: BlockNumber,
        full_transactions: bool,
    ) -> Result<Option<Block<Value>>, ProviderError> {
        let params = vec![Param::from_serialize(&number)?, Param::from(full_transactions)];
        self.request("eth_getBlockByNumber", params).await
    }
}
