use crate::{TransactionArgs, TxType};
use async_trait::async_trait;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Block, BlockNumber, U256, U64,
};
use serde_json::Value;
use std::error::Error;
use thiserror::Error;

/// The priority fee used for fee-market transactions when the caller did not
/// pick one: 1.5 gwei.
pub const DEFAULT_MAX_PRIORITY_FEE_PER_GAS: u64 = 1_500_000_000;

/// The read-only node queries needed to populate [`TransactionArgs`].
#[async_trait]
pub trait PopulateReader: Send + Sync {
    /// The error returned by the underlying node connection
    type Error: Error + Send + Sync + 'static;

    /// The chain id, `None` if the node does not know it yet
    async fn chain_id(&self) -> Result<Option<U64>, Self::Error>;

    /// The node's suggested legacy gas price
    async fn gas_price(&self) -> Result<U256, Self::Error>;

    /// Estimates the gas needed to execute `args` against `block`
    async fn estimate_gas(
        &self,
        args: &TransactionArgs,
        block: BlockNumber,
    ) -> Result<U256, Self::Error>;

    /// The number of transactions sent from `address` as of `block`
    async fn transaction_count(
        &self,
        address: Address,
        block: BlockNumber,
    ) -> Result<U256, Self::Error>;

    /// Fetches a block by number
    async fn block_by_number(
        &self,
        number: BlockNumber,
        full_transactions: bool,
    ) -> Result<Option<Block<Value>>, Self::Error>;
}

/// Errors raised while populating or converting [`TransactionArgs`]
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("sender required")]
    MissingSender,
    #[error("both gasPrice and (maxFeePerGas or maxPriorityFeePerGas) specified")]
    ConflictingFeeFields,
    #[error("maxFeePerGas or maxPriorityFeePerGas specified but chain does not support the fee market")]
    FeeMarketUnsupported,
    #[error("maxFeePerGas or maxPriorityFeePerGas specified for a legacy or access list transaction")]
    FeeMarketFieldsOnLegacy,
    #[error("maxFeePerGas ({max_fee}) < maxPriorityFeePerGas ({max_priority_fee})")]
    FeeOrdering { max_fee: U256, max_priority_fee: U256 },
    #[error("contract creation requires data")]
    ContractCreationWithoutData,
    #[error("chain not ready")]
    ChainNotReady,
    #[error("transaction arguments are not fully populated")]
    Incomplete,
    #[error("cannot derive arguments from an unsupported transaction type")]
    UnsupportedTransaction,
    #[error("recipient `{0}` is an unresolved ENS name")]
    UnresolvedName(String),
    /// The reader failed while answering one of the population queries
    #[error("{action}: {source}")]
    Reader {
        action: &'static str,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

fn reader_error<E: Error + Send + Sync + 'static>(
    action: &'static str,
) -> impl FnOnce(E) -> PopulateError {
    move |err| PopulateError::Reader { action, source: Box::new(err) }
}

impl TransactionArgs {
    /// Fills every missing field by querying `reader`.
    ///
    /// Picks the envelope type from the latest block's base fee unless one was
    /// set explicitly, then resolves fees, value, nonce, gas and chain id.
    /// Fields that are already set are left untouched.
    pub async fn populate<R>(&mut self, reader: &R) -> Result<(), PopulateError>
    where
        R: PopulateReader + ?Sized,
    {
        let from = self.from.ok_or(PopulateError::MissingSender)?;

        self.populate_fees(reader).await?;

        if self.value.is_none() {
            self.value = Some(U256::zero());
        }

        if self.nonce.is_none() {
            let nonce = match reader.transaction_count(from, BlockNumber::Pending).await {
                Ok(nonce) => nonce,
                Err(err) => {
                    tracing::debug!(%err, "pending nonce unavailable, falling back to latest");
                    reader
                        .transaction_count(from, BlockNumber::Latest)
                        .await
                        .map_err(reader_error("fetching nonce"))?
                }
            };
            self.nonce = Some(nonce);
        }

        if self.to.is_none() && self.data_is_empty() {
            return Err(PopulateError::ContractCreationWithoutData)
        }

        if self.gas.is_none() {
            let gas = reader
                .estimate_gas(self, BlockNumber::Pending)
                .await
                .map_err(reader_error("estimating gas"))?;
            self.gas = Some(gas);
        }

        if self.chain_id.is_none() {
            let chain_id = reader
                .chain_id()
                .await
                .map_err(reader_error("fetching chain id"))?
                .ok_or(PopulateError::ChainNotReady)?;
            self.chain_id = Some(chain_id);
        }

        Ok(())
    }

    /// Populates the arguments and converts them into a signable transaction
    pub async fn populate_and_into_transaction<R>(
        mut self,
        reader: &R,
    ) -> Result<TypedTransaction, PopulateError>
    where
        R: PopulateReader + ?Sized,
    {
        self.populate(reader).await?;
        self.to_transaction()
    }

    async fn populate_fees<R>(&mut self, reader: &R) -> Result<(), PopulateError>
    where
        R: PopulateReader + ?Sized,
    {
        if self.gas_price.is_some() && self.has_fee_market_fields() {
            return Err(PopulateError::ConflictingFeeFields)
        }

        let head = reader
            .block_by_number(BlockNumber::Latest, false)
            .await
            .map_err(reader_error("fetching latest block"))?
            .ok_or(PopulateError::ChainNotReady)?;
        let base_fee = head.base_fee_per_gas;

        let tx_type = match self.transaction_type {
            Some(tx_type) => tx_type,
            None if base_fee.is_some() => TxType::DynamicFee,
            None if self.has_fee_market_fields() => {
                return Err(PopulateError::FeeMarketUnsupported)
            }
            None if self.access_list.is_some() => TxType::AccessList,
            None => TxType::Legacy,
        };
        tracing::trace!(%tx_type, ?base_fee, "resolved transaction type");
        self.transaction_type = Some(tx_type);

        match tx_type {
            TxType::DynamicFee => self.populate_fee_market(reader, base_fee).await,
            TxType::Legacy | TxType::AccessList => {
                if self.has_fee_market_fields() {
                    return Err(PopulateError::FeeMarketFieldsOnLegacy)
                }
                if self.gas_price.is_none() {
                    let gas_price =
                        reader.gas_price().await.map_err(reader_error("fetching gas price"))?;
                    self.gas_price = Some(gas_price);
                }
                Ok(())
            }
        }
    }

    async fn populate_fee_market<R>(
        &mut self,
        reader: &R,
        base_fee: Option<U256>,
    ) -> Result<(), PopulateError>
    where
        R: PopulateReader + ?Sized,
    {
        // a legacy price on a fee-market transaction caps both fees
        if let Some(gas_price) = self.gas_price.take() {
            self.max_fee_per_gas = Some(gas_price);
            self.max_priority_fee_per_gas = Some(gas_price);
        }

        match base_fee {
            Some(base_fee) => {
                let max_priority_fee = *self
                    .max_priority_fee_per_gas
                    .get_or_insert(DEFAULT_MAX_PRIORITY_FEE_PER_GAS.into());
                if self.max_fee_per_gas.is_none() {
                    self.max_fee_per_gas =
                        Some(base_fee.saturating_mul(2.into()).saturating_add(max_priority_fee));
                }
            }
            None if self.max_fee_per_gas.is_none() || self.max_priority_fee_per_gas.is_none() => {
                let gas_price =
                    reader.gas_price().await.map_err(reader_error("fetching gas price"))?;
                self.max_fee_per_gas.get_or_insert(gas_price);
                self.max_priority_fee_per_gas.get_or_insert(gas_price);
            }
            None => {}
        }

        if let (Some(max_fee), Some(max_priority_fee)) =
            (self.max_fee_per_gas, self.max_priority_fee_per_gas)
        {
            if max_fee < max_priority_fee {
                return Err(PopulateError::FeeOrdering { max_fee, max_priority_fee })
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{
        transaction::eip2930::{AccessList, AccessListItem},
        Bytes,
    };
    use parking_lot::Mutex;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct FakeError(&'static str);

    /// Answers population queries from fixed values and records every query
    struct FakeReader {
        chain_id: Option<u64>,
        gas_price: u64,
        base_fee: Option<u64>,
        pending_nonce: Option<u64>,
        latest_nonce: Option<u64>,
        gas: u64,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeReader {
        fn legacy_chain() -> Self {
            Self {
                chain_id: Some(3),
                gas_price: 5,
                base_fee: None,
                pending_nonce: Some(0),
                latest_nonce: Some(0),
                gas: 21_000,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn fee_market_chain(base_fee: u64) -> Self {
            Self { base_fee: Some(base_fee), ..Self::legacy_chain() }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl PopulateReader for FakeReader {
        type Error = FakeError;

        async fn chain_id(&self) -> Result<Option<U64>, FakeError> {
            self.calls.lock().push("chain_id");
            Ok(self.chain_id.map(Into::into))
        }

        async fn gas_price(&self) -> Result<U256, FakeError> {
            self.calls.lock().push("gas_price");
            Ok(self.gas_price.into())
        }

        async fn estimate_gas(
            &self,
            _args: &TransactionArgs,
            block: BlockNumber,
        ) -> Result<U256, FakeError> {
            assert_eq!(block, BlockNumber::Pending);
            self.calls.lock().push("estimate_gas");
            Ok(self.gas.into())
        }

        async fn transaction_count(
            &self,
            _address: Address,
            block: BlockNumber,
        ) -> Result<U256, FakeError> {
            let (label, nonce) = match block {
                BlockNumber::Pending => ("pending_nonce", self.pending_nonce),
                _ => ("latest_nonce", self.latest_nonce),
            };
            self.calls.lock().push(label);
            nonce.map(Into::into).ok_or(FakeError("nonce unavailable"))
        }

        async fn block_by_number(
            &self,
            _number: BlockNumber,
            _full_transactions: bool,
        ) -> Result<Option<Block<Value>>, FakeError> {
            self.calls.lock().push("block");
            Ok(Some(Block { base_fee_per_gas: self.base_fee.map(Into::into), ..Default::default() }))
        }
    }

    fn transfer() -> TransactionArgs {
        TransactionArgs::new()
            .from(Address::repeat_byte(0x11))
            .to(Address::repeat_byte(0x22))
            .value(1u64)
    }

    #[tokio::test]
    async fn fee_market_defaults() {
        let reader = FakeReader::fee_market_chain(100);
        let mut args = transfer();
        args.populate(&reader).await.unwrap();

        let priority = U256::from(DEFAULT_MAX_PRIORITY_FEE_PER_GAS);
        assert_eq!(args.transaction_type, Some(TxType::DynamicFee));
        assert!(args.gas_price.is_none());
        assert_eq!(args.max_priority_fee_per_gas, Some(priority));
        assert_eq!(args.max_fee_per_gas, Some(U256::from(200) + priority));
        assert!(args.max_fee_per_gas >= args.max_priority_fee_per_gas);
        assert!(!reader.calls().contains(&"gas_price"));
    }

    #[tokio::test]
    async fn max_fee_uses_resolved_priority_fee() {
        let reader = FakeReader::fee_market_chain(10);
        let mut args = transfer().max_priority_fee_per_gas(7u64);
        args.populate(&reader).await.unwrap();
        assert_eq!(args.max_fee_per_gas, Some(27u64.into()));
    }

    #[tokio::test]
    async fn legacy_price_on_fee_market_chain_caps_both_fees() {
        let reader = FakeReader::fee_market_chain(1);
        let mut args = transfer().gas_price(40u64);
        args.populate(&reader).await.unwrap();

        assert_eq!(args.transaction_type, Some(TxType::DynamicFee));
        assert!(args.gas_price.is_none());
        assert_eq!(args.max_fee_per_gas, Some(40u64.into()));
        assert_eq!(args.max_priority_fee_per_gas, Some(40u64.into()));
    }

    #[tokio::test]
    async fn legacy_chain_keeps_explicit_price() {
        let reader = FakeReader::legacy_chain();
        let mut args = transfer().gas_price(9u64);
        args.populate(&reader).await.unwrap();

        assert_eq!(args.transaction_type, Some(TxType::Legacy));
        assert_eq!(args.gas_price, Some(9u64.into()));
        assert!(!args.has_fee_market_fields());
        assert!(!reader.calls().contains(&"gas_price"));
    }

    #[tokio::test]
    async fn conflicting_fees_fail_before_any_query() {
        let reader = FakeReader::fee_market_chain(1);
        let mut args = transfer().gas_price(1u64).max_fee_per_gas(2u64);
        let err = args.populate(&reader).await.unwrap_err();

        assert!(matches!(err, PopulateError::ConflictingFeeFields));
        assert!(reader.calls().is_empty());
    }

    #[tokio::test]
    async fn fee_fields_without_fee_market() {
        let reader = FakeReader::legacy_chain();
        let err = transfer().max_fee_per_gas(2u64).populate(&reader).await.unwrap_err();
        assert!(matches!(err, PopulateError::FeeMarketUnsupported));

        let mut args = transfer().max_fee_per_gas(2u64).transaction_type(TxType::Legacy);
        let err = args.populate(&reader).await.unwrap_err();
        assert!(matches!(err, PopulateError::FeeMarketFieldsOnLegacy));
    }

    #[tokio::test]
    async fn explicit_fee_market_without_base_fee_uses_gas_price() {
        let reader = FakeReader::legacy_chain();
        let mut args = transfer().transaction_type(TxType::DynamicFee);
        args.populate(&reader).await.unwrap();

        assert_eq!(args.max_fee_per_gas, Some(5u64.into()));
        assert_eq!(args.max_priority_fee_per_gas, Some(5u64.into()));
    }

    #[tokio::test]
    async fn rejects_misordered_fees() {
        let reader = FakeReader::fee_market_chain(1);
        let mut args = transfer().max_fee_per_gas(1u64).max_priority_fee_per_gas(2u64);
        let err = args.populate(&reader).await.unwrap_err();
        assert!(matches!(
            err,
            PopulateError::FeeOrdering { max_fee, max_priority_fee }
                if max_fee == 1u64.into() && max_priority_fee == 2u64.into()
        ));
    }

    #[tokio::test]
    async fn access_list_selects_access_list_type() {
        let reader = FakeReader::legacy_chain();
        let item = AccessListItem { address: Address::repeat_byte(0x33), storage_keys: vec![] };
        let mut args = transfer().access_list(AccessList(vec![item]));
        args.populate(&reader).await.unwrap();

        assert_eq!(args.transaction_type, Some(TxType::AccessList));
        assert_eq!(args.gas_price, Some(5u64.into()));
    }

    #[tokio::test]
    async fn prefers_pending_nonce() {
        let reader = FakeReader {
            pending_nonce: Some(4),
            latest_nonce: Some(2),
            ..FakeReader::legacy_chain()
        };
        let mut args = transfer();
        args.populate(&reader).await.unwrap();

        assert_eq!(args.nonce, Some(4u64.into()));
        assert!(!reader.calls().contains(&"latest_nonce"));
    }

    #[tokio::test]
    async fn falls_back_to_latest_nonce() {
        let reader =
            FakeReader { pending_nonce: None, latest_nonce: Some(2), ..FakeReader::legacy_chain() };
        let mut args = transfer();
        args.populate(&reader).await.unwrap();
        assert_eq!(args.nonce, Some(2u64.into()));

        let reader =
            FakeReader { pending_nonce: None, latest_nonce: None, ..FakeReader::legacy_chain() };
        let err = transfer().populate(&reader).await.unwrap_err();
        assert!(matches!(err, PopulateError::Reader { action: "fetching nonce", .. }));
    }

    #[tokio::test]
    async fn contract_creation_requires_data() {
        let reader = FakeReader::legacy_chain();
        let mut args = TransactionArgs::new().from(Address::repeat_byte(0x11));
        let err = args.populate(&reader).await.unwrap_err();
        assert_eq!(err.to_string(), "contract creation requires data");

        let mut args = TransactionArgs::new()
            .from(Address::repeat_byte(0x11))
            .data(Bytes::from(vec![0x60, 0x80]));
        args.populate(&reader).await.unwrap();
        assert!(args.to.is_none());
    }

    #[tokio::test]
    async fn missing_sender_and_chain() {
        let reader = FakeReader::legacy_chain();
        let err = TransactionArgs::new().populate(&reader).await.unwrap_err();
        assert_eq!(err.to_string(), "sender required");
        assert!(reader.calls().is_empty());

        let reader = FakeReader { chain_id: None, ..FakeReader::legacy_chain() };
        let err = transfer().populate(&reader).await.unwrap_err();
        assert!(matches!(err, PopulateError::ChainNotReady));
    }

    #[tokio::test]
    async fn populates_legacy_transfer() {
        let reader = FakeReader::legacy_chain();
        let tx = transfer().populate_and_into_transaction(&reader).await.unwrap();

        match tx {
            TypedTransaction::Legacy(tx) => {
                assert_eq!(tx.nonce, Some(0u64.into()));
                assert_eq!(tx.gas_price, Some(5u64.into()));
                assert_eq!(tx.gas, Some(21_000u64.into()));
                assert_eq!(tx.chain_id, Some(3u64.into()));
                assert_eq!(tx.value, Some(1u64.into()));
                assert_eq!(tx.to, Some(Address::repeat_byte(0x22).into()));
            }
            other => panic!("expected legacy transaction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn keeps_caller_supplied_fields() {
        let reader = FakeReader::legacy_chain();
        let mut args = transfer().nonce(8u64).gas(50_000u64).chain_id(10u64).gas_price(1u64);
        args.populate(&reader).await.unwrap();

        assert_eq!(args.nonce, Some(8u64.into()));
        assert_eq!(args.gas, Some(50_000u64.into()));
        assert_eq!(args.chain_id, Some(10u64.into()));
        assert_eq!(reader.calls(), vec!["block"]);
    }
}
