use crate::PopulateError;
use ethers_core::types::{
    transaction::{eip2718::TypedTransaction, eip2930::AccessList},
    Address, Bytes, Eip1559TransactionRequest, Eip2930TransactionRequest, NameOrAddress,
    TransactionRequest, U256, U64,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The EIP-2718 envelope type of a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxType {
    /// Pre-EIP-2718 transaction priced with a single gas price
    Legacy,
    /// EIP-2930 transaction with an access list, priced with a single gas price
    AccessList,
    /// EIP-1559 fee-market transaction
    DynamicFee,
}

impl TxType {
    /// The numeric type tag
    pub fn as_u64(self) -> u64 {
        match self {
            TxType::Legacy => 0,
            TxType::AccessList => 1,
            TxType::DynamicFee => 2,
        }
    }
}

impl TryFrom<u64> for TxType {
    type Error = u64;

    fn try_from(tag: u64) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(TxType::Legacy),
            1 => Ok(TxType::AccessList),
            2 => Ok(TxType::DynamicFee),
            other => Err(other),
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.as_u64())
    }
}

impl Serialize for TxType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        U64::from(self.as_u64()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TxType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = U64::deserialize(deserializer)?;
        TxType::try_from(tag.as_u64())
            .map_err(|tag| de::Error::custom(format!("unknown transaction type {tag}")))
    }
}

/// A partially-specified transaction intent, as accepted by `eth_sendTransaction`.
///
/// Fields left as `None` are filled in by [`TransactionArgs::populate`]. The
/// legacy `gas_price` and the EIP-1559 fee pair are mutually exclusive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionArgs {
    /// Sender address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,

    /// Recipient address, `None` for contract creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,

    /// Legacy gas price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,

    /// EIP-1559 fee cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,

    /// EIP-1559 tip cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,

    /// Transferred value in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,

    /// Sender nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,

    /// Call data or contract init code
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,

    /// EIP-2930 access list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,

    /// Chain id used for replay protection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U64>,

    /// Envelope type; resolved during population when absent
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TxType>,
}

impl TransactionArgs {
    /// Creates empty transaction arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `from` field
    #[must_use]
    pub fn from<T: Into<Address>>(mut self, from: T) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the `to` field
    #[must_use]
    pub fn to<T: Into<Address>>(mut self, to: T) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Sets the `gas` field
    #[must_use]
    pub fn gas<T: Into<U256>>(mut self, gas: T) -> Self {
        self.gas = Some(gas.into());
        self
    }

    /// Sets the legacy `gas_price` field
    #[must_use]
    pub fn gas_price<T: Into<U256>>(mut self, gas_price: T) -> Self {
        self.gas_price = Some(gas_price.into());
        self
    }

    /// Sets the `max_fee_per_gas` field
    #[must_use]
    pub fn max_fee_per_gas<T: Into<U256>>(mut self, max_fee_per_gas: T) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas.into());
        self
    }

    /// Sets the `max_priority_fee_per_gas` field
    #[must_use]
    pub fn max_priority_fee_per_gas<T: Into<U256>>(mut self, max_priority_fee_per_gas: T) -> Self {
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas.into());
        self
    }

    /// Sets the `value` field
    #[must_use]
    pub fn value<T: Into<U256>>(mut self, value: T) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the `nonce` field
    #[must_use]
    pub fn nonce<T: Into<U256>>(mut self, nonce: T) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the `data` field
    #[must_use]
    pub fn data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Sets the `access_list` field
    #[must_use]
    pub fn access_list(mut self, access_list: AccessList) -> Self {
        self.access_list = Some(access_list);
        self
    }

    /// Sets the `chain_id` field
    #[must_use]
    pub fn chain_id<T: Into<U64>>(mut self, chain_id: T) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    /// Sets the envelope type
    #[must_use]
    pub fn transaction_type(mut self, transaction_type: TxType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    /// Returns `true` if either of the EIP-1559 fee fields is set
    pub fn has_fee_market_fields(&self) -> bool {
        self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }

    pub(crate) fn data_is_empty(&self) -> bool {
        self.data.as_ref().map(|data| data.as_ref().is_empty()).unwrap_or(true)
    }

    /// Converts fully-populated arguments into a signable transaction.
    ///
    /// This is a pure conversion; call [`TransactionArgs::populate`] first.
    pub fn to_transaction(&self) -> Result<TypedTransaction, PopulateError> {
        let (nonce, gas, tx_type) = match (self.nonce, self.gas, self.transaction_type) {
            (Some(nonce), Some(gas), Some(tx_type)) => (nonce, gas, tx_type),
            _ => return Err(PopulateError::Incomplete),
        };
        let value = self.value.unwrap_or_default();
        let data = self.data.clone().unwrap_or_default();

        let tx = match tx_type {
            TxType::Legacy | TxType::AccessList => {
                let mut request =
                    TransactionRequest::new().nonce(nonce).gas(gas).value(value).data(data);
                if let Some(from) = self.from {
                    request = request.from(from);
                }
                if let Some(to) = self.to {
                    request = request.to(to);
                }
                if let Some(gas_price) = self.gas_price {
                    request = request.gas_price(gas_price);
                }
                if let Some(chain_id) = self.chain_id {
                    request = request.chain_id(chain_id);
                }

                if tx_type == TxType::Legacy {
                    TypedTransaction::Legacy(request)
                } else {
                    let access_list = self.access_list.clone().unwrap_or_default();
                    TypedTransaction::Eip2930(Eip2930TransactionRequest::new(request, access_list))
                }
            }
            TxType::DynamicFee => {
                let mut request = Eip1559TransactionRequest::new()
                    .nonce(nonce)
                    .gas(gas)
                    .value(value)
                    .data(data)
                    .access_list(self.access_list.clone().unwrap_or_default());
                if let Some(from) = self.from {
                    request = request.from(from);
                }
                if let Some(to) = self.to {
                    request = request.to(to);
                }
                if let Some(max_fee) = self.max_fee_per_gas {
                    request = request.max_fee_per_gas(max_fee);
                }
                if let Some(max_priority_fee) = self.max_priority_fee_per_gas {
                    request = request.max_priority_fee_per_gas(max_priority_fee);
                }
                if let Some(chain_id) = self.chain_id {
                    request = request.chain_id(chain_id);
                }
                TypedTransaction::Eip1559(request)
            }
        };

        Ok(tx)
    }

    /// Derives arguments from an existing transaction, e.g. to re-submit it
    /// with a bumped fee.
    ///
    /// Zero nonce, gas and fee values are treated as unset so that they get
    /// populated again.
    pub fn from_transaction(from: Address, tx: &TypedTransaction) -> Result<Self, PopulateError> {
        let mut args = TransactionArgs { from: Some(from), ..Default::default() };

        let (request, access_list) = match tx {
            TypedTransaction::Legacy(request) => {
                args.transaction_type = Some(TxType::Legacy);
                args.gas_price = request.gas_price.filter(|price| !price.is_zero());
                (CommonFields::from(request), None)
            }
            TypedTransaction::Eip2930(inner) => {
                args.transaction_type = Some(TxType::AccessList);
                args.gas_price = inner.tx.gas_price.filter(|price| !price.is_zero());
                (CommonFields::from(&inner.tx), Some(inner.access_list.clone()))
            }
            TypedTransaction::Eip1559(request) => {
                args.transaction_type = Some(TxType::DynamicFee);
                args.max_fee_per_gas = request.max_fee_per_gas.filter(|fee| !fee.is_zero());
                args.max_priority_fee_per_gas =
                    request.max_priority_fee_per_gas.filter(|fee| !fee.is_zero());
                (
                    CommonFields {
                        to: request.to.as_ref(),
                        gas: request.gas,
                        value: request.value,
                        nonce: request.nonce,
                        data: request.data.as_ref(),
                        chain_id: request.chain_id,
                    },
                    Some(request.access_list.clone()),
                )
            }
            #[allow(unreachable_patterns)]
            _ => return Err(PopulateError::UnsupportedTransaction),
        };

        args.to = match request.to {
            Some(NameOrAddress::Address(address)) => Some(*address),
            Some(NameOrAddress::Name(name)) => {
                return Err(PopulateError::UnresolvedName(name.clone()))
            }
            None => None,
        };
        args.nonce = request.nonce.filter(|nonce| !nonce.is_zero());
        args.gas = request.gas.filter(|gas| !gas.is_zero());
        args.value = Some(request.value.unwrap_or_default());
        args.data = Some(request.data.cloned().unwrap_or_default());
        args.access_list = access_list;
        args.chain_id = request.chain_id.filter(|id| !id.is_zero());

        Ok(args)
    }
}

/// Borrowed view over the fields every envelope type shares
struct CommonFields<'a> {
    to: Option<&'a NameOrAddress>,
    gas: Option<U256>,
    value: Option<U256>,
    nonce: Option<U256>,
    data: Option<&'a Bytes>,
    chain_id: Option<U64>,
}

impl<'a> From<&'a TransactionRequest> for CommonFields<'a> {
    fn from(request: &'a TransactionRequest) -> Self {
        Self {
            to: request.to.as_ref(),
            gas: request.gas,
            value: request.value,
            nonce: request.nonce,
            data: request.data.as_ref(),
            chain_id: request.chain_id,
        }
    }
}
