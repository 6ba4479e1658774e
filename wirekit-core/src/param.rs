use crate::TransactionArgs;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A single positional argument of a JSON-RPC call.
///
/// Most arguments are plain JSON. Transaction intents may instead be carried
/// as a typed [`TransactionArgs`] so that layers which need to inspect them
/// (e.g. the signing middleware) can do so without a serialize/deserialize
/// round trip. Both variants serialize to the same wire representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// An untyped JSON value
    Json(Value),
    /// A typed transaction intent
    Transaction(Box<TransactionArgs>),
}

impl Param {
    /// Serializes any value into a [`Param::Json`]
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Param::Json)
    }

    /// Returns the JSON representation of this argument
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Param::Json(value) => Ok(value.clone()),
            Param::Transaction(args) => serde_json::to_value(args),
        }
    }

    /// Returns the inner JSON value if this is an untyped argument
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Param::Json(value) => Some(value),
            Param::Transaction(_) => None,
        }
    }
}

impl Serialize for Param {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Param::Json(value) => value.serialize(serializer),
            Param::Transaction(args) => args.serialize(serializer),
        }
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Json(value)
    }
}

impl From<TransactionArgs> for Param {
    fn from(args: TransactionArgs) -> Self {
        Param::Transaction(Box::new(args))
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Json(Value::String(s.to_owned()))
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Json(Value::String(s))
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Json(Value::Bool(b))
    }
}
