#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
//! # Wirekit core types
//!
//! The data model shared by the provider pipeline and the signing layer:
//!
//! - [`Param`]: a positional JSON-RPC call argument, either plain JSON or an
//!   already-typed [`TransactionArgs`]
//! - [`TransactionArgs`]: a partially-specified transaction intent
//! - [`PopulateReader`]: the read-only node capability used to fill in the
//!   missing fields of a [`TransactionArgs`]
//!
//! ```
//! use wirekit_core::{TransactionArgs, TxType};
//! use ethers_core::types::{Address, U256};
//!
//! let args = TransactionArgs::new()
//!     .from(Address::random())
//!     .to(Address::random())
//!     .value(1u64)
//!     .gas_price(5u64);
//! assert_eq!(args.value, Some(U256::one()));
//! assert!(args.transaction_type.is_none());
//! # let _ = TxType::Legacy;
//! ```

mod param;
pub use param::Param;

mod transaction_args;
pub use transaction_args::{TransactionArgs, TxType};

mod populate;
pub use populate::{PopulateError, PopulateReader, DEFAULT_MAX_PRIORITY_FEE_PER_GAS};

/// Re-export of the Ethereum primitives used throughout the public API
pub use ethers_core::types;
