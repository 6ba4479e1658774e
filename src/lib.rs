#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![deny(rustdoc::broken_intra_doc_links)]
#![doc(test(no_crate_inject, attr(deny(rust_2018_idioms), allow(dead_code, unused_variables))))]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # wirekit
//!
//! A client-side access layer for Ethereum JSON-RPC nodes. Every outbound call
//! passes through a composable middleware pipeline; transactions sent with
//! `eth_sendTransaction` are populated and signed locally before they leave
//! the process.
//!
//! The quickest way in is [`Client`], which assembles the default stack:
//!
//! ```text
//! retry -> signing -> logging -> per-request timeout -> HTTP
//! ```
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use wirekit::{
//!     core::TransactionArgs, providers::RpcProviderExt, signers::SignerRegistry, Client,
//!     ClientOption,
//! };
//!
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(SignerRegistry::from_private_keys([
//!     "dcf2cbdd171a21c480aa7f53d77f31bb102282b3ff099c78e3118b37348c72f7",
//! ])?);
//! let option = ClientOption::default()
//!     .retry_count(3)
//!     .retry_interval(Duration::from_millis(500))
//!     .signer_registry(registry.clone());
//! let client = Client::new("http://localhost:8545", option)?;
//!
//! let from = registry.default_signer().unwrap().address();
//! let hash = client.send_transaction(TransactionArgs::new().from(from).to(from).value(1u64)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The member crates are re-exported as modules:
//!
//! - [`core`]: transaction arguments, call parameters and fee population
//! - [`providers`]: the [`RpcProvider`](providers::RpcProvider) capability,
//!   transports, the middleware pipeline, retry, timeout and logging layers
//! - [`signers`]: private key and mnemonic signers and the signer registry
//! - [`middleware`]: the signing layer

mod client;
pub use client::{Client, ClientError, ClientOption};

/// Transaction arguments, call parameters and fee-market population
pub mod core {
    pub use wirekit_core::*;
}

/// # Clients for interacting with Ethereum nodes
///
/// Transports, the middleware pipeline and the bundled retry, timeout and
/// logging layers.
pub mod providers {
    pub use wirekit_providers::*;
}

/// Local private key and mnemonic signers
pub mod signers {
    pub use wirekit_signers::*;
}

/// The transaction signing layer
pub mod middleware {
    pub use wirekit_middleware::*;
}

/// Easy imports of frequently used type definitions and traits
pub mod prelude {
    pub use super::{Client, ClientError, ClientOption};

    pub use wirekit_core::{types::*, Param, TransactionArgs, TxType};

    pub use wirekit_middleware::{new_signing_provider, SignerMiddleware};

    pub use wirekit_providers::{
        new_retry_provider, BatchElem, CallContext, Http, LoggingMiddleware, MiddlewareProvider,
        MockTransport, ProviderError, RetryMiddleware, RpcCall, RpcMiddleware, RpcProvider,
        RpcProviderExt, TimeoutProvider,
    };

    pub use wirekit_signers::{MnemonicOption, PrivateKeySigner, Signer, SignerRegistry};
}
