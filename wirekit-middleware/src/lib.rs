#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
//! Middleware for the wirekit provider pipeline.
//!
//! [`SignerMiddleware`] turns `eth_sendTransaction` calls into locally signed
//! `eth_sendRawTransaction` calls, using the key registered for the sender in
//! a [`SignerRegistry`](wirekit_signers::SignerRegistry). Every other method
//! passes through untouched.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wirekit_core::TransactionArgs;
//! use wirekit_middleware::new_signing_provider;
//! use wirekit_providers::{Http, RpcProviderExt};
//! use wirekit_signers::SignerRegistry;
//!
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let http: Http = "http://localhost:8545".parse()?;
//! let registry = Arc::new(SignerRegistry::from_private_keys([
//!     "dcf2cbdd171a21c480aa7f53d77f31bb102282b3ff099c78e3118b37348c72f7",
//! ])?);
//! let provider = new_signing_provider(Arc::new(http), registry.clone());
//!
//! let from = registry.default_signer().unwrap().address();
//! let tx = TransactionArgs::new().from(from).to(from).value(1u64);
//! let hash = provider.send_transaction(tx).await?;
//! # Ok(())
//! # }
//! ```

mod signer;
pub use signer::{
    new_signing_provider, SignerMiddleware, SignerMiddlewareError, METHOD_SEND_RAW_TRANSACTION,
    METHOD_SEND_TRANSACTION,
};
