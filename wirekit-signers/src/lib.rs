#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
//! Local signers for wirekit.
//!
//! A [`Signer`] owns a private key and produces recoverable secp256k1
//! signatures over transactions and messages. [`SignerRegistry`] maps sender
//! addresses to signers so that the signing middleware can pick the right key
//! for a transaction.
//!
//! ```
//! use wirekit_signers::{PrivateKeySigner, Signer};
//!
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = "dcf2cbdd171a21c480aa7f53d77f31bb102282b3ff099c78e3118b37348c72f7"
//!     .parse::<PrivateKeySigner>()?;
//!
//! let signature = signer.sign_message(b"hello world")?;
//! signature.verify("hello world", signer.address())?;
//! # Ok(())
//! # }
//! ```

mod wallet;
pub use wallet::{MnemonicOption, PrivateKeySigner, DEFAULT_DERIVATION_PATH};

mod registry;
pub use registry::{RegistryError, SignerRegistry};

pub use coins_bip39;

use ethers_core::types::{transaction::eip2718::TypedTransaction, Address, Signature};
use std::fmt::Debug;
use thiserror::Error;

/// Applies [EIP155](https://eips.ethereum.org/EIPS/eip-155)
pub fn to_eip155_v<T: Into<u8>>(recovery_id: T, chain_id: Option<u64>) -> u64 {
    let standard_v: u8 = recovery_id.into();
    if let Some(chain_id) = chain_id {
        // When signing with a chain ID, add chain replay protection.
        (standard_v as u64) + 35 + chain_id * 2
    } else {
        // Otherwise, convert to 'Electrum' notation.
        (standard_v as u64) + 27
    }
}

/// Error thrown by a [`Signer`] or while constructing one
#[derive(Error, Debug)]
pub enum SignerError {
    /// Underlying eth keys error
    #[error(transparent)]
    Ecdsa(#[from] ethers_core::k256::ecdsa::Error),
    /// Error propagated from the BIP-32 crate
    #[error(transparent)]
    Bip32(#[from] coins_bip32::Bip32Error),
    /// Error propagated from the BIP-39 crate
    #[error(transparent)]
    Bip39(#[from] coins_bip39::MnemonicError),
    /// Error propagated by hex parsing
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// The derivation path could not be built from the configured prefix
    #[error("invalid derivation path `{0}`")]
    InvalidDerivationPath(String),
}

/// Trait for signing transactions and messages.
///
/// Implementations must be usable from several threads at once.
pub trait Signer: Debug + Send + Sync {
    /// The address controlled by this signer
    fn address(&self) -> Address;

    /// Signs the transaction's sighash for `chain_id`, returning a signature
    /// whose `v` carries EIP-155 replay protection
    fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<Signature, SignerError>;

    /// Signs the hash of the provided message after prefixing it
    /// (EIP-191 personal message)
    fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError>;
}
