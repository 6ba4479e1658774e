//! Deriving private keys from a BIP-39 mnemonic phrase along a BIP-32 path
use super::PrivateKeySigner;
use crate::SignerError;

use coins_bip32::path::DerivationPath;
use coins_bip39::{English, Mnemonic};
use ethers_core::k256::ecdsa::SigningKey;
use std::str::FromStr;

/// The Ethereum account prefix, the account index is appended as the last
/// path component
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0";

/// Options for deriving signers from a mnemonic phrase
#[derive(Clone, PartialEq, Eq)]
pub struct MnemonicOption {
    /// Path prefix the account index is appended to, default
    /// [`DEFAULT_DERIVATION_PATH`]
    pub base_derive_path: String,
    /// BIP-39 passphrase, default empty
    pub password: String,
}

impl Default for MnemonicOption {
    fn default() -> Self {
        Self { base_derive_path: DEFAULT_DERIVATION_PATH.to_string(), password: String::new() }
    }
}

// the passphrase stays out of logs
impl std::fmt::Debug for MnemonicOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MnemonicOption")
            .field("base_derive_path", &self.base_derive_path)
            .field("password", &(!self.password.is_empty()))
            .finish()
    }
}

impl MnemonicOption {
    #[must_use]
    pub fn base_derive_path(mut self, path: impl Into<String>) -> Self {
        self.base_derive_path = path.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// The full derivation path of account `index`
    pub fn derivation_path(&self, index: u32) -> Result<String, SignerError> {
        let path = format!("{}/{}", self.base_derive_path.trim_end_matches('/'), index);
        DerivationPath::from_str(&path)
            .map_err(|_| SignerError::InvalidDerivationPath(path.clone()))?;
        Ok(path)
    }
}

impl PrivateKeySigner {
    /// Derives the signer of account `index` from an English mnemonic phrase.
    ///
    /// ```
    /// use wirekit_signers::{MnemonicOption, PrivateKeySigner};
    ///
    /// let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    /// let signer = PrivateKeySigner::from_mnemonic(phrase, 0, &MnemonicOption::default()).unwrap();
    /// assert_eq!(signer.to_string(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    /// ```
    pub fn from_mnemonic(
        phrase: &str,
        index: u32,
        option: &MnemonicOption,
    ) -> Result<Self, SignerError> {
        let mnemonic = Mnemonic::<English>::new_from_phrase(phrase)?;
        derive_signer(&mnemonic, index, option)
    }
}

pub(crate) fn parse_mnemonic(phrase: &str) -> Result<Mnemonic<English>, SignerError> {
    Ok(Mnemonic::<English>::new_from_phrase(phrase)?)
}

pub(crate) fn derive_signer(
    mnemonic: &Mnemonic<English>,
    index: u32,
    option: &MnemonicOption,
) -> Result<PrivateKeySigner, SignerError> {
    let path = option.derivation_path(index)?;
    let derived_priv_key = mnemonic.derive_key(path.as_str(), Some(option.password.as_str()))?;
    let key: &coins_bip32::prelude::SigningKey = derived_priv_key.as_ref();
    let signer = SigningKey::from_bytes(&key.to_bytes())?;
    Ok(signer.into())
}
