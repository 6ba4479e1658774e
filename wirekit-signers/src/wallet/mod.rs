mod mnemonic;
pub use mnemonic::{MnemonicOption, DEFAULT_DERIVATION_PATH};
pub(crate) use mnemonic::{derive_signer, parse_mnemonic};

mod private_key;

use crate::{to_eip155_v, Signer, SignerError};
use ethers_core::{
    k256::ecdsa::SigningKey,
    types::{transaction::eip2718::TypedTransaction, Address, Signature, H256, U256},
    utils::{hash_message, to_checksum},
};
use std::fmt;

/// A signer backed by a secp256k1 private key held in memory.
///
/// The key never leaves the struct: neither `Debug` nor `Display` print it.
#[derive(Clone)]
pub struct PrivateKeySigner {
    pub(crate) signer: SigningKey,
    pub(crate) address: Address,
}

impl Signer for PrivateKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<Signature, SignerError> {
        let mut tx_with_chain = tx.clone();
        tx_with_chain.set_chain_id(chain_id);
        let sighash = tx_with_chain.sighash();
        self.sign_hash_with_eip155(sighash, Some(chain_id))
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let message_hash = hash_message(message);
        self.sign_hash_with_eip155(message_hash, None)
    }
}

impl PrivateKeySigner {
    fn sign_hash_with_eip155(
        &self,
        hash: H256,
        chain_id: Option<u64>,
    ) -> Result<Signature, SignerError> {
        let (signature, recovery_id) = self.signer.sign_prehash_recoverable(hash.as_ref())?;

        let v = to_eip155_v(recovery_id, chain_id);
        let (r_bytes, s_bytes) = signature.split_bytes();
        let r = U256::from_big_endian(&r_bytes[..]);
        let s = U256::from_big_endian(&s_bytes[..]);

        Ok(Signature { r, s, v })
    }

    /// Returns the underlying signing key
    pub fn signer(&self) -> &SigningKey {
        &self.signer
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Debug for PrivateKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeySigner").field("address", &self.address).finish()
    }
}

impl fmt::Display for PrivateKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_checksum(&self.address, None))
    }
}
