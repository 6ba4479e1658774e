//! Constructors for a [`PrivateKeySigner`] from raw key material
use super::PrivateKeySigner;
use crate::SignerError;
use ethers_core::{
    k256::{ecdsa::SigningKey, SecretKey as K256SecretKey},
    utils::secret_key_to_address,
};
use rand::{CryptoRng, Rng};
use std::str::FromStr;

impl PrivateKeySigner {
    /// Creates a new random keypair seeded with the provided RNG
    pub fn new<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        SigningKey::random(rng).into()
    }

    /// Creates a new random keypair from the thread-local RNG
    pub fn random() -> Self {
        Self::new(&mut rand::thread_rng())
    }

    /// Builds a signer from 32 raw big-endian key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        Ok(SigningKey::from_slice(bytes)?.into())
    }
}

impl PartialEq for PrivateKeySigner {
    fn eq(&self, other: &Self) -> bool {
        self.signer.to_bytes().eq(&other.signer.to_bytes()) && self.address == other.address
    }
}

impl From<SigningKey> for PrivateKeySigner {
    fn from(signer: SigningKey) -> Self {
        let address = secret_key_to_address(&signer);

        Self { signer, address }
    }
}

impl From<K256SecretKey> for PrivateKeySigner {
    fn from(key: K256SecretKey) -> Self {
        SigningKey::from(key).into()
    }
}

impl FromStr for PrivateKeySigner {
    type Err = SignerError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let src = src.strip_prefix("0x").unwrap_or(src);
        let src = hex::decode(src)?;
        Self::from_bytes(&src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Signer;
    use ethers_core::types::{
        transaction::eip2718::TypedTransaction, Address, Eip1559TransactionRequest,
        TransactionRequest,
    };

    fn transfer() -> TypedTransaction {
        TransactionRequest {
            from: None,
            to: Some("F0109fC8DF283027b6285cc889F5aA624EaC1F55".parse::<Address>().unwrap().into()),
            value: Some(1_000_000_000u64.into()),
            gas: Some(2_000_000u64.into()),
            nonce: Some(0u64.into()),
            gas_price: Some(21_000_000_000u128.into()),
            data: None,
            chain_id: None,
        }
        .into()
    }

    #[test]
    fn signs_msg() {
        let message = "Some data";
        let hash = ethers_core::utils::hash_message(message);
        let key = PrivateKeySigner::random();
        let address = key.address;

        // sign a message
        let signature = key.sign_message(message.as_bytes()).unwrap();

        // ecrecover via the message will hash internally
        let recovered = signature.recover(message).unwrap();

        // if provided with a hash, it will skip hashing
        let recovered2 = signature.recover(hash).unwrap();

        // verifies the signature is produced by `address`
        signature.verify(message, address).unwrap();

        assert_eq!(recovered, address);
        assert_eq!(recovered2, address);
        assert!(signature.v == 27 || signature.v == 28);
    }

    #[test]
    fn signs_tx_with_chain_id() {
        let chain_id = 1337u64;
        let tx = transfer();
        let signer: PrivateKeySigner =
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".parse().unwrap();

        let sig = signer.sign_transaction(&tx, chain_id).unwrap();

        // ensure correct v given the chain - first extract recid
        let recid = (sig.v - 35) % 2;
        // eip155 check
        assert_eq!(sig.v, chain_id * 2 + 35 + recid);

        // the signer sets the chain id before hashing
        let mut tx = tx;
        tx.set_chain_id(chain_id);
        sig.verify(tx.sighash(), signer.address).unwrap();
    }

    #[test]
    fn overrides_tx_chain_id() {
        let mut tx = transfer();
        tx.set_chain_id(1u64);
        let signer = PrivateKeySigner::random();

        let sig = signer.sign_transaction(&tx, 5).unwrap();
        assert!(sig.v == 45 || sig.v == 46);

        tx.set_chain_id(5u64);
        sig.verify(tx.sighash(), signer.address).unwrap();
    }

    #[test]
    fn signs_fee_market_tx() {
        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .to(Address::repeat_byte(2))
            .value(1u64)
            .nonce(7u64)
            .gas(21_000u64)
            .max_fee_per_gas(100u64)
            .max_priority_fee_per_gas(2u64)
            .into();
        let signer = PrivateKeySigner::random();

        let sig = signer.sign_transaction(&tx, 3).unwrap();
        let raw = tx.rlp_signed(&sig);
        // typed envelope
        assert_eq!(raw.as_ref()[0], 0x02);
    }

    #[test]
    fn key_to_address() {
        let signer: PrivateKeySigner =
            "0000000000000000000000000000000000000000000000000000000000000001".parse().unwrap();
        assert_eq!(
            signer.address,
            Address::from_str("7E5F4552091A69125d5DfCb7b8C2659029395Bdf").expect("Decoding failed")
        );

        let signer: PrivateKeySigner =
            "0x0000000000000000000000000000000000000000000000000000000000000002".parse().unwrap();
        assert_eq!(
            signer.address,
            Address::from_str("2B5AD5c4795c026514f8317c7a215E218DcCD6cF").expect("Decoding failed")
        );

        let signer: PrivateKeySigner =
            "9ec393923a14eeb557600010ea05d635c667a6995418f8a8f4bdecc63dfe0bb9".parse().unwrap();
        assert_eq!(
            signer.address,
            Address::from_str("e6D148D8398c4cb456196C776D2d9093Dd62C9B0").expect("Decoding failed")
        );
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!("zz".parse::<PrivateKeySigner>(), Err(SignerError::Hex(_))));
        assert!(matches!("0x0102".parse::<PrivateKeySigner>(), Err(SignerError::Ecdsa(_))));
        let zero = "0000000000000000000000000000000000000000000000000000000000000000";
        assert!(zero.parse::<PrivateKeySigner>().is_err());
    }

    #[test]
    fn never_prints_the_key() {
        let key = "0000000000000000000000000000000000000000000000000000000000000001";
        let signer: PrivateKeySigner = key.parse().unwrap();

        let debug = format!("{signer:?}");
        assert!(debug.contains("address"));
        assert!(!debug.contains(key));
        assert_eq!(signer.to_string(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }
}
