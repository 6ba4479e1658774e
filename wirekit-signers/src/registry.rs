use crate::{
    wallet::{derive_signer, parse_mnemonic},
    MnemonicOption, PrivateKeySigner, Signer, SignerError,
};
use ethers_core::types::Address;
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("signer for {0:?} already registered")]
    AlreadyRegistered(Address),
    #[error("signer not found")]
    NotFound,
    #[error(transparent)]
    Signer(#[from] SignerError),
}

#[derive(Default)]
struct Signers {
    by_address: HashMap<Address, Arc<dyn Signer>>,
    // insertion order
    ordered: Vec<Arc<dyn Signer>>,
}

/// Maps sender addresses to the signers holding their keys.
///
/// At most one signer is registered per address. All operations lock a
/// single mutex, so a registry can be shared across tasks behind an `Arc`.
#[derive(Default)]
pub struct SignerRegistry {
    signers: Mutex<Signers>,
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every signer in order, failing on the first duplicate address
    pub fn from_signers<I>(signers: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Arc<dyn Signer>>,
    {
        let registry = Self::new();
        for signer in signers {
            registry.add(signer)?;
        }
        Ok(registry)
    }

    /// Registers a [`PrivateKeySigner`] for each hex encoded key
    pub fn from_private_keys<I, S>(keys: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = Self::new();
        for key in keys {
            let signer: PrivateKeySigner = key.as_ref().parse()?;
            registry.add(Arc::new(signer))?;
        }
        Ok(registry)
    }

    /// Registers the first `count` accounts derived from `phrase`
    pub fn from_mnemonic(
        phrase: &str,
        count: u32,
        option: &MnemonicOption,
    ) -> Result<Self, RegistryError> {
        let mnemonic = parse_mnemonic(phrase)?;
        let registry = Self::new();
        for index in 0..count {
            registry.add(Arc::new(derive_signer(&mnemonic, index, option)?))?;
        }
        Ok(registry)
    }

    pub fn add(&self, signer: Arc<dyn Signer>) -> Result<(), RegistryError> {
        let address = signer.address();
        let mut signers = self.signers.lock();
        if signers.by_address.contains_key(&address) {
            return Err(RegistryError::AlreadyRegistered(address))
        }
        signers.by_address.insert(address, signer.clone());
        signers.ordered.push(signer);
        Ok(())
    }

    pub fn remove(&self, address: Address) -> Result<Arc<dyn Signer>, RegistryError> {
        let mut signers = self.signers.lock();
        let signer = signers.by_address.remove(&address).ok_or(RegistryError::NotFound)?;
        signers.ordered.retain(|s| s.address() != address);
        Ok(signer)
    }

    pub fn get(&self, address: Address) -> Result<Arc<dyn Signer>, RegistryError> {
        self.signers.lock().by_address.get(&address).cloned().ok_or(RegistryError::NotFound)
    }

    /// All signers in registration order
    pub fn list(&self) -> Vec<Arc<dyn Signer>> {
        self.signers.lock().ordered.clone()
    }

    /// The earliest registered signer still present
    pub fn default_signer(&self) -> Option<Arc<dyn Signer>> {
        self.signers.lock().ordered.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.signers.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SignerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses: Vec<Address> =
            self.signers.lock().ordered.iter().map(|signer| signer.address()).collect();
        f.debug_struct("SignerRegistry").field("addresses", &addresses).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const KEY_A: &str = "9ec393923a14eeb557600010ea05d635c667a6995418f8a8f4bdecc63dfe0bb9";
    const KEY_B: &str = "0x1ab8ec2627e19007d2c62145df6acf51f16b8fd93b0a27c01dae4eb271aadee1";

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn lookups() {
        let registry = SignerRegistry::from_private_keys([KEY_A, KEY_B]).unwrap();
        let a = addr("0xe6D148D8398c4cb456196C776D2d9093Dd62C9B0");
        let b = addr("0x3a3347C42705C5328012dE9a38b030128eee4F83");

        assert_eq!(registry.get(a).unwrap().address(), a);
        assert_eq!(registry.get(b).unwrap().address(), b);

        let listed: Vec<_> = registry.list().iter().map(|s| s.address()).collect();
        assert_eq!(listed, [a, b]);
        assert_eq!(registry.default_signer().unwrap().address(), a);

        let err = registry.get(Address::zero()).unwrap_err();
        assert_eq!(err.to_string(), "signer not found");
    }

    #[test]
    fn rejects_duplicates() {
        let registry = SignerRegistry::from_private_keys([KEY_A]).unwrap();
        let again: PrivateKeySigner = KEY_A.parse().unwrap();
        let err = registry.add(Arc::new(again)).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
        assert_eq!(registry.len(), 1);

        assert!(matches!(
            SignerRegistry::from_private_keys([KEY_A, KEY_A]),
            Err(RegistryError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn removal_keeps_order() {
        let registry = SignerRegistry::from_private_keys([KEY_A, KEY_B]).unwrap();
        let a = addr("0xe6D148D8398c4cb456196C776D2d9093Dd62C9B0");
        let b = addr("0x3a3347C42705C5328012dE9a38b030128eee4F83");

        assert_eq!(registry.remove(a).unwrap().address(), a);
        assert!(matches!(registry.remove(a), Err(RegistryError::NotFound)));
        assert!(matches!(registry.get(a), Err(RegistryError::NotFound)));
        assert_eq!(registry.default_signer().unwrap().address(), b);

        registry.remove(b).unwrap();
        assert!(registry.is_empty());
        assert!(registry.default_signer().is_none());
    }

    #[test]
    fn from_mnemonic() {
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let registry = SignerRegistry::from_mnemonic(phrase, 3, &MnemonicOption::default()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.default_signer().unwrap().address(),
            addr("0x9858EfFD232B4033E47d90003D41EC34EcaEda94")
        );

        let empty = SignerRegistry::from_mnemonic(phrase, 0, &MnemonicOption::default()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn bad_key_is_a_signer_error() {
        let err = SignerRegistry::from_private_keys(["nothex"]).unwrap_err();
        assert!(matches!(err, RegistryError::Signer(SignerError::Hex(_))));
    }

    #[test]
    fn concurrent_adds() {
        let registry = Arc::new(SignerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..16 {
                        registry.add(Arc::new(PrivateKeySigner::random())).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 128);
        assert_eq!(registry.list().len(), 128);
    }

    #[test]
    fn debug_lists_addresses() {
        let registry = SignerRegistry::from_private_keys([KEY_A]).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("addresses"));
        assert!(!debug.contains(KEY_A));
    }
}
