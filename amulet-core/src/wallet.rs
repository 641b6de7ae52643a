//! Hardware wallet
//!
//! One persistent P-256 keypair. The private key never leaves the record
//! except through [`Wallet::seed`], which exists for device-to-device
//! backup and is only reachable through an explicit command.

use serde::{Deserialize, Serialize};

use crate::traits::{
    CryptoError, CryptoProvider, Hash, KeyPair, KeyValueStore, PublicKey, Signature,
    StorageError, StorageKey,
};

/// Worst-case postcard size of a [`WalletRecord`]
const RECORD_BUF: usize = 128;

/// Persisted wallet keypair
///
/// The public point is split in halves because serde only derives array
/// impls up to 32 elements.
#[derive(Serialize, Deserialize)]
struct WalletRecord {
    private: [u8; 32],
    public: [[u8; 32]; 2],
}

impl WalletRecord {
    fn from_keypair(keys: &KeyPair) -> Self {
        let mut public = [[0u8; 32]; 2];
        public[0].copy_from_slice(&keys.public[..32]);
        public[1].copy_from_slice(&keys.public[32..]);
        Self {
            private: keys.private,
            public,
        }
    }

    fn into_keypair(self) -> KeyPair {
        let mut public: PublicKey = [0; 64];
        public[..32].copy_from_slice(&self.public[0]);
        public[32..].copy_from_slice(&self.public[1]);
        KeyPair {
            private: self.private,
            public,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WalletError {
    /// `create` refused to overwrite an existing wallet
    AlreadyExists,
    Storage(StorageError),
    Crypto(CryptoError),
}

impl From<StorageError> for WalletError {
    fn from(err: StorageError) -> Self {
        WalletError::Storage(err)
    }
}

impl From<CryptoError> for WalletError {
    fn from(err: CryptoError) -> Self {
        WalletError::Crypto(err)
    }
}

pub struct Wallet {
    keys: KeyPair,
}

impl Wallet {
    /// Load the persisted wallet
    pub fn load(store: &mut impl KeyValueStore) -> Result<Self, WalletError> {
        let mut buf = [0u8; RECORD_BUF];
        let len = store.load(StorageKey::Wallet, &mut buf)?;
        let record: WalletRecord =
            postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        Ok(Self {
            keys: record.into_keypair(),
        })
    }

    /// Generate and persist a fresh wallet
    ///
    /// Refuses if a wallet record already exists; destroying the old
    /// wallet is a separate, deliberate step.
    pub fn create(
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
    ) -> Result<Self, WalletError> {
        let mut buf = [0u8; RECORD_BUF];
        match store.load(StorageKey::Wallet, &mut buf) {
            Ok(_) => return Err(WalletError::AlreadyExists),
            Err(StorageError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let keys = crypto.generate_keypair()?;
        let record = WalletRecord::from_keypair(&keys);
        let encoded =
            postcard::to_slice(&record, &mut buf).map_err(|_| StorageError::BufferTooSmall)?;
        store.save(StorageKey::Wallet, encoded)?;

        Ok(Self { keys })
    }

    /// Load the wallet, generating one on first boot
    pub fn open(
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
    ) -> Result<Self, WalletError> {
        match Self::load(store) {
            Ok(wallet) => Ok(wallet),
            Err(WalletError::Storage(StorageError::NotFound)) => Self::create(store, crypto),
            Err(err) => Err(err),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keys.public
    }

    /// Backup seed: SHA-256 of the private scalar
    ///
    /// Lets a paired device prove it holds the same wallet without the
    /// raw key ever crossing the mailbox.
    pub fn seed(&self, crypto: &mut impl CryptoProvider) -> Hash {
        crypto.sha256(&self.keys.private)
    }

    /// Hash `message` with SHA-256 and sign the digest
    pub fn sign(
        &self,
        crypto: &mut impl CryptoProvider,
        message: &[u8],
    ) -> Result<Signature, WalletError> {
        let hash: Hash = crypto.sha256(message);
        Ok(crypto.sign(&self.keys.private, &hash)?)
    }

    /// Remove the persisted wallet record
    pub fn destroy(store: &mut impl KeyValueStore) -> Result<(), WalletError> {
        Ok(store.delete(StorageKey::Wallet)?)
    }
}
