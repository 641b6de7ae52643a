//! Signed-URL generator
//!
//! When programmed with a base URL, the device publishes a fresh signed
//! link on every refresh: a random nonce is appended, the whole URL is
//! hashed and signed with the signer keypair, and the signature travels
//! as a hex query parameter. A verifying backend holds the public key.
//!
//! Programming is one-shot and protected by a password chosen at program
//! time; resetting requires the same password.

use core::fmt::Write;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::traits::{
    CryptoError, CryptoProvider, Hash, KeyPair, KeyValueStore, PublicKey, StorageError, StorageKey,
};

/// Longest programmable base URL
pub const BASE_URL_MAX: usize = 256;

/// Longest generated URL: base plus nonce and signature parameters
pub const URL_MAX: usize = 512;

const KEYS_BUF: usize = 128;
const CONFIG_BUF: usize = 384;

#[derive(Serialize, Deserialize)]
struct SignerKeysRecord {
    private: [u8; 32],
    public: [[u8; 32]; 2],
}

#[derive(Serialize, Deserialize, Clone)]
struct SignerConfigRecord {
    base_url: String<BASE_URL_MAX>,
    password_hash: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UrlSignError {
    /// No configuration programmed
    NotProgrammed,
    /// Refusing to overwrite an existing configuration
    AlreadyProgrammed,
    /// Reset password does not match
    BadPassword,
    /// Base URL exceeds [`BASE_URL_MAX`] or the generated URL would overflow
    UrlTooLong,
    Storage(StorageError),
    Crypto(CryptoError),
}

impl From<StorageError> for UrlSignError {
    fn from(err: StorageError) -> Self {
        UrlSignError::Storage(err)
    }
}

impl From<CryptoError> for UrlSignError {
    fn from(err: CryptoError) -> Self {
        UrlSignError::Crypto(err)
    }
}

pub struct UrlSigner {
    keys: KeyPair,
    config: Option<SignerConfigRecord>,
}

impl UrlSigner {
    /// Load signer state, generating the keypair on first boot
    ///
    /// The keypair is created eagerly rather than at program time so the
    /// public key can be registered with a backend before the device is
    /// handed out.
    pub fn open(
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
    ) -> Result<Self, UrlSignError> {
        let mut buf = [0u8; CONFIG_BUF];

        let keys = match store.load(StorageKey::SignerKeys, &mut buf) {
            Ok(len) => {
                let record: SignerKeysRecord =
                    postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
                let mut public: PublicKey = [0; 64];
                public[..32].copy_from_slice(&record.public[0]);
                public[32..].copy_from_slice(&record.public[1]);
                KeyPair {
                    private: record.private,
                    public,
                }
            }
            Err(StorageError::NotFound) => {
                let keys = crypto.generate_keypair()?;
                let mut public = [[0u8; 32]; 2];
                public[0].copy_from_slice(&keys.public[..32]);
                public[1].copy_from_slice(&keys.public[32..]);
                let record = SignerKeysRecord {
                    private: keys.private,
                    public,
                };
                let mut keys_buf = [0u8; KEYS_BUF];
                let encoded = postcard::to_slice(&record, &mut keys_buf)
                    .map_err(|_| StorageError::BufferTooSmall)?;
                store.save(StorageKey::SignerKeys, encoded)?;
                keys
            }
            Err(err) => return Err(err.into()),
        };

        let config = match store.load(StorageKey::SignerConfig, &mut buf) {
            Ok(len) => {
                Some(postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)?)
            }
            Err(StorageError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };

        Ok(Self { keys, config })
    }

    pub fn is_programmed(&self) -> bool {
        self.config.is_some()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keys.public
    }

    /// Program the base URL and reset password
    ///
    /// One-shot: a programmed signer must be reset with the password
    /// before it accepts a new URL.
    pub fn program(
        &mut self,
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
        password: &[u8],
        base_url: &str,
    ) -> Result<(), UrlSignError> {
        if self.config.is_some() {
            return Err(UrlSignError::AlreadyProgrammed);
        }

        let config = SignerConfigRecord {
            base_url: String::try_from(base_url).map_err(|_| UrlSignError::UrlTooLong)?,
            password_hash: crypto.sha256(password),
        };

        let mut buf = [0u8; CONFIG_BUF];
        let encoded =
            postcard::to_slice(&config, &mut buf).map_err(|_| StorageError::BufferTooSmall)?;
        store.save(StorageKey::SignerConfig, encoded)?;

        self.config = Some(config);
        Ok(())
    }

    /// Erase the programmed configuration
    ///
    /// The keypair survives a reset; only the URL and password go away.
    pub fn reset(
        &mut self,
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
        password: &[u8],
    ) -> Result<(), UrlSignError> {
        let config = self.config.as_ref().ok_or(UrlSignError::NotProgrammed)?;

        if crypto.sha256(password) != config.password_hash {
            return Err(UrlSignError::BadPassword);
        }

        store.delete(StorageKey::SignerConfig)?;
        self.config = None;
        Ok(())
    }

    /// Produce a freshly signed URL
    ///
    /// Format: `{base}?rnd={nonce}&sign={hex signature}` where the
    /// signature covers everything up to and including the nonce, not
    /// the nonce alone. A verifying backend must hash the full
    /// `{base}?rnd={nonce}` prefix; verifiers that hash only the
    /// decimal nonce string will reject these URLs.
    pub fn generate(
        &mut self,
        crypto: &mut impl CryptoProvider,
    ) -> Result<String<URL_MAX>, UrlSignError> {
        let config = self.config.as_ref().ok_or(UrlSignError::NotProgrammed)?;

        let nonce = crypto.random_u64();

        let mut url: String<URL_MAX> = String::new();
        write!(url, "{}?rnd={}", config.base_url, nonce)
            .map_err(|_| UrlSignError::UrlTooLong)?;

        let hash: Hash = crypto.sha256(url.as_bytes());
        let signature = crypto.sign(&self.keys.private, &hash)?;

        url.push_str("&sign=").map_err(|_| UrlSignError::UrlTooLong)?;
        for byte in signature {
            write!(url, "{byte:02x}").map_err(|_| UrlSignError::UrlTooLong)?;
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeCrypto, FakeStore};

    fn programmed() -> (FakeStore, FakeCrypto, UrlSigner) {
        let mut store = FakeStore::new();
        let mut crypto = FakeCrypto::new();
        let mut signer = UrlSigner::open(&mut store, &mut crypto).unwrap();
        signer
            .program(&mut store, &mut crypto, b"hunter2", "https://ex.am/v")
            .unwrap();
        (store, crypto, signer)
    }

    #[test]
    fn test_keys_persist_across_open() {
        let mut store = FakeStore::new();
        let mut crypto = FakeCrypto::new();

        let first = UrlSigner::open(&mut store, &mut crypto).unwrap();
        let second = UrlSigner::open(&mut store, &mut crypto).unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn test_program_is_one_shot() {
        let (mut store, mut crypto, mut signer) = programmed();

        assert_eq!(
            signer.program(&mut store, &mut crypto, b"x", "https://other"),
            Err(UrlSignError::AlreadyProgrammed)
        );
    }

    #[test]
    fn test_generate_url_shape() {
        let (_store, mut crypto, mut signer) = programmed();

        let url = signer.generate(&mut crypto).unwrap();
        let (base, rest) = url.split_once("?rnd=").unwrap();
        assert_eq!(base, "https://ex.am/v");

        let (nonce, sig) = rest.split_once("&sign=").unwrap();
        nonce.parse::<u64>().unwrap();
        assert_eq!(sig.len(), 128);
        assert!(sig.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_urls_differ() {
        let (_store, mut crypto, mut signer) = programmed();

        let a = signer.generate(&mut crypto).unwrap();
        let b = signer.generate(&mut crypto).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_covers_nonce() {
        let (_store, mut crypto, mut signer) = programmed();

        let url = signer.generate(&mut crypto).unwrap();
        let (signed_part, sig_hex) = url.split_once("&sign=").unwrap();

        let mut signature = [0u8; 64];
        for (i, chunk) in sig_hex.as_bytes().chunks(2).enumerate() {
            let hex = core::str::from_utf8(chunk).unwrap();
            signature[i] = u8::from_str_radix(hex, 16).unwrap();
        }

        let hash = crypto.sha256(signed_part.as_bytes());
        assert!(crypto
            .verify(signer.public_key(), &hash, &signature)
            .unwrap());
    }

    #[test]
    fn test_reset_requires_password() {
        let (mut store, mut crypto, mut signer) = programmed();

        assert_eq!(
            signer.reset(&mut store, &mut crypto, b"wrong"),
            Err(UrlSignError::BadPassword)
        );
        assert!(signer.is_programmed());

        signer.reset(&mut store, &mut crypto, b"hunter2").unwrap();
        assert!(!signer.is_programmed());
        assert_eq!(
            signer.generate(&mut crypto),
            Err(UrlSignError::NotProgrammed)
        );
    }

    #[test]
    fn test_reset_preserves_keys() {
        let (mut store, mut crypto, mut signer) = programmed();
        let public = *signer.public_key();

        signer.reset(&mut store, &mut crypto, b"hunter2").unwrap();
        let reopened = UrlSigner::open(&mut store, &mut crypto).unwrap();

        assert_eq!(reopened.public_key(), &public);
        assert!(!reopened.is_programmed());
    }

    #[test]
    fn test_program_survives_reopen() {
        let (mut store, mut crypto, _signer) = programmed();

        let mut reopened = UrlSigner::open(&mut store, &mut crypto).unwrap();
        assert!(reopened.is_programmed());
        reopened.generate(&mut crypto).unwrap();
    }

    #[test]
    fn test_base_url_too_long() {
        let mut store = FakeStore::new();
        let mut crypto = FakeCrypto::new();
        let mut signer = UrlSigner::open(&mut store, &mut crypto).unwrap();

        let long: std::string::String =
            core::iter::repeat('a').take(BASE_URL_MAX + 1).collect();
        assert_eq!(
            signer.program(&mut store, &mut crypto, b"pw", &long),
            Err(UrlSignError::UrlTooLong)
        );
        assert!(!signer.is_programmed());
    }

    #[test]
    fn test_failed_save_leaves_unprogrammed() {
        let mut store = FakeStore::new();
        let mut crypto = FakeCrypto::new();
        let mut signer = UrlSigner::open(&mut store, &mut crypto).unwrap();

        store.fail_saves = true;
        assert_eq!(
            signer.program(&mut store, &mut crypto, b"pw", "https://ex.am"),
            Err(UrlSignError::Storage(StorageError::Io))
        );
        assert!(!signer.is_programmed());
    }
}
