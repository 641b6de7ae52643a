//! Hardware abstraction seams
//!
//! The application logic never talks to flash or the crypto peripheral
//! directly; it goes through these traits so it can run on the host.

mod crypto;
mod storage;

pub use crypto::{CryptoError, CryptoProvider, Hash, KeyPair, PrivateKey, PublicKey, Signature};
pub use storage::{KeyValueStore, StorageError, StorageKey};
