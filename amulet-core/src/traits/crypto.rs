//! Crypto provider seam
//!
//! All curve operations are NIST P-256 with SHA-256 digests. Keys and
//! signatures travel as raw fixed-size byte arrays: a public key is the
//! uncompressed point without the 0x04 marker, a signature is `r || s`.

/// SHA-256 digest
pub type Hash = [u8; 32];

/// P-256 scalar (private key)
pub type PrivateKey = [u8; 32];

/// Uncompressed P-256 point, X then Y, without the format marker
pub type PublicKey = [u8; 64];

/// ECDSA signature, `r || s`
pub type Signature = [u8; 64];

/// A private key and its public point
#[derive(Clone)]
pub struct KeyPair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CryptoError {
    /// Key generation or key material rejected by the backend
    InvalidKey,
    /// Signing failed
    Signing,
}

/// Signing, hashing and entropy, in one seam
///
/// `&mut self` throughout because real providers own an entropy source.
pub trait CryptoProvider {
    fn generate_keypair(&mut self) -> Result<KeyPair, CryptoError>;

    /// Sign a prehashed message
    fn sign(&mut self, private: &PrivateKey, hash: &Hash) -> Result<Signature, CryptoError>;

    /// Verify a signature over a prehashed message
    fn verify(
        &mut self,
        public: &PublicKey,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<bool, CryptoError>;

    fn sha256(&mut self, data: &[u8]) -> Hash;

    fn random_u64(&mut self) -> u64;
}
