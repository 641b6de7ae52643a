//! Software crypto provider
//!
//! P-256 ECDSA and SHA-256 in software, seeded from the RP2040 ring
//! oscillator. Key material lives in flash records, not here; this
//! module only does the math.

use embassy_rp::clocks::RoscRng;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::RngCore;
use sha2::{Digest, Sha256};

use amulet_core::traits::{CryptoError, CryptoProvider, Hash, KeyPair, PrivateKey, PublicKey, Signature};

pub struct SoftCrypto {
    rng: RoscRng,
}

impl SoftCrypto {
    pub fn new() -> Self {
        Self { rng: RoscRng }
    }
}

impl CryptoProvider for SoftCrypto {
    fn generate_keypair(&mut self) -> Result<KeyPair, CryptoError> {
        let signing = SigningKey::random(&mut self.rng);

        let mut private: PrivateKey = [0; 32];
        private.copy_from_slice(&signing.to_bytes());

        // Uncompressed SEC1 point is 0x04 || X || Y
        let point = signing.verifying_key().to_encoded_point(false);
        let mut public: PublicKey = [0; 64];
        public.copy_from_slice(&point.as_bytes()[1..65]);

        Ok(KeyPair { private, public })
    }

    fn sign(&mut self, private: &PrivateKey, hash: &Hash) -> Result<Signature, CryptoError> {
        let signing = SigningKey::from_slice(private).map_err(|_| CryptoError::InvalidKey)?;
        let signature: EcdsaSignature = signing
            .sign_prehash(hash)
            .map_err(|_| CryptoError::Signing)?;

        let mut out: Signature = [0; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    fn verify(
        &mut self,
        public: &PublicKey,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<bool, CryptoError> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(public);

        let key = VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidKey)?;
        let signature =
            EcdsaSignature::from_slice(signature).map_err(|_| CryptoError::InvalidKey)?;

        Ok(key.verify_prehash(hash, &signature).is_ok())
    }

    fn sha256(&mut self, data: &[u8]) -> Hash {
        let mut hash: Hash = [0; 32];
        hash.copy_from_slice(&Sha256::digest(data));
        hash
    }

    fn random_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}
