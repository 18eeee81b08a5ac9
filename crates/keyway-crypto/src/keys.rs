//! X25519 encryption key pairs.

use std::fmt;

use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wrap raw key bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn point(&self) -> MontgomeryPoint {
        MontgomeryPoint(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// X25519 secret key. Clamped at use, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Wrap raw key bytes (e.g. reloaded from storage).
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes. Callers that persist this own its confidentiality.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Public key for this secret.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(MontgomeryPoint::mul_base_clamped(self.0).to_bytes())
    }

    pub(crate) fn diffie_hellman(&self, peer: &PublicKey) -> MontgomeryPoint {
        peer.point().mul_clamped(self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Request key pair: used for key agreement only, never for signing.
#[derive(Clone, Debug)]
pub struct KeyPair {
    /// Public half, sent to the peer
    pub public: PublicKey,
    /// Secret half, kept by the owner
    pub secret: SecretKey,
}

impl KeyPair {
    /// Generate a fresh pair from a cryptographic RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        let pair = Self::from_secret_bytes(bytes);
        bytes.zeroize();
        pair
    }

    /// Rebuild a pair from 32 bytes of secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from_bytes(bytes);
        Self { public: secret.public_key(), secret }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn public_key_is_deterministic() {
        let pair = KeyPair::from_secret_bytes([3; 32]);
        assert_eq!(pair.public, SecretKey::from_bytes([3; 32]).public_key());
    }

    #[test]
    fn generated_pairs_differ() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let a = KeyPair::generate(&mut rng);
        let b = KeyPair::generate(&mut rng);
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn debug_hides_secret() {
        let pair = KeyPair::from_secret_bytes([0xab; 32]);
        assert_eq!(format!("{:?}", pair.secret), "SecretKey(..)");
    }
}
