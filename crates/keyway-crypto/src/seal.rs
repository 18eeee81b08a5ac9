//! Authenticated encryption under a shared secret.
//!
//! NaCl `secretbox`: XSalsa20-Poly1305 with a 192-bit nonce, the tag placed
//! before the ciphertext. Together with the precomputed key from
//! [`crate::derive_shared_secret`] this is byte-for-byte `crypto_box`.
//! Nonces are random per message; neither side keeps a counter across
//! redirects.

use crypto_secretbox::{
    XSalsa20Poly1305,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use rand::{CryptoRng, RngCore};

use crate::{CryptoError, SharedSecret};

/// Nonce length in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Per-message nonce. Never reuse one under the same shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Fresh random nonce.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw bytes (e.g. decoded from a response).
    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw nonce bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

fn cipher(secret: &SharedSecret) -> XSalsa20Poly1305 {
    XSalsa20Poly1305::new(GenericArray::from_slice(secret.as_bytes()))
}

/// Seal `plaintext`. Output is the 16-byte tag followed by the ciphertext.
pub fn encrypt(
    plaintext: &[u8],
    nonce: &Nonce,
    secret: &SharedSecret,
) -> Result<Vec<u8>, CryptoError> {
    cipher(secret)
        .encrypt(GenericArray::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

/// Open a sealed message.
///
/// # Errors
///
/// - `CryptoError::CiphertextTooShort` if there is no room for a tag
/// - `CryptoError::AuthenticationFailed` on any tag mismatch
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &Nonce,
    secret: &SharedSecret,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::CiphertextTooShort { len: ciphertext.len(), min: TAG_SIZE });
    }

    cipher(secret)
        .decrypt(GenericArray::from_slice(nonce.as_bytes()), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn secret(byte: u8) -> SharedSecret {
        SharedSecret::from_bytes([byte; 32])
    }

    #[test]
    fn ciphertext_carries_tag() {
        let sealed = encrypt(b"hello", &Nonce::from_bytes([0; 24]), &secret(1)).unwrap();
        assert_eq!(sealed.len(), 5 + TAG_SIZE);
    }

    #[test]
    fn short_ciphertext_rejected() {
        assert_eq!(
            decrypt(&[0; 4], &Nonce::from_bytes([0; 24]), &secret(1)),
            Err(CryptoError::CiphertextTooShort { len: 4, min: TAG_SIZE })
        );
    }

    #[test]
    fn wrong_nonce_fails() {
        let sealed = encrypt(b"hello", &Nonce::from_bytes([0; 24]), &secret(1)).unwrap();
        assert_eq!(
            decrypt(&sealed, &Nonce::from_bytes([1; 24]), &secret(1)),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn interoperates_with_crypto_box() {
        use crypto_box::{SalsaBox, aead::generic_array::GenericArray};

        use crate::{KeyPair, derive_shared_secret};

        let dapp = KeyPair::from_secret_bytes([0x31; 32]);
        let wallet = KeyPair::from_secret_bytes([0x52; 32]);
        let nonce = [0x0b; 24];
        let body = br#"{"public_key":"11111111111111111111111111111111","session":"tok1"}"#;

        let reference = SalsaBox::new(
            &crypto_box::PublicKey::from(*wallet.public.as_bytes()),
            &crypto_box::SecretKey::from(*dapp.secret.as_bytes()),
        );
        let theirs = reference.encrypt(GenericArray::from_slice(&nonce), &body[..]).unwrap();

        let shared = derive_shared_secret(&wallet.secret, &dapp.public).unwrap();
        let ours = encrypt(body, &Nonce::from_bytes(nonce), &shared).unwrap();
        assert_eq!(ours, theirs);
        assert_eq!(decrypt(&theirs, &Nonce::from_bytes(nonce), &shared).unwrap(), body);
    }

    proptest! {
        #[test]
        fn open_inverts_seal(
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
            nonce in any::<[u8; 24]>(),
            key in any::<[u8; 32]>(),
        ) {
            let secret = SharedSecret::from_bytes(key);
            let nonce = Nonce::from_bytes(nonce);
            let sealed = encrypt(&plaintext, &nonce, &secret).unwrap();
            prop_assert_eq!(decrypt(&sealed, &nonce, &secret).unwrap(), plaintext);
        }

        #[test]
        fn other_secret_fails(
            plaintext in prop::collection::vec(any::<u8>(), 0..128),
            key in any::<[u8; 32]>(),
            other in any::<[u8; 32]>(),
        ) {
            prop_assume!(key != other);
            let nonce = Nonce::from_bytes([9; 24]);
            let sealed = encrypt(&plaintext, &nonce, &SharedSecret::from_bytes(key)).unwrap();
            prop_assert_eq!(
                decrypt(&sealed, &nonce, &SharedSecret::from_bytes(other)),
                Err(CryptoError::AuthenticationFailed)
            );
        }

        #[test]
        fn any_flipped_byte_fails(
            plaintext in prop::collection::vec(any::<u8>(), 1..128),
            index in any::<prop::sample::Index>(),
        ) {
            let nonce = Nonce::from_bytes([4; 24]);
            let mut sealed = encrypt(&plaintext, &nonce, &secret(8)).unwrap();
            let i = index.index(sealed.len());
            sealed[i] ^= 0x01;
            prop_assert_eq!(decrypt(&sealed, &nonce, &secret(8)), Err(CryptoError::AuthenticationFailed));
        }
    }
}
