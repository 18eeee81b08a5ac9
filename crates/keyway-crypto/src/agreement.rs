//! Shared-secret derivation.
//!
//! NaCl `crypto_box_beforenm`: the X25519 point is passed through HSalsa20
//! with an all-zero input block. `derive_shared_secret(a.secret, b.public)
//! == derive_shared_secret(b.secret, a.public)`, so neither side needs to
//! know which role it plays.

use std::fmt;

use salsa20::{
    Key, hsalsa,
    cipher::{consts::U10, generic_array::GenericArray},
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, PublicKey, SecretKey};

/// Symmetric key shared by the dapp and the wallet for one session.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Wrap raw bytes (e.g. reloaded from storage).
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Agree on a shared secret with a peer.
///
/// # Errors
///
/// - `CryptoError::WeakPublicKey` if `peer` has small order
pub fn derive_shared_secret(
    secret: &SecretKey,
    peer: &PublicKey,
) -> Result<SharedSecret, CryptoError> {
    let mut point = secret.diffie_hellman(peer).to_bytes();

    // Small-order points multiply to the identity, which encodes as zero.
    if point.iter().all(|&b| b == 0) {
        return Err(CryptoError::WeakPublicKey);
    }

    let mut key = hsalsa::<U10>(Key::from_slice(&point), &GenericArray::default());
    point.zeroize();

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&key);
    key.as_mut_slice().zeroize();

    Ok(SharedSecret(bytes))
}
