//! Error types for session cryptography.

use thiserror::Error;

/// Errors from key agreement and sealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Authentication tag did not verify (wrong key, wrong nonce, or tampered
    /// ciphertext).
    #[error("authenticated decryption failed")]
    AuthenticationFailed,

    /// Ciphertext shorter than the authentication tag.
    #[error("ciphertext too short: {len} bytes, need at least {min}")]
    CiphertextTooShort {
        /// Received length
        len: usize,
        /// Minimum valid length
        min: usize,
    },

    /// Encryption failed inside the AEAD.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Peer key is of small order; agreement would yield a known secret.
    #[error("peer public key is of small order")]
    WeakPublicKey,
}
