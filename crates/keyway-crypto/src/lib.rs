//! Session cryptography for the keyway deep-link channel.
//!
//! The dapp and the wallet app never share a socket, so every message is
//! carried in a URL and must be protected end to end. Each side holds an
//! X25519 encryption key pair (never a signing key). Diffie-Hellman over the
//! two pairs gives both sides the same point without transmitting it, and
//! HSalsa20 turns that point into a 32-byte shared secret. Payloads are then
//! sealed with XSalsa20-Poly1305 under the shared secret and a fresh 24-byte
//! nonce. This is the NaCl `box` construction wallets speak.
//!
//! # Security
//!
//! Decryption either returns the exact plaintext or fails; a tag mismatch is
//! never papered over. Peer keys of small order (which would force an
//! all-zero shared point) are rejected. Secret keys and shared secrets are
//! wiped on drop.

pub mod agreement;
pub mod error;
pub mod keys;
pub mod seal;

pub use agreement::{SharedSecret, derive_shared_secret};
pub use error::CryptoError;
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use seal::{NONCE_SIZE, Nonce, TAG_SIZE, decrypt, encrypt};
