//! Persisted deep-link session.
//!
//! The redirect protocol tears the process down between request and
//! response, so every value the continuation needs lives in host storage.
//! [`SessionStore`] groups those values behind one typed view instead of
//! scattered key lookups.
//!
//! # Invariants
//!
//! - The request public and secret keys are stored as one value, written
//!   once per connect request as a fresh pair, so a failed write can never
//!   leave a new secret next to an old public key. Starting a new request drops the
//!   shared secret, session token and pending method of the previous one.
//! - The shared secret is written only after a response authenticated.
//! - The session token and wallet key are written only after the handshake
//!   body decrypted and parsed.
//!
//! Binary values use the comma-separated decimal storage encoding.

use keyway_crypto::{KeyPair, PublicKey, SecretKey, SharedSecret};
use keyway_proto::{ProtocolError, RequestMethod, WalletPublicKey, encoding::stored};
use thiserror::Error;
use zeroize::Zeroize;

use crate::{Storage, StorageError};

/// Storage key of the request key pair: secret key then public key.
pub const DAPP_KEY_PAIR: &str = "keyway.dapp_key_pair";
/// Storage key of the derived shared secret.
pub const SHARED_SECRET: &str = "keyway.shared_secret";
/// Storage key of the wallet-issued session token.
pub const SESSION_TOKEN: &str = "keyway.session_token";
/// Storage key of the connected wallet account (base-58).
pub const WALLET_PUBLIC_KEY: &str = "keyway.wallet_public_key";
/// Storage key of the method of the last dispatched request.
pub const PENDING_METHOD: &str = "keyway.pending_method";

const ALL_KEYS: [&str; 5] =
    [DAPP_KEY_PAIR, SHARED_SECRET, SESSION_TOKEN, WALLET_PUBLIC_KEY, PENDING_METHOD];

/// Session storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A value the protocol requires is not stored
    #[error("session value `{key}` is missing")]
    Missing {
        /// Storage key
        key: &'static str,
    },
    /// A stored value could not be decoded
    #[error("session value `{key}` is corrupt: {source}")]
    Corrupt {
        /// Storage key
        key: &'static str,
        /// Decoding failure
        source: ProtocolError,
    },
    /// The stored public key does not belong to the stored secret key
    #[error("session value `{key}` is not a key pair")]
    MismatchedKeyPair {
        /// Storage key
        key: &'static str,
    },
    /// The storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything needed to seal a request to an established wallet session.
pub struct SessionChannel {
    /// Request public key the wallet agreed with
    pub dapp_public_key: PublicKey,
    /// Shared secret of the session
    pub shared_secret: SharedSecret,
    /// Wallet-issued session token
    pub session_token: String,
}

/// Typed view over the session values in host storage.
#[derive(Clone, Copy)]
pub struct SessionStore<'a> {
    storage: &'a dyn Storage,
}

impl<'a> SessionStore<'a> {
    /// View over `storage`.
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Persist a fresh request key pair, replacing any previous request.
    pub fn begin_request(&self, pair: &KeyPair) -> Result<(), SessionError> {
        for key in [SHARED_SECRET, SESSION_TOKEN, WALLET_PUBLIC_KEY, PENDING_METHOD] {
            self.storage.remove(key)?;
        }

        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(pair.secret.as_bytes());
        bytes[32..].copy_from_slice(pair.public.as_bytes());
        let mut value = stored::encode(&bytes);
        bytes.zeroize();

        let result = self.storage.set(DAPP_KEY_PAIR, &value);
        value.zeroize();
        Ok(result?)
    }

    /// Key pair of the pending request.
    pub fn request_pair(&self) -> Result<KeyPair, SessionError> {
        let mut bytes = self.bytes::<64>(DAPP_KEY_PAIR)?;
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes[..32]);
        let pair = KeyPair::from_secret_bytes(secret);
        secret.zeroize();

        let matches = pair.public.as_bytes()[..] == bytes[32..];
        bytes.zeroize();
        if matches { Ok(pair) } else { Err(SessionError::MismatchedKeyPair { key: DAPP_KEY_PAIR }) }
    }

    /// Secret key of the pending request.
    pub fn request_secret(&self) -> Result<SecretKey, SessionError> {
        self.request_pair().map(|pair| pair.secret)
    }

    /// Persist the authenticated shared secret.
    pub fn store_shared_secret(&self, secret: &SharedSecret) -> Result<(), SessionError> {
        Ok(self.storage.set(SHARED_SECRET, &stored::encode(secret.as_bytes()))?)
    }

    /// Shared secret of the session.
    pub fn shared_secret(&self) -> Result<SharedSecret, SessionError> {
        self.bytes::<32>(SHARED_SECRET).map(SharedSecret::from_bytes)
    }

    /// Persist the handshake result.
    pub fn store_approval(
        &self,
        token: &str,
        wallet: &WalletPublicKey,
    ) -> Result<(), SessionError> {
        self.storage.set(SESSION_TOKEN, token)?;
        self.storage.set(WALLET_PUBLIC_KEY, &wallet.to_base58())?;
        Ok(())
    }

    /// Wallet account of the stored session.
    pub fn wallet_public_key(&self) -> Result<WalletPublicKey, SessionError> {
        let value = self.require(WALLET_PUBLIC_KEY)?;
        value.parse().map_err(|source| SessionError::Corrupt { key: WALLET_PUBLIC_KEY, source })
    }

    /// Everything needed to seal a request.
    pub fn channel(&self) -> Result<SessionChannel, SessionError> {
        Ok(SessionChannel {
            dapp_public_key: self.request_public()?,
            shared_secret: self.shared_secret()?,
            session_token: self.require(SESSION_TOKEN)?,
        })
    }

    /// Whether a completed handshake is stored.
    pub fn has_session(&self) -> Result<bool, SessionError> {
        Ok(self.storage.get(SESSION_TOKEN)?.is_some())
    }

    /// Remember which method the next redirect answers.
    pub fn set_pending_method(&self, method: RequestMethod) -> Result<(), SessionError> {
        Ok(self.storage.set(PENDING_METHOD, method.path())?)
    }

    /// Take the pending method, clearing it.
    pub fn take_pending_method(&self) -> Result<RequestMethod, SessionError> {
        let value = self.require(PENDING_METHOD)?;
        self.storage.remove(PENDING_METHOD)?;
        value.parse().map_err(|source| SessionError::Corrupt { key: PENDING_METHOD, source })
    }

    /// Remove every session value.
    pub fn clear(&self) -> Result<(), SessionError> {
        for key in ALL_KEYS {
            self.storage.remove(key)?;
        }
        Ok(())
    }

    fn require(&self, key: &'static str) -> Result<String, SessionError> {
        self.storage.get(key)?.ok_or(SessionError::Missing { key })
    }

    fn bytes<const N: usize>(&self, key: &'static str) -> Result<[u8; N], SessionError> {
        let value = self.require(key)?;
        stored::decode_array::<N>(key, &value).map_err(|source| SessionError::Corrupt { key, source })
    }
}
