//! Adapter error taxonomy.
//!
//! Every public adapter operation reports failure twice: it publishes an
//! `Error` event carrying a [`WalletError`] and returns the same value. The
//! type is therefore `Clone`, and foreign causes are held behind an `Arc`.

use std::{error::Error as StdError, sync::Arc};

use keyway_crypto::CryptoError;
use keyway_proto::ProtocolError;
use thiserror::Error;

use crate::{
    env::StorageError, extension::ExtensionError, session::SessionError,
    transaction::TransactionError,
};

/// Shared handle to the foreign error behind a wrapped [`WalletError`].
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// Errors surfaced by the wallet adapter.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    /// Readiness is neither `Installed` nor `Loadable`.
    #[error("wallet not ready")]
    NotReady,

    /// Operation requires an established wallet identity.
    #[error("wallet not connected")]
    NotConnected,

    /// Handshake, extension connect or response decryption failed.
    #[error("wallet connection failed: {message}")]
    Connection {
        /// What went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Cause>,
    },

    /// The wallet connected but exposed no account key.
    #[error("wallet returned no account")]
    Account,

    /// The wallet's account key bytes were malformed.
    #[error("invalid wallet public key: {message}")]
    PublicKey {
        /// What went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Cause>,
    },

    /// The wallet disconnected without being asked to.
    #[error("wallet disconnected")]
    Disconnected,

    /// The wallet's own disconnect call failed. Never fatal.
    #[error("wallet disconnect failed: {message}")]
    Disconnection {
        /// What went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Cause>,
    },

    /// Signing and submitting a transaction failed.
    #[error("send transaction failed: {message}")]
    SendTransaction {
        /// What went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Cause>,
    },

    /// Signing a transaction failed.
    #[error("sign transaction failed: {message}")]
    SignTransaction {
        /// What went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Cause>,
    },

    /// Signing a message failed.
    #[error("sign message failed: {message}")]
    SignMessage {
        /// What went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Cause>,
    },

    /// A value the protocol requires was not in durable storage.
    #[error("storage key `{key}` is missing")]
    StorageKeyMissing {
        /// Logical storage key
        key: &'static str,
    },

    /// The wallet app answered a request with a failure code.
    #[error("wallet rejected the request ({code}): {message}")]
    Rejected {
        /// Wallet-defined code
        code: String,
        /// Wallet-provided reason
        message: String,
    },
}

/// Equality ignores wrapped causes: two errors are equal when they are the
/// same variant with the same message, key or code.
impl PartialEq for WalletError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotReady, Self::NotReady)
            | (Self::NotConnected, Self::NotConnected)
            | (Self::Account, Self::Account)
            | (Self::Disconnected, Self::Disconnected) => true,
            (Self::Connection { message: a, .. }, Self::Connection { message: b, .. })
            | (Self::PublicKey { message: a, .. }, Self::PublicKey { message: b, .. })
            | (Self::Disconnection { message: a, .. }, Self::Disconnection { message: b, .. })
            | (Self::SendTransaction { message: a, .. }, Self::SendTransaction { message: b, .. })
            | (Self::SignTransaction { message: a, .. }, Self::SignTransaction { message: b, .. })
            | (Self::SignMessage { message: a, .. }, Self::SignMessage { message: b, .. }) => a == b,
            (Self::StorageKeyMissing { key: a }, Self::StorageKeyMissing { key: b }) => a == b,
            (
                Self::Rejected { code: a, message: m },
                Self::Rejected { code: b, message: n },
            ) => a == b && m == n,
            _ => false,
        }
    }
}

impl Eq for WalletError {}

macro_rules! wrapping_constructor {
    ($(#[$doc:meta] $fn_name:ident => $variant:ident),* $(,)?) => {
        impl WalletError {
            $(
                #[$doc]
                pub fn $fn_name(message: impl Into<String>, cause: Option<Cause>) -> Self {
                    Self::$variant { message: message.into(), cause }
                }
            )*
        }
    };
}

wrapping_constructor! {
    /// `Connection` error.
    connection => Connection,
    /// `PublicKey` error.
    public_key => PublicKey,
    /// `Disconnection` error.
    disconnection => Disconnection,
    /// `SendTransaction` error.
    send_transaction => SendTransaction,
    /// `SignTransaction` error.
    sign_transaction => SignTransaction,
    /// `SignMessage` error.
    sign_message => SignMessage,
}

/// Failure reported by a strategy or collaborator.
///
/// `Typed` failures already carry their final [`WalletError`] and pass
/// through the adapter unchanged. `Foreign` failures are wrapped into the
/// error type of the operation that observed them, keeping the original as
/// the source.
#[derive(Debug, Clone)]
pub enum DelegateError {
    /// Already a domain error
    Typed(WalletError),
    /// Error from outside the domain
    Foreign(Cause),
}

impl DelegateError {
    /// Wrap a foreign error.
    pub fn foreign<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Foreign(Arc::new(err))
    }

    /// Resolve into the final error, wrapping foreign causes with `wrap`.
    pub fn into_wallet_error(
        self,
        wrap: impl FnOnce(String, Option<Cause>) -> WalletError,
    ) -> WalletError {
        match self {
            Self::Typed(err) => err,
            Self::Foreign(cause) => wrap(cause.to_string(), Some(cause)),
        }
    }
}

impl From<WalletError> for DelegateError {
    fn from(err: WalletError) -> Self {
        Self::Typed(err)
    }
}

impl From<SessionError> for DelegateError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Missing { key } => Self::Typed(WalletError::StorageKeyMissing { key }),
            other => Self::foreign(other),
        }
    }
}

macro_rules! foreign_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DelegateError {
                fn from(err: $ty) -> Self {
                    Self::foreign(err)
                }
            }
        )*
    };
}

foreign_from!(ExtensionError, TransactionError, CryptoError, ProtocolError, StorageError);
