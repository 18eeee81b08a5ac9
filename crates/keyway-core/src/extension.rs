//! Injected browser-extension wallet.
//!
//! The extension is an in-process object that holds the private key and
//! performs every signing operation itself. The adapter only forwards
//! requests and listens for its lifecycle notices.

use std::sync::Arc;

use async_trait::async_trait;
use keyway_proto::SendOptions;
use thiserror::Error;

/// Lifecycle notice pushed by the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionNotice {
    /// The extension ended the session on its own
    Disconnected,
    /// The user switched accounts inside the extension. Carries the new
    /// account key bytes, or `None` if the extension did not expose one.
    AccountChanged(Option<Vec<u8>>),
}

/// Callback registered with [`WalletExtension::subscribe`].
pub type NoticeListener = Arc<dyn Fn(ExtensionNotice) + Send + Sync>;

/// Handle for removing a notice listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoticeSubscription(pub u64);

/// Error raised by the extension itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExtensionError {
    /// Extension-defined code, if any
    pub code: Option<i64>,
    /// Extension message
    pub message: String,
}

impl ExtensionError {
    /// Error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    /// Error with a code.
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self { code: Some(code), message: message.into() }
    }
}

/// Wallet extension injected into the host.
///
/// Transactions cross this boundary in their serialized form; the adapter
/// serializes before calling and deserializes what comes back.
#[async_trait]
pub trait WalletExtension: Send + Sync {
    /// Whether the extension considers the dapp connected.
    fn is_connected(&self) -> bool;

    /// Current account key bytes, once connected.
    fn public_key(&self) -> Option<Vec<u8>>;

    /// Ask the user to connect.
    async fn connect(&self) -> Result<(), ExtensionError>;

    /// End the session.
    async fn disconnect(&self) -> Result<(), ExtensionError>;

    /// Sign one serialized transaction and return it.
    async fn sign_transaction(&self, transaction: Vec<u8>) -> Result<Vec<u8>, ExtensionError>;

    /// Sign several serialized transactions, preserving order.
    async fn sign_all_transactions(
        &self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, ExtensionError>;

    /// Sign an arbitrary message and return the signature bytes.
    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, ExtensionError>;

    /// Sign and submit a serialized transaction, returning its signature.
    async fn sign_and_send_transaction(
        &self,
        transaction: Vec<u8>,
        options: SendOptions,
    ) -> Result<String, ExtensionError>;

    /// Register for lifecycle notices.
    fn subscribe(&self, listener: NoticeListener) -> NoticeSubscription;

    /// Remove a notice listener. Unknown handles are ignored.
    fn unsubscribe(&self, subscription: NoticeSubscription);
}
