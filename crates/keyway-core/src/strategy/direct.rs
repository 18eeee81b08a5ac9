//! Direct connection to an injected browser extension.

use std::sync::{Arc, Mutex, PoisonError};

use keyway_proto::{SendOptions, WalletPublicKey};
use tracing::debug;

use crate::{
    DelegateError, WalletError,
    extension::{NoticeListener, NoticeSubscription, WalletExtension},
};

/// Forwards adapter operations to an in-process extension.
///
/// Every signing call crosses the extension boundary in serialized form.
/// Extension failures come back as foreign errors; the adapter wraps them
/// into the error type of the operation.
pub struct DirectStrategy {
    extension: Arc<dyn WalletExtension>,
    subscription: Mutex<Option<NoticeSubscription>>,
}

impl DirectStrategy {
    /// Strategy over `extension`.
    pub fn new(extension: Arc<dyn WalletExtension>) -> Self {
        Self { extension, subscription: Mutex::new(None) }
    }

    /// Connect and read the account key.
    ///
    /// The extension's own `connect` is only invoked when it does not
    /// already consider the dapp connected.
    ///
    /// # Errors
    ///
    /// - `WalletError::Connection` if the extension refuses to connect
    /// - `WalletError::Account` if it exposes no account key
    /// - `WalletError::PublicKey` if the key bytes are malformed
    pub async fn connect(&self) -> Result<WalletPublicKey, DelegateError> {
        if self.extension.is_connected() {
            debug!("extension already connected");
        } else {
            self.extension
                .connect()
                .await
                .map_err(|err| WalletError::connection(err.message.clone(), Some(Arc::new(err))))?;
        }

        let bytes = self.extension.public_key().ok_or(WalletError::Account)?;
        let key = WalletPublicKey::from_slice(&bytes)
            .map_err(|err| WalletError::public_key(err.to_string(), Some(Arc::new(err))))?;
        Ok(key)
    }

    /// Start forwarding extension notices to `listener`. Replaces any earlier
    /// subscription.
    pub fn attach(&self, listener: NoticeListener) {
        let subscription = self.extension.subscribe(listener);
        if let Some(previous) = self.slot().replace(subscription) {
            self.extension.unsubscribe(previous);
        }
    }

    /// Stop forwarding extension notices.
    pub fn detach(&self) {
        if let Some(subscription) = self.slot().take() {
            self.extension.unsubscribe(subscription);
        }
    }

    /// Whether the extension reports a live connection.
    pub fn is_connected(&self) -> bool {
        self.extension.is_connected()
    }

    /// Ask the extension to end the session.
    pub async fn disconnect(&self) -> Result<(), DelegateError> {
        Ok(self.extension.disconnect().await?)
    }

    /// Sign one serialized transaction.
    pub async fn sign_transaction(&self, transaction: Vec<u8>) -> Result<Vec<u8>, DelegateError> {
        Ok(self.extension.sign_transaction(transaction).await?)
    }

    /// Sign several serialized transactions.
    pub async fn sign_all_transactions(
        &self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, DelegateError> {
        Ok(self.extension.sign_all_transactions(transactions).await?)
    }

    /// Sign a message.
    pub async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, DelegateError> {
        Ok(self.extension.sign_message(message).await?)
    }

    /// Sign and submit a serialized transaction.
    pub async fn sign_and_send(
        &self,
        transaction: Vec<u8>,
        options: SendOptions,
    ) -> Result<String, DelegateError> {
        Ok(self.extension.sign_and_send_transaction(transaction, options).await?)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<NoticeSubscription>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
