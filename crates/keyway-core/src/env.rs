//! Host environment abstraction.
//!
//! Everything the adapter would otherwise reach for as ambient global state
//! (the page URL, navigation, durable storage, the injected extension
//! object, timers, randomness) goes through [`HostEnvironment`]. Production
//! hosts wrap the real platform; tests supply a simulated host with
//! in-memory storage, a navigation log and a seeded RNG.

use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use url::Url;

use crate::extension::WalletExtension;

/// Durable string key/value storage that survives a process restart.
///
/// Writes must be visible to the next process instance that loads the same
/// origin. No transactional guarantee is assumed beyond single-key writes.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage backend failure (quota, I/O, serialization).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage {operation} of `{key}` failed: {reason}")]
pub struct StorageError {
    /// `get`, `set` or `remove`
    pub operation: &'static str,
    /// Key being accessed
    pub key: String,
    /// Backend message
    pub reason: String,
}

/// Capabilities the adapter needs from its host.
///
/// # Invariants
///
/// - `navigate` may tear down the current process; callers persist
///   everything they need before calling it and treat it as the last step.
/// - `random_bytes` must be cryptographically secure in production.
pub trait HostEnvironment: Send + Sync + 'static {
    /// False when running somewhere that cannot host a wallet (no URL, no
    /// storage). Readiness is then `Unsupported` and `connect()` is a no-op.
    fn is_available(&self) -> bool {
        true
    }

    /// URL the current page was loaded from.
    fn current_url(&self) -> Url;

    /// Leave the current page for `url`.
    fn navigate(&self, url: &Url);

    /// Durable storage for this origin.
    fn storage(&self) -> &dyn Storage;

    /// The injected browser-extension wallet, if its marker is present.
    fn injected_extension(&self) -> Option<Arc<dyn WalletExtension>>;

    /// Sleep for the given duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}
