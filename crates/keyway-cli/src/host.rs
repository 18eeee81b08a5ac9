//! Host environment for a terminal.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use keyway_core::{HostEnvironment, Storage, WalletExtension};
use rand::{RngCore, rngs::OsRng};
use url::Url;

use crate::storage::FileStorage;

/// A terminal "page": fixed URL, file storage, no extension.
///
/// Navigation cannot leave the process, so the target is recorded and the
/// caller shows it to the user.
#[derive(Debug)]
pub struct TerminalHost {
    url: Url,
    storage: FileStorage,
    navigation: Mutex<Option<Url>>,
}

impl TerminalHost {
    /// Host loaded at `url`.
    pub fn new(url: Url, storage: FileStorage) -> Self {
        Self { url, storage, navigation: Mutex::new(None) }
    }

    /// Most recent navigation target, consumed.
    pub fn take_navigation(&self) -> Option<Url> {
        self.navigation.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl HostEnvironment for TerminalHost {
    fn current_url(&self) -> Url {
        self.url.clone()
    }

    fn navigate(&self, url: &Url) {
        tracing::debug!(host = url.host_str().unwrap_or_default(), "navigation recorded");
        *self.navigation.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
    }

    fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    fn injected_extension(&self) -> Option<Arc<dyn WalletExtension>> {
        None
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}
