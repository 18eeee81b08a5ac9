//! Simulated host environment.
//!
//! Storage is an in-memory map shared by every clone, so a host "reloaded"
//! onto a new URL keeps what the previous page instance persisted, exactly
//! like origin storage in a browser. Navigation never leaves: it is
//! appended to a log the test can hand to the simulated wallet app.
//!
//! Time is virtual. `sleep` advances a counter and yields, so readiness
//! polling runs instantly and deterministically.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use keyway_core::{HostEnvironment, Storage, StorageError, WalletExtension};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use url::Url;

/// Page URL a fresh host starts on.
pub const DEFAULT_PAGE: &str = "https://dapp.example/app?ref=home";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory origin storage with write-failure injection.
#[derive(Debug, Default)]
pub struct SimStorage {
    values: Mutex<BTreeMap<String, String>>,
    fail_writes: Mutex<bool>,
}

impl SimStorage {
    /// Make every following `set`/`remove` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    /// Raw stored value.
    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    /// Copy of all stored values.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock(&self.values).clone()
    }

    fn check_write(&self, operation: &'static str, key: &str) -> Result<(), StorageError> {
        if *lock(&self.fail_writes) {
            return Err(StorageError {
                operation,
                key: key.to_string(),
                reason: "quota exceeded".into(),
            });
        }
        Ok(())
    }
}

impl Storage for SimStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_write("set", key)?;
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_write("remove", key)?;
        lock(&self.values).remove(key);
        Ok(())
    }
}

struct Inner {
    available: bool,
    storage: SimStorage,
    url: Mutex<Url>,
    navigations: Mutex<Vec<Url>>,
    rng: Mutex<ChaCha20Rng>,
    extension: Mutex<Option<Arc<dyn WalletExtension>>>,
    /// Number of `injected_extension` lookups before the extension appears
    extension_delay: Mutex<u32>,
    elapsed: Mutex<Duration>,
    page_loads: Mutex<u32>,
}

/// Deterministic host. Clones share all state.
#[derive(Clone)]
pub struct SimHost {
    inner: Arc<Inner>,
}

impl SimHost {
    /// Host on [`DEFAULT_PAGE`] with the given RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(seed, true)
    }

    /// Host that cannot run a wallet (no window, no storage).
    pub fn unavailable() -> Self {
        Self::build(0, false)
    }

    #[allow(clippy::expect_used)]
    fn build(seed: u64, available: bool) -> Self {
        let url = Url::parse(DEFAULT_PAGE).expect("DEFAULT_PAGE is a valid URL");
        Self {
            inner: Arc::new(Inner {
                available,
                storage: SimStorage::default(),
                url: Mutex::new(url),
                navigations: Mutex::new(Vec::new()),
                rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
                extension: Mutex::new(None),
                extension_delay: Mutex::new(0),
                elapsed: Mutex::new(Duration::ZERO),
                page_loads: Mutex::new(1),
            }),
        }
    }

    /// Inject an extension that is visible immediately.
    pub fn install_extension(&self, extension: Arc<dyn WalletExtension>) {
        self.install_extension_after(extension, 0);
    }

    /// Inject an extension that only becomes visible after `lookups` checks.
    pub fn install_extension_after(&self, extension: Arc<dyn WalletExtension>, lookups: u32) {
        *lock(&self.inner.extension) = Some(extension);
        *lock(&self.inner.extension_delay) = lookups;
    }

    /// Start a new page instance on `url`. Storage survives; the caller
    /// builds a fresh adapter for the new instance.
    pub fn reload(&self, url: Url) {
        *lock(&self.inner.url) = url;
        *lock(&self.inner.page_loads) += 1;
    }

    /// Origin storage.
    pub fn sim_storage(&self) -> &SimStorage {
        &self.inner.storage
    }

    /// Every URL navigated to, oldest first.
    pub fn navigations(&self) -> Vec<Url> {
        lock(&self.inner.navigations).clone()
    }

    /// Most recent navigation.
    pub fn last_navigation(&self) -> Option<Url> {
        lock(&self.inner.navigations).last().cloned()
    }

    /// Virtual time spent sleeping.
    pub fn elapsed(&self) -> Duration {
        *lock(&self.inner.elapsed)
    }

    /// Number of page instances, counting the first.
    pub fn page_loads(&self) -> u32 {
        *lock(&self.inner.page_loads)
    }
}

impl HostEnvironment for SimHost {
    fn is_available(&self) -> bool {
        self.inner.available
    }

    fn current_url(&self) -> Url {
        lock(&self.inner.url).clone()
    }

    fn navigate(&self, url: &Url) {
        tracing::debug!(path = url.path(), "sim host navigated");
        lock(&self.inner.navigations).push(url.clone());
    }

    fn storage(&self) -> &dyn Storage {
        &self.inner.storage
    }

    fn injected_extension(&self) -> Option<Arc<dyn WalletExtension>> {
        let mut delay = lock(&self.inner.extension_delay);
        if *delay > 0 {
            *delay -= 1;
            return None;
        }
        lock(&self.inner.extension).clone()
    }

    async fn sleep(&self, duration: Duration) {
        *lock(&self.inner.elapsed) += duration;
        tokio::task::yield_now().await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        lock(&self.inner.rng).fill_bytes(buffer);
    }
}
