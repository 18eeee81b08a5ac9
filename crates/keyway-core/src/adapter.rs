//! Wallet adapter state machine.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────┐
//!   UI ──calls──▶ │ WalletAdapter                 │ ──events──▶ EventChannel
//!                 │  readiness · connecting ·     │
//!                 │  identity · route             │
//!                 └───────┬───────────────┬───────┘
//!                         ▼               ▼
//!                 DirectStrategy   DeepLinkStrategy
//!                 (extension)      (redirect + storage)
//! ```
//!
//! The route is chosen by readiness when `connect()` runs: `Loadable` goes
//! through the deep-link protocol, `Installed` through the extension.
//!
//! # Invariants
//!
//! - `connecting` is reset on every exit from `connect()`.
//! - `connected()` is true only with an identity and a live route.
//! - Every failure of a public operation is published as an `Error` event
//!   and returned. Failures inside `disconnect()` and extension notices are
//!   only published.
//! - No lock is held across an await point or while listeners run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use keyway_proto::WalletPublicKey;
use tracing::{debug, info, warn};

use crate::{
    AdapterConfig, DelegateError, HostEnvironment, WalletError,
    events::{AdapterEvent, EventChannel},
    extension::{ExtensionNotice, NoticeListener},
    outcome::{Outcome, RedirectResult},
    readiness::{ReadinessDetector, ReadyState},
    strategy::{ConnectStep, DeepLinkStrategy, DirectStrategy},
    transaction::{
        ChainConnection, SendTransactionOptions, SerializeConfig, Transaction, prepare,
        sign_locally_and_serialize,
    },
};

/// Route an established identity was obtained through.
#[derive(Clone)]
enum Route {
    Direct(Arc<DirectStrategy>),
    DeepLink,
}

struct State {
    ready_state: ReadyState,
    connecting: bool,
    identity: Option<WalletPublicKey>,
    route: Option<Route>,
}

struct Shared<E: HostEnvironment> {
    env: E,
    config: AdapterConfig,
    detector: ReadinessDetector,
    events: EventChannel,
    state: Mutex<State>,
}

impl<E: HostEnvironment> Shared<E> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route_is_live(&self, route: &Route) -> bool {
        match route {
            Route::Direct(strategy) => strategy.is_connected(),
            Route::DeepLink => DeepLinkStrategy::new(&self.env, &self.config).is_connected(),
        }
    }
}

/// Resets `connecting` when `connect()` returns, however it returns.
struct ConnectingGuard<'a, E: HostEnvironment>(&'a Shared<E>);

impl<E: HostEnvironment> Drop for ConnectingGuard<'_, E> {
    fn drop(&mut self) {
        self.0.lock().connecting = false;
    }
}

/// Unified wallet adapter over the extension and deep-link transports.
///
/// Cheap to clone; clones share state and events.
pub struct WalletAdapter<E: HostEnvironment> {
    shared: Arc<Shared<E>>,
}

impl<E: HostEnvironment> Clone for WalletAdapter<E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<E: HostEnvironment> WalletAdapter<E> {
    /// Adapter over `env`. Readiness is resolved immediately from the
    /// configured policy; run [`Self::detect_readiness`] to poll for a late
    /// extension.
    pub fn new(env: E, config: AdapterConfig) -> Self {
        let detector = ReadinessDetector::new(&config);
        let ready_state = detector.initial_state(&env);
        debug!(%ready_state, policy = ?config.readiness, "adapter created");

        let state = State { ready_state, connecting: false, identity: None, route: None };
        Self {
            shared: Arc::new(Shared {
                env,
                config,
                detector,
                events: EventChannel::new(),
                state: Mutex::new(state),
            }),
        }
    }

    /// Host environment.
    pub fn env(&self) -> &E {
        &self.shared.env
    }

    /// Configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.shared.config
    }

    /// Lifecycle events.
    pub fn events(&self) -> &EventChannel {
        &self.shared.events
    }

    /// Connected account, if any.
    pub fn public_key(&self) -> Option<WalletPublicKey> {
        self.shared.lock().identity
    }

    /// Whether a `connect()` is in progress.
    pub fn connecting(&self) -> bool {
        self.shared.lock().connecting
    }

    /// Whether an identity is established and its route is still live.
    pub fn connected(&self) -> bool {
        let route = {
            let state = self.shared.lock();
            if state.identity.is_none() {
                return false;
            }
            state.route.clone()
        };
        route.is_some_and(|route| self.shared.route_is_live(&route))
    }

    /// Current readiness.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.lock().ready_state
    }

    /// Poll for the extension if readiness is still undecided, announcing
    /// any change.
    pub async fn detect_readiness(&self) -> ReadyState {
        let current = self.ready_state();
        if current != ReadyState::NotDetected {
            return current;
        }

        let detected = self.shared.detector.detect(&self.shared.env).await;
        let changed = {
            let mut state = self.shared.lock();
            let changed = state.ready_state != detected;
            state.ready_state = detected;
            changed
        };
        if changed {
            info!(ready_state = %detected, "readiness changed");
            self.emit(&AdapterEvent::ReadyStateChange(detected));
        }
        detected
    }

    /// Connect to the wallet.
    ///
    /// A no-op while connecting or connected, or when the host cannot run a
    /// wallet. Over the deep-link route the first call navigates away and
    /// returns without an identity; the call made on the page the wallet
    /// redirects back to completes the handshake.
    ///
    /// # Errors
    ///
    /// - `WalletError::NotReady` unless readiness is `Installed` or `Loadable`
    /// - `WalletError::Connection`, `Account`, `PublicKey`, `Rejected` or
    ///   `StorageKeyMissing` from the route
    pub async fn connect(&self) -> Result<(), WalletError> {
        let result = self.try_connect().await;
        self.report(result)
    }

    async fn try_connect(&self) -> Result<(), WalletError> {
        let route = {
            let state = self.shared.lock();
            if state.connecting {
                debug!("connect ignored: already connecting");
                return Ok(());
            }
            if state.identity.is_some() { state.route.clone() } else { None }
        };
        // Liveness reaches into the extension or storage, so it runs unlocked.
        if route.is_some_and(|route| self.shared.route_is_live(&route)) {
            debug!("connect ignored: already connected");
            return Ok(());
        }
        if !self.shared.env.is_available() {
            debug!("connect ignored: host unavailable");
            return Ok(());
        }

        let ready_state = {
            let mut state = self.shared.lock();
            if state.connecting {
                debug!("connect ignored: already connecting");
                return Ok(());
            }
            if !state.ready_state.can_connect() {
                return Err(WalletError::NotReady);
            }
            state.connecting = true;
            state.ready_state
        };
        let _connecting = ConnectingGuard(&self.shared);

        if ready_state == ReadyState::Loadable {
            self.connect_deep_link()
        } else {
            self.connect_direct().await
        }
    }

    fn connect_deep_link(&self) -> Result<(), WalletError> {
        let step = self
            .deep_link()
            .connect()
            .map_err(|err| err.into_wallet_error(WalletError::connection))?;

        match step {
            ConnectStep::Redirected(url) => {
                debug!(host = url.host_str().unwrap_or_default(), "connect request dispatched");
            },
            ConnectStep::Established(key) => self.establish(key, Route::DeepLink),
        }
        Ok(())
    }

    async fn connect_direct(&self) -> Result<(), WalletError> {
        let extension = self
            .shared
            .env
            .injected_extension()
            .ok_or_else(|| WalletError::connection("wallet extension not found", None))?;

        let strategy = Arc::new(DirectStrategy::new(extension));
        let key = strategy
            .connect()
            .await
            .map_err(|err| err.into_wallet_error(WalletError::connection))?;

        strategy.attach(self.notice_listener());
        self.establish(key, Route::Direct(strategy));
        Ok(())
    }

    fn establish(&self, key: WalletPublicKey, route: Route) {
        {
            let mut state = self.shared.lock();
            state.identity = Some(key);
            state.route = Some(route);
        }
        info!(public_key = %key, "wallet connected");
        self.emit(&AdapterEvent::Connect(key));
    }

    /// Disconnect. Idempotent and infallible.
    ///
    /// Extension subscriptions are detached and the identity cleared before
    /// the underlying disconnect runs. A failure there is published as a
    /// `Disconnection` error; the `Disconnect` event is published either way.
    pub async fn disconnect(&self) {
        let route = {
            let mut state = self.shared.lock();
            state.identity = None;
            state.route.take()
        };

        let result = match route {
            Some(Route::Direct(strategy)) => {
                strategy.detach();
                strategy.disconnect().await
            },
            Some(Route::DeepLink) => self.deep_link().disconnect(),
            None if self.deep_link().is_connected() => self.deep_link().disconnect(),
            None => Ok(()),
        };

        if let Err(err) = result {
            let err = err.into_wallet_error(WalletError::disconnection);
            warn!(error = %err, "underlying disconnect failed");
            self.emit(&AdapterEvent::Error(err));
        }

        info!("wallet disconnected");
        self.emit(&AdapterEvent::Disconnect);
    }

    /// Sign a transaction.
    pub async fn sign_transaction<T: Transaction>(
        &self,
        transaction: T,
    ) -> Result<Outcome<T>, WalletError> {
        let result = self
            .try_sign_transaction(transaction)
            .await
            .map_err(|err| err.into_wallet_error(WalletError::sign_transaction));
        self.report(result)
    }

    async fn try_sign_transaction<T: Transaction>(
        &self,
        transaction: T,
    ) -> Result<Outcome<T>, DelegateError> {
        let (_, route) = self.require_identity()?;
        let bytes = transaction.serialize(SerializeConfig::PARTIAL)?;

        match route {
            Route::Direct(strategy) => {
                let signed = strategy.sign_transaction(bytes).await?;
                Ok(Outcome::Complete(T::deserialize(&signed)?))
            },
            Route::DeepLink => Ok(Outcome::Dispatched(self.deep_link().sign_transaction(&bytes)?)),
        }
    }

    /// Sign several transactions, preserving order.
    pub async fn sign_all_transactions<T: Transaction>(
        &self,
        transactions: Vec<T>,
    ) -> Result<Outcome<Vec<T>>, WalletError> {
        let result = self
            .try_sign_all_transactions(transactions)
            .await
            .map_err(|err| err.into_wallet_error(WalletError::sign_transaction));
        self.report(result)
    }

    async fn try_sign_all_transactions<T: Transaction>(
        &self,
        transactions: Vec<T>,
    ) -> Result<Outcome<Vec<T>>, DelegateError> {
        let (_, route) = self.require_identity()?;
        let serialized = transactions
            .iter()
            .map(|tx| tx.serialize(SerializeConfig::PARTIAL))
            .collect::<Result<Vec<_>, _>>()?;

        match route {
            Route::Direct(strategy) => {
                let signed = strategy.sign_all_transactions(serialized).await?;
                let signed = signed
                    .iter()
                    .map(|bytes| T::deserialize(bytes))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Outcome::Complete(signed))
            },
            Route::DeepLink => {
                Ok(Outcome::Dispatched(self.deep_link().sign_all_transactions(&serialized)?))
            },
        }
    }

    /// Sign an arbitrary message.
    pub async fn sign_message(&self, message: &[u8]) -> Result<Outcome<Vec<u8>>, WalletError> {
        let result = self
            .try_sign_message(message)
            .await
            .map_err(|err| err.into_wallet_error(WalletError::sign_message));
        self.report(result)
    }

    async fn try_sign_message(&self, message: &[u8]) -> Result<Outcome<Vec<u8>>, DelegateError> {
        let (_, route) = self.require_identity()?;
        match route {
            Route::Direct(strategy) => Ok(Outcome::Complete(strategy.sign_message(message).await?)),
            Route::DeepLink => Ok(Outcome::Dispatched(self.deep_link().sign_message(message)?)),
        }
    }

    /// Prepare, sign and submit a transaction.
    ///
    /// The fee payer defaults to the connected account, a missing recent
    /// blockhash is fetched from `connection`, and local `signers` partially
    /// sign before the wallet does.
    pub async fn send_transaction<T: Transaction>(
        &self,
        transaction: T,
        connection: &dyn ChainConnection,
        options: SendTransactionOptions,
    ) -> Result<Outcome<String>, WalletError> {
        let result = self
            .try_send_transaction(transaction, connection, options)
            .await
            .map_err(|err| err.into_wallet_error(WalletError::send_transaction));
        self.report(result)
    }

    async fn try_send_transaction<T: Transaction>(
        &self,
        mut transaction: T,
        connection: &dyn ChainConnection,
        options: SendTransactionOptions,
    ) -> Result<Outcome<String>, DelegateError> {
        let (payer, route) = self.require_identity()?;
        let SendTransactionOptions { signers, mut send } = options;

        prepare(&mut transaction, payer, connection, &mut send).await?;
        let bytes = sign_locally_and_serialize(&mut transaction, &signers)?;

        match route {
            Route::Direct(strategy) => {
                let signature = strategy.sign_and_send(bytes, send).await?;
                info!(%signature, "transaction sent");
                Ok(Outcome::Complete(signature))
            },
            Route::DeepLink => Ok(Outcome::Dispatched(self.deep_link().sign_and_send(&bytes, send)?)),
        }
    }

    /// Collect the answer to a request dispatched before the last navigation.
    ///
    /// Reads the current URL; does not require an identity, since the
    /// redirect lands in a fresh process.
    ///
    /// # Errors
    ///
    /// - `WalletError::Rejected` if the wallet declined the request
    /// - the error type of the dispatched operation if the answer does not
    ///   open or parse
    pub fn take_redirect_result(&self) -> Result<Option<RedirectResult>, WalletError> {
        let result = self
            .deep_link()
            .take_result()
            .map_err(|err| err.into_wallet_error(WalletError::connection));
        self.report(result)
    }

    fn require_identity(&self) -> Result<(WalletPublicKey, Route), WalletError> {
        let state = self.shared.lock();
        match (state.identity, &state.route) {
            (Some(key), Some(route)) => Ok((key, route.clone())),
            _ => Err(WalletError::NotConnected),
        }
    }

    fn deep_link(&self) -> DeepLinkStrategy<'_, E> {
        DeepLinkStrategy::new(&self.shared.env, &self.shared.config)
    }

    fn notice_listener(&self) -> NoticeListener {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |notice| {
            if let Some(adapter) = Self::upgrade(&shared) {
                adapter.handle_notice(notice);
            }
        })
    }

    fn upgrade(shared: &Weak<Shared<E>>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    fn handle_notice(&self, notice: ExtensionNotice) {
        match notice {
            ExtensionNotice::Disconnected => self.handle_extension_disconnect(),
            ExtensionNotice::AccountChanged(bytes) => self.handle_account_change(bytes),
        }
    }

    fn handle_extension_disconnect(&self) {
        let route = {
            let mut state = self.shared.lock();
            state.identity = None;
            state.route.take()
        };
        let Some(route) = route else {
            return;
        };
        if let Route::Direct(strategy) = route {
            strategy.detach();
        }

        warn!("wallet disconnected unexpectedly");
        self.emit(&AdapterEvent::Error(WalletError::Disconnected));
        self.emit(&AdapterEvent::Disconnect);
    }

    fn handle_account_change(&self, bytes: Option<Vec<u8>>) {
        if self.public_key().is_none() {
            return;
        }

        let parsed = bytes
            .ok_or_else(|| WalletError::public_key("account change carried no key", None))
            .and_then(|bytes| {
                WalletPublicKey::from_slice(&bytes)
                    .map_err(|err| WalletError::public_key(err.to_string(), Some(Arc::new(err))))
            });
        let key = match parsed {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "ignoring account change");
                self.emit(&AdapterEvent::Error(err));
                return;
            },
        };

        {
            let mut state = self.shared.lock();
            if state.identity == Some(key) {
                return;
            }
            state.identity = Some(key);
        }
        info!(public_key = %key, "wallet account changed");
        self.emit(&AdapterEvent::Connect(key));
    }

    fn report<T>(&self, result: Result<T, WalletError>) -> Result<T, WalletError> {
        if let Err(err) = &result {
            warn!(error = %err, "wallet operation failed");
            self.emit(&AdapterEvent::Error(err.clone()));
        }
        result
    }

    fn emit(&self, event: &AdapterEvent) {
        self.shared.events.publish(event);
    }
}
