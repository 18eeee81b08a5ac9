//! World state for scenario execution.
//!
//! The World owns the simulated host, wallet app, extension and network,
//! the adapter of the current page instance, and everything observed while
//! steps ran: published events across all page instances and the outcome of
//! every step.

use std::sync::{Arc, Mutex, PoisonError};

use keyway_core::{
    AdapterConfig, AdapterEvent, HostEnvironment, Outcome, ReadinessPolicy, RedirectResult,
    SendTransactionOptions, Transaction, WalletAdapter, WalletError,
};
use keyway_proto::{Commitment, WalletPublicKey, params::canonical_redirect};
use url::Url;

use crate::{Decision, SimChain, SimExtension, SimHost, SimTransaction, SimWalletApp};

/// Transport the scenario connects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Encrypted redirects to the simulated wallet app
    DeepLink,
    /// The simulated extension injected into the host
    Extension,
}

/// What a step produced.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Completed with no value (connect, disconnect, reload)
    Done,
    /// Transaction signature
    Signature(String),
    /// Message signature bytes
    MessageSignature(Vec<u8>),
    /// Signed transaction
    Transaction(SimTransaction),
    /// Signed transactions
    Transactions(Vec<SimTransaction>),
    /// The step failed
    Failed(WalletError),
}

impl StepOutcome {
    /// Whether the step failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// World state containing all actors and observations.
pub struct World {
    transport: Transport,
    host: SimHost,
    wallet: SimWalletApp,
    extension: Arc<SimExtension>,
    chain: SimChain,
    config: AdapterConfig,
    adapter: WalletAdapter<SimHost>,
    events: Arc<Mutex<Vec<AdapterEvent>>>,
    outcomes: Vec<StepOutcome>,
}

impl World {
    /// World for `transport` with deterministic seeds.
    ///
    /// The readiness policy in `config` is overridden to match `transport`.
    pub fn new(transport: Transport, seed: u64, mut config: AdapterConfig) -> Self {
        let host = SimHost::with_seed(seed);
        let extension = SimExtension::new(seed.to_le_bytes()[0] ^ 0x3c);
        config.readiness = match transport {
            Transport::DeepLink => ReadinessPolicy::PreferDeepLink,
            Transport::Extension => {
                host.install_extension(extension.clone());
                ReadinessPolicy::PreferExtension
            },
        };

        let events = Arc::new(Mutex::new(Vec::new()));
        let adapter = Self::page(&host, &config, &events);

        Self {
            transport,
            host,
            wallet: SimWalletApp::new(seed),
            extension,
            chain: SimChain::new(Commitment::Confirmed),
            config,
            adapter,
            events,
            outcomes: Vec::new(),
        }
    }

    fn page(
        host: &SimHost,
        config: &AdapterConfig,
        events: &Arc<Mutex<Vec<AdapterEvent>>>,
    ) -> WalletAdapter<SimHost> {
        let adapter = WalletAdapter::new(host.clone(), config.clone());
        let sink = Arc::clone(events);
        adapter.events().subscribe_all(move |event| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
        });
        adapter
    }

    /// Load a new page instance on `url`.
    pub fn load(&mut self, url: Url) {
        self.host.reload(url);
        self.adapter = Self::page(&self.host, &self.config, &self.events);
    }

    /// Transport in use.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Simulated host.
    pub fn host(&self) -> &SimHost {
        &self.host
    }

    /// Simulated wallet app.
    pub fn wallet(&self) -> &SimWalletApp {
        &self.wallet
    }

    /// Simulated extension (injected only on the extension transport).
    pub fn extension(&self) -> &Arc<SimExtension> {
        &self.extension
    }

    /// Simulated network.
    pub fn chain(&self) -> &SimChain {
        &self.chain
    }

    /// Adapter of the current page instance.
    pub fn adapter(&self) -> &WalletAdapter<SimHost> {
        &self.adapter
    }

    /// Account the scenario's wallet connects as.
    pub fn wallet_account(&self) -> WalletPublicKey {
        match self.transport {
            Transport::DeepLink => self.wallet.account(),
            Transport::Extension => WalletPublicKey::new(self.extension.account_key()),
        }
    }

    /// Every event published by any page instance, in order.
    pub fn events(&self) -> Vec<AdapterEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Errors published by any page instance.
    pub fn error_events(&self) -> Vec<WalletError> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AdapterEvent::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    /// Outcome of every step, in order.
    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    /// Let the wallet answer the last navigation, reload on its redirect,
    /// and run the page's on-load `connect()`, returning what it returned.
    pub(crate) async fn answer(
        &mut self,
        decision: &Decision,
    ) -> Result<Result<(), WalletError>, String> {
        let request = self.host.last_navigation().ok_or("no navigation to answer")?;
        let redirect = self.wallet.respond(&request, decision)?;
        self.load(redirect);
        Ok(self.adapter.connect().await)
    }

    /// Reload the current page without response parameters.
    pub(crate) fn reload_clean(&mut self) {
        let url = canonical_redirect(&self.host.current_url());
        self.load(url);
    }

    /// Answer a dispatched request and collect its result on the new page.
    pub(crate) async fn complete_dispatch(
        &mut self,
        decision: &Decision,
    ) -> Result<StepOutcome, String> {
        if let Err(err) = self.answer(decision).await? {
            tracing::debug!(error = %err, "on-load connect failed");
        }
        Ok(match self.adapter.take_redirect_result() {
            Ok(Some(result)) => collected(result)?,
            Ok(None) => return Err("redirect carried no result".into()),
            Err(err) => StepOutcome::Failed(err),
        })
    }

    pub(crate) async fn send(&self, tx: SimTransaction) -> Result<Outcome<String>, WalletError> {
        self.adapter.send_transaction(tx, &self.chain, SendTransactionOptions::default()).await
    }
}

fn collected(result: RedirectResult) -> Result<StepOutcome, String> {
    Ok(match result {
        RedirectResult::Signature(signature) => StepOutcome::Signature(signature),
        RedirectResult::MessageSignature(signature) => StepOutcome::MessageSignature(signature),
        RedirectResult::Transaction(bytes) => {
            StepOutcome::Transaction(SimTransaction::deserialize(&bytes).map_err(|e| e.to_string())?)
        },
        RedirectResult::Transactions(all) => StepOutcome::Transactions(
            all.iter()
                .map(|bytes| SimTransaction::deserialize(bytes))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?,
        ),
    })
}
