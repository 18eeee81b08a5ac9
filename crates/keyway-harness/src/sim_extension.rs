//! Simulated browser-extension wallet.
//!
//! Holds a real ed25519 account key and signs what it is asked to. Failures
//! are injected per operation; notices are fired by the test.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use keyway_core::{
    ExtensionError, ExtensionNotice, NoticeListener, NoticeSubscription, Transaction,
    WalletExtension,
};
use keyway_proto::{SendOptions, encoding::wire};
use tokio::sync::Notify;

use crate::SimTransaction;

/// Operations whose failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionOp {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `sign_transaction` and `sign_all_transactions`
    SignTransaction,
    /// `sign_message`
    SignMessage,
    /// `sign_and_send_transaction`
    SignAndSend,
}

#[derive(Default)]
struct State {
    connected: bool,
    /// Overrides the exposed key bytes (to simulate a broken extension)
    exposed_key: Option<Option<Vec<u8>>>,
    listeners: Vec<(NoticeSubscription, NoticeListener)>,
    next_subscription: u64,
    failures: Vec<(ExtensionOp, ExtensionError)>,
    connect_calls: u32,
    /// Pending `connect` calls wait here until released
    connect_gate: Option<Arc<Notify>>,
    /// Fired from inside every `is_connected` check
    liveness_notice: Option<ExtensionNotice>,
    sent: Vec<(SimTransaction, SendOptions)>,
}

/// In-process extension with a deterministic account key.
pub struct SimExtension {
    account: Mutex<SigningKey>,
    state: Mutex<State>,
}

impl SimExtension {
    /// Extension whose account key is derived from `seed`.
    pub fn new(seed: u8) -> Arc<Self> {
        Arc::new(Self {
            account: Mutex::new(SigningKey::from_bytes(&[seed; 32])),
            state: Mutex::new(State::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn account(&self) -> SigningKey {
        self.account.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Account public key.
    pub fn account_key(&self) -> [u8; 32] {
        self.account().verifying_key().to_bytes()
    }

    /// Start out connected (a returning user).
    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    /// Expose `bytes` as the account key instead of the real one.
    pub fn expose_key(&self, bytes: Option<Vec<u8>>) {
        self.state().exposed_key = Some(bytes);
    }

    /// Make the next call of `op` fail with `message`.
    pub fn fail_next(&self, op: ExtensionOp, message: &str) {
        self.state().failures.push((op, ExtensionError::new(message)));
    }

    /// Hold every later `connect` call pending until [`Self::release_connect`].
    pub fn hold_connect(&self) {
        self.state().connect_gate = Some(Arc::new(Notify::new()));
    }

    /// Let a held `connect` call finish.
    pub fn release_connect(&self) {
        if let Some(gate) = self.state().connect_gate.take() {
            gate.notify_one();
        }
    }

    /// Fire `notice` synchronously from inside every later `is_connected`
    /// call, the way some injected wallets do.
    pub fn notify_on_liveness_check(&self, notice: ExtensionNotice) {
        self.state().liveness_notice = Some(notice);
    }

    /// Times `connect` was invoked.
    pub fn connect_calls(&self) -> u32 {
        self.state().connect_calls
    }

    /// Registered notice listeners.
    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Transactions submitted through `sign_and_send_transaction`.
    pub fn sent(&self) -> Vec<(SimTransaction, SendOptions)> {
        self.state().sent.clone()
    }

    /// Switch to the account derived from `seed` and announce it.
    pub fn switch_account(&self, seed: u8) {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner) =
            SigningKey::from_bytes(&[seed; 32]);
        self.notify(ExtensionNotice::AccountChanged(Some(self.account_key().to_vec())));
    }

    /// End the session from the extension side and announce it.
    pub fn drop_connection(&self) {
        self.state().connected = false;
        self.notify(ExtensionNotice::Disconnected);
    }

    /// Deliver `notice` to every listener.
    pub fn notify(&self, notice: ExtensionNotice) {
        let listeners: Vec<NoticeListener> =
            self.state().listeners.iter().map(|(_, listener)| Arc::clone(listener)).collect();
        for listener in listeners {
            listener(notice.clone());
        }
    }

    fn take_failure(&self, op: ExtensionOp) -> Result<(), ExtensionError> {
        let mut state = self.state();
        match state.failures.iter().position(|(failing, _)| *failing == op) {
            Some(index) => Err(state.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn sign_serialized(&self, bytes: &[u8]) -> Result<Vec<u8>, ExtensionError> {
        let mut tx = SimTransaction::deserialize(bytes)
            .map_err(|err| ExtensionError::with_code(-32602, err.to_string()))?;
        tx.sign_with(&self.account());
        serde_json::to_vec(&tx).map_err(|err| ExtensionError::new(err.to_string()))
    }
}

#[async_trait]
impl WalletExtension for SimExtension {
    fn is_connected(&self) -> bool {
        let (connected, notice) = {
            let state = self.state();
            (state.connected, state.liveness_notice.clone())
        };
        if let Some(notice) = notice {
            self.notify(notice);
        }
        connected
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        let state = self.state();
        if let Some(exposed) = &state.exposed_key {
            return exposed.clone();
        }
        state.connected.then(|| self.account_key().to_vec())
    }

    async fn connect(&self) -> Result<(), ExtensionError> {
        let gate = {
            let mut state = self.state();
            state.connect_calls += 1;
            state.connect_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.take_failure(ExtensionOp::Connect)?;
        self.state().connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ExtensionError> {
        self.take_failure(ExtensionOp::Disconnect)?;
        self.state().connected = false;
        Ok(())
    }

    async fn sign_transaction(&self, transaction: Vec<u8>) -> Result<Vec<u8>, ExtensionError> {
        self.take_failure(ExtensionOp::SignTransaction)?;
        self.sign_serialized(&transaction)
    }

    async fn sign_all_transactions(
        &self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, ExtensionError> {
        self.take_failure(ExtensionOp::SignTransaction)?;
        transactions.iter().map(|tx| self.sign_serialized(tx)).collect()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, ExtensionError> {
        self.take_failure(ExtensionOp::SignMessage)?;
        Ok(self.account().sign(message).to_bytes().to_vec())
    }

    async fn sign_and_send_transaction(
        &self,
        transaction: Vec<u8>,
        options: SendOptions,
    ) -> Result<String, ExtensionError> {
        self.take_failure(ExtensionOp::SignAndSend)?;
        let signed = self.sign_serialized(&transaction)?;
        let tx = SimTransaction::deserialize(&signed)
            .map_err(|err| ExtensionError::new(err.to_string()))?;
        let signature = tx
            .signatures
            .last()
            .map(|entry| wire::encode(&entry.signature))
            .ok_or_else(|| ExtensionError::new("transaction was not signed"))?;
        self.state().sent.push((tx, options));
        Ok(signature)
    }

    fn subscribe(&self, listener: NoticeListener) -> NoticeSubscription {
        let mut state = self.state();
        state.next_subscription += 1;
        let subscription = NoticeSubscription(state.next_subscription);
        state.listeners.push((subscription, listener));
        subscription
    }

    fn unsubscribe(&self, subscription: NoticeSubscription) {
        self.state().listeners.retain(|(id, _)| *id != subscription);
    }
}
