//! Adapter lifecycle over the injected extension.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use keyway_core::{
    AdapterConfig, AdapterEvent, ExtensionNotice, Outcome, ReadinessPolicy, ReadyState,
    SendTransactionOptions, WalletAdapter, WalletError, WalletExtension,
};
use keyway_harness::{ExtensionOp, SimChain, SimExtension, SimHost, SimTransaction};
use keyway_proto::{Commitment, WalletPublicKey};

type Recorded = Arc<Mutex<Vec<AdapterEvent>>>;

fn extension_config() -> AdapterConfig {
    AdapterConfig { readiness: ReadinessPolicy::PreferExtension, ..AdapterConfig::default() }
}

fn adapter_on(host: &SimHost) -> (WalletAdapter<SimHost>, Recorded) {
    let adapter = WalletAdapter::new(host.clone(), extension_config());
    let events: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    adapter.events().subscribe_all(move |event| sink.lock().unwrap().push(event.clone()));
    (adapter, events)
}

fn installed(seed: u8) -> (SimHost, Arc<SimExtension>, WalletAdapter<SimHost>, Recorded) {
    let host = SimHost::with_seed(u64::from(seed));
    let extension = SimExtension::new(seed);
    host.install_extension(extension.clone());
    let (adapter, events) = adapter_on(&host);
    (host, extension, adapter, events)
}

fn taken(events: &Recorded) -> Vec<AdapterEvent> {
    std::mem::take(&mut *events.lock().unwrap())
}

#[tokio::test]
async fn connect_establishes_identity_and_subscribes() {
    let (_host, extension, adapter, events) = installed(1);
    assert_eq!(adapter.ready_state(), ReadyState::Installed);

    adapter.connect().await.unwrap();

    let account = WalletPublicKey::new(extension.account_key());
    assert_eq!(adapter.public_key(), Some(account));
    assert!(adapter.connected());
    assert!(!adapter.connecting());
    assert_eq!(extension.connect_calls(), 1);
    assert_eq!(extension.listener_count(), 1);
    assert_eq!(taken(&events), vec![AdapterEvent::Connect(account)]);
}

#[tokio::test]
async fn already_connected_extension_is_not_asked_again() {
    let (_host, extension, adapter, _) = installed(2);
    extension.set_connected(true);

    adapter.connect().await.unwrap();

    assert_eq!(extension.connect_calls(), 0);
    assert!(adapter.connected());
}

#[tokio::test]
async fn connect_while_connected_is_a_no_op() {
    let (_host, extension, adapter, events) = installed(3);
    adapter.connect().await.unwrap();
    taken(&events);

    adapter.connect().await.unwrap();

    assert_eq!(extension.connect_calls(), 1);
    assert_eq!(extension.listener_count(), 1);
    assert!(taken(&events).is_empty());
}

#[tokio::test]
async fn connect_while_connecting_is_a_no_op() {
    let (_host, extension, adapter, events) = installed(13);
    extension.hold_connect();

    let first = adapter.connect();
    let second = async {
        // let the first call reach the extension
        tokio::task::yield_now().await;
        assert!(adapter.connecting());

        let result = adapter.connect().await;
        assert_eq!(extension.connect_calls(), 1);
        assert!(adapter.public_key().is_none());
        extension.release_connect();
        result
    };
    let (first, second) = tokio::join!(first, second);

    first.unwrap();
    second.unwrap();
    let account = WalletPublicKey::new(extension.account_key());
    assert!(!adapter.connecting());
    assert_eq!(extension.connect_calls(), 1);
    assert_eq!(extension.listener_count(), 1);
    assert_eq!(taken(&events), vec![AdapterEvent::Connect(account)]);
}

#[tokio::test]
async fn notice_fired_during_liveness_check_does_not_block_connect() {
    let (_host, extension, adapter, events) = installed(14);
    adapter.connect().await.unwrap();
    taken(&events);
    extension.notify_on_liveness_check(ExtensionNotice::AccountChanged(Some(
        extension.account_key().to_vec(),
    )));

    adapter.connect().await.unwrap();

    assert!(adapter.connected());
    assert_eq!(extension.connect_calls(), 1);
    assert!(taken(&events).is_empty());
}

#[tokio::test]
async fn extension_connect_failure_is_a_connection_error() {
    let (_host, extension, adapter, events) = installed(4);
    extension.fail_next(ExtensionOp::Connect, "user closed the popup");

    let err = adapter.connect().await.unwrap_err();

    assert_eq!(err, WalletError::connection("user closed the popup", None));
    assert!(adapter.public_key().is_none());
    assert!(!adapter.connecting());
    assert_eq!(extension.listener_count(), 0);
    assert_eq!(taken(&events), vec![AdapterEvent::Error(err)]);
}

#[tokio::test]
async fn missing_account_key_is_an_account_error() {
    let (_host, extension, adapter, _) = installed(5);
    extension.expose_key(None);

    let err = adapter.connect().await.unwrap_err();

    assert_eq!(err, WalletError::Account);
    assert!(adapter.public_key().is_none());
}

#[tokio::test]
async fn malformed_account_key_is_a_public_key_error() {
    let (_host, extension, adapter, _) = installed(6);
    extension.expose_key(Some(vec![1, 2, 3]));

    let err = adapter.connect().await.unwrap_err();

    assert!(matches!(err, WalletError::PublicKey { .. }), "{err:?}");
    assert!(adapter.public_key().is_none());
}

#[tokio::test]
async fn account_change_to_same_key_is_silent() {
    let (_host, extension, adapter, events) = installed(7);
    adapter.connect().await.unwrap();
    taken(&events);

    extension.notify(ExtensionNotice::AccountChanged(Some(extension.account_key().to_vec())));

    assert!(taken(&events).is_empty());
}

#[tokio::test]
async fn account_change_to_new_key_reconnects() {
    let (_host, extension, adapter, events) = installed(8);
    adapter.connect().await.unwrap();
    taken(&events);

    extension.switch_account(99);

    let switched = WalletPublicKey::new(SimExtension::new(99).account_key());
    assert_eq!(adapter.public_key(), Some(switched));
    assert!(adapter.connected());
    assert_eq!(taken(&events), vec![AdapterEvent::Connect(switched)]);
}

#[tokio::test]
async fn account_change_without_key_is_reported_and_ignored() {
    let (_host, extension, adapter, events) = installed(9);
    adapter.connect().await.unwrap();
    let account = adapter.public_key();
    taken(&events);

    extension.notify(ExtensionNotice::AccountChanged(None));

    assert_eq!(adapter.public_key(), account);
    let events = taken(&events);
    assert!(matches!(events.as_slice(), [AdapterEvent::Error(WalletError::PublicKey { .. })]));
}

#[tokio::test]
async fn unexpected_disconnect_clears_identity() {
    let (_host, extension, adapter, events) = installed(10);
    adapter.connect().await.unwrap();
    taken(&events);

    extension.drop_connection();

    assert!(adapter.public_key().is_none());
    assert!(!adapter.connected());
    assert_eq!(extension.listener_count(), 0);
    assert_eq!(
        taken(&events),
        vec![AdapterEvent::Error(WalletError::Disconnected), AdapterEvent::Disconnect]
    );

    // Notices after detaching never reach the adapter.
    extension.notify(ExtensionNotice::Disconnected);
    assert!(taken(&events).is_empty());
}

#[tokio::test]
async fn disconnect_detaches_and_disconnects_the_extension() {
    let (_host, extension, adapter, events) = installed(11);
    adapter.connect().await.unwrap();
    taken(&events);

    adapter.disconnect().await;

    assert!(adapter.public_key().is_none());
    assert_eq!(extension.listener_count(), 0);
    assert!(!extension.is_connected());
    assert_eq!(taken(&events), vec![AdapterEvent::Disconnect]);
}

#[tokio::test]
async fn failed_underlying_disconnect_still_completes() {
    let (_host, extension, adapter, events) = installed(12);
    adapter.connect().await.unwrap();
    taken(&events);
    extension.fail_next(ExtensionOp::Disconnect, "extension crashed");

    adapter.disconnect().await;

    assert!(adapter.public_key().is_none());
    assert_eq!(
        taken(&events),
        vec![
            AdapterEvent::Error(WalletError::disconnection("extension crashed", None)),
            AdapterEvent::Disconnect,
        ]
    );
}

#[tokio::test]
async fn disconnect_without_identity_still_emits() {
    let (_host, _extension, adapter, events) = installed(13);

    adapter.disconnect().await;
    adapter.disconnect().await;

    assert_eq!(taken(&events), vec![AdapterEvent::Disconnect, AdapterEvent::Disconnect]);
}

#[tokio::test]
async fn connect_without_readiness_is_not_ready() {
    let host = SimHost::with_seed(14);
    let (adapter, events) = adapter_on(&host);
    assert_eq!(adapter.ready_state(), ReadyState::NotDetected);

    let err = adapter.connect().await.unwrap_err();

    assert_eq!(err, WalletError::NotReady);
    assert!(adapter.public_key().is_none());
    assert_eq!(taken(&events), vec![AdapterEvent::Error(WalletError::NotReady)]);
}

#[tokio::test]
async fn unsupported_host_ignores_connect() {
    let host = SimHost::unavailable();
    let (adapter, events) = adapter_on(&host);
    assert_eq!(adapter.ready_state(), ReadyState::Unsupported);

    adapter.connect().await.unwrap();

    assert!(adapter.public_key().is_none());
    assert!(taken(&events).is_empty());
}

#[tokio::test]
async fn late_extension_is_detected_by_polling() {
    let host = SimHost::with_seed(15);
    let extension = SimExtension::new(15);
    host.install_extension_after(extension.clone(), 3);
    let (adapter, events) = adapter_on(&host);
    assert_eq!(adapter.ready_state(), ReadyState::NotDetected);

    let state = adapter.detect_readiness().await;

    assert_eq!(state, ReadyState::Installed);
    assert_eq!(adapter.ready_state(), ReadyState::Installed);
    assert_eq!(host.elapsed(), Duration::from_secs(2));
    assert_eq!(taken(&events), vec![AdapterEvent::ReadyStateChange(ReadyState::Installed)]);

    adapter.connect().await.unwrap();
    assert!(adapter.connected());
}

#[tokio::test]
async fn polling_gives_up_after_the_attempt_ceiling() {
    let host = SimHost::with_seed(16);
    let (adapter, events) = adapter_on(&host);

    let state = adapter.detect_readiness().await;

    assert_eq!(state, ReadyState::NotDetected);
    assert_eq!(host.elapsed(), Duration::from_secs(9));
    assert!(taken(&events).is_empty());
}

#[tokio::test]
async fn sign_message_is_signed_by_the_account() {
    let (_host, extension, adapter, _) = installed(17);
    adapter.connect().await.unwrap();

    let Outcome::Complete(signature) = adapter.sign_message(b"hello").await.unwrap() else {
        panic!("extension signing completes in place");
    };

    let key = VerifyingKey::from_bytes(&extension.account_key()).unwrap();
    let signature = Signature::from_slice(&signature).unwrap();
    assert!(key.verify(b"hello", &signature).is_ok());
}

#[tokio::test]
async fn extension_sign_failure_is_wrapped() {
    let (_host, extension, adapter, events) = installed(18);
    adapter.connect().await.unwrap();
    taken(&events);
    extension.fail_next(ExtensionOp::SignMessage, "declined");

    let err = adapter.sign_message(b"hello").await.unwrap_err();

    assert_eq!(err, WalletError::sign_message("declined", None));
    assert_eq!(taken(&events), vec![AdapterEvent::Error(err)]);
}

#[tokio::test]
async fn signing_requires_identity() {
    let (_host, _extension, adapter, events) = installed(19);

    let err = adapter.sign_transaction(SimTransaction::new(b"x".to_vec())).await.unwrap_err();

    assert_eq!(err, WalletError::NotConnected);
    assert_eq!(taken(&events), vec![AdapterEvent::Error(WalletError::NotConnected)]);
}

#[tokio::test]
async fn sign_all_transactions_preserves_order() {
    let (_host, extension, adapter, _) = installed(20);
    adapter.connect().await.unwrap();
    let batch =
        vec![SimTransaction::new(b"first".to_vec()), SimTransaction::new(b"second".to_vec())];

    let Outcome::Complete(signed) = adapter.sign_all_transactions(batch).await.unwrap() else {
        panic!("extension signing completes in place");
    };

    assert_eq!(signed[0].instructions, b"first");
    assert_eq!(signed[1].instructions, b"second");
    assert!(signed.iter().all(|tx| tx.is_signed_by(&extension.account_key())));
}

#[tokio::test]
async fn send_transaction_prepares_and_submits() {
    let (_host, extension, adapter, _) = installed(21);
    adapter.connect().await.unwrap();
    let chain = SimChain::new(Commitment::Finalized);
    let local = SigningKey::from_bytes(&[77; 32]);
    let options = SendTransactionOptions { signers: vec![local.clone()], ..Default::default() };

    let Outcome::Complete(signature) = adapter
        .send_transaction(SimTransaction::new(b"transfer".to_vec()), &chain, options)
        .await
        .unwrap()
    else {
        panic!("extension sends complete in place");
    };

    let sent = extension.sent();
    assert_eq!(sent.len(), 1);
    let (tx, send) = &sent[0];
    assert_eq!(tx.fee_payer, Some(extension.account_key()));
    assert_eq!(tx.recent_blockhash.as_deref(), Some("blockhash-1"));
    assert!(tx.is_signed_by(&local.verifying_key().to_bytes()));
    assert!(tx.is_signed_by(&extension.account_key()));
    assert_eq!(send.preflight_commitment, Some(Commitment::Finalized));
    assert_eq!(chain.last_request(), Some((Commitment::Finalized, None)));
    assert!(!signature.is_empty());
}

#[tokio::test]
async fn blockhash_failure_is_a_send_transaction_error() {
    let (_host, extension, adapter, _) = installed(22);
    adapter.connect().await.unwrap();
    let chain = SimChain::new(Commitment::Confirmed);
    chain.fail_with("node unreachable");

    let tx = SimTransaction::new(b"x".to_vec());
    let err =
        adapter.send_transaction(tx, &chain, SendTransactionOptions::default()).await.unwrap_err();

    assert!(matches!(err, WalletError::SendTransaction { .. }), "{err:?}");
    assert!(extension.sent().is_empty());
}
