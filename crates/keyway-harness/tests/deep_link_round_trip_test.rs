//! Deep-link protocol round trips against the simulated wallet app.
//!
//! Every test runs on one `SimHost`; a "page load" is a fresh adapter over
//! the same host, so storage carries across exactly as origin storage does
//! across a browser redirect.

use std::sync::{Arc, Mutex};

use keyway_core::{
    AdapterConfig, AdapterEvent, Dispatch, Outcome, RedirectResult, SendTransactionOptions,
    SessionStore, WalletAdapter, WalletError, session,
};
use keyway_crypto::{KeyPair, Nonce, SharedSecret, decrypt, derive_shared_secret, encrypt};
use keyway_harness::{
    Decision, SimChain, SimHost, SimTransaction, SimWalletApp, USER_REJECTED, tamper_data,
};
use keyway_proto::{
    Cluster, Commitment, ConnectApproval, ConnectRequest, EncryptedRequest, InboundResponse,
    RequestMethod, SealedResponse, SignAndSendPayload, WalletPublicKey,
    encoding::{stored, wire},
    params::canonical_redirect,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use url::Url;

const PAGE: &str = "https://dapp.example/app?ref=home";

type Recorded = Arc<Mutex<Vec<AdapterEvent>>>;

fn page(host: &SimHost) -> (WalletAdapter<SimHost>, Recorded) {
    let adapter = WalletAdapter::new(host.clone(), AdapterConfig::default());
    let events: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    adapter.events().subscribe_all(move |event| sink.lock().unwrap().push(event.clone()));
    (adapter, events)
}

fn reload(host: &SimHost, url: Url) -> (WalletAdapter<SimHost>, Recorded) {
    host.reload(url);
    page(host)
}

fn stored_key(host: &SimHost, key: &'static str) -> [u8; 32] {
    let value = host.sim_storage().value(key).unwrap();
    stored::decode_array::<32>(key, &value).unwrap()
}

fn request_pair(host: &SimHost) -> KeyPair {
    SessionStore::new(host.sim_storage()).request_pair().unwrap()
}

fn dispatched<T>(outcome: Outcome<T>) -> Dispatch {
    match outcome {
        Outcome::Dispatched(dispatch) => dispatch,
        Outcome::Complete(_) => panic!("deep-link operations must be dispatched"),
    }
}

/// Run the full connect round trip and return the connected page.
async fn connected(host: &SimHost, wallet: &SimWalletApp) -> (WalletAdapter<SimHost>, Recorded) {
    let (adapter, _) = page(host);
    adapter.connect().await.unwrap();
    let redirect = wallet.approve(&host.last_navigation().unwrap()).unwrap();

    let (adapter, events) = reload(host, redirect);
    adapter.connect().await.unwrap();
    assert!(adapter.connected());
    (adapter, events)
}

#[tokio::test]
async fn request_phase_persists_one_fresh_key_pair() {
    let host = SimHost::with_seed(1);
    let stale = format!(
        "{PAGE}&nonce={}&data={}&errorMessage=old",
        wire::encode(&[7u8; 24]),
        wire::encode(b"stale")
    );
    let (adapter, events) = reload(&host, Url::parse(&stale).unwrap());

    adapter.connect().await.unwrap();

    assert_eq!(host.navigations().len(), 1);
    let request = ConnectRequest::from_url(&host.last_navigation().unwrap()).unwrap();

    let pair = request_pair(&host);
    assert_eq!(request.dapp_public_key, *pair.public.as_bytes());
    assert_eq!(pair.secret.public_key(), pair.public);

    assert_eq!(request.app_url.as_str(), PAGE);
    assert_eq!(request.redirect_link.as_str(), PAGE);
    assert_eq!(request.cluster, Cluster::MainnetBeta);

    assert!(host.sim_storage().value(session::SHARED_SECRET).is_none());
    assert!(host.sim_storage().value(session::SESSION_TOKEN).is_none());
    assert!(adapter.public_key().is_none());
    assert!(!adapter.connecting());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn page_parameters_that_look_like_a_response_still_start_a_request() {
    for query in ["data=report", "nonce=0OIl", "nonce=abc&data=%21%21"] {
        let host = SimHost::with_seed(21);
        let url = Url::parse(&format!("{PAGE}&{query}")).unwrap();
        let (adapter, events) = reload(&host, url);

        adapter.connect().await.unwrap();

        assert_eq!(host.navigations().len(), 1, "{query}");
        let request = ConnectRequest::from_url(&host.last_navigation().unwrap()).unwrap();
        assert_eq!(request.redirect_link.as_str(), PAGE, "{query}");
        assert_eq!(request.dapp_public_key, *request_pair(&host).public.as_bytes());
        assert!(events.lock().unwrap().is_empty(), "{query}");
    }
}

#[tokio::test]
async fn each_request_uses_a_new_key_pair() {
    let host = SimHost::with_seed(2);
    let (adapter, _) = page(&host);

    adapter.connect().await.unwrap();
    let first = request_pair(&host).public;
    adapter.connect().await.unwrap();
    let second = request_pair(&host).public;

    assert_ne!(first, second);
    assert_eq!(host.navigations().len(), 2);
}

#[tokio::test]
async fn completion_establishes_identity_from_sealed_approval() {
    let host = SimHost::with_seed(3);
    let (adapter, _) = page(&host);
    adapter.connect().await.unwrap();

    // Wallet side: ephemeral pair (skW, pkW) agreeing with the stored pkD.
    let dapp_secret = request_pair(&host);
    let dapp_public = dapp_secret.public;
    let mut rng = ChaCha20Rng::seed_from_u64(99);
    let wallet_pair = KeyPair::generate(&mut rng);
    let shared = derive_shared_secret(&wallet_pair.secret, &dapp_public).unwrap();
    assert_eq!(
        derive_shared_secret(&dapp_secret.secret, &wallet_pair.public).unwrap().as_bytes(),
        shared.as_bytes()
    );

    let addr = WalletPublicKey::new([42; 32]);
    let body = format!(r#"{{"public_key":"{}","session":"tok1"}}"#, addr.to_base58());
    let nonce = Nonce::generate(&mut rng);
    let data = encrypt(body.as_bytes(), &nonce, &shared).unwrap();
    let redirect = InboundResponse::Approved(SealedResponse {
        wallet_public_key: Some(*wallet_pair.public.as_bytes()),
        nonce: *nonce.as_bytes(),
        data,
    })
    .to_redirect(&Url::parse(PAGE).unwrap());

    let (adapter, events) = reload(&host, redirect);
    adapter.connect().await.unwrap();

    assert_eq!(adapter.public_key(), Some(addr));
    assert!(adapter.connected());
    assert_eq!(host.sim_storage().value(session::SESSION_TOKEN).as_deref(), Some("tok1"));
    assert_eq!(stored_key(&host, session::SHARED_SECRET), *shared.as_bytes());
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Connect(addr)]);
}

#[tokio::test]
async fn tampered_handshake_is_a_connection_error() {
    let host = SimHost::with_seed(4);
    let wallet = SimWalletApp::new(4);
    let (adapter, _) = page(&host);
    adapter.connect().await.unwrap();
    let redirect = wallet.approve(&host.last_navigation().unwrap()).unwrap();

    let (adapter, events) = reload(&host, tamper_data(&redirect).unwrap());
    let err = adapter.connect().await.unwrap_err();

    assert!(matches!(err, WalletError::Connection { .. }), "{err:?}");
    assert!(adapter.public_key().is_none());
    assert!(host.sim_storage().value(session::SESSION_TOKEN).is_none());
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Error(err)]);
}

#[tokio::test]
async fn handshake_without_pending_request_is_storage_key_missing() {
    let host = SimHost::with_seed(5);
    let wallet = SimWalletApp::new(5);
    let (adapter, _) = page(&host);
    adapter.connect().await.unwrap();
    let redirect = wallet.approve(&host.last_navigation().unwrap()).unwrap();

    // Same redirect landing in an origin that never started a request.
    let fresh = SimHost::with_seed(5);
    let (adapter, events) = reload(&fresh, redirect);
    let err = adapter.connect().await.unwrap_err();

    assert_eq!(err, WalletError::StorageKeyMissing { key: session::DAPP_KEY_PAIR });
    assert!(adapter.public_key().is_none());
    assert!(fresh.navigations().is_empty());
    assert!(fresh.sim_storage().snapshot().is_empty());
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Error(err)]);
}

#[tokio::test]
async fn rejected_connect_is_reported() {
    let host = SimHost::with_seed(6);
    let wallet = SimWalletApp::new(6);
    let (adapter, _) = page(&host);
    adapter.connect().await.unwrap();
    let redirect =
        wallet.respond(&host.last_navigation().unwrap(), &Decision::user_rejected()).unwrap();

    let (adapter, events) = reload(&host, redirect);
    let err = adapter.connect().await.unwrap_err();

    match &err {
        WalletError::Rejected { code, .. } => assert_eq!(code, USER_REJECTED),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(host.navigations().len(), 1);
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Error(err)]);
}

#[tokio::test]
async fn stored_session_resumes_without_round_trip() {
    let host = SimHost::with_seed(7);
    let wallet = SimWalletApp::new(7);
    connected(&host, &wallet).await;

    let (adapter, events) = reload(&host, Url::parse(PAGE).unwrap());
    adapter.connect().await.unwrap();

    assert_eq!(adapter.public_key(), Some(wallet.account()));
    assert_eq!(host.navigations().len(), 1);
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Connect(wallet.account())]);
}

#[tokio::test]
async fn connect_while_connected_is_a_no_op() {
    let host = SimHost::with_seed(8);
    let wallet = SimWalletApp::new(8);
    let (adapter, events) = connected(&host, &wallet).await;
    let before = events.lock().unwrap().len();

    adapter.connect().await.unwrap();

    assert_eq!(events.lock().unwrap().len(), before);
    assert_eq!(host.navigations().len(), 1);
    assert_eq!(wallet.issued_tokens(), 1);
}

#[tokio::test]
async fn send_round_trip_carries_session_token_and_transaction() {
    let host = SimHost::with_seed(9);
    let wallet = SimWalletApp::new(9);
    let (adapter, _) = connected(&host, &wallet).await;
    let chain = SimChain::new(Commitment::Confirmed);

    let tx = SimTransaction::new(b"transfer".to_vec());
    let outcome =
        adapter.send_transaction(tx, &chain, SendTransactionOptions::default()).await.unwrap();
    let dispatch = dispatched(outcome);
    assert_eq!(dispatch.method, RequestMethod::SignAndSendTransaction);
    assert_eq!(host.last_navigation().as_ref(), Some(&dispatch.url));

    // Open the request independently with the persisted shared secret.
    let request = EncryptedRequest::from_url(&dispatch.url).unwrap();
    assert_eq!(request.nonce, *dispatch.nonce.as_bytes());
    assert_eq!(request.dapp_public_key, *request_pair(&host).public.as_bytes());
    assert_eq!(request.redirect_link.as_str(), PAGE);

    let shared = SharedSecret::from_bytes(stored_key(&host, session::SHARED_SECRET));
    let plaintext = decrypt(&request.payload, &Nonce::from_bytes(request.nonce), &shared).unwrap();
    let payload: SignAndSendPayload = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(payload.session, "tok1");

    let sent: SimTransaction =
        serde_json::from_slice(&payload.transaction_bytes().unwrap()).unwrap();
    assert_eq!(sent.instructions, b"transfer");
    assert_eq!(sent.fee_payer, Some(*wallet.account().as_bytes()));
    assert_eq!(sent.recent_blockhash.as_deref(), Some("blockhash-1"));
    assert_eq!(payload.send_options.unwrap().preflight_commitment, Some(Commitment::Confirmed));

    // The wallet sees the same body, and its answer is collected on reload.
    let received = wallet.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body["session"], "tok1");

    let redirect = wallet.approve(&dispatch.url).unwrap();
    let (adapter, _) = reload(&host, redirect);
    let Some(RedirectResult::Signature(signature)) = adapter.take_redirect_result().unwrap()
    else {
        panic!("expected a signature");
    };
    assert!(!wire::decode("signature", &signature).unwrap().is_empty());
    assert_eq!(adapter.take_redirect_result().unwrap(), None);
}

#[tokio::test]
async fn consecutive_requests_never_reuse_a_nonce() {
    let host = SimHost::with_seed(10);
    let wallet = SimWalletApp::new(10);
    let (adapter, _) = connected(&host, &wallet).await;

    let first = dispatched(adapter.sign_message(b"one").await.unwrap());
    let second = dispatched(adapter.sign_message(b"one").await.unwrap());

    assert_ne!(first.nonce, second.nonce);
    assert_ne!(first.url, second.url);
}

#[tokio::test]
async fn rejected_sign_is_collected_once() {
    let host = SimHost::with_seed(11);
    let wallet = SimWalletApp::new(11);
    let (adapter, _) = connected(&host, &wallet).await;
    let dispatch = dispatched(adapter.sign_message(b"hello").await.unwrap());

    let redirect = wallet.respond(&dispatch.url, &Decision::user_rejected()).unwrap();
    let (adapter, events) = reload(&host, redirect);

    let err = adapter.take_redirect_result().unwrap_err();
    assert!(matches!(err, WalletError::Rejected { .. }));
    assert_eq!(adapter.take_redirect_result().unwrap(), None);
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Error(err)]);
}

#[tokio::test]
async fn tampered_sign_result_is_a_sign_message_error() {
    let host = SimHost::with_seed(12);
    let wallet = SimWalletApp::new(12);
    let (adapter, _) = connected(&host, &wallet).await;
    let dispatch = dispatched(adapter.sign_message(b"hello").await.unwrap());

    let redirect = tamper_data(&wallet.approve(&dispatch.url).unwrap()).unwrap();
    let (adapter, _) = reload(&host, redirect);

    let err = adapter.take_redirect_result().unwrap_err();
    assert!(matches!(err, WalletError::SignMessage { .. }), "{err:?}");
}

#[tokio::test]
async fn sign_requires_identity() {
    let host = SimHost::with_seed(13);
    let (adapter, events) = page(&host);

    let err = adapter.sign_message(b"hello").await.unwrap_err();

    assert_eq!(err, WalletError::NotConnected);
    assert!(host.navigations().is_empty());
    assert_eq!(*events.lock().unwrap(), vec![AdapterEvent::Error(WalletError::NotConnected)]);
}

#[tokio::test]
async fn disconnect_clears_the_stored_session() {
    let host = SimHost::with_seed(14);
    let wallet = SimWalletApp::new(14);
    let (adapter, events) = connected(&host, &wallet).await;

    adapter.disconnect().await;

    assert!(adapter.public_key().is_none());
    assert!(!adapter.connected());
    for key in [
        session::DAPP_KEY_PAIR,
        session::SHARED_SECRET,
        session::SESSION_TOKEN,
    ] {
        assert!(host.sim_storage().value(key).is_none(), "{key} survived disconnect");
    }
    assert_eq!(events.lock().unwrap().last(), Some(&AdapterEvent::Disconnect));

    // A fresh page no longer resumes.
    let (adapter, _) = reload(&host, Url::parse(PAGE).unwrap());
    adapter.connect().await.unwrap();
    assert!(adapter.public_key().is_none());
    assert_eq!(host.navigations().len(), 2);
}

#[tokio::test]
async fn storage_failure_during_request_is_a_connection_error() {
    let host = SimHost::with_seed(15);
    let (adapter, _) = page(&host);
    host.sim_storage().set_fail_writes(true);

    let err = adapter.connect().await.unwrap_err();

    assert!(matches!(err, WalletError::Connection { .. }), "{err:?}");
    assert!(host.navigations().is_empty());
    assert!(!adapter.connecting());
}

#[test]
fn canonical_redirect_strips_every_response_parameter() {
    let url = Url::parse(&format!(
        "{PAGE}&phantom_encryption_public_key=a&nonce=b&data=c&errorCode=d&errorMessage=e"
    ))
    .unwrap();

    assert_eq!(canonical_redirect(&url).as_str(), PAGE);
}

#[test]
fn approval_body_matches_wire_shape() {
    let body = br#"{"public_key":"11111111111111111111111111111111","session":"tok9"}"#;
    let approval = ConnectApproval::from_bytes(body).unwrap();
    assert_eq!(approval.session, "tok9");
    assert_eq!(approval.wallet_public_key().unwrap(), WalletPublicKey::new([0; 32]));
}
