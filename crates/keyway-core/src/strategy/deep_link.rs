//! Encrypted redirect protocol against a separate wallet app.
//!
//! # Protocol Flow
//!
//! ```text
//! Dapp (load 1)                         Wallet app               Dapp (load 2)
//!   │ fresh request key pair                │                        │
//!   │ persist {pk, sk}                      │                        │
//!   │── navigate /connect?pk,app,redirect ─▶│                        │
//!   ×  process gone                         │ user approves          │
//!                                           │ seal {public_key,      │
//!                                           │       session}         │
//!                                           │── redirect ?wpk,n,d ──▶│
//!                                           │                        │ load sk
//!                                           │                        │ agree(sk, wpk)
//!                                           │                        │ open(d, n)
//!                                           │                        │ persist secret,
//!                                           │                        │ session token
//! ```
//!
//! Signing requests are further round trips: the body plus the session
//! token is sealed under the shared secret with a fresh nonce, the process
//! navigates away, and the answer is collected on a later load by
//! [`DeepLinkStrategy::take_result`].
//!
//! # Security
//!
//! - Completion requires the persisted request secret key. Without it there
//!   is no pending request and completion fails; nothing is inferred.
//! - The shared secret is persisted only after the wallet's body
//!   authenticated under it.
//! - Every sealed request uses a fresh nonce from the host RNG.

use std::sync::Arc;

use keyway_crypto::{KeyPair, Nonce, PublicKey, decrypt, derive_shared_secret, encrypt};
use keyway_proto::{
    ConnectApproval, ConnectRequest, EncryptedRequest, InboundResponse, MessageSignature,
    ProtocolError, RequestMethod, SealedResponse, SendOptions, SignAllTransactionsPayload,
    SignAndSendPayload, SignMessagePayload, SignTransactionPayload, SignatureResult,
    TransactionResult, TransactionsResult, WalletPublicKey, encoding::wire,
    params::canonical_redirect,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;
use zeroize::Zeroize;

use crate::{
    AdapterConfig, Cause, DelegateError, HostEnvironment, WalletError,
    outcome::{Dispatch, RedirectResult},
    session::{SessionError, SessionStore},
};

/// What `connect()` did over the deep-link channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStep {
    /// A connect request was sent; the process navigated to this URL
    Redirected(Url),
    /// A wallet identity is established
    Established(WalletPublicKey),
}

/// Deep-link protocol bound to a host and configuration.
///
/// Holds no state of its own. Everything that must survive a navigation is
/// in host storage, so a strategy is built per call.
pub struct DeepLinkStrategy<'a, E: HostEnvironment> {
    env: &'a E,
    config: &'a AdapterConfig,
}

impl<'a, E: HostEnvironment> DeepLinkStrategy<'a, E> {
    /// Strategy over `env`.
    pub fn new(env: &'a E, config: &'a AdapterConfig) -> Self {
        Self { env, config }
    }

    fn store(&self) -> SessionStore<'a> {
        SessionStore::new(self.env.storage())
    }

    /// Run whichever connect phase the current URL calls for.
    ///
    /// - Handshake parameters present: complete the pending request
    /// - A stored session: resume it without a round trip
    /// - A failure response: report the wallet's rejection
    /// - Otherwise: start a new request and navigate away
    pub fn connect(&self) -> Result<ConnectStep, DelegateError> {
        let current = self.env.current_url();

        if InboundResponse::is_handshake(&current) {
            return self.complete(&current).map(ConnectStep::Established);
        }

        if let Some(wallet) = self.resume()? {
            debug!(%wallet, "resumed stored session");
            return Ok(ConnectStep::Established(wallet));
        }

        if let Some(InboundResponse::Rejected { code, message }) =
            InboundResponse::rejection(&current)
        {
            return Err(WalletError::Rejected { code, message }.into());
        }

        self.request(&current).map(ConnectStep::Redirected)
    }

    /// Request phase: fresh key pair, persist, navigate.
    fn request(&self, current: &Url) -> Result<Url, DelegateError> {
        let mut seed = [0u8; 32];
        self.env.random_bytes(&mut seed);
        let pair = KeyPair::from_secret_bytes(seed);
        seed.zeroize();

        self.store().begin_request(&pair)?;

        let redirect = canonical_redirect(current);
        let url = ConnectRequest {
            dapp_public_key: *pair.public.as_bytes(),
            app_url: redirect.clone(),
            redirect_link: redirect,
            cluster: self.config.cluster,
        }
        .to_url(&self.config.wallet_base()?)?;

        info!(cluster = %self.config.cluster, "navigating to wallet for connect");
        self.env.navigate(&url);
        Ok(url)
    }

    /// Completion phase: agree, open, adopt.
    fn complete(&self, current: &Url) -> Result<WalletPublicKey, DelegateError> {
        let sealed = match InboundResponse::parse(current)? {
            InboundResponse::Approved(sealed) => sealed,
            InboundResponse::Rejected { code, message } => {
                return Err(WalletError::Rejected { code, message }.into());
            },
            InboundResponse::Absent => {
                return Err(WalletError::connection("no handshake response", None).into());
            },
        };
        let wallet_key = sealed
            .wallet_public_key
            .ok_or_else(|| WalletError::connection("handshake response has no wallet key", None))?;

        let store = self.store();
        let secret = store.request_secret()?;
        let shared = derive_shared_secret(&secret, &PublicKey::from_bytes(wallet_key))
            .map_err(|err| WalletError::connection(err.to_string(), Some(Arc::new(err))))?;

        let plaintext = decrypt(&sealed.data, &Nonce::from_bytes(sealed.nonce), &shared)
            .map_err(|err| WalletError::connection(err.to_string(), Some(Arc::new(err))))?;
        let approval = ConnectApproval::from_bytes(&plaintext)
            .map_err(|err| WalletError::connection(err.to_string(), Some(Arc::new(err))))?;
        let wallet = approval
            .wallet_public_key()
            .map_err(|err| WalletError::public_key(err.to_string(), Some(Arc::new(err))))?;

        store.store_shared_secret(&shared)?;
        store.store_approval(&approval.session, &wallet)?;

        info!(%wallet, "deep-link handshake complete");
        Ok(wallet)
    }

    fn resume(&self) -> Result<Option<WalletPublicKey>, DelegateError> {
        let store = self.store();
        if !store.has_session()? {
            return Ok(None);
        }
        Ok(Some(store.wallet_public_key()?))
    }

    /// Whether a completed handshake is stored.
    pub fn is_connected(&self) -> bool {
        self.store().has_session().unwrap_or(false)
    }

    /// Forget the stored session.
    pub fn disconnect(&self) -> Result<(), DelegateError> {
        self.store().clear()?;
        info!("deep-link session cleared");
        Ok(())
    }

    /// Dispatch `signAndSendTransaction`.
    pub fn sign_and_send(
        &self,
        transaction: &[u8],
        options: SendOptions,
    ) -> Result<Dispatch, DelegateError> {
        self.dispatch(RequestMethod::SignAndSendTransaction, |session| {
            serde_json::to_vec(&SignAndSendPayload::new(transaction, Some(options), session))
        })
    }

    /// Dispatch `signTransaction`.
    pub fn sign_transaction(&self, transaction: &[u8]) -> Result<Dispatch, DelegateError> {
        self.dispatch(RequestMethod::SignTransaction, |session| {
            serde_json::to_vec(&SignTransactionPayload {
                transaction: wire::encode(transaction),
                session,
            })
        })
    }

    /// Dispatch `signAllTransactions`.
    pub fn sign_all_transactions(
        &self,
        transactions: &[Vec<u8>],
    ) -> Result<Dispatch, DelegateError> {
        self.dispatch(RequestMethod::SignAllTransactions, |session| {
            serde_json::to_vec(&SignAllTransactionsPayload {
                transactions: transactions.iter().map(|tx| wire::encode(tx)).collect(),
                session,
            })
        })
    }

    /// Dispatch `signMessage`.
    pub fn sign_message(&self, message: &[u8]) -> Result<Dispatch, DelegateError> {
        self.dispatch(RequestMethod::SignMessage, |session| {
            serde_json::to_vec(&SignMessagePayload { message: wire::encode(message), session })
        })
    }

    /// Seal a request body with a fresh nonce and navigate to the wallet.
    fn dispatch(
        &self,
        method: RequestMethod,
        body: impl FnOnce(String) -> serde_json::Result<Vec<u8>>,
    ) -> Result<Dispatch, DelegateError> {
        let store = self.store();
        let channel = store.channel()?;

        let mut nonce = [0u8; 24];
        self.env.random_bytes(&mut nonce);
        let nonce = Nonce::from_bytes(nonce);

        let plaintext = body(channel.session_token.clone()).map_err(ProtocolError::from)?;
        let payload = encrypt(&plaintext, &nonce, &channel.shared_secret)?;

        let url = EncryptedRequest {
            method,
            dapp_public_key: *channel.dapp_public_key.as_bytes(),
            nonce: *nonce.as_bytes(),
            redirect_link: canonical_redirect(&self.env.current_url()),
            payload,
        }
        .to_url(&self.config.wallet_base()?)?;

        store.set_pending_method(method)?;

        info!(%method, "navigating to wallet");
        self.env.navigate(&url);
        Ok(Dispatch { method, nonce, url })
    }

    /// Collect the answer to the last dispatched request from the current
    /// URL.
    ///
    /// Returns `None` when the URL carries no answer, carries a handshake
    /// (handled by `connect`), or answers a request already collected.
    pub fn take_result(&self) -> Result<Option<RedirectResult>, DelegateError> {
        let current = self.env.current_url();
        if InboundResponse::is_handshake(&current) {
            return Ok(None);
        }

        let sealed = match InboundResponse::parse(&current)? {
            InboundResponse::Absent => return Ok(None),
            InboundResponse::Approved(sealed) => sealed,
            InboundResponse::Rejected { code, message } => {
                return match self.pending_method()? {
                    Some(_) => Err(WalletError::Rejected { code, message }.into()),
                    None => Ok(None),
                };
            },
        };

        let Some(method) = self.pending_method()? else {
            return Ok(None);
        };

        self.open(method, &sealed)
            .map(Some)
            .map_err(|err| DelegateError::Typed(err.into_wallet_error(wrapper(method))))
    }

    fn pending_method(&self) -> Result<Option<RequestMethod>, DelegateError> {
        match self.store().take_pending_method() {
            Ok(method) => Ok(Some(method)),
            Err(SessionError::Missing { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn open(
        &self,
        method: RequestMethod,
        sealed: &SealedResponse,
    ) -> Result<RedirectResult, DelegateError> {
        let secret = self.store().shared_secret()?;
        let plaintext = decrypt(&sealed.data, &Nonce::from_bytes(sealed.nonce), &secret)?;

        let result = match method {
            RequestMethod::SignAndSendTransaction => {
                RedirectResult::Signature(parse::<SignatureResult>(&plaintext)?.signature)
            },
            RequestMethod::SignTransaction => {
                let body = parse::<TransactionResult>(&plaintext)?;
                RedirectResult::Transaction(wire::decode("transaction", &body.transaction)?)
            },
            RequestMethod::SignAllTransactions => {
                let body = parse::<TransactionsResult>(&plaintext)?;
                let transactions = body
                    .transactions
                    .iter()
                    .map(|tx| wire::decode("transactions", tx))
                    .collect::<Result<_, _>>()?;
                RedirectResult::Transactions(transactions)
            },
            RequestMethod::SignMessage => {
                let body = parse::<MessageSignature>(&plaintext)?;
                RedirectResult::MessageSignature(wire::decode("signature", &body.signature)?)
            },
            RequestMethod::Connect => {
                return Err(ProtocolError::MalformedPayload(
                    "connect is not a dispatched request".into(),
                )
                .into());
            },
        };

        debug!(%method, "collected redirect result");
        Ok(result)
    }
}

fn parse<T: DeserializeOwned>(plaintext: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(plaintext)?)
}

/// Error constructor for failures answering `method`.
fn wrapper(method: RequestMethod) -> fn(String, Option<Cause>) -> WalletError {
    match method {
        RequestMethod::SignAndSendTransaction => WalletError::send_transaction,
        RequestMethod::SignTransaction | RequestMethod::SignAllTransactions => {
            WalletError::sign_transaction
        },
        RequestMethod::SignMessage => WalletError::sign_message,
        RequestMethod::Connect => WalletError::connection,
    }
}
