//! Simulated wallet app: the far side of the deep-link protocol.
//!
//! Reads a request URL the adapter navigated to, decides, and produces the
//! URL the wallet would redirect back to. It keeps its own session table
//! keyed by the dapp's request key, and records every decrypted request body
//! so tests can check what actually crossed the wire.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use ed25519_dalek::{Signer, SigningKey};
use keyway_core::Transaction;
use keyway_crypto::{KeyPair, Nonce, PublicKey, SharedSecret, decrypt, derive_shared_secret, encrypt};
use keyway_proto::{
    ConnectApproval, ConnectRequest, EncryptedRequest, InboundResponse, MessageSignature,
    RequestMethod, SealedResponse, SignAllTransactionsPayload, SignAndSendPayload,
    SignMessagePayload, SignTransactionPayload, SignatureResult, TransactionResult,
    TransactionsResult, WalletPublicKey,
    encoding::wire,
    params::{self, canonical_redirect, query_value},
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use url::Url;

use crate::SimTransaction;

/// Failure code the wallet uses for a user rejection.
pub const USER_REJECTED: &str = "4001";

/// Failure code the wallet uses for an unknown or mismatched session.
pub const UNAUTHORIZED: &str = "4100";

/// What the simulated user decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Approve the request
    Approve,
    /// Decline with this failure code and message
    Reject {
        /// Failure code
        code: String,
        /// Failure message
        message: String,
    },
}

impl Decision {
    /// The usual user rejection.
    pub fn user_rejected() -> Self {
        Self::Reject { code: USER_REJECTED.into(), message: "User rejected the request.".into() }
    }
}

/// A request body as the wallet decrypted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedRequest {
    /// Endpoint addressed
    pub method: RequestMethod,
    /// Nonce the dapp sealed the body with
    pub nonce: [u8; 24],
    /// Decrypted JSON body
    pub body: serde_json::Value,
}

struct WalletSession {
    shared: SharedSecret,
    token: String,
}

/// Deterministic wallet app.
pub struct SimWalletApp {
    account: SigningKey,
    rng: Mutex<ChaCha20Rng>,
    sessions: Mutex<BTreeMap<[u8; 32], WalletSession>>,
    issued_tokens: Mutex<u32>,
    received: Mutex<Vec<ReceivedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimWalletApp {
    /// Wallet whose account key and ephemeral keys derive from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut account = [0u8; 32];
        account[..8].copy_from_slice(&seed.to_le_bytes());
        account[31] = 0xa5;
        Self {
            account: SigningKey::from_bytes(&account),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed ^ 0x5eed)),
            sessions: Mutex::new(BTreeMap::new()),
            issued_tokens: Mutex::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// The account the wallet connects as.
    pub fn account(&self) -> WalletPublicKey {
        WalletPublicKey::new(self.account.verifying_key().to_bytes())
    }

    /// Session tokens issued so far, in order (`tok1`, `tok2`, ...).
    pub fn issued_tokens(&self) -> u32 {
        *lock(&self.issued_tokens)
    }

    /// Every sealed request decrypted so far.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        lock(&self.received).clone()
    }

    /// Decide on `request` and return the redirect URL.
    pub fn respond(&self, request: &Url, decision: &Decision) -> Result<Url, String> {
        let method = RequestMethod::from_url(request).map_err(|e| e.to_string())?;

        if let Decision::Reject { code, message } = decision {
            let redirect = query_value(request, params::REDIRECT_LINK)
                .ok_or("request has no redirect_link")?;
            let redirect = Url::parse(&redirect).map_err(|e| e.to_string())?;
            return Ok(InboundResponse::Rejected { code: code.clone(), message: message.clone() }
                .to_redirect(&redirect));
        }

        match method {
            RequestMethod::Connect => self.approve_connect(request),
            _ => self.approve_sealed(request),
        }
    }

    /// Approve `request`.
    pub fn approve(&self, request: &Url) -> Result<Url, String> {
        self.respond(request, &Decision::Approve)
    }

    fn approve_connect(&self, request: &Url) -> Result<Url, String> {
        let request = ConnectRequest::from_url(request).map_err(|e| e.to_string())?;

        let ephemeral = KeyPair::generate(&mut *lock(&self.rng));
        let shared =
            derive_shared_secret(&ephemeral.secret, &PublicKey::from_bytes(request.dapp_public_key))
                .map_err(|e| e.to_string())?;

        let serial = {
            let mut issued = lock(&self.issued_tokens);
            *issued += 1;
            *issued
        };
        let token = format!("tok{serial}");
        let approval = ConnectApproval { public_key: self.account().to_base58(), session: token.clone() };

        let (nonce, data) = self.seal(&approval, &shared)?;
        lock(&self.sessions).insert(request.dapp_public_key, WalletSession { shared, token });

        Ok(InboundResponse::Approved(SealedResponse {
            wallet_public_key: Some(*ephemeral.public.as_bytes()),
            nonce,
            data,
        })
        .to_redirect(&request.redirect_link))
    }

    fn approve_sealed(&self, request: &Url) -> Result<Url, String> {
        let request = EncryptedRequest::from_url(request).map_err(|e| e.to_string())?;

        let sessions = lock(&self.sessions);
        let Some(session) = sessions.get(&request.dapp_public_key) else {
            return Ok(unauthorized(&request.redirect_link, "unknown session"));
        };

        let plaintext =
            decrypt(&request.payload, &Nonce::from_bytes(request.nonce), &session.shared)
                .map_err(|e| e.to_string())?;
        let body: serde_json::Value = serde_json::from_slice(&plaintext).map_err(|e| e.to_string())?;
        lock(&self.received).push(ReceivedRequest {
            method: request.method,
            nonce: request.nonce,
            body: body.clone(),
        });

        if body.get("session").and_then(serde_json::Value::as_str) != Some(session.token.as_str()) {
            return Ok(unauthorized(&request.redirect_link, "session token mismatch"));
        }

        let (nonce, data) = match request.method {
            RequestMethod::SignAndSendTransaction => {
                let payload: SignAndSendPayload = from_value(body)?;
                let tx = self.sign(&payload.transaction_bytes().map_err(|e| e.to_string())?)?;
                let signature = tx.signatures.last().map(|entry| wire::encode(&entry.signature));
                let signature = signature.ok_or("transaction was not signed")?;
                self.seal(&SignatureResult { signature }, &session.shared)?
            },
            RequestMethod::SignTransaction => {
                let payload: SignTransactionPayload = from_value(body)?;
                let tx = self.sign(&decode(&payload.transaction)?)?;
                let transaction = wire::encode(&serde_json::to_vec(&tx).map_err(|e| e.to_string())?);
                self.seal(&TransactionResult { transaction }, &session.shared)?
            },
            RequestMethod::SignAllTransactions => {
                let payload: SignAllTransactionsPayload = from_value(body)?;
                let mut transactions = Vec::with_capacity(payload.transactions.len());
                for encoded in &payload.transactions {
                    let tx = self.sign(&decode(encoded)?)?;
                    transactions.push(wire::encode(&serde_json::to_vec(&tx).map_err(|e| e.to_string())?));
                }
                self.seal(&TransactionsResult { transactions }, &session.shared)?
            },
            RequestMethod::SignMessage => {
                let payload: SignMessagePayload = from_value(body)?;
                let signature = self.account.sign(&decode(&payload.message)?);
                let signature = wire::encode(&signature.to_bytes());
                self.seal(&MessageSignature { signature }, &session.shared)?
            },
            RequestMethod::Connect => return Err("connect requests are not sealed".into()),
        };

        Ok(InboundResponse::Approved(SealedResponse { wallet_public_key: None, nonce, data })
            .to_redirect(&request.redirect_link))
    }

    fn sign(&self, bytes: &[u8]) -> Result<SimTransaction, String> {
        let mut tx = SimTransaction::deserialize(bytes).map_err(|e| e.to_string())?;
        tx.sign_with(&self.account);
        Ok(tx)
    }

    fn seal<T: Serialize>(
        &self,
        body: &T,
        shared: &SharedSecret,
    ) -> Result<([u8; 24], Vec<u8>), String> {
        let plaintext = serde_json::to_vec(body).map_err(|e| e.to_string())?;
        let nonce = Nonce::generate(&mut *lock(&self.rng));
        let data = encrypt(&plaintext, &nonce, shared).map_err(|e| e.to_string())?;
        Ok((*nonce.as_bytes(), data))
    }
}

fn from_value<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, String> {
    serde_json::from_value(body).map_err(|e| e.to_string())
}

fn decode(value: &str) -> Result<Vec<u8>, String> {
    wire::decode("payload", value).map_err(|e| e.to_string())
}

fn unauthorized(redirect: &Url, message: &str) -> Url {
    InboundResponse::Rejected { code: UNAUTHORIZED.into(), message: message.into() }
        .to_redirect(redirect)
}

/// Flip one bit of the sealed `data` parameter of a response URL.
pub fn tamper_data(response: &Url) -> Result<Url, String> {
    let mut sealed = match InboundResponse::parse(response).map_err(|e| e.to_string())? {
        InboundResponse::Approved(sealed) => sealed,
        other => return Err(format!("not a sealed response: {other:?}")),
    };
    let last = sealed.data.last_mut().ok_or("empty data")?;
    *last ^= 0x01;

    Ok(InboundResponse::Approved(sealed).to_redirect(&canonical_redirect(response)))
}
