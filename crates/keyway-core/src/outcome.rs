//! Results of operations that may leave the process.
//!
//! Over the deep-link channel a signing request is delivered by navigating
//! away; the result arrives in a later process instance, if at all. Such
//! calls report [`Outcome::Dispatched`] instead of a value, and the result is
//! collected on the next load with `WalletAdapter::take_redirect_result`.

use keyway_crypto::Nonce;
use keyway_proto::RequestMethod;
use url::Url;

/// Result of a signing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The wallet answered in-process
    Complete(T),
    /// The request left the process; no result is available here
    Dispatched(Dispatch),
}

impl<T> Outcome<T> {
    /// The value, if the operation completed in-process.
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            Self::Dispatched(_) => None,
        }
    }

    /// The dispatch record, if the request left the process.
    pub fn dispatched(&self) -> Option<&Dispatch> {
        match self {
            Self::Complete(_) => None,
            Self::Dispatched(dispatch) => Some(dispatch),
        }
    }

    /// Apply `f` to a completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Complete(value) => Outcome::Complete(f(value)),
            Self::Dispatched(dispatch) => Outcome::Dispatched(dispatch),
        }
    }
}

/// A request handed to the wallet app by navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Wallet endpoint addressed
    pub method: RequestMethod,
    /// Fresh nonce the payload was sealed with
    pub nonce: Nonce,
    /// URL navigated to
    pub url: Url,
}

/// Decrypted answer to a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectResult {
    /// `signAndSendTransaction`: the submitted transaction's signature
    /// (base-58)
    Signature(String),
    /// `signTransaction`: the signed, serialized transaction
    Transaction(Vec<u8>),
    /// `signAllTransactions`: signed, serialized transactions in request order
    Transactions(Vec<Vec<u8>>),
    /// `signMessage`: the message signature bytes
    MessageSignature(Vec<u8>),
}

impl RedirectResult {
    /// Method this result answers.
    pub const fn method(&self) -> RequestMethod {
        match self {
            Self::Signature(_) => RequestMethod::SignAndSendTransaction,
            Self::Transaction(_) => RequestMethod::SignTransaction,
            Self::Transactions(_) => RequestMethod::SignAllTransactions,
            Self::MessageSignature(_) => RequestMethod::SignMessage,
        }
    }
}
