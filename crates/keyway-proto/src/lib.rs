//! Wire format for the keyway wallet deep-link protocol.
//!
//! The protocol has no socket. Every request is an outbound URL addressed to
//! the wallet app, and every response is a redirect back to the dapp whose
//! query string carries the result. This crate owns the shape of both
//! directions plus the two byte encodings the protocol uses:
//!
//! - **Wire**: base-58 for every binary value inside a URL.
//! - **Storage**: comma-separated decimal bytes for every binary value written
//!   to durable host storage.
//!
//! Nothing here performs I/O, cryptography or navigation. Higher layers
//! encrypt payloads and decide when to navigate.
//!
//! # Security
//!
//! Inbound URLs are attacker-controlled. Parsing never assumes that a
//! parameter is present or well formed, and a failure response
//! (`errorCode`/`errorMessage`) is never mistaken for a success.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod encoding;
pub mod errors;
pub mod key;
pub mod params;
pub mod payloads;
pub mod request;
pub mod response;

pub use cluster::Cluster;
pub use errors::{ProtocolError, Result};
pub use key::WalletPublicKey;
pub use payloads::{
    Commitment, ConnectApproval, MessageSignature, SendOptions, SignAllTransactionsPayload,
    SignAndSendPayload, SignMessagePayload, SignTransactionPayload, SignatureResult,
    TransactionResult, TransactionsResult,
};
pub use request::{ConnectRequest, EncryptedRequest, RequestMethod};
pub use response::{InboundResponse, SealedResponse};
