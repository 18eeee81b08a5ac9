//! JSON bodies carried inside sealed `data` and `payload` parameters.
//!
//! Binary fields inside these bodies (transactions, messages, signatures)
//! are base-58 strings, the same as URL parameters.

use serde::{Deserialize, Serialize};

use crate::{Result, WalletPublicKey, encoding::wire};

/// Decrypted handshake response.
///
/// # Protocol Flow
///
/// 1. Dapp sends a connect request with its request key
/// 2. Wallet derives the shared secret and seals this body with it
/// 3. Dapp decrypts, adopts `public_key` and keeps `session` for every later
///    request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectApproval {
    /// Wallet's permanent account key (base-58)
    pub public_key: String,
    /// Opaque session token issued by the wallet
    pub session: String,
}

impl ConnectApproval {
    /// Parse the decrypted bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The account key, decoded.
    pub fn wallet_public_key(&self) -> Result<WalletPublicKey> {
        self.public_key.parse()
    }
}

/// How far a transaction must be confirmed before a query observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Processed by the connected node
    Processed,
    /// Voted on by a supermajority
    Confirmed,
    /// Rooted
    Finalized,
}

/// Submission options forwarded to the wallet with a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    /// Skip the preflight simulation
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_preflight: bool,
    /// Commitment level used for the preflight simulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight_commitment: Option<Commitment>,
    /// Maximum submission retries by the RPC node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Minimum slot the request can be evaluated at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_context_slot: Option<u64>,
}

/// Body of a `signAndSendTransaction` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignAndSendPayload {
    /// Serialized transaction (base-58)
    pub transaction: String,
    /// Submission options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_options: Option<SendOptions>,
    /// Session token from the handshake
    pub session: String,
}

impl SignAndSendPayload {
    /// Build from raw transaction bytes.
    pub fn new(transaction: &[u8], send_options: Option<SendOptions>, session: String) -> Self {
        Self { transaction: wire::encode(transaction), send_options, session }
    }

    /// Serialized transaction bytes.
    pub fn transaction_bytes(&self) -> Result<Vec<u8>> {
        wire::decode("transaction", &self.transaction)
    }
}

/// Body of a `signTransaction` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignTransactionPayload {
    /// Serialized transaction (base-58)
    pub transaction: String,
    /// Session token from the handshake
    pub session: String,
}

/// Body of a `signAllTransactions` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignAllTransactionsPayload {
    /// Serialized transactions (base-58 each)
    pub transactions: Vec<String>,
    /// Session token from the handshake
    pub session: String,
}

/// Body of a `signMessage` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignMessagePayload {
    /// Message bytes (base-58)
    pub message: String,
    /// Session token from the handshake
    pub session: String,
}

/// Decrypted `signAndSendTransaction` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResult {
    /// Transaction signature (base-58)
    pub signature: String,
}

/// Decrypted `signTransaction` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Signed transaction (base-58)
    pub transaction: String,
}

/// Decrypted `signAllTransactions` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsResult {
    /// Signed transactions (base-58 each)
    pub transactions: Vec<String>,
}

/// Decrypted `signMessage` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSignature {
    /// Message signature (base-58)
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_approval_field_names() {
        let approval =
            ConnectApproval::from_bytes(br#"{"public_key":"11111111111111111111111111111111","session":"tok1"}"#)
                .unwrap();
        assert_eq!(approval.session, "tok1");
        assert_eq!(approval.wallet_public_key().unwrap(), WalletPublicKey::new([0; 32]));
    }

    #[test]
    fn connect_approval_rejects_missing_session() {
        assert!(ConnectApproval::from_bytes(br#"{"public_key":"abc"}"#).is_err());
    }

    #[test]
    fn send_payload_uses_camel_case() {
        let payload = SignAndSendPayload::new(
            &[1, 2, 3],
            Some(SendOptions {
                preflight_commitment: Some(Commitment::Confirmed),
                ..SendOptions::default()
            }),
            "tok1".into(),
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sendOptions"]["preflightCommitment"], "confirmed");
        assert!(json["sendOptions"].get("skipPreflight").is_none());
        assert_eq!(json["session"], "tok1");
        assert_eq!(payload.transaction_bytes().unwrap(), vec![1, 2, 3]);
    }
}
