//! Transaction and network collaborators.
//!
//! The adapter never builds, inspects or submits transactions itself. It
//! needs three things from them: serialization, partial signing by local
//! keys, and a fee payer / recent blockhash it can fill in before sending.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use keyway_proto::{Commitment, SendOptions, WalletPublicKey};
use thiserror::Error;
use tracing::debug;

/// Serialization switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeConfig {
    /// Fail if any required signature is missing
    pub require_all_signatures: bool,
    /// Verify the signatures that are present
    pub verify_signatures: bool,
}

impl SerializeConfig {
    /// Serialization for handing a partially signed transaction to a
    /// wallet, which adds the remaining signature itself.
    pub const PARTIAL: Self = Self { require_all_signatures: false, verify_signatures: false };
}

/// Error from a transaction or network collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Could not serialize
    #[error("transaction serialization failed: {0}")]
    Serialize(String),
    /// Could not rebuild from bytes
    #[error("transaction deserialization failed: {0}")]
    Deserialize(String),
    /// A local signer could not sign
    #[error("partial signing failed: {0}")]
    Signing(String),
    /// The network could not be queried
    #[error("rpc request failed: {0}")]
    Rpc(String),
}

/// A transaction the adapter can hand to a wallet.
pub trait Transaction: Sized + Send + Sync + 'static {
    /// Wire form.
    fn serialize(&self, config: SerializeConfig) -> Result<Vec<u8>, TransactionError>;

    /// Rebuild from the wire form (e.g. a wallet-signed transaction).
    fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError>;

    /// Add signatures from local keys without requiring a complete set.
    fn partial_sign(&mut self, signers: &[SigningKey]) -> Result<(), TransactionError>;

    /// Account paying fees, if set.
    fn fee_payer(&self) -> Option<WalletPublicKey>;

    /// Set the account paying fees.
    fn set_fee_payer(&mut self, payer: WalletPublicKey);

    /// Recent blockhash, if set.
    fn recent_blockhash(&self) -> Option<String>;

    /// Set the recent blockhash.
    fn set_recent_blockhash(&mut self, blockhash: String);
}

/// Read-only view of the network used to prepare transactions.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Default commitment of this connection.
    fn commitment(&self) -> Commitment;

    /// Latest blockhash at `commitment`, respecting `min_context_slot`.
    async fn latest_blockhash(
        &self,
        commitment: Commitment,
        min_context_slot: Option<u64>,
    ) -> Result<String, TransactionError>;
}

/// Options for [`crate::WalletAdapter::send_transaction`].
#[derive(Debug, Clone, Default)]
pub struct SendTransactionOptions {
    /// Local keys that partially sign before the wallet does
    pub signers: Vec<SigningKey>,
    /// Submission options forwarded to the wallet
    pub send: SendOptions,
}

/// Fill in what the wallet needs and the caller left out.
///
/// Fee payer defaults to the connected account, the blockhash is fetched
/// when missing, and the preflight commitment defaults to the connection's.
pub(crate) async fn prepare<T: Transaction>(
    transaction: &mut T,
    payer: WalletPublicKey,
    connection: &dyn ChainConnection,
    send: &mut SendOptions,
) -> Result<(), TransactionError> {
    if transaction.fee_payer().is_none() {
        transaction.set_fee_payer(payer);
    }

    let commitment = *send.preflight_commitment.get_or_insert_with(|| connection.commitment());

    if transaction.recent_blockhash().is_none() {
        let blockhash = connection.latest_blockhash(commitment, send.min_context_slot).await?;
        debug!(%blockhash, ?commitment, "filled recent blockhash");
        transaction.set_recent_blockhash(blockhash);
    }

    Ok(())
}

/// Apply local partial signatures, then serialize for the wallet.
pub(crate) fn sign_locally_and_serialize<T: Transaction>(
    transaction: &mut T,
    signers: &[SigningKey],
) -> Result<Vec<u8>, TransactionError> {
    if !signers.is_empty() {
        transaction.partial_sign(signers)?;
    }
    transaction.serialize(SerializeConfig::PARTIAL)
}
