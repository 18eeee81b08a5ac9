//! Dummy transaction and network.
//!
//! `SimTransaction` is just enough of a transaction to exercise the adapter:
//! a fee payer, a recent blockhash, opaque instruction bytes and ed25519
//! signatures over the rest. Its wire form is JSON.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use keyway_core::{ChainConnection, SerializeConfig, Transaction, TransactionError};
use keyway_proto::{Commitment, WalletPublicKey};
use serde::{Deserialize, Serialize};

/// One signature slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Signer public key
    pub signer: [u8; 32],
    /// ed25519 signature over the message bytes
    pub signature: Vec<u8>,
}

/// Minimal signable transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTransaction {
    /// Fee payer, filled in by the adapter when missing
    pub fee_payer: Option<[u8; 32]>,
    /// Recent blockhash, filled in by the adapter when missing
    pub recent_blockhash: Option<String>,
    /// Opaque instruction bytes
    pub instructions: Vec<u8>,
    /// Signatures in signing order
    pub signatures: Vec<SignatureEntry>,
}

impl SimTransaction {
    /// Unsigned transaction carrying `instructions`.
    pub fn new(instructions: impl Into<Vec<u8>>) -> Self {
        Self { instructions: instructions.into(), ..Self::default() }
    }

    /// Bytes every signature covers.
    pub fn message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(64 + self.instructions.len());
        message.extend_from_slice(&self.fee_payer.unwrap_or_default());
        message.extend_from_slice(self.recent_blockhash.as_deref().unwrap_or_default().as_bytes());
        message.extend_from_slice(&self.instructions);
        message
    }

    /// Add a signature by `key`.
    pub fn sign_with(&mut self, key: &SigningKey) {
        let signature = key.sign(&self.message());
        self.signatures.push(SignatureEntry {
            signer: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        });
    }

    /// Whether `signer` holds a valid signature.
    pub fn is_signed_by(&self, signer: &[u8; 32]) -> bool {
        let message = self.message();
        self.signatures.iter().filter(|entry| &entry.signer == signer).any(|entry| {
            let Ok(key) = VerifyingKey::from_bytes(&entry.signer) else {
                return false;
            };
            let Ok(signature) = Signature::from_slice(&entry.signature) else {
                return false;
            };
            key.verify(&message, &signature).is_ok()
        })
    }

    fn verify_all(&self) -> bool {
        self.signatures.iter().all(|entry| self.is_signed_by(&entry.signer))
    }
}

impl Transaction for SimTransaction {
    fn serialize(&self, config: SerializeConfig) -> Result<Vec<u8>, TransactionError> {
        if config.require_all_signatures
            && self.fee_payer.is_some_and(|payer| !self.is_signed_by(&payer))
        {
            return Err(TransactionError::Serialize("missing fee payer signature".into()));
        }
        if config.verify_signatures && !self.verify_all() {
            return Err(TransactionError::Serialize("invalid signature".into()));
        }
        serde_json::to_vec(self).map_err(|err| TransactionError::Serialize(err.to_string()))
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        serde_json::from_slice(bytes).map_err(|err| TransactionError::Deserialize(err.to_string()))
    }

    fn partial_sign(&mut self, signers: &[SigningKey]) -> Result<(), TransactionError> {
        if self.recent_blockhash.is_none() {
            return Err(TransactionError::Signing("recent blockhash not set".into()));
        }
        for signer in signers {
            self.sign_with(signer);
        }
        Ok(())
    }

    fn fee_payer(&self) -> Option<WalletPublicKey> {
        self.fee_payer.map(WalletPublicKey::new)
    }

    fn set_fee_payer(&mut self, payer: WalletPublicKey) {
        self.fee_payer = Some(*payer.as_bytes());
    }

    fn recent_blockhash(&self) -> Option<String> {
        self.recent_blockhash.clone()
    }

    fn set_recent_blockhash(&mut self, blockhash: String) {
        self.recent_blockhash = Some(blockhash);
    }
}

/// Network stub handing out sequential blockhashes.
#[derive(Debug)]
pub struct SimChain {
    commitment: Commitment,
    requests: AtomicU32,
    last_request: Mutex<Option<(Commitment, Option<u64>)>>,
    fail: Mutex<Option<String>>,
}

impl SimChain {
    /// Chain whose default commitment is `commitment`.
    pub fn new(commitment: Commitment) -> Self {
        Self {
            commitment,
            requests: AtomicU32::new(0),
            last_request: Mutex::new(None),
            fail: Mutex::new(None),
        }
    }

    /// Make the next blockhash queries fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// Number of blockhash queries served.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Arguments of the last blockhash query.
    pub fn last_request(&self) -> Option<(Commitment, Option<u64>)> {
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChainConnection for SimChain {
    fn commitment(&self) -> Commitment {
        self.commitment
    }

    async fn latest_blockhash(
        &self,
        commitment: Commitment,
        min_context_slot: Option<u64>,
    ) -> Result<String, TransactionError> {
        if let Some(reason) = self.fail.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(TransactionError::Rpc(reason));
        }
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((commitment, min_context_slot));
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("blockhash-{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_cover_message() {
        let key = SigningKey::from_bytes(&[1; 32]);
        let mut tx = SimTransaction::new(b"transfer".to_vec());
        tx.recent_blockhash = Some("hash".into());
        tx.sign_with(&key);

        assert!(tx.is_signed_by(&key.verifying_key().to_bytes()));

        tx.instructions.push(0);
        assert!(!tx.is_signed_by(&key.verifying_key().to_bytes()));
    }

    #[test]
    fn partial_serialization_allows_missing_payer_signature() {
        let mut tx = SimTransaction::new(b"x".to_vec());
        tx.fee_payer = Some([9; 32]);

        assert!(tx.serialize(SerializeConfig::PARTIAL).is_ok());
        assert!(
            tx.serialize(SerializeConfig { require_all_signatures: true, verify_signatures: true })
                .is_err()
        );
    }
}
