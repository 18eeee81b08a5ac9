//! Wallet account keys.

use std::{fmt, str::FromStr};

use crate::{ProtocolError, Result, encoding::wire};

/// The wallet's permanent account key (an Ed25519 public key).
///
/// Rendered and parsed as base-58, the way wallets display addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletPublicKey([u8; 32]);

impl WalletPublicKey {
    /// Length of a public key in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| ProtocolError::InvalidLength {
            field: "public_key",
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base-58 rendering.
    pub fn to_base58(&self) -> String {
        wire::encode(&self.0)
    }
}

impl FromStr for WalletPublicKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        wire::decode_array::<32>("public_key", s).map(Self)
    }
}

impl fmt::Display for WalletPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for WalletPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletPublicKey({self})")
    }
}
