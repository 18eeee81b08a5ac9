//! Byte encodings.
//!
//! Two encodings, never mixed: [`wire`] for URL parameters and [`stored`] for
//! host storage values. Each side must be read back with its own decoder.

/// Base-58 encoding used for every binary value carried in a URL.
pub mod wire {
    use crate::{ProtocolError, Result};

    /// Encode bytes as base-58.
    pub fn encode(bytes: &[u8]) -> String {
        bs58::encode(bytes).into_string()
    }

    /// Decode a base-58 string. `field` names the value in errors.
    pub fn decode(field: &'static str, value: &str) -> Result<Vec<u8>> {
        bs58::decode(value)
            .into_vec()
            .map_err(|e| ProtocolError::InvalidBase58 { field, reason: e.to_string() })
    }

    /// Decode a base-58 string that must be exactly `N` bytes long.
    pub fn decode_array<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
        let bytes = decode(field, value)?;
        let actual = bytes.len();
        bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidLength { field, expected: N, actual })
    }
}

/// Comma-separated decimal bytes, the storage encoding for binary values.
///
/// `[1, 2, 255]` is stored as `"1,2,255"`. The empty slice is stored as the
/// empty string.
pub mod stored {
    use crate::{ProtocolError, Result};

    /// Encode bytes as a comma-separated decimal list.
    pub fn encode(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() * 4);
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&byte.to_string());
        }
        out
    }

    /// Decode a comma-separated decimal list.
    pub fn decode(value: &str) -> Result<Vec<u8>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Vec::new());
        }

        value
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u8>()
                    .map_err(|e| ProtocolError::InvalidByteList(format!("`{part}`: {e}")))
            })
            .collect()
    }

    /// Decode a stored list that must be exactly `N` bytes long.
    pub fn decode_array<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
        let bytes = decode(value)?;
        let actual = bytes.len();
        bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidLength { field, expected: N, actual })
    }
}
