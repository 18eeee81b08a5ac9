//! Inbound responses read from the page's own URL.
//!
//! After the user decides, the wallet redirects to the request's
//! `redirect_link` with either a sealed success body or a failure code:
//!
//! ```text
//! handshake success: {phantom_encryption_public_key, nonce, data}
//! request success:   {nonce, data}
//! failure:           {errorCode, errorMessage}
//! ```
//!
//! A failure is checked first, so a URL carrying both shapes is a failure.

use url::Url;

use crate::{
    ProtocolError, Result,
    encoding::wire,
    params::{self, query_value},
};

/// Sealed success body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedResponse {
    /// Wallet's ephemeral encryption key, present only on handshake responses
    pub wallet_public_key: Option<[u8; 32]>,
    /// Nonce used to seal `data`
    pub nonce: [u8; 24],
    /// Sealed JSON body
    pub data: Vec<u8>,
}

/// What the current URL says about a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundResponse {
    /// No response parameters; nothing to complete
    Absent,
    /// The wallet approved and sealed a result
    Approved(SealedResponse),
    /// The wallet declined or failed the request
    Rejected {
        /// Wallet-defined failure code
        code: String,
        /// Human-readable reason, empty when the wallet gave none
        message: String,
    },
}

impl InboundResponse {
    /// Classify the response parameters on `url`.
    ///
    /// Returns an error when the success parameters are present but
    /// incomplete or malformed. Such a URL is neither a valid response nor a
    /// clean request-phase URL.
    pub fn parse(url: &Url) -> Result<Self> {
        if let Some(rejected) = Self::rejection(url) {
            return Ok(rejected);
        }

        let wallet_key = query_value(url, params::WALLET_ENCRYPTION_PUBLIC_KEY);
        let nonce = query_value(url, params::NONCE);
        let data = query_value(url, params::DATA);

        if wallet_key.is_none() && nonce.is_none() && data.is_none() {
            return Ok(Self::Absent);
        }

        let nonce = nonce.ok_or(ProtocolError::MissingParameter(params::NONCE))?;
        let data = data.ok_or(ProtocolError::MissingParameter(params::DATA))?;

        let wallet_public_key = wallet_key
            .map(|key| wire::decode_array::<32>(params::WALLET_ENCRYPTION_PUBLIC_KEY, &key))
            .transpose()?;

        Ok(Self::Approved(SealedResponse {
            wallet_public_key,
            nonce: wire::decode_array::<24>(params::NONCE, &nonce)?,
            data: wire::decode(params::DATA, &data)?,
        }))
    }

    /// The wallet's failure parameters on `url`, if it carries any.
    ///
    /// Never fails: a stray `nonce` or `data` parameter that belongs to the
    /// page itself is ignored.
    pub fn rejection(url: &Url) -> Option<Self> {
        let code = query_value(url, params::ERROR_CODE)?;
        let message = query_value(url, params::ERROR_MESSAGE).unwrap_or_default();
        Some(Self::Rejected { code, message })
    }

    /// True when `url` carries the full handshake triple.
    ///
    /// This alone decides whether `connect()` runs the request phase or the
    /// completion phase.
    pub fn is_handshake(url: &Url) -> bool {
        [params::WALLET_ENCRYPTION_PUBLIC_KEY, params::NONCE, params::DATA]
            .iter()
            .all(|name| query_value(url, name).is_some())
    }

    /// Append this response to `redirect_link` (the wallet's side of the
    /// exchange).
    pub fn to_redirect(&self, redirect_link: &Url) -> Url {
        let mut url = redirect_link.clone();
        match self {
            Self::Absent => {},
            Self::Approved(sealed) => {
                let mut query = url.query_pairs_mut();
                if let Some(key) = &sealed.wallet_public_key {
                    query.append_pair(params::WALLET_ENCRYPTION_PUBLIC_KEY, &wire::encode(key));
                }
                query
                    .append_pair(params::NONCE, &wire::encode(&sealed.nonce))
                    .append_pair(params::DATA, &wire::encode(&sealed.data));
            },
            Self::Rejected { code, message } => {
                url.query_pairs_mut()
                    .append_pair(params::ERROR_CODE, code)
                    .append_pair(params::ERROR_MESSAGE, message);
            },
        }
        url
    }
}
