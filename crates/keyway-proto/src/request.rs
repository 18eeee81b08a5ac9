//! Outbound requests addressed to the wallet app.
//!
//! # Protocol Flow
//!
//! A connect request carries the dapp's request key in the clear. Every later
//! request carries a payload sealed with the shared secret and a fresh nonce:
//!
//! ```text
//! connect:  {app_url, dapp_encryption_public_key, redirect_link, cluster}
//! sealed:   {dapp_encryption_public_key, nonce, redirect_link, payload}
//! ```

use std::{fmt, str::FromStr};

use url::Url;

use crate::{
    Cluster, ProtocolError, Result,
    encoding::wire,
    params::{self, query_value},
};

/// Wallet endpoint a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// Handshake
    Connect,
    /// Sign a transaction and submit it to the network
    SignAndSendTransaction,
    /// Sign a transaction and return it
    SignTransaction,
    /// Sign several transactions and return them
    SignAllTransactions,
    /// Sign an arbitrary message
    SignMessage,
}

impl RequestMethod {
    /// Path segment appended to the wallet base URL.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::SignAndSendTransaction => "signAndSendTransaction",
            Self::SignTransaction => "signTransaction",
            Self::SignAllTransactions => "signAllTransactions",
            Self::SignMessage => "signMessage",
        }
    }

    /// Method addressed by a request URL, taken from its last path segment.
    pub fn from_url(url: &Url) -> Result<Self> {
        let last = url.path_segments().and_then(Iterator::last).unwrap_or("");
        last.parse()
    }

    fn endpoint(self, wallet_base: &Url) -> Result<Url> {
        Ok(wallet_base.join(self.path())?)
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for RequestMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "connect" => Ok(Self::Connect),
            "signAndSendTransaction" => Ok(Self::SignAndSendTransaction),
            "signTransaction" => Ok(Self::SignTransaction),
            "signAllTransactions" => Ok(Self::SignAllTransactions),
            "signMessage" => Ok(Self::SignMessage),
            other => Err(ProtocolError::InvalidUrl(format!("unknown wallet method `{other}`"))),
        }
    }
}

/// Handshake request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Dapp's request public key
    pub dapp_public_key: [u8; 32],
    /// Originating app URL
    pub app_url: Url,
    /// Where the wallet redirects after the user decides
    pub redirect_link: Url,
    /// Network to use for the session
    pub cluster: Cluster,
}

impl ConnectRequest {
    /// Render as a URL under `wallet_base`.
    ///
    /// `wallet_base` must end in `/` so the method path is appended rather
    /// than substituted for its last segment.
    pub fn to_url(&self, wallet_base: &Url) -> Result<Url> {
        let mut url = RequestMethod::Connect.endpoint(wallet_base)?;
        url.query_pairs_mut()
            .append_pair(params::APP_URL, self.app_url.as_str())
            .append_pair(params::DAPP_ENCRYPTION_PUBLIC_KEY, &wire::encode(&self.dapp_public_key))
            .append_pair(params::REDIRECT_LINK, self.redirect_link.as_str())
            .append_pair(params::CLUSTER, self.cluster.as_str());
        Ok(url)
    }

    /// Parse a connect request URL (the wallet's side of the exchange).
    pub fn from_url(url: &Url) -> Result<Self> {
        let dapp_public_key = wire::decode_array::<32>(
            params::DAPP_ENCRYPTION_PUBLIC_KEY,
            &required(url, params::DAPP_ENCRYPTION_PUBLIC_KEY)?,
        )?;
        let app_url = Url::parse(&required(url, params::APP_URL)?)?;
        let redirect_link = Url::parse(&required(url, params::REDIRECT_LINK)?)?;
        let cluster = required(url, params::CLUSTER)?.parse()?;

        Ok(Self { dapp_public_key, app_url, redirect_link, cluster })
    }
}

/// Request whose body is sealed with the session's shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRequest {
    /// Wallet endpoint
    pub method: RequestMethod,
    /// Dapp's request public key, identifying the session
    pub dapp_public_key: [u8; 32],
    /// Fresh nonce used to seal `payload`
    pub nonce: [u8; 24],
    /// Where the wallet redirects after the user decides
    pub redirect_link: Url,
    /// Sealed JSON body
    pub payload: Vec<u8>,
}

impl EncryptedRequest {
    /// Render as a URL under `wallet_base`.
    pub fn to_url(&self, wallet_base: &Url) -> Result<Url> {
        let mut url = self.method.endpoint(wallet_base)?;
        url.query_pairs_mut()
            .append_pair(params::DAPP_ENCRYPTION_PUBLIC_KEY, &wire::encode(&self.dapp_public_key))
            .append_pair(params::NONCE, &wire::encode(&self.nonce))
            .append_pair(params::REDIRECT_LINK, self.redirect_link.as_str())
            .append_pair(params::PAYLOAD, &wire::encode(&self.payload));
        Ok(url)
    }

    /// Parse a sealed request URL (the wallet's side of the exchange).
    pub fn from_url(url: &Url) -> Result<Self> {
        let method = RequestMethod::from_url(url)?;
        let dapp_public_key = wire::decode_array::<32>(
            params::DAPP_ENCRYPTION_PUBLIC_KEY,
            &required(url, params::DAPP_ENCRYPTION_PUBLIC_KEY)?,
        )?;
        let nonce = wire::decode_array::<24>(params::NONCE, &required(url, params::NONCE)?)?;
        let redirect_link = Url::parse(&required(url, params::REDIRECT_LINK)?)?;
        let payload = wire::decode(params::PAYLOAD, &required(url, params::PAYLOAD)?)?;

        Ok(Self { method, dapp_public_key, nonce, redirect_link, payload })
    }
}

fn required(url: &Url, name: &'static str) -> Result<String> {
    query_value(url, name).ok_or(ProtocolError::MissingParameter(name))
}
