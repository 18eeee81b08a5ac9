//! Adapter configuration.

use std::time::Duration;

use keyway_proto::{Cluster, ProtocolError};
use url::Url;

use crate::readiness::ReadinessPolicy;

/// Universal-link base of the wallet app.
pub const DEFAULT_WALLET_URL: &str = "https://phantom.app/ul/v1/";

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Which readiness strategy runs at construction
    pub readiness: ReadinessPolicy,
    /// Delay between extension detection attempts
    pub poll_interval: Duration,
    /// Detection attempts before giving up
    pub max_poll_attempts: u32,
    /// Network named in connect requests
    pub cluster: Cluster,
    /// Base URL that request method paths are joined onto
    pub wallet_url: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessPolicy::default(),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 10,
            cluster: Cluster::default(),
            wallet_url: DEFAULT_WALLET_URL.to_string(),
        }
    }
}

impl AdapterConfig {
    /// Parsed wallet base URL, with the trailing slash `Url::join` needs to
    /// append method paths rather than replace the last segment.
    pub fn wallet_base(&self) -> Result<Url, ProtocolError> {
        if self.wallet_url.ends_with('/') {
            Ok(Url::parse(&self.wallet_url)?)
        } else {
            Ok(Url::parse(&format!("{}/", self.wallet_url))?)
        }
    }
}
