//! Wallet readiness detection.
//!
//! # Protocol Flow
//!
//! ```text
//! host unavailable ─────────────────────────────▶ Unsupported
//! PreferDeepLink ───────────────────────────────▶ Loadable
//! PreferExtension ─▶ poll marker (interval × N) ─▶ Installed | NotDetected
//! ```
//!
//! Readiness is computed once at construction and changes only through a
//! detection run, which the adapter announces as a `ReadyStateChange` event.

use std::{fmt, time::Duration};

use tracing::debug;

use crate::{AdapterConfig, HostEnvironment};

/// The adapter's belief about whether and how a wallet can be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// The host cannot run a wallet at all
    Unsupported,
    /// No extension was found (yet)
    NotDetected,
    /// The wallet is reachable through the deep-link redirect protocol
    Loadable,
    /// The extension is injected and usable directly
    Installed,
}

impl ReadyState {
    /// Whether `connect()` may proceed in this state.
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Installed | Self::Loadable)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsupported => "unsupported",
            Self::NotDetected => "not-detected",
            Self::Loadable => "loadable",
            Self::Installed => "installed",
        };
        f.write_str(name)
    }
}

/// Which readiness strategy the adapter uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadinessPolicy {
    /// Poll for an injected extension and use it when found
    PreferExtension,
    /// Treat the wallet as loadable through deep links without probing
    #[default]
    PreferDeepLink,
}

/// Bounded extension detector.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessDetector {
    policy: ReadinessPolicy,
    poll_interval: Duration,
    max_attempts: u32,
}

impl ReadinessDetector {
    /// Detector for `config`.
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            policy: config.readiness,
            poll_interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
        }
    }

    /// Readiness known without waiting.
    pub fn initial_state<E: HostEnvironment>(&self, env: &E) -> ReadyState {
        if !env.is_available() {
            return ReadyState::Unsupported;
        }
        match self.policy {
            ReadinessPolicy::PreferDeepLink => ReadyState::Loadable,
            ReadinessPolicy::PreferExtension if env.injected_extension().is_some() => {
                ReadyState::Installed
            },
            ReadinessPolicy::PreferExtension => ReadyState::NotDetected,
        }
    }

    /// Run detection to completion.
    ///
    /// Polls at most `max_poll_attempts` times, sleeping `poll_interval`
    /// between checks. The first check happens immediately.
    pub async fn detect<E: HostEnvironment>(&self, env: &E) -> ReadyState {
        let initial = self.initial_state(env);
        if initial != ReadyState::NotDetected {
            return initial;
        }

        for attempt in 1..self.max_attempts {
            env.sleep(self.poll_interval).await;
            if env.injected_extension().is_some() {
                debug!(attempt, "extension detected");
                return ReadyState::Installed;
            }
        }

        debug!(attempts = self.max_attempts, "extension not detected");
        ReadyState::NotDetected
    }
}
