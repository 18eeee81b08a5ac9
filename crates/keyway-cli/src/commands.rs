//! Subcommands and their reports.

use std::fmt;

use clap::Subcommand;
use keyway_core::{
    HostEnvironment, Outcome, ReadyState, RedirectResult, WalletAdapter, session::SESSION_TOKEN,
};
use keyway_proto::{InboundResponse, WalletPublicKey, encoding::wire};
use tracing::debug;
use url::Url;

use crate::{CliError, host::TerminalHost};

/// What to do on this page load.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start a connect request, or complete one on the wallet's redirect URL
    Connect,

    /// Show readiness, identity and stored session
    Status,

    /// Ask the wallet to sign a UTF-8 message
    SignMessage {
        /// Message text
        message: String,
    },

    /// Decrypt the wallet's answer to the last signing request
    Result,

    /// Forget the session
    Disconnect,
}

/// Outcome of one command, rendered to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// A request is waiting in the wallet
    OpenInWallet(Url),
    /// The wallet account is connected
    Connected(WalletPublicKey),
    /// Current adapter state
    Status {
        /// Readiness
        ready_state: ReadyState,
        /// Connected account, if any
        public_key: Option<WalletPublicKey>,
        /// Whether a session token is stored
        session: bool,
    },
    /// The wallet's answer, if this URL carried one
    Collected(Option<RedirectResult>),
    /// The session is gone
    Disconnected,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenInWallet(url) => write!(f, "open in wallet: {url}"),
            Self::Connected(key) => write!(f, "connected: {key}"),
            Self::Status { ready_state, public_key, session } => {
                writeln!(f, "ready state: {ready_state}")?;
                match public_key {
                    Some(key) => writeln!(f, "account: {key}")?,
                    None => writeln!(f, "account: none")?,
                }
                write!(f, "session: {}", if *session { "stored" } else { "none" })
            },
            Self::Collected(None) => write!(f, "no wallet response on this url"),
            Self::Collected(Some(result)) => match result {
                RedirectResult::Signature(signature) => write!(f, "signature: {signature}"),
                RedirectResult::MessageSignature(bytes) => {
                    write!(f, "message signature: {}", wire::encode(bytes))
                },
                RedirectResult::Transaction(bytes) => {
                    write!(f, "signed transaction: {}", wire::encode(bytes))
                },
                RedirectResult::Transactions(all) => {
                    write!(f, "signed transactions:")?;
                    for bytes in all {
                        write!(f, "\n  {}", wire::encode(bytes))?;
                    }
                    Ok(())
                },
            },
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Run `command` against an adapter built on this page load.
pub async fn run(
    adapter: &WalletAdapter<TerminalHost>,
    command: Command,
) -> Result<Report, CliError> {
    debug!(?command, "running command");
    match command {
        Command::Connect => connect(adapter).await,
        Command::Status => status(adapter).await,
        Command::SignMessage { message } => {
            resume(adapter).await?;
            match adapter.sign_message(message.as_bytes()).await? {
                Outcome::Dispatched(dispatch) => Ok(Report::OpenInWallet(dispatch.url)),
                Outcome::Complete(signature) => {
                    Ok(Report::Collected(Some(RedirectResult::MessageSignature(signature))))
                },
            }
        },
        Command::Result => Ok(Report::Collected(adapter.take_redirect_result()?)),
        Command::Disconnect => {
            resume(adapter).await?;
            adapter.disconnect().await;
            Ok(Report::Disconnected)
        },
    }
}

async fn connect(adapter: &WalletAdapter<TerminalHost>) -> Result<Report, CliError> {
    adapter.connect().await?;

    if let Some(url) = adapter.env().take_navigation() {
        return Ok(Report::OpenInWallet(url));
    }
    match adapter.public_key() {
        Some(key) => Ok(Report::Connected(key)),
        None => Err(keyway_core::WalletError::NotConnected.into()),
    }
}

async fn status(adapter: &WalletAdapter<TerminalHost>) -> Result<Report, CliError> {
    resume(adapter).await?;
    Ok(Report::Status {
        ready_state: adapter.ready_state(),
        public_key: adapter.public_key(),
        session: has_session(adapter.env())?,
    })
}

/// Re-establish the identity on load without starting a new handshake.
async fn resume(adapter: &WalletAdapter<TerminalHost>) -> Result<(), CliError> {
    let env = adapter.env();
    if InboundResponse::is_handshake(&env.current_url()) || has_session(env)? {
        adapter.connect().await?;
    }
    Ok(())
}

fn has_session(env: &TerminalHost) -> Result<bool, CliError> {
    Ok(env.storage().get(SESSION_TOKEN)?.is_some())
}
