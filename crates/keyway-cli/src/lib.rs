//! Terminal host for the keyway wallet adapter
//!
//! Drives the deep-link redirect protocol from a shell. Each invocation is
//! one "page load": the URL the wallet redirected to is passed with `--url`,
//! session state persists in a JSON file between invocations, and a request
//! the adapter would navigate to is printed for the user to open instead.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod host;
pub mod storage;

pub use commands::{Command, Report, run};
pub use host::TerminalHost;
pub use storage::FileStorage;

use thiserror::Error;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// The page URL could not be parsed.
    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),

    /// The adapter reported a failure.
    #[error(transparent)]
    Wallet(#[from] keyway_core::WalletError),

    /// The storage file could not be used.
    #[error(transparent)]
    Storage(#[from] keyway_core::StorageError),

    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}
