//! Keyway wallet adapter core
//!
//! One connect/sign/send/disconnect contract over two transports: an
//! extension object injected into the host, and a separate wallet app reached
//! through an encrypted deep-link redirect protocol.
//!
//! # Architecture
//!
//! Nothing in this crate touches the platform directly. The page URL,
//! navigation, durable storage, the injected extension, timers and
//! randomness are all supplied through [`HostEnvironment`]. Production hosts
//! wrap the real platform; the simulation harness supplies an in-memory host
//! whose "navigation" is a log that tests replay.
//!
//! The deep-link transport suspends by tearing the process down. Its
//! continuation lives entirely in host storage, so the adapter built on the
//! next load can complete what the previous one started.
//!
//! # Components
//!
//! - [`WalletAdapter`]: Façade state machine (readiness, connecting, identity)
//! - [`strategy`]: Direct extension and deep-link strategies
//! - [`session`]: Persisted deep-link session values
//! - [`events`]: Typed publish/subscribe for lifecycle events
//! - [`readiness`]: Readiness states and bounded extension detection
//! - [`mod@env`]: Host environment and storage abstraction
//! - [`extension`]: Injected extension interface
//! - [`transaction`]: Transaction and network collaborator interfaces
//! - [`outcome`]: Results of operations that may leave the process
//! - [`error`]: Adapter error taxonomy

pub mod adapter;
pub mod config;
pub mod env;
pub mod error;
pub mod events;
pub mod extension;
pub mod outcome;
pub mod readiness;
pub mod session;
pub mod strategy;
pub mod transaction;

pub use adapter::WalletAdapter;
pub use config::AdapterConfig;
pub use env::{HostEnvironment, Storage, StorageError};
pub use error::{Cause, DelegateError, WalletError};
pub use events::{AdapterEvent, EventChannel, EventKind, SubscriptionId};
pub use extension::{
    ExtensionError, ExtensionNotice, NoticeListener, NoticeSubscription, WalletExtension,
};
pub use outcome::{Dispatch, Outcome, RedirectResult};
pub use readiness::{ReadinessDetector, ReadinessPolicy, ReadyState};
pub use session::{SessionError, SessionStore};
pub use transaction::{
    ChainConnection, SendTransactionOptions, SerializeConfig, Transaction, TransactionError,
};
