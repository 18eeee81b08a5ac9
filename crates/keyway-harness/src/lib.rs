//! Deterministic simulation harness for Keyway adapter testing.
//!
//! In-process implementations of the host environment, the browser
//! extension, the deep-link wallet app and the chain connection, plus a
//! reference model and a scenario framework. Everything is seeded, so a
//! failing run reproduces exactly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_extension;
pub mod sim_host;
pub mod sim_transaction;
pub mod sim_wallet;

pub use model::{ModelWorld, Operation, OperationError, OperationResult};
pub use sim_extension::{ExtensionOp, SimExtension};
pub use sim_host::{DEFAULT_PAGE, SimHost, SimStorage};
pub use sim_transaction::{SignatureEntry, SimChain, SimTransaction};
pub use sim_wallet::{
    Decision, ReceivedRequest, SimWalletApp, UNAUTHORIZED, USER_REJECTED, tamper_data,
};
