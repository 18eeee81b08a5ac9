//! Scenario framework.
//!
//! A scenario declares a transport, the wallet's decisions and a list of
//! user steps. Running it drives a real [`keyway_core::WalletAdapter`]
//! against the simulated host, wallet app and extension, reloading the page
//! on every redirect the way a browser would, then hands the final
//! [`World`] to an oracle.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::{StepOutcome, Transport, World};

/// Verifies the final world of a scenario.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;
