//! Connection strategies.
//!
//! [`DirectStrategy`] talks to an extension object in the same process.
//! [`DeepLinkStrategy`] runs the encrypted redirect protocol against a
//! separate wallet app, keeping its continuation state in host storage.

mod deep_link;
mod direct;

pub use deep_link::{ConnectStep, DeepLinkStrategy};
pub use direct::DirectStrategy;
