//! Observability for deferred chains.
//!
//! Logging goes through `tracing` throughout the crate. This module adds the
//! structured counterpart:
//!
//! - [`ActivationGauge`]: outstanding-work gauge fed by a context's
//!   activation handler

pub mod activation;

pub use activation::{ActivationGauge, ActivationSnapshot};
