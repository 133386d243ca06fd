//! Core types shared by the engine.
//!
//! - [`id`]: Unit identifiers
//! - [`state`]: Settlement state, liveness and stored resolution values

pub mod id;
pub mod state;

pub use id::UnitId;
pub use state::{Kind, Liveness, Settlement, State};
