//! Deferred: one-shot settlement units with chained continuations.
//!
//! # Overview
//!
//! A [`Deferred`] lets a producer announce success or failure exactly once. Its
//! [`Promise`] lets any number of consumers register continuations, before or
//! after that announcement. Beyond the plain promise model the engine provides:
//!
//! - **Paired continuations** that redirect into each other: a success
//!   continuation whose returned handle fails hands the failure to its paired
//!   failure continuation, and a failure continuation that recovers settles
//!   the visible chain.
//! - **Tree-wide cancellation**: cancelling any unit cancels its parent and
//!   every descendant, one connected wave across the derived tree.
//! - **Activation tracking**: a `+1`/`-1` signal as handles gain their first
//!   pending continuation and lose it, for outstanding-work accounting.
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers, settlement state, liveness
//! - [`deferred`](mod@deferred): Settlement units, handles, the redirect engine
//! - [`context`]: Pluggable handlers and the settlement work queue
//! - [`combinator`]: The `all` aggregate
//! - [`config`]: Engine configuration from code, environment, or TOML
//! - [`observability`]: Activation gauge
//! - [`error`](mod@error): Misuse errors
//!
//! # Example
//!
//! ```
//! use deferred::{Context, Deferred, Next};
//!
//! let ctx = Context::new();
//! let unit: Deferred<u32, String> = ctx.deferred();
//! let label = unit
//!     .promise()
//!     .then(|n| Next::Resolve(n + 1))
//!     .otherwise(|e| Next::Fail(format!("wrapped: {e}")));
//! unit.resolve(41);
//! assert_eq!(label.value(), Some(42));
//! ```
//!
//! # Threading
//!
//! Units are single-threaded (`!Send`). Each thread has its own default
//! [`Context`]; create explicit contexts to isolate handler configuration.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod combinator;
pub mod config;
pub mod context;
pub mod deferred;
pub mod error;
pub mod observability;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use combinator::{AllFailure, AllPolicy, AllPromise, all, all_with};
pub use config::DeferredConfig;
pub use context::{
    ActivationHandler, Context, ExceptionHandler, Handlers, Job, OutcomeHandler,
    set_activation_handler, set_exception_handler, set_outcome_handler,
};
pub use deferred::{Deferred, Next, Promise};
pub use error::{DeferredError, ErrorKind, Result};
pub use observability::{ActivationGauge, ActivationSnapshot};
pub use types::{Kind, Liveness, Settlement, State, UnitId};
