//! Combinators over observation handles.
//!
//! - [`all`](mod@all): Wait for every handle, collecting values positionally

pub mod all;

pub use all::{AllFailure, AllPolicy, AllPromise, all, all_with};
