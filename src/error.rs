//! Error types for programmer misuse.
//!
//! Domain failures are not errors in this crate: they travel through
//! [`Deferred::fail`](crate::Deferred::fail) as ordinary values. The types here
//! describe misuse of the API itself, which is routed through the context's
//! exception handler before it reaches the caller.

use crate::types::UnitId;
use thiserror::Error;

/// The kind of misuse detected by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A unit was asked to follow its own handle.
    SelfFollow,
    /// Handles owned by different contexts were mixed in one operation.
    ContextMismatch,
    /// Configuration could not be loaded or parsed.
    Config,
}

/// Misuse reported by the deferred engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError {
    /// `follow` was called with the unit's own handle; it could never settle.
    #[error("{op}: unit {unit} cannot follow its own promise")]
    SelfFollow {
        /// Operation that detected the cycle.
        op: &'static str,
        /// The unit involved.
        unit: UnitId,
    },
    /// A handle from another context was passed in.
    #[error("{op}: promise {unit} belongs to a different context")]
    ContextMismatch {
        /// Operation that detected the mismatch.
        op: &'static str,
        /// The offending unit.
        unit: UnitId,
    },
    /// Configuration error.
    #[error("invalid configuration: {message}")]
    Config {
        /// Human readable description.
        message: String,
    },
}

impl DeferredError {
    /// Creates a configuration error with the given message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SelfFollow { .. } => ErrorKind::SelfFollow,
            Self::ContextMismatch { .. } => ErrorKind::ContextMismatch,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Returns the operation name recorded with the error, if any.
    #[must_use]
    pub const fn op(&self) -> Option<&'static str> {
        match self {
            Self::SelfFollow { op, .. } | Self::ContextMismatch { op, .. } => Some(op),
            Self::Config { .. } => None,
        }
    }
}

/// Result alias for fallible deferred operations.
pub type Result<T> = core::result::Result<T, DeferredError>;
