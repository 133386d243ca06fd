//! Settlement state types.
//!
//! A handle's lifecycle has two independent axes. The settlement axis is
//! one-shot: `Pending` moves to `Resolved` or `Failed` and stays there. The
//! liveness axis records whether continuations may still run: a unit is
//! `Active`, temporarily `Dormant` (deactivated because its branch fell out
//! of scope, revivable by a redirect), or permanently `Cancelled`.

use core::fmt;

/// Which list a continuation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Runs when the unit resolves.
    Success,
    /// Runs when the unit fails.
    Failure,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Settlement state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Not yet settled.
    Pending,
    /// Resolved with a success value.
    Resolved,
    /// Failed with a failure value.
    Failed,
}

impl State {
    /// Returns true once the state is terminal.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Resolved => write!(f, "resolved"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Whether a handle still accepts work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Liveness {
    /// Normal operation.
    #[default]
    Active,
    /// Deactivated with its branch; may be revived by a redirect.
    Dormant,
    /// Cancelled by a cancellation wave; terminal.
    Cancelled,
}

impl Liveness {
    /// Returns true for both dormant and cancelled units.
    ///
    /// Either way the unit refuses settlement and registration.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Dormant => write!(f, "dormant"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A stored resolution value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    /// The unit resolved with this value.
    Resolved(T),
    /// The unit failed with this value.
    Failed(E),
}

impl<T, E> Settlement<T, E> {
    /// Returns the state this settlement corresponds to.
    #[must_use]
    pub const fn state(&self) -> State {
        match self {
            Self::Resolved(_) => State::Resolved,
            Self::Failed(_) => State::Failed,
        }
    }

    /// Returns the kind of continuation that handles this settlement.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Resolved(_) => Kind::Success,
            Self::Failed(_) => Kind::Failure,
        }
    }

    /// Returns the success value, if any.
    #[must_use]
    pub const fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Returns the failure value, if any.
    #[must_use]
    pub const fn failed(&self) -> Option<&E> {
        match self {
            Self::Resolved(_) => None,
            Self::Failed(err) => Some(err),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Failed(err) => Err(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settlement<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Resolved(value),
            Err(err) => Self::Failed(err),
        }
    }
}
