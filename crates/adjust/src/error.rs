//! Error types for the sdba-adjust crate.

use sdba_group::GroupError;

/// Error type for all fallible operations in the sdba-adjust crate.
///
/// Contract violations (missing variables, shapes, time axes) and
/// configuration errors are raised immediately. Numeric degeneracy inside a
/// group becomes NaN in that group's output; only distribution fitting fails
/// outright with [`AdjustError::FitFailed`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdjustError {
    /// Returned when a dataset lacks a required variable.
    #[error("missing variable: '{name}'")]
    MissingVariable {
        /// Name of the absent variable.
        name: String,
    },

    /// Returned when an array does not have the declared dimensions or
    /// lengths.
    #[error("shape contract violated for '{name}': {reason}")]
    ShapeContract {
        /// Name of the offending variable.
        name: String,
        /// Description of the mismatch.
        reason: String,
    },

    /// Returned when two series that must share a time axis do not.
    #[error("time axis mismatch between {left} and {right}")]
    TimeMismatch {
        /// First series.
        left: &'static str,
        /// Second series.
        right: &'static str,
    },

    /// Returned when a configuration parameter is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a tail distribution cannot be fitted.
    #[error("distribution fit failed at location {location}: {reason}")]
    FitFailed {
        /// Location index of the failing series.
        location: usize,
        /// Description of the failure.
        reason: String,
    },

    /// Grouping or series construction error.
    #[error(transparent)]
    Group(#[from] GroupError),
}

impl AdjustError {
    pub(crate) fn shape(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShapeContract {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
