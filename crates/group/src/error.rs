//! Error types for the sdba-group crate.

/// Error type for all fallible operations in the sdba-group crate.
///
/// Covers grouper configuration mistakes (rejected at construction) and
/// shape contracts between series, time axes and grouped views.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GroupError {
    /// Returned when a window size is zero or even.
    #[error("invalid window: {window} (must be odd and >= 1)")]
    InvalidWindow {
        /// The rejected window size.
        window: usize,
    },

    /// Returned when a window larger than 1 is requested without a grouping
    /// property.
    #[error("window {window} requires a grouping property, got none")]
    WindowWithoutGroup {
        /// The rejected window size.
        window: usize,
    },

    /// Returned when an unknown group name is parsed.
    #[error("unknown group property: '{name}' (expected none, month, dayofyear or season)")]
    UnknownGroup {
        /// The unrecognised name.
        name: String,
    },

    /// Returned when an unknown correction kind is parsed.
    #[error("unknown correction kind: '{name}' (expected '+' or '*')")]
    UnknownKind {
        /// The unrecognised name.
        name: String,
    },

    /// Returned when time stamps are not strictly increasing.
    #[error("time axis is not strictly increasing at index {index}")]
    UnsortedTime {
        /// First index whose date is not after its predecessor.
        index: usize,
    },

    /// Returned when a value array does not match its time axis or grouping.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which axis disagreed.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
}
