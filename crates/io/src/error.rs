//! Error types for sdba-io.

use std::path::PathBuf;

/// Error type for all fallible operations in the sdba-io crate.
///
/// Covers missing files, Parquet and Arrow failures, tables that do not
/// follow the expected column layout and time columns that cannot form a
/// time axis.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a required file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that could not be found.
        path: PathBuf,
    },

    /// Wraps an error originating from the Parquet or Arrow libraries.
    #[error("parquet error: {reason}")]
    Parquet {
        /// Description of the underlying failure.
        reason: String,
    },

    /// Returned when one or more layout checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned when a required column is not present in a table.
    #[error("column '{name}' not found in {source_name}")]
    MissingColumn {
        /// Name of the missing column.
        name: String,
        /// File or table that was inspected.
        source_name: String,
    },

    /// Returned when the time column cannot be converted to dates or does
    /// not form a strictly increasing axis.
    #[error("invalid time: {reason}")]
    InvalidTime {
        /// Description of the time issue.
        reason: String,
    },
}

impl From<parquet::errors::ParquetError> for IoError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        IoError::Parquet {
            reason: e.to_string(),
        }
    }
}

impl From<arrow::error::ArrowError> for IoError {
    fn from(e: arrow::error::ArrowError) -> Self {
        IoError::Parquet {
            reason: e.to_string(),
        }
    }
}

impl From<sdba_group::GroupError> for IoError {
    fn from(e: sdba_group::GroupError) -> Self {
        IoError::InvalidTime {
            reason: e.to_string(),
        }
    }
}
