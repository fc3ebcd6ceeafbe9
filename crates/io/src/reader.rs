//! High-level Parquet reading of daily tables.

use std::path::Path;

use tracing::{debug, info};

use crate::error::IoError;
use crate::parquet_read;
use crate::table::Table;

/// Reads a daily table from a Parquet file.
///
/// The file must hold a `time` column of type `Date32` with strictly
/// increasing dates, and `Float64` value columns named
/// `<role>_<variable>`. Null values are read as NaN.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the file does not exist,
/// [`IoError::Parquet`] if it cannot be read, [`IoError::Validation`] or
/// [`IoError::MissingColumn`] for a wrong layout and
/// [`IoError::InvalidTime`] for unusable dates.
pub fn read_table(path: &Path) -> Result<Table, IoError> {
    let batches = parquet_read::read_batches(path)?;
    debug!(path = %path.display(), n_batches = batches.len(), "read parquet batches");

    let source_name = path.display().to_string();
    let table = parquet_read::batches_to_table(&batches, &source_name)?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.names().count(),
        "read table"
    );
    Ok(table)
}
