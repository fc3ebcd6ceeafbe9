//! High-level Parquet writer configuration.

use std::path::Path;
use std::str::FromStr;

use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::error::IoError;
use crate::parquet_write;
use crate::table::Table;

/// Compression algorithm for Parquet output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Snappy compression (fast, moderate ratio).
    #[default]
    Snappy,
    /// Zstd compression (slower, better ratio).
    Zstd,
}

impl Compression {
    /// Converts to the corresponding `parquet::basic::Compression` variant.
    fn to_parquet(self) -> Result<parquet::basic::Compression, IoError> {
        Ok(match self {
            Self::None => parquet::basic::Compression::UNCOMPRESSED,
            Self::Snappy => parquet::basic::Compression::SNAPPY,
            Self::Zstd => {
                let level =
                    parquet::basic::ZstdLevel::try_new(3).map_err(|e| IoError::Parquet {
                        reason: e.to_string(),
                    })?;
                parquet::basic::Compression::ZSTD(level)
            }
        })
    }
}

impl FromStr for Compression {
    type Err = IoError;

    /// Parses `none`, `snappy` or `zstd`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            _ => Err(IoError::Validation {
                count: 1,
                details: format!("unknown compression '{s}' (expected none, snappy or zstd)"),
            }),
        }
    }
}

/// Configuration for writing daily tables to Parquet.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Compression algorithm to use.
    compression: Compression,
    /// Maximum number of rows per row group.
    row_group_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            row_group_size: 1_000_000,
        }
    }
}

impl WriterConfig {
    /// Sets the compression algorithm.
    pub fn with_compression(mut self, comp: Compression) -> Self {
        self.compression = comp;
        self
    }

    /// Sets the maximum number of rows per row group.
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Compression algorithm.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Maximum number of rows per row group.
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Validation`] if `row_group_size` is zero.
    fn validate(&self) -> Result<(), IoError> {
        if self.row_group_size == 0 {
            return Err(IoError::Validation {
                count: 1,
                details: "row_group_size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Writes `table` to a Parquet file: a `Date32` `time` column followed by
/// one `Float64` column per table column, in name order.
///
/// # Errors
///
/// Returns [`IoError::Validation`] if the configuration is invalid,
/// [`IoError::InvalidTime`] for dates outside the `Date32` range, or
/// [`IoError::Parquet`] if batch conversion or file I/O fails.
pub fn write_table(path: &Path, table: &Table, config: &WriterConfig) -> Result<(), IoError> {
    config.validate()?;

    let schema = parquet_write::build_schema(table);

    let compression = config.compression.to_parquet()?;
    let props = WriterProperties::builder()
        .set_compression(compression)
        .set_max_row_group_size(config.row_group_size)
        .build();

    let batch = parquet_write::table_to_record_batch(table, &schema)?;
    parquet_write::write_batches(path, &[batch], &schema, props)?;

    info!(path = %path.display(), rows = table.len(), "wrote table");
    Ok(())
}
