//! Low-level Parquet reading and column extraction.

use std::collections::BTreeMap;
use std::path::Path;

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::{DataType, Date32Type, Float64Type};
use chrono::{NaiveDate, TimeDelta};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use sdba_group::TimeAxis;

use crate::error::IoError;
use crate::parquet_write::{TIME_COLUMN, unix_epoch};
use crate::table::Table;

/// Reads all record batches from a Parquet file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the file does not exist, or
/// [`IoError::Parquet`] if the file cannot be opened or read.
pub(crate) fn read_batches(path: &Path) -> Result<Vec<RecordBatch>, IoError> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = std::fs::File::open(path).map_err(|e| IoError::Parquet {
        reason: e.to_string(),
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let batches: Vec<RecordBatch> = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Checks that the batch has a `Date32` time column and that every other
/// column is `Float64`.
///
/// # Errors
///
/// Returns [`IoError::MissingColumn`] without a time column and
/// [`IoError::Validation`] listing every column of the wrong type.
pub(crate) fn validate_schema(batch: &RecordBatch, source_name: &str) -> Result<(), IoError> {
    let schema = batch.schema();
    if schema.column_with_name(TIME_COLUMN).is_none() {
        return Err(IoError::MissingColumn {
            name: TIME_COLUMN.to_string(),
            source_name: source_name.to_string(),
        });
    }

    let mismatches: Vec<String> = schema
        .fields()
        .iter()
        .filter_map(|field| {
            let expected = if field.name() == TIME_COLUMN {
                DataType::Date32
            } else {
                DataType::Float64
            };
            (field.data_type() != &expected).then(|| {
                format!(
                    "column '{}': expected {expected}, got {}",
                    field.name(),
                    field.data_type()
                )
            })
        })
        .collect();

    if !mismatches.is_empty() {
        return Err(IoError::Validation {
            count: mismatches.len(),
            details: mismatches.join("; "),
        });
    }
    Ok(())
}

fn to_date(days: i32) -> Result<NaiveDate, IoError> {
    unix_epoch()
        .checked_add_signed(TimeDelta::days(i64::from(days)))
        .ok_or_else(|| IoError::InvalidTime {
            reason: format!("{days} days from 1970-01-01 is out of range"),
        })
}

/// Concatenates the batches into a [`Table`]. Null values become NaN.
///
/// # Errors
///
/// Returns [`IoError::InvalidTime`] for null or unsorted dates and
/// [`IoError::Validation`] for batches with differing columns.
pub(crate) fn batches_to_table(batches: &[RecordBatch], source_name: &str) -> Result<Table, IoError> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for (b, batch) in batches.iter().enumerate() {
        validate_schema(batch, source_name)?;
        let schema = batch.schema();
        if b > 0 && schema.fields().len() != columns.len() + 1 {
            return Err(IoError::Validation {
                count: 1,
                details: format!("batch {b} has {} columns", schema.fields().len()),
            });
        }

        for (i, field) in schema.fields().iter().enumerate() {
            let column = batch.column(i);
            if field.name() == TIME_COLUMN {
                let time = column.as_primitive::<Date32Type>();
                for row in 0..time.len() {
                    if time.is_null(row) {
                        return Err(IoError::InvalidTime {
                            reason: format!("null date at row {}", dates.len()),
                        });
                    }
                    dates.push(to_date(time.value(row))?);
                }
            } else {
                let values = column.as_primitive::<Float64Type>();
                let entry = columns.entry(field.name().clone()).or_default();
                entry.extend((0..values.len()).map(|row| {
                    if values.is_null(row) {
                        f64::NAN
                    } else {
                        values.value(row)
                    }
                }));
            }
        }
    }

    let mut table = Table::new(TimeAxis::new(dates)?);
    for (name, values) in columns {
        table.insert(name, values)?;
    }
    Ok(table)
}
