//! Low-level Parquet column building.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::error::IoError;
use crate::table::Table;

/// Name of the time column.
pub(crate) const TIME_COLUMN: &str = "time";

/// Day zero of the Arrow `Date32` type.
pub(crate) fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Builds the Arrow schema of `table`: `time` as `Date32`, then every value
/// column as `Float64` in name order.
pub(crate) fn build_schema(table: &Table) -> Schema {
    let mut fields = vec![Field::new(TIME_COLUMN, DataType::Date32, false)];
    fields.extend(
        table
            .names()
            .map(|name| Field::new(name, DataType::Float64, true)),
    );
    Schema::new(fields)
}

/// Days since 1970-01-01 of every date of the table.
fn date32_values(table: &Table) -> Result<Vec<i32>, IoError> {
    let epoch = unix_epoch();
    table
        .time()
        .dates()
        .iter()
        .map(|d| {
            i32::try_from(d.signed_duration_since(epoch).num_days()).map_err(|_| {
                IoError::InvalidTime {
                    reason: format!("{d} is out of the Date32 range"),
                }
            })
        })
        .collect()
}

/// Converts `table` into an Arrow [`RecordBatch`] with the schema of
/// [`build_schema`].
pub(crate) fn table_to_record_batch(table: &Table, schema: &Schema) -> Result<RecordBatch, IoError> {
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Date32Array::from(date32_values(table)?))];
    for name in table.names() {
        let values = table.column(name).unwrap_or_default();
        columns.push(Arc::new(Float64Array::from(values.to_vec())));
    }
    Ok(RecordBatch::try_new(Arc::new(schema.clone()), columns)?)
}

/// Writes a sequence of [`RecordBatch`]es to a Parquet file at `path`.
///
/// # Errors
///
/// Returns [`IoError::Parquet`] if file creation, batch writing, or file
/// finalisation fails.
pub(crate) fn write_batches(
    path: &Path,
    batches: &[RecordBatch],
    schema: &Schema,
    props: WriterProperties,
) -> Result<(), IoError> {
    let file = std::fs::File::create(path).map_err(|e| IoError::Parquet {
        reason: e.to_string(),
    })?;
    let mut writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))?;

    for batch in batches {
        writer.write(batch)?;
    }

    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdba_group::TimeAxis;

    fn table() -> Table {
        let time = TimeAxis::daily(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(), 3);
        let mut t = Table::new(time);
        t.insert("sim_tas", vec![1.0, f64::NAN, 3.0]).unwrap();
        t.insert("sim_pr", vec![0.0, 0.1, 0.2]).unwrap();
        t
    }

    #[test]
    fn schema_orders_columns_by_name() {
        let schema = build_schema(&table());
        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.field(0).name(), "time");
        assert_eq!(schema.field(0).data_type(), &DataType::Date32);
        assert_eq!(schema.field(1).name(), "sim_pr");
        assert_eq!(schema.field(2).name(), "sim_tas");
    }

    #[test]
    fn record_batch_dates_count_from_epoch() {
        let t = table();
        let schema = build_schema(&t);
        let batch = table_to_record_batch(&t, &schema).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 3);
        assert_eq!(date32_values(&t).unwrap(), vec![0, 1, 2]);
    }
}
