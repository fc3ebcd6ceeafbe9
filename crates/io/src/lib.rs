//! # sdba-io
//!
//! Parquet tables of daily series for the sdba command line. A table holds a
//! `Date32` `time` column and `Float64` columns named `<role>_<variable>`:
//! `ref_*` and `hist_*` for training, `sim_*` (and optionally `scen_*`) for
//! adjusting, `scen_*` for the output.
//!
//! ```text
//! parquet ──read_table──► Table ──series(role, vars)──► sdba_group::Series
//! parquet ◄─write_table── Table ◄─insert_series(role, vars, &series)──┘
//! ```

mod error;
mod parquet_read;
mod parquet_write;
mod reader;
mod table;
mod writer;

pub use error::IoError;
pub use reader::read_table;
pub use table::Table;
pub use writer::{Compression, WriterConfig, write_table};
