//! `table-io` reads and writes tables through one pair of entry points, [`read_table`] and
//! [`write_table`], choosing the codec from the file extension.
//!
//! ## Formats
//!
//! | Extension                     | Format                               | Capability | Built-in provider   |
//! |-------------------------------|--------------------------------------|------------|---------------------|
//! | `.csv`                        | [`FormatVariant::DelimitedText`]     | core       | always              |
//! | `.json`                       | [`FormatVariant::JsonTable`]         | `json`     | always              |
//! | `.parquet`                    | [`FormatVariant::ColumnarStandard`]  | `parquet`  | feature `parquet`   |
//! | `.xlsx`                       | [`FormatVariant::Spreadsheet`]       | `xlsx`     | feature `excel`     |
//! | `.arrow`                      | [`FormatVariant::ColumnarInterchange`] | `arrow`  | feature `arrow`     |
//! | `.db`, `.sqlite`, `.sqlite3`  | [`FormatVariant::RelationalDb`]      | `sqlite`   | feature `sqlite`    |
//! | `.zip`                        | [`FormatVariant::Zipped`]            | `zip`      | feature `zip`       |
//! | `.jdf`                        | [`FormatVariant::ColumnarCustom`]    | `jdf`      | plugin only         |
//! | `.dta`, `.sav`, `.sas7bdat`   | `StatA`, `StatB`, `StatC`            | `readstat` | plugin only         |
//!
//! Backends are activated lazily: the first call that needs a capability loads its backend and
//! registers its handlers, and later calls take the fast path. A format whose backend is not
//! compiled in (or not registered) fails with [`TableIoError::BackendNotAvailable`], whose message
//! says how to make it available.
//!
//! ## Reading
//!
//! ```no_run
//! use table_io::{read_table, ReadOptions};
//!
//! # fn main() -> Result<(), table_io::TableIoError> {
//! let ds = read_table("people.csv", &ReadOptions::default())?;
//! println!("columns={:?} rows={}", ds.schema.field_names().collect::<Vec<_>>(), ds.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! Uploaded files ([`Upload`]) are read from memory when the format allows it, and otherwise
//! spooled to a private temporary directory that is removed after the read.
//!
//! ## Writing
//!
//! ```no_run
//! use table_io::{write_table, WriteOptions};
//! use table_io::types::{DataSet, DataType, Field, Schema, Value};
//!
//! # fn main() -> Result<(), table_io::TableIoError> {
//! let ds = DataSet::new(
//!     Schema::new(vec![Field::new("id", DataType::Int64), Field::new("name", DataType::Utf8)]),
//!     vec![vec![Value::Int64(1), Value::Utf8("Ada".to_string())]],
//! );
//! write_table("people.parquet", &ds, &WriteOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! Anything implementing [`Tabular`] can be written, including a `serde_json::Value` holding an
//! array of row objects or a `{"column": [values...]}` mapping. Values without a row/column shape
//! fail with [`TableIoError::InvalidTable`] before any file is touched.
//!
//! ## Modules
//!
//! - [`dispatch`]: the [`Dispatcher`], options and the free entry points
//! - [`backend`]: format handlers and lazy backend activation
//! - [`format`]: extension table and capabilities
//! - [`input`] / [`upload`]: buffers versus temporary files
//! - [`sql`]: queries through a caller-supplied connection
//! - [`observability`]: dispatch observers
//! - [`types`]: schema and in-memory dataset types
//! - [`error`]: the crate error type

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod input;
pub mod observability;
pub mod sql;
pub mod types;
pub mod upload;

pub use backend::{Activation, Backend, FormatHandler, LoadError, Operation};
pub use dispatch::{read_table, write_table, Dispatcher, ReadOptions, SheetSelection, TableSource, WriteOptions};
pub use error::{TableIoError, TableIoResult};
pub use format::{Capability, FormatVariant};
pub use sql::{read_sql, read_sql_table, SqlConnection};
pub use types::{DataSet, Tabular};
pub use upload::Upload;
