use thiserror::Error;

use crate::backend::Operation;
use crate::format::{Capability, FormatVariant};

/// Convenience result type for table I/O operations.
pub type TableIoResult<T> = Result<T, TableIoError>;

/// Error type returned by every read/write/sql entry point.
///
/// Backend errors (CSV, Parquet, ...) are carried through untranslated.
#[derive(Debug, Error)]
pub enum TableIoError {
    /// The file name has no extension, or its extension is not in the format table.
    #[error("unknown format for '{name}': no handler is registered for this extension")]
    UnknownFormat { name: String },

    /// A format needs a capability that is not compiled in or failed to load.
    ///
    /// `reason` holds the loader's own diagnostic, when there was one. It is not part of the
    /// display text.
    #[error("backend `{capability}` required for {format:?} is not available: {hint}", hint = .capability.install_hint())]
    BackendNotAvailable {
        capability: Capability,
        format: FormatVariant,
        reason: Option<String>,
    },

    /// The capability is active but provides no handler for this operation.
    #[error("{format:?} does not support {operation}")]
    UnsupportedOperation {
        format: FormatVariant,
        operation: Operation,
    },

    /// The value passed to `write_table` does not expose a consistent row/column shape.
    #[error("invalid table: {message}")]
    InvalidTable { message: String },

    /// An identifier (e.g. a SQL table name) contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid identifier '{identifier}': only ASCII letters, digits and '_' are allowed")]
    InvalidIdentifier { identifier: String },

    /// An uploaded file carried no bytes.
    #[error("upload '{name}' is empty")]
    EmptyInput { name: String },

    /// Options required by a format are missing or contradictory.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV codec error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON codec error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "parquet")]
    /// Parquet codec error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "excel")]
    /// Spreadsheet read error.
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[cfg(feature = "excel")]
    /// Spreadsheet write error.
    #[error("xlsx write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[cfg(feature = "arrow")]
    /// Arrow IPC error.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "sqlite")]
    /// SQLite driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "zip")]
    /// Zip archive error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The input does not conform to the expected schema (missing columns, ragged rows, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}
