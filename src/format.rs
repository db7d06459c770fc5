//! The fixed extension → format table and the capability each format needs.

use std::fmt;
use std::path::Path;

use crate::error::{TableIoError, TableIoResult};

/// Supported table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVariant {
    /// A zip archive holding a delimited-text entry (`.zip`).
    Zipped,
    /// Comma-separated values (`.csv`).
    DelimitedText,
    /// Julia data format directories (`.jdf`).
    ColumnarCustom,
    /// Apache Parquet (`.parquet`).
    ColumnarStandard,
    /// Excel workbook (`.xlsx`).
    Spreadsheet,
    /// SQLite database (`.db`, `.sqlite`, `.sqlite3`).
    RelationalDb,
    /// Stata (`.dta`).
    StatA,
    /// SPSS (`.sav`).
    StatB,
    /// SAS (`.sas7bdat`).
    StatC,
    /// JSON array of row objects (`.json`).
    JsonTable,
    /// Arrow IPC file (`.arrow`).
    ColumnarInterchange,
}

impl FormatVariant {
    /// Every variant, in table order.
    pub const ALL: [FormatVariant; 11] = [
        Self::Zipped,
        Self::DelimitedText,
        Self::ColumnarCustom,
        Self::ColumnarStandard,
        Self::Spreadsheet,
        Self::RelationalDb,
        Self::StatA,
        Self::StatB,
        Self::StatC,
        Self::JsonTable,
        Self::ColumnarInterchange,
    ];

    /// Parse a format from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zipped),
            "csv" => Some(Self::DelimitedText),
            "jdf" => Some(Self::ColumnarCustom),
            "parquet" => Some(Self::ColumnarStandard),
            "xlsx" => Some(Self::Spreadsheet),
            "db" | "sqlite" | "sqlite3" => Some(Self::RelationalDb),
            "dta" => Some(Self::StatA),
            "sav" => Some(Self::StatB),
            "sas7bdat" => Some(Self::StatC),
            "json" => Some(Self::JsonTable),
            "arrow" => Some(Self::ColumnarInterchange),
            _ => None,
        }
    }

    /// Whether the backend can read an in-memory buffer instead of a file path.
    pub fn supports_stream_input(self) -> bool {
        matches!(
            self,
            Self::DelimitedText | Self::JsonTable | Self::ColumnarInterchange
        )
    }

    /// The capability providing this format's codec; `None` for formats built into the core.
    pub fn capability(self) -> Option<Capability> {
        match self {
            Self::DelimitedText => None,
            Self::Zipped => Some(Capability::Zip),
            Self::ColumnarCustom => Some(Capability::Jdf),
            Self::ColumnarStandard => Some(Capability::Parquet),
            Self::Spreadsheet => Some(Capability::Xlsx),
            Self::RelationalDb => Some(Capability::Sqlite),
            Self::StatA | Self::StatB | Self::StatC => Some(Capability::ReadStat),
            Self::JsonTable => Some(Capability::Json),
            Self::ColumnarInterchange => Some(Capability::Arrow),
        }
    }
}

/// An optional codec provider a format depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Zip archives.
    Zip,
    /// JDF column directories.
    Jdf,
    /// Parquet files.
    Parquet,
    /// Excel workbooks.
    Xlsx,
    /// SQLite databases.
    Sqlite,
    /// Stata, SPSS and SAS files.
    ReadStat,
    /// JSON row tables.
    Json,
    /// Arrow IPC files.
    Arrow,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 8] = [
        Self::Zip,
        Self::Jdf,
        Self::Parquet,
        Self::Xlsx,
        Self::Sqlite,
        Self::ReadStat,
        Self::Json,
        Self::Arrow,
    ];

    /// Stable identifier, used in error messages and logs.
    pub fn id(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Jdf => "jdf",
            Self::Parquet => "parquet",
            Self::Xlsx => "xlsx",
            Self::Sqlite => "sqlite",
            Self::ReadStat => "readstat",
            Self::Json => "json",
            Self::Arrow => "arrow",
        }
    }

    /// What the user has to do to make this capability available.
    pub fn install_hint(self) -> &'static str {
        match self {
            Self::Zip => "enable the `zip` cargo feature of table-io",
            Self::Parquet => "enable the `parquet` cargo feature of table-io",
            Self::Xlsx => "enable the `excel` cargo feature of table-io",
            Self::Sqlite => "enable the `sqlite` cargo feature of table-io",
            Self::Arrow => "enable the `arrow` cargo feature of table-io",
            Self::Json => "register a backend for capability `json` with `Dispatcher::register_backend`",
            Self::Jdf => "install a `jdf` backend by registering it with `Dispatcher::register_backend`",
            Self::ReadStat => {
                "install a `readstat` backend by registering it with `Dispatcher::register_backend`"
            }
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Resolve the format of a file name from its extension.
///
/// The extension is everything after the last `.`, compared case-insensitively.
pub fn lookup(filename: &str) -> TableIoResult<FormatVariant> {
    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| FormatVariant::from_extension(ext))
        .ok_or_else(|| TableIoError::UnknownFormat {
            name: filename.to_string(),
        })
}

/// [`lookup`] for paths; only the final component is considered.
pub fn lookup_path(path: &Path) -> TableIoResult<FormatVariant> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| TableIoError::UnknownFormat {
            name: path.display().to_string(),
        })?;
    lookup(name)
}

/// The capability a format needs, if any.
pub fn capability_for(variant: FormatVariant) -> Option<Capability> {
    variant.capability()
}
