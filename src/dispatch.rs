//! Unified read/write entrypoints.
//!
//! Most callers should use [`read_table`] and [`write_table`], which run on the process-wide
//! [`Dispatcher::global`]. Every call:
//!
//! 1. resolves the [`FormatVariant`] (explicit `options.format`, otherwise the file extension)
//! 2. asks the [`HandlerRegistry`] for a handler supporting the call shape (the fast path)
//! 3. on a miss, activates the format's backend and resolves exactly once more
//!
//! A miss after activation surfaces as [`TableIoError::UnsupportedOperation`]; every other
//! error is returned unchanged.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use crate::backend::{
    self, Activation, Backend, BackendActivator, FormatHandler, HandlerRegistry, Operation,
};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{self, Capability, FormatVariant};
use crate::input::InputSource;
use crate::observability::{severity_for_error, DispatchContext, DispatchObserver, DispatchStats, Severity};
use crate::types::{self, DataSet, Schema, Tabular};
use crate::upload::{self, Upload};

/// How to choose sheet(s) when reading a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelection {
    /// Read the first sheet (default).
    First,
    /// Read a single named sheet.
    Sheet(String),
    /// Read all sheets and concatenate rows.
    AllSheets,
    /// Read only the listed sheets (in order) and concatenate rows.
    Sheets(Vec<String>),
}

impl Default for SheetSelection {
    fn default() -> Self {
        Self::First
    }
}

/// Options controlling [`read_table`].
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct ReadOptions {
    /// If `None`, the format is inferred from the file extension.
    pub format: Option<FormatVariant>,
    /// Expected columns. If `None`, column types are inferred from the data.
    pub schema: Option<Schema>,
    /// Workbook sheet selection.
    pub sheet: SheetSelection,
    /// Table to read from a database file. Required for database formats.
    pub table: Option<String>,
    /// Entry to read from a zip archive. Defaults to the archive's only `.csv` entry.
    pub zip_entry: Option<String>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn DispatchObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("format", &self.format)
            .field("schema", &self.schema)
            .field("sheet", &self.sheet)
            .field("table", &self.table)
            .field("zip_entry", &self.zip_entry)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            format: None,
            schema: None,
            sheet: SheetSelection::default(),
            table: None,
            zip_entry: None,
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

/// Options controlling [`write_table`].
#[derive(Clone)]
pub struct WriteOptions {
    /// If `None`, the format is inferred from the file extension.
    pub format: Option<FormatVariant>,
    /// Worksheet name for workbook output. Defaults to `Sheet1`.
    pub sheet_name: Option<String>,
    /// Table to (re)create in a database file. Required for database formats.
    pub table: Option<String>,
    /// Entry name inside a zip archive. Defaults to `<archive stem>.csv`.
    pub zip_entry: Option<String>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn DispatchObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("format", &self.format)
            .field("sheet_name", &self.sheet_name)
            .field("table", &self.table)
            .field("zip_entry", &self.zip_entry)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: None,
            sheet_name: None,
            table: None,
            zip_entry: None,
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

/// Where [`read_table`] reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// A file on disk.
    Path(PathBuf),
    /// An uploaded file.
    Upload(Upload),
}

impl TableSource {
    fn display_name(&self) -> PathBuf {
        match self {
            TableSource::Path(p) => p.clone(),
            TableSource::Upload(u) => PathBuf::from(&u.name),
        }
    }
}

impl From<&str> for TableSource {
    fn from(value: &str) -> Self {
        Self::Path(PathBuf::from(value))
    }
}

impl From<String> for TableSource {
    fn from(value: String) -> Self {
        Self::Path(PathBuf::from(value))
    }
}

impl From<&Path> for TableSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for TableSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&PathBuf> for TableSource {
    fn from(value: &PathBuf) -> Self {
        Self::Path(value.clone())
    }
}

impl From<Upload> for TableSource {
    fn from(value: Upload) -> Self {
        Self::Upload(value)
    }
}

/// Format handlers plus the activator that lazily fills them in.
///
/// [`Dispatcher::global`] is shared by the free functions; separate instances are independent
/// (own handlers, own activation state).
pub struct Dispatcher {
    handlers: HandlerRegistry,
    activator: BackendActivator,
}

static GLOBAL: LazyLock<Dispatcher> = LazyLock::new(Dispatcher::with_builtin_backends);

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers)
            .field("activator", &self.activator)
            .finish()
    }
}

impl Dispatcher {
    /// A dispatcher with only the core CSV handler and no registered backends.
    pub fn new() -> Self {
        let handlers = HandlerRegistry::new();
        handlers.register(Arc::new(backend::csv::CsvHandler));
        Self {
            handlers,
            activator: BackendActivator::new(),
        }
    }

    /// A dispatcher with every backend compiled into this build registered (none activated).
    pub fn with_builtin_backends() -> Self {
        let dispatcher = Self::new();
        for b in backend::builtin_backends() {
            dispatcher.register_backend(b);
        }
        dispatcher
    }

    /// The process-wide dispatcher used by [`read_table`] and [`write_table`].
    pub fn global() -> &'static Dispatcher {
        &GLOBAL
    }

    /// Make a backend available; it is loaded on first use of one of its formats.
    pub fn register_backend(&self, backend: Arc<dyn Backend>) {
        self.activator.register_backend(backend);
    }

    /// Capabilities activated so far.
    pub fn active_capabilities(&self) -> Vec<Capability> {
        self.activator.active_capabilities()
    }

    /// Activate the backend `format` needs, if it is not active yet.
    pub fn ensure_activated(&self, format: FormatVariant) -> TableIoResult<Activation> {
        self.activator.ensure_activated(format, &self.handlers)
    }

    /// Read a table from a path or an upload.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use table_io::dispatch::{Dispatcher, ReadOptions};
    ///
    /// # fn main() -> Result<(), table_io::TableIoError> {
    /// let ds = Dispatcher::global().read_table("people.csv", &ReadOptions::default())?;
    /// println!("rows={}", ds.row_count());
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_table(&self, source: impl Into<TableSource>, options: &ReadOptions) -> TableIoResult<DataSet> {
        let source = source.into();
        let mut ctx = DispatchContext {
            target: source.display_name(),
            format: None,
            operation: Operation::ReadPath,
        };
        let result = self.read_source(source, options, &mut ctx);
        report(
            options.observer.as_deref(),
            options.alert_at_or_above,
            &ctx,
            result.as_ref().map(DataSet::row_count),
        );
        result
    }

    /// Write `table` to `destination`, replacing an existing file.
    ///
    /// The table is validated before anything touches the filesystem; a value without a
    /// consistent row/column shape fails with [`TableIoError::InvalidTable`].
    pub fn write_table(
        &self,
        destination: impl AsRef<Path>,
        table: &dyn Tabular,
        options: &WriteOptions,
    ) -> TableIoResult<()> {
        let path = destination.as_ref();
        let mut ctx = DispatchContext {
            target: path.to_path_buf(),
            format: None,
            operation: Operation::Write,
        };
        let result = self.write_resolved(path, table, options, &mut ctx);
        report(
            options.observer.as_deref(),
            options.alert_at_or_above,
            &ctx,
            result.as_ref().copied(),
        );
        result.map(|_| ())
    }

    fn read_source(
        &self,
        source: TableSource,
        options: &ReadOptions,
        ctx: &mut DispatchContext,
    ) -> TableIoResult<DataSet> {
        match source {
            TableSource::Path(path) => {
                let format = match options.format {
                    Some(f) => f,
                    None => format::lookup_path(&path)?,
                };
                ctx.format = Some(format);
                self.dispatch(format, ctx, options.observer.as_deref(), |h| {
                    h.read_path(format, &path, options)
                })
            }
            TableSource::Upload(upload) => {
                let (name, input) = match options.format {
                    Some(f) => upload::from_upload_as(upload, f)?,
                    None => upload::from_upload(upload)?,
                };
                let format = match options.format {
                    Some(f) => f,
                    None => format::lookup(&name)?,
                };
                ctx.format = Some(format);
                self.read_input(format, input, options, ctx)
            }
        }
    }

    fn read_input(
        &self,
        format: FormatVariant,
        input: InputSource,
        options: &ReadOptions,
        ctx: &mut DispatchContext,
    ) -> TableIoResult<DataSet> {
        let observer = options.observer.as_deref();
        match input {
            InputSource::Buffer(bytes) => {
                ctx.operation = Operation::ReadBuffer;
                self.dispatch(format, ctx, observer, |h| h.read_buffer(format, &bytes, options))
            }
            InputSource::Path(path) => {
                self.dispatch(format, ctx, observer, |h| h.read_path(format, &path, options))
            }
            // `file` lives until the read returns, then removes its directory.
            InputSource::Spooled(file) => {
                self.dispatch(format, ctx, observer, |h| h.read_path(format, file.path(), options))
            }
        }
    }

    fn write_resolved(
        &self,
        path: &Path,
        table: &dyn Tabular,
        options: &WriteOptions,
        ctx: &mut DispatchContext,
    ) -> TableIoResult<usize> {
        let format = match options.format {
            Some(f) => f,
            None => format::lookup_path(path)?,
        };
        ctx.format = Some(format);

        let data = types::materialize(table)?;
        self.dispatch(format, ctx, options.observer.as_deref(), |h| {
            h.write_path(format, path, &data, options)
        })?;
        Ok(data.row_count())
    }

    /// Fast path, then at most one activation and one retry.
    fn dispatch<T>(
        &self,
        format: FormatVariant,
        ctx: &DispatchContext,
        observer: Option<&dyn DispatchObserver>,
        call: impl Fn(&dyn FormatHandler) -> TableIoResult<T>,
    ) -> TableIoResult<T> {
        if let Some(handler) = self.handlers.resolve(format, ctx.operation) {
            return call(&*handler);
        }

        match self.activator.ensure_activated(format, &self.handlers) {
            Ok(Activation::Loaded(capability)) => {
                if let Some(o) = observer {
                    o.on_backend_activated(ctx, capability);
                }
            }
            Ok(_) => {}
            Err(err) => {
                if let (
                    Some(o),
                    TableIoError::BackendNotAvailable {
                        capability,
                        reason: Some(reason),
                        ..
                    },
                ) = (observer, &err)
                {
                    o.on_backend_load_failed(ctx, *capability, reason);
                }
                return Err(err);
            }
        }

        match self.handlers.resolve(format, ctx.operation) {
            Some(handler) => call(&*handler),
            None => Err(TableIoError::UnsupportedOperation {
                format,
                operation: ctx.operation,
            }),
        }
    }
}

fn report(
    observer: Option<&dyn DispatchObserver>,
    alert_at_or_above: Severity,
    ctx: &DispatchContext,
    outcome: Result<usize, &TableIoError>,
) {
    let Some(obs) = observer else { return };
    match outcome {
        Ok(rows) => obs.on_success(ctx, DispatchStats { rows }),
        Err(e) => {
            let sev = severity_for_error(e);
            obs.on_failure(ctx, sev, e);
            if sev >= alert_at_or_above {
                obs.on_alert(ctx, sev, e);
            }
        }
    }
}

/// Read a table from a path or an upload using the global dispatcher.
///
/// # Examples
///
/// ## CSV (format from the extension, types inferred)
///
/// ```no_run
/// use table_io::{read_table, ReadOptions};
///
/// # fn main() -> Result<(), table_io::TableIoError> {
/// let ds = read_table("people.csv", &ReadOptions::default())?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
///
/// ## Upload from a file picker
///
/// ```no_run
/// use table_io::{read_table, ReadOptions, Upload};
///
/// # fn main() -> Result<(), table_io::TableIoError> {
/// let upload = Upload::new("report.parquet", std::fs::read("report.parquet")?);
/// let ds = read_table(upload, &ReadOptions::default())?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
///
/// ## Explicit schema
///
/// ```no_run
/// use table_io::{read_table, ReadOptions};
/// use table_io::types::{DataType, Field, Schema};
///
/// # fn main() -> Result<(), table_io::TableIoError> {
/// let opts = ReadOptions {
///     schema: Some(Schema::new(vec![
///         Field::new("id", DataType::Int64),
///         Field::new("name", DataType::Utf8),
///     ])),
///     ..Default::default()
/// };
/// let ds = read_table("people.json", &opts)?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn read_table(source: impl Into<TableSource>, options: &ReadOptions) -> TableIoResult<DataSet> {
    Dispatcher::global().read_table(source, options)
}

/// Write a table using the global dispatcher. See [`Dispatcher::write_table`].
pub fn write_table(destination: impl AsRef<Path>, table: &dyn Tabular, options: &WriteOptions) -> TableIoResult<()> {
    Dispatcher::global().write_table(destination, table, options)
}
