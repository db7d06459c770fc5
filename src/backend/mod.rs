//! Format handlers and the lazy activation of the backends that provide them.
//!
//! A [`Backend`] is a plugin for one [`Capability`]. Registering a backend does not load it:
//! the [`BackendActivator`] calls [`Backend::load`] the first time a format needing that
//! capability is dispatched, and inserts the returned [`FormatHandler`]s into the
//! [`HandlerRegistry`] before reporting success. The dispatcher re-reads the registry after
//! activation, so the call that triggered the load is served by the new handler.
//!
//! Built-in backends:
//!
//! - [`csv`]: delimited text, part of the core (no capability)
//! - [`json`]: JSON row tables
//! - `parquet`, `excel`, `arrow`, `sqlite`, `zip`: behind the Cargo features of the same name

pub mod csv;
pub mod json;
#[cfg(feature = "parquet")]
pub mod parquet;
#[cfg(feature = "excel")]
pub mod excel;
#[cfg(feature = "arrow")]
pub mod arrow;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "zip")]
pub mod zip;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::dispatch::{ReadOptions, WriteOptions};
use crate::error::{TableIoError, TableIoResult};
use crate::format::{Capability, FormatVariant};
use crate::types::DataSet;

/// The shape of a dispatched call. A handler may support any subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read a table from a file path.
    ReadPath,
    /// Read a table from an in-memory buffer.
    ReadBuffer,
    /// Write a table to a file path.
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ReadPath => f.write_str("reading from a path"),
            Operation::ReadBuffer => f.write_str("reading from a buffer"),
            Operation::Write => f.write_str("writing"),
        }
    }
}

/// Codec entry points for one or more formats.
///
/// Only the operations reported by [`FormatHandler::supports`] are ever called.
pub trait FormatHandler: Send + Sync {
    /// Formats this handler serves.
    fn formats(&self) -> &[FormatVariant];

    /// Whether `operation` is implemented.
    fn supports(&self, operation: Operation) -> bool;

    /// Read a table from `path`.
    fn read_path(
        &self,
        format: FormatVariant,
        _path: &Path,
        _options: &ReadOptions,
    ) -> TableIoResult<DataSet> {
        Err(unsupported(format, Operation::ReadPath))
    }

    /// Read a table from an in-memory buffer.
    fn read_buffer(
        &self,
        format: FormatVariant,
        _bytes: &[u8],
        _options: &ReadOptions,
    ) -> TableIoResult<DataSet> {
        Err(unsupported(format, Operation::ReadBuffer))
    }

    /// Write `table` to `path`, replacing any existing file.
    fn write_path(
        &self,
        format: FormatVariant,
        _path: &Path,
        _table: &DataSet,
        _options: &WriteOptions,
    ) -> TableIoResult<()> {
        Err(unsupported(format, Operation::Write))
    }
}

fn unsupported(format: FormatVariant, operation: Operation) -> TableIoError {
    TableIoError::UnsupportedOperation { format, operation }
}

/// Error type a [`Backend`] loader may fail with.
pub type LoadError = Box<dyn StdError + Send + Sync>;

/// A plugin providing the handlers for one capability.
pub trait Backend: Send + Sync {
    /// The capability this backend provides.
    fn capability(&self) -> Capability;

    /// Build the handlers. Called at most once per successful activation.
    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError>;
}

/// Thread-safe table of active handlers, keyed by format.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<FormatVariant, Arc<dyn FormatHandler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handler` for every format it serves, replacing previous handlers.
    pub fn register(&self, handler: Arc<dyn FormatHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        for &format in handler.formats() {
            handlers.insert(format, Arc::clone(&handler));
        }
    }

    /// The handler for `format` if one is registered and supports `operation`.
    ///
    /// `None` is a dispatch miss.
    pub fn resolve(&self, format: FormatVariant, operation: Operation) -> Option<Arc<dyn FormatHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format)
            .filter(|h| h.supports(operation))
            .cloned()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("HandlerRegistry")
            .field("formats", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of a successful [`BackendActivator::ensure_activated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The format needs no capability.
    NotRequired,
    /// The capability was already active.
    AlreadyActive(Capability),
    /// The capability was loaded by this call.
    Loaded(Capability),
}

/// Lazily activates backends, at most once per capability.
///
/// The activation state only grows. Each capability has its own lock, so concurrent requests
/// for the same capability load it once while distinct capabilities load in parallel.
pub struct BackendActivator {
    backends: RwLock<HashMap<Capability, Arc<dyn Backend>>>,
    active: [Mutex<bool>; Capability::ALL.len()],
}

impl Default for BackendActivator {
    fn default() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            active: std::array::from_fn(|_| Mutex::new(false)),
        }
    }
}

impl BackendActivator {
    /// Create an activator with no backends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `backend` available for activation.
    ///
    /// Replaces an earlier registration for the same capability. An already active capability
    /// stays active with the handlers it loaded.
    pub fn register_backend(&self, backend: Arc<dyn Backend>) {
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(backend.capability(), backend);
    }

    /// Whether a backend is registered for `capability`.
    pub fn is_installed(&self, capability: Capability) -> bool {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&capability)
    }

    /// Whether `capability` has been activated.
    pub fn is_active(&self, capability: Capability) -> bool {
        *self.slot(capability).lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All activated capabilities.
    pub fn active_capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|&c| self.is_active(c))
            .collect()
    }

    /// Activate the capability `format` depends on, registering its handlers into `handlers`.
    ///
    /// Fails with [`TableIoError::BackendNotAvailable`] when no backend is registered for the
    /// capability or its loader fails. A failed load leaves the capability inactive so a later
    /// registration can still succeed.
    pub fn ensure_activated(
        &self,
        format: FormatVariant,
        handlers: &HandlerRegistry,
    ) -> TableIoResult<Activation> {
        let Some(capability) = format.capability() else {
            return Ok(Activation::NotRequired);
        };

        let mut active = self.slot(capability).lock().unwrap_or_else(PoisonError::into_inner);
        if *active {
            return Ok(Activation::AlreadyActive(capability));
        }

        let backend = self
            .backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .cloned()
            .ok_or(TableIoError::BackendNotAvailable {
                capability,
                format,
                reason: None,
            })?;

        let loaded = backend.load().map_err(|e| TableIoError::BackendNotAvailable {
            capability,
            format,
            reason: Some(e.to_string()),
        })?;
        for handler in loaded {
            handlers.register(handler);
        }

        *active = true;
        Ok(Activation::Loaded(capability))
    }

    fn slot(&self, capability: Capability) -> &Mutex<bool> {
        &self.active[capability as usize]
    }
}

impl fmt::Debug for BackendActivator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed: Vec<Capability> = Capability::ALL
            .into_iter()
            .filter(|&c| self.is_installed(c))
            .collect();
        f.debug_struct("BackendActivator")
            .field("installed", &installed)
            .field("active", &self.active_capabilities())
            .finish()
    }
}

/// Backends compiled into this build.
pub fn builtin_backends() -> Vec<Arc<dyn Backend>> {
    #[allow(unused_mut)]
    let mut backends: Vec<Arc<dyn Backend>> = vec![Arc::new(json::JsonBackend)];
    #[cfg(feature = "parquet")]
    backends.push(Arc::new(parquet::ParquetBackend));
    #[cfg(feature = "excel")]
    backends.push(Arc::new(excel::ExcelBackend));
    #[cfg(feature = "arrow")]
    backends.push(Arc::new(arrow::ArrowBackend));
    #[cfg(feature = "sqlite")]
    backends.push(Arc::new(sqlite::SqliteBackend));
    #[cfg(feature = "zip")]
    backends.push(Arc::new(zip::ZipBackend));
    backends
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ReadOnlyStat;

    impl FormatHandler for ReadOnlyStat {
        fn formats(&self) -> &[FormatVariant] {
            &[FormatVariant::StatA, FormatVariant::StatB]
        }

        fn supports(&self, operation: Operation) -> bool {
            operation == Operation::ReadPath
        }
    }

    struct CountingBackend {
        loads: AtomicUsize,
    }

    impl Backend for CountingBackend {
        fn capability(&self) -> Capability {
            Capability::ReadStat
        }

        fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Arc::new(ReadOnlyStat)])
        }
    }

    #[test]
    fn resolve_filters_by_operation() {
        let registry = HandlerRegistry::new();
        registry.register(Arc::new(ReadOnlyStat));
        assert!(registry.resolve(FormatVariant::StatB, Operation::ReadPath).is_some());
        assert!(registry.resolve(FormatVariant::StatB, Operation::Write).is_none());
        assert!(registry.resolve(FormatVariant::StatC, Operation::ReadPath).is_none());
    }

    #[test]
    fn activation_is_idempotent() {
        let registry = HandlerRegistry::new();
        let activator = BackendActivator::new();
        let backend = Arc::new(CountingBackend {
            loads: AtomicUsize::new(0),
        });
        activator.register_backend(backend.clone());

        let first = activator.ensure_activated(FormatVariant::StatA, &registry).unwrap();
        let second = activator.ensure_activated(FormatVariant::StatB, &registry).unwrap();
        assert_eq!(first, Activation::Loaded(Capability::ReadStat));
        assert_eq!(second, Activation::AlreadyActive(Capability::ReadStat));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert_eq!(activator.active_capabilities(), vec![Capability::ReadStat]);
    }

    #[test]
    fn missing_backend_is_not_available() {
        let activator = BackendActivator::new();
        let err = activator
            .ensure_activated(FormatVariant::ColumnarCustom, &HandlerRegistry::new())
            .unwrap_err();
        assert!(err.to_string().contains("backend `jdf`"));
        assert!(activator.active_capabilities().is_empty());
    }

    #[test]
    fn csv_needs_no_activation() {
        let activator = BackendActivator::new();
        let outcome = activator
            .ensure_activated(FormatVariant::DelimitedText, &HandlerRegistry::new())
            .unwrap();
        assert_eq!(outcome, Activation::NotRequired);
    }
}
