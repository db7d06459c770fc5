use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use table_io::types::{DataSet, DataType, Field, Schema, Value};
use table_io::{
    Activation, Backend, Capability, Dispatcher, FormatHandler, FormatVariant, LoadError, Operation,
    ReadOptions, TableIoError, WriteOptions,
};

/// Wraps another backend and counts how often it is loaded.
struct CountingBackend {
    inner: Arc<dyn Backend>,
    loads: AtomicUsize,
}

impl CountingBackend {
    fn new(inner: Arc<dyn Backend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            loads: AtomicUsize::new(0),
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Backend for CountingBackend {
    fn capability(&self) -> Capability {
        self.inner.capability()
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load()
    }
}

/// Serves the statistics formats for reading only.
struct StatReader;

impl FormatHandler for StatReader {
    fn formats(&self) -> &[FormatVariant] {
        &[FormatVariant::StatA, FormatVariant::StatB, FormatVariant::StatC]
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::ReadPath
    }

    fn read_path(&self, _format: FormatVariant, _path: &Path, _options: &ReadOptions) -> table_io::TableIoResult<DataSet> {
        Ok(one_row())
    }
}

struct StatBackend;

impl Backend for StatBackend {
    fn capability(&self) -> Capability {
        Capability::ReadStat
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Ok(vec![Arc::new(StatReader)])
    }
}

struct BrokenJdf;

impl Backend for BrokenJdf {
    fn capability(&self) -> Capability {
        Capability::Jdf
    }

    fn load(&self) -> Result<Vec<Arc<dyn FormatHandler>>, LoadError> {
        Err("libjdf.so: cannot open shared object file".into())
    }
}

fn one_row() -> DataSet {
    DataSet::new(
        Schema::new(vec![Field::new("x", DataType::Int64)]),
        vec![vec![Value::Int64(7)]],
    )
}

#[cfg(feature = "parquet")]
#[test]
fn parquet_backend_is_activated_once() {
    let dispatcher = Dispatcher::with_builtin_backends();
    let counting = CountingBackend::new(Arc::new(table_io::backend::parquet::ParquetBackend));
    dispatcher.register_backend(counting.clone());
    assert!(dispatcher.active_capabilities().is_empty());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("t.parquet");
    dispatcher.write_table(&out, &one_row(), &WriteOptions::default()).unwrap();
    assert_eq!(dispatcher.active_capabilities(), vec![Capability::Parquet]);

    dispatcher.write_table(&out, &one_row(), &WriteOptions::default()).unwrap();
    let back = dispatcher.read_table(&out, &ReadOptions::default()).unwrap();

    assert_eq!(back, one_row());
    assert_eq!(counting.loads(), 1);
    assert_eq!(dispatcher.active_capabilities(), vec![Capability::Parquet]);
}

#[test]
fn concurrent_activation_loads_once() {
    let dispatcher = Dispatcher::new();
    let counting = CountingBackend::new(Arc::new(StatBackend));
    dispatcher.register_backend(counting.clone());

    let outcomes: Vec<Activation> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| dispatcher.ensure_activated(FormatVariant::StatB).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(counting.loads(), 1);
    let loaded = outcomes
        .iter()
        .filter(|o| **o == Activation::Loaded(Capability::ReadStat))
        .count();
    assert_eq!(loaded, 1);
    assert_eq!(dispatcher.active_capabilities(), vec![Capability::ReadStat]);
}

#[test]
fn plugin_backend_serves_reads() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_backend(Arc::new(StatBackend));

    let ds = dispatcher.read_table("survey.sav", &ReadOptions::default()).unwrap();
    assert_eq!(ds, one_row());
    let ds = dispatcher.read_table("survey.SAS7BDAT", &ReadOptions::default()).unwrap();
    assert_eq!(ds, one_row());
}

#[test]
fn unsupported_operation_after_activation_does_not_reload() {
    let dispatcher = Dispatcher::new();
    let counting = CountingBackend::new(Arc::new(StatBackend));
    dispatcher.register_backend(counting.clone());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.dta");
    for _ in 0..2 {
        let err = dispatcher.write_table(&out, &one_row(), &WriteOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            TableIoError::UnsupportedOperation {
                format: FormatVariant::StatA,
                operation: Operation::Write,
            }
        ));
    }
    assert_eq!(counting.loads(), 1);
    assert!(!out.exists());
}

#[test]
fn failed_load_reports_remediation_and_stays_inactive() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_backend(Arc::new(BrokenJdf));

    let err = dispatcher.read_table("frame.jdf", &ReadOptions::default()).unwrap_err();
    match &err {
        TableIoError::BackendNotAvailable {
            capability,
            format,
            reason,
        } => {
            assert_eq!(*capability, Capability::Jdf);
            assert_eq!(*format, FormatVariant::ColumnarCustom);
            assert!(reason.as_deref().unwrap().contains("libjdf.so"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(Capability::Jdf.install_hint()));
    assert!(!err.to_string().contains("libjdf.so"));
    assert!(dispatcher.active_capabilities().is_empty());
}

#[test]
fn missing_backend_is_not_available() {
    let dispatcher = Dispatcher::new();
    let err = dispatcher.read_table("t.parquet", &ReadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        TableIoError::BackendNotAvailable {
            capability: Capability::Parquet,
            reason: None,
            ..
        }
    ));
    assert!(err.to_string().contains("enable the `parquet` cargo feature"));
}

#[test]
fn builtin_backends_do_not_cover_jdf() {
    let dispatcher = Dispatcher::with_builtin_backends();
    let err = dispatcher.read_table("frame.jdf", &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::BackendNotAvailable { capability: Capability::Jdf, .. }));
}

#[test]
fn unknown_extension_is_rejected() {
    let err = Dispatcher::new().read_table("data.xyz", &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::UnknownFormat { ref name } if name == "data.xyz"));

    let err = Dispatcher::new().read_table("no_extension", &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, TableIoError::UnknownFormat { .. }));
}

#[test]
fn explicit_format_overrides_extension() {
    let opts = ReadOptions {
        format: Some(FormatVariant::DelimitedText),
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.txt");
    std::fs::copy("tests/fixtures/fixture.csv", &path).unwrap();

    let ds = Dispatcher::new().read_table(&path, &opts).unwrap();
    assert_eq!(ds.row_count(), 2);
}
