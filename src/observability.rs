//! Observer hooks for dispatch outcomes and backend activation.
//!
//! Attach an observer through [`crate::dispatch::ReadOptions::observer`] or
//! [`crate::dispatch::WriteOptions::observer`]. Nothing is logged when no observer is set.

use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::Operation;
use crate::error::TableIoError;
use crate::format::{Capability, FormatVariant};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (I/O failures, missing backends).
    Critical,
}

/// Context about one dispatched call.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// File path, or the declared name of an upload.
    pub target: PathBuf,
    /// Resolved format; `None` if resolution itself failed.
    pub format: Option<FormatVariant>,
    /// Call shape.
    pub operation: Operation,
}

/// Stats reported on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Rows read or written.
    pub rows: usize,
}

/// One observed occurrence, as passed to [`DispatchObserver::on_event`].
#[derive(Debug, Clone, Copy)]
pub enum DispatchEvent<'a> {
    /// The call succeeded.
    Success(DispatchStats),
    /// The call failed.
    Failure(Severity, &'a TableIoError),
    /// The failure met the alert threshold.
    Alert(Severity, &'a TableIoError),
    /// This call loaded a backend.
    BackendActivated(Capability),
    /// A backend failed to load, with the loader's own message.
    BackendLoadFailed(Capability, &'a str),
}

impl DispatchEvent<'_> {
    /// Single-line `key=value` rendering used by the logging observers.
    pub fn describe(&self, ctx: &DispatchContext) -> String {
        let call = format!(
            "op={:?} format={:?} target={}",
            ctx.operation,
            ctx.format,
            ctx.target.display()
        );
        match self {
            DispatchEvent::Success(stats) => format!("ok {call} rows={}", stats.rows),
            DispatchEvent::Failure(severity, error) => format!("fail severity={severity:?} {call} err={error}"),
            DispatchEvent::Alert(severity, error) => format!("ALERT severity={severity:?} {call} err={error}"),
            DispatchEvent::BackendActivated(capability) => format!("activate capability={capability} {call}"),
            DispatchEvent::BackendLoadFailed(capability, reason) => {
                format!("load-failed capability={capability} {call} reason={reason}")
            }
        }
    }
}

/// Observer interface for dispatch outcomes.
///
/// Every hook defaults to [`Self::on_event`], so an observer can either override the hooks it
/// cares about or take everything through `on_event`.
pub trait DispatchObserver: Send + Sync {
    /// Catch-all for hooks that are not overridden.
    fn on_event(&self, _ctx: &DispatchContext, _event: DispatchEvent<'_>) {}

    /// Called when a read or write succeeds.
    fn on_success(&self, ctx: &DispatchContext, stats: DispatchStats) {
        self.on_event(ctx, DispatchEvent::Success(stats))
    }

    /// Called when a read or write fails.
    fn on_failure(&self, ctx: &DispatchContext, severity: Severity, error: &TableIoError) {
        self.on_event(ctx, DispatchEvent::Failure(severity, error))
    }

    /// Called after [`Self::on_failure`] when the failure meets the alert threshold.
    fn on_alert(&self, ctx: &DispatchContext, severity: Severity, error: &TableIoError) {
        self.on_event(ctx, DispatchEvent::Alert(severity, error))
    }

    /// Called when this call loaded a backend.
    fn on_backend_activated(&self, ctx: &DispatchContext, capability: Capability) {
        self.on_event(ctx, DispatchEvent::BackendActivated(capability))
    }

    /// Called with the loader's own message when a backend failed to load.
    ///
    /// The caller only sees the remediation text of [`TableIoError::BackendNotAvailable`].
    fn on_backend_load_failed(&self, ctx: &DispatchContext, capability: Capability, reason: &str) {
        self.on_event(ctx, DispatchEvent::BackendLoadFailed(capability, reason))
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn DispatchObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn DispatchObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl DispatchObserver for CompositeObserver {
    fn on_success(&self, ctx: &DispatchContext, stats: DispatchStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &DispatchContext, severity: Severity, error: &TableIoError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &DispatchContext, severity: Severity, error: &TableIoError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }

    fn on_backend_activated(&self, ctx: &DispatchContext, capability: Capability) {
        for o in &self.observers {
            o.on_backend_activated(ctx, capability);
        }
    }

    fn on_backend_load_failed(&self, ctx: &DispatchContext, capability: Capability, reason: &str) {
        for o in &self.observers {
            o.on_backend_load_failed(ctx, capability, reason);
        }
    }
}

/// Logs dispatch events to stderr, one `[table-io]` line each.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl DispatchObserver for StdErrObserver {
    fn on_event(&self, ctx: &DispatchContext, event: DispatchEvent<'_>) {
        eprintln!("[table-io] {}", event.describe(ctx));
    }
}

/// Appends dispatch events to a local log file, prefixed with a unix timestamp.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Log to `path`. Writes are best-effort; open and write failures are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }
}

impl DispatchObserver for FileObserver {
    fn on_event(&self, ctx: &DispatchContext, event: DispatchEvent<'_>) {
        let line = format!("{} {}", unix_ts(), event.describe(ctx));
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Classify an error for alerting.
///
/// I/O-rooted failures and missing backends are `Critical`; everything else is `Error`.
pub fn severity_for_error(e: &TableIoError) -> Severity {
    match e {
        TableIoError::Io(_) | TableIoError::BackendNotAvailable { .. } => Severity::Critical,
        TableIoError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        #[cfg(feature = "parquet")]
        TableIoError::Parquet(err) => {
            // Parquet errors wrap IO without a dedicated variant; walk the source chain.
            if error_chain_contains_io(err) {
                Severity::Critical
            } else {
                Severity::Error
            }
        }
        _ => Severity::Error,
    }
}

#[cfg_attr(not(feature = "parquet"), allow(dead_code))]
fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DispatchContext {
        DispatchContext {
            target: PathBuf::from("data/people.parquet"),
            format: Some(FormatVariant::ColumnarStandard),
            operation: Operation::ReadPath,
        }
    }

    #[test]
    fn events_render_as_one_line() {
        let err = TableIoError::EmptyInput {
            name: "people.parquet".to_string(),
        };
        let ok = DispatchEvent::Success(DispatchStats { rows: 3 }).describe(&ctx());
        let fail = DispatchEvent::Failure(Severity::Error, &err).describe(&ctx());
        let loaded = DispatchEvent::BackendActivated(Capability::Parquet).describe(&ctx());

        assert!(ok.starts_with("ok op=ReadPath format=Some(ColumnarStandard)"));
        assert!(ok.ends_with("target=data/people.parquet rows=3"));
        assert!(fail.starts_with("fail severity=Error op=ReadPath"));
        assert!(loaded.starts_with("activate capability=parquet "));
        assert!(!fail.contains('\n'));
    }

    #[test]
    fn io_errors_are_critical() {
        let err = TableIoError::Io(std::io::Error::other("disk gone"));
        assert_eq!(severity_for_error(&err), Severity::Critical);
        let err = TableIoError::EmptyInput { name: "x.csv".to_string() };
        assert_eq!(severity_for_error(&err), Severity::Error);
    }
}
