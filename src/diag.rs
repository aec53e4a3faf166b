//! Leveled diagnostics capability injected into the database.
//!
//! The database never aborts on anomalies; it degrades to conservative
//! defaults and surfaces every anomaly through this trait. `LogDiagnostics`
//! forwards to the `log` facade for production use, `CollectingDiagnostics`
//! records messages so tests can assert exact warning counts.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

pub trait Diagnostics: Send + Sync {
    fn log(&self, severity: Severity, message: &str);

    fn enabled(&self, _severity: Severity) -> bool {
        true
    }

    fn trace(&self, message: &str) {
        self.log(Severity::Trace, message);
    }

    fn debug(&self, message: &str) {
        self.log(Severity::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }

    fn fatal(&self, message: &str) {
        self.log(Severity::Fatal, message);
    }
}

/// Forwards to the `log` crate facade. Fatal has no `log` counterpart and
/// maps to the error level with a `fatal:` prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => log::trace!("{message}"),
            Severity::Debug => log::debug!("{message}"),
            Severity::Info => log::info!("{message}"),
            Severity::Warn => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
            Severity::Fatal => log::error!("fatal: {message}"),
        }
    }

    fn enabled(&self, severity: Severity) -> bool {
        let level = match severity {
            Severity::Trace => log::Level::Trace,
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warn => log::Level::Warn,
            Severity::Error | Severity::Fatal => log::Level::Error,
        };
        log::log_enabled!(level)
    }
}

/// Records every emitted message. Intended for tests that assert on warning
/// counts, but usable anywhere a caller wants to inspect diagnostics.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    records: Mutex<Vec<(Severity, String)>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Severity, String)> {
        self.records.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn log(&self, severity: Severity, message: &str) {
        self.records.lock().push((severity, message.to_string()));
    }
}
