use crate::instrumentation::LogInstrumentation;
use crate::level::Level;
use crate::record::{ErrorValue, LogRecord};
use crate::transaction::detect_hostname;
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

pub type Fields = BTreeMap<String, serde_json::Value>;

/// Where a logger writes its finished lines.
pub trait Destination: Send + Sync {
    fn write_line(&self, line: &str) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutDestination;

impl Destination for StdoutDestination {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")
    }
}

/// Keeps written lines in memory.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    lines: Mutex<Vec<String>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Written lines parsed back into JSON; unparsable lines are skipped.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl Destination for MemoryDestination {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Fields bound by a logger and all of its ancestors.
#[derive(Debug)]
struct Bindings {
    parent: Option<Arc<Bindings>>,
    fields: Fields,
}

impl Bindings {
    /// Root first, so a child's value wins over its parent's.
    fn collect_into(&self, out: &mut Fields) {
        if let Some(parent) = &self.parent {
            parent.collect_into(out);
        }
        out.extend(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Structured JSON logger whose calls pass through the log
/// instrumentation before being written.
///
/// Every line carries `hostname` and `pid`, the fields bound by the logger
/// and its parents, then the call's own fields.
#[derive(Clone)]
pub struct Logger {
    bindings: Arc<Bindings>,
    level: Level,
    destination: Arc<dyn Destination>,
    instrumentation: Option<Arc<LogInstrumentation>>,
}

impl Logger {
    pub fn new(destination: Arc<dyn Destination>) -> Self {
        let mut base = Fields::new();
        base.insert("hostname".into(), detect_hostname().into());
        base.insert("pid".into(), std::process::id().into());

        Self {
            bindings: Arc::new(Bindings {
                parent: None,
                fields: base,
            }),
            level: Level::Info,
            destination,
            instrumentation: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Arc::new(StdoutDestination))
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_instrumentation(mut self, instrumentation: Arc<LogInstrumentation>) -> Self {
        self.instrumentation = Some(instrumentation);
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    /// A logger that adds `fields` to everything it logs, on top of this
    /// logger's bindings.
    pub fn child(&self, fields: Fields) -> Logger {
        Logger {
            bindings: Arc::new(Bindings {
                parent: Some(Arc::clone(&self.bindings)),
                fields,
            }),
            level: self.level,
            destination: Arc::clone(&self.destination),
            instrumentation: self.instrumentation.clone(),
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(Level::Trace, Fields::new(), message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, Fields::new(), message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, Fields::new(), message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, Fields::new(), message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, Fields::new(), message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.log(Level::Fatal, Fields::new(), message);
    }

    /// Log `error` at error level alongside `message`.
    pub fn error_with<E: Error + 'static>(&self, error: &E, message: impl Into<String>) {
        if !self.is_enabled(Level::Error) {
            return;
        }
        let mut record = self.record(Level::Error, Fields::new(), message.into());
        record.error = Some(ErrorValue::from_error(error));
        self.emit(record);
    }

    pub fn log(&self, level: Level, fields: Fields, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        let record = self.record(level, fields, message.into());
        self.emit(record);
    }

    fn record(&self, level: Level, fields: Fields, message: String) -> LogRecord {
        let mut all = Fields::new();
        self.bindings.collect_into(&mut all);
        all.extend(fields);

        LogRecord {
            level: level.into(),
            message,
            time: Some(Utc::now()),
            error: None,
            fields: all,
        }
    }

    fn emit(&self, mut record: LogRecord) {
        if let Some(instrumentation) = &self.instrumentation {
            instrumentation.on_log_record(&mut record);
        }

        let written = record
            .to_json()
            .map_err(io::Error::from)
            .and_then(|line| self.destination.write_line(&line));
        if let Err(err) = written {
            tracing::warn!(
                target: crate::DIAGNOSTICS_TARGET,
                error = %err,
                "failed to write log line"
            );
        }
    }
}

/// Build a [`Fields`] map from `key => value` pairs.
#[macro_export]
macro_rules! fields {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::logger::Fields::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )*
        map
    }};
}
