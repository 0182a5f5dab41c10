use crate::level::LevelValue;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::error::Error;

/// Keys the record writes itself; structured fields never shadow them.
pub const RESERVED_KEYS: [&str; 4] = ["level", "message", "time", "err"];

/// A single log call as produced by the host logger.
///
/// Until it is handed off the record is mutable (the decorator rewrites
/// `message` in place). Forwarded copies are serialized exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LevelValue,
    pub message: String,
    /// Host logger's own timestamp, serialized as epoch milliseconds.
    pub time: Option<DateTime<Utc>>,
    pub error: Option<ErrorValue>,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    pub fn new(level: impl Into<LevelValue>, message: impl Into<String>) -> Self {
        LogRecord {
            level: level.into(),
            message: message.into(),
            time: None,
            error: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: ErrorValue) -> Self {
        self.error = Some(error);
        self
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Newline-terminated JSON object, the wire form of a forwarded event.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = self.to_json()?;
        line.push('\n');
        Ok(line)
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("message", &self.message)?;
        if let Some(time) = self.time {
            map.serialize_entry("time", &time.timestamp_millis())?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("err", error)?;
        }
        for (key, value) in &self.fields {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Error attached to a log call. Every part is optional so that partially
/// populated errors still annotate instead of failing the call.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ErrorValue {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorValue {
    /// Capture an error value. The class is the concrete type name without
    /// its module path; the stack is the display text followed by the
    /// `source()` chain, one cause per line.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let class = short_type_name::<E>();
        ErrorValue {
            class: Some(class.to_string()),
            message: Some(error.to_string()),
            stack: Some(cause_chain(format!("{class}: {error}"), error)),
        }
    }

    /// Capture a type-erased error, as handed over by `tracing` fields.
    ///
    /// The concrete type is not available here, so the class is the leading
    /// name of the `Debug` representation (`QueryFailed(..)` gives
    /// `QueryFailed`), if there is one.
    pub fn from_dyn_error(error: &(dyn Error + 'static)) -> Self {
        let debug = format!("{error:?}");
        let class = debug
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .filter(|name| name.starts_with(|c: char| c.is_ascii_uppercase()))
            .map(str::to_string);
        let head = match &class {
            Some(class) => format!("{class}: {error}"),
            None => error.to_string(),
        };

        ErrorValue {
            class,
            message: Some(error.to_string()),
            stack: Some(cause_chain(head, error)),
        }
    }

    /// An error known only by its text (e.g. a formatted field).
    pub fn from_message(message: impl Into<String>) -> Self {
        ErrorValue {
            class: None,
            message: Some(message.into()),
            stack: None,
        }
    }
}

fn cause_chain(mut stack: String, error: &(dyn Error + 'static)) -> String {
    let mut source = error.source();
    while let Some(cause) = source {
        stack.push_str("\n    caused by: ");
        stack.push_str(&cause.to_string());
        source = cause.source();
    }
    stack
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Generic parameters may contain `::`, only strip the outer path.
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}
