use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the per-level counter used when a record carries a level this
/// crate does not know about.
pub const UNKNOWN_LEVEL_METRIC: &str = "Logging/lines/UNKNOWN";

/// Log levels in the host logger's numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 10,
    Debug = 20,
    Info = 30,
    Warn = 40,
    Error = 50,
    Fatal = 60,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    pub const fn as_number(self) -> u64 {
        self as u64
    }

    pub fn from_number(n: u64) -> Option<Level> {
        Level::ALL.into_iter().find(|level| level.as_number() == n)
    }

    /// Case-insensitive lookup by canonical name.
    pub fn from_label(label: &str) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(label))
    }

    /// Canonical lowercase name, as written into forwarded events.
    pub const fn label(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Per-level line counter, `Logging/lines/<LEVEL>`.
    pub const fn metric_name(self) -> &'static str {
        match self {
            Level::Trace => "Logging/lines/TRACE",
            Level::Debug => "Logging/lines/DEBUG",
            Level::Info => "Logging/lines/INFO",
            Level::Warn => "Logging/lines/WARN",
            Level::Error => "Logging/lines/ERROR",
            Level::Fatal => "Logging/lines/FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Level exactly as it appears on a host record: either the numeric
/// encoding or a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelValue {
    Number(u64),
    Label(String),
}

impl LevelValue {
    pub fn resolve(&self) -> Option<Level> {
        match self {
            LevelValue::Number(n) => Level::from_number(*n),
            LevelValue::Label(label) => Level::from_label(label),
        }
    }

    /// Lowercase canonical name. Unknown numeric levels render as their
    /// decimal text, unknown labels are lowercased as-is.
    pub fn canonical_label(&self) -> String {
        match (self.resolve(), self) {
            (Some(level), _) => level.label().to_string(),
            (None, LevelValue::Number(n)) => n.to_string(),
            (None, LevelValue::Label(label)) => label.to_ascii_lowercase(),
        }
    }

    pub fn metric_name(&self) -> &'static str {
        self.resolve()
            .map(Level::metric_name)
            .unwrap_or(UNKNOWN_LEVEL_METRIC)
    }
}

impl From<Level> for LevelValue {
    fn from(level: Level) -> Self {
        LevelValue::Number(level.as_number())
    }
}

impl From<u64> for LevelValue {
    fn from(n: u64) -> Self {
        LevelValue::Number(n)
    }
}

impl From<&str> for LevelValue {
    fn from(label: &str) -> Self {
        LevelValue::Label(label.to_string())
    }
}

impl Serialize for LevelValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LevelValue::Number(n) => serializer.serialize_u64(*n),
            LevelValue::Label(label) => serializer.serialize_str(label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels_map_to_labels() {
        assert_eq!(LevelValue::Number(30).canonical_label(), "info");
        assert_eq!(LevelValue::Number(50).canonical_label(), "error");
        assert_eq!(LevelValue::Number(60).canonical_label(), "fatal");
    }

    #[test]
    fn labels_are_lowercased() {
        assert_eq!(LevelValue::from("WARN").canonical_label(), "warn");
        assert_eq!(LevelValue::from("Custom").canonical_label(), "custom");
    }

    #[test]
    fn unknown_numeric_level_keeps_its_number() {
        let level = LevelValue::Number(35);
        assert_eq!(level.resolve(), None);
        assert_eq!(level.canonical_label(), "35");
        assert_eq!(level.metric_name(), UNKNOWN_LEVEL_METRIC);
    }

    #[test]
    fn metric_names_are_uppercase() {
        assert_eq!(Level::Debug.metric_name(), "Logging/lines/DEBUG");
        assert_eq!(LevelValue::from("error").metric_name(), "Logging/lines/ERROR");
    }

    #[test]
    fn tracing_levels_convert() {
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(tracing::Level::TRACE).as_number(), 10);
    }
}
