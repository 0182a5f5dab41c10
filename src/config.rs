use crate::env;
use arc_swap::ArcSwap;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Default capacity of the aggregation buffer.
pub const DEFAULT_MAX_SAMPLES_STORED: usize = 10_000;

/// Snapshot of the application logging settings.
///
/// Every flag defaults to disabled. Flags are parsed leniently: a value that
/// cannot be understood as a boolean turns the feature off instead of
/// failing the whole document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    #[serde(deserialize_with = "lenient_flag")]
    pub enabled: bool,
    pub forwarding: ForwardingConfig,
    pub local_decorating: Toggle,
    pub metrics: Toggle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingConfig {
    #[serde(deserialize_with = "lenient_flag")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient_capacity")]
    pub max_samples_stored: usize,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_samples_stored: DEFAULT_MAX_SAMPLES_STORED,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    #[serde(deserialize_with = "lenient_flag")]
    pub enabled: bool,
}

/// Error returned when a configuration document cannot be read at all.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid logging configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LoggingConfig {
    /// Everything on: forwarding, decorating and metrics.
    pub fn all_enabled() -> Self {
        Self {
            enabled: true,
            forwarding: ForwardingConfig {
                enabled: true,
                ..ForwardingConfig::default()
            },
            local_decorating: Toggle { enabled: true },
            metrics: Toggle { enabled: true },
        }
    }

    /// Build a snapshot from the `APM_APPLICATION_LOGGING_*` variables.
    pub fn from_env() -> Self {
        let max_samples_stored = std::env::var(env::FORWARDING_MAX_SAMPLES_STORED_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_SAMPLES_STORED);

        Self {
            enabled: env::env_flag(env::APPLICATION_LOGGING_ENABLED_ENV),
            forwarding: ForwardingConfig {
                enabled: env::env_flag(env::FORWARDING_ENABLED_ENV),
                max_samples_stored,
            },
            local_decorating: Toggle {
                enabled: env::env_flag(env::LOCAL_DECORATING_ENABLED_ENV),
            },
            metrics: Toggle {
                enabled: env::env_flag(env::METRICS_ENABLED_ENV),
            },
        }
    }

    /// Parse a JSON document shaped like
    /// `{"enabled": true, "forwarding": {"enabled": true}, ...}`.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(flag) => flag,
        serde_json::Value::String(raw) => env::parse_flag(&raw).unwrap_or(false),
        serde_json::Value::Number(n) => n.as_u64() == Some(1),
        _ => false,
    })
}

fn lenient_capacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
        serde_json::Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    };
    Ok(parsed.unwrap_or(DEFAULT_MAX_SAMPLES_STORED))
}

/// Shared, hot-swappable configuration.
///
/// The instrumentation loads one snapshot per log call; `store` replaces it
/// for all subsequent calls without blocking readers. That includes
/// `forwarding.max_samples_stored`, which resizes the aggregation buffer on
/// the next forwarded line.
#[derive(Clone, Debug)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<LoggingConfig>>,
}

impl ConfigHandle {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn load(&self) -> Arc<LoggingConfig> {
        self.current.load_full()
    }

    pub fn store(&self, config: LoggingConfig) {
        self.current.store(Arc::new(config));
    }

    /// Apply an in-place edit to a copy of the current snapshot.
    pub fn update(&self, edit: impl FnOnce(&mut LoggingConfig)) {
        let mut next = LoggingConfig::clone(&self.load());
        edit(&mut next);
        self.store(next);
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(LoggingConfig::default())
    }
}

impl From<LoggingConfig> for ConfigHandle {
    fn from(config: LoggingConfig) -> Self {
        Self::new(config)
    }
}
