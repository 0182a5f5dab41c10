//! Environment variable names used by this crate for convenient
//! configuration of the logging integration from services.
//!
//! These are purely helpers; [`crate::config::LoggingConfig`] can also be
//! built from a document or by hand.

/// Master switch for the logging integration.
pub const APPLICATION_LOGGING_ENABLED_ENV: &str = "APM_APPLICATION_LOGGING_ENABLED";

/// Forward enriched records to the aggregator.
pub const FORWARDING_ENABLED_ENV: &str = "APM_APPLICATION_LOGGING_FORWARDING_ENABLED";

/// Capacity of the aggregation buffer between harvests.
pub const FORWARDING_MAX_SAMPLES_STORED_ENV: &str =
    "APM_APPLICATION_LOGGING_FORWARDING_MAX_SAMPLES_STORED";

/// Append linking metadata to the message text of local logs.
pub const LOCAL_DECORATING_ENABLED_ENV: &str = "APM_APPLICATION_LOGGING_LOCAL_DECORATING_ENABLED";

/// Count lines per level.
pub const METRICS_ENABLED_ENV: &str = "APM_APPLICATION_LOGGING_METRICS_ENABLED";

/// Explicit hostname override for linking metadata.
pub const HOSTNAME_ENV: &str = "APM_HOSTNAME";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Interpret a textual flag. Anything unrecognised is `None`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag; unset or malformed values mean disabled.
pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_flag(&raw))
        .unwrap_or(false)
}
