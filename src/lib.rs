pub mod level;
pub mod record;
pub mod env;
pub mod config;
pub mod metadata;
pub mod transaction;
pub mod annotate;
pub mod decorate;
pub mod aggregator;
pub mod hold;
pub mod metrics;
pub mod instrumentation;
pub mod logger;
pub mod layer;
pub mod sink;
pub mod harvest;

#[cfg(feature = "http")]
pub mod http_sink;

pub mod init;
pub mod noop_sink;

/// `tracing` target for the crate's own diagnostics. Events on this target
/// are never fed back into the instrumentation.
pub const DIAGNOSTICS_TARGET: &str = "apm_log_enrichment::diagnostics";
