use crate::aggregator::LogAggregator;
use crate::config::{ConfigHandle, LoggingConfig};
use crate::harvest::{spawn_harvester, HarvestConfig};
use crate::instrumentation::LogInstrumentation;
use crate::layer::LogForwardingLayer;
use crate::logger::{Destination, Logger};
use crate::metrics::{FacadeMetrics, MetricsStore};
use crate::sink::LogSink;
use crate::transaction::{AgentIdentity, Tracer};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Everything the logging integration needs, wired together.
#[derive(Clone)]
pub struct LoggingPipeline {
    pub config: ConfigHandle,
    pub tracer: Arc<Tracer>,
    pub aggregator: Arc<LogAggregator>,
    pub instrumentation: Arc<LogInstrumentation>,
}

impl LoggingPipeline {
    /// Counters go to the `metrics` facade.
    pub fn new(identity: AgentIdentity, config: LoggingConfig) -> Self {
        Self::with_metrics(identity, config, Arc::new(FacadeMetrics))
    }

    pub fn with_metrics(
        identity: AgentIdentity,
        config: LoggingConfig,
        metrics: Arc<dyn MetricsStore>,
    ) -> Self {
        let aggregator = Arc::new(LogAggregator::new(config.forwarding.max_samples_stored));
        let config = ConfigHandle::new(config);
        let tracer = Arc::new(Tracer::new(identity));
        let instrumentation = Arc::new(LogInstrumentation::new(
            config.clone(),
            tracer.clone(),
            aggregator.clone(),
            metrics,
        ));

        Self {
            config,
            tracer,
            aggregator,
            instrumentation,
        }
    }

    /// Settings from `APM_APPLICATION_LOGGING_*`.
    pub fn from_env(identity: AgentIdentity) -> Self {
        Self::new(identity, LoggingConfig::from_env())
    }

    /// A structured logger whose calls go through this pipeline.
    pub fn logger(&self, destination: Arc<dyn Destination>) -> Logger {
        Logger::new(destination).with_instrumentation(Arc::clone(&self.instrumentation))
    }

    pub fn layer(&self) -> LogForwardingLayer {
        LogForwardingLayer::new(Arc::clone(&self.instrumentation))
    }
}

/// Configuration of the global `tracing` installation.
///
/// **Fields**
/// - `harvest`: how often and in which batch sizes the aggregator is shipped.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is added
///   on top of [`LogForwardingLayer`] and events are printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub harvest: HarvestConfig,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            harvest: HarvestConfig::default(),
            enable_stdout: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the pipeline's layer as part of the global `tracing` subscriber
/// and start harvesting into `sink`.
///
/// Must be called from within a Tokio runtime; the returned handle belongs
/// to the harvester task.
pub fn init_tracing_with_config(
    pipeline: &LoggingPipeline,
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let layer = pipeline.layer();

    // The two subscriber shapes have different types, so install each
    // branch separately.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(spawn_harvester(
        Arc::clone(&pipeline.aggregator),
        sink,
        config.harvest,
    ))
}

/// [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(
    pipeline: &LoggingPipeline,
    sink: Arc<dyn LogSink>,
) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(pipeline, sink, LayerConfig::default())
}
