use crate::aggregator::LogAggregator;
use crate::sink::LogSink;
use std::error::Error;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Controls how often the aggregator is emptied and how lines are batched
/// on their way to the sink.
///
/// Minimal thresholds are enforced by [`HarvestConfig::normalized`] to
/// avoid degenerate configurations.
#[derive(Clone, Debug)]
pub struct HarvestConfig {
    pub interval: Duration,
    pub batch_size: usize,
    /// Attempts per batch before it is dropped.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: 1000,
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl HarvestConfig {
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.max_retries = self.max_retries.max(1);
        if self.interval < Duration::from_millis(10) {
            self.interval = Duration::from_millis(10);
        }
        self
    }
}

/// Outcome of one harvest cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarvestReport {
    pub sent: usize,
    pub dropped: usize,
}

/// Take everything out of `aggregator` and ship it to `sink` in batches.
pub async fn harvest_once(
    aggregator: &LogAggregator,
    sink: &dyn LogSink,
    config: &HarvestConfig,
) -> HarvestReport {
    let events = aggregator.take();
    let mut report = HarvestReport::default();
    if events.is_empty() {
        return report;
    }

    for batch in events.chunks(config.batch_size.max(1)) {
        match send_batch(sink, batch, config).await {
            Ok(()) => report.sent += batch.len(),
            Err(e) => {
                warn!(
                    target: crate::DIAGNOSTICS_TARGET,
                    error = %e,
                    lines = batch.len(),
                    "dropping log batch after retries"
                );
                report.dropped += batch.len();
            }
        }
    }

    if let Err(e) = sink.flush().await {
        warn!(target: crate::DIAGNOSTICS_TARGET, error = %e, "log sink flush failed");
    }
    debug!(
        target: crate::DIAGNOSTICS_TARGET,
        sent = report.sent,
        dropped = report.dropped,
        "log harvest complete"
    );
    report
}

async fn send_batch(
    sink: &dyn LogSink,
    batch: &[String],
    config: &HarvestConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut backoff = config.initial_backoff;
    let mut attempt = 1;
    loop {
        match sink.send(batch).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= config.max_retries => return Err(e),
            Err(e) => {
                debug!(
                    target: crate::DIAGNOSTICS_TARGET,
                    error = %e,
                    attempt,
                    "log sink send failed, retrying in {:?}",
                    backoff
                );
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
                attempt += 1;
            }
        }
    }
}

/// Spawn a background task that harvests `aggregator` every
/// `config.interval` for the lifetime of the runtime.
pub fn spawn_harvester(
    aggregator: Arc<LogAggregator>,
    sink: Arc<dyn LogSink>,
    config: HarvestConfig,
) -> JoinHandle<()> {
    let config = config.normalized();
    tokio::spawn(async move {
        loop {
            sleep(config.interval).await;
            harvest_once(&aggregator, &*sink, &config).await;
        }
    })
}
