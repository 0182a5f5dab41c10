use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use apm_log_enrichment::config::LoggingConfig;
use apm_log_enrichment::init::{init_tracing_with_config, LayerConfig, LoggingPipeline};
use apm_log_enrichment::noop_sink::NoopSink;
use apm_log_enrichment::transaction::AgentIdentity;

#[tokio::main]
async fn main() {
    let sink = Arc::new(NoopSink::default());
    let mut config = LoggingConfig::all_enabled();
    config.forwarding.max_samples_stored = 200_000;
    let pipeline = LoggingPipeline::new(AgentIdentity::new("load-test", "load-guid"), config);

    let layer_config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };
    init_tracing_with_config(&pipeline, sink, layer_config).expect("install tracing subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("forwarding: enriched {} events in {:?} (~{:.0} ev/s), {} buffered",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        pipeline.aggregator.count()
    );

    // Give the harvester a moment to drain the buffer
    sleep(Duration::from_secs(6)).await;
}
