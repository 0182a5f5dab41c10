use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use apm_log_enrichment::{
    config::LoggingConfig,
    init::{init_tracing, LoggingPipeline},
    sink::LogSink,
    transaction::AgentIdentity,
};

/// Example of integrating a completely custom intake by implementing the
/// `LogSink` trait directly. Imagine this talks to some proprietary
/// collector for which this crate does not provide a built-in sink.
struct MyCollectorSink;

#[async_trait]
impl LogSink for MyCollectorSink {
    async fn send(&self, batch: &[String]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the collector.
        // For the sake of example we just print the lines.
        for line in batch {
            print!("[my-collector] {}", line);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn LogSink> = Arc::new(MyCollectorSink);
    let pipeline = LoggingPipeline::new(
        AgentIdentity::new("custom-backend-example", "example-guid"),
        LoggingConfig::all_enabled(),
    );

    init_tracing(&pipeline, sink).expect("install tracing subscriber");

    info!("custom backend example started");

    let transaction = pipeline.tracer.start_transaction("checkout");
    pipeline.tracer.in_transaction(&transaction, || {
        let span = tracing::info_span!("checkout", cart_id = 42);
        let _guard = span.enter();
        warn!(items = 3, "inventory low while checking out");
    });
    transaction.end();

    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
}
