use std::sync::Arc;
use std::time::Instant;

use apm_log_enrichment::config::LoggingConfig;
use apm_log_enrichment::init::LoggingPipeline;
use apm_log_enrichment::logger::MemoryDestination;
use apm_log_enrichment::transaction::AgentIdentity;

fn main() {
    let mut config = LoggingConfig::default();
    config.enabled = true;
    config.local_decorating.enabled = true;
    config.metrics.enabled = true;

    let pipeline = LoggingPipeline::new(AgentIdentity::new("load-test", "load-guid"), config);
    let destination = Arc::new(MemoryDestination::new());
    let logger = pipeline.logger(destination.clone());

    let n: u64 = 100_000;
    let start = Instant::now();

    let transaction = pipeline.tracer.start_transaction("load");
    pipeline.tracer.in_transaction(&transaction, || {
        for i in 0..n {
            logger.info(format!("decorated line {i}"));
        }
    });
    transaction.end();

    let elapsed = start.elapsed();
    println!("decorating: wrote {} lines in {:?} (~{:.0} lines/s)",
        destination.lines().len(),
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    if let Some(last) = destination.lines().last() {
        println!("last line: {last}");
    }
}
