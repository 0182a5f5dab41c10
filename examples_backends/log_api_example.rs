use std::sync::Arc;

use tracing::{error, info};
use apm_log_enrichment::{
    env::env_or,
    http_sink::{LogApiConfig, LogApiSink},
    init::{init_tracing, LoggingPipeline},
    sink::LogSink,
    transaction::AgentIdentity,
};

#[tokio::main]
async fn main() {
    // Settings come from APM_APPLICATION_LOGGING_* variables.
    let url = env_or("LOG_API_URL", "http://localhost:8080/log/v1");
    let api_key = std::env::var("LOG_API_KEY").ok();

    let sink: Arc<dyn LogSink> = Arc::new(LogApiSink::new(LogApiConfig { url, api_key }));
    let pipeline = LoggingPipeline::from_env(AgentIdentity::new(
        env_or("APM_APP_NAME", "log-api-example"),
        env_or("APM_ENTITY_GUID", "example-guid"),
    ));

    init_tracing(&pipeline, sink).expect("install tracing subscriber");

    info!("log api example started");
    error!(error = "simulated failure", "request failed");

    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
}
