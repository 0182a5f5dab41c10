use crate::sink::LogSink;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;

/// Configuration for [`LogApiSink`].
#[derive(Clone, Debug)]
pub struct LogApiConfig {
    /// Intake URL, e.g. "https://log-api.example.com/log/v1".
    pub url: String,
    /// Sent as the `Api-Key` header when present.
    pub api_key: Option<String>,
}

/// HTTP log intake sink. Each batch is posted as one JSON array whose
/// elements are the forwarded lines.
#[derive(Clone)]
pub struct LogApiSink {
    client: Client,
    config: LogApiConfig,
}

impl LogApiSink {
    pub fn new(config: LogApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn body(batch: &[String]) -> String {
        let mut body = String::with_capacity(batch.iter().map(String::len).sum::<usize>() + 2);
        body.push('[');
        for (i, line) in batch.iter().enumerate() {
            if i > 0 {
                body.push(',');
            }
            body.push_str(line.trim_end_matches('\n'));
        }
        body.push(']');
        body
    }
}

#[async_trait]
impl LogSink for LogApiSink {
    async fn send(&self, batch: &[String]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut request = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .body(Self::body(batch));
        if let Some(key) = &self.config.api_key {
            request = request.header("Api-Key", key);
        }

        let resp = request.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("log intake rejected batch with status {}: {}", status, text).into())
        }
    }
}
