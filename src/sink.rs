use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for harvested log lines.
///
/// Implementations transport a batch of forwarded lines (one JSON object
/// per line, newline-terminated) to a log intake. The harvester calls `send`
/// from a background task and never from an application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send one batch of lines.
    ///
    /// **Returns**
    /// - `Ok(())` if the batch was accepted by the backend.
    /// - `Err(..)` if the backend failed (network error, HTTP status, etc.).
    ///   The harvester treats this as transient and retries with backoff.
    async fn send(&self, batch: &[String]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered data, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
