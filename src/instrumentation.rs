//! Per-call entry point of the logging integration.
//!
//! For every host log call the instrumentation reads one configuration
//! snapshot and then, in order:
//!
//! 1. does nothing at all when application logging is disabled;
//! 2. counts the line when metrics are enabled;
//! 3. when forwarding is enabled, annotates a copy of the record, serializes
//!    it and routes it to the active transaction's hold, or straight to the
//!    aggregator outside of a transaction;
//! 4. otherwise, when local decorating is enabled, appends the linking block
//!    to the record's message.
//!
//! The forwarding capacity is taken from the same snapshot, so a stored
//! configuration resizes the aggregator on the next forwarded line.
//!
//! Forwarding wins over decorating, so a forwarded line never carries the
//! decoration. Nothing here is cached per logger: child loggers go through
//! the same steps and see the transaction that is active at call time.

use crate::aggregator::LogAggregator;
use crate::annotate::annotate;
use crate::config::ConfigHandle;
use crate::decorate::decorate;
use crate::hold::{Ended, TransactionHold};
use crate::metadata::LinkingContext;
use crate::metrics::{MetricsRecorder, MetricsStore};
use crate::record::LogRecord;
use crate::transaction::Transaction;
use std::sync::Arc;
use tracing::debug;

/// Failure while handling one record. Never surfaces to the log call site.
#[derive(thiserror::Error, Debug)]
pub enum InstrumentationError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What happened to one record, mostly useful to tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Application logging disabled; the record was not touched.
    PassThrough,
    /// Forwarded line parked until the transaction ends.
    Held,
    /// Forwarded line recorded in the aggregator.
    Forwarded,
    /// Message text decorated in place.
    Decorated,
    /// Enabled, but neither forwarding nor decorating is on.
    Ignored,
}

pub struct LogInstrumentation {
    config: ConfigHandle,
    context: Arc<dyn LinkingContext>,
    aggregator: Arc<LogAggregator>,
    hold: Arc<TransactionHold>,
    metrics: MetricsRecorder,
}

impl LogInstrumentation {
    /// Wire the instrumentation and register the end-of-transaction flush
    /// with `context`.
    pub fn new(
        config: impl Into<ConfigHandle>,
        context: Arc<dyn LinkingContext>,
        aggregator: Arc<LogAggregator>,
        metrics: Arc<dyn MetricsStore>,
    ) -> Self {
        let hold = Arc::new(TransactionHold::new());

        let flush_hold = Arc::clone(&hold);
        let flush_into = Arc::clone(&aggregator);
        context.on_transaction_end(Box::new(move |transaction: &Transaction| {
            let flushed = flush_hold.flush(transaction.id(), &flush_into);
            if flushed > 0 {
                debug!(
                    target: crate::DIAGNOSTICS_TARGET,
                    transaction = transaction.id().as_u64(),
                    flushed,
                    "flushed held log lines"
                );
            }
        }));

        Self {
            config: config.into(),
            context,
            aggregator,
            hold,
            metrics: MetricsRecorder::new(metrics),
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn aggregator(&self) -> &Arc<LogAggregator> {
        &self.aggregator
    }

    pub fn hold(&self) -> &Arc<TransactionHold> {
        &self.hold
    }

    /// Hook for the host logger. Failures are logged on the diagnostics
    /// target and swallowed.
    pub fn on_log_record(&self, record: &mut LogRecord) {
        if let Err(err) = self.process(record) {
            debug!(
                target: crate::DIAGNOSTICS_TARGET,
                error = %err,
                "log record left unenriched"
            );
        }
    }

    /// Same as [`Self::on_log_record`] but reports what was done.
    pub fn process(&self, record: &mut LogRecord) -> Result<Disposition, InstrumentationError> {
        let config = self.config.load();
        if !config.enabled {
            return Ok(Disposition::PassThrough);
        }

        let transaction = self.context.active_transaction();
        let metadata = self.context.linking_metadata(transaction.as_ref());

        if config.metrics.enabled {
            self.metrics.tally(&record.level);
        }

        if config.forwarding.enabled {
            self.aggregator
                .set_capacity(config.forwarding.max_samples_stored);
            let line = annotate(record, &metadata).to_json_line()?;
            return Ok(self.forward(transaction.as_ref(), line));
        }

        if config.local_decorating.enabled {
            decorate(record, &metadata);
            return Ok(Disposition::Decorated);
        }

        Ok(Disposition::Ignored)
    }

    fn forward(&self, transaction: Option<&Transaction>, line: String) -> Disposition {
        let Some(transaction) = transaction else {
            self.aggregator.record(line);
            return Disposition::Forwarded;
        };

        match self.hold.append(transaction, line) {
            Ok(()) => Disposition::Held,
            Err(Ended(line)) => {
                // The transaction ended between lookup and append.
                self.aggregator.record(line);
                Disposition::Forwarded
            }
        }
    }
}
