use crate::instrumentation::LogInstrumentation;
use crate::level::Level;
use crate::record::{ErrorValue, LogRecord};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that feeds every event through the log
/// instrumentation.
///
/// Span fields play the role of child-logger bindings: they are merged
/// root to leaf (the innermost span wins) underneath the event's own
/// fields. Events on [`crate::DIAGNOSTICS_TARGET`] are ignored so internal
/// diagnostics never loop back into the aggregator.
///
/// Local decoration rewrites the record built here, not the text other
/// layers print, so it has no visible effect for `tracing` events.
pub struct LogForwardingLayer {
    instrumentation: Arc<LogInstrumentation>,
    /// Total events handed to the instrumentation.
    pub total_events: Arc<AtomicU64>,
}

impl LogForwardingLayer {
    pub fn new(instrumentation: Arc<LogInstrumentation>) -> Self {
        Self {
            instrumentation,
            total_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Fields recorded on a span, stored in its extensions.
#[derive(Debug, Default)]
struct SpanBindings(BTreeMap<String, serde_json::Value>);

impl<S> Layer<S> for LogForwardingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut bindings = SpanBindings::default();
        let (mut message, mut error) = (None, None);
        attrs.record(&mut FieldVisitor {
            fields: &mut bindings.0,
            message: &mut message,
            error: &mut error,
        });
        span.extensions_mut().insert(bindings);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(bindings) = extensions.get_mut::<SpanBindings>() {
            let (mut message, mut error) = (None, None);
            values.record(&mut FieldVisitor {
                fields: &mut bindings.0,
                message: &mut message,
                error: &mut error,
            });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == crate::DIAGNOSTICS_TARGET {
            return;
        }
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut fields = BTreeMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(bindings) = span.extensions().get::<SpanBindings>() {
                    fields.extend(bindings.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut message: Option<String> = None;
        let mut captured: Option<ErrorValue> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            error: &mut captured,
        };
        event.record(&mut visitor);

        // A plain-text `error` field still counts, but a captured `dyn Error`
        // carries its class and cause chain.
        let text_error = ERROR_FIELDS
            .iter()
            .find_map(|key| fields.remove(*key))
            .map(|value| match value {
                serde_json::Value::String(text) => ErrorValue::from_message(text),
                other => ErrorValue::from_message(other.to_string()),
            });
        let error = captured.or(text_error);

        fields.insert("target".to_string(), meta.target().into());

        let mut record = LogRecord {
            level: Level::from(*meta.level()).into(),
            message: message.unwrap_or_default(),
            time: Some(Utc::now()),
            error,
            fields,
        };
        self.instrumentation.on_log_record(&mut record);
    }
}

use tracing::field::{Field, Visit};

/// Field names whose value becomes the record's error.
const ERROR_FIELDS: [&str; 2] = ["error", "err"];

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
    /// Set by an `error`/`err` field recorded as a `dyn Error`.
    pub error: &'a mut Option<ErrorValue>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if ERROR_FIELDS.contains(&field.name()) {
            *self.error = Some(ErrorValue::from_dyn_error(value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::LogAggregator;
    use crate::config::LoggingConfig;
    use crate::metrics::InMemoryMetrics;
    use crate::transaction::{AgentIdentity, Tracer};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn setup() -> (Arc<Tracer>, Arc<LogAggregator>, Arc<InMemoryMetrics>, LogForwardingLayer) {
        let tracer = Arc::new(Tracer::new(
            AgentIdentity::new("layer-app", "layer-guid").with_hostname("layer-host"),
        ));
        let aggregator = Arc::new(LogAggregator::default());
        let metrics = Arc::new(InMemoryMetrics::new());
        let mut config = LoggingConfig::all_enabled();
        config.local_decorating.enabled = false;
        let instrumentation = Arc::new(LogInstrumentation::new(
            config,
            tracer.clone(),
            aggregator.clone(),
            metrics.clone(),
        ));
        let layer = LogForwardingLayer::new(instrumentation);
        (tracer, aggregator, metrics, layer)
    }

    #[test]
    fn forwards_events_with_span_bindings() {
        let (_tracer, aggregator, metrics, layer) = setup();
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", request_id = 7, route = "/a");
            let _guard = span.enter();
            let inner = tracing::info_span!("db", route = "/b");
            let _inner = inner.enter();
            tracing::warn!(rows = 3, "slow query");
        });

        let events = aggregator.drain_all();
        assert_eq!(events.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&events[0]).unwrap();
        assert_eq!(value["message"], "slow query");
        assert_eq!(value["level"], "warn");
        assert_eq!(value["request_id"], 7);
        assert_eq!(value["route"], "/b");
        assert_eq!(value["rows"], 3);
        assert_eq!(value["entity.guid"], "layer-guid");
        assert_eq!(metrics.get("Logging/lines/WARN"), Some(1));
    }

    #[test]
    fn error_field_becomes_error_message() {
        let (_tracer, aggregator, _metrics, layer) = setup();
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error = "connection reset", "upstream failed");
        });

        let value: serde_json::Value = serde_json::from_str(&aggregator.drain_all()[0]).unwrap();
        assert_eq!(value["error.message"], "connection reset");
        assert!(value.get("error").is_none());
    }

    #[derive(Debug)]
    struct PoolExhausted;

    impl std::fmt::Display for PoolExhausted {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("pool exhausted")
        }
    }

    impl std::error::Error for PoolExhausted {}

    #[derive(Debug)]
    struct CheckoutFailed(PoolExhausted);

    impl std::fmt::Display for CheckoutFailed {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("checkout failed")
        }
    }

    impl std::error::Error for CheckoutFailed {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn error_object_keeps_class_and_cause_chain() {
        let (_tracer, aggregator, _metrics, layer) = setup();
        let subscriber = Registry::default().with(layer);
        let err: &(dyn std::error::Error + 'static) = &CheckoutFailed(PoolExhausted);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error = err, "request failed");
        });

        let value: serde_json::Value = serde_json::from_str(&aggregator.drain_all()[0]).unwrap();
        assert_eq!(value["error.class"], "CheckoutFailed");
        assert_eq!(value["error.message"], "checkout failed");
        let stack = value["error.stack"].as_str().unwrap();
        assert!(stack.starts_with("CheckoutFailed: checkout failed"));
        assert!(stack.contains("caused by: pool exhausted"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn other_error_fields_stay_as_text() {
        let (_tracer, aggregator, _metrics, layer) = setup();
        let subscriber = Registry::default().with(layer);
        let err: &(dyn std::error::Error + 'static) = &PoolExhausted;

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(retry_cause = err, "retrying");
        });

        let value: serde_json::Value = serde_json::from_str(&aggregator.drain_all()[0]).unwrap();
        assert_eq!(value["retry_cause"], "pool exhausted");
        assert!(value.get("error.message").is_none());
    }

    #[test]
    fn own_diagnostics_are_ignored() {
        let (_tracer, aggregator, _metrics, layer) = setup();
        let total = Arc::clone(&layer.total_events);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: crate::DIAGNOSTICS_TARGET, "internal");
        });

        assert!(aggregator.is_empty());
        assert_eq!(total.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn events_inside_a_transaction_are_held() {
        let (tracer, aggregator, _metrics, layer) = setup();
        let subscriber = Registry::default().with(layer);
        let transaction = tracer.start_transaction("job");

        tracing::subscriber::with_default(subscriber, || {
            tracer.in_transaction(&transaction, || {
                tracing::info!("step one");
                tracing::info!("step two");
                assert_eq!(aggregator.count(), 0);
            });
        });
        transaction.end();

        let events = aggregator.drain_all();
        assert_eq!(events.len(), 2);
        assert!(events[0].contains("step one"));
        assert!(events[1].contains("step two"));
    }
}
