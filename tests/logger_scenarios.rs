use apm_log_enrichment::config::LoggingConfig;
use apm_log_enrichment::decorate::{parse_linking_suffix, LINKING_MARKER};
use apm_log_enrichment::fields;
use apm_log_enrichment::init::LoggingPipeline;
use apm_log_enrichment::level::Level;
use apm_log_enrichment::logger::{Logger, MemoryDestination};
use apm_log_enrichment::metrics::{InMemoryMetrics, LINES_METRIC};
use apm_log_enrichment::transaction::AgentIdentity;
use serde_json::Value;
use std::sync::Arc;

struct Setup {
    pipeline: LoggingPipeline,
    metrics: Arc<InMemoryMetrics>,
    destination: Arc<MemoryDestination>,
    logger: Logger,
}

fn setup(config: LoggingConfig) -> Setup {
    let metrics = Arc::new(InMemoryMetrics::new());
    let identity = AgentIdentity::new("pino-app", "pino-guid").with_hostname("pino-host");
    let pipeline = LoggingPipeline::with_metrics(identity, config, metrics.clone());
    let destination = Arc::new(MemoryDestination::new());
    let logger = pipeline.logger(destination.clone()).with_level(Level::Trace);
    Setup {
        pipeline,
        metrics,
        destination,
        logger,
    }
}

fn config(forwarding: bool, decorating: bool, metrics: bool) -> LoggingConfig {
    let mut config = LoggingConfig::default();
    config.enabled = true;
    config.forwarding.enabled = forwarding;
    config.local_decorating.enabled = decorating;
    config.metrics.enabled = metrics;
    config
}

fn events(setup: &Setup) -> Vec<Value> {
    setup
        .pipeline
        .aggregator
        .drain_all()
        .iter()
        .map(|line| {
            assert!(line.ends_with('\n'));
            serde_json::from_str(line).unwrap()
        })
        .collect()
}

#[test]
fn disabled_logging_is_not_enriched() {
    for (forwarding, decorating, metrics) in [(false, false, false), (true, true, true)] {
        let mut cfg = config(forwarding, decorating, metrics);
        cfg.enabled = false;
        let s = setup(cfg);

        s.logger.info("logs are not enriched");

        let record = &s.destination.records()[0];
        assert_eq!(record["message"], "logs are not enriched");
        assert_eq!(record["level"], 30);
        assert_eq!(record["hostname"], Value::String(apm_log_enrichment::transaction::detect_hostname()));
        let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
        assert!(keys
            .iter()
            .all(|k| !k.starts_with("entity.") && !k.starts_with("trace.") && !k.starts_with("span.")));
        assert!(s.metrics.get(LINES_METRIC).is_none());
        assert!(s.pipeline.aggregator.is_empty());
    }
}

#[test]
fn forwarding_outside_a_transaction() {
    let s = setup(config(true, false, false));

    s.logger.info("pino unit test");

    let events = events(&s);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["entity.guid"], "pino-guid");
    assert_eq!(event["entity.name"], "pino-app");
    assert_eq!(event["entity.type"], "SERVICE");
    assert_eq!(event["hostname"], "pino-host");
    assert_eq!(event["message"], "pino unit test");
    assert_eq!(event["level"], "info");
    assert_eq!(event["timestamp"].as_i64().unwrap().to_string().len(), 10);
    assert!(event.get("time").is_none());
    assert!(event.get("trace.id").is_none());
    assert!(s.metrics.get(LINES_METRIC).is_none());

    // host output keeps its own shape
    let written = &s.destination.records()[0];
    assert_eq!(written["level"], 30);
    assert!(written.get("entity.guid").is_none());
}

#[test]
fn forwarding_wins_when_decorating_is_also_enabled() {
    let s = setup(config(true, true, false));

    s.logger.warn("both destinations");

    let written = &s.destination.records()[0];
    assert_eq!(written["message"], "both destinations");
    let events = events(&s);
    assert_eq!(events.len(), 1);
    assert!(!events[0]["message"].as_str().unwrap().contains(LINKING_MARKER));
}

#[test]
fn decorating_rewrites_host_output_only() {
    let s = setup(config(false, true, false));
    let transaction = s.pipeline.tracer.start_transaction("web");

    s.pipeline.tracer.in_transaction(&transaction, || {
        s.logger.info("decorated line");
    });

    let written = &s.destination.records()[0];
    let message = written["message"].as_str().unwrap();
    assert!(message.starts_with("decorated line NR-LINKING|"));
    let linking = parse_linking_suffix(message).unwrap();
    assert_eq!(linking.entity_guid, "pino-guid");
    assert_eq!(linking.trace_id, transaction.trace_id());
    assert_eq!(linking.span_id, transaction.span_id());
    assert!(written.get("entity.guid").is_none());
    assert!(s.pipeline.aggregator.is_empty());
}

#[test]
fn parent_and_child_lines_are_held_until_the_transaction_ends() {
    let s = setup(config(true, false, false));
    let transaction = s.pipeline.tracer.start_transaction("web");

    s.pipeline.tracer.in_transaction(&transaction, || {
        s.logger.info("parent line");
        let child = s.logger.child(fields! { "module" => "billing" });
        child.info("child line");
        assert_eq!(s.pipeline.aggregator.count(), 0);
        transaction.end();
    });

    let events = events(&s);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["message"], "parent line");
    assert_eq!(events[1]["message"], "child line");
    assert_eq!(events[1]["module"], "billing");
    assert_eq!(events[0]["trace.id"], events[1]["trace.id"]);
    assert_eq!(events[0]["span.id"], events[1]["span.id"]);
    assert_eq!(events[0]["trace.id"], transaction.trace_id());
}

#[test]
fn metrics_count_every_level_inside_a_transaction() {
    let s = setup(config(false, false, true));
    let transaction = s.pipeline.tracer.start_transaction("batch");

    s.pipeline.tracer.in_transaction(&transaction, || {
        for _ in 0..20 {
            s.logger.debug("debug");
        }
        for _ in 0..5 {
            s.logger.info("info");
        }
        for _ in 0..3 {
            s.logger.warn("warn");
        }
        for _ in 0..2 {
            s.logger.error("error");
        }
    });
    transaction.end();

    assert_eq!(s.metrics.get("Logging/lines/DEBUG"), Some(20));
    assert_eq!(s.metrics.get("Logging/lines/INFO"), Some(5));
    assert_eq!(s.metrics.get("Logging/lines/WARN"), Some(3));
    assert_eq!(s.metrics.get("Logging/lines/ERROR"), Some(2));
    assert_eq!(s.metrics.get(LINES_METRIC), Some(30));
}

#[test]
fn errors_are_forwarded_as_flattened_fields() {
    let s = setup(config(true, false, false));
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");

    s.logger.error_with(&err, "startup failed");

    let events = events(&s);
    let event = &events[0];
    assert_eq!(event["error.class"], "Error");
    assert_eq!(event["error.message"], "config missing");
    assert!(event["error.stack"].as_str().unwrap().contains("config missing"));
    assert!(event.get("err").is_none());
    assert_eq!(event["level"], "error");
}

#[test]
fn transactions_on_other_threads_do_not_leak() {
    let s = setup(config(true, false, false));
    let transaction = s.pipeline.tracer.start_transaction("web");
    let _entered = transaction.enter();

    let logger = s.logger.clone();
    std::thread::spawn(move || logger.info("background"))
        .join()
        .unwrap();

    let events = events(&s);
    assert_eq!(events.len(), 1);
    assert!(events[0].get("trace.id").is_none());
    transaction.end();
}

#[test]
fn concurrent_transactions_keep_their_own_lines() {
    let s = setup(config(true, false, false));
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let logger = s.logger.clone();
            let tracer = Arc::clone(&s.pipeline.tracer);
            std::thread::spawn(move || {
                let transaction = tracer.start_transaction(format!("worker-{worker}"));
                tracer.in_transaction(&transaction, || {
                    for i in 0..25 {
                        logger.info(format!("{worker}-{i}"));
                    }
                });
                transaction.end();
                transaction.trace_id().to_string()
            })
        })
        .collect();
    let trace_ids: Vec<String> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let events = events(&s);
    assert_eq!(events.len(), 100);
    for (worker, trace_id) in trace_ids.iter().enumerate() {
        let lines: Vec<&Value> = events.iter().filter(|e| e["trace.id"] == *trace_id.as_str()).collect();
        assert_eq!(lines.len(), 25);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line["message"], format!("{worker}-{i}"));
        }
    }
}

#[test]
fn ending_a_transaction_while_threads_log_into_it_loses_nothing() {
    const THREADS: usize = 4;
    const LINES: usize = 50;

    for _ in 0..20 {
        let s = setup(config(true, false, false));
        let transaction = s.pipeline.tracer.start_transaction("shared");
        let start = Arc::new(std::sync::Barrier::new(THREADS + 1));

        let workers: Vec<_> = (0..THREADS)
            .map(|worker| {
                let logger = s.logger.clone();
                let tracer = Arc::clone(&s.pipeline.tracer);
                let transaction = transaction.clone();
                let start = Arc::clone(&start);
                std::thread::spawn(move || {
                    tracer.in_transaction(&transaction, || {
                        start.wait();
                        for i in 0..LINES {
                            logger.info(format!("{worker}-{i}"));
                        }
                    });
                })
            })
            .collect();

        start.wait();
        transaction.end();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(s.pipeline.aggregator.count(), THREADS * LINES);
        assert_eq!(s.pipeline.instrumentation.hold().open_transactions(), 0);
        assert_eq!(s.pipeline.instrumentation.hold().pending(transaction.id()), 0);

        let mut messages: Vec<String> = events(&s)
            .iter()
            .map(|e| e["message"].as_str().unwrap().to_string())
            .collect();
        messages.sort();
        let mut expected: Vec<String> = (0..THREADS)
            .flat_map(|worker| (0..LINES).map(move |i| format!("{worker}-{i}")))
            .collect();
        expected.sort();
        assert_eq!(messages, expected);
    }
}
