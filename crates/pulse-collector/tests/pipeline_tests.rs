use pulse_collector::{BufferConfig, HealthStatus, Pipeline};
use pulse_core::ShutdownHandle;
use pulse_metrics::PipelineMetrics;
use pulse_storage::{MemoryDeadLetter, MemorySink};
use pulse_types::{Event, EventMessage, Metric, MetricMessage};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    pipeline: Pipeline,
    events: Arc<MemorySink<Event>>,
    metrics: Arc<MemorySink<Metric>>,
}

fn harness(batch_size: usize, max_age_ms: u64, tick_ms: u64) -> Harness {
    let pipeline_metrics = Arc::new(PipelineMetrics::new(Duration::from_secs(300)).unwrap());
    let events = Arc::new(MemorySink::<Event>::new());
    let metrics = Arc::new(MemorySink::<Metric>::new());

    let pipeline = Pipeline::builder(pipeline_metrics)
        .buffer(BufferConfig {
            batch_size,
            max_age: Duration::from_millis(max_age_ms),
            tick_interval: Duration::from_millis(tick_ms),
        })
        .event_sink(events.clone())
        .metric_sink(metrics.clone())
        .event_dead_letter(Arc::new(MemoryDeadLetter::<Event>::new()))
        .metric_dead_letter(Arc::new(MemoryDeadLetter::<Metric>::new()))
        .health_thresholds(5000, 8000)
        .build()
        .unwrap();

    Harness {
        pipeline,
        events,
        metrics,
    }
}

fn message(i: usize) -> EventMessage {
    EventMessage::new(format!("user-{}", i), "message_sent")
}

#[tokio::test(start_paused = true)]
async fn batch_and_age_scenario() {
    let h = harness(5, 1000, 1100);
    let shutdown = ShutdownHandle::new();
    let tasks = h.pipeline.start(shutdown.listener());
    let events = h.pipeline.events();

    for i in 0..3 {
        events.ingest(message(i));
    }
    assert_eq!(events.buffer().size(), 3);
    assert_eq!(h.events.batch_count(), 0);

    // 1100ms 后定时检查触发刷新
    tokio::time::sleep(Duration::from_millis(1150)).await;
    events.buffer().wait_idle().await;
    assert_eq!(h.events.batches().len(), 1);
    assert_eq!(h.events.batches()[0].len(), 3);

    for i in 3..8 {
        events.ingest(message(i));
    }
    assert_eq!(events.buffer().size(), 0);
    events.buffer().wait_idle().await;

    let batches = h.events.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 5);

    shutdown.trigger();
    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test]
async fn shutdown_drains_both_buffers() {
    let h = harness(1000, 60_000, 60_000);
    let shutdown = ShutdownHandle::new();
    let tasks = h.pipeline.start(shutdown.listener());

    h.pipeline.events().ingest_batch((0..10).map(message));
    h.pipeline.metrics().ingest_batch(vec![
        MetricMessage::new("cpu", 0.4, "api").with_tag("instance", "api-1"),
        MetricMessage::new("cpu", 0.6, "api").with_tag("instance", "api-2"),
    ]);

    shutdown.trigger();
    for task in tasks {
        task.await.unwrap();
    }
    h.pipeline.shutdown().await;

    assert_eq!(h.events.record_count(), 10);
    assert_eq!(h.metrics.record_count(), 2);
    assert!(h.metrics.batches()[0]
        .iter()
        .all(|m| m.instance_id.as_deref().unwrap_or("").starts_with("api-")));

    let snapshot = h.pipeline.statistics();
    assert_eq!(snapshot.events.processed, 10);
    assert_eq!(snapshot.metrics.processed, 2);
    assert_eq!(snapshot.events.buffered, 0);
    assert_eq!(snapshot.active_collectors, 0);
}

#[tokio::test]
async fn statistics_snapshot_reports_buffers_and_health() {
    let h = harness(10_000, 60_000, 60_000);
    let shutdown = ShutdownHandle::new();
    let _tasks = h.pipeline.start(shutdown.listener());

    h.pipeline.events().ingest_batch((0..6000).map(message));
    h.pipeline
        .metrics()
        .ingest(MetricMessage::new("latency_ms", 12.0, "gateway"));

    let snapshot = h.pipeline.statistics();
    assert_eq!(snapshot.events.buffered, 6000);
    assert_eq!(snapshot.events.accepted, 6000);
    assert_eq!(snapshot.metrics.buffered, 1);
    assert_eq!(snapshot.active_collectors, 2);
    assert_eq!(snapshot.health.status, HealthStatus::Warning);
    assert_eq!(snapshot.health.event_buffer_size, 6000);
}

#[test]
fn builder_requires_sinks() {
    let metrics = Arc::new(PipelineMetrics::new(Duration::from_secs(60)).unwrap());
    let err = Pipeline::builder(metrics).build().err().unwrap();
    assert!(err.to_string().contains("event sink"));
}

#[test]
fn builder_rejects_zero_tick_interval() {
    let metrics = Arc::new(PipelineMetrics::new(Duration::from_secs(60)).unwrap());
    let err = Pipeline::builder(metrics)
        .buffer(BufferConfig {
            batch_size: 10,
            max_age: Duration::from_millis(1000),
            tick_interval: Duration::ZERO,
        })
        .event_sink(Arc::new(MemorySink::<Event>::new()))
        .metric_sink(Arc::new(MemorySink::<Metric>::new()))
        .event_dead_letter(Arc::new(MemoryDeadLetter::<Event>::new()))
        .metric_dead_letter(Arc::new(MemoryDeadLetter::<Metric>::new()))
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("tick interval"));
}
