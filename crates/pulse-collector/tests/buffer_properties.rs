use pulse_collector::{BatchPersistence, BufferConfig, RecordBuffer, RetryPolicy};
use pulse_core::{PersistenceSink, SinkError};
use pulse_metrics::snapshot::ERROR_RATE;
use pulse_metrics::{MetricSnapshotProvider, PipelineMetrics, RegistrySnapshot};
use pulse_storage::{MemoryDeadLetter, MemorySink};
use pulse_types::{Event, RecordKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn event(i: usize) -> Event {
    Event::new(format!("user-{}", i), "page_view")
}

fn setup(
    batch_size: usize,
    max_age_ms: u64,
    sink: Arc<dyn PersistenceSink<Event>>,
) -> (Arc<RecordBuffer<Event>>, Arc<PipelineMetrics>, Arc<MemoryDeadLetter<Event>>) {
    let metrics = Arc::new(PipelineMetrics::new(Duration::from_secs(300)).unwrap());
    let dead_letter = Arc::new(MemoryDeadLetter::<Event>::new());
    let persistence = Arc::new(BatchPersistence::<Event>::new(
        sink,
        dead_letter.clone(),
        RetryPolicy::new(3, 100, 2.0),
        metrics.clone(),
    ));
    let config = BufferConfig {
        batch_size,
        max_age: Duration::from_millis(max_age_ms),
        tick_interval: Duration::from_millis(100),
    };
    (
        Arc::new(RecordBuffer::new(config, persistence)),
        metrics,
        dead_letter,
    )
}

#[tokio::test(start_paused = true)]
async fn below_threshold_nothing_is_flushed() {
    let sink = Arc::new(MemorySink::<Event>::new());
    let (buffer, _metrics, _dl) = setup(50, 1000, sink.clone());

    for n in 1..50 {
        buffer.add(event(n));
        assert_eq!(buffer.size(), n);
    }

    tokio::time::advance(Duration::from_millis(900)).await;
    assert!(!buffer.maybe_flush());
    assert_eq!(buffer.size(), 49);
    assert_eq!(buffer.flush_count(), 0);
    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test]
async fn exactly_batch_size_triggers_one_flush() {
    let sink = Arc::new(MemorySink::<Event>::new());
    let (buffer, _metrics, _dl) = setup(20, 60_000, sink.clone());

    for i in 0..19 {
        buffer.add(event(i));
    }
    assert_eq!(buffer.flush_count(), 0);

    buffer.add(event(19));
    assert_eq!(buffer.flush_count(), 1);
    assert_eq!(buffer.size(), 0);

    buffer.wait_idle().await;
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(sink.batches()[0].len(), 20);
}

#[tokio::test(start_paused = true)]
async fn single_record_flushes_after_max_age() {
    let sink = Arc::new(MemorySink::<Event>::new());
    let (buffer, _metrics, _dl) = setup(1000, 1000, sink.clone());

    buffer.add(event(0));
    tokio::time::advance(Duration::from_millis(1001)).await;

    assert!(buffer.maybe_flush());
    buffer.wait_idle().await;
    assert_eq!(sink.record_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_and_flushes_lose_nothing() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 2_500;

    let sink = Arc::new(MemorySink::<Event>::new());
    let (buffer, _metrics, _dl) = setup(64, 60_000, sink.clone());
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let flusher = {
            let buffer = buffer.clone();
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    buffer.flush();
                    std::thread::yield_now();
                }
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let buffer = buffer.clone();
                scope.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        buffer.add(event(p * PER_PRODUCER + i));
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        flusher.join().unwrap();
    });

    let remaining = buffer.size();
    buffer.wait_idle().await;

    let flushed: usize = sink.batches().iter().map(Vec::len).sum();
    assert_eq!(flushed + remaining, PRODUCERS * PER_PRODUCER);

    let mut ids: Vec<_> = sink.batches().into_iter().flatten().map(|e| e.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), flushed);
}

struct AlwaysTransient;

#[async_trait::async_trait]
impl PersistenceSink<Event> for AlwaysTransient {
    async fn persist_batch(&self, _records: &[Event]) -> Result<usize, SinkError> {
        Err(SinkError::transient("read timeout"))
    }

    fn name(&self) -> &str {
        "always-transient"
    }
}

#[tokio::test(start_paused = true)]
async fn failed_batches_are_not_reinserted() {
    let (buffer, metrics, dead_letter) = setup(5, 60_000, Arc::new(AlwaysTransient));

    buffer.add_all((0..5).map(event));
    buffer.add(event(99));
    buffer.wait_idle().await;

    assert_eq!(buffer.size(), 1);
    assert_eq!(dead_letter.call_count(), 1);
    assert_eq!(dead_letter.record_count(), 5);
    assert_eq!(metrics.failed(RecordKind::Event), 5);
    assert_eq!(metrics.retries(RecordKind::Event), 2);
}

#[tokio::test(start_paused = true)]
async fn error_rate_is_full_when_every_batch_fails() {
    let (buffer, metrics, _dl) = setup(5, 60_000, Arc::new(AlwaysTransient));

    buffer.add_all((0..50).map(event));
    buffer.wait_idle().await;

    assert_eq!(metrics.processed(RecordKind::Event), 0);
    assert_eq!(metrics.failed(RecordKind::Event), 50);

    let snapshot = RegistrySnapshot::new(metrics);
    assert_eq!(snapshot.read(ERROR_RATE).await, Ok(100.0));
}

/// 记录同时进行中的写入数的慢存储
struct SlowSink {
    current: AtomicUsize,
    peak: AtomicUsize,
    records: AtomicUsize,
}

#[async_trait::async_trait]
impl PersistenceSink<Event> for SlowSink {
    async fn persist_batch(&self, records: &[Event]) -> Result<usize, SinkError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;

        self.records.fetch_add(records.len(), Ordering::SeqCst);
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(records.len())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_persist_in_flight_per_buffer() {
    let sink = Arc::new(SlowSink {
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        records: AtomicUsize::new(0),
    });
    let (buffer, _metrics, _dl) = setup(2, 60_000, sink.clone());

    for i in 0..40 {
        buffer.add(event(i));
    }
    assert_eq!(buffer.flush_count(), 20);

    buffer.wait_idle().await;
    assert_eq!(sink.records.load(Ordering::SeqCst), 40);
    assert_eq!(sink.peak.load(Ordering::SeqCst), 1);
}
