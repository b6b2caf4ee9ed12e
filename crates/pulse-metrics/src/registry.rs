use crate::latency::LatencyWindow;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use pulse_types::RecordKind;
use std::time::Duration;
use tracing::warn;

const KIND_LABEL: &[&str] = &["kind"];

/// 采集管线指标
///
/// 显式构造后以 `Arc` 传给缓冲区、持久化服务和告警快照，不使用全局注册表。
pub struct PipelineMetrics {
    records_processed: IntCounterVec,
    records_failed: IntCounterVec,
    persist_retries: IntCounterVec,
    buffer_size: IntGaugeVec,
    collectors_active: IntGauge,
    collection_duration: HistogramVec,
    batch_size: HistogramVec,

    latency: LatencyWindow,
    registry: Registry,
}

impl PipelineMetrics {
    pub fn new(latency_window: Duration) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let records_processed = IntCounterVec::new(
            Opts::new(
                "pulse_records_processed_total",
                "Total number of records persisted",
            ),
            KIND_LABEL,
        )?;
        registry.register(Box::new(records_processed.clone()))?;

        let records_failed = IntCounterVec::new(
            Opts::new(
                "pulse_records_failed_total",
                "Total number of records that could not be persisted",
            ),
            KIND_LABEL,
        )?;
        registry.register(Box::new(records_failed.clone()))?;

        let persist_retries = IntCounterVec::new(
            Opts::new(
                "pulse_persist_retries_total",
                "Total number of batch persistence retries",
            ),
            KIND_LABEL,
        )?;
        registry.register(Box::new(persist_retries.clone()))?;

        let buffer_size = IntGaugeVec::new(
            Opts::new("pulse_buffer_size", "Number of records waiting in a buffer"),
            KIND_LABEL,
        )?;
        registry.register(Box::new(buffer_size.clone()))?;

        let collectors_active =
            IntGauge::new("pulse_collectors_active", "Number of running collectors")?;
        registry.register(Box::new(collectors_active.clone()))?;

        let collection_duration = HistogramVec::new(
            HistogramOpts::new(
                "pulse_collection_duration_seconds",
                "Wall time of one batch persistence call",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            KIND_LABEL,
        )?;
        registry.register(Box::new(collection_duration.clone()))?;

        let batch_size = HistogramVec::new(
            HistogramOpts::new("pulse_batch_size", "Number of records per flushed batch")
                .buckets(vec![1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]),
            KIND_LABEL,
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        Ok(Self {
            records_processed,
            records_failed,
            persist_retries,
            buffer_size,
            collectors_active,
            collection_duration,
            batch_size,
            latency: LatencyWindow::new(latency_window),
            registry,
        })
    }

    pub fn record_processed(&self, kind: RecordKind, count: usize) {
        self.records_processed
            .with_label_values(&[kind.as_str()])
            .inc_by(count as u64);
    }

    pub fn record_failed(&self, kind: RecordKind, count: usize) {
        self.records_failed
            .with_label_values(&[kind.as_str()])
            .inc_by(count as u64);
    }

    pub fn record_retry(&self, kind: RecordKind) {
        self.persist_retries.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn processed(&self, kind: RecordKind) -> u64 {
        self.records_processed
            .with_label_values(&[kind.as_str()])
            .get()
    }

    pub fn failed(&self, kind: RecordKind) -> u64 {
        self.records_failed.with_label_values(&[kind.as_str()]).get()
    }

    pub fn retries(&self, kind: RecordKind) -> u64 {
        self.persist_retries.with_label_values(&[kind.as_str()]).get()
    }

    pub fn total_processed(&self) -> u64 {
        self.processed(RecordKind::Event) + self.processed(RecordKind::Metric)
    }

    pub fn total_failed(&self) -> u64 {
        self.failed(RecordKind::Event) + self.failed(RecordKind::Metric)
    }

    pub fn set_buffer_size(&self, kind: RecordKind, size: usize) {
        self.buffer_size
            .with_label_values(&[kind.as_str()])
            .set(size as i64);
    }

    pub fn buffer_size(&self, kind: RecordKind) -> usize {
        self.buffer_size
            .with_label_values(&[kind.as_str()])
            .get()
            .max(0) as usize
    }

    /// 两个缓冲区中较大的占用
    pub fn max_buffer_size(&self) -> usize {
        self.buffer_size(RecordKind::Event)
            .max(self.buffer_size(RecordKind::Metric))
    }

    pub fn collector_started(&self) {
        self.collectors_active.inc();
    }

    pub fn collector_stopped(&self) {
        self.collectors_active.dec();
    }

    pub fn active_collectors(&self) -> i64 {
        self.collectors_active.get()
    }

    pub fn record_collection_duration(&self, kind: RecordKind, duration: Duration) {
        let seconds = duration.as_secs_f64();
        self.collection_duration
            .with_label_values(&[kind.as_str()])
            .observe(seconds);
        self.latency.record(seconds);
    }

    /// 最近窗口内持久化耗时的百分位（秒）
    pub fn collection_duration_percentile(&self, p: f64) -> Option<f64> {
        self.latency.percentile(p)
    }

    pub fn record_batch_size(&self, kind: RecordKind, size: usize) {
        self.batch_size
            .with_label_values(&[kind.as_str()])
            .observe(size as f64);
    }

    /// 导出 Prometheus 文本格式
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            warn!(error = %e, "Metrics export produced invalid UTF-8");
            prometheus::Error::Msg(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> PipelineMetrics {
        PipelineMetrics::new(Duration::from_secs(300)).unwrap()
    }

    #[test]
    fn test_counters_are_per_kind() {
        let metrics = metrics();
        metrics.record_processed(RecordKind::Event, 10);
        metrics.record_processed(RecordKind::Metric, 4);
        metrics.record_failed(RecordKind::Event, 2);

        assert_eq!(metrics.processed(RecordKind::Event), 10);
        assert_eq!(metrics.processed(RecordKind::Metric), 4);
        assert_eq!(metrics.failed(RecordKind::Metric), 0);
        assert_eq!(metrics.total_processed(), 14);
        assert_eq!(metrics.total_failed(), 2);
    }

    #[test]
    fn test_max_buffer_size() {
        let metrics = metrics();
        metrics.set_buffer_size(RecordKind::Event, 120);
        metrics.set_buffer_size(RecordKind::Metric, 6000);
        assert_eq!(metrics.max_buffer_size(), 6000);
    }

    #[test]
    fn test_active_collectors_gauge() {
        let metrics = metrics();
        metrics.collector_started();
        metrics.collector_started();
        metrics.collector_stopped();
        assert_eq!(metrics.active_collectors(), 1);
    }

    #[test]
    fn test_export_contains_pipeline_metrics() {
        let metrics = metrics();
        metrics.record_processed(RecordKind::Event, 3);
        metrics.record_batch_size(RecordKind::Event, 3);
        metrics.record_collection_duration(RecordKind::Event, Duration::from_millis(40));

        let text = metrics.export().unwrap();
        assert!(text.contains("pulse_records_processed_total{kind=\"events\"} 3"));
        assert!(text.contains("pulse_batch_size"));
        assert!(text.contains("pulse_collection_duration_seconds"));
        assert!(text.contains("pulse_collectors_active"));
    }

    #[test]
    fn test_collection_duration_percentile() {
        let metrics = metrics();
        assert_eq!(metrics.collection_duration_percentile(95.0), None);

        metrics.record_collection_duration(RecordKind::Metric, Duration::from_millis(500));
        metrics.record_collection_duration(RecordKind::Metric, Duration::from_secs(3));
        assert_eq!(metrics.collection_duration_percentile(95.0), Some(3.0));
    }
}
