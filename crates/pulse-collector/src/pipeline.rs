use crate::buffer::{BufferConfig, RecordBuffer};
use crate::collector::{Collector, EventCollector, MetricCollector};
use crate::health::BufferHealthChecker;
use crate::persistence::{BatchPersistence, RetryPolicy};
use crate::statistics::{CollectorStatistics, StatisticsSnapshot};
use pulse_core::{DeadLetter, PeriodicTask, PersistenceSink, PulseError, Result, ShutdownListener};
use pulse_metrics::PipelineMetrics;
use pulse_types::{Event, Metric, Record};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// 事件与指标两条采集管线
pub struct Pipeline {
    events: Arc<EventCollector>,
    metrics: Arc<MetricCollector>,
    pipeline_metrics: Arc<PipelineMetrics>,
    statistics: CollectorStatistics,
    buffer_config: BufferConfig,
}

impl Pipeline {
    pub fn builder(pipeline_metrics: Arc<PipelineMetrics>) -> PipelineBuilder {
        PipelineBuilder::new(pipeline_metrics)
    }

    pub fn events(&self) -> &Arc<EventCollector> {
        &self.events
    }

    pub fn metrics(&self) -> &Arc<MetricCollector> {
        &self.metrics
    }

    pub fn pipeline_metrics(&self) -> &Arc<PipelineMetrics> {
        &self.pipeline_metrics
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// 启动两个采集器和各自的定时刷新任务
    pub fn start(&self, shutdown: ShutdownListener) -> Vec<JoinHandle<()>> {
        self.events.start();
        self.metrics.start();

        vec![
            Self::spawn_flush_ticker(&self.events, &self.buffer_config, shutdown.clone()),
            Self::spawn_flush_ticker(&self.metrics, &self.buffer_config, shutdown),
        ]
    }

    fn spawn_flush_ticker<R: Record>(
        collector: &Arc<Collector<R>>,
        config: &BufferConfig,
        shutdown: ShutdownListener,
    ) -> JoinHandle<()> {
        let buffer = collector.buffer().clone();
        PeriodicTask::new(format!("{}-flush", R::KIND), config.tick_interval).spawn(
            shutdown,
            move || {
                let buffer = buffer.clone();
                async move {
                    buffer.maybe_flush();
                }
            },
        )
    }

    /// 停止采集器，刷新剩余记录并等待持久化完成
    pub async fn shutdown(&self) {
        self.events.stop();
        self.metrics.stop();

        tokio::join!(self.events.buffer().drain(), self.metrics.buffer().drain());

        let snapshot = self.statistics.snapshot();
        info!(
            events_processed = snapshot.events.processed,
            events_failed = snapshot.events.failed,
            metrics_processed = snapshot.metrics.processed,
            metrics_failed = snapshot.metrics.failed,
            "Pipeline drained"
        );
    }
}

/// [`Pipeline`] 构建器
pub struct PipelineBuilder {
    pipeline_metrics: Arc<PipelineMetrics>,
    buffer: BufferConfig,
    event_retry: RetryPolicy,
    metric_retry: RetryPolicy,
    health: BufferHealthChecker,
    event_sink: Option<Arc<dyn PersistenceSink<Event>>>,
    metric_sink: Option<Arc<dyn PersistenceSink<Metric>>>,
    event_dead_letter: Option<Arc<dyn DeadLetter<Event>>>,
    metric_dead_letter: Option<Arc<dyn DeadLetter<Metric>>>,
}

impl PipelineBuilder {
    pub fn new(pipeline_metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            pipeline_metrics,
            buffer: BufferConfig::default(),
            event_retry: RetryPolicy::for_events(),
            metric_retry: RetryPolicy::for_metrics(),
            health: BufferHealthChecker::default(),
            event_sink: None,
            metric_sink: None,
            event_dead_letter: None,
            metric_dead_letter: None,
        }
    }

    pub fn buffer(mut self, config: BufferConfig) -> Self {
        self.buffer = config;
        self
    }

    pub fn event_retry(mut self, policy: RetryPolicy) -> Self {
        self.event_retry = policy;
        self
    }

    pub fn metric_retry(mut self, policy: RetryPolicy) -> Self {
        self.metric_retry = policy;
        self
    }

    pub fn health_thresholds(mut self, warning: usize, critical: usize) -> Self {
        self.health = BufferHealthChecker::new(warning, critical);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn PersistenceSink<Event>>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn metric_sink(mut self, sink: Arc<dyn PersistenceSink<Metric>>) -> Self {
        self.metric_sink = Some(sink);
        self
    }

    pub fn event_dead_letter(mut self, dead_letter: Arc<dyn DeadLetter<Event>>) -> Self {
        self.event_dead_letter = Some(dead_letter);
        self
    }

    pub fn metric_dead_letter(mut self, dead_letter: Arc<dyn DeadLetter<Metric>>) -> Self {
        self.metric_dead_letter = Some(dead_letter);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let event_sink = self
            .event_sink
            .ok_or_else(|| PulseError::Config("event sink is not configured".into()))?;
        let metric_sink = self
            .metric_sink
            .ok_or_else(|| PulseError::Config("metric sink is not configured".into()))?;
        let event_dead_letter = self
            .event_dead_letter
            .ok_or_else(|| PulseError::Config("event dead-letter is not configured".into()))?;
        let metric_dead_letter = self
            .metric_dead_letter
            .ok_or_else(|| PulseError::Config("metric dead-letter is not configured".into()))?;

        if self.buffer.batch_size == 0 {
            return Err(PulseError::Config("batch size must be greater than 0".into()));
        }
        if self.buffer.tick_interval.is_zero() {
            return Err(PulseError::Config("tick interval must be greater than 0".into()));
        }

        let events = Arc::new(Collector::new(
            "event-collector",
            Arc::new(RecordBuffer::new(
                self.buffer.clone(),
                Arc::new(BatchPersistence::new(
                    event_sink,
                    event_dead_letter,
                    self.event_retry,
                    self.pipeline_metrics.clone(),
                )),
            )),
            self.pipeline_metrics.clone(),
        ));

        let metrics = Arc::new(Collector::new(
            "metric-collector",
            Arc::new(RecordBuffer::new(
                self.buffer.clone(),
                Arc::new(BatchPersistence::new(
                    metric_sink,
                    metric_dead_letter,
                    self.metric_retry,
                    self.pipeline_metrics.clone(),
                )),
            )),
            self.pipeline_metrics.clone(),
        ));

        let statistics = CollectorStatistics::new(
            events.clone(),
            metrics.clone(),
            self.pipeline_metrics.clone(),
            self.health,
        );

        Ok(Pipeline {
            events,
            metrics,
            pipeline_metrics: self.pipeline_metrics,
            statistics,
            buffer_config: self.buffer,
        })
    }
}
