use crate::buffer::RecordBuffer;
use crate::statistics::KindStatistics;
use pulse_metrics::PipelineMetrics;
use pulse_types::{Event, Metric, Record};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// 采集器：一种记录的摄入入口
///
/// 消息在这里转换成记录（补齐 ID、时间戳等）后进入缓冲区。
/// `start`/`stop` 维护活动采集器指标，停止后仍然接收记录，避免丢数据。
pub struct Collector<R: Record> {
    name: String,
    buffer: Arc<RecordBuffer<R>>,
    metrics: Arc<PipelineMetrics>,
    running: AtomicBool,
    accepted: AtomicU64,
}

/// 用户事件采集器
pub type EventCollector = Collector<Event>;

/// 系统指标采集器
pub type MetricCollector = Collector<Metric>;

impl<R: Record> Collector<R> {
    pub fn new(
        name: impl Into<String>,
        buffer: Arc<RecordBuffer<R>>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            buffer,
            metrics,
            running: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &Arc<RecordBuffer<R>> {
        &self.buffer
    }

    /// 摄入一条消息
    pub fn ingest<M>(&self, message: M)
    where
        M: Into<R>,
    {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.buffer.add(message.into());
    }

    /// 批量摄入，返回接收的条数
    pub fn ingest_batch<I, M>(&self, messages: I) -> usize
    where
        I: IntoIterator<Item = M>,
        M: Into<R>,
    {
        let records: Vec<R> = messages.into_iter().map(Into::into).collect();
        let count = records.len();
        if count == 0 {
            return 0;
        }

        self.accepted.fetch_add(count as u64, Ordering::Relaxed);
        self.buffer.add_all(records);
        debug!(collector = %self.name, count, "Batch ingested");
        count
    }

    /// 标记为运行中，重复调用无效
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.metrics.collector_started();
        info!(collector = %self.name, kind = %R::KIND, "Collector started");
        true
    }

    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.metrics.collector_stopped();
        info!(collector = %self.name, kind = %R::KIND, "Collector stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn statistics(&self) -> KindStatistics {
        KindStatistics {
            processed: self.metrics.processed(R::KIND),
            failed: self.metrics.failed(R::KIND),
            buffered: self.buffer.size(),
            accepted: self.accepted(),
        }
    }
}
