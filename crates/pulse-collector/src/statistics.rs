use crate::collector::{EventCollector, MetricCollector};
use crate::health::{BufferHealth, BufferHealthChecker};
use chrono::{DateTime, Utc};
use pulse_metrics::PipelineMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 单种记录的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindStatistics {
    pub processed: u64,
    pub failed: u64,
    pub buffered: usize,
    pub accepted: u64,
}

/// 采集统计快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub events: KindStatistics,
    pub metrics: KindStatistics,
    pub active_collectors: i64,
    pub health: BufferHealth,
    pub timestamp: DateTime<Utc>,
}

/// 只读统计视图，调用时从各组件的计数器汇总
pub struct CollectorStatistics {
    events: Arc<EventCollector>,
    metrics: Arc<MetricCollector>,
    pipeline_metrics: Arc<PipelineMetrics>,
    health: BufferHealthChecker,
}

impl CollectorStatistics {
    pub fn new(
        events: Arc<EventCollector>,
        metrics: Arc<MetricCollector>,
        pipeline_metrics: Arc<PipelineMetrics>,
        health: BufferHealthChecker,
    ) -> Self {
        Self {
            events,
            metrics,
            pipeline_metrics,
            health,
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let events = self.events.statistics();
        let metrics = self.metrics.statistics();

        StatisticsSnapshot {
            health: self.health.check(events.buffered, metrics.buffered),
            active_collectors: self.pipeline_metrics.active_collectors(),
            events,
            metrics,
            timestamp: Utc::now(),
        }
    }
}
