use crate::registry::PipelineMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 累计错误率（百分比）
pub const ERROR_RATE: &str = "error_rate";
/// 两个缓冲区中较大的占用
pub const BUFFER_SIZE: &str = "buffer_size";
/// 窗口内持久化耗时 p95（秒）
pub const COLLECTION_DURATION_P95: &str = "collection_duration_p95";
/// 正在运行的采集器数量
pub const ACTIVE_COLLECTORS: &str = "active_collectors";

/// 读取快照失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// 当前周期没有可用的值
    #[error("metric {0} is unavailable")]
    Unavailable(String),

    #[error("unknown metric: {0}")]
    Unknown(String),
}

/// 告警引擎读取指标的入口
#[async_trait]
pub trait MetricSnapshotProvider: Send + Sync {
    async fn read(&self, metric: &str) -> Result<f64, SnapshotError>;
}

/// 基于 [`PipelineMetrics`] 的快照
pub struct RegistrySnapshot {
    metrics: Arc<PipelineMetrics>,
}

impl RegistrySnapshot {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl MetricSnapshotProvider for RegistrySnapshot {
    async fn read(&self, metric: &str) -> Result<f64, SnapshotError> {
        match metric {
            ERROR_RATE => {
                let processed = self.metrics.total_processed();
                let failed = self.metrics.total_failed();
                match (processed, failed) {
                    (0, 0) => Err(SnapshotError::Unavailable(metric.to_string())),
                    // 还没有任何成功写入，全部失败
                    (0, _) => Ok(100.0),
                    _ => Ok(failed as f64 / processed as f64 * 100.0),
                }
            }
            BUFFER_SIZE => Ok(self.metrics.max_buffer_size() as f64),
            // 窗口内没有样本说明没有慢批次
            COLLECTION_DURATION_P95 => Ok(self
                .metrics
                .collection_duration_percentile(95.0)
                .unwrap_or(0.0)),
            ACTIVE_COLLECTORS => Ok(self.metrics.active_collectors() as f64),
            other => Err(SnapshotError::Unknown(other.to_string())),
        }
    }
}
