use async_trait::async_trait;
use pulse_types::Record;
use thiserror::Error;

/// 存储写入错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// 超时、连接重置等，重试可能成功
    #[error("transient sink failure: {0}")]
    Transient(String),

    /// 数据或结构问题，重试无意义
    #[error("permanent sink failure: {0}")]
    Permanent(String),
}

impl SinkError {
    pub fn transient(msg: impl Into<String>) -> Self {
        SinkError::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        SinkError::Permanent(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Transient(err.to_string())
    }
}

/// 分析存储适配器
#[async_trait]
pub trait PersistenceSink<R: Record>: Send + Sync {
    /// 写入整个批次，返回写入的记录数
    ///
    /// 瞬时错误时调用方会原样重试同一批次，永久错误不会重试。
    async fn persist_batch(&self, records: &[R]) -> Result<usize, SinkError>;

    /// 适配器名称，用于日志
    fn name(&self) -> &str;
}
