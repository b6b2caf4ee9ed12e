use crate::error::PulseError;
use async_trait::async_trait;
use pulse_types::Record;
use thiserror::Error;

/// 死信处理失败
#[derive(Debug, Clone, Error)]
#[error("dead-letter handoff failed: {0}")]
pub struct DeadLetterError(pub String);

impl From<std::io::Error> for DeadLetterError {
    fn from(err: std::io::Error) -> Self {
        DeadLetterError(err.to_string())
    }
}

impl From<serde_json::Error> for DeadLetterError {
    fn from(err: serde_json::Error) -> Self {
        DeadLetterError(err.to_string())
    }
}

/// 无法持久化的批次的兜底去处
///
/// 调用方只记录返回的错误，不会再重试；处理失败即意味着这批数据丢失。
#[async_trait]
pub trait DeadLetter<R: Record>: Send + Sync {
    async fn handle(&self, records: Vec<R>, cause: &PulseError) -> Result<(), DeadLetterError>;
}
