use crate::traits::sink::SinkError;
use pulse_types::ValidationError;
use thiserror::Error;

/// Pulse 统一错误类型
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: SinkError,
    },

    #[error("Batch rejected: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PulseError>;
