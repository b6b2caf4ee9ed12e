use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Event,
    Metric,
}

impl RecordKind {
    /// 指标标签及存储文件名使用的复数形式
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Event => "events",
            RecordKind::Metric => "metrics",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 记录校验错误（不可重试）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {field} too long: {len} > {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// 遥测记录
///
/// 缓冲区与批量持久化只依赖这个 trait，事件和指标各自实现。
pub trait Record: Clone + Send + Sync + Serialize + 'static {
    const KIND: RecordKind;

    fn timestamp(&self) -> DateTime<Utc>;

    /// 检查记录是否可以写入存储
    fn validate(&self) -> Result<(), ValidationError>;

    /// 持久化之前补全字段，默认不做任何处理
    fn enrich(&mut self) {}
}
