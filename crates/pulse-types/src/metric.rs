use crate::record::{Record, RecordKind, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 系统指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, service_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            tags: BTreeMap::new(),
            timestamp: Utc::now(),
            service_name: service_name.into(),
            instance_id: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Record for Metric {
    const KIND: RecordKind = RecordKind::Metric;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if !self.value.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "value",
                reason: format!("{} is not a finite number", self.value),
            });
        }
        Ok(())
    }
}

/// 生产者投递的原始指标消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMessage {
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub service_name: String,
}

impl MetricMessage {
    pub fn new(metric_name: impl Into<String>, value: f64, service_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            value,
            tags: BTreeMap::new(),
            timestamp: None,
            service_name: service_name.into(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl From<MetricMessage> for Metric {
    fn from(message: MetricMessage) -> Self {
        // 实例 ID 由 "instance" 标签携带
        let instance_id = message.tags.get("instance").cloned();
        Self {
            name: message.metric_name,
            value: message.value,
            tags: message.tags,
            timestamp: message.timestamp.unwrap_or_else(Utc::now),
            service_name: message.service_name,
            instance_id,
        }
    }
}
