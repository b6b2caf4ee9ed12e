use crate::record::{Record, RecordKind, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// 事件类型最大长度
pub const MAX_EVENT_TYPE_LEN: usize = 100;

/// 写入 payload 的来源标识
pub const EVENT_SOURCE: &str = "pulse-collector";

/// 事件维度标签
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDimensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl EventDimensions {
    /// 从生产者的 metadata 中提取维度
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let get = |key: &str| metadata.get(key).cloned();
        Self {
            device_type: get("device_type"),
            platform: get("platform"),
            app_version: get("app_version"),
            ip_address: get("ip_address"),
            country: get("country"),
            city: get("city"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// 用户行为事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub user_id: String,
    pub event_type: String,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "EventDimensions::is_empty")]
    pub dimensions: EventDimensions,
}

impl Event {
    pub fn new(user_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            event_type: event_type.into(),
            payload: HashMap::new(),
            timestamp: Utc::now(),
            session_id: None,
            dimensions: EventDimensions::default(),
        }
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Record for Event {
    const KIND: RecordKind = RecordKind::Event;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }

        let event_type = self.event_type.trim();
        if event_type.is_empty() {
            return Err(ValidationError::MissingField("event_type"));
        }

        let len = event_type.chars().count();
        if len > MAX_EVENT_TYPE_LEN {
            return Err(ValidationError::TooLong {
                field: "event_type",
                len,
                max: MAX_EVENT_TYPE_LEN,
            });
        }

        Ok(())
    }

    fn enrich(&mut self) {
        self.payload
            .entry("recorded_at".to_string())
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        self.payload
            .entry("source".to_string())
            .or_insert_with(|| Value::String(EVENT_SOURCE.to_string()));
    }
}

/// 生产者投递的原始事件消息
///
/// `event_id` 和 `timestamp` 可以缺省，转换为 [`Event`] 时由采集端补齐。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub event_id: Option<Uuid>,
    pub user_id: String,
    pub event_type: String,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl EventMessage {
    pub fn new(user_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: None,
            user_id: user_id.into(),
            event_type: event_type.into(),
            payload: HashMap::new(),
            timestamp: None,
            session_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<EventMessage> for Event {
    fn from(message: EventMessage) -> Self {
        let dimensions = EventDimensions::from_metadata(&message.metadata);
        Self {
            id: message.event_id.unwrap_or_else(Uuid::new_v4),
            user_id: message.user_id,
            event_type: message.event_type,
            payload: message.payload,
            timestamp: message.timestamp.unwrap_or_else(Utc::now),
            session_id: message.session_id,
            dimensions,
        }
    }
}
