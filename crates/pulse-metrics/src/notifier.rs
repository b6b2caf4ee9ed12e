use crate::alert::{Alert, AlertSeverity};
use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 通知错误
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// 告警状态变化的接收方
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn on_trigger(&self, alert: &Alert) -> Result<(), NotifierError>;
    async fn on_resolve(&self, alert: &Alert) -> Result<(), NotifierError>;
    fn name(&self) -> &str;
}

/// 生成 Slack 风格的告警文本
pub fn format_trigger_message(service: &str, alert: &Alert) -> String {
    format!(
        "🚨 *{} Alert*\n*Service:* {}\n*Message:* {}\n*Metric:* {}\n*Value:* {:.2} (threshold: {:.2})\n*Time:* {}",
        alert.severity,
        service,
        alert.message,
        alert.trigger_metric,
        alert.trigger_value,
        alert.threshold,
        alert.triggered_at.to_rfc3339()
    )
}

pub fn format_resolve_message(service: &str, alert: &Alert) -> String {
    let resolved_at = alert
        .resolved_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "✅ *Resolved: {}*\n*Service:* {}\n*Triggered:* {}\n*Resolved:* {}",
        alert.name,
        service,
        alert.triggered_at.to_rfc3339(),
        resolved_at
    )
}

/// 把告警写入日志
pub struct LogDispatcher {
    service_name: String,
}

impl LogDispatcher {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn on_trigger(&self, alert: &Alert) -> Result<(), NotifierError> {
        let text = format_trigger_message(&self.service_name, alert);
        if alert.severity >= AlertSeverity::High {
            error!(alert = %alert.name, "{}", text);
        } else {
            warn!(alert = %alert.name, "{}", text);
        }
        Ok(())
    }

    async fn on_resolve(&self, alert: &Alert) -> Result<(), NotifierError> {
        info!(alert = %alert.name, "{}", format_resolve_message(&self.service_name, alert));
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    service: &'a str,
    text: String,
    alert: &'a Alert,
}

/// 解析 webhook 地址，只接受带主机名的 http(s) 地址
pub fn parse_webhook_url(url: &str) -> Result<Url, NotifierError> {
    let parsed = Url::parse(url)
        .map_err(|e| NotifierError::ConfigError(format!("invalid webhook url {:?}: {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(NotifierError::ConfigError(format!(
            "webhook url must be http(s) with a host: {}",
            url
        )));
    }
    Ok(parsed)
}

/// Webhook 通知器
pub struct WebhookDispatcher {
    url: Url,
    service_name: String,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(url: &str, service_name: impl Into<String>) -> Result<Self, NotifierError> {
        Ok(Self {
            url: parse_webhook_url(url)?,
            service_name: service_name.into(),
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<(), NotifierError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| NotifierError::SerializationError(e.to_string()))?;

        self.client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| NotifierError::HttpError(e.to_string()))?
            .error_for_status()
            .map_err(|e| NotifierError::HttpError(e.to_string()))?;

        info!(url = %self.url, event = payload.event, alert = %payload.alert.name, "Webhook notification sent");
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn on_trigger(&self, alert: &Alert) -> Result<(), NotifierError> {
        self.post(&WebhookPayload {
            event: "trigger",
            service: &self.service_name,
            text: format_trigger_message(&self.service_name, alert),
            alert,
        })
        .await
    }

    async fn on_resolve(&self, alert: &Alert) -> Result<(), NotifierError> {
        self.post(&WebhookPayload {
            event: "resolve",
            service: &self.service_name,
            text: format_resolve_message(&self.service_name, alert),
            alert,
        })
        .await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// 多渠道分发，单个渠道失败只记录日志
#[derive(Default)]
pub struct DispatcherSet {
    dispatchers: Vec<Arc<dyn NotificationDispatcher>>,
}

impl DispatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dispatcher: Arc<dyn NotificationDispatcher>) {
        info!(dispatcher = dispatcher.name(), "Adding notification dispatcher");
        self.dispatchers.push(dispatcher);
    }

    pub fn with(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.add(dispatcher);
        self
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

#[async_trait]
impl NotificationDispatcher for DispatcherSet {
    async fn on_trigger(&self, alert: &Alert) -> Result<(), NotifierError> {
        for dispatcher in &self.dispatchers {
            if let Err(e) = dispatcher.on_trigger(alert).await {
                error!(dispatcher = dispatcher.name(), alert = %alert.name, error = %e, "Failed to dispatch alert trigger");
            }
        }
        Ok(())
    }

    async fn on_resolve(&self, alert: &Alert) -> Result<(), NotifierError> {
        for dispatcher in &self.dispatchers {
            if let Err(e) = dispatcher.on_resolve(alert).await {
                error!(dispatcher = dispatcher.name(), alert = %alert.name, error = %e, "Failed to dispatch alert resolve");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "set"
    }
}
