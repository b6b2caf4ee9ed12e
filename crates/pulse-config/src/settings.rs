use anyhow::{anyhow, Result};
use pulse_collector::{BufferConfig, RetryPolicy};
use pulse_metrics::{parse_webhook_url, AlertThresholds};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 完整配置，所有字段都有默认值
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PulseConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub buffer: BufferSection,
    pub retry: RetrySection,
    pub alerts: AlertsConfig,
    pub storage: StorageConfig,
    pub notify: NotifyConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9464,
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 语法，RUST_LOG 优先
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// 缓冲区配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferSection {
    pub batch_size: usize,
    pub max_age_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_age_ms: 5000,
            tick_interval_ms: 5000,
        }
    }
}

impl BufferSection {
    pub fn to_buffer_config(&self) -> BufferConfig {
        BufferConfig {
            batch_size: self.batch_size,
            max_age: Duration::from_millis(self.max_age_ms),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }
}

/// 重试参数覆盖，未设置的字段沿用该记录类型的默认值
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl RetryOverrides {
    pub fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            base_delay_ms: self.base_delay_ms.unwrap_or(base.base_delay_ms),
            multiplier: self.multiplier.unwrap_or(base.multiplier),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
        }
    }
}

/// 按记录类型的重试配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySection {
    pub events: RetryOverrides,
    pub metrics: RetryOverrides,
}

impl RetrySection {
    pub fn events_policy(&self) -> RetryPolicy {
        self.events.apply(RetryPolicy::for_events())
    }

    pub fn metrics_policy(&self) -> RetryPolicy {
        self.metrics.apply(RetryPolicy::for_metrics())
    }
}

/// 告警配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub evaluation_interval_secs: u64,
    /// p95 延迟的统计窗口
    pub latency_window_secs: u64,
    pub service_name: String,
    pub error_rate_percent: f64,
    pub buffer_overflow: u64,
    pub buffer_high: u64,
    pub latency_p95_secs: f64,
    pub min_active_collectors: u32,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        let thresholds = AlertThresholds::default();
        Self {
            evaluation_interval_secs: 60,
            latency_window_secs: 300,
            service_name: "pulse-collector".to_string(),
            error_rate_percent: thresholds.error_rate_percent,
            buffer_overflow: thresholds.buffer_overflow,
            buffer_high: thresholds.buffer_high,
            latency_p95_secs: thresholds.latency_p95_secs,
            min_active_collectors: thresholds.min_active_collectors,
        }
    }
}

impl AlertsConfig {
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            error_rate_percent: self.error_rate_percent,
            buffer_overflow: self.buffer_overflow,
            buffer_high: self.buffer_high,
            latency_p95_secs: self.latency_p95_secs,
            min_active_collectors: self.min_active_collectors,
        }
    }

    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    pub fn latency_window(&self) -> Duration {
        Duration::from_secs(self.latency_window_secs)
    }
}

/// 本地存储目录
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub dead_letter_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            dead_letter_dir: PathBuf::from("./data/dead-letter"),
        }
    }
}

/// 通知渠道
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl PulseConfig {
    /// 检查取值范围
    pub fn validate(&self) -> Result<()> {
        if self.buffer.batch_size == 0 {
            return Err(anyhow!("buffer.batch_size must be greater than 0"));
        }
        if self.buffer.tick_interval_ms == 0 {
            return Err(anyhow!("buffer.tick_interval_ms must be greater than 0"));
        }

        for (kind, policy) in [
            ("events", self.retry.events_policy()),
            ("metrics", self.retry.metrics_policy()),
        ] {
            if policy.max_attempts == 0 {
                return Err(anyhow!("retry.{}.max_attempts must be at least 1", kind));
            }
            if policy.multiplier.is_nan() || policy.multiplier < 1.0 {
                return Err(anyhow!(
                    "retry.{}.multiplier must be >= 1.0, got {}",
                    kind,
                    policy.multiplier
                ));
            }
        }

        if self.alerts.evaluation_interval_secs == 0 {
            return Err(anyhow!("alerts.evaluation_interval_secs must be greater than 0"));
        }
        if self.alerts.buffer_high >= self.alerts.buffer_overflow {
            return Err(anyhow!(
                "alerts.buffer_high ({}) must be lower than alerts.buffer_overflow ({})",
                self.alerts.buffer_high,
                self.alerts.buffer_overflow
            ));
        }

        if let Some(url) = &self.notify.webhook_url {
            parse_webhook_url(url).map_err(|e| anyhow!("notify.webhook_url: {}", e))?;
        }

        Ok(())
    }

    /// 以 TOML 输出当前生效的配置
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
