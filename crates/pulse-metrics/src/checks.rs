use crate::alert::AlertSeverity;
use crate::snapshot;
use serde::{Deserialize, Serialize};

/// 比较方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::LessThan => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
        }
    }
}

/// 阈值规则，规则名即触发后告警的名称
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub name: String,
    pub severity: AlertSeverity,
    pub comparison: Comparison,
    pub threshold: f64,
    pub summary: String,
}

impl AlertRule {
    pub fn new(
        name: impl Into<String>,
        severity: AlertSeverity,
        comparison: Comparison,
        threshold: f64,
    ) -> Self {
        let name = name.into();
        Self {
            summary: name.clone(),
            name,
            severity,
            comparison,
            threshold,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn evaluate(&self, value: f64) -> bool {
        self.comparison.holds(value, self.threshold)
    }

    pub fn message(&self, value: f64) -> String {
        format!(
            "{}: value={:.2}, threshold={:.2}",
            self.summary, value, self.threshold
        )
    }
}

/// 检查项的规则形态
#[derive(Debug, Clone, PartialEq)]
pub enum CheckKind {
    /// 单一阈值
    Single(AlertRule),

    /// 同一指标上的多级阈值，按严重程度从高到低排列。
    /// 同一时刻最多只有一级处于活动状态。
    Tiered(Vec<AlertRule>),
}

/// 具名检查项：读取一个指标，按规则判断
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: String,
    pub metric: String,
    pub kind: CheckKind,
}

impl Check {
    pub fn single(name: impl Into<String>, metric: impl Into<String>, rule: AlertRule) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            kind: CheckKind::Single(rule),
        }
    }

    pub fn tiered(
        name: impl Into<String>,
        metric: impl Into<String>,
        tiers: Vec<AlertRule>,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            kind: CheckKind::Tiered(tiers),
        }
    }

    pub fn rules(&self) -> &[AlertRule] {
        match &self.kind {
            CheckKind::Single(rule) => std::slice::from_ref(rule),
            CheckKind::Tiered(tiers) => tiers,
        }
    }
}

/// 内置检查项的阈值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub error_rate_percent: f64,
    pub buffer_overflow: u64,
    pub buffer_high: u64,
    pub latency_p95_secs: f64,
    pub min_active_collectors: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            error_rate_percent: 5.0,
            buffer_overflow: 8000,
            buffer_high: 5000,
            latency_p95_secs: 2.0,
            min_active_collectors: 2,
        }
    }
}

/// 内置检查项：错误率、缓冲区占用、持久化延迟、采集器存活
pub fn default_checks(thresholds: &AlertThresholds) -> Vec<Check> {
    vec![
        Check::single(
            "error_rate",
            snapshot::ERROR_RATE,
            AlertRule::new(
                "high_error_rate",
                AlertSeverity::Critical,
                Comparison::GreaterThan,
                thresholds.error_rate_percent,
            )
            .with_summary("High error rate detected (%)"),
        ),
        Check::tiered(
            "buffer_occupancy",
            snapshot::BUFFER_SIZE,
            vec![
                AlertRule::new(
                    "buffer_overflow",
                    AlertSeverity::Critical,
                    Comparison::GreaterThan,
                    thresholds.buffer_overflow as f64,
                )
                .with_summary("Buffer overflow"),
                AlertRule::new(
                    "buffer_high",
                    AlertSeverity::Medium,
                    Comparison::GreaterThan,
                    thresholds.buffer_high as f64,
                )
                .with_summary("Buffer occupancy high"),
            ],
        ),
        Check::single(
            "collection_latency",
            snapshot::COLLECTION_DURATION_P95,
            AlertRule::new(
                "high_latency",
                AlertSeverity::Medium,
                Comparison::GreaterThan,
                thresholds.latency_p95_secs,
            )
            .with_summary("High collection latency, p95 seconds"),
        ),
        Check::single(
            "collectors",
            snapshot::ACTIVE_COLLECTORS,
            AlertRule::new(
                "collectors_down",
                AlertSeverity::Critical,
                Comparison::LessThan,
                thresholds.min_active_collectors as f64,
            )
            .with_summary("Low number of active collectors"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_evaluate() {
        let rule = AlertRule::new(
            "high_latency",
            AlertSeverity::Medium,
            Comparison::GreaterThan,
            2.0,
        );
        assert!(rule.evaluate(2.5));
        assert!(!rule.evaluate(2.0));

        let rule = AlertRule::new("down", AlertSeverity::Critical, Comparison::LessThan, 2.0);
        assert!(rule.evaluate(1.0));
        assert!(!rule.evaluate(2.0));
    }

    #[test]
    fn test_rule_message() {
        let rule = AlertRule::new(
            "high_error_rate",
            AlertSeverity::Critical,
            Comparison::GreaterThan,
            5.0,
        )
        .with_summary("High error rate");
        assert_eq!(rule.message(7.256), "High error rate: value=7.26, threshold=5.00");
    }

    #[test]
    fn test_default_checks() {
        let checks = default_checks(&AlertThresholds::default());
        let names: Vec<&str> = checks
            .iter()
            .flat_map(|c| c.rules())
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "high_error_rate",
                "buffer_overflow",
                "buffer_high",
                "high_latency",
                "collectors_down"
            ]
        );

        let buffer = &checks[1];
        assert_eq!(buffer.metric, snapshot::BUFFER_SIZE);
        assert_eq!(buffer.rules()[0].severity, AlertSeverity::Critical);
        assert_eq!(buffer.rules()[1].severity, AlertSeverity::Medium);
    }
}
