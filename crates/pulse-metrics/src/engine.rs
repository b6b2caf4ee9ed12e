use crate::alert::Alert;
use crate::checks::{AlertRule, Check, CheckKind};
use crate::notifier::NotificationDispatcher;
use crate::snapshot::MetricSnapshotProvider;
use pulse_core::{PeriodicTask, ShutdownListener};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 一次评估产生的状态变化
#[derive(Debug, Clone, PartialEq)]
pub enum AlertTransition {
    Triggered(Alert),
    Resolved(Alert),
}

impl AlertTransition {
    pub fn alert(&self) -> &Alert {
        match self {
            AlertTransition::Triggered(alert) | AlertTransition::Resolved(alert) => alert,
        }
    }
}

/// 告警引擎
///
/// 每个告警名对应 `QUIESCENT`（不在活动集合中）和 `ACTIVE` 两种状态。
/// 条件持续为真时不会重复触发，条件为假时才会解除。
/// 活动集合只在成员检查和修改时加锁，通知在锁外发送。
pub struct AlertEngine {
    checks: Vec<Check>,
    provider: Arc<dyn MetricSnapshotProvider>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    active_alerts: RwLock<HashMap<String, Alert>>,
    labels: HashMap<String, String>,
}

impl AlertEngine {
    pub fn new(
        checks: Vec<Check>,
        provider: Arc<dyn MetricSnapshotProvider>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            checks,
            provider,
            dispatcher,
            active_alerts: RwLock::new(HashMap::new()),
            labels: HashMap::new(),
        }
    }

    /// 附加到每个告警上的标签
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// 评估所有检查项并发送通知
    ///
    /// 单个检查项读取失败只跳过该项。通知失败不会回滚状态变化。
    pub async fn evaluate(&self) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();

        for check in &self.checks {
            let value = match self.provider.read(&check.metric).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(check = %check.name, metric = %check.metric, error = %e, "Skipping alert check");
                    continue;
                }
            };

            debug!(check = %check.name, value, "Evaluated alert check");

            let mut active = self.active_alerts.write().await;
            transitions.extend(self.apply(&mut active, check, value));
        }

        for transition in &transitions {
            self.dispatch(transition).await;
        }

        transitions
    }

    fn apply(
        &self,
        active: &mut HashMap<String, Alert>,
        check: &Check,
        value: f64,
    ) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();

        match &check.kind {
            CheckKind::Single(rule) => {
                if rule.evaluate(value) {
                    transitions.extend(self.trigger(active, check, rule, value));
                } else {
                    transitions.extend(Self::resolve(active, &rule.name));
                }
            }
            CheckKind::Tiered(tiers) => match tiers.iter().position(|rule| rule.evaluate(value)) {
                None => {
                    for rule in tiers {
                        transitions.extend(Self::resolve(active, &rule.name));
                    }
                }
                Some(hit) => {
                    // 更严重的一级仍然活动时保持不变，直到数值回落到最低一级以下
                    let held = tiers[..hit]
                        .iter()
                        .any(|rule| active.contains_key(&rule.name));
                    if !held {
                        transitions.extend(self.trigger(active, check, &tiers[hit], value));
                        for rule in &tiers[hit + 1..] {
                            transitions.extend(Self::resolve(active, &rule.name));
                        }
                    }
                }
            },
        }

        transitions
    }

    fn trigger(
        &self,
        active: &mut HashMap<String, Alert>,
        check: &Check,
        rule: &AlertRule,
        value: f64,
    ) -> Option<AlertTransition> {
        if active.contains_key(&rule.name) {
            return None;
        }

        let alert = Alert::new(rule.name.clone(), rule.severity, rule.message(value))
            .with_check(check.name.clone())
            .with_trigger(check.metric.clone(), value, rule.threshold)
            .with_labels(self.labels.clone());

        warn!(alert = %alert.name, severity = %alert.severity, value, threshold = rule.threshold, "Alert triggered");
        active.insert(alert.name.clone(), alert.clone());
        Some(AlertTransition::Triggered(alert))
    }

    fn resolve(active: &mut HashMap<String, Alert>, name: &str) -> Option<AlertTransition> {
        let mut alert = active.remove(name)?;
        alert.resolve();
        info!(alert = %alert.name, "Alert resolved");
        Some(AlertTransition::Resolved(alert))
    }

    async fn dispatch(&self, transition: &AlertTransition) {
        let result = match transition {
            AlertTransition::Triggered(alert) => self.dispatcher.on_trigger(alert).await,
            AlertTransition::Resolved(alert) => self.dispatcher.on_resolve(alert).await,
        };

        if let Err(e) = result {
            error!(
                dispatcher = self.dispatcher.name(),
                alert = %transition.alert().name,
                error = %e,
                "Failed to dispatch alert notification"
            );
        }
    }

    /// 当前活动告警，严重程度高的在前
    pub async fn active_alerts(&self) -> Vec<Alert> {
        let active = self.active_alerts.read().await;
        let mut alerts: Vec<Alert> = active.values().cloned().collect();
        drop(active);

        alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.name.cmp(&b.name)));
        alerts
    }

    pub async fn is_active(&self, name: &str) -> bool {
        self.active_alerts.read().await.contains_key(name)
    }

    /// 启动周期评估
    pub fn run(self: Arc<Self>, period: Duration, shutdown: ShutdownListener) -> JoinHandle<()> {
        info!(checks = self.checks.len(), period_secs = period.as_secs(), "Starting alert engine");
        PeriodicTask::new("alert-evaluation", period).spawn(shutdown, move || {
            let engine = self.clone();
            async move {
                engine.evaluate().await;
            }
        })
    }
}
