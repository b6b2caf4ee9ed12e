pub mod alert;
pub mod checks;
pub mod engine;
pub mod latency;
pub mod notifier;
pub mod registry;
pub mod snapshot;

pub use alert::{Alert, AlertSeverity, AlertStatus};
pub use checks::{default_checks, AlertRule, AlertThresholds, Check, CheckKind, Comparison};
pub use engine::{AlertEngine, AlertTransition};
pub use latency::LatencyWindow;
pub use notifier::{
    parse_webhook_url, DispatcherSet, LogDispatcher, NotificationDispatcher, NotifierError,
    WebhookDispatcher,
};
pub use registry::PipelineMetrics;
pub use snapshot::{MetricSnapshotProvider, RegistrySnapshot, SnapshotError};
