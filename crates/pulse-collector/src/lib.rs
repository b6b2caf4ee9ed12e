pub mod buffer;
pub mod collector;
pub mod health;
pub mod persistence;
pub mod pipeline;
pub mod statistics;

pub use buffer::{BufferConfig, RecordBuffer};
pub use collector::{Collector, EventCollector, MetricCollector};
pub use health::{BufferHealth, BufferHealthChecker, HealthStatus};
pub use persistence::{BatchPersistence, RetryPolicy};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use statistics::{CollectorStatistics, KindStatistics, StatisticsSnapshot};
