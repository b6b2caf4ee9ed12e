pub mod event;
pub mod metric;
pub mod record;

pub use event::{Event, EventDimensions, EventMessage};
pub use metric::{Metric, MetricMessage};
pub use record::{Record, RecordKind, ValidationError};
