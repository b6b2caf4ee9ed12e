pub mod error;
pub mod schedule;
pub mod shutdown;
pub mod traits;

pub use error::{PulseError, Result};
pub use schedule::PeriodicTask;
pub use shutdown::{ShutdownHandle, ShutdownListener, ShutdownSignal};
pub use traits::dead_letter::{DeadLetter, DeadLetterError};
pub use traits::sink::{PersistenceSink, SinkError};
