pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{
    AlertsConfig, BufferSection, LogFormat, LoggingConfig, NotifyConfig, PulseConfig,
    RetryOverrides, RetrySection, ServerConfig, StorageConfig,
};
