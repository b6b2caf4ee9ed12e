use crate::settings::PulseConfig;
use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 默认的环境变量前缀，如 `PULSE__BUFFER__BATCH_SIZE`
pub const ENV_PREFIX: &str = "PULSE";

/// 配置加载器
///
/// 依次读取 TOML 文件（可以不存在）和环境变量，后者覆盖前者。
pub struct ConfigLoader {
    path: PathBuf,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env_vars: None,
        }
    }

    /// 使用给定的变量代替进程环境
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载并校验配置
    pub fn load(&self) -> Result<PulseConfig> {
        let path = self
            .path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid config path: {}", self.path.display()))?;

        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(self.env_vars.clone());

        let config: PulseConfig = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LogFormat;
    use std::fs;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let loader =
            ConfigLoader::new(temp_dir.path().join("pulse.toml")).with_env_vars(HashMap::new());

        let config = loader.load().unwrap();
        assert_eq!(config, PulseConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("pulse.toml");
        let content = r#"
[server]
port = 8080

[logging]
format = "json"

[buffer]
batch_size = 250
max_age_ms = 2000

[retry.metrics]
max_attempts = 5

[alerts]
buffer_high = 3000
buffer_overflow = 4000
service_name = "analytics-collector"

[notify]
webhook_url = "https://hooks.example.com/services/T000"
"#;
        fs::write(&path, content).unwrap();

        let config = ConfigLoader::new(&path)
            .with_env_vars(HashMap::new())
            .load()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.buffer.batch_size, 250);
        assert_eq!(config.buffer.tick_interval_ms, 5000);
        assert_eq!(config.retry.metrics_policy().max_attempts, 5);
        assert_eq!(config.retry.metrics_policy().base_delay_ms, 500);
        assert_eq!(config.alerts.thresholds().buffer_overflow, 4000);
        assert_eq!(config.alerts.service_name, "analytics-collector");
        assert!(config.notify.webhook_url.is_some());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("pulse.toml");
        fs::write(&path, "[buffer]\nbatch_size = 250\n").unwrap();

        let config = ConfigLoader::new(&path)
            .with_env_vars(vars(&[
                ("PULSE__BUFFER__BATCH_SIZE", "42"),
                ("PULSE__ALERTS__EVALUATION_INTERVAL_SECS", "15"),
            ]))
            .load()
            .unwrap();

        assert_eq!(config.buffer.batch_size, 42);
        assert_eq!(config.alerts.evaluation_interval_secs, 15);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("pulse.toml");
        fs::write(&path, "[alerts]\nbuffer_high = 9000\n").unwrap();

        let err = ConfigLoader::new(&path)
            .with_env_vars(HashMap::new())
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("buffer_high"));
    }
}
