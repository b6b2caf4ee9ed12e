use serde::{Deserialize, Serialize};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Warning,
    Down,
}

/// 缓冲区健康报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferHealth {
    pub status: HealthStatus,
    pub event_buffer_size: usize,
    pub metric_buffer_size: usize,
}

/// 缓冲区健康检查，按两个缓冲区中较大的一个判断
#[derive(Debug, Clone)]
pub struct BufferHealthChecker {
    warning_threshold: usize,
    critical_threshold: usize,
}

impl BufferHealthChecker {
    pub fn new(warning_threshold: usize, critical_threshold: usize) -> Self {
        Self {
            warning_threshold,
            critical_threshold,
        }
    }

    pub fn status_for(&self, size: usize) -> HealthStatus {
        if size >= self.critical_threshold {
            HealthStatus::Down
        } else if size >= self.warning_threshold {
            HealthStatus::Warning
        } else {
            HealthStatus::Up
        }
    }

    pub fn check(&self, event_buffer_size: usize, metric_buffer_size: usize) -> BufferHealth {
        BufferHealth {
            status: self.status_for(event_buffer_size.max(metric_buffer_size)),
            event_buffer_size,
            metric_buffer_size,
        }
    }
}

impl Default for BufferHealthChecker {
    fn default() -> Self {
        Self::new(5000, 8000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_health_status() {
        let checker = BufferHealthChecker::default();
        assert_eq!(checker.check(10, 20).status, HealthStatus::Up);
        assert_eq!(checker.check(5000, 0).status, HealthStatus::Warning);
        assert_eq!(checker.check(100, 8000).status, HealthStatus::Down);
    }

    #[test]
    fn test_status_serialization() {
        let health = BufferHealthChecker::default().check(6000, 1);
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "WARNING");
        assert_eq!(json["event_buffer_size"], 6000);
    }
}
