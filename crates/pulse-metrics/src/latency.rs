use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// 滑动时间窗口内的耗时样本
///
/// 只保留最近 `window` 内的样本，百分位使用最近秩法（nearest-rank）。
#[derive(Debug)]
pub struct LatencyWindow {
    window: Duration,
    samples: Mutex<VecDeque<(Instant, f64)>>,
}

impl LatencyWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// 记录一次耗时（秒）
    pub fn record(&self, seconds: f64) {
        let now = Instant::now();
        let mut samples = self.lock();
        samples.push_back((now, seconds));
        Self::prune(&mut samples, now, self.window);
    }

    /// 计算窗口内的百分位，窗口为空时返回 None
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let now = Instant::now();
        let mut samples = self.lock();
        Self::prune(&mut samples, now, self.window);

        if samples.is_empty() {
            return None;
        }

        let mut values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        drop(samples);

        values.sort_by(|a, b| a.total_cmp(b));
        let p = p.clamp(0.0, 100.0);
        let rank = ((p / 100.0) * values.len() as f64).ceil() as usize;
        let index = rank.clamp(1, values.len()) - 1;
        Some(values[index])
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut samples = self.lock();
        Self::prune(&mut samples, now, self.window);
        samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(samples: &mut VecDeque<(Instant, f64)>, now: Instant, window: Duration) {
        while let Some((at, _)) = samples.front() {
            if now.duration_since(*at) > window {
                samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<(Instant, f64)>> {
        // 样本数据没有跨字段的不变量，中毒后继续使用
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
