use crate::shutdown::ShutdownListener;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// 固定周期的后台任务
///
/// 第一次回调发生在启动后一个周期，之后每个周期一次；收到关闭信号后退出。
/// 回调执行期间不会产生重叠的调用，错过的周期顺延而不是补发。
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    name: String,
    period: Duration,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
        }
    }

    /// 启动任务
    pub fn spawn<F, Fut>(self, mut shutdown: ShutdownListener, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(task = %self.name, period_ms = self.period.as_millis() as u64, "Periodic task started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(task = %self.name, "Tick");
                        tick().await;
                    }
                    _ = shutdown.recv() => {
                        info!(task = %self.name, "Periodic task stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let handle = ShutdownHandle::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let task = PeriodicTask::new("counter", Duration::from_secs(5)).spawn(
            handle.listener(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let handle = ShutdownHandle::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let task = PeriodicTask::new("stopper", Duration::from_secs(1)).spawn(
            handle.listener(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        handle.trigger();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
