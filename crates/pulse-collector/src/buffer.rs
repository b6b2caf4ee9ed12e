use crate::persistence::BatchPersistence;
use pulse_metrics::PipelineMetrics;
use pulse_types::Record;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error};

/// 缓冲区配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// 达到该数量立即刷新
    pub batch_size: usize,
    /// 距上次刷新超过该时间且非空时刷新
    pub max_age: Duration,
    /// 检查 `max_age` 的周期
    pub tick_interval: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_age: Duration::from_millis(5000),
            tick_interval: Duration::from_millis(5000),
        }
    }
}

/// 正在持久化的批次计数
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// 记录缓冲区
///
/// 刷新协议：持锁把当前列表换成空列表，释放锁后把换出的列表交给持久化任务。
/// 换出的批次此后只归持久化任务所有，刷新期间的新记录进入新列表。
/// 持久化在独立的 tokio 任务中执行，同一缓冲区同一时刻只有一个批次在写入，
/// 失败的批次不会回到缓冲区。
pub struct RecordBuffer<R: Record> {
    config: BufferConfig,
    records: Mutex<Vec<R>>,
    last_flush: Mutex<Instant>,
    persistence: Arc<BatchPersistence<R>>,
    metrics: Arc<PipelineMetrics>,
    gate: Arc<tokio::sync::Mutex<()>>,
    in_flight: Arc<InFlight>,
    flush_count: AtomicU64,
    runtime: Option<Handle>,
}

impl<R: Record> RecordBuffer<R> {
    /// 创建缓冲区
    ///
    /// 在 tokio 运行时内创建时会记住当前运行时，之后可以从任意线程调用 `add`。
    pub fn new(config: BufferConfig, persistence: Arc<BatchPersistence<R>>) -> Self {
        let metrics = persistence.metrics().clone();
        Self {
            records: Mutex::new(Vec::with_capacity(config.batch_size)),
            config,
            last_flush: Mutex::new(Instant::now()),
            persistence,
            metrics,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            in_flight: Arc::new(InFlight::default()),
            flush_count: AtomicU64::new(0),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// 添加一条记录，达到批量大小时在返回前发起刷新
    pub fn add(&self, record: R) {
        let batch = {
            let mut records = self.lock_records();
            records.push(record);
            self.take_if_full(&mut records)
        };

        if let Some(batch) = batch {
            self.hand_off(batch);
        }
    }

    /// 批量添加
    pub fn add_all<I>(&self, records: I)
    where
        I: IntoIterator<Item = R>,
    {
        let batch = {
            let mut buffered = self.lock_records();
            buffered.extend(records);
            self.take_if_full(&mut buffered)
        };

        if let Some(batch) = batch {
            self.hand_off(batch);
        }
    }

    /// 立即刷新，返回交给持久化的记录数；为空时什么也不做
    pub fn flush(&self) -> usize {
        let batch = {
            let mut records = self.lock_records();
            if records.is_empty() {
                return 0;
            }
            let batch = std::mem::take(&mut *records);
            self.metrics.set_buffer_size(R::KIND, 0);
            batch
        };

        let count = batch.len();
        self.hand_off(batch);
        count
    }

    /// 定时检查：距上次刷新达到 `max_age` 且非空时刷新
    pub fn maybe_flush(&self) -> bool {
        let elapsed = self.lock_last_flush().elapsed();
        if elapsed < self.config.max_age || self.is_empty() {
            return false;
        }

        debug!(kind = %R::KIND, elapsed_ms = elapsed.as_millis() as u64, "Buffer max age reached");
        self.flush() > 0
    }

    pub fn size(&self) -> usize {
        self.lock_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// 已发起的刷新次数
    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::SeqCst)
    }

    /// 尚未完成的持久化批次数
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// 等待所有已发起的持久化完成
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 刷新剩余记录并等待持久化完成
    pub async fn drain(&self) {
        let count = self.flush();
        if count > 0 {
            debug!(kind = %R::KIND, count, "Draining buffer");
        }
        self.wait_idle().await;
    }

    fn take_if_full(&self, records: &mut Vec<R>) -> Option<Vec<R>> {
        if records.len() >= self.config.batch_size {
            self.metrics.set_buffer_size(R::KIND, 0);
            Some(std::mem::take(records))
        } else {
            self.metrics.set_buffer_size(R::KIND, records.len());
            None
        }
    }

    fn hand_off(&self, batch: Vec<R>) {
        *self.lock_last_flush() = Instant::now();
        self.flush_count.fetch_add(1, Ordering::SeqCst);

        let count = batch.len();
        debug!(kind = %R::KIND, count, "Flushing buffer");

        let guard = InFlightGuard::new(self.in_flight.clone());
        let persistence = self.persistence.clone();
        let gate = self.gate.clone();

        let task = async move {
            let _guard = guard;
            let _permit = gate.lock().await;
            // 错误已在持久化服务内记录并转入死信，这里只丢弃批次
            if let Err(e) = persistence.persist_batch(batch).await {
                error!(kind = %R::KIND, count, error = %e, "Flushed batch discarded");
            }
        };

        match self.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => {
                runtime.spawn(task);
            }
            None => {
                drop(task);
                self.metrics.record_failed(R::KIND, count);
                error!(kind = %R::KIND, count, "No async runtime available, batch dropped");
            }
        }
    }

    fn lock_records(&self) -> MutexGuard<'_, Vec<R>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_flush(&self) -> MutexGuard<'_, Instant> {
        self.last_flush
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
