use pulse_core::{DeadLetter, PersistenceSink, PulseError, Result};
use pulse_metrics::PipelineMetrics;
use pulse_types::{Record, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// 指数退避重试策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 包含第一次在内的最大尝试次数
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            multiplier,
            max_delay_ms: 30_000,
        }
    }

    /// 事件默认：3 次，1s 起，×2
    pub fn for_events() -> Self {
        Self::new(3, 1000, 2.0)
    }

    /// 指标默认：3 次，500ms 起，×2
    pub fn for_metrics() -> Self {
        Self::new(3, 500, 2.0)
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// 第 `retry` 次重试前的等待时间（从 1 开始）
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_events()
    }
}

/// 批量持久化服务
///
/// 对存储的瞬时故障做有限次数的退避重试；重试耗尽或遇到永久性故障时把批次交给死信处理，
/// 并累加失败计数。校验不通过的记录在调用存储之前就被分离出来直接进入死信。
pub struct BatchPersistence<R: Record> {
    sink: Arc<dyn PersistenceSink<R>>,
    dead_letter: Arc<dyn DeadLetter<R>>,
    policy: RetryPolicy,
    metrics: Arc<PipelineMetrics>,
}

impl<R: Record> BatchPersistence<R> {
    pub fn new(
        sink: Arc<dyn PersistenceSink<R>>,
        dead_letter: Arc<dyn DeadLetter<R>>,
        policy: RetryPolicy,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            sink,
            dead_letter,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// 持久化一个批次，返回写入的记录数
    pub async fn persist_batch(&self, mut records: Vec<R>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let kind = R::KIND;
        let started = Instant::now();
        let total = records.len();
        self.metrics.record_batch_size(kind, total);

        for record in records.iter_mut() {
            record.enrich();
        }

        let (valid, invalid, first_error) = Self::partition(records);
        if let Some(err) = first_error {
            warn!(
                kind = %kind,
                invalid = invalid.len(),
                error = %err,
                "Dropping invalid records from batch"
            );
            let cause = PulseError::Validation(err.clone());
            self.dead_letter(invalid, &cause).await;

            if valid.is_empty() {
                self.metrics
                    .record_collection_duration(kind, started.elapsed());
                return Err(PulseError::Rejected(format!(
                    "all {} {} in batch are invalid: {}",
                    total, kind, err
                )));
            }
        }

        let result = self.persist_with_retry(&valid).await;
        self.metrics
            .record_collection_duration(kind, started.elapsed());

        match result {
            Ok(count) => {
                self.metrics.record_processed(kind, count);
                info!(
                    kind = %kind,
                    count,
                    sink = self.sink.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch persisted"
                );
                Ok(count)
            }
            Err(err) => {
                error!(kind = %kind, count = valid.len(), error = %err, "Batch persistence failed");
                self.dead_letter(valid, &err).await;
                Err(err)
            }
        }
    }

    fn partition(records: Vec<R>) -> (Vec<R>, Vec<R>, Option<ValidationError>) {
        let mut valid = Vec::with_capacity(records.len());
        let mut invalid = Vec::new();
        let mut first_error = None;

        for record in records {
            match record.validate() {
                Ok(()) => valid.push(record),
                Err(e) => {
                    first_error.get_or_insert(e);
                    invalid.push(record);
                }
            }
        }

        (valid, invalid, first_error)
    }

    async fn persist_with_retry(&self, records: &[R]) -> Result<usize> {
        let kind = R::KIND;
        let mut attempt = 1;

        loop {
            match self.sink.persist_batch(records).await {
                Ok(count) => {
                    if attempt > 1 {
                        debug!(kind = %kind, attempt, "Batch persisted after retry");
                    }
                    return Ok(count);
                }
                Err(e) if !e.is_transient() => {
                    return Err(PulseError::Sink(e));
                }
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(PulseError::RetriesExhausted {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        kind = %kind,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient sink failure, retrying"
                    );
                    self.metrics.record_retry(kind);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn dead_letter(&self, records: Vec<R>, cause: &PulseError) {
        let count = records.len();
        self.metrics.record_failed(R::KIND, count);

        if let Err(e) = self.dead_letter.handle(records, cause).await {
            error!(
                kind = %R::KIND,
                count,
                error = %e,
                "Dead-letter handoff failed, batch lost"
            );
        }
    }
}
