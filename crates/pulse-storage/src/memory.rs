use async_trait::async_trait;
use pulse_core::{DeadLetter, DeadLetterError, PersistenceSink, PulseError, SinkError};
use pulse_types::Record;
use std::sync::{Mutex, MutexGuard};

/// 内存存储，保留每个写入的批次
pub struct MemorySink<R> {
    batches: Mutex<Vec<Vec<R>>>,
}

impl<R: Record> MemorySink<R> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    /// 已写入的批次
    pub fn batches(&self) -> Vec<Vec<R>> {
        self.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.lock().len()
    }

    pub fn record_count(&self) -> usize {
        self.lock().iter().map(Vec::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<R>>> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R: Record> Default for MemorySink<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> PersistenceSink<R> for MemorySink<R> {
    async fn persist_batch(&self, records: &[R]) -> Result<usize, SinkError> {
        self.lock().push(records.to_vec());
        Ok(records.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// 内存死信队列，保留批次及其失败原因
pub struct MemoryDeadLetter<R> {
    entries: Mutex<Vec<(Vec<R>, String)>>,
}

impl<R: Record> MemoryDeadLetter<R> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<(Vec<R>, String)> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    pub fn record_count(&self) -> usize {
        self.lock().iter().map(|(records, _)| records.len()).sum()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Vec<R>, String)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R: Record> Default for MemoryDeadLetter<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> DeadLetter<R> for MemoryDeadLetter<R> {
    async fn handle(&self, records: Vec<R>, cause: &PulseError) -> Result<(), DeadLetterError> {
        self.lock().push((records, cause.to_string()));
        Ok(())
    }
}
