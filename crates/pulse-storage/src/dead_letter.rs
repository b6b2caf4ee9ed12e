use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::{DeadLetter, DeadLetterError, PulseError};
use pulse_types::{Record, RecordKind};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// 只记录日志的死信处理，批次随后被丢弃
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDeadLetter;

#[async_trait]
impl<R: Record> DeadLetter<R> for LoggingDeadLetter {
    async fn handle(&self, records: Vec<R>, cause: &PulseError) -> Result<(), DeadLetterError> {
        error!(
            kind = %R::KIND,
            count = records.len(),
            cause = %cause,
            "Batch dead-lettered and dropped"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct DeadLetterEntry<'a, R> {
    kind: RecordKind,
    cause: String,
    failed_at: DateTime<Utc>,
    count: usize,
    records: &'a [R],
}

/// 死信文件
///
/// 每个失败批次在 `<dir>/<kind>-dead-letter.jsonl` 中追加一行。
pub struct FileDeadLetter {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDeadLetter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: RecordKind) -> PathBuf {
        self.dir.join(format!("{}-dead-letter.jsonl", kind.as_str()))
    }
}

#[async_trait]
impl<R: Record> DeadLetter<R> for FileDeadLetter {
    async fn handle(&self, records: Vec<R>, cause: &PulseError) -> Result<(), DeadLetterError> {
        let entry = DeadLetterEntry {
            kind: R::KIND,
            cause: cause.to_string(),
            failed_at: Utc::now(),
            count: records.len(),
            records: &records,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let path = self.path_for(R::KIND);

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        warn!(
            kind = %R::KIND,
            count = records.len(),
            path = %path.display(),
            cause = %cause,
            "Batch written to dead-letter file"
        );
        Ok(())
    }
}
