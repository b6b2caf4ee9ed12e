use async_trait::async_trait;
use pulse_core::{PersistenceSink, SinkError};
use pulse_types::Record;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

/// JSON Lines 文件存储
///
/// 每种记录写入 `<dir>/<kind>.jsonl`，一行一条记录。
/// 一个批次要么整体追加，要么不留痕迹；同一文件只能有一个写入方。
pub struct JsonLinesSink {
    dir: PathBuf,
    batches_written: AtomicU64,
    bytes_written: AtomicU64,
}

impl JsonLinesSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            batches_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 某种记录对应的文件路径
    pub fn path_for<R: Record>(&self) -> PathBuf {
        self.dir.join(format!("{}.jsonl", R::KIND.as_str()))
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    fn encode<R: Record>(records: &[R]) -> Result<Vec<u8>, SinkError> {
        let mut buffer = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buffer, record)
                .map_err(|e| SinkError::permanent(format!("failed to encode record: {}", e)))?;
            buffer.push(b'\n');
        }
        Ok(buffer)
    }
}

#[async_trait]
impl<R: Record> PersistenceSink<R> for JsonLinesSink {
    async fn persist_batch(&self, records: &[R]) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }

        let data = Self::encode(records)?;
        let path = self.path_for::<R>();

        fs::create_dir_all(&self.dir).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!(path = %path.display(), error = %e, "Failed to open sink file");
                SinkError::from(e)
            })?;
        let start_len = file.metadata().await?.len();
        append_batch(&mut file, start_len, &data, &path).await?;

        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        debug!(
            path = %path.display(),
            records = records.len(),
            bytes = data.len(),
            "Batch appended to sink file"
        );
        Ok(records.len())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// 可追加并截断的写入目标
#[async_trait]
trait AppendTarget: Send {
    async fn append(&mut self, data: &[u8]) -> io::Result<()>;
    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl AppendTarget for File {
    async fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data).await?;
        self.flush().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

/// 追加整个批次；中途失败时截回 `start_len`，重试不会产生重复行
async fn append_batch<T: AppendTarget>(
    target: &mut T,
    start_len: u64,
    data: &[u8],
    path: &Path,
) -> Result<(), SinkError> {
    let err = match target.append(data).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    match target.truncate(start_len).await {
        Ok(()) => {
            warn!(path = %path.display(), error = %err, "Partial write rolled back");
            Err(SinkError::from(err))
        }
        Err(rollback) => {
            // 残留半个批次，再重试只会重复写入
            error!(path = %path.display(), error = %rollback, "Failed to roll back partial write");
            Err(SinkError::permanent(format!(
                "partial write could not be rolled back: {}",
                err
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_types::{Event, Metric};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::new(temp_dir.path());

        let events = vec![Event::new("u1", "login"), Event::new("u2", "purchase")];
        assert_eq!(sink.persist_batch(&events).await.unwrap(), 2);
        assert_eq!(sink.persist_batch(&events[..1]).await.unwrap(), 1);

        let content = fs::read_to_string(sink.path_for::<Event>()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Event = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.user_id, "u1");
        assert_eq!(sink.batches_written(), 2);
    }

    #[tokio::test]
    async fn test_kinds_use_separate_files() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::new(temp_dir.path().join("nested"));

        sink.persist_batch(&[Metric::new("cpu", 0.3, "svc")])
            .await
            .unwrap();
        sink.persist_batch(&[Event::new("u1", "login")]).await.unwrap();

        assert!(temp_dir.path().join("nested/metrics.jsonl").exists());
        assert!(temp_dir.path().join("nested/events.jsonl").exists());
    }

    /// 写入 `fail_after` 字节后报错的目标
    struct FailingTarget {
        data: Vec<u8>,
        fail_after: usize,
        truncate_fails: bool,
    }

    #[async_trait]
    impl AppendTarget for FailingTarget {
        async fn append(&mut self, data: &[u8]) -> io::Result<()> {
            let n = data.len().min(self.fail_after);
            self.data.extend_from_slice(&data[..n]);
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        async fn truncate(&mut self, len: u64) -> io::Result<()> {
            if self.truncate_fails {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only file system"));
            }
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_partial_write_is_rolled_back() {
        let mut target = FailingTarget {
            data: b"{\"existing\":1}\n".to_vec(),
            fail_after: 7,
            truncate_fails: false,
        };
        let start_len = target.data.len() as u64;

        let data = b"{\"a\":1}\n{\"b\":2}\n";
        let result = append_batch(&mut target, start_len, data, Path::new("events.jsonl")).await;

        assert!(matches!(result, Err(SinkError::Transient(_))));
        assert_eq!(target.data, b"{\"existing\":1}\n".to_vec());
    }

    #[tokio::test]
    async fn test_failed_rollback_is_permanent() {
        let mut target = FailingTarget {
            data: Vec::new(),
            fail_after: 3,
            truncate_fails: true,
        };

        let data = b"{\"a\":1}\n";
        let result = append_batch(&mut target, 0, data, Path::new("events.jsonl")).await;

        assert!(matches!(result, Err(SinkError::Permanent(_))));
    }
}
