//! Incremental line tailer.
//!
//! Reads lines appended to a log file since the last read, buffering an
//! incomplete trailing line until its terminator arrives.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::WatcherError;

/// Size of one pooled read chunk.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Idle chunks kept for reuse.
const POOL_CAPACITY: usize = 8;

static READ_BUFFERS: Lazy<Mutex<Vec<Vec<u8>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Fixed-size read buffer borrowed from a process-wide pool.
struct PooledBuffer(Vec<u8>);

impl PooledBuffer {
    fn acquire() -> Self {
        let buf = READ_BUFFERS
            .lock()
            .expect("buffer pool poisoned")
            .pop()
            .unwrap_or_else(|| vec![0; READ_CHUNK_SIZE]);
        Self(buf)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut pool = READ_BUFFERS.lock().expect("buffer pool poisoned");
        if pool.len() < POOL_CAPACITY {
            pool.push(std::mem::take(&mut self.0));
        }
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Incremental reader that tracks its byte offset into one file.
///
/// The file is reopened on every read, so a log replaced by rename is
/// picked up at the same path. Rotation is detected purely by size: if the
/// file is now shorter than the offset, the tailer starts over from the
/// beginning of the new content.
#[derive(Debug)]
pub struct Tailer {
    path: PathBuf,
    offset: u64,
    /// Bytes of a line whose terminator has not been written yet.
    pending: Vec<u8>,
    start_at_end: bool,
    positioned: bool,
}

impl Tailer {
    /// Create a tailer for `path`.
    ///
    /// With `start_at_end`, the offset is the file length as of this call,
    /// so lines appended before the first read are still returned. A file
    /// that does not exist yet is tailed from its first byte.
    #[must_use]
    pub fn new(path: PathBuf, start_at_end: bool) -> Self {
        let offset = if start_at_end {
            std::fs::metadata(&path).map_or(0, |m| m.len())
        } else {
            0
        };
        Self {
            path,
            offset,
            pending: Vec::new(),
            start_at_end,
            positioned: true,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the buffered partial line.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Read complete lines appended since the last call.
    ///
    /// Lines are split on `\n`; a trailing `\r` is stripped and invalid UTF-8
    /// is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, stat'ed or read. The
    /// caller is expected to [`reset`](Self::reset) and retry later.
    pub async fn read_new_lines(&mut self) -> Result<Vec<String>, WatcherError> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| WatcherError::from_io(&self.path, e))?;
        let len = file.metadata().await?.len();

        if !self.positioned {
            self.positioned = true;
            if self.start_at_end {
                self.offset = len;
            }
        }

        if len < self.offset {
            tracing::info!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = len,
                "File shrank, reading from start"
            );
            self.offset = 0;
            self.pending.clear();
        }

        if len == self.offset {
            return Ok(Vec::new());
        }

        self.read_range(&mut file, len).await?;
        Ok(self.drain_lines())
    }

    /// Discard the offset and partial line.
    ///
    /// The next read positions itself at the end of the file if the tailer
    /// was created to start there, otherwise at the beginning.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
        self.positioned = false;
    }

    async fn read_range(&mut self, file: &mut File, len: u64) -> Result<(), WatcherError> {
        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut buf = PooledBuffer::acquire();
        let mut remaining = len - self.offset;
        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            self.pending.extend_from_slice(&buf[..n]);
            self.offset += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|raw| {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                String::from_utf8_lossy(raw).into_owned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_tailer_reads_initial_content() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "two").unwrap();
        file.flush().unwrap();

        let mut tailer = Tailer::new(file.path().to_path_buf(), false);
        let lines = tailer.read_new_lines().await.unwrap();
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(tailer.offset(), 8);
    }

    #[tokio::test]
    async fn test_tailer_reads_only_new_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "old\n");

        let mut tailer = Tailer::new(path.clone(), false);
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["old"]);
        assert!(tailer.read_new_lines().await.unwrap().is_empty());

        append(&path, "new-1\nnew-2\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["new-1", "new-2"]);
    }

    #[tokio::test]
    async fn test_tailer_start_at_end_skips_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "history\n");

        let mut tailer = Tailer::new(path.clone(), true);
        assert!(tailer.read_new_lines().await.unwrap().is_empty());

        append(&path, "fresh\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_tailer_buffers_partial_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "");

        let mut tailer = Tailer::new(path.clone(), false);
        append(&path, "abc");
        assert!(tailer.read_new_lines().await.unwrap().is_empty());
        assert_eq!(tailer.pending_len(), 3);

        append(&path, "\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["abc"]);
        assert_eq!(tailer.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_tailer_handles_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "first line of a long old file\nsecond line\n");

        let mut tailer = Tailer::new(path.clone(), true);
        assert!(tailer.read_new_lines().await.unwrap().is_empty());
        let old_offset = tailer.offset();

        std::fs::write(&path, "x\ny\n").unwrap();
        let lines = tailer.read_new_lines().await.unwrap();
        assert_eq!(lines, vec!["x", "y"]);
        assert!(tailer.offset() < old_offset);
    }

    #[tokio::test]
    async fn test_tailer_start_at_end_keeps_lines_written_before_first_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "history\n");

        let mut tailer = Tailer::new(path.clone(), true);
        assert_eq!(tailer.offset(), 8);
        append(&path, "written-before-read\n");
        assert_eq!(
            tailer.read_new_lines().await.unwrap(),
            vec!["written-before-read"]
        );
    }

    #[tokio::test]
    async fn test_tailer_start_at_end_on_missing_file_reads_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("later.log");

        let mut tailer = Tailer::new(path.clone(), true);
        append(&path, "first\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_tailer_follows_rename_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "0123456789\n");

        let mut tailer = Tailer::new(path.clone(), false);
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["0123456789"]);
        assert_eq!(tailer.offset(), 11);

        // The replacement is already longer than the old offset, so the size
        // check alone cannot see the rotation.
        std::fs::rename(&path, dir.path().join("a.log.1")).unwrap();
        append(&path, "rotated-first-line\nrotated-second\n");
        let lines = tailer.read_new_lines().await.unwrap();
        assert_eq!(lines.last().map(String::as_str), Some("rotated-second"));

        append(&path, "appended-after-rotation\n");
        assert_eq!(
            tailer.read_new_lines().await.unwrap(),
            vec!["appended-after-rotation"]
        );
    }

    #[tokio::test]
    async fn test_tailer_reset_start_at_end_skips_to_current_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "");

        let mut tailer = Tailer::new(path.clone(), true);
        append(&path, "one\n");
        tailer.reset();
        append(&path, "two\n");
        assert!(tailer.read_new_lines().await.unwrap().is_empty());

        append(&path, "three\n");
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["three"]);
    }

    #[tokio::test]
    async fn test_tailer_strips_carriage_returns_and_keeps_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "crlf\r\n\nlast\n");

        let mut tailer = Tailer::new(path, false);
        assert_eq!(tailer.read_new_lines().await.unwrap(), vec!["crlf", "", "last"]);
    }

    #[tokio::test]
    async fn test_tailer_reads_more_than_one_chunk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.log");
        let line = "z".repeat(1000);
        let text: String = (0..100).map(|_| format!("{line}\n")).collect();
        append(&path, &text);

        let mut tailer = Tailer::new(path, false);
        let lines = tailer.read_new_lines().await.unwrap();
        assert_eq!(lines.len(), 100);
        assert!(lines.iter().all(|l| l.len() == 1000));
    }

    #[tokio::test]
    async fn test_tailer_handles_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut tailer = Tailer::new(dir.path().join("missing.log"), false);
        let result = tailer.read_new_lines().await;
        assert!(matches!(result, Err(WatcherError::FileDeleted(_))));
    }

    #[test]
    fn test_tailer_reset() {
        let mut tailer = Tailer::new(PathBuf::from("/tmp/test.log"), false);
        tailer.offset = 1024;
        tailer.pending.extend_from_slice(b"abc");
        tailer.reset();
        assert_eq!(tailer.offset(), 0);
        assert_eq!(tailer.pending_len(), 0);
    }
}
