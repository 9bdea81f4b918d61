use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::fs as async_fs;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;
use uuid::Uuid;

use super::{EntryReader, EntrySink, Storer};

const TEMP_PREFIX: &str = "tmp_";

/// Durable store under a root directory. Each key maps to one regular file at
/// a hashed, sharded relative path; writes stage into a uniquely named
/// `tmp_*` sibling and become visible only through the atomic rename at
/// commit, so a crash mid-write leaves at most an orphaned temp file.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes()).to_hex().to_string();
        let (first, remainder) = digest.split_at(2);
        let (second, _) = remainder.split_at(2);
        self.root.join(first).join(second).join(&digest)
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()))
    }
}

#[async_trait]
impl Storer for DiskStore {
    async fn get(&self, key: &str) -> Option<EntryReader> {
        // Absence of the file is a normal miss, not an error.
        let file = File::open(self.entry_path(key)).await.ok()?;
        Some(Box::new(file))
    }

    async fn put(&self, key: &str) -> Option<Box<dyn EntrySink>> {
        let final_path = self.entry_path(key);
        let temp_path = self.temp_path();

        if let Err(err) = async_fs::create_dir_all(&self.root).await {
            trace!(error = %err, root = %self.root.display(), "declining cache write");
            return None;
        }

        let mut options = async_fs::OpenOptions::new();
        options.create_new(true).write(true);
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        let file = match options.open(&temp_path).await {
            Ok(file) => file,
            Err(err) => {
                trace!(error = %err, path = %temp_path.display(), "declining cache write");
                return None;
            }
        };

        Some(Box::new(DiskSink {
            file: Some(file),
            temp_path,
            final_path,
            finished: false,
        }))
    }

    async fn del(&self, key: &str) {
        let _ = async_fs::remove_file(self.entry_path(key)).await;
    }
}

struct DiskSink {
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    finished: bool,
}

impl DiskSink {
    async fn try_commit(&mut self) -> Result<()> {
        // The handle must be closed before the rename; an open file blocks
        // it on some platforms.
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        if let Some(parent) = self.final_path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create cache shard {}", parent.display()))?;
        }
        // The rename is the only step that makes the entry visible.
        async_fs::rename(&self.temp_path, &self.final_path)
            .await
            .with_context(|| format!("failed to publish cache entry {}", self.final_path.display()))?;
        Ok(())
    }
}

impl AsyncWrite for DiskSink {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::other("sink already committed"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[async_trait]
impl EntrySink for DiskSink {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        let result = self.try_commit().await;
        if result.is_err() {
            let _ = async_fs::remove_file(&self.temp_path).await;
        }
        self.finished = true;
        result
    }
}

impl Drop for DiskSink {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let temp_path = std::mem::take(&mut self.temp_path);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = async_fs::remove_file(temp_path).await;
            });
        } else {
            let _ = std::fs::remove_file(&temp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn read_entry(store: &DiskStore, key: &str) -> Option<Vec<u8>> {
        let mut reader = store.get(key).await?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.ok()?;
        Some(out)
    }

    fn temp_files(root: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(root) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .map(|name| name.starts_with(TEMP_PREFIX))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn commit_makes_exact_bytes_visible() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());

        let mut sink = store.put("key").await.unwrap();
        sink.write_all(b"durable payload").await.unwrap();
        assert!(store.get("key").await.is_none(), "entry visible before commit");
        sink.commit().await.unwrap();

        assert_eq!(read_entry(&store, "key").await.unwrap(), b"durable payload");
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn dropped_sink_cleans_up_its_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());

        let mut sink = store.put("key").await.unwrap();
        sink.write_all(b"never committed").await.unwrap();
        drop(sink);

        // Cleanup is spawned onto the runtime; give it a moment.
        for _ in 0..50 {
            if temp_files(dir.path()).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(temp_files(dir.path()).is_empty());
        assert!(store.get("key").await.is_none());
    }

    #[tokio::test]
    async fn failed_commit_leaves_nothing_at_the_final_path() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());

        let final_path = store.entry_path("key");
        let shard = final_path.parent().unwrap().parent().unwrap();
        // Occupy the shard path with a regular file so the rename step must
        // fail after the body was fully written.
        std::fs::write(shard, b"roadblock").unwrap();

        let mut sink = store.put("key").await.unwrap();
        sink.write_all(b"payload").await.unwrap();
        let err = sink.commit().await;
        assert!(err.is_err());

        assert!(!final_path.exists());
        assert!(store.get("key").await.is_none());
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn del_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());

        store.del("absent").await;

        let mut sink = store.put("key").await.unwrap();
        sink.write_all(b"payload").await.unwrap();
        sink.commit().await.unwrap();

        store.del("key").await;
        assert!(store.get("key").await.is_none());
        store.del("key").await;
    }

    #[tokio::test]
    async fn distinct_keys_map_to_distinct_files() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());
        assert_ne!(store.entry_path("a"), store.entry_path("b"));

        for (key, content) in [("a", &b"alpha"[..]), ("b", &b"beta"[..])] {
            let mut sink = store.put(key).await.unwrap();
            sink.write_all(content).await.unwrap();
            sink.commit().await.unwrap();
        }
        assert_eq!(read_entry(&store, "a").await.unwrap(), b"alpha");
        assert_eq!(read_entry(&store, "b").await.unwrap(), b"beta");
    }

    #[tokio::test]
    async fn declines_put_when_root_cannot_be_created() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let store = DiskStore::new(&blocked);
        assert!(store.put("key").await.is_none());
    }
}
