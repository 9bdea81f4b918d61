use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tracing::trace;

use crate::pool::{BufferPool, PooledBuf};

use super::{EntryReader, EntrySink, Storer};

/// In-process store backed by a concurrent key-to-buffer map. Sinks stage
/// into pooled buffers; commit publishes via insert-if-absent, so the first
/// successful commit for a key wins and later buffers go back to the pool.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    entries: Mutex<HashMap<String, PooledBuf>>,
    pool: Arc<BufferPool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_pool(BufferPool::new())
    }

    pub fn with_pool(pool: Arc<BufferPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                pool,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Arc<BufferPool> {
        &self.inner.pool
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storer for MemoryStore {
    async fn get(&self, key: &str) -> Option<EntryReader> {
        // Copy out under the lock so a reader can never observe mutation of
        // the stored buffer while draining.
        let entries = self.inner.entries.lock();
        let stored = entries.get(key)?;
        let copy = Bytes::copy_from_slice(stored);
        drop(entries);
        Some(Box::new(std::io::Cursor::new(copy)))
    }

    async fn put(&self, key: &str) -> Option<Box<dyn EntrySink>> {
        Some(Box::new(MemorySink {
            key: key.to_string(),
            staged: self.inner.pool.get(),
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn del(&self, key: &str) {
        // Dropping the removed buffer recycles it into the pool.
        self.inner.entries.lock().remove(key);
    }
}

struct MemorySink {
    key: String,
    staged: PooledBuf,
    inner: Arc<Inner>,
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().staged.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl EntrySink for MemorySink {
    async fn commit(self: Box<Self>) -> Result<()> {
        let MemorySink { key, staged, inner } = *self;
        let mut entries = inner.entries.lock();
        match entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(staged);
            }
            Entry::Occupied(slot) => {
                // Another writer published first; this buffer drops back to
                // the pool.
                trace!(key = slot.key().as_str(), "entry already published");
            }
        }
        Ok(())
    }
}
