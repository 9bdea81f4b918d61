use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

const DEFAULT_BUFFER_CAPACITY: usize = 32 * 1024;
const MAX_RETAINED_CAPACITY: usize = 1024 * 1024;
const MAX_POOLED_BUFFERS: usize = 64;

/// Pool of reusable byte buffers. Buffers are checked out exclusively and
/// return to the pool when the [`PooledBuf`] guard is dropped, cleared of any
/// residual content.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(self: &Arc<Self>) -> PooledBuf {
        let buf = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY));
        PooledBuf {
            buf,
            pool: Arc::clone(self),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        // Buffers that grew past the retention cap are cheaper to reallocate
        // than to keep resident.
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < MAX_POOLED_BUFFERS {
            buffers.push(buf);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// Exclusive checkout of a pooled buffer. Dereferences to `Vec<u8>`; dropping
/// it returns the cleared buffer to its pool on every exit path.
#[derive(Debug)]
pub struct PooledBuf {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}
