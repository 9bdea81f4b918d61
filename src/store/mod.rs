//! Storage backends. A backend maps opaque cache keys to immutable byte
//! entries; the only visibility point for a written entry is a successful
//! [`EntrySink::commit`], and an entry once visible never changes.

mod disk;
mod memory;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Stream over a stored entry's bytes. Dropping it early is always safe.
pub type EntryReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write destination returned by [`Storer::put`]. Data written before
/// [`commit`](EntrySink::commit) must not be visible through
/// [`Storer::get`]; a sink dropped without committing leaves no visible
/// entry behind.
#[async_trait]
pub trait EntrySink: AsyncWrite + Send + Unpin {
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Storer: Send + Sync {
    /// `None` covers both "no entry" and a storage-layer fault; callers
    /// treat them identically and fall through to the origin.
    async fn get(&self, key: &str) -> Option<EntryReader>;

    /// `None` means the backend declines to store this key and the caller
    /// must skip persistence.
    async fn put(&self, key: &str) -> Option<Box<dyn EntrySink>>;

    /// Idempotent; deleting an absent key is a no-op, never an error.
    async fn del(&self, key: &str);
}
