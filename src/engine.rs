use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use crate::coalesce::{KeyLockRole, KeyLocks};
use crate::codec::{decode_response, encode_response_head};
use crate::discard::{Discarder, StatusDiscarder};
use crate::filter::{Filterer, MethodFilterer};
use crate::key::{HostKeyer, JointKeyer, Keyer, PathKeyer};
use crate::message::{Body, Request, Response};
use crate::pool::BufferPool;
use crate::store::{EntrySink, MemoryStore, Storer};

/// Shared cache lifecycle behind both orchestrators: filter, derive the key,
/// serve from storage when possible, otherwise coalesce concurrent misses
/// onto a single origin call and persist its response.
pub(crate) struct Engine {
    filterer: Box<dyn Filterer>,
    keyer: Box<dyn Keyer>,
    storer: Box<dyn Storer>,
    discarder: Box<dyn Discarder>,
    locks: Arc<KeyLocks>,
    pool: Arc<BufferPool>,
}

impl Engine {
    pub(crate) fn new() -> Self {
        let pool = BufferPool::new();
        Self {
            filterer: Box::new(MethodFilterer::new([http::Method::GET, http::Method::HEAD])),
            keyer: Box::new(JointKeyer::new(vec![Box::new(HostKeyer), Box::new(PathKeyer)])),
            storer: Box::new(MemoryStore::with_pool(Arc::clone(&pool))),
            discarder: Box::new(StatusDiscarder),
            locks: Arc::new(KeyLocks::new()),
            pool,
        }
    }

    pub(crate) fn set_filterer(&mut self, filterer: impl Filterer + 'static) {
        self.filterer = Box::new(filterer);
    }

    pub(crate) fn set_keyer(&mut self, keyer: impl Keyer + 'static) {
        self.keyer = Box::new(keyer);
    }

    pub(crate) fn set_storer(&mut self, storer: impl Storer + 'static) {
        self.storer = Box::new(storer);
    }

    pub(crate) fn set_discarder(&mut self, discarder: impl Discarder + 'static) {
        self.discarder = Box::new(discarder);
    }

    pub(crate) async fn execute<F, Fut>(&self, mut request: Request, origin: F) -> Result<Response>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        if !self.filterer.filter(&request) {
            trace!(method = %request.method, uri = %request.uri, "request not cacheable");
            return origin(request).await;
        }

        let key = self.keyer.key(&mut request).await;

        // Fast path: a published entry is served without touching the lock
        // registry.
        if let Some(response) = self.lookup(&key).await {
            trace!(key, "cache hit");
            return Ok(response);
        }

        match self.locks.begin(&key) {
            KeyLockRole::Filler(guard) => {
                let response = self.fill(&key, request, origin).await;
                drop(guard);
                response
            }
            KeyLockRole::Waiter(lock) => {
                drop(lock.read_owned().await);
                // One re-check after the fill completes; if the filler could
                // not publish, fall through to an uncached origin call rather
                // than start a second fill.
                if let Some(response) = self.lookup(&key).await {
                    trace!(key, "cache hit after fill");
                    return Ok(response);
                }
                trace!(key, "fill produced no entry, calling origin uncached");
                origin(request).await
            }
        }
    }

    /// Storage read plus decode. Both a missing entry and an undecodable one
    /// come back as `None`; a cache fault must never surface to the caller.
    async fn lookup(&self, key: &str) -> Option<Response> {
        let reader = self.storer.get(key).await?;
        match decode_response(reader).await {
            Ok(response) => Some(response),
            Err(err) => {
                trace!(key, error = %err, "ignoring undecodable cache entry");
                None
            }
        }
    }

    async fn fill<F, Fut>(&self, key: &str, request: Request, origin: F) -> Result<Response>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let response = origin(request).await?;

        if self.discarder.discard(&response.head) {
            trace!(key, status = %response.status(), "response not stored");
            return Ok(response);
        }

        // The whole body must be on hand both to persist and to hand back to
        // the caller; a read failure here is an origin failure.
        let (head, mut body) = response.into_parts();
        let mut staged = self.pool.get();
        body.drain_into(&mut staged)
            .await
            .context("failed to read origin response body")?;

        match self.storer.put(key).await {
            Some(sink) => {
                let encoded_head = encode_response_head(&head);
                if let Err(err) = write_entry(sink, &encoded_head, &staged).await {
                    warn!(key, error = %err, "failed to store response, dropping entry");
                    self.storer.del(key).await;
                } else {
                    trace!(key, "cache fill complete");
                }
            }
            None => trace!(key, "store declined the write"),
        }

        Ok(Response::from_parts(head, Body::from_pooled(staged)))
    }
}

async fn write_entry(mut sink: Box<dyn EntrySink>, head: &[u8], body: &[u8]) -> Result<()> {
    sink.write_all(head).await?;
    sink.write_all(body).await?;
    sink.commit().await
}
