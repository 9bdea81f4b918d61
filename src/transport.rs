use anyhow::Result;
use async_trait::async_trait;

use crate::discard::Discarder;
use crate::engine::Engine;
use crate::filter::Filterer;
use crate::key::Keyer;
use crate::message::{Request, Response};
use crate::store::Storer;

/// Outbound round trip to an origin, the seam a caching interceptor wraps.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn round_trip(&self, request: Request) -> Result<Response> {
        (**self).round_trip(request).await
    }
}

/// Adapts a closure into a [`Transport`].
pub struct TransportFn<F>(pub F);

#[async_trait]
impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn round_trip(&self, request: Request) -> Result<Response> {
        (self.0)(request).await
    }
}

/// Caching interceptor around an inner [`Transport`]. Requests the filterer
/// rejects pass straight through; everything else is served from storage when
/// possible, with concurrent misses for one key coalesced onto a single inner
/// round trip.
pub struct CacheTransport<T> {
    inner: T,
    engine: Engine,
}

impl<T: Transport> CacheTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            engine: Engine::new(),
        }
    }

    pub fn with_filterer(mut self, filterer: impl Filterer + 'static) -> Self {
        self.engine.set_filterer(filterer);
        self
    }

    pub fn with_keyer(mut self, keyer: impl Keyer + 'static) -> Self {
        self.engine.set_keyer(keyer);
        self
    }

    pub fn with_storer(mut self, storer: impl Storer + 'static) -> Self {
        self.engine.set_storer(storer);
        self
    }

    pub fn with_discarder(mut self, discarder: impl Discarder + 'static) -> Self {
        self.engine.set_discarder(discarder);
        self
    }
}

#[async_trait]
impl<T: Transport> Transport for CacheTransport<T> {
    async fn round_trip(&self, request: Request) -> Result<Response> {
        self.engine
            .execute(request, |request| self.inner.round_trip(request))
            .await
    }
}
