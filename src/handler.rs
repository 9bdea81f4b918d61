use anyhow::Result;
use async_trait::async_trait;

use crate::discard::Discarder;
use crate::engine::Engine;
use crate::filter::Filterer;
use crate::key::Keyer;
use crate::message::{Request, Response};
use crate::store::Storer;

/// Inbound request handler, the seam a caching wrapper sits in front of.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn serve(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for std::sync::Arc<H> {
    async fn serve(&self, request: Request) -> Result<Response> {
        (**self).serve(request).await
    }
}

/// Adapts a closure into a [`Handler`].
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn serve(&self, request: Request) -> Result<Response> {
        (self.0)(request).await
    }
}

/// Caching wrapper in front of an inner [`Handler`]. Identical lifecycle to
/// the outbound interceptor; only the delegation seam differs.
pub struct CacheHandler<H> {
    inner: H,
    engine: Engine,
}

impl<H: Handler> CacheHandler<H> {
    pub fn new(inner: H) -> Self {
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
impl<H: Handler> Handler for CacheHandler<H> {
    async fn serve(&self, request: Request) -> Result<Response> {
        self.engine
            .execute(request, |request| self.inner.serve(request))
            .await
    }
}
