use http::Method;

use crate::message::Request;

/// Decides whether the cache applies to a request at all. Pure predicate;
/// must be safe to call concurrently and repeatedly for the same request.
pub trait Filterer: Send + Sync {
    fn filter(&self, request: &Request) -> bool;
}

impl<F> Filterer for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn filter(&self, request: &Request) -> bool {
        self(request)
    }
}

/// Accepts requests whose method is in a fixed set.
pub struct MethodFilterer {
    methods: Vec<Method>,
}

impl MethodFilterer {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Filterer for MethodFilterer {
    fn filter(&self, request: &Request) -> bool {
        self.methods.iter().any(|method| *method == request.method)
    }
}

/// Accepts requests whose URI path starts with a fixed prefix.
pub struct PrefixFilterer {
    prefix: String,
}

impl PrefixFilterer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Filterer for PrefixFilterer {
    fn filter(&self, request: &Request) -> bool {
        request.uri.path().starts_with(&self.prefix)
    }
}

/// AND-join: accepts only when every inner filterer accepts, short-circuiting
/// on the first rejection. Callers should supply at least one filterer; the
/// empty join is vacuously accepting.
pub struct AllOf {
    filterers: Vec<Box<dyn Filterer>>,
}

impl AllOf {
    pub fn new(filterers: Vec<Box<dyn Filterer>>) -> Self {
        Self { filterers }
    }
}

impl Filterer for AllOf {
    fn filter(&self, request: &Request) -> bool {
        self.filterers.iter().all(|inner| inner.filter(request))
    }
}

/// OR-join: accepts when any inner filterer accepts, short-circuiting on the
/// first acceptance. The empty join rejects everything.
pub struct AnyOf {
    filterers: Vec<Box<dyn Filterer>>,
}

impl AnyOf {
    pub fn new(filterers: Vec<Box<dyn Filterer>>) -> Self {
        Self { filterers }
    }
}

impl Filterer for AnyOf {
    fn filter(&self, request: &Request) -> bool {
        self.filterers.iter().any(|inner| inner.filter(request))
    }
}
