//! Response caching for HTTP clients and servers.
//!
//! Wrap an outbound transport in [`CacheTransport`] or an inbound handler in
//! [`CacheHandler`]; both serve repeat requests from a pluggable [`Storer`]
//! and coalesce concurrent misses for the same key onto a single origin
//! call. Which requests participate, how keys are derived, and which
//! responses are kept are all policy objects swappable through the builders.

pub mod coalesce;
pub mod codec;
pub mod discard;
mod engine;
pub mod filter;
pub mod handler;
pub mod key;
pub mod message;
pub mod pool;
pub mod store;
pub mod transport;

pub use discard::{Discarder, StatusDiscarder};
pub use filter::{Filterer, MethodFilterer};
pub use handler::{CacheHandler, Handler, HandlerFn};
pub use key::{HostKeyer, JointKeyer, Keyer, PathKeyer};
pub use message::{Body, Request, Response, ResponseHead};
pub use store::{DiskStore, EntrySink, MemoryStore, Storer};
pub use transport::{CacheTransport, Transport, TransportFn};
