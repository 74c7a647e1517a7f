//! The cache store contract and the factory that selects an implementation.

use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::config::PartitionSettings;
use crate::error::{CacheError, Result};
use crate::key::SessionId;
use crate::memory::MemoryCache;
use crate::replay::ReplayCache;
use crate::PropertyMap;

/// Name of the in-memory store.
pub const MEMORY_STORE: &str = "memory";

/// Name of the directory-backed replay store.
pub const REPLAY_STORE: &str = "replay";

/// A byte-exact response cache consulted before every SOAP round-trip.
///
/// Implementations never interpret the payloads and never talk to the
/// remote endpoint. They must tolerate concurrent calls from many sessions.
pub trait CacheStore: Send + Sync {
    /// Look up the response stored for `(session, url, request)`.
    ///
    /// Fails with [`CacheError::Uninitialized`] if `session` was not issued
    /// by [`configure`](Self::configure) on this instance, and with
    /// [`CacheError::InvalidKey`] for an empty request.
    fn get(&self, session: &SessionId, url: &Url, request: &[u8]) -> Result<Option<Bytes>>;

    /// Store a response. Last write for an identical key wins.
    fn put(&self, session: &SessionId, url: &Url, request: &[u8], response: Bytes) -> Result<()>;

    /// Drop every entry of every session. Sessions stay registered.
    fn flush_all(&self);

    /// Register a logical connection and return its session id.
    ///
    /// `cache_props` arrive already stripped of their `Cache.` prefix and
    /// take precedence over `connection_config` when merged. Each call
    /// returns a new id; see the store docs for when sessions share entries.
    fn configure(&self, connection_config: &PropertyMap, cache_props: &PropertyMap) -> SessionId;

    /// Short store name for logs.
    fn name(&self) -> &str;
}

/// A store shared across connections.
pub type SharedStore = Arc<dyn CacheStore>;

/// Build a store by name.
///
/// `properties` are the cache properties of the connection that selected
/// the store; they provide construction-time settings such as the replay
/// store's `Directory` or the memory store's default partition settings.
pub fn create_store(kind: &str, properties: &PropertyMap) -> Result<SharedStore> {
    match kind.trim().to_ascii_lowercase().as_str() {
        MEMORY_STORE => {
            let defaults = PartitionSettings::from_properties(properties)?;
            Ok(Arc::new(MemoryCache::new(defaults)))
        }
        REPLAY_STORE => Ok(Arc::new(ReplayCache::from_properties(properties)?)),
        _ => Err(CacheError::UnknownStore(kind.to_string())),
    }
}
