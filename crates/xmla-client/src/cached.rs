//! Transport with the response cache in front of the wire.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;
use xmla_cache::{SessionId, SharedStore};

use crate::error::{Error, Result};
use crate::transport::SharedTransport;

/// Store plus the session this transport reads and writes.
struct CacheBinding {
    store: SharedStore,
    session: SessionId,
}

/// Consults a [`CacheStore`](xmla_cache::CacheStore) before every
/// round-trip and records successful responses.
///
/// Only complete, successful, fault-free responses reach the store. A
/// cancelled or dropped [`send`](Self::send) caches nothing, because the
/// store is written only after the full body has arrived.
pub struct CachedTransport {
    inner: SharedTransport,
    cache: Option<CacheBinding>,
    cancel: CancellationToken,
}

impl CachedTransport {
    /// Wrap a transport without a cache.
    pub fn new(inner: SharedTransport) -> Self {
        Self {
            inner,
            cache: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Read and write `store` under `session`.
    pub fn with_cache(mut self, store: SharedStore, session: SessionId) -> Self {
        self.cache = Some(CacheBinding { store, session });
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Session id used for cache lookups, if a cache is attached.
    pub fn session(&self) -> Option<&SessionId> {
        self.cache.as_ref().map(|c| &c.session)
    }

    /// The attached store, if any.
    pub fn store(&self) -> Option<&SharedStore> {
        self.cache.as_ref().map(|c| &c.store)
    }

    /// Abandon in-flight and future requests.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check if [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send a request, answering from the cache when possible.
    ///
    /// A cache lookup error fails the call; it is never treated as a miss.
    /// A failure to store the response is logged and the response is still
    /// returned.
    pub async fn send(&self, url: &Url, action: &str, request: Bytes) -> Result<Bytes> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Some(cache) = &self.cache
            && let Some(response) = cache.store.get(&cache.session, url, &request)?
        {
            debug!(
                session = %cache.session,
                store = cache.store.name(),
                bytes = response.len(),
                "Serving response from cache"
            );
            return Ok(response);
        }

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(url = %url, "Request cancelled before a response arrived");
                return Err(Error::Cancelled);
            }
            result = self.inner.post(url, action, request.clone()) => result?,
        };

        if let Some(cache) = &self.cache {
            match cache.store.put(&cache.session, url, &request, response.clone()) {
                Ok(()) => trace!(session = %cache.session, "Cached response"),
                Err(e) => warn!(
                    session = %cache.session,
                    store = cache.store.name(),
                    error = %e,
                    "Failed to cache response"
                ),
            }
        }

        Ok(response)
    }
}
