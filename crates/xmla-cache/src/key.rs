//! Session identifiers and cache keys.

use std::fmt;

use bytes::Bytes;
use url::Url;

use crate::error::{CacheError, Result};

/// Opaque session identifier issued by [`CacheStore::configure`].
///
/// [`CacheStore::configure`]: crate::CacheStore::configure
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier.
    ///
    /// Only ids returned by `configure` are accepted by a store; anything
    /// else fails with [`CacheError::Uninitialized`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Issue a fresh id. `sequence` keeps ids ordered within a store, the
    /// UUID keeps them unique across stores and processes.
    pub(crate) fn issue(sequence: u64) -> Self {
        Self(format!("s{}-{}", sequence, uuid::Uuid::new_v4().simple()))
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Composite cache key: session, endpoint and exact request bytes.
///
/// Equality is byte-exact on all three parts. The same MDX sent to two
/// endpoints, or under two sessions, never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    session: SessionId,
    url: Url,
    request: Bytes,
}

impl CacheKey {
    /// Build a key, rejecting an empty request payload.
    pub fn new(session: SessionId, url: Url, request: impl Into<Bytes>) -> Result<Self> {
        let request = request.into();
        validate_request(&request)?;
        Ok(Self {
            session,
            url,
            request,
        })
    }

    /// Session the key belongs to.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Target endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Exact outgoing request bytes.
    pub fn request(&self) -> &Bytes {
        &self.request
    }

    /// The part of the key that identifies an entry inside a partition.
    pub(crate) fn entry_key(&self) -> EntryKey {
        EntryKey {
            url: self.url.as_str().to_string(),
            request: self.request.clone(),
        }
    }
}

/// Key of an entry within one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EntryKey {
    pub url: String,
    pub request: Bytes,
}

impl EntryKey {
    pub(crate) fn new(url: &Url, request: &[u8]) -> Self {
        Self {
            url: url.as_str().to_string(),
            request: Bytes::copy_from_slice(request),
        }
    }
}

/// Reject malformed keys before they reach a store.
pub(crate) fn validate_request(request: &[u8]) -> Result<()> {
    if request.is_empty() {
        return Err(CacheError::InvalidKey(
            "request payload must not be empty".to_string(),
        ));
    }
    Ok(())
}
