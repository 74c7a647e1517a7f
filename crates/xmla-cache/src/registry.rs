//! Session registry shared by the store implementations.
//!
//! `configure` registers a [`CacheSession`] here and hands out its id; every
//! later `get`/`put` resolves the id back to the session's partition. An id
//! the registry never issued resolves to [`CacheError::Uninitialized`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::config::props;
use crate::error::{CacheError, Result};
use crate::key::SessionId;
use crate::PropertyMap;

/// How a session without a `Name` property is assigned a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionPolicy {
    /// Each unnamed session gets its own partition.
    Private,
    /// Unnamed sessions share the given partition. It never coincides with
    /// a partition chosen through `Name`.
    Shared(String),
}

/// State registered for one logical connection.
#[derive(Debug, Clone)]
pub struct CacheSession {
    /// Identifier handed back to the connection.
    pub id: SessionId,

    /// Partition this session reads and writes.
    pub partition: String,

    /// Connection config overlaid with the cache properties.
    pub config: PropertyMap,

    /// Cache properties as passed to `configure`.
    pub cache_props: PropertyMap,

    /// When the session was configured.
    pub created_at: DateTime<Utc>,
}

/// Thread-safe map of issued sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, CacheSession>>,
    sequence: AtomicU64,
    policy: PartitionPolicy,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(policy: PartitionPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            policy,
        }
    }

    /// Register a new session and return a copy of its state.
    ///
    /// Every call issues a distinct id, even for identical inputs. Sessions
    /// share entries only when they name the same partition.
    pub fn register(&self, connection_config: &PropertyMap, cache_props: &PropertyMap) -> CacheSession {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = SessionId::issue(sequence);

        let partition = match cache_props.get(props::NAME).map(|n| n.trim()) {
            Some(name) if !name.is_empty() => format!("named:{}", name),
            _ => match &self.policy {
                PartitionPolicy::Private => format!("session:{}", id),
                PartitionPolicy::Shared(name) => format!("shared:{}", name),
            },
        };

        let mut config = connection_config.clone();
        config.extend(cache_props.iter().map(|(k, v)| (k.clone(), v.clone())));

        let session = CacheSession {
            id: id.clone(),
            partition,
            config,
            cache_props: cache_props.clone(),
            created_at: Utc::now(),
        };

        debug!(
            session = %session.id,
            partition = %session.partition,
            "Cache session configured"
        );

        self.sessions.write().insert(id, session.clone());
        session
    }

    /// Resolve a session id.
    pub fn lookup(&self, id: &SessionId) -> Result<CacheSession> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CacheError::Uninitialized(id.clone()))
    }

    /// Resolve a session id to its partition name.
    pub fn partition_of(&self, id: &SessionId) -> Result<String> {
        self.sessions
            .read()
            .get(id)
            .map(|s| s.partition.clone())
            .ok_or_else(|| CacheError::Uninitialized(id.clone()))
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if no session was registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
