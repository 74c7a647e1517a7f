//! SOAP response cache for the XMLA driver.
//!
//! A [`CacheStore`] maps `(session, endpoint URL, exact request bytes)` to
//! the exact response bytes the server returned. The transport consults it
//! before every round-trip. Stores never parse payloads.
//!
//! Two stores ship with the crate:
//! - [`MemoryCache`]: bounded partitions with a timeout and a choice of
//!   LRU, LFU, MFU, FIFO or LIFO eviction
//! - [`ReplayCache`]: records responses to a directory and replays them
//!
//! # Example
//!
//! ```rust,ignore
//! use xmla_cache::{create_store, CacheStore, PropertyMap};
//!
//! let store = create_store("memory", &PropertyMap::new())?;
//! let session = store.configure(&connection_props, &cache_props);
//!
//! store.put(&session, &url, request, response.clone())?;
//! assert_eq!(store.get(&session, &url, request)?, Some(response));
//! ```

mod config;
mod error;
mod key;
mod memory;
mod registry;
mod replay;
mod store;

/// Property name to value, as parsed from a connect string.
pub type PropertyMap = std::collections::BTreeMap<String, String>;

pub use config::{DEFAULT_SIZE, DEFAULT_TIMEOUT, EvictionMode, PartitionSettings, props};
pub use error::{CacheError, Result};
pub use key::{CacheKey, SessionId};
pub use memory::{CacheStats, MemoryCache};
pub use registry::{CacheSession, PartitionPolicy, SessionRegistry};
pub use replay::{DEFAULT_PARTITION, ReplayCache};
pub use store::{CacheStore, MEMORY_STORE, REPLAY_STORE, SharedStore, create_store};
