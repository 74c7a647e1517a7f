//! In-memory store: bounded partitions with expiry and eviction modes.
//!
//! Entries live in partitions. A session without a `Name` cache property
//! owns a private partition, so two connections with identical settings
//! never see each other's entries. Sessions configured with the same
//! `Name` share one partition; the first session to create it decides its
//! size, timeout and mode.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};
use url::Url;

use crate::config::{EvictionMode, PartitionSettings};
use crate::error::{CacheError, Result};
use crate::key::{CacheKey, EntryKey, SessionId, validate_request};
use crate::registry::{CacheSession, PartitionPolicy, SessionRegistry};
use crate::store::{CacheStore, MEMORY_STORE};
use crate::PropertyMap;

/// A cached response with the bookkeeping eviction needs.
#[derive(Debug, Clone)]
struct CachedResponse {
    response: Bytes,
    cached_at: Instant,
    hits: u64,
    seq: u64,
}

enum Lookup {
    Hit(Bytes),
    Expired,
    Miss,
}

#[derive(Debug, Default)]
struct InsertOutcome {
    evicted: u64,
    expired: u64,
}

/// One partition's entries, kept in recency order.
struct Partition {
    settings: PartitionSettings,
    entries: LruCache<EntryKey, CachedResponse>,
    next_seq: u64,
}

impl Partition {
    fn new(settings: PartitionSettings) -> Self {
        Self {
            settings,
            entries: LruCache::unbounded(),
            next_seq: 0,
        }
    }

    fn lookup(&mut self, key: &EntryKey) -> Lookup {
        let timeout = self.settings.timeout;
        match self.entries.get_mut(key) {
            None => return Lookup::Miss,
            Some(entry) => {
                let expired = timeout.is_some_and(|ttl| entry.cached_at.elapsed() > ttl);
                if !expired {
                    entry.hits += 1;
                    return Lookup::Hit(entry.response.clone());
                }
            }
        }
        self.entries.pop(key);
        Lookup::Expired
    }

    fn insert(&mut self, key: EntryKey, response: Bytes) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        self.next_seq += 1;
        let entry = CachedResponse {
            response,
            cached_at: Instant::now(),
            hits: 0,
            seq: self.next_seq,
        };

        if self.entries.contains(&key) {
            self.entries.put(key, entry);
            return outcome;
        }

        if self.entries.len() >= self.settings.size {
            outcome.expired = self.purge_expired();
        }
        while self.entries.len() >= self.settings.size {
            match self.evict_one() {
                Some(_) => outcome.evicted += 1,
                None => break,
            }
        }

        self.entries.put(key, entry);
        outcome
    }

    fn purge_expired(&mut self) -> u64 {
        let Some(ttl) = self.settings.timeout else {
            return 0;
        };
        let expired: Vec<EntryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.cached_at.elapsed() > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        expired.len() as u64
    }

    fn evict_one(&mut self) -> Option<EntryKey> {
        // `iter()` walks most- to least-recent; reversed, ties go to the
        // least recently used entry.
        let victim = match self.settings.mode {
            EvictionMode::Lru => return self.entries.pop_lru().map(|(key, _)| key),
            EvictionMode::Lfu => pick(self.entries.iter().rev(), |a, b| a.hits < b.hits),
            EvictionMode::Mfu => pick(self.entries.iter().rev(), |a, b| a.hits > b.hits),
            EvictionMode::Fifo => pick(self.entries.iter().rev(), |a, b| a.seq < b.seq),
            EvictionMode::Lifo => pick(self.entries.iter().rev(), |a, b| a.seq > b.seq),
        }?;
        self.entries.pop(&victim);
        Some(victim)
    }
}

/// First entry that no later entry beats.
fn pick<'a>(
    entries: impl Iterator<Item = (&'a EntryKey, &'a CachedResponse)>,
    beats: impl Fn(&CachedResponse, &CachedResponse) -> bool,
) -> Option<EntryKey> {
    let mut best: Option<(&EntryKey, &CachedResponse)> = None;
    for (key, entry) in entries {
        match best {
            Some((_, current)) if !beats(entry, current) => {}
            _ => best = Some((key, entry)),
        }
    }
    best.map(|(key, _)| key.clone())
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing (including expired entries).
    pub misses: u64,
    /// Successful puts.
    pub inserts: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Entries dropped because they outlived the timeout.
    pub expirations: u64,
    /// Entries currently held.
    pub entries: usize,
    /// Partitions currently allocated.
    pub partitions: usize,
    /// Sessions configured so far.
    pub sessions: usize,
}

/// In-memory [`CacheStore`].
pub struct MemoryCache {
    registry: SessionRegistry,
    partitions: RwLock<HashMap<String, Arc<Mutex<Partition>>>>,
    defaults: PartitionSettings,
    counters: Counters,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(PartitionSettings::default())
    }
}

impl MemoryCache {
    /// Create a store whose partitions start from `defaults`.
    pub fn new(defaults: PartitionSettings) -> Self {
        Self {
            registry: SessionRegistry::new(PartitionPolicy::Private),
            partitions: RwLock::new(HashMap::new()),
            defaults,
            counters: Counters::default(),
        }
    }

    /// Default partition settings.
    pub fn defaults(&self) -> &PartitionSettings {
        &self.defaults
    }

    /// Like [`CacheStore::configure`], but rejects unusable cache properties
    /// instead of falling back to defaults.
    pub fn try_configure(
        &self,
        connection_config: &PropertyMap,
        cache_props: &PropertyMap,
    ) -> Result<SessionId> {
        let settings = self.defaults.overlay(cache_props)?;
        Ok(self.register(connection_config, cache_props, settings))
    }

    /// Registered state of a session.
    pub fn session(&self, session: &SessionId) -> Result<CacheSession> {
        self.registry.lookup(session)
    }

    /// Settings in effect for a session's partition.
    pub fn partition_settings(&self, session: &SessionId) -> Result<PartitionSettings> {
        Ok(self.partition(session)?.lock().settings.clone())
    }

    /// Check for a live entry without touching recency or hit counts.
    pub fn contains(&self, key: &CacheKey) -> Result<bool> {
        let partition = self.partition(key.session())?;
        let partition = partition.lock();
        let timeout = partition.settings.timeout;
        Ok(partition
            .entries
            .peek(&key.entry_key())
            .is_some_and(|entry| timeout.is_none_or(|ttl| entry.cached_at.elapsed() <= ttl)))
    }

    /// Total number of entries across partitions.
    pub fn len(&self) -> usize {
        self.partitions
            .read()
            .values()
            .map(|p| p.lock().entries.len())
            .sum()
    }

    /// Check if no partition holds an entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries everywhere and return how many were dropped.
    pub fn purge_expired(&self) -> u64 {
        let partitions: Vec<_> = self.partitions.read().values().cloned().collect();
        let purged: u64 = partitions.iter().map(|p| p.lock().purge_expired()).sum();
        if purged > 0 {
            self.counters.expirations.fetch_add(purged, Ordering::Relaxed);
            debug!(count = purged, "Purged expired cache entries");
        }
        purged
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let partitions = self.partitions.read();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            entries: partitions.values().map(|p| p.lock().entries.len()).sum(),
            partitions: partitions.len(),
            sessions: self.registry.len(),
        }
    }

    fn register(
        &self,
        connection_config: &PropertyMap,
        cache_props: &PropertyMap,
        settings: PartitionSettings,
    ) -> SessionId {
        let session = self.registry.register(connection_config, cache_props);

        match self.partitions.write().entry(session.partition.clone()) {
            Entry::Occupied(_) => {
                debug!(
                    session = %session.id,
                    partition = %session.partition,
                    "Joining existing cache partition"
                );
            }
            Entry::Vacant(slot) => {
                debug!(
                    partition = %session.partition,
                    size = settings.size,
                    mode = %settings.mode,
                    "Creating cache partition"
                );
                slot.insert(Arc::new(Mutex::new(Partition::new(settings))));
            }
        }

        session.id
    }

    fn partition(&self, session: &SessionId) -> Result<Arc<Mutex<Partition>>> {
        let name = self.registry.partition_of(session)?;
        self.partitions
            .read()
            .get(&name)
            .cloned()
            .ok_or_else(|| CacheError::Uninitialized(session.clone()))
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, session: &SessionId, url: &Url, request: &[u8]) -> Result<Option<Bytes>> {
        validate_request(request)?;
        let partition = self.partition(session)?;
        let key = EntryKey::new(url, request);

        let lookup = partition.lock().lookup(&key);
        match lookup {
            Lookup::Hit(response) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                trace!(session = %session, url = %url, bytes = response.len(), "Cache hit");
                Ok(Some(response))
            }
            Lookup::Expired => {
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                trace!(session = %session, url = %url, "Cache entry expired");
                Ok(None)
            }
            Lookup::Miss => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                trace!(session = %session, url = %url, "Cache miss");
                Ok(None)
            }
        }
    }

    fn put(&self, session: &SessionId, url: &Url, request: &[u8], response: Bytes) -> Result<()> {
        validate_request(request)?;
        let partition = self.partition(session)?;

        let outcome = partition.lock().insert(EntryKey::new(url, request), response);

        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        if outcome.evicted > 0 {
            self.counters
                .evictions
                .fetch_add(outcome.evicted, Ordering::Relaxed);
            debug!(session = %session, count = outcome.evicted, "Evicted cache entries to make room");
        }
        if outcome.expired > 0 {
            self.counters
                .expirations
                .fetch_add(outcome.expired, Ordering::Relaxed);
        }
        Ok(())
    }

    fn flush_all(&self) {
        let partitions = self.partitions.read();
        let mut dropped = 0;
        for partition in partitions.values() {
            let mut partition = partition.lock();
            dropped += partition.entries.len();
            partition.entries.clear();
        }
        debug!(count = dropped, "Flushed all cache partitions");
    }

    fn configure(&self, connection_config: &PropertyMap, cache_props: &PropertyMap) -> SessionId {
        let settings = self.defaults.overlay_lossy(cache_props);
        self.register(connection_config, cache_props, settings)
    }

    fn name(&self) -> &str {
        MEMORY_STORE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn props(pairs: &[(&str, &str)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn url() -> Url {
        Url::parse("http://olap.local/xmla").unwrap()
    }

    fn bytes(b: &[u8]) -> Bytes {
        Bytes::copy_from_slice(b)
    }

    #[test]
    fn test_put_then_get_and_different_request_misses() {
        let cache = MemoryCache::default();
        let s1 = cache.configure(&props(&[("User", "a")]), &PropertyMap::new());

        cache.put(&s1, &url(), &[0x41, 0x42], bytes(&[0x01])).unwrap();

        assert_eq!(cache.get(&s1, &url(), &[0x41, 0x42]).unwrap(), Some(bytes(&[0x01])));
        assert_eq!(cache.get(&s1, &url(), &[0x41, 0x43]).unwrap(), None);
    }

    #[test]
    fn test_endpoint_is_part_of_the_key() {
        let cache = MemoryCache::default();
        let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());
        let other = Url::parse("http://olap.local/other").unwrap();

        cache.put(&s, &url(), b"req", bytes(b"resp")).unwrap();
        assert_eq!(cache.get(&s, &other, b"req").unwrap(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = MemoryCache::default();
        let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());

        cache.put(&s, &url(), b"req", bytes(b"first")).unwrap();
        cache.put(&s, &url(), b"req", bytes(b"second")).unwrap();

        assert_eq!(cache.get(&s, &url(), b"req").unwrap(), Some(bytes(b"second")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unregistered_session_is_uninitialized() {
        let cache = MemoryCache::default();
        let stranger = SessionId::new("S1");

        assert!(cache.get(&stranger, &url(), b"req").unwrap_err().is_uninitialized());
        assert!(
            cache
                .put(&stranger, &url(), b"req", bytes(b"x"))
                .unwrap_err()
                .is_uninitialized()
        );
    }

    #[test]
    fn test_session_from_another_store_is_uninitialized() {
        let first = MemoryCache::default();
        let second = MemoryCache::default();
        let s = first.configure(&PropertyMap::new(), &PropertyMap::new());

        assert!(second.get(&s, &url(), b"req").unwrap_err().is_uninitialized());
    }

    #[test]
    fn test_empty_request_is_invalid_key() {
        let cache = MemoryCache::default();
        let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());

        assert!(matches!(cache.get(&s, &url(), b""), Err(CacheError::InvalidKey(_))));
        assert!(matches!(
            cache.put(&s, &url(), b"", bytes(b"x")),
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_flush_all_clears_every_session() {
        let cache = MemoryCache::default();
        let a = cache.configure(&PropertyMap::new(), &PropertyMap::new());
        let b = cache.configure(&PropertyMap::new(), &props(&[("Name", "shared")]));

        cache.put(&a, &url(), b"q1", bytes(b"r1")).unwrap();
        cache.put(&b, &url(), b"q2", bytes(b"r2")).unwrap();
        cache.flush_all();

        assert_eq!(cache.get(&a, &url(), b"q1").unwrap(), None);
        assert_eq!(cache.get(&b, &url(), b"q2").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_identical_configs_are_isolated() {
        let cache = MemoryCache::default();
        let config = props(&[("User", "a")]);
        let a = cache.configure(&config, &PropertyMap::new());
        let b = cache.configure(&config, &PropertyMap::new());
        assert_ne!(a, b);

        cache.put(&a, &url(), b"q", bytes(b"from-a")).unwrap();
        assert_eq!(cache.get(&b, &url(), b"q").unwrap(), None);

        cache.put(&b, &url(), b"q", bytes(b"from-b")).unwrap();
        assert_eq!(cache.get(&a, &url(), b"q").unwrap(), Some(bytes(b"from-a")));
    }

    #[test]
    fn test_named_sessions_share_entries() {
        let cache = MemoryCache::default();
        let named = props(&[("Name", "team")]);
        let a = cache.configure(&PropertyMap::new(), &named);
        let b = cache.configure(&PropertyMap::new(), &named);

        cache.put(&a, &url(), b"q", bytes(b"r")).unwrap();
        assert_eq!(cache.get(&b, &url(), b"q").unwrap(), Some(bytes(b"r")));
        assert_eq!(cache.stats().partitions, 1);
    }

    #[test]
    fn test_first_session_decides_shared_settings() {
        let cache = MemoryCache::default();
        let a = cache.configure(&PropertyMap::new(), &props(&[("Name", "t"), ("Size", "3")]));
        let b = cache.configure(&PropertyMap::new(), &props(&[("Name", "t"), ("Size", "9")]));

        assert_eq!(cache.partition_settings(&a).unwrap().size, 3);
        assert_eq!(cache.partition_settings(&b).unwrap().size, 3);
    }

    #[test]
    fn test_configure_falls_back_on_bad_props_but_try_configure_rejects() {
        let cache = MemoryCache::default();
        let bad = props(&[("Size", "lots")]);

        let s = cache.configure(&PropertyMap::new(), &bad);
        assert_eq!(cache.partition_settings(&s).unwrap().size, 50);

        assert!(matches!(
            cache.try_configure(&PropertyMap::new(), &bad),
            Err(CacheError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn test_session_keeps_merged_config() {
        let cache = MemoryCache::default();
        let s = cache.configure(&props(&[("User", "a")]), &props(&[("Mode", "FIFO")]));
        let session = cache.session(&s).unwrap();
        assert_eq!(session.config.get("User").unwrap(), "a");
        assert_eq!(session.config.get("Mode").unwrap(), "FIFO");
    }

    fn two_slot_cache(mode: &str) -> (MemoryCache, SessionId) {
        let cache = MemoryCache::default();
        let s = cache
            .try_configure(&PropertyMap::new(), &props(&[("Size", "2"), ("Mode", mode)]))
            .unwrap();
        (cache, s)
    }

    fn present(cache: &MemoryCache, s: &SessionId, req: &[u8]) -> bool {
        let key = CacheKey::new(s.clone(), url(), req.to_vec()).unwrap();
        cache.contains(&key).unwrap()
    }

    #[test]
    fn test_lru_eviction() {
        let (cache, s) = two_slot_cache("LRU");
        cache.put(&s, &url(), b"a", bytes(b"1")).unwrap();
        cache.put(&s, &url(), b"b", bytes(b"2")).unwrap();
        cache.get(&s, &url(), b"a").unwrap();
        cache.put(&s, &url(), b"c", bytes(b"3")).unwrap();

        assert!(present(&cache, &s, b"a"));
        assert!(!present(&cache, &s, b"b"));
        assert!(present(&cache, &s, b"c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_lfu_eviction() {
        let (cache, s) = two_slot_cache("LFU");
        cache.put(&s, &url(), b"a", bytes(b"1")).unwrap();
        cache.put(&s, &url(), b"b", bytes(b"2")).unwrap();
        cache.get(&s, &url(), b"a").unwrap();
        cache.get(&s, &url(), b"a").unwrap();
        cache.get(&s, &url(), b"b").unwrap();
        cache.put(&s, &url(), b"c", bytes(b"3")).unwrap();

        assert!(present(&cache, &s, b"a"));
        assert!(!present(&cache, &s, b"b"));
    }

    #[test]
    fn test_mfu_eviction() {
        let (cache, s) = two_slot_cache("MFU");
        cache.put(&s, &url(), b"a", bytes(b"1")).unwrap();
        cache.put(&s, &url(), b"b", bytes(b"2")).unwrap();
        cache.get(&s, &url(), b"a").unwrap();
        cache.put(&s, &url(), b"c", bytes(b"3")).unwrap();

        assert!(!present(&cache, &s, b"a"));
        assert!(present(&cache, &s, b"b"));
    }

    #[test]
    fn test_fifo_eviction_ignores_reads() {
        let (cache, s) = two_slot_cache("FIFO");
        cache.put(&s, &url(), b"a", bytes(b"1")).unwrap();
        cache.put(&s, &url(), b"b", bytes(b"2")).unwrap();
        cache.get(&s, &url(), b"a").unwrap();
        cache.put(&s, &url(), b"c", bytes(b"3")).unwrap();

        assert!(!present(&cache, &s, b"a"));
        assert!(present(&cache, &s, b"b"));
    }

    #[test]
    fn test_lifo_eviction() {
        let (cache, s) = two_slot_cache("LIFO");
        cache.put(&s, &url(), b"a", bytes(b"1")).unwrap();
        cache.put(&s, &url(), b"b", bytes(b"2")).unwrap();
        cache.put(&s, &url(), b"c", bytes(b"3")).unwrap();

        assert!(present(&cache, &s, b"a"));
        assert!(!present(&cache, &s, b"b"));
        assert!(present(&cache, &s, b"c"));
    }

    #[test]
    fn test_replacing_a_key_does_not_evict() {
        let (cache, s) = two_slot_cache("LRU");
        cache.put(&s, &url(), b"a", bytes(b"1")).unwrap();
        cache.put(&s, &url(), b"b", bytes(b"2")).unwrap();
        cache.put(&s, &url(), b"a", bytes(b"3")).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_entries_expire() {
        let cache = MemoryCache::new(PartitionSettings::new().with_timeout(Duration::from_millis(20)));
        let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());
        cache.put(&s, &url(), b"q", bytes(b"r")).unwrap();
        assert!(cache.get(&s, &url(), b"q").unwrap().is_some());

        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.get(&s, &url(), b"q").unwrap(), None);
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryCache::new(PartitionSettings::new().with_timeout(Duration::from_millis(20)));
        let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());
        cache.put(&s, &url(), b"q1", bytes(b"r")).unwrap();
        cache.put(&s, &url(), b"q2", bytes(b"r")).unwrap();

        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_timeout_never_expires() {
        let cache = MemoryCache::default();
        let s = cache.configure(&PropertyMap::new(), &props(&[("Timeout", "0")]));
        assert_eq!(cache.partition_settings(&s).unwrap().timeout, None);
    }

    #[test]
    fn test_stats() {
        let cache = MemoryCache::default();
        let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());
        cache.put(&s, &url(), b"q", bytes(b"r")).unwrap();
        cache.get(&s, &url(), b"q").unwrap();
        cache.get(&s, &url(), b"other").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.sessions, 1);
    }

    #[test]
    fn test_concurrent_sessions_do_not_interfere() {
        let cache = Arc::new(MemoryCache::new(PartitionSettings::new().with_size(1_000)));
        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let s = cache.configure(&PropertyMap::new(), &PropertyMap::new());
                    for i in 0..200u8 {
                        let request = [t, i];
                        cache.put(&s, &url(), &request, bytes(&[t, i, 0xFF])).unwrap();
                    }
                    for i in 0..200u8 {
                        let request = [t, i];
                        assert_eq!(
                            cache.get(&s, &url(), &request).unwrap(),
                            Some(bytes(&[t, i, 0xFF]))
                        );
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1_600);
    }
}
