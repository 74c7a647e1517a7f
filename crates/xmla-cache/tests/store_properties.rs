//! Property tests for the store contract, run against every store kind.

use bytes::Bytes;
use proptest::prelude::*;
use tempfile::TempDir;
use url::Url;
use xmla_cache::{CacheStore, MemoryCache, PartitionSettings, PropertyMap, ReplayCache, SessionId};

fn endpoint() -> Url {
    Url::parse("http://olap.local/xmla").unwrap()
}

fn request_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..256)
}

fn response_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

fn memory_store() -> MemoryCache {
    MemoryCache::new(PartitionSettings::new().without_timeout().with_size(1_000))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A stored response comes back byte for byte.
    #[test]
    fn prop_memory_get_returns_last_put(
        request in request_strategy(),
        first in response_strategy(),
        second in response_strategy(),
    ) {
        let store = memory_store();
        let session = store.configure(&PropertyMap::new(), &PropertyMap::new());

        store.put(&session, &endpoint(), &request, Bytes::from(first)).unwrap();
        store.put(&session, &endpoint(), &request, Bytes::from(second.clone())).unwrap();

        prop_assert_eq!(store.get(&session, &endpoint(), &request).unwrap(), Some(Bytes::from(second)));
    }

    /// Requests that differ in any byte never alias.
    #[test]
    fn prop_memory_distinct_requests_do_not_alias(
        a in request_strategy(),
        b in request_strategy(),
        response in response_strategy(),
    ) {
        prop_assume!(a != b);
        let store = memory_store();
        let session = store.configure(&PropertyMap::new(), &PropertyMap::new());

        store.put(&session, &endpoint(), &a, Bytes::from(response)).unwrap();

        prop_assert_eq!(store.get(&session, &endpoint(), &b).unwrap(), None);
    }

    /// After a flush every previously stored key misses.
    #[test]
    fn prop_memory_flush_empties(requests in prop::collection::vec(request_strategy(), 1..20)) {
        let store = memory_store();
        let session = store.configure(&PropertyMap::new(), &PropertyMap::new());
        for request in &requests {
            store.put(&session, &endpoint(), request, Bytes::from_static(b"r")).unwrap();
        }

        store.flush_all();

        for request in &requests {
            prop_assert_eq!(store.get(&session, &endpoint(), request).unwrap(), None);
        }
    }

    /// Ids that `configure` never issued are always rejected.
    #[test]
    fn prop_memory_foreign_ids_are_uninitialized(id in "[a-zA-Z0-9-]{1,40}", request in request_strategy()) {
        let store = memory_store();
        store.configure(&PropertyMap::new(), &PropertyMap::new());

        let err = store.get(&SessionId::new(id), &endpoint(), &request).unwrap_err();
        prop_assert!(err.is_uninitialized());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The replay store honours the same round-trip contract.
    #[test]
    fn prop_replay_get_returns_put(request in request_strategy(), response in response_strategy()) {
        let dir = TempDir::new().unwrap();
        let store = ReplayCache::new(dir.path()).unwrap();
        let session = store.configure(&PropertyMap::new(), &PropertyMap::new());

        store.put(&session, &endpoint(), &request, Bytes::from(response.clone())).unwrap();

        prop_assert_eq!(store.get(&session, &endpoint(), &request).unwrap(), Some(Bytes::from(response)));
    }
}
