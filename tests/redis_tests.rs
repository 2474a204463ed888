// Tests against a live Redis server
// Run with: REDBLOOM_ADDRESS=127.0.0.1:6379 cargo test -- --ignored

use redbloom::store::Store;
use redbloom::{BloomStorage, FilterParams, RedisStore, StoreOptions, VisitedStorage};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Options from the environment, with a prefix unique to this test run
fn options(test: &str) -> StoreOptions {
    env_logger::builder().is_test(true).try_init().ok();
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let options = StoreOptions::from_env().unwrap();
    let prefix = format!("redbloom_test_{}_{}", test, nanos);
    options.prefix(prefix)
}

#[test]
#[ignore]
fn test_redis_known_identifiers() {
    let options = options("known");
    let store = Arc::new(RedisStore::open(&options).unwrap());
    let storage = BloomStorage::open(store, &options, FilterParams::new(1024, 2)).unwrap();

    storage.visited(231986).unwrap();
    assert!(storage.is_visited(231986).unwrap());
    assert!(!storage.is_visited(999999).unwrap());

    storage.clear().unwrap();
}

#[test]
#[ignore]
fn test_redis_reset_and_clear() {
    let options = options("reset");
    let store = Arc::new(RedisStore::open(&options).unwrap());
    let storage = BloomStorage::open(Arc::clone(&store), &options, FilterParams::new(1 << 16, 14)).unwrap();

    storage.visited(1).unwrap();
    storage.storage().set_cookies("example.com", "a=b").unwrap();
    storage.storage().add_request(b"GET /").unwrap();

    storage.reset().unwrap();
    assert!(!storage.is_visited(1).unwrap());
    assert_eq!(storage.storage().cookies("example.com").unwrap(), "a=b");

    storage.clear().unwrap();
    assert!(store.keys(&format!("{}:*", options.prefix)).unwrap().is_empty());
}

/// The default full-width filter grows the string to the highest set bit
#[test]
#[ignore]
fn test_redis_default_params() {
    let options = options("default");
    let store = Arc::new(RedisStore::open(&options).unwrap());
    let storage = BloomStorage::open(store, &options, FilterParams::default()).unwrap();

    storage.visited(42).unwrap();
    assert!(storage.is_visited(42).unwrap());

    storage.clear().unwrap();
}

#[test]
#[ignore]
fn test_redis_unreachable() {
    env_logger::builder().is_test(true).try_init().ok();
    let options = StoreOptions::new()
        .address("127.0.0.1:1")
        .pool_size(1)
        .connection_timeout(std::time::Duration::from_millis(200));

    let err = RedisStore::open(&options).unwrap_err();
    assert!(err.is_connectivity());
}

/// Clear walks every SCAN page and leaves look-alike namespaces alone
#[test]
#[ignore]
fn test_redis_clear_large_glob_prefix() {
    let base = options("glob");
    let mine_options = base.clone().prefix(format!("{}[1]", base.prefix));
    let theirs_options = base.clone().prefix(format!("{}1", base.prefix));

    let store = Arc::new(RedisStore::open(&base).unwrap());
    let mine = redbloom::Storage::new(Arc::clone(&store), &mine_options);
    let theirs = redbloom::Storage::new(Arc::clone(&store), &theirs_options);

    for id in 0..2_500 {
        mine.visited(id).unwrap();
    }
    theirs.visited(1).unwrap();

    assert_eq!(store.keys(&mine.keys().request_pattern()).unwrap().len(), 2_500);

    mine.clear().unwrap();
    assert!(store.keys(&mine.keys().request_pattern()).unwrap().is_empty());
    assert!(theirs.is_visited(1).unwrap());

    theirs.clear().unwrap();
}
