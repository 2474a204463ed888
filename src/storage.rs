//! Exact-match crawl storage.
//!
//! Keeps one key per visited request, a cookie jar per host, and a FIFO
//! request queue, all under the namespace of a [`KeySpace`]. Visited markers
//! here are exact (no false positives) but cost one key per request; see
//! [`crate::BloomStorage`] for the bounded-memory variant.

use crate::config::StoreOptions;
use crate::keys::KeySpace;
use crate::store::Store;
use crate::Result;
use parking_lot::RwLock;
use std::time::Duration;

/// The visited-request contract consumed by crawl schedulers.
pub trait VisitedStorage {
    /// Records that `request_id` has been visited.
    fn visited(&self, request_id: u64) -> Result<()>;

    /// Returns true if `request_id` has been visited.
    fn is_visited(&self, request_id: u64) -> Result<bool>;
}

/// Exact-match storage over a [`Store`].
pub struct Storage<S> {
    store: S,
    keys: KeySpace,

    /// Expiration of visited markers
    expires: Option<Duration>,

    /// Serializes cookie writes and clears against cookie reads
    cookie_lock: RwLock<()>,
}

impl<S: Store> Storage<S> {
    /// Creates storage for the namespace in `options` without contacting the store.
    pub fn new(store: S, options: &StoreOptions) -> Self {
        Self {
            store,
            keys: KeySpace::new(options.prefix.clone()),
            expires: options.expires,
            cookie_lock: RwLock::new(()),
        }
    }

    /// Creates storage and checks that the store is reachable.
    pub fn open(store: S, options: &StoreOptions) -> Result<Self> {
        store.ping()?;
        log::info!("Opened storage with prefix {:?}", options.prefix);
        Ok(Self::new(store, options))
    }

    /// Returns the key layout.
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces the cookies stored for `host`.
    pub fn set_cookies(&self, host: &str, cookies: &str) -> Result<()> {
        let _guard = self.cookie_lock.write();
        self.store.set(&self.keys.cookie(host), cookies.as_bytes(), None)
    }

    /// Returns the cookies stored for `host`, or an empty string.
    pub fn cookies(&self, host: &str) -> Result<String> {
        let _guard = self.cookie_lock.read();
        let value = self.store.get(&self.keys.cookie(host))?;
        Ok(value.map(|v| String::from_utf8_lossy(&v).into_owned()).unwrap_or_default())
    }

    /// Appends a serialized request to the queue.
    pub fn add_request(&self, request: &[u8]) -> Result<()> {
        self.store.rpush(&self.keys.queue(), request)?;
        Ok(())
    }

    /// Pops the oldest queued request, if any.
    pub fn get_request(&self) -> Result<Option<Vec<u8>>> {
        self.store.lpop(&self.keys.queue())
    }

    /// Number of queued requests.
    pub fn queue_size(&self) -> Result<u64> {
        self.store.llen(&self.keys.queue())
    }

    /// Removes every cookie, visited marker and the queue of this namespace.
    pub fn clear(&self) -> Result<()> {
        self.clear_with(Vec::new())
    }

    /// Like [`Storage::clear`], also deleting `extra` keys in the same call.
    pub(crate) fn clear_with(&self, extra: Vec<String>) -> Result<()> {
        let _guard = self.cookie_lock.write();

        let mut keys = self.store.keys(&self.keys.cookie_pattern())?;
        keys.extend(self.store.keys(&self.keys.request_pattern())?);
        keys.push(self.keys.queue());
        keys.extend(extra);

        let removed = self.store.del(&keys)?;
        log::info!("Cleared namespace {:?} ({} keys removed)", self.keys.prefix(), removed);
        Ok(())
    }
}

impl<S: Store> VisitedStorage for Storage<S> {
    fn visited(&self, request_id: u64) -> Result<()> {
        self.store.set(&self.keys.request(request_id), b"1", self.expires)
    }

    fn is_visited(&self, request_id: u64) -> Result<bool> {
        Ok(self.store.get(&self.keys.request(request_id))?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn setup(prefix: &str) -> (Arc<MemoryStore>, Storage<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let storage = Storage::open(Arc::clone(&store), &StoreOptions::new().prefix(prefix)).unwrap();
        (store, storage)
    }

    #[test]
    fn test_visited() {
        let (store, storage) = setup("test");

        assert!(!storage.is_visited(42).unwrap());
        storage.visited(42).unwrap();
        assert!(storage.is_visited(42).unwrap());
        assert!(!storage.is_visited(43).unwrap());
        assert_eq!(store.get("test:request:42").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_visited_expires() {
        let store = Arc::new(MemoryStore::new());
        let options = StoreOptions::new().prefix("test").expires(Duration::from_millis(20));
        let storage = Storage::new(Arc::clone(&store), &options);

        storage.visited(7).unwrap();
        assert!(storage.is_visited(7).unwrap());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!storage.is_visited(7).unwrap());
    }

    #[test]
    fn test_cookies() {
        let (_store, storage) = setup("test");

        assert_eq!(storage.cookies("example.com").unwrap(), "");
        storage.set_cookies("example.com", "session=abc").unwrap();
        assert_eq!(storage.cookies("example.com").unwrap(), "session=abc");
        storage.set_cookies("example.com", "session=def").unwrap();
        assert_eq!(storage.cookies("example.com").unwrap(), "session=def");
        assert_eq!(storage.cookies("other.org").unwrap(), "");
    }

    #[test]
    fn test_queue_fifo() {
        let (_store, storage) = setup("queue_test");
        let urls = ["http://example.com/", "http://go-colly.org/", "https://xx.yy/zz"];

        for url in &urls {
            storage.add_request(url.as_bytes()).unwrap();
        }
        assert_eq!(storage.queue_size().unwrap(), 3);

        for url in &urls {
            assert_eq!(storage.get_request().unwrap(), Some(url.as_bytes().to_vec()));
        }
        assert_eq!(storage.get_request().unwrap(), None);
        assert_eq!(storage.queue_size().unwrap(), 0);
    }

    #[test]
    fn test_clear_only_own_namespace() {
        let store = Arc::new(MemoryStore::new());
        let mine = Storage::new(Arc::clone(&store), &StoreOptions::new().prefix("mine"));
        let theirs = Storage::new(Arc::clone(&store), &StoreOptions::new().prefix("theirs"));

        for storage in [&mine, &theirs] {
            storage.visited(1).unwrap();
            storage.set_cookies("example.com", "a=b").unwrap();
            storage.add_request(b"req").unwrap();
        }

        mine.clear().unwrap();

        assert!(!mine.is_visited(1).unwrap());
        assert_eq!(mine.cookies("example.com").unwrap(), "");
        assert_eq!(mine.queue_size().unwrap(), 0);

        assert!(theirs.is_visited(1).unwrap());
        assert_eq!(theirs.cookies("example.com").unwrap(), "a=b");
        assert_eq!(theirs.queue_size().unwrap(), 1);
    }

    #[test]
    fn test_clear_empty_namespace() {
        let (_store, storage) = setup("empty");
        storage.clear().unwrap();
    }
}
