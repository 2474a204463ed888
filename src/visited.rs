//! Bloom-filter-backed visited storage.
//!
//! [`BloomStorage`] answers "have I visited this request?" from a fixed-size
//! shared bit array instead of one key per request. Request identifiers are
//! encoded as 8 little-endian bytes before entering the filter.

use crate::bitset::ScriptedBitArray;
use crate::config::{FilterParams, StoreOptions};
use crate::filter::BloomFilter;
use crate::storage::{Storage, VisitedStorage};
use crate::store::Store;
use crate::Result;
use std::sync::Arc;

/// Encodes a request identifier as the filter payload.
fn request_payload(request_id: u64) -> [u8; 8] {
    request_id.to_le_bytes()
}

/// Visited storage backed by a shared Bloom filter.
///
/// Cookies and the request queue are kept in the exact-match [`Storage`] of
/// the same namespace, available through [`BloomStorage::storage`]. The
/// filter lives under `<prefix>:bloom`.
///
/// `is_visited` never returns false for a request whose `visited` call
/// completed earlier, but may return true for a request that was never
/// visited, at the rate given by [`FilterParams::false_positive_rate`].
///
/// # Example
///
/// ```
/// use redbloom::store::MemoryStore;
/// use redbloom::{BloomStorage, FilterParams, StoreOptions, VisitedStorage};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), redbloom::Error> {
/// let options = StoreOptions::new().prefix("crawl");
/// let storage = BloomStorage::open(Arc::new(MemoryStore::new()), &options, FilterParams::new(1 << 20, 14))?;
///
/// storage.visited(231986)?;
/// assert!(storage.is_visited(231986)?);
/// # Ok(())
/// # }
/// ```
pub struct BloomStorage<S: ?Sized> {
    storage: Storage<Arc<S>>,
    filter: BloomFilter<ScriptedBitArray<Arc<S>>>,
}

impl<S: Store + ?Sized> BloomStorage<S> {
    /// Binds the filter of the namespace in `options` and checks that the store
    /// is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` are invalid or the store cannot be reached.
    pub fn open(store: Arc<S>, options: &StoreOptions, params: FilterParams) -> Result<Self> {
        let storage = Storage::open(Arc::clone(&store), options)?;
        let filter = BloomFilter::with_store(store, storage.keys().bloom(), params)?;

        log::info!(
            "Bound bloom filter {} (width {}, {} hashes)",
            filter.key(),
            params.width,
            params.hash_count
        );

        Ok(Self { storage, filter })
    }

    /// Returns the filter parameters.
    pub fn params(&self) -> &FilterParams {
        self.filter.params()
    }

    /// Key holding the filter's bit array.
    pub fn bloom_key(&self) -> &str {
        self.filter.key()
    }

    /// Returns the exact-match storage of the same namespace.
    pub fn storage(&self) -> &Storage<Arc<S>> {
        &self.storage
    }

    /// Deletes the filter's bit array, forgetting every visited request.
    ///
    /// Cookies and the request queue are left untouched.
    pub fn reset(&self) -> Result<()> {
        log::info!("Resetting bloom filter {}", self.filter.key());
        self.filter.clear()
    }

    /// Removes the filter plus every cookie, visited marker and the queue of
    /// this namespace.
    pub fn clear(&self) -> Result<()> {
        self.storage.clear_with(vec![self.filter.key().to_string()])
    }
}

impl<S: Store + ?Sized> VisitedStorage for BloomStorage<S> {
    fn visited(&self, request_id: u64) -> Result<()> {
        self.filter.add(&request_payload(request_id))
    }

    fn is_visited(&self, request_id: u64) -> Result<bool> {
        self.filter.exists(&request_payload(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn setup(params: FilterParams) -> (Arc<MemoryStore>, BloomStorage<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let storage = BloomStorage::open(Arc::clone(&store), &StoreOptions::new().prefix("test"), params).unwrap();
        (store, storage)
    }

    #[test]
    fn test_request_payload_is_little_endian() {
        assert_eq!(request_payload(1), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(request_payload(0x0102_0304_0506_0708), [8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_visited_and_is_visited() {
        let (_store, storage) = setup(FilterParams::new(1024, 2));

        storage.visited(231986).unwrap();
        assert!(storage.is_visited(231986).unwrap());
        assert!(!storage.is_visited(999999).unwrap());
    }

    #[test]
    fn test_bloom_key() {
        let (store, storage) = setup(FilterParams::new(1024, 2));
        assert_eq!(storage.bloom_key(), "test:bloom");

        storage.visited(1).unwrap();
        assert!(store.get("test:bloom").unwrap().is_some());
    }

    #[test]
    fn test_reset_keeps_siblings() {
        let (store, storage) = setup(FilterParams::new(1024, 2));

        storage.visited(1).unwrap();
        storage.storage().set_cookies("example.com", "a=b").unwrap();
        storage.storage().add_request(b"req").unwrap();

        storage.reset().unwrap();

        assert!(!storage.is_visited(1).unwrap());
        assert_eq!(store.get("test:bloom").unwrap(), None);
        assert_eq!(storage.storage().cookies("example.com").unwrap(), "a=b");
        assert_eq!(storage.storage().queue_size().unwrap(), 1);
    }

    #[test]
    fn test_clear_removes_filter_and_siblings() {
        let (store, storage) = setup(FilterParams::new(1024, 2));

        storage.visited(1).unwrap();
        storage.storage().visited(2).unwrap();
        storage.storage().set_cookies("example.com", "a=b").unwrap();
        storage.storage().add_request(b"req").unwrap();

        storage.clear().unwrap();

        assert!(!storage.is_visited(1).unwrap());
        assert_eq!(store.key_count(), 0);
    }
}
