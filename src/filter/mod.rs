//! Membership filter over a shared bit array.
//!
//! [`BloomFilter`] composes a [`HashLocator`] with a [`BitArray`] backend. It
//! answers "definitely absent" or "probably present": payloads that were
//! added are always reported present, while payloads never added are reported
//! present at the designed false positive rate.

pub mod locator;

pub use locator::HashLocator;

use crate::bitset::{BitArray, ScriptedBitArray};
use crate::config::FilterParams;
use crate::store::Store;
use crate::Result;

/// A Bloom filter whose bits live in a [`BitArray`].
///
/// The filter holds no state besides its parameters, so one instance can be
/// shared between threads and many instances in different processes can
/// point at the same backing key. Adds commute: setting a bit is idempotent
/// and order-independent.
///
/// # Example
///
/// ```
/// use redbloom::filter::BloomFilter;
/// use redbloom::store::MemoryStore;
/// use redbloom::FilterParams;
///
/// # fn main() -> Result<(), redbloom::Error> {
/// let filter = BloomFilter::with_store(MemoryStore::new(), "crawl:bloom", FilterParams::new(1 << 20, 14))?;
///
/// filter.add(b"key1")?;
/// assert!(filter.exists(b"key1")?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BloomFilter<B> {
    params: FilterParams,
    locator: HashLocator,
    bits: B,
}

impl<B: BitArray> BloomFilter<B> {
    /// Binds a filter with `params` to the bit array `bits`.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` are invalid.
    pub fn new(params: FilterParams, bits: B) -> Result<Self> {
        params.validate()?;

        if params.width != bits.width() {
            log::warn!(
                "Filter width {} differs from bit array width {}; out-of-range offsets will be rejected",
                params.width,
                bits.width()
            );
        }

        Ok(Self { params, locator: HashLocator::new(&params), bits })
    }

    /// Returns the filter parameters.
    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Returns the bit array backend.
    pub fn bits(&self) -> &B {
        &self.bits
    }

    /// Adds `data` to the filter.
    pub fn add(&self, data: &[u8]) -> Result<()> {
        let offsets = self.locator.locate(data)?;
        self.bits.set_all(&offsets)
    }

    /// Checks whether `data` may be in the filter.
    ///
    /// Returns `false` if `data` was definitely never added, `true` if it
    /// probably was.
    pub fn exists(&self, data: &[u8]) -> Result<bool> {
        let offsets = self.locator.locate(data)?;
        self.bits.test_all(&offsets)
    }

    /// Deletes every bit of the filter.
    pub fn clear(&self) -> Result<()> {
        self.bits.clear()
    }
}

impl<S: Store> BloomFilter<ScriptedBitArray<S>> {
    /// Binds a filter to `key` on `store`, sized by `params`.
    pub fn with_store(store: S, key: impl Into<String>, params: FilterParams) -> Result<Self> {
        let bits = ScriptedBitArray::new(store, key, params.width);
        Self::new(params, bits)
    }

    /// Key holding the filter's bit array.
    pub fn key(&self) -> &str {
        self.bits.key()
    }
}
