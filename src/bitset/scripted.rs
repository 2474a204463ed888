//! Bit array stored under one key of a scripted store.

use crate::bitset::{offset_args, BitArray, SET_SCRIPT, TEST_SCRIPT};
use crate::store::Store;
use crate::{Error, Result};

/// A bit array held in a string value of a [`Store`].
///
/// Each `set_all` or `test_all` is a single script submission, so all offsets
/// of one call are applied or inspected without interleaving. Errors from the
/// store are returned as-is and never retried.
///
/// # Example
///
/// ```
/// use redbloom::bitset::{BitArray, ScriptedBitArray};
/// use redbloom::store::MemoryStore;
///
/// # fn main() -> Result<(), redbloom::Error> {
/// let bits = ScriptedBitArray::new(MemoryStore::new(), "crawl:bloom", 1024);
///
/// bits.set_all(&[1, 7, 99])?;
/// assert!(bits.test_all(&[1, 99])?);
/// assert!(!bits.test_all(&[1, 2])?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScriptedBitArray<S> {
    store: S,
    key: String,
    width: u64,
}

impl<S: Store> ScriptedBitArray<S> {
    /// Binds a bit array of `width` bits to `key` on `store`.
    pub fn new(store: S, key: impl Into<String>, width: u64) -> Self {
        Self { store, key: key.into(), width }
    }

    /// Key holding the array.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Store> BitArray for ScriptedBitArray<S> {
    fn width(&self) -> u64 {
        self.width
    }

    fn set_all(&self, offsets: &[u64]) -> Result<()> {
        let args = offset_args(offsets, self.width)?;
        if args.is_empty() {
            return Ok(());
        }

        log::debug!("Setting {} bits on {}", args.len(), self.key);
        self.store.eval(&SET_SCRIPT, &[self.key.as_str()], &args)?;
        Ok(())
    }

    fn test_all(&self, offsets: &[u64]) -> Result<bool> {
        let args = offset_args(offsets, self.width)?;
        if args.is_empty() {
            return Ok(true);
        }

        let reply = self.store.eval(&TEST_SCRIPT, &[self.key.as_str()], &args)?;
        log::debug!("Tested {} bits on {}: {:?}", args.len(), self.key, reply);

        reply
            .as_bool()
            .ok_or_else(|| Error::unexpected_reply(format!("{} returned {:?}", TEST_SCRIPT.name(), reply)))
    }

    fn clear(&self) -> Result<()> {
        let removed = self.store.del(&[self.key.clone()])?;
        log::info!("Cleared bit array {} ({} key removed)", self.key, removed);
        Ok(())
    }
}
