//! Bit-array backends.
//!
//! A [`BitArray`] is a fixed-width array of single bits shared between
//! processes and addressed by one key. Filters only ever turn bits on, so
//! concurrent writers commute and no locking is needed beyond the atomicity
//! of each call.

pub mod scripted;

pub use scripted::ScriptedBitArray;

use crate::store::Script;
use crate::{Error, Result};

/// Sets every offset in `ARGV` on `KEYS[1]`. Re-running it is harmless.
pub const SET_SCRIPT: Script = Script::new(
    "bloom_set",
    r#"for _, offset in ipairs(ARGV) do
	redis.call("setbit", KEYS[1], offset, 1)
end"#,
);

/// Returns true only if every offset in `ARGV` is set on `KEYS[1]`,
/// stopping at the first unset bit.
pub const TEST_SCRIPT: Script = Script::new(
    "bloom_test",
    r#"for _, offset in ipairs(ARGV) do
	if tonumber(redis.call("getbit", KEYS[1], offset)) == 0 then
		return false
	end
end
return true"#,
);

/// Trait for a shared bit array.
///
/// Both operations are atomic with respect to each other on the same key: a
/// concurrent `test_all` observes either none or all of a `set_all`'s bits.
/// Both validate every offset against [`BitArray::width`] first and fail
/// without touching the array if any is out of range.
pub trait BitArray: Send + Sync {
    /// Number of addressable bits.
    fn width(&self) -> u64;

    /// Sets every offset to 1.
    fn set_all(&self, offsets: &[u64]) -> Result<()>;

    /// Returns true if every offset is 1. A missing array reads as all zeros.
    fn test_all(&self, offsets: &[u64]) -> Result<bool>;

    /// Deletes the whole array.
    fn clear(&self) -> Result<()>;
}

/// Checks `offsets` against `width` and renders them as script arguments.
pub fn offset_args(offsets: &[u64], width: u64) -> Result<Vec<String>> {
    offsets
        .iter()
        .map(|&offset| {
            if offset >= width {
                Err(Error::OffsetOutOfRange { offset, width })
            } else {
                Ok(offset.to_string())
            }
        })
        .collect()
}
