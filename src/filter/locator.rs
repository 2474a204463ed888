//! Hash locator: derives bit offsets for a payload.

use crate::config::FilterParams;
use crate::Result;

/// Derives `hash_count` offsets in `[0, width)` from one 64-bit hash family.
///
/// Offset `i` is `murmur3_64(payload ‖ [i as u8]) % width`, where `murmur3_64`
/// is the low 64 bits of MurmurHash3 x64/128 with seed 0. Mixing the index
/// into the input gives independent positions without needing `hash_count`
/// separate hash functions. Offsets may repeat.
///
/// The hash choice is fixed by [`FilterParams::format_version`]; changing it
/// invalidates stored filters just like changing the width would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashLocator {
    width: u64,
    hash_count: u32,
}

impl HashLocator {
    /// Creates a locator for the given parameters.
    pub fn new(params: &FilterParams) -> Self {
        Self { width: params.width, hash_count: params.hash_count }
    }

    /// Number of addressable bits.
    pub fn width(&self) -> u64 {
        self.width
    }

    /// Number of offsets produced per payload.
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Returns the ordered offsets for `payload`.
    pub fn locate(&self, payload: &[u8]) -> Result<Vec<u64>> {
        let mut input = Vec::with_capacity(payload.len() + 1);
        input.extend_from_slice(payload);
        input.push(0);
        let last = payload.len();

        let mut offsets = Vec::with_capacity(self.hash_count as usize);
        for i in 0..self.hash_count {
            input[last] = i as u8;
            offsets.push(murmur3_64(&input)? % self.width);
        }
        Ok(offsets)
    }
}

/// Low 64 bits of MurmurHash3 x64/128, seed 0.
fn murmur3_64(data: &[u8]) -> Result<u64> {
    let mut reader = data;
    let hash = murmur3::murmur3_x64_128(&mut reader, 0)?;
    Ok(hash as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_locate_count_and_range() {
        let locator = HashLocator::new(&FilterParams::new(1024, 14));
        let offsets = locator.locate(b"https://example.com/").unwrap();

        assert_eq!(offsets.len(), 14);
        assert!(offsets.iter().all(|&o| o < 1024));
    }

    #[test]
    fn test_locate_empty_payload() {
        let locator = HashLocator::new(&FilterParams::new(1024, 3));
        let offsets = locator.locate(b"").unwrap();
        assert_eq!(offsets.len(), 3);
    }

    #[test]
    fn test_discriminator_spreads_offsets() {
        let locator = HashLocator::new(&FilterParams::default());
        let offsets = locator.locate(&231986u64.to_le_bytes()).unwrap();

        let mut unique = offsets.clone();
        unique.sort_unstable();
        unique.dedup();
        // Over 2^32 positions, 14 collision-free offsets are overwhelmingly likely
        assert_eq!(unique.len(), 14);
    }

    #[test]
    fn test_width_one() {
        let locator = HashLocator::new(&FilterParams::new(1, 4));
        assert_eq!(locator.locate(b"anything").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_murmur3_empty_input() {
        // MurmurHash3 of the empty input with seed 0 is zero
        assert_eq!(murmur3_64(b"").unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_locate_is_deterministic(payload in proptest::collection::vec(any::<u8>(), 0..64),
                                        width in 1u64..=(1u64 << 32),
                                        hash_count in 1u32..=32) {
            let locator = HashLocator::new(&FilterParams::new(width, hash_count));
            let first = locator.locate(&payload).unwrap();
            let second = locator.locate(&payload).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), hash_count as usize);
            prop_assert!(first.iter().all(|&o| o < width));
        }

        #[test]
        fn prop_prefix_of_larger_hash_count(payload in proptest::collection::vec(any::<u8>(), 0..32)) {
            let small = HashLocator::new(&FilterParams::new(4096, 4)).locate(&payload).unwrap();
            let large = HashLocator::new(&FilterParams::new(4096, 14)).locate(&payload).unwrap();
            prop_assert_eq!(&small[..], &large[..4]);
        }
    }
}
