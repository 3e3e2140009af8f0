//! Rolling checksum used by the log.
//!
//! `c = c * 13331 + b` over signed bytes with wrapping 32-bit arithmetic.
//! Chaining is just continuing from a previous value:
//! `checksum(checksum(s, a), b) == checksum(s, a ++ b)`.

const SEED: i32 = 13331;

/// Fold `bytes` into `seed`.
#[inline]
pub fn checksum(seed: i32, bytes: &[u8]) -> i32 {
    bytes.iter().fold(seed, |c, &b| {
        c.wrapping_mul(SEED).wrapping_add(b as i8 as i32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_values() {
        assert_eq!(checksum(0, &[]), 0);
        assert_eq!(checksum(42, &[]), 42);
        assert_eq!(checksum(0, &[1]), 1);
        assert_eq!(checksum(0, &[1, 2]), 13333);
        // Bytes are signed
        assert_eq!(checksum(0, &[0xFF]), -1);
        assert_eq!(checksum(0, &[0x80]), -128);
    }

    #[test]
    fn test_wraps() {
        let long = vec![0x7Fu8; 64];
        // Must not panic in debug builds
        let _ = checksum(i32::MAX, &long);
    }

    proptest! {
        #[test]
        fn prop_chaining(a in proptest::collection::vec(any::<u8>(), 0..64),
                         b in proptest::collection::vec(any::<u8>(), 0..64),
                         seed in any::<i32>()) {
            let mut joined = a.clone();
            joined.extend_from_slice(&b);
            prop_assert_eq!(checksum(checksum(seed, &a), &b), checksum(seed, &joined));
        }
    }
}
