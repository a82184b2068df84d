//! The per-component bit width table a variable bit rate tag maps through.
//!
//! Mirrors `original_source/includes/acl/core/bitset.h` and the bit-rate
//! constants scattered through `compression/impl/*` in the reference
//! implementation, collected here since both the writer and the
//! decompressor need the identical table.

/// Number of representable bit rates, including the two special tags.
pub const NUM_BIT_RATES: u8 = 12;

/// The sample is not stored per-keyframe; its one value lives in the
/// segment range table instead.
pub const BIT_RATE_CONSTANT: u8 = 0;

/// The sample bypasses all range reduction and is stored as a full 32-bit
/// float per component.
pub const BIT_RATE_RAW: u8 = NUM_BIT_RATES - 1;

/// `num_bits_at_bit_rate[tag]` gives the per-component width in bits for
/// every intermediate tag. Index `BIT_RATE_CONSTANT` is unused (0 bits);
/// index `BIT_RATE_RAW` is unused (32 bits, handled specially since it skips
/// range remapping entirely).
const NUM_BITS_AT_BIT_RATE: [u8; NUM_BIT_RATES as usize] =
    [0, 3, 4, 5, 6, 7, 8, 10, 12, 16, 19, 32];

/// Returns the per-component bit width for `bit_rate`, or `None` if it is
/// out of range.
pub fn num_bits_at_bit_rate(bit_rate: u8) -> Option<u8> {
    NUM_BITS_AT_BIT_RATE.get(bit_rate as usize).copied()
}

/// Iterator over the intermediate bit rates a selector should try, smallest
/// first, excluding `constant` and `raw`.
pub fn intermediate_bit_rates() -> impl Iterator<Item = u8> {
    (BIT_RATE_CONSTANT + 1)..BIT_RATE_RAW
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_bounds() {
        assert_eq!(num_bits_at_bit_rate(BIT_RATE_CONSTANT), Some(0));
        assert_eq!(num_bits_at_bit_rate(BIT_RATE_RAW), Some(32));
        assert_eq!(num_bits_at_bit_rate(NUM_BIT_RATES), None);
    }

    #[test]
    fn intermediate_excludes_special_values() {
        let rates: Vec<u8> = intermediate_bit_rates().collect();
        assert!(!rates.contains(&BIT_RATE_CONSTANT));
        assert!(!rates.contains(&BIT_RATE_RAW));
        assert_eq!(rates.len(), (NUM_BIT_RATES - 2) as usize);
    }
}
