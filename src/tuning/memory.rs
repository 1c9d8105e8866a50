//! Memory ceiling derivation.

use crate::system::{Limit, MemoryLimit};

/// `floor(max * ratio)` for a bounded `memory.max`, None when unlimited.
///
/// `ratio` must already be validated to lie in (0, 1]. A ratio of 1 yields a
/// ceiling equal to the hard maximum.
pub fn derive_memory_ceiling(limit: &MemoryLimit, ratio: f64) -> Option<u64> {
    match limit.max {
        Limit::Unlimited => None,
        Limit::Bounded(max) => Some(scale_floor(max, ratio)),
    }
}

/// Exact `floor(value * ratio)` for `ratio` in (0, 1].
///
/// The ratio is taken apart as `mantissa * 2^-shift` and the product formed
/// in u128, so values above 2^53 keep every bit.
fn scale_floor(value: u64, ratio: f64) -> u64 {
    if ratio >= 1.0 {
        return value;
    }
    if ratio.is_nan() || ratio <= 0.0 {
        return 0;
    }

    let bits = ratio.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as u32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, shift) = if exponent == 0 {
        // Subnormal
        (fraction, 1074)
    } else {
        (fraction | (1u64 << 52), 1075 - exponent)
    };

    if shift >= 128 {
        return 0;
    }
    ((value as u128 * mantissa as u128) >> shift) as u64
}
