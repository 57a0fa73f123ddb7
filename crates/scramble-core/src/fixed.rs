use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Simulation time in milliseconds. The clock, every timer and every
/// deadline in the core are expressed in this unit.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// A ratio expressed in thousandths, e.g. `permille(950)` is 0.95.
#[inline]
pub fn permille(v: i64) -> Fixed64 {
    Fixed64::saturating_from_num(v) / Fixed64::from_num(1000)
}

/// Elapsed milliseconds as fractional seconds.
#[inline]
pub fn millis_to_secs(ms: Millis) -> Fixed64 {
    Fixed64::saturating_from_num(ms) / Fixed64::from_num(1000)
}

/// Scale a duration by a multiplier, rounding to the nearest millisecond.
/// Negative results saturate to zero.
#[inline]
pub fn scale_millis(ms: Millis, factor: Fixed64) -> Millis {
    let scaled = Fixed64::saturating_from_num(ms).saturating_mul(factor);
    scaled.round().saturating_to_num::<u64>()
}

/// Round half away from zero to a whole score value.
#[inline]
pub fn round_to_i64(v: Fixed64) -> i64 {
    v.round().saturating_to_num::<i64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permille_matches_decimal() {
        assert_eq!(permille(500), f64_to_fixed64(0.5));
        assert_eq!(permille(2000), Fixed64::from_num(2));
    }

    #[test]
    fn millis_to_secs_is_exact_for_whole_seconds() {
        assert_eq!(millis_to_secs(3000), Fixed64::from_num(3));
        assert_eq!(fixed64_to_f64(millis_to_secs(1500)), 1.5);
    }

    #[test]
    fn scale_millis_rounds() {
        assert_eq!(scale_millis(2000, f64_to_fixed64(1.1)), 2200);
        assert_eq!(scale_millis(3000, f64_to_fixed64(0.95)), 2850);
        assert_eq!(scale_millis(1000, Fixed64::from_num(-1)), 0);
    }

    #[test]
    fn round_to_i64_half_away_from_zero() {
        assert_eq!(round_to_i64(f64_to_fixed64(12.5)), 13);
        assert_eq!(round_to_i64(f64_to_fixed64(12.4)), 12);
        assert_eq!(round_to_i64(f64_to_fixed64(-12.5)), -13);
    }
}
