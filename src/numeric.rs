//! Numeric precision model (spec §6).
//!
//! A [`Continuous`](crate::Continuous) value is an IEEE 754 double, but this
//! crate treats it as rounded to [`SIGNIFICANT_DIGITS`] significant digits --
//! the granularity at which the MODL cost model considers two values
//! "distinguishable". [`closest_lower_bound`]/[`closest_upper_bound`] move by
//! one unit at that granularity rather than by one raw f64 ULP, and
//! [`number_distinct_values`] counts representable values at that same
//! granularity via decade decomposition.

use crate::Continuous;

/// significant digits a `Continuous` value is considered rounded to
pub const SIGNIFICANT_DIGITS: u32 = 10;

/// sentinel: sorts below every legitimate value. No real measurement in this
/// domain is `-infinity`, so it is free to serve as the "missing" marker.
pub const MISSING_VALUE: Continuous = Continuous::NEG_INFINITY;

/// sentinel: the smallest strictly-positive representable value
pub const EPSILON_VALUE: Continuous = Continuous::from_bits(1);

/// sentinel: the largest finite representable value
pub const MAX_VALUE: Continuous = Continuous::MAX;

pub fn is_missing(v: Continuous) -> bool {
    v == MISSING_VALUE
}

/// spacing between adjacent representable values at `v`'s decade, under
/// `SIGNIFICANT_DIGITS`-digit rounding (e.g. near 1.0 with 10 digits, the
/// spacing is 1e-9).
fn ulp_at(v: Continuous, digits: u32) -> Continuous {
    if v == 0.0 || !v.is_finite() {
        return 10f64.powi(-(digits as i32) + 1);
    }
    let exponent = v.abs().log10().floor();
    10f64.powf(exponent - (digits as f64 - 1.0))
}

/// rounds `v` to `digits` significant digits (banker's rounding is not
/// required here; the cost model only needs a stable, deterministic
/// quantization).
pub fn round_to_digits(v: Continuous, digits: u32) -> Continuous {
    if v == 0.0 || !v.is_finite() {
        return v;
    }
    let exponent = v.abs().log10().floor();
    let scale = 10f64.powf(digits as f64 - 1.0 - exponent);
    (v * scale).round() / scale
}

/// nearest representable value strictly below `v`, at the crate's numeric
/// granularity (§6). `MISSING_VALUE` has no representable value below it.
pub fn closest_lower_bound(v: Continuous) -> Continuous {
    if is_missing(v) || v == Continuous::NEG_INFINITY {
        return MISSING_VALUE;
    }
    let rounded = round_to_digits(v, SIGNIFICANT_DIGITS);
    let step = ulp_at(v, SIGNIFICANT_DIGITS);
    let lower = rounded - step;
    if v > 0.0 && lower <= 0.0 {
        EPSILON_VALUE
    } else {
        lower
    }
}

/// nearest representable value strictly above `v`, at the crate's numeric
/// granularity (§6). `MAX_VALUE` has no representable value above it.
pub fn closest_upper_bound(v: Continuous) -> Continuous {
    if v >= MAX_VALUE {
        return MAX_VALUE;
    }
    if is_missing(v) {
        return -MAX_VALUE;
    }
    let rounded = round_to_digits(v, SIGNIFICANT_DIGITS);
    let step = ulp_at(v, SIGNIFICANT_DIGITS);
    let upper = rounded + step;
    if v < 0.0 && upper >= 0.0 {
        -EPSILON_VALUE
    } else {
        upper
    }
}

/// number of representable values (at `digits` significant digits) strictly
/// within `[lo, hi]`, `lo`, `hi` same sign (or one of them exactly zero),
/// `0 <= lo <= hi`. One "decade" `[10^e, 10^(e+1))` contains
/// `10^digits - 10^(digits-1)` distinct mantissas (§6).
fn nonnegative_decade_span(lo: Continuous, hi: Continuous, digits: u32) -> f64 {
    debug_assert!(lo <= hi);
    if hi <= 0.0 {
        return 0.0;
    }
    let lo = lo.max(EPSILON_VALUE);
    let per_decade = 10f64.powi(digits as i32) - 10f64.powi(digits as i32 - 1);
    let e_lo = lo.log10().floor();
    let e_hi = hi.log10().floor();
    let decade_floor = |e: f64| 10f64.powf(e);
    let decade_ceil = |e: f64| 10f64.powf(e + 1.0);

    if (e_hi - e_lo).abs() < f64::EPSILON {
        let width = decade_ceil(e_lo) - decade_floor(e_lo);
        return ((hi - lo) / width * per_decade).max(0.0);
    }

    let mut total = 0.0;
    // partial first decade: [lo, decade_ceil(e_lo))
    let first_width = decade_ceil(e_lo) - decade_floor(e_lo);
    total += (decade_ceil(e_lo) - lo) / first_width * per_decade;
    // whole decades strictly between
    let whole = (e_hi - e_lo - 1.0).max(0.0);
    total += whole * per_decade;
    // partial last decade: [decade_floor(e_hi), hi]
    let last_width = decade_ceil(e_hi) - decade_floor(e_hi);
    total += (hi - decade_floor(e_hi)) / last_width * per_decade;
    total
}

/// counts representable values in `[min, max]` using the decade
/// decomposition described in spec §6, with `digits = `[`SIGNIFICANT_DIGITS`].
pub fn number_distinct_values(min: Continuous, max: Continuous) -> f64 {
    if min > max {
        return 0.0;
    }
    if min == max {
        return 1.0;
    }
    let digits = SIGNIFICANT_DIGITS;
    if min >= 0.0 {
        nonnegative_decade_span(min, max, digits) + 1.0
    } else if max <= 0.0 {
        nonnegative_decade_span(-max, -min, digits) + 1.0
    } else {
        nonnegative_decade_span(0.0, max, digits) + nonnegative_decade_span(0.0, -min, digits) + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_is_strictly_below() {
        for v in [1.0, -1.0, 0.0, 1e10, -1e-5, 123.456] {
            assert!(closest_lower_bound(v) < v, "failed for {v}");
        }
    }

    #[test]
    fn upper_bound_is_strictly_above() {
        for v in [1.0, -1.0, 0.0, 1e10, -1e-5, 123.456] {
            assert!(closest_upper_bound(v) > v, "failed for {v}");
        }
    }

    #[test]
    fn missing_value_has_no_lower_bound() {
        assert_eq!(closest_lower_bound(MISSING_VALUE), MISSING_VALUE);
    }

    #[test]
    fn max_value_has_no_upper_bound() {
        assert_eq!(closest_upper_bound(MAX_VALUE), MAX_VALUE);
    }

    #[test]
    fn distinct_values_is_monotonic_in_range_width() {
        let narrow = number_distinct_values(1.0, 2.0);
        let wide = number_distinct_values(1.0, 20.0);
        assert!(wide > narrow);
    }

    #[test]
    fn distinct_values_degenerate_range_is_one() {
        assert_eq!(number_distinct_values(5.0, 5.0), 1.0);
    }

    #[test]
    fn distinct_values_symmetric_around_zero() {
        let positive = number_distinct_values(0.0, 10.0);
        let negative = number_distinct_values(-10.0, 0.0);
        assert!((positive - negative).abs() < 1e-6);
    }

    #[test]
    fn round_to_digits_is_idempotent() {
        let v = 123.456_789_123_4;
        let once = round_to_digits(v, SIGNIFICANT_DIGITS);
        let twice = round_to_digits(once, SIGNIFICANT_DIGITS);
        assert_eq!(once, twice);
    }
}
