//! Bounded natural-numbers universal code length, `L_bounded(k, n_max)`
//! (spec §4.B). See DESIGN.md "Open Question decisions" for why this is a
//! from-scratch derivation rather than a transcription: its home unit
//! (`KWStat`) was filtered out of the retrieval pack.
//!
//! `L_bounded(k, n_max)` renormalizes the unbounded Rissanen universal code
//! `u(j) = ln(c0) + ln(j + 1)` over the finite support `[0, n_max]`, so it is
//! a proper code length (its implied probabilities sum to 1 over that
//! support) rather than an arbitrary log.

use crate::{Continuous, UNIVERSAL_CODE_CONSTANT};

fn unbounded_code_length(k: u64) -> Continuous {
    UNIVERSAL_CODE_CONSTANT.ln() + ((k + 1) as Continuous).ln()
}

/// `L_bounded(k, n_max)`: universal code length for an integer `k` known to
/// lie in `[0, n_max]`.
pub fn bounded_universal_code_length(k: u64, n_max: u64) -> Continuous {
    debug_assert!(k <= n_max, "k={k} must lie within [0, n_max={n_max}]");
    let normalizer: Continuous = (0..=n_max).map(|j| (-unbounded_code_length(j)).exp()).sum();
    unbounded_code_length(k) + normalizer.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_nonnegative_within_bounds() {
        for n_max in [1u64, 5, 20, 100] {
            for k in 0..=n_max {
                let l = bounded_universal_code_length(k, n_max);
                assert!(l >= -1e-9, "L_bounded({k},{n_max}) = {l} should be >= 0");
            }
        }
    }

    #[test]
    fn increases_as_k_moves_away_from_zero() {
        let n_max = 50;
        let l0 = bounded_universal_code_length(0, n_max);
        let l1 = bounded_universal_code_length(1, n_max);
        let l_mid = bounded_universal_code_length(n_max / 2, n_max);
        assert!(l0 < l1);
        assert!(l1 < l_mid);
    }

    #[test]
    fn is_symmetric_reduces_to_single_value_when_bound_is_zero() {
        assert_eq!(bounded_universal_code_length(0, 0), 0.0);
    }
}
