//! `ln_Bell(n, k)`, the log-count of ways to partition `n` labeled values
//! into exactly `k` nonempty, unlabeled groups (spec §4.B grouping cost
//! model). This is the Stirling number of the second kind, `S(n, k)`; as
//! with [`bounded_universal_code_length`](super::bounded::bounded_universal_code_length),
//! its home unit was filtered out of the retrieval pack (see DESIGN.md "Open
//! Question decisions"), so it is computed here directly from the textbook
//! recurrence `S(n, k) = k*S(n-1, k) + S(n-1, k-1)`, carried in log space via
//! log-sum-exp so it doesn't overflow for the value counts this crate deals
//! with.

use crate::Continuous;

const NEG_INF: Continuous = Continuous::NEG_INFINITY;

fn log_add(a: Continuous, b: Continuous) -> Continuous {
    if a == NEG_INF {
        return b;
    }
    if b == NEG_INF {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(S(n, k))`: log-number of ways to partition `n` distinguishable values
/// into exactly `k` nonempty, indistinguishable groups. Returns `-inf` for
/// the impossible cases (`k > n`, or `k == 0 < n`).
pub fn ln_bell(n: u32, k: u32) -> Continuous {
    if k > n {
        return NEG_INF;
    }
    if n == 0 {
        return if k == 0 { 0.0 } else { NEG_INF };
    }
    if k == 0 {
        return NEG_INF;
    }
    // row[j] holds ln(S(i, j)) for the row currently being built.
    let mut previous = vec![NEG_INF; (k + 1) as usize];
    previous[0] = 0.0; // S(0, 0) = 1
    for i in 1..=n {
        let mut current = vec![NEG_INF; (k + 1) as usize];
        let max_j = k.min(i);
        for j in 0..=max_j {
            let from_split = if j >= 1 { previous[(j - 1) as usize] } else { NEG_INF };
            let from_join = if j >= 1 && previous[j as usize] != NEG_INF {
                (j as Continuous).ln() + previous[j as usize]
            } else {
                NEG_INF
            };
            current[j as usize] = log_add(from_split, from_join);
        }
        previous = current;
    }
    previous[k as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_small_values() {
        // S(4,2) = 7, S(5,2) = 15, S(5,3) = 25 (standard Stirling-second-kind table).
        assert!((ln_bell(4, 2).exp() - 7.0).abs() < 1e-6);
        assert!((ln_bell(5, 2).exp() - 15.0).abs() < 1e-6);
        assert!((ln_bell(5, 3).exp() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn single_group_or_all_singletons_are_unique() {
        assert_eq!(ln_bell(6, 1), 0.0);
        assert_eq!(ln_bell(6, 6), 0.0);
    }

    #[test]
    fn impossible_partitions_are_negative_infinity() {
        assert_eq!(ln_bell(3, 5), NEG_INF);
        assert_eq!(ln_bell(3, 0), NEG_INF);
    }

    #[test]
    fn zero_elements_zero_groups_is_the_empty_partition() {
        assert_eq!(ln_bell(0, 0), 0.0);
    }
}
