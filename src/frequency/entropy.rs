//! Target entropy and mutual entropy helpers (spec §4.A). Only meaningful for
//! `Dense` vectors; both compute in natural log and convert to bits, and both
//! clamp results below `1e-10` to zero.

use crate::frequency::table::FrequencyTable;
use crate::Entropy;

const CLAMP_THRESHOLD: f64 = 1e-10;
const LN_2: f64 = std::f64::consts::LN_2;

fn clamp_small(x: f64) -> f64 {
    if x < CLAMP_THRESHOLD {
        0.0
    } else {
        x
    }
}

fn entropy_of_distribution(counts: &[i32], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let mut h = 0.0;
    for &c in counts {
        if c > 0 {
            let p = c as f64 / total;
            h -= p * p.ln();
        }
    }
    clamp_small(h) / LN_2
}

/// H(Y): entropy, in bits, of the target's marginal distribution.
pub fn target_entropy(table: &FrequencyTable) -> Entropy {
    let totals = table.compute_target_frequencies();
    let total: f64 = totals.iter().map(|&c| c as f64).sum();
    entropy_of_distribution(&totals, total) as Entropy
}

/// I(X;Y): mutual information, in bits, between the partition `X` (parts of
/// `table`) and the target `Y` (the dense columns), computed as
/// `H(Y) - H(Y|X)`.
pub fn mutual_entropy(table: &FrequencyTable) -> Entropy {
    let grand_total = table.total() as f64;
    if grand_total <= 0.0 {
        return 0.0;
    }
    let h_y = entropy_of_distribution(&table.compute_target_frequencies(), grand_total);
    let mut h_y_given_x = 0.0;
    for vector in table.vectors() {
        let Some(counts) = vector.counts() else {
            continue;
        };
        let part_total: f64 = counts.iter().map(|&c| c as f64).sum();
        if part_total <= 0.0 {
            continue;
        }
        let weight = part_total / grand_total;
        h_y_given_x += weight * entropy_of_distribution(counts, part_total);
    }
    clamp_small((h_y - h_y_given_x).max(0.0)) as Entropy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::vector::FrequencyVector;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn uniform_two_class_entropy_is_one_bit() {
        let table = FrequencyTable::new(vec![dense(&[5, 5])]);
        assert!((target_entropy(&table) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pure_single_class_entropy_is_zero() {
        let table = FrequencyTable::new(vec![dense(&[10, 0])]);
        assert_eq!(target_entropy(&table), 0.0);
    }

    #[test]
    fn perfectly_separating_partition_has_mutual_entropy_equal_to_target_entropy() {
        let table = FrequencyTable::new(vec![dense(&[10, 0]), dense(&[0, 10])]);
        let h_y = target_entropy(&table);
        let i_xy = mutual_entropy(&table);
        assert!((h_y - i_xy).abs() < 1e-6);
    }

    #[test]
    fn uninformative_partition_has_zero_mutual_entropy() {
        let table = FrequencyTable::new(vec![dense(&[5, 5]), dense(&[5, 5])]);
        assert!(mutual_entropy(&table) < 1e-6);
    }
}
