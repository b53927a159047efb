//! ε-bin grid derivation and the histogram partitioner (spec §4.C.6, §6
//! "Histogram grid derivation"), grounded on `MHContinuousLimits.{h,cpp}`'s
//! grid-placement arithmetic. Builds one [`FrequencyVector::Histogram`] row
//! per distinct numeric value, then reuses the granularity sweep
//! (`partition::granularity`) with a [`HistogramCost`] to find the best
//! binned partition.

use crate::cost::histogram::HistogramCost;
use crate::frequency::{FrequencyTable, FrequencyVector};
use crate::interrupt::InterruptionToken;
use crate::numeric;
use crate::partition::granularity::{granularity_sweep, GranularityOutcome};
use crate::{Continuous, Frequency};

/// elementary-cell grid size `E` from spec §4.C.6.
pub const ELEMENTARY_GRID_SIZE: u64 = 1_000_000_000;

/// the ε-bin grid placed over `[min, max]` (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct EpsilonGrid {
    pub lower_bound: Continuous,
    pub upper_bound: Continuous,
    pub epsilon_bin_length: Continuous,
    pub max_partile_number: usize,
}

/// Derives the ε-bin grid for `[min, max]` given `grid_size` elementary
/// cells and `instance_number` source rows (spec §6). `min <= max`.
pub fn derive_epsilon_grid(min: Continuous, max: Continuous, grid_size: u64, instance_number: usize) -> EpsilonGrid {
    debug_assert!(min <= max);

    let epsilon_bin_length = if min == max || min == 0.0 || max == 0.0 {
        2.0 / grid_size as Continuous * min.abs().max(max.abs()).max(1.0)
    } else {
        (max - min) / (grid_size as Continuous - 1.0)
    };

    let raw_lower = min - epsilon_bin_length / 2.0;
    let raw_upper = max + epsilon_bin_length / 2.0;
    let snapped_lower = numeric::round_to_digits(raw_lower, numeric::SIGNIFICANT_DIGITS);
    let snapped_upper = numeric::round_to_digits(raw_upper, numeric::SIGNIFICANT_DIGITS);
    let lower_bound = if snapped_lower >= min {
        numeric::closest_lower_bound(min)
    } else {
        snapped_lower
    };
    let upper_bound = if snapped_upper <= max {
        numeric::closest_upper_bound(max)
    } else {
        snapped_upper
    };

    let distinct_values = numeric::number_distinct_values(lower_bound, upper_bound);
    let n = instance_number.max(1) as Continuous;
    let denominator = (n * n.ln().max(0.0)).sqrt().ceil().max(1.0);
    let max_partile_number = ((distinct_values / denominator).floor() as i64).clamp(1, grid_size as i64) as usize;

    EpsilonGrid {
        lower_bound,
        upper_bound,
        epsilon_bin_length,
        max_partile_number,
    }
}

/// Builds the initial one-row-per-distinct-value histogram table. Each
/// value starts as occupying exactly one elementary bin (spec §6: "each
/// value is placed in a unique bin except where numeric precision forces
/// merging"); the granularity sweep accumulates `length_in_bins` across
/// merged rows via [`FrequencyVector::absorb`].
pub fn build_source_table(distinct_values: &[(Continuous, Frequency)]) -> FrequencyTable {
    let vectors = distinct_values
        .iter()
        .map(|&(_, frequency)| FrequencyVector::histogram(frequency, 1.0, 1))
        .collect();
    let mut table = FrequencyTable::new(vectors);
    table.set_initial_value_number(distinct_values.len());
    table.set_granularized_value_number(distinct_values.len());
    table
}

/// Runs the histogram flavor of the partitioner (spec §4.C.6): derives the
/// ε-bin grid, builds the initial per-value table, and runs the
/// granularity sweep (ordered, no garbage group) against a [`HistogramCost`]
/// sized to the grid's capped `max_partile_number`.
pub fn partition_histogram(
    distinct_values: &[(Continuous, Frequency)],
    attribute_cost: Continuous,
    interrupt: &dyn InterruptionToken,
) -> GranularityOutcome {
    let v = distinct_values.len();
    if v <= 1 {
        let table = build_source_table(distinct_values);
        return GranularityOutcome {
            table,
            group_assignment: (0..v).map(|_| 0).collect(),
            granularity: 0,
            garbage_modality_number: 0,
            total_cost: 0.0,
        };
    }

    let min = distinct_values.first().unwrap().0;
    let max = distinct_values.last().unwrap().0;
    let instance_number: usize = distinct_values.iter().map(|&(_, f)| f as usize).sum();
    let grid = derive_epsilon_grid(min, max, ELEMENTARY_GRID_SIZE, instance_number);
    let grid_size = grid.max_partile_number.max(v) as u64;

    let table = build_source_table(distinct_values);
    granularity_sweep(
        &table,
        true,
        false,
        |g| HistogramCost::new(grid_size, attribute_cost, g, instance_number.max(1)).expect("grid_size and instance_number are always valid here"),
        interrupt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::NeverInterrupted;

    #[test]
    fn epsilon_grid_bounds_strictly_contain_min_and_max() {
        let grid = derive_epsilon_grid(1.0, 100.0, 1_000_000, 500);
        assert!(grid.lower_bound < 1.0);
        assert!(grid.upper_bound > 100.0);
        assert!(grid.epsilon_bin_length > 0.0);
    }

    #[test]
    fn epsilon_grid_falls_back_when_min_equals_max() {
        let grid = derive_epsilon_grid(5.0, 5.0, 1_000_000, 100);
        assert!(grid.epsilon_bin_length > 0.0);
        assert!(grid.lower_bound < 5.0);
        assert!(grid.upper_bound > 5.0);
    }

    #[test]
    fn epsilon_grid_falls_back_when_bound_is_zero() {
        let grid = derive_epsilon_grid(0.0, 10.0, 1_000_000, 100);
        assert!(grid.epsilon_bin_length > 0.0);
    }

    #[test]
    fn max_partile_number_is_at_least_one_and_capped_by_grid_size() {
        let grid = derive_epsilon_grid(0.0, 1.0, 100, 10_000);
        assert!(grid.max_partile_number >= 1);
        assert!(grid.max_partile_number <= 100);
    }

    #[test]
    fn partition_histogram_preserves_total_frequency() {
        let values = vec![(1.0, 5), (2.0, 3), (3.0, 8), (10.0, 2), (11.0, 1)];
        let total: Frequency = values.iter().map(|&(_, f)| f).sum();
        let outcome = partition_histogram(&values, 0.0, &NeverInterrupted);
        assert_eq!(outcome.table.total(), total);
        assert_eq!(outcome.group_assignment.len(), values.len());
    }

    #[test]
    fn single_value_histogram_is_a_no_op() {
        let values = vec![(5.0, 10)];
        let outcome = partition_histogram(&values, 0.0, &NeverInterrupted);
        assert_eq!(outcome.table.vector_count(), 1);
    }
}
