//! Granularity sweep (spec §4.C.1), grounded on `KWMODLLine`/`KWStat`'s
//! quantile-granularization drivers and, for the shape of a resolution
//! sweep with an eligibility gate and a running argmin, on
//! `src/clustering/layer.rs`'s `cluster()` loop in the teacher.
//!
//! The sweep iterates granularity `g = 1..=G_max`, re-bucketing the source
//! rows into `2^g`-ish quantile partiles via [`QuantileBuilder`], runs the
//! merge-based optimizer (`partition::merge`) on each eligible resolution,
//! and keeps the argmin over the sweep.

use crate::cost::PartitionCost;
use crate::frequency::{FrequencyTable, FrequencyVector};
use crate::interrupt::InterruptionToken;
use crate::partition::merge::merge_based_construction;
use crate::Continuous;
use crate::Frequency;

/// Deterministically buckets original rows into quantile partiles by
/// cumulative frequency (spec §4.C.1 item 1). Built once per sweep from the
/// source's per-row frequencies; `assign` is then called once per
/// granularity with that resolution's target partile count.
pub struct QuantileBuilder {
    cumulative: Vec<i64>,
}

impl QuantileBuilder {
    pub fn new(row_frequencies: &[Frequency]) -> Self {
        let mut running = 0i64;
        let cumulative = row_frequencies
            .iter()
            .map(|&f| {
                running += f as i64;
                running
            })
            .collect();
        Self { cumulative }
    }

    pub fn row_count(&self) -> usize {
        self.cumulative.len()
    }

    pub fn total(&self) -> i64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Assigns every row a partile index in `[0, achieved)`, `achieved <=
    /// target_partile_count`. Partiles are contiguous ranges of original
    /// rows (monotonically non-decreasing assignment), since a single
    /// heavy row can span more than one quantile-width step; the achieved
    /// count collapses those spans rather than leaving empty partiles in
    /// between, keeping the no-empty-vector invariant (§3) intact.
    pub fn assign(&self, target_partile_count: usize) -> (Vec<usize>, usize) {
        let row_count = self.row_count();
        if row_count == 0 {
            return (Vec::new(), 0);
        }
        let target = target_partile_count.clamp(1, row_count) as i128;
        let total = self.total().max(1) as i128;

        let mut assignment = vec![0usize; row_count];
        let mut partile: i128 = 0;
        let mut next_threshold = total * (partile + 1) / target;
        for (row, &cum) in self.cumulative.iter().enumerate() {
            if cum as i128 > next_threshold && partile + 1 < target {
                partile += 1;
                next_threshold = total * (partile + 1) / target;
            }
            assignment[row] = partile as usize;
        }
        (assignment, partile as usize + 1)
    }
}

/// Builds the granularized table at one resolution: one output vector per
/// partile, each the pointwise sum of the original rows assigned to it.
pub fn granularize(source: &FrequencyTable, partile_assignment: &[usize], partile_count: usize) -> FrequencyTable {
    let mut vectors: Vec<Option<FrequencyVector>> = vec![None; partile_count];
    for (row, vector) in source.vectors().iter().enumerate() {
        let partile = partile_assignment[row];
        match &mut vectors[partile] {
            Some(existing) => existing.absorb(vector),
            slot @ None => *slot = Some(vector.clone()),
        }
    }
    let vectors: Vec<FrequencyVector> = vectors
        .into_iter()
        .map(|v| v.expect("QuantileBuilder::assign never leaves a partile index unused"))
        .collect();
    let mut table = FrequencyTable::new(vectors);
    table.set_initial_value_number(source.initial_value_number().max(source.vector_count()));
    table.set_granularized_value_number(partile_count);
    table
}

/// Result of the full sweep: the best table found, the row -> final-part
/// assignment that produced it (composed through the partile step), the
/// granularity it was found at, its garbage modality count, and its total
/// cost.
#[derive(Debug, Clone)]
pub struct GranularityOutcome {
    pub table: FrequencyTable,
    pub group_assignment: Vec<usize>,
    pub granularity: usize,
    pub garbage_modality_number: usize,
    pub total_cost: Continuous,
}

/// Runs the granularity sweep described in spec §4.C.1. `build_cost(g)`
/// constructs a fresh cost model for granularity `g` (value_number / class
/// count / attribute_cost fixed across the sweep; only the `granularity`
/// field this cost was built with ever changes). `ordered` and
/// `supports_garbage` are forwarded to the merge optimizer, exactly as in
/// `partition::merge::merge_based_construction`.
pub fn granularity_sweep<C, F>(
    source: &FrequencyTable,
    ordered: bool,
    supports_garbage: bool,
    build_cost: F,
    interrupt: &dyn InterruptionToken,
) -> GranularityOutcome
where
    C: PartitionCost,
    F: Fn(usize) -> C,
{
    let v_source = source.vector_count();
    if v_source <= 1 {
        return GranularityOutcome {
            table: source.clone(),
            group_assignment: (0..v_source).map(|_| 0).collect(),
            granularity: 0,
            garbage_modality_number: 0,
            total_cost: 0.0,
        };
    }

    let n = source.total();
    if n <= 0 {
        return GranularityOutcome {
            table: source.clone(),
            group_assignment: (0..v_source).collect(),
            granularity: 0,
            garbage_modality_number: 0,
            total_cost: 0.0,
        };
    }
    let g_max = (n as Continuous).log2().ceil().max(1.0) as usize;

    let row_frequencies: Vec<Frequency> = source.vectors().iter().map(FrequencyVector::total).collect();
    let builder = QuantileBuilder::new(&row_frequencies);

    let mut best: Option<GranularityOutcome> = None;
    let mut previous_partile_number = 1usize;

    for g in 1..=g_max {
        if interrupt.is_requested() {
            return best.unwrap_or_else(|| GranularityOutcome {
                table: source.compute_null_table(),
                group_assignment: (0..v_source).map(|_| 0).collect(),
                granularity: 0,
                garbage_modality_number: 0,
                total_cost: 0.0,
            });
        }

        let target_partile_count = 2usize.saturating_pow(g as u32).min(v_source);
        let (assignment, partile_count) = builder.assign(target_partile_count);
        let is_last = partile_count == v_source;
        let eligible = is_last
            || (partile_count as Continuous >= 1.5 * previous_partile_number as Continuous
                && 1.5 * partile_count as Continuous <= v_source as Continuous);

        if eligible {
            let granularized = granularize(source, &assignment, partile_count);
            let cost = build_cost(g);
            let outcome = merge_based_construction(&granularized, &cost, ordered, supports_garbage, interrupt);
            let composed: Vec<usize> = (0..v_source).map(|row| outcome.group_assignment[assignment[row]]).collect();

            let is_better = best.as_ref().map_or(true, |b| outcome.total_cost < b.total_cost - crate::EPSILON);
            log::trace!("granularity {g}: partile_count={partile_count} cost={:.6} accepted={is_better}", outcome.total_cost);
            if is_better {
                log::debug!("granularity {g} accepted, cost={:.6}", outcome.total_cost);
                best = Some(GranularityOutcome {
                    table: outcome.table,
                    group_assignment: composed,
                    granularity: g,
                    garbage_modality_number: outcome.garbage_modality_number,
                    total_cost: outcome.total_cost,
                });
            }
        } else {
            log::trace!("granularity {g} skipped, partile_count={partile_count} ineligible");
        }

        previous_partile_number = partile_count;
        if is_last {
            break;
        }
    }

    best.unwrap_or_else(|| GranularityOutcome {
        table: source.clone(),
        group_assignment: (0..v_source).collect(),
        granularity: 0,
        garbage_modality_number: 0,
        total_cost: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_builder_produces_contiguous_nondecreasing_assignment() {
        let builder = QuantileBuilder::new(&[10, 10, 10, 10, 10, 10, 10, 10]);
        let (assignment, achieved) = builder.assign(4);
        assert_eq!(achieved, 4);
        assert!(assignment.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*assignment.iter().max().unwrap(), achieved - 1);
    }

    #[test]
    fn quantile_builder_collapses_when_one_row_dominates() {
        // one huge row followed by many tiny ones: early partiles collapse
        // rather than leaving gaps.
        let mut frequencies = vec![1000];
        frequencies.extend(std::iter::repeat(1).take(20));
        let builder = QuantileBuilder::new(&frequencies);
        let (assignment, achieved) = builder.assign(8);
        let used: std::collections::BTreeSet<usize> = assignment.iter().copied().collect();
        assert_eq!(used.len(), achieved);
        assert_eq!(used, (0..achieved).collect());
    }

    #[test]
    fn granularize_preserves_total_frequency() {
        let table = FrequencyTable::new(vec![
            FrequencyVector::dense(vec![1, 0], 1),
            FrequencyVector::dense(vec![2, 0], 1),
            FrequencyVector::dense(vec![0, 3], 1),
            FrequencyVector::dense(vec![0, 4], 1),
        ]);
        let builder = QuantileBuilder::new(&[1, 2, 3, 4]);
        let (assignment, count) = builder.assign(2);
        let granularized = granularize(&table, &assignment, count);
        assert_eq!(granularized.total(), table.total());
    }

    #[test]
    fn sweep_on_trivial_source_is_a_no_op() {
        use crate::cost::grouping::GroupingCost;
        use crate::interrupt::NeverInterrupted;

        let table = FrequencyTable::new(vec![FrequencyVector::dense(vec![5, 5], 1)]);
        let outcome = granularity_sweep(
            &table,
            false,
            false,
            |g| GroupingCost::new(1, 2, 0.0, g, 10).unwrap(),
            &NeverInterrupted,
        );
        assert_eq!(outcome.table.vector_count(), 1);
        assert_eq!(outcome.group_assignment, vec![0]);
    }

    #[test]
    fn sweep_finds_a_partition_at_least_as_good_as_the_null_model() {
        use crate::cost::{grouping::GroupingCost, PartitionCost};
        use crate::interrupt::NeverInterrupted;

        let table = FrequencyTable::new(vec![
            FrequencyVector::dense(vec![20, 0], 1),
            FrequencyVector::dense(vec![18, 0], 1),
            FrequencyVector::dense(vec![0, 19], 1),
            FrequencyVector::dense(vec![0, 17], 1),
        ]);
        let n = table.total() as usize;
        let outcome = granularity_sweep(
            &table,
            false,
            false,
            |g| GroupingCost::new(table.vector_count(), 2, 0.0, g, n).unwrap(),
            &NeverInterrupted,
        );
        let final_cost = GroupingCost::new(table.vector_count(), 2, 0.0, outcome.granularity, n).unwrap();
        let null_cost = final_cost.partition_cost(1, 0)
            + table.vectors().iter().map(|v| final_cost.part_cost(v)).sum::<Continuous>();
        assert!(outcome.total_cost <= null_cost + crate::EPSILON);
    }
}
