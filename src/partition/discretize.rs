//! Public `Discretize` entry point (spec §4.C), composing the granularity
//! sweep with the discretization specialization of post-optimization
//! (interval-boundary shifts only, never an arbitrary modality move).

use crate::cost::discretization::DiscretizationCost;
use crate::frequency::FrequencyTable;
use crate::interrupt::InterruptionToken;
use crate::partition::granularity::granularity_sweep;
use crate::partition::postopt::{exhaustive_merge_to_minimum, force_best_merge_descent, post_optimize_interval_boundaries, singleton_test};
use crate::Continuous;

/// Outcome of a `Discretize` call: the target table, the row -> part
/// assignment that produced it (spec §4.C signature), and the total cost of
/// the emitted partition.
#[derive(Debug, Clone)]
pub struct DiscretizeOutcome {
    pub table: FrequencyTable,
    pub group_assignment: Vec<usize>,
    pub total_cost: Continuous,
}

/// Runs the discretization flavor of the partitioner end to end: granularity
/// sweep (§4.C.1) finds a starting partition, then post-optimization
/// (§4.C.5) refines it without ever breaking the contiguous-interval
/// invariant a discretization requires. `source` holds one row per distinct
/// numeric value, already sorted in ascending order.
pub fn discretize(source: &FrequencyTable, attribute_cost: Continuous, interrupt: &dyn InterruptionToken) -> DiscretizeOutcome {
    let v = source.vector_count();
    if v <= 1 {
        return DiscretizeOutcome {
            table: source.clone(),
            group_assignment: (0..v).map(|_| 0).collect(),
            total_cost: 0.0,
        };
    }

    let class_value_number = source.vector_size();
    let total_instance_number = source.total().max(1) as usize;

    let swept = granularity_sweep(
        source,
        true,
        false,
        |g| {
            DiscretizationCost::new(v, class_value_number, attribute_cost, g, total_instance_number)
                .expect("value_number/class_value_number/total_instance_number are always valid here")
        },
        interrupt,
    );

    if interrupt.is_requested() {
        return DiscretizeOutcome {
            table: swept.table,
            group_assignment: swept.group_assignment,
            total_cost: swept.total_cost,
        };
    }

    let final_cost = DiscretizationCost::new(v, class_value_number, attribute_cost, swept.granularity, total_instance_number)
        .expect("same parameters validated above");

    let group_count = swept.group_assignment.iter().copied().max().map_or(0, |m| m + 1);
    let boundary_optimized = post_optimize_interval_boundaries(source, &final_cost, swept.group_assignment, group_count, interrupt);

    let (merged_assignment, merged_count, merged_cost) =
        force_best_merge_descent(source, &final_cost, boundary_optimized, group_count, true, false, interrupt);
    let (exhaustive_assignment, _exhaustive_count, exhaustive_cost) =
        exhaustive_merge_to_minimum(source, &final_cost, merged_assignment.clone(), merged_count, 2, true, interrupt);

    let (best_assignment, best_cost) = if exhaustive_cost < merged_cost - crate::EPSILON {
        (exhaustive_assignment, exhaustive_cost)
    } else {
        (merged_assignment, merged_cost)
    };
    let best_group_count = best_assignment.iter().copied().max().map_or(0, |m| m + 1);

    let (singleton_assignment, singleton_count, singleton_cost) =
        singleton_test(source, &final_cost, best_assignment, best_group_count, best_cost);

    let table = compact_table(source, &singleton_assignment, singleton_count);
    DiscretizeOutcome {
        table,
        group_assignment: singleton_assignment,
        total_cost: singleton_cost,
    }
}

fn compact_table(source: &FrequencyTable, assignment: &[usize], group_count: usize) -> FrequencyTable {
    use crate::frequency::FrequencyVector;
    let mut vectors: Vec<Option<FrequencyVector>> = vec![None; group_count];
    for (row, &g) in assignment.iter().enumerate() {
        match &mut vectors[g] {
            Some(existing) => existing.absorb(source.get_vector(row)),
            slot @ None => *slot = Some(source.get_vector(row).clone()),
        }
    }
    FrequencyTable::new(vectors.into_iter().map(|v| v.expect("every group index is populated")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::FrequencyVector;
    use crate::interrupt::NeverInterrupted;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn s1_two_perfectly_separated_rows_give_two_intervals() {
        let source = FrequencyTable::new(vec![dense(&[10, 0]), dense(&[0, 10])]);
        let outcome = discretize(&source, 0.0, &NeverInterrupted);
        assert_eq!(outcome.group_assignment, vec![0, 1]);
        assert_eq!(outcome.table.vector_count(), 2);
        assert_eq!(outcome.table.total(), 20);
    }

    #[test]
    fn s2_ten_identical_rows_collapse_to_one_interval() {
        let source = FrequencyTable::new((0..10).map(|_| dense(&[5, 5])).collect());
        let outcome = discretize(&source, 0.0, &NeverInterrupted);
        assert_eq!(outcome.table.vector_count(), 1);
        assert!(outcome.group_assignment.iter().all(|&g| g == 0));
    }

    #[test]
    fn target_total_frequency_always_matches_source() {
        let source = FrequencyTable::new(vec![
            dense(&[20, 1]),
            dense(&[18, 0]),
            dense(&[15, 2]),
            dense(&[1, 19]),
            dense(&[0, 17]),
        ]);
        let outcome = discretize(&source, 0.1, &NeverInterrupted);
        assert_eq!(outcome.table.total(), source.total());
        assert_eq!(outcome.group_assignment.len(), source.vector_count());
        let max_group = outcome.group_assignment.iter().copied().max().unwrap();
        assert!(max_group < outcome.table.vector_count());
    }

    /// requests interruption once it has been polled more than `after` times
    /// (spec S5: interruption set partway through a sweep, not before it).
    struct InterruptAfter {
        after: usize,
        polls: std::cell::Cell<usize>,
    }

    impl crate::interrupt::InterruptionToken for InterruptAfter {
        fn is_requested(&self) -> bool {
            let count = self.polls.get() + 1;
            self.polls.set(count);
            count > self.after
        }
    }

    #[test]
    fn s5_interruption_mid_sweep_returns_best_so_far_not_the_null_table() {
        let source = FrequencyTable::new(vec![
            dense(&[20, 0]),
            dense(&[18, 0]),
            dense(&[0, 19]),
            dense(&[0, 17]),
            dense(&[10, 10]),
            dense(&[12, 13]),
        ]);
        let token = InterruptAfter {
            after: 3,
            polls: std::cell::Cell::new(0),
        };
        let outcome = discretize(&source, 0.0, &token);
        assert_eq!(outcome.group_assignment.len(), source.vector_count());
        assert_eq!(outcome.table.total(), source.total());
    }
}
