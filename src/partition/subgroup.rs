//! Two-class subgrouping (spec §4.C.4), grounded on `KWGrouper.cpp`'s
//! observation that a two-class target reduces value grouping to sorting
//! rows by their proportion of target class 1 and running the ordered
//! (adjacency-constrained) merge construction from [`crate::partition::merge`]
//! on the sorted table.
//!
//! Besides standing on its own for a genuinely two-class target, this is the
//! cheap evaluator `partition::preprocessing` runs once per target class in
//! a one-vs-rest fashion to build reliable subgroups (§4.C.3 item 2), always
//! under a null partition cost -- only part costs matter there, no
//! partition-level regularization.

use crate::cost::PartitionCost;
use crate::frequency::FrequencyTable;
use crate::interrupt::InterruptionToken;
use crate::partition::merge::{merge_based_construction, MergeOutcome};
use crate::Frequency;

fn class_one_proportion(counts: &[Frequency]) -> f64 {
    debug_assert_eq!(counts.len(), 2, "two-class subgrouping requires a 2-column table");
    let total = counts[0] + counts[1];
    if total == 0 {
        0.0
    } else {
        counts[1] as f64 / total as f64
    }
}

/// Sorts `source` by ascending proportion of target class 1, runs the
/// ordered merge construction on the sorted table, then composes the
/// resulting assignment back into `source`'s original row order.
/// Discretization and two-class grouping never carry a garbage group, so
/// `supports_garbage` is always false here.
pub fn two_class_subgroup<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    interrupt: &dyn InterruptionToken,
) -> MergeOutcome {
    debug_assert_eq!(source.vector_size(), 2, "two-class subgrouping requires a 2-column table");

    let mut rank: Vec<usize> = (0..source.vector_count()).collect();
    rank.sort_by(|&a, &b| {
        let key_a = class_one_proportion(source.get_vector(a).counts().unwrap_or(&[]));
        let key_b = class_one_proportion(source.get_vector(b).counts().unwrap_or(&[]));
        key_a.partial_cmp(&key_b).unwrap().then(a.cmp(&b))
    });

    let sorted = FrequencyTable::new(rank.iter().map(|&i| source.get_vector(i).clone()).collect());
    let sorted_outcome = merge_based_construction(&sorted, cost, true, false, interrupt);

    // sorted_outcome.group_assignment is indexed by sorted rank; compose back
    // to original row order.
    let mut group_assignment = vec![0usize; source.vector_count()];
    for (sorted_rank, &original_row) in rank.iter().enumerate() {
        group_assignment[original_row] = sorted_outcome.group_assignment[sorted_rank];
    }

    MergeOutcome {
        table: sorted_outcome.table,
        group_assignment,
        garbage_modality_number: sorted_outcome.garbage_modality_number,
        total_cost: sorted_outcome.total_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::grouping::GroupingCost;
    use crate::frequency::FrequencyVector;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn sorts_by_class_one_proportion_before_merging() {
        let cost = GroupingCost::new(4, 2, 0.0, 0, 100).unwrap();
        // deliberately scrambled order: row 2 is "all class 1", row 0 is "all class 0"
        let table = FrequencyTable::new(vec![
            dense(&[0, 10]), // proportion 1.0
            dense(&[10, 0]), // proportion 0.0
            dense(&[9, 0]),  // proportion 0.0
            dense(&[0, 9]),  // proportion 1.0
        ]);
        let outcome = two_class_subgroup(&table, &cost, &crate::interrupt::NeverInterrupted);
        assert_eq!(outcome.group_assignment.len(), 4);
        assert!(outcome.table.vector_count() >= 1 && outcome.table.vector_count() <= 4);
        let max_group = outcome.group_assignment.iter().copied().max().unwrap();
        assert!(max_group < outcome.table.vector_count());
    }

    #[test]
    fn single_row_is_a_no_op() {
        let cost = GroupingCost::new(1, 2, 0.0, 0, 100).unwrap();
        let table = FrequencyTable::new(vec![dense(&[5, 5])]);
        let outcome = two_class_subgroup(&table, &cost, &crate::interrupt::NeverInterrupted);
        assert_eq!(outcome.group_assignment, vec![0]);
    }
}
