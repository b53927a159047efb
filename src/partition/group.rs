//! Public `Group` entry point (spec §4.C), composing preprocessing
//! (§4.C.3), the granularity sweep (§4.C.1) with garbage tracking, and the
//! general (unordered) post-optimization family (§4.C.5).

use crate::cost::grouping::GroupingCost;
use crate::frequency::FrequencyTable;
use crate::interrupt::InterruptionToken;
use crate::partition::granularity::granularity_sweep;
use crate::partition::postopt::{exhaustive_merge_to_minimum, force_best_merge_descent, post_optimize_groups, singleton_test};
use crate::partition::preprocessing::preprocess;
use crate::Continuous;

#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub table: FrequencyTable,
    pub group_assignment: Vec<usize>,
    pub garbage_modality_number: usize,
    pub total_cost: Continuous,
}

/// Options a caller can tune; mirrors the knobs `partition::preprocessing`
/// and the garbage-bearing merge/post-opt passes expose.
#[derive(Debug, Clone, Copy)]
pub struct GroupOptions {
    pub attribute_cost: Continuous,
    pub output_max_group_number: usize,
    pub one_single_garbage_group: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            attribute_cost: 0.0,
            output_max_group_number: usize::MAX,
            one_single_garbage_group: false,
        }
    }
}

/// Runs the grouping flavor of the partitioner end to end: preprocessing
/// reduces the initial modality count, the granularity sweep finds a
/// starting partition with both no-garbage and with-garbage candidates
/// tracked, and post-optimization refines the winner.
pub fn group(source: &FrequencyTable, options: GroupOptions, interrupt: &dyn InterruptionToken) -> GroupOutcome {
    let v = source.vector_count();
    if v <= 1 {
        return GroupOutcome {
            table: source.clone(),
            group_assignment: (0..v).map(|_| 0).collect(),
            garbage_modality_number: 0,
            total_cost: 0.0,
        };
    }

    let total_instance_number = source.total().max(1) as usize;
    let preprocessed = preprocess(source, total_instance_number, options.output_max_group_number, options.one_single_garbage_group, interrupt);

    let class_value_number = source.vector_size();
    let preprocessed_value_number = preprocessed.table.vector_count().max(1);

    let swept = granularity_sweep(
        &preprocessed.table,
        false,
        true,
        |g| {
            GroupingCost::new(preprocessed_value_number, class_value_number, options.attribute_cost, g, total_instance_number)
                .expect("value_number/class_value_number/total_instance_number are always valid here")
        },
        interrupt,
    );

    // compose original-modality -> preprocessed-group -> final-group
    let composed_assignment: Vec<usize> = preprocessed
        .group_assignment
        .iter()
        .map(|&pre_group| swept.group_assignment[pre_group])
        .collect();

    if interrupt.is_requested() {
        return GroupOutcome {
            table: swept.table,
            group_assignment: composed_assignment,
            garbage_modality_number: swept.garbage_modality_number,
            total_cost: swept.total_cost,
        };
    }

    let final_cost = GroupingCost::new(
        preprocessed_value_number,
        class_value_number,
        options.attribute_cost,
        swept.granularity,
        total_instance_number,
    )
    .expect("same parameters validated above");

    let group_count = composed_assignment.iter().copied().max().map_or(0, |m| m + 1);
    let supports_garbage = swept.garbage_modality_number > 0;

    let optimized = post_optimize_groups(source, &final_cost, composed_assignment, group_count, swept.garbage_modality_number, interrupt);

    let (merged_assignment, merged_count, merged_cost) =
        force_best_merge_descent(source, &final_cost, optimized, group_count, false, supports_garbage, interrupt);
    let (exhaustive_assignment, _exhaustive_count, exhaustive_cost) =
        exhaustive_merge_to_minimum(source, &final_cost, merged_assignment.clone(), merged_count, 2, false, interrupt);

    let (best_assignment, best_cost) = if exhaustive_cost < merged_cost - crate::EPSILON {
        (exhaustive_assignment, exhaustive_cost)
    } else {
        (merged_assignment, merged_cost)
    };
    let best_group_count = best_assignment.iter().copied().max().map_or(0, |m| m + 1);

    let (singleton_assignment, singleton_count, singleton_cost) =
        singleton_test(source, &final_cost, best_assignment, best_group_count, best_cost);

    let table = compact_table(source, &singleton_assignment, singleton_count);
    GroupOutcome {
        table,
        group_assignment: singleton_assignment,
        garbage_modality_number: if singleton_count == best_group_count { swept.garbage_modality_number } else { 0 },
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
