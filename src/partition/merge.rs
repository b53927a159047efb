//! Merge-based construction (spec §4.C.2), driving a [`GroupArena`] down
//! from `m` singleton groups, greedily picking the best pairwise merge each
//! round and tracking the best-so-far partition under both the no-garbage
//! and with-garbage total-cost accounting.

use crate::cost::PartitionCost;
use crate::frequency::FrequencyTable;
use crate::interrupt::InterruptionToken;
use crate::partition::arena::GroupArena;
use crate::Continuous;

/// The outcome of one merge-based construction run: a target frequency
/// table, the row -> part assignment that produced it, the garbage
/// modality count (0 if no garbage group was used), and its total cost.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: FrequencyTable,
    pub group_assignment: Vec<usize>,
    pub garbage_modality_number: usize,
    pub total_cost: Continuous,
}

fn finalize<C: PartitionCost>(
    arena: &GroupArena<C>,
    row_to_group: &[usize],
    order: Vec<usize>,
) -> (FrequencyTable, Vec<usize>) {
    let mut compact_index = vec![None; row_to_group.iter().chain(order.iter()).copied().max().map_or(0, |m| m + 1)];
    let mut vectors = Vec::with_capacity(order.len());
    for (new_index, &group_index) in order.iter().enumerate() {
        compact_index[group_index] = Some(new_index);
        vectors.push(arena.vector(group_index).clone());
    }
    let table = FrequencyTable::new(vectors);
    let assignment = row_to_group
        .iter()
        .map(|&g| compact_index[g].expect("every row must map to a surviving group"))
        .collect();
    (table, assignment)
}

/// Surviving group indices in output order. Groups never change their array
/// index once created (only their slot is retired on merge), so ascending
/// index already matches a discretization arena's left-to-right interval
/// order; an unordered (grouping) arena has no order constraint to preserve.
fn alive_order<C: PartitionCost>(arena: &GroupArena<C>) -> Vec<usize> {
    arena.alive_indices().collect()
}

/// Runs the greedy merge loop described in spec §4.C.2. `ordered` restricts
/// merges to adjacent groups (discretization, two-class subgrouping);
/// `supports_garbage` enables tracking the with-garbage variant (grouping
/// only -- discretization and histogram costs never carry a garbage group).
pub fn merge_based_construction<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    ordered: bool,
    supports_garbage: bool,
    interrupt: &dyn InterruptionToken,
) -> MergeOutcome {
    let m = source.vector_count();
    if m <= 1 {
        let total_cost = cost.partition_cost(m.max(1), 0) + source.vectors().iter().map(|v| cost.part_cost(v)).sum::<Continuous>();
        return MergeOutcome {
            table: source.clone(),
            group_assignment: (0..m).map(|_| 0).collect(),
            garbage_modality_number: 0,
            total_cost,
        };
    }

    let vectors = source.vectors().to_vec();
    let mut arena = if ordered {
        GroupArena::new_ordered(vectors, cost)
    } else {
        GroupArena::new(vectors, cost)
    };
    let mut row_to_group: Vec<usize> = (0..m).collect();
    let mut sum_part_costs: Continuous = (0..m).map(|i| arena.self_cost(i)).sum();

    let order = alive_order(&arena);
    let (table0, assignment0) = finalize(&arena, &row_to_group, order);
    let mut best_no_garbage = MergeOutcome {
        total_cost: cost.partition_cost(m, 0) + sum_part_costs,
        table: table0,
        group_assignment: assignment0,
        garbage_modality_number: 0,
    };
    let mut best_with_garbage: Option<MergeOutcome> = None;

    loop {
        if interrupt.is_requested() {
            break;
        }
        let Some((i, j, _delta)) = arena.best_merge() else {
            break;
        };

        let k_after = arena.alive_count() - 1;
        let union = arena.vector(i).union(arena.vector(j));
        let merged_part_cost = cost.part_cost(&union);
        let sum_after = sum_part_costs - arena.self_cost(i) - arena.self_cost(j) + merged_part_cost;
        let total_no_garbage_after = cost.partition_cost(k_after.max(1), 0) + sum_after;
        let improves_no_garbage = total_no_garbage_after < best_no_garbage.total_cost - crate::EPSILON;

        let mut total_with_garbage_after = None;
        if supports_garbage && k_after >= 2 {
            let merged_modality = arena.vector(i).modality_number() + arena.vector(j).modality_number();
            let other_max = arena
                .alive_indices()
                .filter(|&x| x != i && x != j)
                .map(|x| arena.vector(x).modality_number())
                .max()
                .unwrap_or(0);
            let garbage_size = merged_modality.max(other_max);
            total_with_garbage_after = Some((cost.partition_cost(k_after, garbage_size) + sum_after, garbage_size));
        }
        let improves_with_garbage = total_with_garbage_after
            .map(|(total, _)| best_with_garbage.as_ref().map_or(true, |b| total < b.total_cost - crate::EPSILON))
            .unwrap_or(false);

        if !improves_no_garbage && !improves_with_garbage {
            break;
        }

        let survivor = arena.execute_merge(i, j);
        for slot in row_to_group.iter_mut() {
            if *slot == j {
                *slot = survivor;
            }
        }
        sum_part_costs = sum_after;

        if improves_no_garbage {
            let order = alive_order(&arena);
            let (table, assignment) = finalize(&arena, &row_to_group, order);
            best_no_garbage = MergeOutcome {
                total_cost: total_no_garbage_after,
                table,
                group_assignment: assignment,
                garbage_modality_number: 0,
            };
        }
        if let (true, Some((total, garbage_size))) = (improves_with_garbage, total_with_garbage_after) {
            let order = alive_order(&arena);
            let (table, assignment) = finalize(&arena, &row_to_group, order);
            best_with_garbage = Some(MergeOutcome {
                total_cost: total,
                table,
                group_assignment: assignment,
                garbage_modality_number: garbage_size,
            });
        }
    }

    match best_with_garbage {
        Some(with_garbage) if with_garbage.total_cost < best_no_garbage.total_cost - crate::EPSILON => with_garbage,
        _ => best_no_garbage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::grouping::GroupingCost;
    use crate::frequency::FrequencyVector;
    use crate::interrupt::NeverInterrupted;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn merges_perfectly_separable_values_down_to_two_groups() {
        let cost = GroupingCost::new(4, 2, 0.0, 0, 100).unwrap();
        let table = FrequencyTable::new(vec![dense(&[10, 0]), dense(&[9, 0]), dense(&[0, 10]), dense(&[0, 9])]);
        let outcome = merge_based_construction(&table, &cost, false, false, &NeverInterrupted);
        assert!(outcome.table.vector_count() <= 4);
        assert_eq!(outcome.group_assignment.len(), 4);
    }

    #[test]
    fn single_vector_source_is_a_no_op() {
        let cost = GroupingCost::new(1, 2, 0.0, 0, 100).unwrap();
        let table = FrequencyTable::new(vec![dense(&[5, 5])]);
        let outcome = merge_based_construction(&table, &cost, false, false, &NeverInterrupted);
        assert_eq!(outcome.table.vector_count(), 1);
        assert_eq!(outcome.group_assignment, vec![0]);
    }

    #[test]
    fn group_assignment_is_consistent_with_target_table_size() {
        let cost = GroupingCost::new(5, 2, 0.0, 0, 100).unwrap();
        let table = FrequencyTable::new(vec![
            dense(&[4, 0]),
            dense(&[3, 0]),
            dense(&[0, 4]),
            dense(&[0, 3]),
            dense(&[1, 1]),
        ]);
        let outcome = merge_based_construction(&table, &cost, false, false, &NeverInterrupted);
        let max_group = outcome.group_assignment.iter().copied().max().unwrap();
        assert!(max_group < outcome.table.vector_count());
    }
}
