//! Post-optimization family (spec §4.C.5), grounded on
//! `DTGrouperMODLOptimization.cpp`'s move/merge/singleton passes, with the
//! step/identity/fold loop shape borrowed from `src/clustering/elkan.rs`'s
//! best-move iteration in the teacher.
//!
//! All passes here work at the *modality* level: `source` is always the
//! full-resolution, one-row-per-original-modality table (never a
//! granularized intermediate), and `assignment[m]` names which final group
//! modality `m` currently belongs to. This lets a single modality move
//! between groups without losing the per-modality detail a granularized
//! table would have already summed away.

use rand::seq::SliceRandom;

use crate::cost::PartitionCost;
use crate::frequency::{FrequencyTable, FrequencyVector};
use crate::interrupt::InterruptionToken;
use crate::partition::arena::GroupArena;
use crate::random::DeterministicRng;
use crate::{Continuous, Frequency};

/// `a - b`, the inverse of [`FrequencyVector::absorb`]. Needed to test "what
/// would this group look like without modality `m`" without mutating the
/// group itself.
fn subtract(a: &FrequencyVector, b: &FrequencyVector) -> FrequencyVector {
    match (a, b) {
        (
            FrequencyVector::Dense {
                counts, modality_number, ..
            },
            FrequencyVector::Dense {
                counts: other_counts,
                modality_number: other_modality_number,
                ..
            },
        ) => {
            let counts: Vec<Frequency> = counts.iter().zip(other_counts.iter()).map(|(&a, &b)| a - b).collect();
            FrequencyVector::dense(counts, modality_number - other_modality_number)
        }
        (
            FrequencyVector::Histogram {
                frequency,
                length_in_bins,
                modality_number,
                ..
            },
            FrequencyVector::Histogram {
                frequency: other_frequency,
                length_in_bins: other_length,
                modality_number: other_modality_number,
                ..
            },
        ) => FrequencyVector::histogram(
            frequency - other_frequency,
            length_in_bins - other_length,
            modality_number - other_modality_number,
        ),
        _ => panic!("cannot subtract mismatched FrequencyVector variants"),
    }
}

/// Builds the `group_count` group-level vectors implied by `assignment`.
fn build_group_vectors(source: &FrequencyTable, assignment: &[usize], group_count: usize) -> Vec<FrequencyVector> {
    let mut groups: Vec<Option<FrequencyVector>> = vec![None; group_count];
    for (m, vector) in source.vectors().iter().enumerate() {
        let g = assignment[m];
        match &mut groups[g] {
            Some(existing) => existing.absorb(vector),
            slot @ None => *slot = Some(vector.clone()),
        }
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(g, v)| v.unwrap_or_else(|| panic!("group {g} has no modalities assigned to it")))
        .collect()
}

fn total_partition_cost<C: PartitionCost>(cost: &C, groups: &[FrequencyVector], garbage_modality_number: usize) -> Continuous {
    cost.partition_cost(groups.len(), garbage_modality_number) + groups.iter().map(|g| cost.part_cost(g)).sum::<Continuous>()
}

/// the with-garbage variant rejects any move that would leave fewer than 3
/// groups in a garbage-bearing partition (spec §4.C.5).
fn garbage_move_allowed(group_count: usize, supports_garbage: bool) -> bool {
    !supports_garbage || group_count >= 3
}

/// **Post-optimize groups (fixed K)** (spec §4.C.5): repeatedly moves the
/// single best-improving modality between groups until no move improves
/// the partition cost by at least `EPSILON`. Best-improvement makes this
/// pass order-independent, unlike [`post_optimize_groups_fast`].
pub fn post_optimize_groups<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    mut assignment: Vec<usize>,
    group_count: usize,
    garbage_modality_number: usize,
    interrupt: &dyn InterruptionToken,
) -> Vec<usize> {
    if group_count <= 1 || !garbage_move_allowed(group_count, garbage_modality_number > 0) {
        return assignment;
    }
    loop {
        if interrupt.is_requested() {
            break;
        }
        let groups = build_group_vectors(source, &assignment, group_count);
        let mut best: Option<(usize, usize, Continuous)> = None;

        for m in 0..source.vector_count() {
            let g_src = assignment[m];
            let modality = source.get_vector(m);
            let src_without = subtract(&groups[g_src], modality);
            if src_without.total() == 0 {
                // moving the last modality out of its group changes K; that
                // belongs to the merge-descent passes, not this fixed-K pass.
                continue;
            }
            let src_before = cost.part_cost(&groups[g_src]);
            let src_after = cost.part_cost(&src_without);

            for g_dst in 0..group_count {
                if g_dst == g_src {
                    continue;
                }
                let dst_before = cost.part_cost(&groups[g_dst]);
                let dst_after = cost.part_cost(&groups[g_dst].union(modality));
                let delta = (src_after + dst_after) - (src_before + dst_before);
                if delta < -crate::EPSILON && best.map_or(true, |(.., best_delta)| delta < best_delta) {
                    best = Some((m, g_dst, delta));
                }
            }
        }

        match best {
            Some((m, g_dst, delta)) => {
                log::trace!("post-optimize: moving modality {m} to group {g_dst}, delta={delta:.6}");
                assignment[m] = g_dst;
            }
            None => break,
        }
    }
    assignment
}

/// **Fast variant** (spec §4.C.5): accepts the first improving move found
/// under a randomized modality/destination order, instead of searching for
/// the best one. Capped at `max_steps` passes. Order-dependence is a
/// documented property of this variant, not a bug (Design Note §9 "Random
/// shuffles in the fast-post-optimizer").
pub fn post_optimize_groups_fast<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    mut assignment: Vec<usize>,
    group_count: usize,
    garbage_modality_number: usize,
    rng: &mut DeterministicRng,
    max_steps: usize,
    interrupt: &dyn InterruptionToken,
) -> Vec<usize> {
    if group_count <= 1 || !garbage_move_allowed(group_count, garbage_modality_number > 0) {
        return assignment;
    }
    for _ in 0..max_steps {
        if interrupt.is_requested() {
            break;
        }
        let groups = build_group_vectors(source, &assignment, group_count);
        let mut modality_order: Vec<usize> = (0..source.vector_count()).collect();
        modality_order.shuffle(rng.inner_mut());

        let mut moved = false;
        for &m in &modality_order {
            let g_src = assignment[m];
            let modality = source.get_vector(m);
            let src_without = subtract(&groups[g_src], modality);
            if src_without.total() == 0 {
                continue;
            }
            let src_before = cost.part_cost(&groups[g_src]);
            let src_after = cost.part_cost(&src_without);

            let mut dest_order: Vec<usize> = (0..group_count).filter(|&g| g != g_src).collect();
            dest_order.shuffle(rng.inner_mut());
            for g_dst in dest_order {
                let dst_before = cost.part_cost(&groups[g_dst]);
                let dst_after = cost.part_cost(&groups[g_dst].union(modality));
                let delta = (src_after + dst_after) - (src_before + dst_before);
                if delta < -crate::EPSILON {
                    assignment[m] = g_dst;
                    moved = true;
                    break;
                }
            }
            if moved {
                break;
            }
        }
        if !moved {
            break;
        }
    }
    assignment
}

fn remap_after_merge(group: usize, lo: usize, hi: usize) -> usize {
    if group == hi {
        lo
    } else if group > hi {
        group - 1
    } else {
        group
    }
}

/// executes one unconditional merge of the best pairwise candidate (by
/// `GroupArena::best_merge`), returning the remapped assignment and the new
/// (smaller) group count. `ordered` restricts candidates to adjacent groups,
/// as discretization's interval ordering requires.
fn merge_best_pair<C: PartitionCost>(groups: &[FrequencyVector], assignment: &[usize], cost: &C, ordered: bool) -> Option<(Vec<usize>, usize)> {
    if groups.len() <= 1 {
        return None;
    }
    let arena = if ordered {
        GroupArena::new_ordered(groups.to_vec(), cost)
    } else {
        GroupArena::new(groups.to_vec(), cost)
    };
    let (i, j, _) = arena.best_merge()?;
    let (lo, hi) = (i.min(j), i.max(j));
    let remapped = assignment.iter().map(|&g| remap_after_merge(g, lo, hi)).collect();
    Some((remapped, groups.len() - 1))
}

/// **Post-optimize interval boundaries** (spec §4.C.5, discretization
/// specialization): the general [`post_optimize_groups`] move (any modality
/// to any group) would break a discretization's contiguous-interval
/// invariant, so this variant only ever tries shifting an interval's first
/// or last modality into its immediate neighbor -- the only moves that keep
/// every part a contiguous range of the original ordering.
pub fn post_optimize_interval_boundaries<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    mut assignment: Vec<usize>,
    group_count: usize,
    interrupt: &dyn InterruptionToken,
) -> Vec<usize> {
    if group_count <= 1 {
        return assignment;
    }
    loop {
        if interrupt.is_requested() {
            break;
        }
        // interval_of[g] = (first_row, last_row), derived from the current
        // (sorted, contiguous) assignment.
        let mut bounds = vec![(usize::MAX, 0usize); group_count];
        for (row, &g) in assignment.iter().enumerate() {
            let (lo, hi) = &mut bounds[g];
            *lo = (*lo).min(row);
            *hi = (*hi).max(row);
        }
        let groups = build_group_vectors(source, &assignment, group_count);

        let mut best: Option<(usize, usize, Continuous)> = None; // (row, dest_group, delta)
        for g in 0..group_count.saturating_sub(1) {
            let (_, right_of_g) = bounds[g];
            let (left_of_next, _) = bounds[g + 1];

            // shift the rightmost modality of g into g+1
            let moved = source.get_vector(right_of_g);
            if groups[g].total() > moved.total() {
                let src_without = subtract(&groups[g], moved);
                let delta = (cost.part_cost(&src_without) + cost.part_cost(&groups[g + 1].union(moved)))
                    - (cost.part_cost(&groups[g]) + cost.part_cost(&groups[g + 1]));
                if delta < -crate::EPSILON && best.map_or(true, |(.., d)| delta < d) {
                    best = Some((right_of_g, g + 1, delta));
                }
            }

            // shift the leftmost modality of g+1 into g
            let moved = source.get_vector(left_of_next);
            if groups[g + 1].total() > moved.total() {
                let src_without = subtract(&groups[g + 1], moved);
                let delta = (cost.part_cost(&src_without) + cost.part_cost(&groups[g].union(moved)))
                    - (cost.part_cost(&groups[g + 1]) + cost.part_cost(&groups[g]));
                if delta < -crate::EPSILON && best.map_or(true, |(.., d)| delta < d) {
                    best = Some((left_of_next, g, delta));
                }
            }
        }

        match best {
            Some((row, dest, _)) => assignment[row] = dest,
            None => break,
        }
    }
    assignment
}

/// **Force-best merge** (spec §4.C.5): unconditionally performs the current
/// best pairwise merge, re-runs fixed-K post-optimization on the result,
/// and accepts it as the new optimum only if it strictly improves total
/// cost. Gives up after `MAX_TESTED_FORCED_MERGE_NUMBER` consecutive
/// non-improving attempts.
pub fn force_best_merge_descent<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    initial_assignment: Vec<usize>,
    initial_group_count: usize,
    ordered: bool,
    supports_garbage: bool,
    interrupt: &dyn InterruptionToken,
) -> (Vec<usize>, usize, Continuous) {
    let mut assignment = initial_assignment;
    let mut group_count = initial_group_count;
    let mut groups = build_group_vectors(source, &assignment, group_count);
    let mut best_cost = total_partition_cost(cost, &groups, 0);
    let mut best_assignment = assignment.clone();
    let mut best_group_count = group_count;
    let mut consecutive_failures = 0usize;

    while group_count > 1 && consecutive_failures < crate::MAX_TESTED_FORCED_MERGE_NUMBER {
        if interrupt.is_requested() {
            break;
        }
        let Some((merged_assignment, merged_group_count)) = merge_best_pair(&groups, &assignment, cost, ordered) else {
            break;
        };
        if !garbage_move_allowed(merged_group_count, supports_garbage) {
            break;
        }
        let optimized = if ordered {
            post_optimize_interval_boundaries(source, cost, merged_assignment, merged_group_count, interrupt)
        } else {
            post_optimize_groups(source, cost, merged_assignment, merged_group_count, 0, interrupt)
        };
        let optimized_groups = build_group_vectors(source, &optimized, merged_group_count);
        let optimized_cost = total_partition_cost(cost, &optimized_groups, 0);

        if optimized_cost < best_cost - crate::EPSILON {
            log::debug!("force-merge descent: accepted K={merged_group_count}, cost={optimized_cost:.6}");
            best_cost = optimized_cost;
            best_assignment = optimized.clone();
            best_group_count = merged_group_count;
            consecutive_failures = 0;
        } else {
            consecutive_failures += 1;
            log::trace!("force-merge descent: K={merged_group_count} did not improve, cost={optimized_cost:.6} ({consecutive_failures}/{})", crate::MAX_TESTED_FORCED_MERGE_NUMBER);
        }

        assignment = optimized;
        groups = optimized_groups;
        group_count = merged_group_count;
    }

    (best_assignment, best_group_count, best_cost)
}

/// **Exhaustive merge to minimum K** (spec §4.C.5): unlike
/// [`force_best_merge_descent`], never stops early -- it keeps forcing the
/// best pairwise merge all the way down to `target_group_count` (>= 2),
/// memorizing the best intermediate partition seen along the way.
pub fn exhaustive_merge_to_minimum<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    initial_assignment: Vec<usize>,
    initial_group_count: usize,
    target_group_count: usize,
    ordered: bool,
    interrupt: &dyn InterruptionToken,
) -> (Vec<usize>, usize, Continuous) {
    let mut assignment = initial_assignment;
    let mut group_count = initial_group_count;
    let mut groups = build_group_vectors(source, &assignment, group_count);

    let mut best_cost = total_partition_cost(cost, &groups, 0);
    let mut best_assignment = assignment.clone();
    let mut best_group_count = group_count;

    while group_count > target_group_count.max(2).min(group_count.max(1)) {
        if interrupt.is_requested() {
            break;
        }
        let Some((merged_assignment, merged_group_count)) = merge_best_pair(&groups, &assignment, cost, ordered) else {
            break;
        };
        assignment = merged_assignment;
        group_count = merged_group_count;
        groups = build_group_vectors(source, &assignment, group_count);
        let cost_now = total_partition_cost(cost, &groups, 0);
        if cost_now < best_cost - crate::EPSILON {
            best_cost = cost_now;
            best_assignment = assignment.clone();
            best_group_count = group_count;
        }
    }

    (best_assignment, best_group_count, best_cost)
}

/// **Singleton test** (spec §4.C.5): compares the current optimum against
/// the trivial 1-group partition, adopting it if it is strictly better.
pub fn singleton_test<C: PartitionCost>(
    source: &FrequencyTable,
    cost: &C,
    current_assignment: Vec<usize>,
    current_group_count: usize,
    current_cost: Continuous,
) -> (Vec<usize>, usize, Continuous) {
    let null_vector = build_group_vectors(source, &vec![0; source.vector_count()], 1).remove(0);
    let singleton_cost = total_partition_cost(cost, std::slice::from_ref(&null_vector), 0);
    if singleton_cost < current_cost - crate::EPSILON {
        (vec![0; source.vector_count()], 1, singleton_cost)
    } else {
        (current_assignment, current_group_count, current_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::grouping::GroupingCost;
    use crate::interrupt::NeverInterrupted;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    fn source() -> FrequencyTable {
        FrequencyTable::new(vec![
            dense(&[10, 0]),
            dense(&[9, 0]),
            dense(&[0, 10]),
            dense(&[0, 9]),
            dense(&[5, 5]),
        ])
    }

    #[test]
    fn post_optimize_moves_a_misassigned_modality_to_its_natural_group() {
        let cost = GroupingCost::new(5, 2, 0.0, 0, 100).unwrap();
        let table = source();
        // deliberately misassign row 0 (pure class 0) into the class-1 group
        let assignment = vec![1, 0, 1, 1, 0];
        let optimized = post_optimize_groups(&table, &cost, assignment, 2, 0, &NeverInterrupted);
        // row 0 should end up grouped with row 1 (both pure class 0)
        assert_eq!(optimized[0], optimized[1]);
    }

    #[test]
    fn fast_variant_is_reproducible_under_the_same_seed() {
        let cost = GroupingCost::new(5, 2, 0.0, 0, 100).unwrap();
        let table = source();
        let assignment = vec![1, 0, 1, 1, 0];
        let mut rng_a = DeterministicRng::seeded(7);
        let mut rng_b = DeterministicRng::seeded(7);
        let a = post_optimize_groups_fast(&table, &cost, assignment.clone(), 2, 0, &mut rng_a, 10, &NeverInterrupted);
        let b = post_optimize_groups_fast(&table, &cost, assignment, 2, 0, &mut rng_b, 10, &NeverInterrupted);
        assert_eq!(a, b);
    }

    #[test]
    fn force_best_merge_descent_never_increases_cost() {
        let cost = GroupingCost::new(5, 2, 0.0, 0, 100).unwrap();
        let table = source();
        let assignment: Vec<usize> = (0..5).collect();
        let initial_groups = build_group_vectors(&table, &assignment, 5);
        let initial_cost = total_partition_cost(&cost, &initial_groups, 0);
        let (_, _, best_cost) = force_best_merge_descent(&table, &cost, assignment, 5, false, false, &NeverInterrupted);
        assert!(best_cost <= initial_cost + crate::EPSILON);
    }

    #[test]
    fn exhaustive_merge_reaches_the_target_group_count_or_fewer() {
        let cost = GroupingCost::new(5, 2, 0.0, 0, 100).unwrap();
        let table = source();
        let assignment: Vec<usize> = (0..5).collect();
        let (final_assignment, final_count, _) = exhaustive_merge_to_minimum(&table, &cost, assignment, 5, 2, false, &NeverInterrupted);
        assert!(final_count <= 5);
        let max_group = final_assignment.iter().copied().max().unwrap();
        assert!(max_group < final_count);
    }

    #[test]
    fn singleton_test_adopts_the_null_partition_when_better() {
        let cost = GroupingCost::new(2, 2, 0.0, 0, 100).unwrap();
        // two groups that together carry no information worth a split
        let table = FrequencyTable::new(vec![dense(&[5, 5]), dense(&[5, 5])]);
        let groups = build_group_vectors(&table, &[0, 1], 2);
        let two_group_cost = total_partition_cost(&cost, &groups, 0);
        let (assignment, count, cost_after) = singleton_test(&table, &cost, vec![0, 1], 2, two_group_cost);
        assert_eq!(count, 1);
        assert_eq!(assignment, vec![0, 0]);
        assert!(cost_after <= two_group_cost + crate::EPSILON);
    }
}
