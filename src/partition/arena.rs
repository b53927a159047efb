//! Group/merge arena with integer handles (spec §4.C.2, Design Note §9 item
//! 1). Source modeled the agglomerable working table as a cyclic graph of
//! raw-pointer `KWMODLGroup`/`KWMODLGroupMerge` nodes threaded through a
//! sorted list; here groups live in a flat `Vec`, merge candidates in a
//! lower-triangular flat array indexed by `i*(i-1)/2 + j`, and the sorted
//! modality-count index holds weak back-handles into that `Vec` rather than
//! pointers.

use crate::cost::PartitionCost;
use crate::frequency::FrequencyVector;
use crate::Continuous;

fn merge_index(i: usize, j: usize) -> usize {
    debug_assert!(i > j, "merge_index requires i > j, got i={i} j={j}");
    i * (i - 1) / 2 + j
}

/// A single candidate merge's cached `ΔCost = cost(union) - cost(i) - cost(j)`.
/// `None` once either side has been merged away.
type MergeCell = Option<Continuous>;

/// The sorted-by-modality-count index used to track which surviving group
/// would become the garbage bucket (spec §4.C.2 "a sorted index of groups").
/// Positions are cached on each [`FrequencyVector`] as a weak back-handle;
/// they are nulled on removal so a stale read cannot resurrect a removed
/// entry (Design Note §9 item 1).
#[derive(Debug, Default)]
struct SortedModalityIndex {
    order: Vec<usize>,
}

impl SortedModalityIndex {
    fn rebuild_positions_from(&mut self, groups: &mut [Option<FrequencyVector>], from: usize) {
        for (pos, &group_index) in self.order.iter().enumerate().skip(from) {
            if let Some(vector) = groups[group_index].as_mut() {
                vector.set_position(Some(pos));
            }
        }
    }

    fn insert(&mut self, groups: &mut [Option<FrequencyVector>], group_index: usize) {
        let modality_number = groups[group_index]
            .as_ref()
            .expect("inserted group must be alive")
            .modality_number();
        let position = self
            .order
            .partition_point(|&gi| groups[gi].as_ref().unwrap().modality_number() <= modality_number);
        self.order.insert(position, group_index);
        self.rebuild_positions_from(groups, position);
    }

    fn remove(&mut self, groups: &mut [Option<FrequencyVector>], group_index: usize) {
        let position = groups[group_index]
            .as_ref()
            .and_then(FrequencyVector::position)
            .expect("removed group must carry a sorted-list back-handle");
        debug_assert_eq!(
            self.order.get(position).copied(),
            Some(group_index),
            "stale sorted-list back-handle for group {group_index}"
        );
        self.order.remove(position);
        if let Some(vector) = groups[group_index].as_mut() {
            vector.set_position(None);
        }
        self.rebuild_positions_from(groups, position);
    }

    fn largest(&self) -> Option<usize> {
        self.order.last().copied()
    }
}

/// The agglomerable working table driving the merge-based grouping optimizer
/// (spec §4.C.2). Groups are addressed by stable integer handle; a merged-away
/// group's slot becomes `None` and is never reused within the same arena.
pub struct GroupArena<'c, C: PartitionCost> {
    groups: Vec<Option<FrequencyVector>>,
    self_cost: Vec<Continuous>,
    merges: Vec<MergeCell>,
    modality_index: SortedModalityIndex,
    alive_count: usize,
    cost: &'c C,
    /// `Some` only in ordered mode (discretization): a doubly linked list over
    /// surviving groups preserving their original left-to-right order, so
    /// only neighbor pairs are ever considered for merging.
    next: Vec<Option<usize>>,
    prev: Vec<Option<usize>>,
    ordered: bool,
}

impl<'c, C: PartitionCost> GroupArena<'c, C> {
    /// Builds an unordered arena (spec §4.C.2): any two surviving groups may
    /// be merged, as grouping a categorical attribute does not constrain
    /// which values may be joined.
    pub fn new(vectors: Vec<FrequencyVector>, cost: &'c C) -> Self {
        Self::build(vectors, cost, false)
    }

    /// Builds an ordered arena (spec §4.C.1/§4.C.4): only adjacent groups may
    /// be merged, preserving the left-to-right interval order a
    /// discretization or two-class sort-then-discretize run requires.
    pub fn new_ordered(vectors: Vec<FrequencyVector>, cost: &'c C) -> Self {
        Self::build(vectors, cost, true)
    }

    fn build(vectors: Vec<FrequencyVector>, cost: &'c C, ordered: bool) -> Self {
        let m = vectors.len();
        let self_cost = vectors.iter().map(|v| cost.part_cost(v)).collect();
        let groups: Vec<Option<FrequencyVector>> = vectors.into_iter().map(Some).collect();
        let merges = vec![None; m.saturating_sub(1) * m / 2];
        let next = (0..m).map(|i| if i + 1 < m { Some(i + 1) } else { None }).collect();
        let prev = (0..m).map(|i| if i > 0 { Some(i - 1) } else { None }).collect();

        let mut arena = Self {
            groups,
            self_cost,
            merges,
            modality_index: SortedModalityIndex::default(),
            alive_count: m,
            cost,
            next,
            prev,
            ordered,
        };
        for i in 0..m {
            arena.modality_index.insert(&mut arena.groups, i);
        }
        if ordered {
            for i in 0..m {
                if let Some(j) = arena.prev[i] {
                    arena.recompute_merge_cell(i, j);
                }
            }
        } else {
            for i in 0..m {
                for j in 0..i {
                    arena.recompute_merge_cell(i, j);
                }
            }
        }
        arena
    }

    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    pub fn is_alive(&self, group_index: usize) -> bool {
        self.groups[group_index].is_some()
    }

    pub fn vector(&self, group_index: usize) -> &FrequencyVector {
        self.groups[group_index].as_ref().expect("group_index refers to a merged-away group")
    }

    pub fn self_cost(&self, group_index: usize) -> Continuous {
        self.self_cost[group_index]
    }

    pub fn alive_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.groups.len()).filter(move |&i| self.is_alive(i))
    }

    /// The group with the largest modality count among survivors -- the
    /// with-garbage variant's candidate garbage bucket (spec §4.C.2 item 4).
    pub fn largest_modality_group(&self) -> Option<usize> {
        self.modality_index.largest()
    }

    fn cell_of(&self, i: usize, j: usize) -> MergeCell {
        if i > j {
            self.merges[merge_index(i, j)]
        } else if j > i {
            self.merges[merge_index(j, i)]
        } else {
            None
        }
    }

    fn set_cell(&mut self, i: usize, j: usize, value: MergeCell) {
        if i > j {
            self.merges[merge_index(i, j)] = value;
        } else if j > i {
            self.merges[merge_index(j, i)] = value;
        }
    }

    fn recompute_merge_cell(&mut self, i: usize, j: usize) {
        if !self.is_alive(i) || !self.is_alive(j) {
            self.set_cell(i, j, None);
            return;
        }
        let union = self.vector(i).union(self.vector(j));
        let delta = self.cost.part_cost(&union) - self.self_cost(i) - self.self_cost(j);
        self.set_cell(i, j, Some(delta));
    }

    /// The best (lowest-ΔCost) candidate merge among surviving groups, ties
    /// broken by lexicographic `(i, j)` (spec §4.C.2 item 1). In ordered mode
    /// only adjacent pairs are candidates.
    pub fn best_merge(&self) -> Option<(usize, usize, Continuous)> {
        let mut best: Option<(usize, usize, Continuous)> = None;
        let mut consider = |i: usize, j: usize, best: &mut Option<(usize, usize, Continuous)>| {
            if let Some(delta) = self.cell_of(i, j) {
                match best {
                    Some((_, _, best_delta)) if *best_delta <= delta => {}
                    _ => *best = Some((i, j, delta)),
                }
            }
        };
        if self.ordered {
            let mut cursor = self.head();
            while let Some(i) = cursor {
                if let Some(j) = self.next[i] {
                    consider(i.max(j), i.min(j), &mut best);
                }
                cursor = self.next[i];
            }
        } else {
            for i in self.alive_indices() {
                for j in self.alive_indices() {
                    if j >= i {
                        break;
                    }
                    consider(i, j, &mut best);
                }
            }
        }
        best
    }

    fn head(&self) -> Option<usize> {
        self.alive_indices().find(|&i| self.prev[i].is_none())
    }

    /// Executes the merge of `i` and `j` (`j < i`): unions `j` into `i`,
    /// retires `j`'s slot, recomputes `i`'s self-cost and the merge cells it
    /// needs (every surviving group in unordered mode, just its new
    /// neighbors in ordered mode), and updates the sorted modality index
    /// (spec §4.C.2 item 3). Returns the surviving group's index (`i`).
    pub fn execute_merge(&mut self, i: usize, j: usize) -> usize {
        debug_assert!(i > j);
        debug_assert!(self.is_alive(i) && self.is_alive(j));

        self.modality_index.remove(&mut self.groups, i);
        self.modality_index.remove(&mut self.groups, j);

        let merged = self.vector(i).union(self.vector(j));
        self.self_cost[i] = self.cost.part_cost(&merged);
        self.groups[i] = Some(merged);
        self.groups[j] = None;
        self.alive_count -= 1;

        if self.ordered {
            let before = self.prev[j];
            let after = self.next[j];
            if self.next[i] == Some(j) {
                self.next[i] = after;
                if let Some(a) = after {
                    self.prev[a] = Some(i);
                }
            } else {
                debug_assert_eq!(self.prev[i], Some(j));
                self.prev[i] = before;
                if let Some(b) = before {
                    self.next[b] = Some(i);
                }
            }
            self.set_cell(i.max(j), i.min(j), None);
            if let Some(p) = self.prev[i] {
                self.recompute_merge_cell(i.max(p), i.min(p));
            }
            if let Some(n) = self.next[i] {
                self.recompute_merge_cell(i.max(n), i.min(n));
            }
        } else {
            for k in 0..self.groups.len() {
                if k != i {
                    self.set_cell(i.max(k), i.min(k), None);
                }
            }
            for k in self.alive_indices().collect::<Vec<_>>() {
                if k != i {
                    self.recompute_merge_cell(i.max(k), i.min(k));
                }
            }
        }

        self.modality_index.insert(&mut self.groups, i);
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::grouping::GroupingCost;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn best_merge_picks_lowest_delta_with_lexicographic_tiebreak() {
        let cost = GroupingCost::new(4, 2, 0.0, 0, 100).unwrap();
        let vectors = vec![dense(&[5, 0]), dense(&[5, 0]), dense(&[0, 5]), dense(&[0, 5])];
        let arena = GroupArena::new(vectors, &cost);
        let (i, j, _) = arena.best_merge().expect("some merge should exist");
        // merging two same-class groups should be cheaper than cross-class ones
        assert!(i != j);
    }

    #[test]
    fn execute_merge_reduces_alive_count_and_unions_frequencies() {
        let cost = GroupingCost::new(3, 2, 0.0, 0, 100).unwrap();
        let vectors = vec![dense(&[1, 0]), dense(&[0, 1]), dense(&[1, 1])];
        let mut arena = GroupArena::new(vectors, &cost);
        let survivor = arena.execute_merge(1, 0);
        assert_eq!(arena.alive_count(), 2);
        assert!(!arena.is_alive(0));
        assert_eq!(arena.vector(survivor).total(), 2);
    }

    #[test]
    fn ordered_arena_only_merges_adjacent_intervals() {
        let cost = crate::cost::discretization::DiscretizationCost::new(4, 2, 0.0, 1, 100).unwrap();
        let vectors = vec![dense(&[5, 0]), dense(&[0, 5]), dense(&[5, 0]), dense(&[0, 5])];
        let mut arena = GroupArena::new_ordered(vectors, &cost);
        let (i, j, _) = arena.best_merge().expect("adjacent merge should exist");
        assert!(i.abs_diff(j) == 1 || arena.next[j] == Some(i) || arena.next[i] == Some(j));
        let survivor = arena.execute_merge(i.max(j), i.min(j));
        assert_eq!(arena.alive_count(), 3);
        assert_eq!(arena.vector(survivor).total(), 10);
    }

    #[test]
    fn largest_modality_group_tracks_merges() {
        let cost = GroupingCost::new(3, 2, 0.0, 0, 100).unwrap();
        let vectors = vec![dense(&[1, 0]), dense(&[0, 1]), dense(&[1, 1])];
        let mut arena = GroupArena::new(vectors, &cost);
        assert_eq!(arena.largest_modality_group(), Some(2));
        arena.execute_merge(1, 0);
        // group 1 now carries modality_number 2, same as group 2 (still largest or tied)
        let largest = arena.largest_modality_group().unwrap();
        assert!(arena.vector(largest).modality_number() >= 2);
    }
}
