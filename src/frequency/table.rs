//! [`FrequencyTable`]: an ordered sequence of [`FrequencyVector`]s plus
//! partition-level metadata (spec §3, §4.A).

use crate::frequency::vector::FrequencyVector;
use crate::grid::{AttributeMeta, AttributePartition, DataGrid};
use crate::Frequency;
use std::cell::Cell;

/// An ordered sequence of same-shape [`FrequencyVector`]s. All vectors share
/// the same variant and `vector_size`; `total_frequency` is memoized and
/// invalidated whenever the sequence is structurally changed (§3).
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    vectors: Vec<FrequencyVector>,
    granularity: usize,
    garbage_modality_number: usize,
    initial_value_number: usize,
    granularized_value_number: usize,
    total_frequency: Cell<Option<i64>>,
}

impl FrequencyTable {
    pub fn new(vectors: Vec<FrequencyVector>) -> Self {
        Self {
            vectors,
            granularity: 0,
            garbage_modality_number: 0,
            initial_value_number: 0,
            granularized_value_number: 0,
            total_frequency: Cell::new(None),
        }
    }

    /// pre-allocates `n` zeroed vectors shaped like `template` (dense size or
    /// histogram kind), as the granularity sweep's granularizer does before
    /// filling partiles in (§4.A).
    pub fn new_with_capacity(n: usize, template: &FrequencyVector) -> Self {
        let vectors = (0..n)
            .map(|_| match template {
                FrequencyVector::Dense { counts, .. } => FrequencyVector::dense(vec![0; counts.len()], 0),
                FrequencyVector::Histogram { .. } => FrequencyVector::histogram(0, 0.0, 0),
            })
            .collect();
        Self::new(vectors)
    }

    fn invalidate(&mut self) {
        self.total_frequency.set(None);
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn vector_size(&self) -> usize {
        self.vectors.first().and_then(|v| v.counts()).map_or(0, |c| c.len())
    }

    pub fn get_vector(&self, i: usize) -> &FrequencyVector {
        &self.vectors[i]
    }

    pub fn vectors(&self) -> &[FrequencyVector] {
        &self.vectors
    }

    pub fn vectors_mut(&mut self) -> &mut Vec<FrequencyVector> {
        self.invalidate();
        &mut self.vectors
    }

    pub fn set_vector(&mut self, i: usize, vector: FrequencyVector) {
        self.vectors[i] = vector;
        self.invalidate();
    }

    pub fn push_vector(&mut self, vector: FrequencyVector) {
        self.vectors.push(vector);
        self.invalidate();
    }

    pub fn remove_vector(&mut self, i: usize) -> FrequencyVector {
        let removed = self.vectors.remove(i);
        self.invalidate();
        removed
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    pub fn set_granularity(&mut self, g: usize) {
        self.granularity = g;
    }

    pub fn garbage_modality_number(&self) -> usize {
        self.garbage_modality_number
    }

    pub fn set_garbage_modality_number(&mut self, n: usize) {
        self.garbage_modality_number = n;
    }

    pub fn initial_value_number(&self) -> usize {
        self.initial_value_number
    }

    pub fn set_initial_value_number(&mut self, n: usize) {
        self.initial_value_number = n;
    }

    pub fn granularized_value_number(&self) -> usize {
        self.granularized_value_number
    }

    pub fn set_granularized_value_number(&mut self, n: usize) {
        self.granularized_value_number = n;
    }

    /// lazily recomputed, memoized sum over all vectors (§3).
    pub fn total(&self) -> Frequency {
        if let Some(cached) = self.total_frequency.get() {
            return cached as Frequency;
        }
        let sum: i64 = self.vectors.iter().map(|v| v.total() as i64).sum();
        self.total_frequency.set(Some(sum));
        sum as Frequency
    }

    /// sum of totals over vectors `[lo, hi)`.
    pub fn partial_total(&self, lo: usize, hi: usize) -> Frequency {
        self.vectors[lo..hi].iter().map(FrequencyVector::total).sum()
    }

    /// per-class column sums across every vector (dense tables only).
    pub fn compute_target_frequencies(&self) -> Vec<Frequency> {
        let size = self.vector_size();
        let mut totals = vec![0; size];
        for vector in &self.vectors {
            if let Some(counts) = vector.counts() {
                for (t, c) in totals.iter_mut().zip(counts.iter()) {
                    *t += c;
                }
            }
        }
        totals
    }

    /// the single-vector null model: one part holding the column sums of
    /// `self`, with the same modality/granularity bookkeeping as `self`
    /// (§3 "reserved for the null model with exactly one vector").
    pub fn compute_null_table(&self) -> Self {
        let modality_number: usize = self.vectors.iter().map(FrequencyVector::modality_number).sum();
        let null_vector = match self.vectors.first() {
            Some(FrequencyVector::Dense { .. }) | None => {
                FrequencyVector::dense(self.compute_target_frequencies(), modality_number)
            }
            Some(FrequencyVector::Histogram { .. }) => {
                let frequency = self.total();
                let length: f64 = self
                    .vectors
                    .iter()
                    .filter_map(FrequencyVector::length_in_bins)
                    .sum();
                FrequencyVector::histogram(frequency, length, modality_number)
            }
        };
        let mut table = Self::new(vec![null_vector]);
        table.initial_value_number = self.initial_value_number;
        table.granularized_value_number = self.granularized_value_number;
        table.granularity = 0;
        table
    }

    /// drops vectors whose total frequency is zero, returning an
    /// `old_index -> Option<new_index>` map (`None` where the vector was
    /// removed) so callers can recompose `group_assignment` vectors. A
    /// lone vector is never dropped: the empty-vector case is reserved for
    /// the single-vector null model (§3).
    pub fn filter_empty_vectors(&mut self) -> Vec<Option<usize>> {
        if self.vectors.len() <= 1 {
            return self.vectors.iter().map(|_| Some(0)).collect();
        }
        let mut mapping = Vec::with_capacity(self.vectors.len());
        let mut kept = Vec::with_capacity(self.vectors.len());
        for vector in self.vectors.drain(..) {
            if vector.total() == 0 {
                mapping.push(None);
            } else {
                mapping.push(Some(kept.len()));
                kept.push(vector);
            }
        }
        self.vectors = kept;
        self.invalidate();
        mapping
    }

    pub fn is_sorted_by_source_frequency(&self, ascending: bool) -> bool {
        self.vectors.windows(2).all(|w| {
            if ascending {
                w[0].total() <= w[1].total()
            } else {
                w[0].total() >= w[1].total()
            }
        })
    }

    /// stably reorders vectors by total frequency, relocating by index
    /// permutation (no content reallocation) and rewriting `group_assignment`
    /// so old-row -> new-part-index mappings stay consistent.
    pub fn sort_by_source_frequency(&mut self, ascending: bool, group_assignment: &mut [usize]) {
        let mut order: Vec<usize> = (0..self.vectors.len()).collect();
        order.sort_by(|&a, &b| {
            let key_a = self.vectors[a].total();
            let key_b = self.vectors[b].total();
            if ascending {
                key_a.cmp(&key_b).then(a.cmp(&b))
            } else {
                key_b.cmp(&key_a).then(a.cmp(&b))
            }
        });
        self.apply_permutation(&order, group_assignment);
    }

    /// like [`sort_by_source_frequency`](Self::sort_by_source_frequency), but
    /// breaks ties using the index of each group's first original modality
    /// (as recorded by `groups`, index-aligned with `self.vectors`).
    pub fn sort_by_source_and_first_modality_frequency(&mut self, groups: &mut Vec<usize>) {
        let mut order: Vec<usize> = (0..self.vectors.len()).collect();
        order.sort_by(|&a, &b| {
            let key_a = (self.vectors[a].total(), groups.get(a).copied().unwrap_or(usize::MAX));
            let key_b = (self.vectors[b].total(), groups.get(b).copied().unwrap_or(usize::MAX));
            key_a.cmp(&key_b).then(a.cmp(&b))
        });
        self.apply_permutation(&order, groups);
    }

    /// `import_from_datagrid` (spec §4.A, §8 property 9): reads a univariate
    /// source/target [`DataGrid`] into one dense vector per source part,
    /// column-summed over the target attribute's cells.
    pub fn import_from_datagrid(grid: &DataGrid) -> Self {
        debug_assert_eq!(grid.source_attribute_number(), 1, "import_from_datagrid expects exactly one source attribute");
        debug_assert_eq!(grid.target_attribute_number(), 1, "import_from_datagrid expects exactly one target attribute");

        let source_part_number = grid.attribute_at(0).part_number();
        let target_part_number = grid.attribute_at(1).part_number();
        let mut counts = vec![vec![0 as Frequency; target_part_number]; source_part_number];
        for cell in grid.export_all_cells() {
            counts[cell.part_indexes[0]][cell.part_indexes[1]] += cell.frequency;
        }

        let vectors = counts.into_iter().map(|row| FrequencyVector::dense(row, 1)).collect();
        let mut table = Self::new(vectors);
        let source_meta = grid.attribute_meta_at(0);
        table.initial_value_number = source_meta.initial_value_number;
        table.granularized_value_number = source_meta.granularized_value_number;
        table
    }

    /// the `export_to_datagrid` counterpart (spec §8 property 9): a
    /// bivariate grid with one [`AttributePartition::VirtualValues`]
    /// attribute per side, carrying the same cell frequencies as `self`.
    /// This table owns no partition-kind semantics (interval bounds, kept
    /// symbols) of its own, so a round trip compares cell frequencies, not
    /// the reconstructed partition's type.
    pub fn export_to_datagrid(&self) -> DataGrid {
        let mut grid = DataGrid::new();
        grid.add_attribute(
            AttributeMeta {
                attribute_name: "source".to_string(),
                initial_value_number: self.initial_value_number,
                granularized_value_number: self.granularized_value_number,
            },
            AttributePartition::VirtualValues {
                part_number: self.vector_count().max(1),
            },
        );
        grid.add_attribute(
            AttributeMeta {
                attribute_name: "target".to_string(),
                initial_value_number: 0,
                granularized_value_number: 0,
            },
            AttributePartition::VirtualValues {
                part_number: self.vector_size().max(1),
            },
        );
        grid.set_source_attribute_number(1);
        grid.create_all_cells();
        for (s, vector) in self.vectors.iter().enumerate() {
            if let Some(counts) = vector.counts() {
                for (t, &frequency) in counts.iter().enumerate() {
                    if frequency != 0 {
                        grid.set_cell_frequency(&[s, t], frequency);
                    }
                }
            }
        }
        grid
    }

    fn apply_permutation(&mut self, order: &[usize], group_assignment: &mut [usize]) {
        let mut new_vectors = Vec::with_capacity(order.len());
        let mut old_to_new = vec![0usize; order.len()];
        for (new_index, &old_index) in order.iter().enumerate() {
            old_to_new[old_index] = new_index;
        }
        for &old_index in order {
            new_vectors.push(self.vectors[old_index].clone());
        }
        self.vectors = new_vectors;
        for slot in group_assignment.iter_mut() {
            if *slot < old_to_new.len() {
                *slot = old_to_new[*slot];
            }
        }
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(counts: &[Frequency]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn total_is_memoized_and_recomputes_after_mutation() {
        let mut table = FrequencyTable::new(vec![dense(&[1, 2]), dense(&[3, 4])]);
        assert_eq!(table.total(), 10);
        table.push_vector(dense(&[0, 5]));
        assert_eq!(table.total(), 15);
    }

    #[test]
    fn null_table_is_single_vector_of_column_sums() {
        let table = FrequencyTable::new(vec![dense(&[1, 9]), dense(&[4, 1])]);
        let null = table.compute_null_table();
        assert_eq!(null.vector_count(), 1);
        assert_eq!(null.get_vector(0).counts(), Some(&[5, 10][..]));
    }

    #[test]
    fn sort_by_source_frequency_updates_assignment_consistently() {
        let mut table = FrequencyTable::new(vec![dense(&[0, 5]), dense(&[0, 1]), dense(&[0, 9])]);
        let mut assignment = vec![0usize, 1, 2, 1, 0];
        table.sort_by_source_frequency(true, &mut assignment);
        assert!(table.is_sorted_by_source_frequency(true));
        // old part 1 (total 1) is now first, old part 0 (total 5) second, old part 2 (total 9) third
        assert_eq!(assignment, vec![1, 0, 2, 0, 1]);
    }

    #[test]
    fn filter_empty_vectors_maps_surviving_indices() {
        let mut table = FrequencyTable::new(vec![dense(&[0, 0]), dense(&[1, 0]), dense(&[0, 0]), dense(&[0, 2])]);
        let mapping = table.filter_empty_vectors();
        assert_eq!(mapping, vec![None, Some(0), None, Some(1)]);
        assert_eq!(table.vector_count(), 2);
    }

    #[test]
    fn compute_target_frequencies_sums_columns() {
        let table = FrequencyTable::new(vec![dense(&[1, 2, 3]), dense(&[4, 5, 6])]);
        assert_eq!(table.compute_target_frequencies(), vec![5, 7, 9]);
    }

    #[test]
    fn datagrid_round_trip_preserves_cell_frequencies() {
        let table = FrequencyTable::new(vec![dense(&[5, 0, 2]), dense(&[0, 3, 0]), dense(&[1, 1, 1])]);
        let grid = table.export_to_datagrid();
        let reimported = FrequencyTable::import_from_datagrid(&grid);
        assert_eq!(reimported.total(), table.total());
        for i in 0..table.vector_count() {
            assert_eq!(reimported.get_vector(i).counts(), table.get_vector(i).counts());
        }
    }
}
