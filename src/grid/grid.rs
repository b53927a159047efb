//! `DataGrid`, the K-dimensional generalization of `FrequencyTable` (spec
//! §3 "DataGrid", §4.D), grounded on `KWDataGridStats` in
//! `KWDataGridStats.{h,cpp}`. Cells are stored as one flat, row-major vector
//! over the cartesian product of part counts, low-dimension-fastest, exactly
//! as `KWDataGridStats::InternalComputeCellIndex` builds its index.

use rayon::prelude::*;

use crate::grid::partition_kind::{AttributeMeta, AttributePartition};
use crate::Frequency;

/// One populated cell of a [`DataGrid`] (spec §4.D `export_all_cells`).
#[derive(Debug, Clone)]
pub struct Cell {
    pub part_indexes: Vec<usize>,
    pub frequency: Frequency,
}

/// A source-side cell grouped by source part tuple, carrying a frequency
/// breakdown over one target attribute's parts plus its interest score
/// (spec §4.D `export_source_cells_at`).
#[derive(Debug, Clone)]
pub struct SourceCell {
    pub part_indexes: Vec<usize>,
    pub target_part_frequencies: Vec<Frequency>,
    pub interest: f64,
}

/// K-dimensional generalization of [`crate::frequency::FrequencyTable`]:
/// indexed K-tuples of parts with cell counts (spec §3 "DataGrid").
#[derive(Debug, Clone, Default)]
pub struct DataGrid {
    attributes: Vec<(AttributeMeta, AttributePartition)>,
    source_attribute_number: usize,
    cell_frequencies: Vec<Frequency>,
    main_target_modality_index: Option<usize>,
}

impl DataGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// `add_attribute` (spec §4.D): appends a partition at the end of the
    /// attribute list. Cells must be (re)created afterwards.
    pub fn add_attribute(&mut self, meta: AttributeMeta, partition: AttributePartition) {
        self.attributes.push((meta, partition));
        self.cell_frequencies.clear();
    }

    pub fn attribute_number(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_at(&self, index: usize) -> &AttributePartition {
        &self.attributes[index].1
    }

    pub fn attribute_meta_at(&self, index: usize) -> &AttributeMeta {
        &self.attributes[index].0
    }

    /// `set_source_attribute_number` (spec §4.D): `k ∈ [0, attribute_number]`
    /// splits attributes into source/target halves.
    pub fn set_source_attribute_number(&mut self, k: usize) {
        debug_assert!(k <= self.attributes.len());
        self.source_attribute_number = k;
    }

    pub fn source_attribute_number(&self) -> usize {
        self.source_attribute_number
    }

    pub fn first_target_attribute_index(&self) -> usize {
        self.source_attribute_number
    }

    pub fn target_attribute_number(&self) -> usize {
        self.attributes.len() - self.source_attribute_number
    }

    pub fn set_main_target_modality_index(&mut self, index: Option<usize>) {
        self.main_target_modality_index = index;
    }

    pub fn main_target_modality_index(&self) -> Option<usize> {
        self.main_target_modality_index
    }

    fn part_numbers(&self) -> Vec<usize> {
        self.attributes.iter().map(|(_, p)| p.part_number()).collect()
    }

    pub fn compute_source_grid_size(&self) -> usize {
        self.part_numbers()[..self.source_attribute_number].iter().product::<usize>().max(1)
    }

    pub fn compute_total_grid_size(&self) -> usize {
        self.part_numbers().iter().product::<usize>().max(1)
    }

    /// `create_all_cells` (spec §4.D): allocates the flat cell vector,
    /// zeroed, sized to the cartesian product of every attribute's part
    /// count.
    pub fn create_all_cells(&mut self) {
        self.cell_frequencies = vec![0; self.compute_total_grid_size()];
    }

    /// low-dimension-fastest row-major index (spec §4.D, §8 property 10),
    /// mirroring `KWDataGridStats::InternalComputeCellIndex`.
    pub fn compute_cell_index(&self, part_indexes: &[usize]) -> usize {
        let part_numbers = self.part_numbers();
        debug_assert_eq!(part_indexes.len(), part_numbers.len());
        let mut index = 0usize;
        for attribute in (0..part_numbers.len()).rev() {
            if attribute < part_numbers.len() - 1 {
                index *= part_numbers[attribute];
            }
            index += part_indexes[attribute];
        }
        index
    }

    /// inverse of [`Self::compute_cell_index`] (spec §8 property 10).
    pub fn compute_part_indexes(&self, cell_index: usize) -> Vec<usize> {
        let part_numbers = self.part_numbers();
        let mut remaining = cell_index;
        let mut part_indexes = vec![0usize; part_numbers.len()];
        for attribute in 0..part_numbers.len() {
            part_indexes[attribute] = remaining % part_numbers[attribute];
            if attribute < part_numbers.len() - 1 {
                remaining /= part_numbers[attribute];
            }
        }
        part_indexes
    }

    pub fn set_cell_frequency(&mut self, part_indexes: &[usize], frequency: Frequency) {
        let index = self.compute_cell_index(part_indexes);
        self.cell_frequencies[index] = frequency;
    }

    pub fn get_cell_frequency(&self, part_indexes: &[usize]) -> Frequency {
        let index = self.compute_cell_index(part_indexes);
        self.cell_frequencies[index]
    }

    pub fn compute_grid_frequency(&self) -> Frequency {
        self.cell_frequencies.iter().sum()
    }

    /// `export_all_cells` (spec §4.D): non-empty cells, each tagged with its
    /// part-index tuple. A read-only reduction over the flat cell vector,
    /// so it runs over rayon's pool the way `src/clustering/elkan.rs` farms
    /// out its per-point distance pass.
    pub fn export_all_cells(&self) -> Vec<Cell> {
        self.cell_frequencies
            .par_iter()
            .enumerate()
            .filter(|&(_, &frequency)| frequency > 0)
            .map(|(index, &frequency)| Cell {
                part_indexes: self.compute_part_indexes(index),
                frequency,
            })
            .collect()
    }

    /// `export_source_cells_at(target_attr_idx)` (spec §4.D): groups cells
    /// by their source part tuple, with per-target-part frequencies and an
    /// interest score. `target_attr_idx` is an absolute attribute index
    /// (`>= source_attribute_number`).
    pub fn export_source_cells_at(&self, target_attr_idx: usize) -> Vec<SourceCell> {
        let target_part_number = self.attributes[target_attr_idx].1.part_number();
        let part_numbers = self.part_numbers();
        let source_numbers = &part_numbers[..self.source_attribute_number];
        let source_grid_size = source_numbers.iter().product::<usize>().max(1);

        let mut table: Vec<Option<Vec<Frequency>>> = vec![None; source_grid_size];
        for cell in self.export_all_cells() {
            let source_key = Self::row_major_key(&cell.part_indexes[..self.source_attribute_number], source_numbers);
            let target_part = cell.part_indexes[target_attr_idx];
            let entry = table[source_key].get_or_insert_with(|| vec![0; target_part_number]);
            entry[target_part] += cell.frequency;
        }

        let global: Vec<Frequency> = (0..target_part_number)
            .map(|t| {
                table
                    .iter()
                    .filter_map(|row| row.as_ref())
                    .map(|row| row[t])
                    .sum()
            })
            .collect();
        let global_total: Frequency = global.iter().sum();

        let mut cells: Vec<SourceCell> = table
            .into_par_iter()
            .enumerate()
            .filter_map(|(key, row)| row.map(|row| (key, row)))
            .map(|(key, row)| {
                let part_indexes = Self::row_major_unkey(key, source_numbers);
                let interest = Self::interest(&row, &global, global_total);
                SourceCell {
                    part_indexes,
                    target_part_frequencies: row,
                    interest,
                }
            })
            .collect();

        let total_interest: f64 = cells.iter().map(|c| c.interest).sum();
        if total_interest > 0.0 {
            for cell in &mut cells {
                cell.interest = 100.0 * cell.interest / total_interest;
            }
        }
        cells
    }

    /// per-source-cell interest (spec §4.D): `Σ_t p_t · log(p_t / p_t^global)`
    /// weighted by the cell's frequency.
    fn interest(row: &[Frequency], global: &[Frequency], global_total: Frequency) -> f64 {
        let cell_total: Frequency = row.iter().sum();
        if cell_total == 0 || global_total == 0 {
            return 0.0;
        }
        let cell_total = cell_total as f64;
        let global_total = global_total as f64;
        let raw: f64 = row
            .iter()
            .zip(global.iter())
            .filter(|&(&n_st, &n_t)| n_st > 0 && n_t > 0)
            .map(|(&n_st, &n_t)| {
                let p_t = n_st as f64 / cell_total;
                let p_t_global = n_t as f64 / global_total;
                p_t * (p_t / p_t_global).ln()
            })
            .sum();
        cell_total * raw
    }

    fn row_major_key(indexes: &[usize], part_numbers: &[usize]) -> usize {
        let mut key = 0usize;
        for attribute in (0..part_numbers.len()).rev() {
            if attribute < part_numbers.len() - 1 {
                key *= part_numbers[attribute];
            }
            key += indexes[attribute];
        }
        key
    }

    fn row_major_unkey(mut key: usize, part_numbers: &[usize]) -> Vec<usize> {
        let mut indexes = vec![0usize; part_numbers.len()];
        for attribute in 0..part_numbers.len() {
            indexes[attribute] = key % part_numbers[attribute];
            if attribute < part_numbers.len() - 1 {
                key /= part_numbers[attribute];
            }
        }
        indexes
    }

    /// `export_attribute_part_frequencies_at(k)` (spec §4.D): per-part
    /// frequencies for attribute `k`, summed over every other attribute.
    pub fn export_attribute_part_frequencies_at(&self, attribute: usize) -> Vec<Frequency> {
        let part_number = self.attributes[attribute].1.part_number();
        self.export_all_cells()
            .par_iter()
            .fold(
                || vec![0 as Frequency; part_number],
                |mut acc, cell| {
                    acc[cell.part_indexes[attribute]] += cell.frequency;
                    acc
                },
            )
            .reduce(
                || vec![0 as Frequency; part_number],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b.iter()) {
                        *x += y;
                    }
                    a
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::partition_kind::AttributePartition;

    fn meta(name: &str) -> AttributeMeta {
        AttributeMeta {
            attribute_name: name.to_string(),
            initial_value_number: 0,
            granularized_value_number: 0,
        }
    }

    fn two_by_three_grid() -> DataGrid {
        let mut grid = DataGrid::new();
        grid.add_attribute(
            meta("source"),
            AttributePartition::ContinuousValues { values: vec![1.0, 2.0] },
        );
        grid.add_attribute(
            meta("target"),
            AttributePartition::SymbolValues {
                values: vec!["a".into(), "b".into(), "c".into()],
            },
        );
        grid.set_source_attribute_number(1);
        grid.create_all_cells();
        grid
    }

    #[test]
    fn cell_index_round_trips_for_every_cell() {
        let grid = two_by_three_grid();
        for c in 0..grid.compute_total_grid_size() {
            let indexes = grid.compute_part_indexes(c);
            assert_eq!(grid.compute_cell_index(&indexes), c);
        }
    }

    #[test]
    fn grid_frequency_matches_sum_of_set_cells() {
        let mut grid = two_by_three_grid();
        grid.set_cell_frequency(&[0, 0], 5);
        grid.set_cell_frequency(&[0, 1], 3);
        grid.set_cell_frequency(&[1, 2], 7);
        assert_eq!(grid.compute_grid_frequency(), 15);
        assert_eq!(grid.get_cell_frequency(&[1, 2]), 7);
    }

    #[test]
    fn export_all_cells_skips_empty_cells() {
        let mut grid = two_by_three_grid();
        grid.set_cell_frequency(&[0, 0], 5);
        grid.set_cell_frequency(&[1, 2], 7);
        let cells = grid.export_all_cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells.iter().map(|c| c.frequency).sum::<Frequency>(), 12);
    }

    #[test]
    fn attribute_part_frequencies_sum_across_the_other_attribute() {
        let mut grid = two_by_three_grid();
        grid.set_cell_frequency(&[0, 0], 5);
        grid.set_cell_frequency(&[0, 1], 2);
        grid.set_cell_frequency(&[1, 1], 4);
        let source_freqs = grid.export_attribute_part_frequencies_at(0);
        assert_eq!(source_freqs, vec![7, 4]);
    }

    #[test]
    fn source_cells_carry_a_normalized_interest_summing_near_100() {
        let mut grid = two_by_three_grid();
        grid.set_cell_frequency(&[0, 0], 10);
        grid.set_cell_frequency(&[0, 1], 0);
        grid.set_cell_frequency(&[0, 2], 0);
        grid.set_cell_frequency(&[1, 0], 0);
        grid.set_cell_frequency(&[1, 1], 5);
        grid.set_cell_frequency(&[1, 2], 5);
        let cells = grid.export_source_cells_at(1);
        assert_eq!(cells.len(), 2);
        let total: f64 = cells.iter().map(|c| c.interest).sum();
        assert!((total - 100.0).abs() < 1e-6);
    }
}
