//! Component E: the Shapley valuator (spec §4.E), grounded on
//! `KIShapleyTable.{h,cpp}`'s `InitializeFromDataGridStats` /
//! `ComputeMeanAbsoluteShapleyValues`.
//!
//! `KIShapleyTable` stores its `(source, target)` table as one flat
//! `ContinuousVector` indexed `source + target * source_size`; that collapses
//! here to a `Vec<Continuous>` behind the same row-major indexing, with
//! `shapley`/`normalized_shapley` as the two accessor flavors `KIShapleyTable`
//! exposes through its natural-vs-normalized JSON toggle.

use crate::grid::{AttributeMeta, AttributePartition, DataGrid};
use crate::{Continuous, Frequency};

/// `(source_part_count x target_value_count)` table of Shapley contributions
/// (spec §4.E "Public output").
#[derive(Debug, Clone)]
pub struct ShapleyTable {
    values: Vec<Continuous>,
    source_size: usize,
    target_size: usize,
}

impl ShapleyTable {
    fn zeroed(source_size: usize, target_size: usize) -> Self {
        Self {
            values: vec![0.0; source_size * target_size],
            source_size,
            target_size,
        }
    }

    fn set(&mut self, source: usize, target: usize, value: Continuous) {
        self.values[source + target * self.source_size] = value;
    }

    pub fn source_size(&self) -> usize {
        self.source_size
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// raw Shapley contribution of `source` to target value `target`.
    pub fn shapley(&self, source: usize, target: usize) -> Continuous {
        self.values[source + target * self.source_size]
    }

    /// `shapley(s, t)` rescaled so `Σ_s |value|` sums to 1 for the given
    /// target column (the natural/normalized distinction `KIShapleyTable`'s
    /// JSON writer exposes).
    pub fn normalized_shapley(&self, source: usize, target: usize) -> Continuous {
        let column_norm: Continuous = (0..self.source_size).map(|s| self.shapley(s, target).abs()).sum();
        if column_norm <= crate::EPSILON {
            0.0
        } else {
            self.shapley(source, target) / column_norm
        }
    }
}

pub struct ShapleyValuator;

impl ShapleyValuator {
    /// **Classification** (spec §4.E): `attribute_grid` is a 1- or
    /// 2-source-attribute DataGrid whose final attribute is the categorical
    /// target; `target_grid` is a separate single-attribute DataGrid
    /// enumerating the target values in the desired output column order
    /// (the `targetDataGridStats` argument of
    /// `KIShapleyTable::InitializeFromDataGridStats`).
    pub fn classification(attribute_grid: &DataGrid, target_grid: &DataGrid, attribute_weight: Continuous) -> ShapleyTable {
        let grid = to_univariate_source(attribute_grid);
        let source_frequencies = grid.export_attribute_part_frequencies_at(0);
        let target_frequencies = grid.export_attribute_part_frequencies_at(1);
        let cell = Self::cell_matrix(&grid, source_frequencies.len(), target_frequencies.len());

        let mapping = target_order_mapping(grid.attribute_at(1), target_grid.attribute_at(0));
        let ordered_target_frequencies: Vec<Frequency> = mapping.iter().map(|&j| target_frequencies[j]).collect();
        let ordered_cell: Vec<Vec<Continuous>> = cell
            .iter()
            .map(|row| mapping.iter().map(|&j| row[j]).collect())
            .collect();

        Self::classification_core(&to_continuous(&source_frequencies), &to_continuous(&ordered_target_frequencies), &ordered_cell, attribute_weight)
    }

    /// **Regression** (spec §4.E): `attribute_grid`'s final attribute is a
    /// discretization of the continuous target; `target_grid` enumerates the
    /// desired output interval order the same way `classification`'s does
    /// for categorical values. Each interval is split into a one-rank
    /// representative (weight 1, distributed proportionally to `n_{s,t}`
    /// across source parts by within-interval exchangeability) and the rest
    /// (weight `n_t − 1`), giving a synthetic `2·I`-valued target; the
    /// classification formula runs over that, and only the representative
    /// column per interval is reported.
    pub fn regression(attribute_grid: &DataGrid, target_grid: &DataGrid, attribute_weight: Continuous) -> ShapleyTable {
        let grid = to_univariate_source(attribute_grid);
        let source_frequencies = to_continuous(&grid.export_attribute_part_frequencies_at(0));
        let target_frequencies_raw = grid.export_attribute_part_frequencies_at(1);
        let interval_number = target_frequencies_raw.len();
        let cell_raw = Self::cell_matrix(&grid, source_frequencies.len(), interval_number);

        let mapping = target_order_mapping(grid.attribute_at(1), target_grid.attribute_at(0));
        let target_frequencies: Vec<Frequency> = mapping.iter().map(|&j| target_frequencies_raw[j]).collect();
        let cell: Vec<Vec<Continuous>> = cell_raw.iter().map(|row| mapping.iter().map(|&j| row[j]).collect()).collect();

        let mut synthetic_target = vec![0.0; 2 * interval_number];
        let mut synthetic_cell = vec![vec![0.0; 2 * interval_number]; source_frequencies.len()];
        for t in 0..interval_number {
            let n_t = target_frequencies[t] as Continuous;
            synthetic_target[2 * t] = if n_t > 0.0 { 1.0 } else { 0.0 };
            synthetic_target[2 * t + 1] = (n_t - 1.0).max(0.0);
            for s in 0..source_frequencies.len() {
                let n_st = cell[s][t];
                let representative_share = if n_t > 0.0 { n_st / n_t } else { 0.0 };
                synthetic_cell[s][2 * t] = representative_share;
                synthetic_cell[s][2 * t + 1] = n_st - representative_share;
            }
        }

        let synthetic = Self::classification_core(&source_frequencies, &synthetic_target, &synthetic_cell, attribute_weight);
        let mut table = ShapleyTable::zeroed(source_frequencies.len(), interval_number);
        for t in 0..interval_number {
            for s in 0..source_frequencies.len() {
                table.set(s, t, synthetic.shapley(s, 2 * t));
            }
        }
        table
    }

    /// `ComputeMeanAbsoluteShapleyValues` (spec §4.E optional aggregate).
    pub fn mean_absolute_shapley_values(table: &ShapleyTable, source_frequencies: &[Frequency], target_frequencies: &[Frequency]) -> Continuous {
        let n: Continuous = source_frequencies.iter().map(|&f| f as Continuous).sum();
        if n <= 0.0 {
            return 0.0;
        }
        (0..table.target_size())
            .map(|t| {
                let weight_t = target_frequencies[t] as Continuous / n;
                let inner: Continuous = (0..table.source_size())
                    .map(|s| (source_frequencies[s] as Continuous / n) * table.shapley(s, t).abs())
                    .sum();
                weight_t * inner
            })
            .sum()
    }

    fn cell_matrix(grid: &DataGrid, source_part_number: usize, target_part_number: usize) -> Vec<Vec<Continuous>> {
        let mut cell = vec![vec![0.0; target_part_number]; source_part_number];
        for c in grid.export_all_cells() {
            cell[c.part_indexes[0]][c.part_indexes[1]] += c.frequency as Continuous;
        }
        cell
    }

    fn classification_core(source_frequencies: &[Continuous], target_frequencies: &[Continuous], cell: &[Vec<Continuous>], attribute_weight: Continuous) -> ShapleyTable {
        let source_part_number = source_frequencies.len();
        let target_part_number = target_frequencies.len();
        let n: Continuous = source_frequencies.iter().sum();
        let mut table = ShapleyTable::zeroed(source_part_number, target_part_number);
        if n <= 0.0 {
            return table;
        }

        let epsilon_one = 1.0 / (n + 1.0);
        let epsilon_all = target_part_number as Continuous * epsilon_one - epsilon_one;

        for t in 0..target_part_number {
            let n_t = target_frequencies[t];
            let mut term = vec![0.0; source_part_number];
            for s in 0..source_part_number {
                let n_s = source_frequencies[s];
                let n_s_jt = cell[s][t];
                let p_one = (n_s_jt + epsilon_one) / (n_t + source_part_number as Continuous * epsilon_one);
                let p_all = (n_s - n_s_jt + epsilon_all) / (n - n_t + source_part_number as Continuous * epsilon_all);
                term[s] = (p_one / p_all).ln();
            }
            let e_t: Continuous = (0..source_part_number).map(|s| (source_frequencies[s] / n) * term[s]).sum();
            for s in 0..source_part_number {
                table.set(s, t, attribute_weight * (term[s] - e_t));
            }
        }
        table
    }
}

/// `KIShapleyTable::InitializeFromDataGridStats`'s `GetAttributeNumber()==3`
/// branch: a 2-source-attribute grid is projected into a single virtual
/// cartesian-product source attribute before anything else runs, so the rest
/// of the valuator only ever sees a univariate `(source, target)` grid. A
/// 1-source-attribute grid passes through unchanged.
fn to_univariate_source(grid: &DataGrid) -> DataGrid {
    debug_assert!(
        grid.attribute_number() == 2 || grid.attribute_number() == 3,
        "Shapley expects a 1- or 2-source-attribute DataGrid (attribute_number 2 or 3), got {}",
        grid.attribute_number()
    );
    if grid.attribute_number() >= 3 {
        build_univariate_data_grid_stats(grid)
    } else {
        grid.clone()
    }
}

/// `BuildUnivariateDataGridStats` (spec §4.E classification step 1):
/// cartesian-products the first two attributes of `grid` into one
/// `VirtualValues` source attribute of `part_number = S0 * S1`, carrying the
/// trailing (target) attribute through unchanged.
fn build_univariate_data_grid_stats(grid: &DataGrid) -> DataGrid {
    let source0_parts = grid.attribute_at(0).part_number();
    let source1_parts = grid.attribute_at(1).part_number();
    let target_meta = grid.attribute_meta_at(2).clone();
    let target_partition = grid.attribute_at(2).clone();

    let mut projected = DataGrid::new();
    projected.add_attribute(
        AttributeMeta {
            attribute_name: format!("{}x{}", grid.attribute_meta_at(0).attribute_name, grid.attribute_meta_at(1).attribute_name),
            initial_value_number: source0_parts * source1_parts,
            granularized_value_number: source0_parts * source1_parts,
        },
        AttributePartition::VirtualValues {
            part_number: source0_parts * source1_parts,
        },
    );
    projected.add_attribute(target_meta, target_partition);
    projected.set_source_attribute_number(1);
    projected.create_all_cells();

    for cell in grid.export_all_cells() {
        let combined_source = cell.part_indexes[0] + cell.part_indexes[1] * source0_parts;
        let target_part = cell.part_indexes[2];
        projected.set_cell_frequency(&[combined_source, target_part], cell.frequency);
    }
    projected
}

/// For each part of `desired` (in its own order), finds the matching part of
/// `source` by the values the two partitions carry. Falls back to identity
/// ordering when the partitions don't carry comparable values (e.g. either
/// side is `VirtualValues`) -- the desired order is then assumed to already
/// match the source's.
fn target_order_mapping(source: &AttributePartition, desired: &AttributePartition) -> Vec<usize> {
    let desired_count = desired.part_number();
    match (source, desired) {
        (AttributePartition::SymbolValues { values: sv }, AttributePartition::SymbolValues { values: dv }) => {
            dv.iter().map(|v| sv.iter().position(|x| x == v).unwrap_or(0)).collect()
        }
        (AttributePartition::ContinuousValues { values: sv }, AttributePartition::ContinuousValues { values: dv }) => {
            dv.iter().map(|v| sv.iter().position(|x| x == v).unwrap_or(0)).collect()
        }
        (AttributePartition::Discretization { interval_bounds: sb }, AttributePartition::Discretization { interval_bounds: db }) => (0..desired_count)
            .map(|d| {
                let bound = db.get(d).copied();
                sb.iter().position(|&b| Some(b) == bound).unwrap_or(d.min(sb.len()))
            })
            .collect(),
        _ => (0..desired_count).collect(),
    }
}

fn to_continuous(values: &[Frequency]) -> Vec<Continuous> {
    values.iter().map(|&v| v as Continuous).collect()
}
