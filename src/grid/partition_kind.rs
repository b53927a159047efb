//! `AttributePartition` tagged variant (spec §3 "AttributePartition inside a
//! DataGrid"), grounded on the `KWDGSAttributePartition` class hierarchy in
//! `KWDataGridStats.{h,cpp}` (`KWDGSAttributeDiscretization` /
//! `KWDGSAttributeGrouping` / `KWDGSAttributeContinuousValues` /
//! `KWDGSAttributeSymbolValues` / `KWDGSAttributeVirtualValues`), collapsed
//! to an enum the way `cost::Cost` replaces the parallel
//! `KWUnivariatePartitionCosts` hierarchy.

use crate::Continuous;

/// the sentinel catch-all symbol (spec §3: "one symbol must equal the
/// special sentinel `*`").
pub const STAR_VALUE: &str = "*";

/// An attribute's partition into parts, as stored inside a [`super::DataGrid`].
#[derive(Debug, Clone)]
pub enum AttributePartition {
    /// `K-1` interval bounds, sorted non-strictly; interval `i` is
    /// `]bounds[i-1], bounds[i]]` with `bounds[-1] = -inf`, `bounds[K-1] =
    /// +inf`.
    Discretization { interval_bounds: Vec<Continuous> },
    /// kept symbols plus, for each group, the index of its first symbol in
    /// `values` (strictly increasing). One symbol must be [`STAR_VALUE`].
    Grouping {
        values: Vec<String>,
        group_first_value_index: Vec<usize>,
        garbage_group_index: Option<usize>,
        catch_all_value_number: usize,
    },
    /// one distinct numeric value per part.
    ContinuousValues { values: Vec<Continuous> },
    /// one distinct symbol per part, optionally including [`STAR_VALUE`].
    SymbolValues { values: Vec<String> },
    /// type-less: only frequencies matter.
    VirtualValues { part_number: usize },
}

/// Common metadata every partition variant carries (spec §3: "Each partition
/// has: attribute_name, initial_value_number, granularized_value_number,
/// part_number").
#[derive(Debug, Clone)]
pub struct AttributeMeta {
    pub attribute_name: String,
    pub initial_value_number: usize,
    pub granularized_value_number: usize,
}

impl AttributePartition {
    pub fn part_number(&self) -> usize {
        match self {
            AttributePartition::Discretization { interval_bounds } => interval_bounds.len() + 1,
            AttributePartition::Grouping { group_first_value_index, .. } => group_first_value_index.len(),
            AttributePartition::ContinuousValues { values } => values.len(),
            AttributePartition::SymbolValues { values } => values.len(),
            AttributePartition::VirtualValues { part_number } => *part_number,
        }
    }

    pub fn are_parts_singletons(&self) -> bool {
        matches!(
            self,
            AttributePartition::ContinuousValues { .. } | AttributePartition::SymbolValues { .. } | AttributePartition::VirtualValues { .. }
        )
    }

    fn group_last_value_index(group_first_value_index: &[usize], value_count: usize, group: usize) -> usize {
        if group + 1 < group_first_value_index.len() {
            group_first_value_index[group + 1] - 1
        } else {
            value_count - 1
        }
    }

    /// `ComputePartIndexFor` (spec §3): returns the part index holding
    /// `value`, or `None` if the attribute has no default group and no part
    /// matches.
    pub fn compute_continuous_part_index(&self, value: Continuous) -> Option<usize> {
        match self {
            AttributePartition::Discretization { interval_bounds } => {
                Some(interval_bounds.iter().position(|&b| value <= b).unwrap_or(interval_bounds.len()))
            }
            AttributePartition::ContinuousValues { values } => values.iter().position(|&v| v == value),
            _ => None,
        }
    }

    /// `ComputeSymbolPartIndex` (spec §3): falls back to the group carrying
    /// [`STAR_VALUE`] for an unseen symbol, the way `KWDGSAttributeGrouping`
    /// does.
    pub fn compute_symbol_part_index(&self, value: &str) -> Option<usize> {
        match self {
            AttributePartition::Grouping {
                values,
                group_first_value_index,
                ..
            } => {
                if let Some(pos) = values.iter().position(|v| v == value) {
                    let group = group_first_value_index.partition_point(|&first| first <= pos) - 1;
                    return Some(group);
                }
                values.iter().position(|v| v == STAR_VALUE).map(|pos| {
                    group_first_value_index.partition_point(|&first| first <= pos) - 1
                })
            }
            AttributePartition::SymbolValues { values } => values.iter().position(|v| v == value).or_else(|| values.iter().position(|v| v == STAR_VALUE)),
            _ => None,
        }
    }

    pub fn group_value_range(&self, group: usize) -> Option<(usize, usize)> {
        match self {
            AttributePartition::Grouping {
                values,
                group_first_value_index,
                ..
            } => {
                let first = *group_first_value_index.get(group)?;
                let last = Self::group_last_value_index(group_first_value_index, values.len(), group);
                Some((first, last))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discretization_part_number_is_bound_count_plus_one() {
        let p = AttributePartition::Discretization {
            interval_bounds: vec![1.0, 5.0],
        };
        assert_eq!(p.part_number(), 3);
    }

    #[test]
    fn discretization_index_lookup_matches_interval_semantics() {
        let p = AttributePartition::Discretization {
            interval_bounds: vec![1.0, 5.0],
        };
        assert_eq!(p.compute_continuous_part_index(0.5), Some(0));
        assert_eq!(p.compute_continuous_part_index(1.0), Some(0));
        assert_eq!(p.compute_continuous_part_index(3.0), Some(1));
        assert_eq!(p.compute_continuous_part_index(10.0), Some(2));
    }

    #[test]
    fn grouping_falls_back_to_the_star_value_group() {
        let p = AttributePartition::Grouping {
            values: vec!["red".into(), "blue".into(), STAR_VALUE.into(), "green".into()],
            group_first_value_index: vec![0, 2],
            garbage_group_index: None,
            catch_all_value_number: 0,
        };
        assert_eq!(p.compute_symbol_part_index("red"), Some(0));
        assert_eq!(p.compute_symbol_part_index("green"), Some(1));
        assert_eq!(p.compute_symbol_part_index("unseen"), Some(1));
    }
}
