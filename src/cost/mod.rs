//! Component B: pure cost functions under the three MDL priors (spec §4.B).
//!
//! Source modeled a four-level hierarchy of partition-cost classes reached
//! through virtual dispatch (`KWUnivariatePartitionCosts` ->
//! `KWMODLDiscretizationCosts` / `KWMODLGroupingCosts`, plus a
//! `KWUnivariateNullPartitionCosts` decorator). Here that collapses to a
//! tagged variant, [`Cost`], matched statically through the [`PartitionCost`]
//! trait.

pub mod bell;
pub mod bounded;
pub mod discretization;
pub mod grouping;
pub mod histogram;

pub use bell::ln_bell;
pub use bounded::bounded_universal_code_length;
pub use discretization::DiscretizationCost;
pub use grouping::GroupingCost;
pub use histogram::HistogramCost;

use crate::frequency::FrequencyVector;
use crate::Continuous;

/// `ln(n!)`, computed as a direct sum of logs. Every quantity the cost model
/// feeds it is a small-to-moderate instance or class count, not a
/// performance-critical inner loop, so there is no need for a lookup table.
pub fn ln_factorial(n: i64) -> Continuous {
    debug_assert!(n >= 0, "ln_factorial is undefined for negative n={n}");
    (1..=n).map(|i| (i as Continuous).ln()).sum()
}

/// Clamps a cost-decomposition residual that should be non-negative up to
/// `EPSILON` (spec §4.B "Decomposition", §7 `NumericClampApplied`). Panics in
/// debug builds if the residual is below `-EPSILON`, since that signals an
/// inconsistency between the partition- and part-level formulas rather than
/// ordinary floating-point noise; release builds clamp and log at trace
/// level.
pub fn clamp_nonnegative(value: Continuous, context: &str) -> Continuous {
    debug_assert!(
        value >= -crate::EPSILON,
        "{context} decomposition residual {value} is below -EPSILON"
    );
    if value < crate::EPSILON {
        log::trace!("clamped {context} residual {value} to 0");
        0.0
    } else {
        value
    }
}

/// Shared behavior of a partition-cost prior (spec §4.B, Design Note §9 item
/// 2). `garbage_modality_number` is always 0 for discretization and
/// histogram costs; only grouping costs make use of it.
pub trait PartitionCost {
    /// `L(partition)`: full code length of a `part_number`-part partition.
    fn partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous;

    /// `L(part)`: code length of one part's data given its shape.
    fn part_cost(&self, part: &FrequencyVector) -> Continuous;

    /// Closed-form `partition_cost(n-1) - partition_cost(n)`, kept consistent
    /// with direct recomputation to within `EPSILON` (spec §4.B, §8 cost law
    /// 7).
    fn delta_partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous;

    /// Model cost of a `part_number`-part partition (construction +
    /// preparation). For the MODL priors this coincides with
    /// [`partition_cost`](Self::partition_cost); the null prior overrides it.
    fn partition_model_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        self.partition_cost(part_number, garbage_modality_number)
    }

    /// Model cost of a single part. For the MODL priors this is the
    /// uniform-draw term that ignores the part's actual class split.
    fn part_model_cost(&self, part: &FrequencyVector) -> Continuous;

    /// `ln 2 + [part_number>1]*attribute_cost`: the raw encoding cost shared
    /// by both MODL priors, common to every non-null cost model.
    fn partition_construction_cost(&self, part_number: usize) -> Continuous;

    /// Construction cost of a single part. Always 0 for the priors this
    /// crate implements: a part carries no per-part construction choice.
    fn part_construction_cost(&self, _part: &FrequencyVector) -> Continuous {
        0.0
    }

    /// `model_cost - construction_cost`, clamped to `[0, inf)` (spec §4.B
    /// "Decomposition").
    fn partition_preparation_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        let partition_part_number = if garbage_modality_number > 0 {
            part_number - 1
        } else {
            part_number
        };
        let residual = self.partition_model_cost(partition_part_number, garbage_modality_number)
            - self.partition_construction_cost(partition_part_number);
        clamp_nonnegative(residual, "partition preparation cost")
    }

    fn part_preparation_cost(&self, part: &FrequencyVector) -> Continuous {
        clamp_nonnegative(self.part_cost(part) - self.part_model_cost(part), "part preparation cost")
    }

    /// `total - model_cost`, clamped to `[0, inf)`.
    fn partition_data_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        let partition_part_number = if garbage_modality_number > 0 {
            part_number - 1
        } else {
            part_number
        };
        let residual = self.partition_cost(partition_part_number, garbage_modality_number)
            - self.partition_model_cost(partition_part_number, garbage_modality_number);
        clamp_nonnegative(residual, "partition data cost")
    }

    fn part_data_cost(&self, part: &FrequencyVector) -> Continuous {
        clamp_nonnegative(self.part_cost(part) - self.part_model_cost(part), "part data cost")
    }
}

/// Tagged dispatch over the cost priors this crate supports (Design Note §9
/// item 2). `Null` wraps another cost, zeroing its partition cost while
/// keeping its part cost -- the same role `KWUnivariateNullPartitionCosts`
/// plays over its wrapped cost in the source.
pub enum Cost {
    Discretization(DiscretizationCost),
    Grouping(GroupingCost),
    Histogram(HistogramCost),
    Null(Box<Cost>),
}

impl PartitionCost for Cost {
    fn partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        match self {
            Cost::Discretization(c) => c.partition_cost(part_number, garbage_modality_number),
            Cost::Grouping(c) => c.partition_cost(part_number, garbage_modality_number),
            Cost::Histogram(c) => c.partition_cost(part_number, garbage_modality_number),
            Cost::Null(_) => 0.0,
        }
    }

    fn part_cost(&self, part: &FrequencyVector) -> Continuous {
        match self {
            Cost::Discretization(c) => c.part_cost(part),
            Cost::Grouping(c) => c.part_cost(part),
            Cost::Histogram(c) => c.part_cost(part),
            Cost::Null(inner) => inner.part_cost(part),
        }
    }

    fn delta_partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        match self {
            Cost::Discretization(c) => c.delta_partition_cost(part_number, garbage_modality_number),
            Cost::Grouping(c) => c.delta_partition_cost(part_number, garbage_modality_number),
            Cost::Histogram(c) => c.delta_partition_cost(part_number, garbage_modality_number),
            Cost::Null(_) => 0.0,
        }
    }

    fn partition_model_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        match self {
            Cost::Null(_) => 0.0,
            _ => self.partition_cost(part_number, garbage_modality_number),
        }
    }

    fn part_model_cost(&self, part: &FrequencyVector) -> Continuous {
        match self {
            Cost::Discretization(c) => c.part_model_cost(part),
            Cost::Grouping(c) => c.part_model_cost(part),
            Cost::Histogram(c) => c.part_model_cost(part),
            Cost::Null(inner) => inner.part_model_cost(part),
        }
    }

    fn partition_construction_cost(&self, part_number: usize) -> Continuous {
        match self {
            Cost::Discretization(c) => c.partition_construction_cost(part_number),
            Cost::Grouping(c) => c.partition_construction_cost(part_number),
            Cost::Histogram(c) => c.partition_construction_cost(part_number),
            Cost::Null(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_factorial_matches_known_values() {
        assert_eq!(ln_factorial(0), 0.0);
        assert!((ln_factorial(5).exp() - 120.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_nonnegative_zeroes_small_negative_residuals() {
        assert_eq!(clamp_nonnegative(-1e-9, "test"), 0.0);
        assert_eq!(clamp_nonnegative(3.0, "test"), 3.0);
    }
}
