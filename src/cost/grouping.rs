//! MODL grouping cost, with optional garbage group (spec §4.B "MODL grouping
//! cost with garbage"), grounded on `KWMODLGroupingCosts` in
//! `Learning/KWDataPreparation/KWUnivariatePartitionCost.cpp`.

use super::{bounded::bounded_universal_code_length, ln_bell, ln_factorial, PartitionCost};
use crate::error::{PartitionError, PartitionResult};
use crate::frequency::FrequencyVector;
use crate::Continuous;

/// Cost of a partition of a categorical attribute into value groups, with an
/// optional catch-all "garbage" group (spec §4.C.3 item 3).
#[derive(Debug, Clone)]
pub struct GroupingCost {
    value_number: usize,
    class_value_number: usize,
    attribute_cost: Continuous,
    granularity: usize,
    total_instance_number: usize,
    min_value_number_for_garbage: usize,
}

impl GroupingCost {
    pub fn new(
        value_number: usize,
        class_value_number: usize,
        attribute_cost: Continuous,
        granularity: usize,
        total_instance_number: usize,
    ) -> PartitionResult<Self> {
        Self::with_garbage_threshold(
            value_number,
            class_value_number,
            attribute_cost,
            granularity,
            total_instance_number,
            crate::MIN_VALUE_NUMBER_FOR_GARBAGE,
        )
    }

    pub fn with_garbage_threshold(
        value_number: usize,
        class_value_number: usize,
        attribute_cost: Continuous,
        granularity: usize,
        total_instance_number: usize,
        min_value_number_for_garbage: usize,
    ) -> PartitionResult<Self> {
        if class_value_number <= 1 {
            return Err(PartitionError::Configuration(format!(
                "class_value_number must be > 1, got {class_value_number}"
            )));
        }
        if total_instance_number <= 1 && granularity != 0 {
            return Err(PartitionError::Configuration(
                "total_instance_number must be > 1 when granularity is used".into(),
            ));
        }
        Ok(Self {
            value_number,
            class_value_number,
            attribute_cost,
            granularity,
            total_instance_number,
            min_value_number_for_garbage,
        })
    }

    fn granularity_max(&self) -> usize {
        (self.total_instance_number as Continuous).log2().ceil() as usize
    }

    fn informative_counts(&self, part_number: usize, garbage_modality_number: usize) -> (usize, usize) {
        let informative_value_number = self.value_number - garbage_modality_number;
        let informative_part_number = if garbage_modality_number > 0 {
            part_number - 1
        } else {
            part_number
        };
        (informative_value_number, informative_part_number)
    }
}

impl PartitionCost for GroupingCost {
    fn partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        let (informative_value_number, informative_part_number) =
            self.informative_counts(part_number, garbage_modality_number);
        debug_assert!(informative_part_number >= 1);
        debug_assert!(informative_part_number <= informative_value_number);

        let mut cost = 2.0_f64.ln();
        if informative_part_number > 1 && informative_value_number > 1 {
            cost += self.attribute_cost;

            if self.granularity > 0 {
                cost += bounded_universal_code_length(self.granularity as u64, self.granularity_max() as u64);
            }

            if self.value_number > self.min_value_number_for_garbage {
                cost += 2.0_f64.ln();
            }

            if garbage_modality_number == 0 {
                cost += bounded_universal_code_length(
                    (informative_part_number - 1) as u64,
                    (informative_value_number - 1) as u64,
                );
                cost += ln_bell(informative_value_number as u32, informative_part_number as u32);
            } else {
                cost += bounded_universal_code_length(
                    (informative_value_number - 1) as u64,
                    (self.value_number - 2) as u64,
                );
                cost += informative_value_number as Continuous * (self.value_number as Continuous).ln();
                cost -= ln_factorial(informative_value_number as i64);
                cost += bounded_universal_code_length(
                    (informative_part_number - 1) as u64,
                    (informative_value_number - 1) as u64,
                );
                cost += ln_bell(informative_value_number as u32, informative_part_number as u32);
            }
        }
        cost
    }

    fn part_cost(&self, part: &FrequencyVector) -> Continuous {
        let counts = part.counts().expect("grouping costs apply to dense vectors only");
        let total: i64 = counts.iter().map(|&c| c as i64).sum();
        let class_value_number = self.class_value_number as i64;

        let mut cost = -counts.iter().map(|&c| ln_factorial(c as i64)).sum::<Continuous>();
        cost += ln_factorial(total + class_value_number - 1);
        cost -= ln_factorial(class_value_number - 1);
        cost
    }

    fn delta_partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        let (informative_value_number, informative_part_number) =
            self.informative_counts(part_number, garbage_modality_number);

        if informative_part_number > 2 {
            let mut delta = bounded_universal_code_length(
                (informative_part_number - 2) as u64,
                (informative_value_number - 1) as u64,
            ) - bounded_universal_code_length(
                (informative_part_number - 1) as u64,
                (informative_value_number - 1) as u64,
            );
            delta += ln_bell(informative_value_number as u32, (informative_part_number - 1) as u32)
                - ln_bell(informative_value_number as u32, informative_part_number as u32);
            delta
        } else {
            self.partition_cost(part_number - 1, garbage_modality_number)
                - self.partition_cost(part_number, garbage_modality_number)
        }
    }

    fn part_model_cost(&self, part: &FrequencyVector) -> Continuous {
        let total = part.total() as i64;
        let class_value_number = self.class_value_number as i64;
        ln_factorial(total + class_value_number - 1) - ln_factorial(class_value_number - 1) - ln_factorial(total)
    }

    fn partition_construction_cost(&self, part_number: usize) -> Continuous {
        if part_number > 1 {
            2.0_f64.ln() + self.attribute_cost
        } else {
            2.0_f64.ln()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(value_number: usize) -> GroupingCost {
        GroupingCost::new(value_number, 2, 0.0, 0, 100).unwrap()
    }

    #[test]
    fn single_group_partition_cost_is_ln2() {
        let c = cost(5);
        assert!((c.partition_cost(1, 0) - 2.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn delta_matches_direct_recomputation_without_garbage() {
        let c = cost(10);
        for k in 2..=8 {
            let delta = c.delta_partition_cost(k, 0);
            let direct = c.partition_cost(k - 1, 0) - c.partition_cost(k, 0);
            assert!((delta - direct).abs() < 1e-5, "k={k} delta={delta} direct={direct}");
        }
    }

    #[test]
    fn garbage_hierarchy_prior_only_applies_above_threshold() {
        let small = GroupingCost::new(5, 2, 0.0, 0, 100).unwrap();
        let large = GroupingCost::new(20, 2, 0.0, 0, 100).unwrap();
        // With 5 <= MIN_VALUE_NUMBER_FOR_GARBAGE (7), no garbage-hierarchy ln(2) term is added.
        let small_cost = small.partition_cost(2, 0);
        let large_cost = large.partition_cost(2, 0);
        assert!(small_cost.is_finite() && large_cost.is_finite());
    }

    #[test]
    fn configuration_rejects_degenerate_class_count() {
        assert!(GroupingCost::new(10, 1, 0.0, 0, 100).is_err());
    }
}
