//! MODL discretization cost (spec §4.B "MODL discretization cost"), grounded
//! on `KWMODLDiscretizationCosts` in
//! `Learning/KWDataPreparation/KWUnivariatePartitionCost.cpp`.

use super::{bounded::bounded_universal_code_length, clamp_nonnegative, ln_factorial, PartitionCost};
use crate::error::{PartitionError, PartitionResult};
use crate::frequency::FrequencyVector;
use crate::Continuous;

/// Cost of a partition of a numeric attribute into intervals.
#[derive(Debug, Clone)]
pub struct DiscretizationCost {
    value_number: usize,
    class_value_number: usize,
    attribute_cost: Continuous,
    granularity: usize,
    total_instance_number: usize,
}

impl DiscretizationCost {
    pub fn new(
        value_number: usize,
        class_value_number: usize,
        attribute_cost: Continuous,
        granularity: usize,
        total_instance_number: usize,
    ) -> PartitionResult<Self> {
        if class_value_number <= 1 {
            return Err(PartitionError::Configuration(format!(
                "class_value_number must be > 1, got {class_value_number}"
            )));
        }
        if total_instance_number == 0 {
            return Err(PartitionError::Configuration(
                "total_instance_number must be > 0".into(),
            ));
        }
        Ok(Self {
            value_number,
            class_value_number,
            attribute_cost,
            granularity,
            total_instance_number,
        })
    }

    fn granularity_max(&self) -> usize {
        (self.total_instance_number as Continuous).log2().ceil() as usize
    }
}

impl PartitionCost for DiscretizationCost {
    fn partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        debug_assert_eq!(garbage_modality_number, 0, "discretization never carries a garbage group");
        debug_assert!(part_number >= 1 && part_number <= self.value_number);

        let mut cost = 2.0_f64.ln();
        if part_number > 1 && self.value_number > 1 {
            cost += self.attribute_cost;
            cost += bounded_universal_code_length(self.granularity as u64, self.granularity_max() as u64);
            cost += bounded_universal_code_length((part_number - 1) as u64, (self.value_number - 1) as u64);
            cost += (part_number - 1) as Continuous * ((self.value_number - 1) as Continuous).ln();
            cost -= ln_factorial((part_number - 1) as i64);
        }
        cost
    }

    fn part_cost(&self, part: &FrequencyVector) -> Continuous {
        let counts = part.counts().expect("discretization costs apply to dense vectors only");
        let total: i64 = counts.iter().map(|&c| c as i64).sum();
        let class_value_number = self.class_value_number as i64;

        let mut cost = -counts.iter().map(|&c| ln_factorial(c as i64)).sum::<Continuous>();
        cost += ln_factorial(total + class_value_number - 1);
        cost -= ln_factorial(class_value_number - 1);
        cost
    }

    fn delta_partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        debug_assert_eq!(garbage_modality_number, 0);
        debug_assert!(part_number > 1 && part_number <= self.value_number);

        if part_number > 2 {
            let mut delta = bounded_universal_code_length((part_number - 2) as u64, (self.value_number - 1) as u64)
                - bounded_universal_code_length((part_number - 1) as u64, (self.value_number - 1) as u64);
            delta += ((part_number - 1) as Continuous).ln() - ((self.value_number - 1) as Continuous).ln();
            delta
        } else {
            self.partition_cost(part_number - 1, 0) - self.partition_cost(part_number, 0)
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
    use crate::frequency::FrequencyVector;

    fn cost(value_number: usize) -> DiscretizationCost {
        DiscretizationCost::new(value_number, 2, 0.0, 1, 100).unwrap()
    }

    #[test]
    fn single_interval_partition_cost_is_ln2() {
        let c = cost(20);
        assert!((c.partition_cost(1, 0) - 2.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn delta_matches_direct_recomputation() {
        let c = cost(20);
        for k in 2..=10 {
            let delta = c.delta_partition_cost(k, 0);
            let direct = c.partition_cost(k - 1, 0) - c.partition_cost(k, 0);
            assert!((delta - direct).abs() < 1e-6, "k={k} delta={delta} direct={direct}");
        }
    }

    #[test]
    fn part_cost_decomposes_into_model_plus_data_nonnegative() {
        let c = cost(20);
        let part = FrequencyVector::dense(vec![7, 3], 1);
        let model = c.part_model_cost(&part);
        let data = clamp_nonnegative(c.part_cost(&part) - model, "test");
        assert!((model + data - c.part_cost(&part)).abs() < 1e-9);
        assert!(data >= 0.0);
    }

    #[test]
    fn configuration_rejects_degenerate_class_count() {
        assert!(DiscretizationCost::new(10, 1, 0.0, 1, 100).is_err());
        assert!(DiscretizationCost::new(10, 2, 0.0, 1, 0).is_err());
    }
}
