//! G-Enum histogram cost (spec §4.B "Histogram (G-Enum / G-Enum-fp) cost",
//! §4.C.6). The home cost formula for this prior sits in modules the
//! retrieval pack never carried past their spec/parameter surface
//! (`MHGenumHistogramSpec`, `MHHistogramSpec` only expose configuration, not
//! `ComputePartitionCost`); see DESIGN.md "Open Question decisions" for how
//! the partition-level term below is grounded by analogy to
//! [`DiscretizationCost`](super::discretization::DiscretizationCost) against
//! the elementary-bin grid instead of the distinct-value count, and the
//! part-level term models each point's elementary-bin placement as uniform
//! within its interval.

use super::{bounded::bounded_universal_code_length, ln_factorial, PartitionCost};
use crate::error::{PartitionError, PartitionResult};
use crate::frequency::FrequencyVector;
use crate::Continuous;

/// Cost of a partition of a continuous attribute into an ε-bin histogram.
#[derive(Debug, Clone)]
pub struct HistogramCost {
    grid_size: u64,
    attribute_cost: Continuous,
    granularity: usize,
    total_instance_number: usize,
}

impl HistogramCost {
    pub fn new(
        grid_size: u64,
        attribute_cost: Continuous,
        granularity: usize,
        total_instance_number: usize,
    ) -> PartitionResult<Self> {
        if grid_size == 0 {
            return Err(PartitionError::Configuration("grid_size must be > 0".into()));
        }
        if total_instance_number == 0 {
            return Err(PartitionError::Configuration(
                "total_instance_number must be > 0".into(),
            ));
        }
        Ok(Self {
            grid_size,
            attribute_cost,
            granularity,
            total_instance_number,
        })
    }

    fn granularity_max(&self) -> usize {
        (self.total_instance_number as Continuous).log2().ceil() as usize
    }
}

impl PartitionCost for HistogramCost {
    fn partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        debug_assert_eq!(garbage_modality_number, 0, "histograms never carry a garbage group");
        debug_assert!(part_number as u64 >= 1 && part_number as u64 <= self.grid_size);

        let mut cost = 2.0_f64.ln();
        if part_number > 1 {
            cost += self.attribute_cost;
            cost += bounded_universal_code_length(self.granularity as u64, self.granularity_max() as u64);
            cost += bounded_universal_code_length((part_number - 1) as u64, self.grid_size - 1);
            cost += (part_number - 1) as Continuous * ((self.grid_size - 1) as Continuous).ln();
            cost -= ln_factorial((part_number - 1) as i64);
        }
        cost
    }

    fn part_cost(&self, part: &FrequencyVector) -> Continuous {
        let (frequency, length_in_bins) = match part {
            FrequencyVector::Histogram {
                frequency,
                length_in_bins,
                ..
            } => (*frequency as Continuous, *length_in_bins),
            FrequencyVector::Dense { .. } => panic!("histogram costs apply to histogram vectors only"),
        };
        debug_assert!(length_in_bins >= 1.0, "an interval spans at least one elementary bin");
        frequency * length_in_bins.ln() - ln_factorial(frequency as i64)
    }

    fn delta_partition_cost(&self, part_number: usize, garbage_modality_number: usize) -> Continuous {
        debug_assert_eq!(garbage_modality_number, 0);
        debug_assert!(part_number > 1 && part_number as u64 <= self.grid_size);

        if part_number > 2 {
            let mut delta = bounded_universal_code_length((part_number - 2) as u64, self.grid_size - 1)
                - bounded_universal_code_length((part_number - 1) as u64, self.grid_size - 1);
            delta += ((part_number - 1) as Continuous).ln() - ((self.grid_size - 1) as Continuous).ln();
            delta
        } else {
            self.partition_cost(part_number - 1, 0) - self.partition_cost(part_number, 0)
        }
    }

    fn part_model_cost(&self, _part: &FrequencyVector) -> Continuous {
        // Placement within an interval's elementary bins is pure data cost; no
        // uniform-shape baseline is modeled at the part level for histograms.
        0.0
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

    fn cost() -> HistogramCost {
        HistogramCost::new(1_000_000_000, 0.0, 1, 1000).unwrap()
    }

    #[test]
    fn single_bin_partition_cost_is_ln2() {
        assert!((cost().partition_cost(1, 0) - 2.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn delta_matches_direct_recomputation() {
        let c = cost();
        for k in 2..=10 {
            let delta = c.delta_partition_cost(k, 0);
            let direct = c.partition_cost(k - 1, 0) - c.partition_cost(k, 0);
            assert!((delta - direct).abs() < 1e-6, "k={k} delta={delta} direct={direct}");
        }
    }

    #[test]
    fn wider_interval_costs_more_for_the_same_frequency() {
        let c = cost();
        let narrow = FrequencyVector::histogram(100, 10.0, 1);
        let wide = FrequencyVector::histogram(100, 1000.0, 1);
        assert!(c.part_cost(&wide) > c.part_cost(&narrow));
    }

    #[test]
    fn configuration_rejects_degenerate_grid() {
        assert!(HistogramCost::new(0, 0.0, 1, 100).is_err());
    }
}
