//! MDL univariate partitioning engine.
//!
//! Given a single input variable and a categorical target, the [`partition`]
//! module searches for the partition (intervals for numeric inputs, value
//! groups for categorical inputs, binned intervals for continuous
//! distributions) that minimizes a closed-form Minimum Description Length
//! cost. Downstream consumers turn the resulting
//! [`frequency::FrequencyTable`] into conditional-probability lookups and,
//! via [`grid::DataGrid`] and [`shapley::ShapleyValuator`], into
//! model-interpretation artifacts.
//!
//! This crate performs no I/O: no persistence format, no CLI, no wire
//! protocol. It is a pure, single-threaded-per-call optimization library.

pub mod cost;
pub mod error;
pub mod frequency;
pub mod grid;
pub mod interrupt;
pub mod numeric;
pub mod partition;
pub mod random;
pub mod registry;
pub mod shapley;

/// dimensional type aliases, matching the units the cost model reasons about
pub type Continuous = f64;
pub type Frequency = i32;
pub type Probability = f64;
pub type Entropy = f32;

/// numerical discipline shared by every ΔCost / recomputed-cost comparison (§5, §8)
pub const EPSILON: Continuous = 1e-6;

/// garbage group is only considered once a variable has at least this many modalities (§4.B)
pub const MIN_VALUE_NUMBER_FOR_GARBAGE: usize = 7;

/// §4.C.5: number of consecutive failed forced merges before giving up
pub const MAX_TESTED_FORCED_MERGE_NUMBER: usize = 3;

/// first-order Rissanen universal-code constant, used by [`cost::bounded`]
pub const UNIVERSAL_CODE_CONSTANT: Continuous = 2.865064;

/// trait for deterministic synthetic fixtures, mirrored from the teacher's testing helpers
pub trait Arbitrary {
    fn random() -> Self;
}
