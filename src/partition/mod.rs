//! Component C: the partition search (spec §4.C). Granularity sweep drives
//! merge-based construction over a [`arena::GroupArena`]; preprocessing and
//! two-class subgrouping feed it reduced tables; post-optimization refines
//! its output.

pub mod arena;
pub mod discretize;
pub mod granularity;
pub mod group;
pub mod histogram;
pub mod merge;
pub mod postopt;
pub mod preprocessing;
pub mod subgroup;

pub use discretize::{discretize, DiscretizeOutcome};
pub use granularity::{granularity_sweep, GranularityOutcome, QuantileBuilder};
pub use group::{group, GroupOptions, GroupOutcome};
pub use histogram::{partition_histogram, EpsilonGrid};
pub use merge::{merge_based_construction, MergeOutcome};
pub use preprocessing::{preprocess, PreprocessingOutcome};
pub use subgroup::two_class_subgroup;
