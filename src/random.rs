//! Injectable deterministic PRNG (Design Note §9 "Random shuffles in the
//! fast-post-optimizer"). The teacher reaches for a thread-local
//! `rand::thread_rng()` throughout `src/clustering/kmeans.rs` and
//! `src/clustering/sampling.rs`; here we thread a seeded generator through
//! call signatures instead, so the fast post-optimizer (§4.C.5) is
//! reproducible under test.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Wraps a `SmallRng` (the teacher's choice: `rand = { features =
/// ["small_rng"] }`) seeded explicitly, rather than pulled from thread-local
/// entropy, so two calls with the same seed shuffle identically.
pub struct DeterministicRng(SmallRng);

impl DeterministicRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    pub fn inner_mut(&mut self) -> &mut SmallRng {
        &mut self.0
    }
}

impl Default for DeterministicRng {
    /// a fixed default seed, not entropy: call sites that want nondeterminism
    /// must ask for it explicitly via `seeded`.
    fn default() -> Self {
        Self::seeded(0x5EED_5EED_5EED_5EED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn same_seed_shuffles_identically() {
        let mut a = DeterministicRng::seeded(42);
        let mut b = DeterministicRng::seeded(42);
        let mut xs: Vec<i32> = (0..20).collect();
        let mut ys = xs.clone();
        xs.shuffle(a.inner_mut());
        ys.shuffle(b.inner_mut());
        assert_eq!(xs, ys);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let mut a = DeterministicRng::seeded(1);
        let mut b = DeterministicRng::seeded(2);
        let mut xs: Vec<i32> = (0..50).collect();
        let mut ys = xs.clone();
        xs.shuffle(a.inner_mut());
        ys.shuffle(b.inner_mut());
        assert_ne!(xs, ys);
    }
}
