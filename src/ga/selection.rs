//! Parent selection for the GA.
//!
//! Tournament selection only: sample `k` distinct individuals uniformly and
//! keep the fittest. Fitness is **maximized** throughout this crate.
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"

use rand::seq::index;
use rand::Rng;

use crate::model::Solution;

/// Returns the index of the tournament winner.
///
/// The tournament samples `min(k, len)` distinct individuals; ties go to
/// the first sampled. `k = 0` is treated as 1.
///
/// # Panics
/// Panics if `population` is empty.
pub fn tournament<R: Rng>(population: &[Solution], k: usize, rng: &mut R) -> usize {
    assert!(
        !population.is_empty(),
        "cannot select from empty population"
    );
    let size = k.clamp(1, population.len());

    let mut best_idx = None;
    let mut best_fitness = f64::NEG_INFINITY;
    for idx in index::sample(rng, population.len(), size) {
        let fitness = population[idx].fitness();
        if best_idx.is_none() || fitness > best_fitness {
            best_idx = Some(idx);
            best_fitness = fitness;
        }
    }
    best_idx.unwrap_or(0)
}
