//! Per-generation statistics recorded by the GA.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of the population after one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerationStats {
    /// Zero-based generation index.
    pub generation: usize,
    /// Best-ever fitness so far.
    pub best_fitness: f64,
    /// Total ROI of the best-ever individual.
    pub best_roi: f64,
    /// Total media cost of the best-ever individual.
    pub best_cost: f64,
    /// Mean fitness of the new population.
    pub avg_fitness: f64,
    /// Mean total ROI of the new population.
    pub avg_roi: f64,
    /// Distinct allocations / population size of the new population.
    pub diversity: f64,
    /// Whether the generation ran in force-diversity mode.
    pub force_diversity: bool,
}
