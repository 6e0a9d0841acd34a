//! Moves and per-iteration statistics for Tabu Search.

use crate::model::Relocation;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The transformation that produced a neighbor from its parent.
///
/// Used only as a tabu-memory key; it is never stored on the allocation.
/// Two moves are the same key when every field matches, so a relocation of
/// ad 3 from campaign 0 to 1 is distinct from its reverse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Move {
    /// One ad moved between campaigns.
    Relocate(Relocation),

    /// `ad_a` (from `campaign_a`) and `ad_b` (from `campaign_b`) exchanged.
    Swap {
        ad_a: usize,
        campaign_a: usize,
        ad_b: usize,
        campaign_b: usize,
    },

    /// Two or three relocations applied in order.
    Bundle(Vec<Relocation>),
}

impl Move {
    /// Number of ads that changed campaign.
    pub fn len(&self) -> usize {
        match self {
            Move::Relocate(_) => 1,
            Move::Swap { .. } => 2,
            Move::Bundle(moves) => moves.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trajectory snapshot after one main-loop iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationStats {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Best-ever fitness so far.
    pub best_fitness: f64,
    /// Total ROI of the best-ever solution.
    pub best_roi: f64,
    /// Total media cost of the best-ever solution.
    pub best_cost: f64,
    /// Fitness of the current solution.
    pub current_fitness: f64,
    /// Total ROI of the current solution.
    pub current_roi: f64,
    /// Iterations since the best-ever fitness last improved.
    pub stagnation: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_move_identity() {
        let forward = Move::Relocate(Relocation { ad: 3, from: 0, to: 1 });
        let back = Move::Relocate(Relocation { ad: 3, from: 1, to: 0 });
        let swap = Move::Swap {
            ad_a: 3,
            campaign_a: 0,
            ad_b: 4,
            campaign_b: 1,
        };

        let set: HashSet<Move> = [forward.clone(), back, swap.clone(), forward.clone()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 3);
        assert_eq!(forward.len(), 1);
        assert_eq!(swap.len(), 2);
    }

    #[test]
    fn test_bundle_len() {
        let bundle = Move::Bundle(vec![
            Relocation { ad: 0, from: 0, to: 1 },
            Relocation { ad: 1, from: 0, to: 2 },
        ]);
        assert_eq!(bundle.len(), 2);
        assert!(!bundle.is_empty());
    }
}
