//! Neighborhood sampling.
//!
//! Each attempt picks one of three move types uniformly at random:
//!
//! - single relocation of one ad out of a donor campaign
//! - pairwise swap of ads between two distinct campaigns
//! - a bundle of 2 or 3 chained relocations
//!
//! Every proposal is a fresh clone of the current allocation, so neighbors
//! never alias each other or their parent.

use rand::Rng;

use super::memory::TabuMemory;
use super::types::Move;
use crate::model::{other_campaign, Allocation, FitnessEvaluator, Relocation, Solution};

/// Attempts allowed per requested neighbor.
const ATTEMPTS_PER_NEIGHBOR: usize = 3;

/// An evaluated neighbor and the move that produced it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub solution: Solution,
    pub mv: Move,
}

/// Move families sampled by [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Relocate,
    Swap,
    Bundle,
}

impl MoveKind {
    pub const ALL: [Self; 3] = [Self::Relocate, Self::Swap, Self::Bundle];

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Applies a random move of this kind to a copy of `current`.
    ///
    /// Returns `None` when the allocation admits no move of this kind.
    pub fn propose<R: Rng>(self, current: &Allocation, rng: &mut R) -> Option<(Allocation, Move)> {
        let mut alloc = current.clone();
        let mv = match self {
            Self::Relocate => Move::Relocate(alloc.relocate_random(rng)?),
            Self::Swap => swap(&mut alloc, rng)?,
            Self::Bundle => {
                let count = rng.random_range(2..=3);
                let moves: Vec<Relocation> =
                    (0..count).map_while(|_| alloc.relocate_random(rng)).collect();
                if moves.is_empty() {
                    return None;
                }
                Move::Bundle(moves)
            }
        };
        Some((alloc, mv))
    }
}

fn swap<R: Rng>(alloc: &mut Allocation, rng: &mut R) -> Option<Move> {
    let k = alloc.num_campaigns();
    if k < 2 {
        return None;
    }
    let campaign_a = rng.random_range(0..k);
    let campaign_b = other_campaign(k, campaign_a, rng);
    let (ads_a, ads_b) = (alloc.ads_of(campaign_a), alloc.ads_of(campaign_b));
    if ads_a.is_empty() || ads_b.is_empty() {
        return None;
    }
    let ad_a = ads_a[rng.random_range(0..ads_a.len())];
    let ad_b = ads_b[rng.random_range(0..ads_b.len())];
    alloc.swap(ad_a, campaign_a, ad_b, campaign_b).then_some(Move::Swap {
        ad_a,
        campaign_a,
        ad_b,
        campaign_b,
    })
}

/// Samples up to `size` evaluated neighbors of `current`.
///
/// At most `3 × size` proposals are made. Structurally invalid proposals
/// are dropped. A proposal whose move is tabu is dropped unless
/// `aspiration` is set and its fitness exceeds `best_before`, the
/// best-ever fitness captured before this batch; neighbors found earlier
/// in the same batch do not raise that bar.
pub fn generate<R: Rng>(
    current: &Allocation,
    evaluator: &FitnessEvaluator<'_>,
    memory: &TabuMemory,
    size: usize,
    aspiration: bool,
    best_before: f64,
    rng: &mut R,
) -> Vec<Candidate> {
    let store = evaluator.store();
    let (k, n) = (store.num_campaigns(), store.num_ads());

    let mut candidates = Vec::with_capacity(size);
    let mut attempts = 0;
    while candidates.len() < size && attempts < size * ATTEMPTS_PER_NEIGHBOR {
        attempts += 1;
        let Some((alloc, mv)) = MoveKind::random(rng).propose(current, rng) else {
            continue;
        };
        if alloc.validate(k, n).is_err() {
            continue;
        }
        let solution = evaluator.evaluated(alloc);
        if memory.is_tabu(&mv) && !(aspiration && solution.fitness() > best_before) {
            continue;
        }
        candidates.push(Candidate { solution, mv });
    }
    candidates
}

/// The first candidate with the highest fitness.
pub fn best_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        if best
            .as_ref()
            .map_or(true, |b| candidate.solution.fitness() > b.solution.fitness())
        {
            best = Some(candidate);
        }
    }
    best
}
