//! Crossover and mutation operators on [`Allocation`]s.
//!
//! # Crossover Operators
//!
//! - [`CrossoverStrategy::SinglePoint`]: split a shuffled campaign list in two
//!   and take each group from a different parent
//! - [`CrossoverStrategy::Uniform`]: fair coin per campaign
//! - [`CrossoverStrategy::AdLevel`]: recombine halves of the shuffled
//!   (campaign, ad) pairs of both parents
//!
//! Children of every strategy generally violate the allocation invariant
//! (duplicated or missing ads, empty campaigns), so [`crossover`] passes both
//! through [`Allocation::repair`].
//!
//! # Mutation Operators
//!
//! - [`MutationStrategy::Move`]: relocate single ads out of donor campaigns
//! - [`MutationStrategy::Swap`]: exchange ads between two campaigns
//! - [`MutationStrategy::Scramble`]: pull several ads out of donors and
//!   redistribute them at random
//!
//! Sources are always campaigns holding more than one ad, so mutation alone
//! never empties a campaign.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::AllocationError;
use crate::model::{other_campaign, Allocation};

/// Upper bound on mutation intensity in force-diversity mode.
const MAX_FORCED_INTENSITY: f64 = 0.6;

/// Intensity multiplier in force-diversity mode.
const FORCED_INTENSITY_FACTOR: f64 = 3.0;

// ============================================================================
// Crossover operators
// ============================================================================

/// Recombination scheme for two parent allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverStrategy {
    /// Shuffle campaign indices and split them at a random point; child 1
    /// takes the first group from parent 1 and the second from parent 2,
    /// child 2 the mirror.
    SinglePoint,

    /// For every campaign, a fair coin decides which parent child 1 inherits
    /// the ad list from; child 2 takes the other.
    Uniform,

    /// Flatten both parents into (campaign, ad) pairs, shuffle each, split
    /// each at its midpoint and cross the halves.
    AdLevel,
}

impl CrossoverStrategy {
    pub const ALL: [Self; 3] = [Self::SinglePoint, Self::Uniform, Self::AdLevel];

    /// Picks a strategy uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Produces two raw children. The result is **not** repaired.
    ///
    /// # Panics
    /// Panics if the parents have different campaign counts.
    pub fn recombine<R: Rng>(
        self,
        parent1: &Allocation,
        parent2: &Allocation,
        rng: &mut R,
    ) -> (Allocation, Allocation) {
        assert_eq!(
            parent1.num_campaigns(),
            parent2.num_campaigns(),
            "parents must have equal campaign counts"
        );
        match self {
            Self::SinglePoint => single_point(parent1, parent2, rng),
            Self::Uniform => uniform(parent1, parent2, rng),
            Self::AdLevel => ad_level(parent1, parent2, rng),
        }
    }
}

/// Applies crossover with probability `rate` and repairs both children.
///
/// When crossover is skipped both parents pass through as clones. Each
/// child is reported separately: a child whose repair fails is an
/// [`AllocationError`] the caller discards.
pub fn crossover<R: Rng>(
    parent1: &Allocation,
    parent2: &Allocation,
    num_ads: usize,
    rate: f64,
    rng: &mut R,
) -> [Result<Allocation, AllocationError>; 2] {
    if rng.random::<f64>() >= rate {
        return [Ok(parent1.clone()), Ok(parent2.clone())];
    }

    let k = parent1.num_campaigns();
    let (child1, child2) = CrossoverStrategy::random(rng).recombine(parent1, parent2, rng);
    [
        child1.repair(k, num_ads, rng),
        child2.repair(k, num_ads, rng),
    ]
}

fn single_point<R: Rng>(
    parent1: &Allocation,
    parent2: &Allocation,
    rng: &mut R,
) -> (Allocation, Allocation) {
    let k = parent1.num_campaigns();
    if k < 2 {
        return (parent1.clone(), parent2.clone());
    }

    let mut order: Vec<usize> = (0..k).collect();
    order.shuffle(rng);
    let point = rng.random_range(1..k);

    let mut child1 = Allocation::empty(k);
    let mut child2 = Allocation::empty(k);
    for (i, &c) in order.iter().enumerate() {
        let (first, second) = if i < point {
            (parent1, parent2)
        } else {
            (parent2, parent1)
        };
        for &ad in first.ads_of(c) {
            child1.push(c, ad);
        }
        for &ad in second.ads_of(c) {
            child2.push(c, ad);
        }
    }
    (child1, child2)
}

fn uniform<R: Rng>(
    parent1: &Allocation,
    parent2: &Allocation,
    rng: &mut R,
) -> (Allocation, Allocation) {
    let k = parent1.num_campaigns();
    let mut child1 = Allocation::empty(k);
    let mut child2 = Allocation::empty(k);
    for c in 0..k {
        let (first, second) = if rng.random_bool(0.5) {
            (parent1, parent2)
        } else {
            (parent2, parent1)
        };
        for &ad in first.ads_of(c) {
            child1.push(c, ad);
        }
        for &ad in second.ads_of(c) {
            child2.push(c, ad);
        }
    }
    (child1, child2)
}

fn ad_level<R: Rng>(
    parent1: &Allocation,
    parent2: &Allocation,
    rng: &mut R,
) -> (Allocation, Allocation) {
    let k = parent1.num_campaigns();
    let mut pairs1 = flatten(parent1);
    let mut pairs2 = flatten(parent2);
    pairs1.shuffle(rng);
    pairs2.shuffle(rng);
    let (head1, tail1) = pairs1.split_at(pairs1.len() / 2);
    let (head2, tail2) = pairs2.split_at(pairs2.len() / 2);

    let mut child1 = Allocation::empty(k);
    let mut child2 = Allocation::empty(k);
    for &(c, ad) in head1.iter().chain(tail2) {
        child1.push(c, ad);
    }
    for &(c, ad) in head2.iter().chain(tail1) {
        child2.push(c, ad);
    }
    (child1, child2)
}

/// All (campaign, ad) pairs of an allocation.
fn flatten(alloc: &Allocation) -> Vec<(usize, usize)> {
    alloc
        .slots()
        .iter()
        .enumerate()
        .flat_map(|(c, ads)| ads.iter().map(move |&ad| (c, ad)))
        .collect()
}

// ============================================================================
// Mutation operators
// ============================================================================

/// Perturbation applied to an offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStrategy {
    /// `max(1, intensity * n)` attempts, each relocating one random ad of a
    /// donor campaign with probability `intensity`.
    Move,

    /// `max(1, intensity * n / 2)` exchanges of random ads between two
    /// distinct campaigns.
    Swap,

    /// Pulls `max(2, intensity * n)` ads out of donor campaigns and assigns
    /// each to a uniformly random campaign.
    Scramble,
}

impl MutationStrategy {
    pub const ALL: [Self; 3] = [Self::Move, Self::Swap, Self::Scramble];

    /// Picks a strategy uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Applies the strategy with the given intensity in `[0, 1]`.
    ///
    /// No-op for allocations with fewer than two campaigns.
    pub fn apply<R: Rng>(self, alloc: &mut Allocation, intensity: f64, rng: &mut R) {
        let k = alloc.num_campaigns();
        let n = alloc.num_assigned();
        if k < 2 || n < 2 {
            return;
        }
        let intensity = intensity.clamp(0.0, 1.0);
        let scaled = intensity * n as f64;

        match self {
            Self::Move => {
                for _ in 0..(scaled as usize).max(1) {
                    if rng.random_bool(intensity) {
                        alloc.relocate_random(rng);
                    }
                }
            }
            Self::Swap => {
                for _ in 0..((scaled * 0.5) as usize).max(1) {
                    swap_random(alloc, rng);
                }
            }
            Self::Scramble => {
                let mut pool = Vec::new();
                for _ in 0..(scaled as usize).max(2) {
                    let donors = alloc.donor_campaigns();
                    if donors.is_empty() {
                        break;
                    }
                    let c = donors[rng.random_range(0..donors.len())];
                    let pos = rng.random_range(0..alloc.ads_of(c).len());
                    pool.push(alloc.take(c, pos));
                }
                for ad in pool {
                    alloc.push(rng.random_range(0..k), ad);
                }
            }
        }
    }
}

/// Mutates an offspring in place.
///
/// Intensity is `rate`; in force-diversity mode it is tripled (capped at
/// 0.6) and the strategy is drawn at random instead of always
/// [`MutationStrategy::Move`]. Returns the strategy applied.
pub fn mutate<R: Rng>(
    alloc: &mut Allocation,
    rate: f64,
    force_diversity: bool,
    rng: &mut R,
) -> MutationStrategy {
    let (strategy, intensity) = if force_diversity {
        (
            MutationStrategy::random(rng),
            (rate * FORCED_INTENSITY_FACTOR).min(MAX_FORCED_INTENSITY),
        )
    } else {
        (MutationStrategy::Move, rate)
    };
    strategy.apply(alloc, intensity, rng);
    strategy
}

/// Exchanges one random ad of each of two distinct campaigns.
fn swap_random<R: Rng>(alloc: &mut Allocation, rng: &mut R) {
    let k = alloc.num_campaigns();
    let ca = rng.random_range(0..k);
    let cb = other_campaign(k, ca, rng);
    let (slots_a, slots_b) = (alloc.ads_of(ca), alloc.ads_of(cb));
    if slots_a.is_empty() || slots_b.is_empty() {
        return;
    }
    let ad_a = slots_a[rng.random_range(0..slots_a.len())];
    let ad_b = slots_b[rng.random_range(0..slots_b.len())];
    alloc.swap(ad_a, ca, ad_b, cb);
}

// ============================================================================
// Tests
// ============================================================================
