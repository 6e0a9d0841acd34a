//! Tabu Search execution engine.
//!
//! # Algorithm
//!
//! 1. Generate a random initial solution
//! 2. At each iteration:
//!    a. Sample a neighborhood; tabu moves survive only through aspiration
//!       against the best-ever fitness captured before the batch
//!    b. Move to the best neighbor, even if it is worse than the current
//!       solution; with no neighbor at all, restart from a random solution
//!    c. Add the move to the tabu list and record the visited allocation
//!    d. Update the global best or the stagnation counter
//! 3. Intensify at every positive multiple of the intensification threshold:
//!    jump back to the best solution and run 10 extra iterations with
//!    halved neighborhood and tenure
//! 4. Diversify once stagnation reaches the diversification threshold:
//!    relocate 20–30% of the ads, clear the tabu memory, reset stagnation
//!
//! # Reference
//!
//! Glover, F. (1989). "Tabu Search—Part I", *ORSA Journal on Computing* 1(3), 190-206.
//! Glover, F. (1990). "Tabu Search—Part II", *ORSA Journal on Computing* 2(1), 4-32.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::config::TabuConfig;
use super::memory::TabuMemory;
use super::neighborhood::{best_candidate, generate};
use super::types::{IterationStats, Move};
use crate::error::Result;
use crate::model::{other_campaign, Allocation, FitnessEvaluator, Solution};

/// Extra iterations run per intensification.
const INTENSIFY_STEPS: usize = 10;
/// Lower bounds of the tightened parameters during intensification.
const INTENSIFY_MIN_NEIGHBORHOOD: usize = 10;
const INTENSIFY_MIN_TENURE: usize = 5;

/// Bounds, in percent of all ads, of the share relocated by
/// diversification.
const DIVERSIFY_MIN_PERCENT: usize = 20;
const DIVERSIFY_MAX_PERCENT: usize = 30;

/// Result of a Tabu Search run.
#[derive(Debug, Clone)]
pub struct TabuResult {
    /// Best solution found.
    pub best: Solution,
    /// Fitness of the best solution.
    pub best_fitness: f64,
    /// Main-loop iterations executed.
    pub iterations: usize,
    /// Iteration at which the best solution was found.
    pub best_iteration: usize,
    /// Whether the run was cancelled externally.
    pub cancelled: bool,
    /// Whether the run stopped at its time limit.
    pub timed_out: bool,
    /// Best fitness at each iteration.
    pub fitness_history: Vec<f64>,
    /// Trajectory statistics per iteration.
    pub history: Vec<IterationStats>,
    pub intensifications: usize,
    pub diversifications: usize,
    /// Random restarts after empty neighborhoods.
    pub restarts: usize,
    /// Moves that landed on an already visited allocation.
    pub revisits: usize,
}

/// What one step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Moved to the best neighbor.
    Moved { mv: Move, improved: bool },
    /// No neighbor was available; the current solution was re-randomized.
    Restarted,
}

/// Trajectory search over allocations.
pub struct TabuSearch<'a, R: Rng> {
    evaluator: FitnessEvaluator<'a>,
    config: TabuConfig,
    rng: R,
    memory: TabuMemory,
    neighborhood_size: usize,
    current: Solution,
    best: Solution,
    iteration: usize,
    best_iteration: usize,
    stagnation: usize,
    intensifications: usize,
    diversifications: usize,
    restarts: usize,
    revisits: usize,
    history: Vec<IterationStats>,
}

impl<'a, R: Rng> TabuSearch<'a, R> {
    /// Creates an engine starting from a random allocation.
    ///
    /// # Errors
    /// - [`SearchError::InvalidConfig`](crate::SearchError::InvalidConfig)
    ///   for an invalid configuration
    /// - [`SearchError::InfeasibleProblem`](crate::SearchError::InfeasibleProblem)
    ///   when the store cannot give every campaign an ad
    pub fn new(evaluator: FitnessEvaluator<'a>, config: TabuConfig, mut rng: R) -> Result<Self> {
        config.validate()?;
        let store = evaluator.store();
        store.ensure_feasible()?;

        let initial = Allocation::random(store.num_campaigns(), store.num_ads(), &mut rng)?;
        let current = evaluator.evaluated(initial);
        Ok(Self {
            memory: TabuMemory::new(config.tabu_tenure),
            neighborhood_size: config.neighborhood_size,
            best: current.clone(),
            current,
            evaluator,
            config,
            rng,
            iteration: 0,
            best_iteration: 0,
            stagnation: 0,
            intensifications: 0,
            diversifications: 0,
            restarts: 0,
            revisits: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &TabuConfig {
        &self.config
    }

    pub fn current(&self) -> &Solution {
        &self.current
    }

    pub fn best(&self) -> &Solution {
        &self.best
    }

    pub fn memory(&self) -> &TabuMemory {
        &self.memory
    }

    /// Iterations since the best-ever fitness last improved.
    pub fn stagnation(&self) -> usize {
        self.stagnation
    }

    pub fn history(&self) -> &[IterationStats] {
        &self.history
    }

    /// Performs one tabu iteration with the current parameters.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let best_before = self.best.fitness();
        let candidates = generate(
            self.current.allocation(),
            &self.evaluator,
            &self.memory,
            self.neighborhood_size,
            self.config.aspiration,
            best_before,
            &mut self.rng,
        );

        let Some(chosen) = best_candidate(candidates) else {
            self.restart()?;
            return Ok(StepOutcome::Restarted);
        };

        self.memory.push_move(chosen.mv.clone());
        if self.memory.record_visit(chosen.solution.allocation().signature()) {
            self.revisits += 1;
        }
        self.current = chosen.solution;

        let improved = self.current.fitness() > self.best.fitness();
        if improved {
            self.best = self.current.clone();
            self.best_iteration = self.iteration;
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }
        Ok(StepOutcome::Moved {
            mv: chosen.mv,
            improved,
        })
    }

    /// Replaces the current solution with a fresh random one. Best-ever and
    /// stagnation are left alone.
    fn restart(&mut self) -> Result<()> {
        let store = self.evaluator.store();
        let alloc = Allocation::random(store.num_campaigns(), store.num_ads(), &mut self.rng)?;
        self.current = self.evaluator.evaluated(alloc);
        self.restarts += 1;
        tracing::debug!(
            "Tabu: no valid neighbor at iteration {}, random restart",
            self.iteration
        );
        Ok(())
    }

    /// Applies intensification and diversification if the stagnation
    /// counter calls for them.
    pub fn control(&mut self) -> Result<()> {
        if self.stagnation > 0 && self.stagnation % self.config.intensification_threshold == 0 {
            self.intensify()?;
        }
        if self.stagnation >= self.config.diversification_threshold {
            self.diversify();
        }
        Ok(())
    }

    fn intensify(&mut self) -> Result<()> {
        self.intensifications += 1;
        tracing::debug!(
            "Tabu: intensification at iteration {} (stagnation {})",
            self.iteration,
            self.stagnation
        );

        self.current = self.best.clone();
        let neighborhood = self.neighborhood_size;
        let tenure = self.memory.tenure();
        self.neighborhood_size = (neighborhood / 2)
            .max(INTENSIFY_MIN_NEIGHBORHOOD)
            .min(neighborhood);
        self.memory
            .set_tenure((tenure / 2).max(INTENSIFY_MIN_TENURE).min(tenure));

        let outcome = (0..INTENSIFY_STEPS).try_for_each(|_| self.step().map(|_| ()));

        self.neighborhood_size = neighborhood;
        self.memory.set_tenure(tenure);
        outcome
    }

    /// Relocates between `ceil(20%)` and `max(ceil(20%), floor(30%))` of the
    /// ads to other campaigns and clears the tabu memory. Returns the number
    /// of ads moved.
    ///
    /// Each ad moves at most once and only out of a campaign holding more
    /// than one ad, so the result stays valid. The perturbed solution is
    /// accepted regardless of its fitness.
    fn diversify(&mut self) -> usize {
        self.diversifications += 1;
        let store = self.evaluator.store();
        let (k, n) = (store.num_campaigns(), store.num_ads());

        let low = (n * DIVERSIFY_MIN_PERCENT).div_ceil(100);
        let high = (n * DIVERSIFY_MAX_PERCENT / 100).max(low);
        let target = self.rng.random_range(low..=high);

        let mut alloc = self.current.allocation().clone();
        let mut moved = 0;
        if k >= 2 {
            let owners = alloc.owners(n);
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut self.rng);
            for ad in order {
                if moved == target {
                    break;
                }
                let Some(from) = owners[ad] else {
                    continue;
                };
                if alloc.ads_of(from).len() < 2 {
                    continue;
                }
                let to = other_campaign(k, from, &mut self.rng);
                if alloc.relocate(ad, from, to) {
                    moved += 1;
                }
            }
        }

        tracing::debug!(
            "Tabu: diversification at iteration {}, relocated {} of {} ads",
            self.iteration,
            moved,
            n
        );
        self.current = self.evaluator.evaluated(alloc);
        self.memory.clear();
        self.stagnation = 0;
        moved
    }

    fn record(&mut self) -> IterationStats {
        let stats = IterationStats {
            iteration: self.iteration,
            best_fitness: self.best.fitness(),
            best_roi: self.best.total_roi(),
            best_cost: self.best.total_cost(),
            current_fitness: self.current.fitness(),
            current_roi: self.current.total_roi(),
            stagnation: self.stagnation,
        };
        self.history.push(stats);
        stats
    }

    /// Runs the configured number of iterations.
    pub fn run(self) -> Result<TabuResult> {
        self.run_with_cancel(None)
    }

    /// Runs with an optional cancellation token, checked between
    /// iterations together with the time limit.
    #[tracing::instrument(level = "debug", name = "Tabu Search", skip(self, cancel))]
    pub fn run_with_cancel(mut self, cancel: Option<Arc<AtomicBool>>) -> Result<TabuResult> {
        let start = Instant::now();
        let store = self.evaluator.store();
        tracing::info!(
            "Tabu: {} campaigns, {} ads, {} iterations, tenure {}, neighborhood {}",
            store.num_campaigns(),
            store.num_ads(),
            self.config.max_iterations,
            self.config.tabu_tenure,
            self.config.neighborhood_size
        );

        let mut fitness_history = Vec::with_capacity(self.config.max_iterations);
        let mut cancelled = false;
        let mut timed_out = false;
        while self.iteration < self.config.max_iterations {
            if cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                cancelled = true;
                break;
            }
            if let Some(limit) = self.config.time_limit_ms {
                if start.elapsed().as_millis() >= u128::from(limit) {
                    timed_out = true;
                    break;
                }
            }

            self.step()?;
            let stats = self.record();
            fitness_history.push(stats.best_fitness);
            self.control()?;

            if stats.iteration % 10 == 0 || stats.iteration + 1 == self.config.max_iterations {
                tracing::debug!(
                    "Tabu: iter {:3} | best ROI {:7.2}% | fitness {:8.3} | cost {:.0} | current ROI {:7.2}% | no improve {}",
                    stats.iteration,
                    stats.best_roi * 100.0,
                    stats.best_fitness,
                    stats.best_cost,
                    stats.current_roi * 100.0,
                    self.stagnation
                );
            }
            self.iteration += 1;
        }

        tracing::info!(
            "Tabu: finished after {} iterations, best fitness {:.4}, ROI {:.2}% \
             ({} intensifications, {} diversifications, {} restarts)",
            self.iteration,
            self.best.fitness(),
            self.best.total_roi() * 100.0,
            self.intensifications,
            self.diversifications,
            self.restarts
        );

        Ok(TabuResult {
            best_fitness: self.best.fitness(),
            best: self.best,
            iterations: self.iteration,
            best_iteration: self.best_iteration,
            cancelled,
            timed_out,
            fitness_history,
            history: self.history,
            intensifications: self.intensifications,
            diversifications: self.diversifications,
            restarts: self.restarts,
            revisits: self.revisits,
        })
    }
}

/// Tabu Search runner with a seeded [`StdRng`].
pub struct TabuRunner;

impl TabuRunner {
    /// Executes Tabu Search.
    pub fn run(evaluator: FitnessEvaluator<'_>, config: &TabuConfig) -> Result<TabuResult> {
        Self::run_with_cancel(evaluator, config, None)
    }

    /// Executes Tabu Search with an optional cancellation token.
    pub fn run_with_cancel(
        evaluator: FitnessEvaluator<'_>,
        config: &TabuConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<TabuResult> {
        let rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        TabuSearch::new(evaluator, config.clone(), rng)?.run_with_cancel(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::model::{Ad, Campaign, EntityStore};

    fn store(k: usize, n: usize) -> EntityStore {
        let campaigns = (0..k)
            .map(|i| {
                Campaign::new(
                    10 + i as u64,
                    800.0,
                    25.0 * i as f64,
                    150.0,
                    90.0 + 30.0 * i as f64,
                )
            })
            .collect();
        let ads = (0..n)
            .map(|j| {
                Ad::new(
                    1_000 + j as u64,
                    0.4 + 0.15 * (j % 5) as f64,
                    1.5 + 0.5 * (j % 3) as f64,
                    0.04 + 0.03 * (j % 4) as f64,
                )
            })
            .collect();
        EntityStore::new(campaigns, ads).unwrap()
    }

    fn search<'a>(
        evaluator: FitnessEvaluator<'a>,
        config: TabuConfig,
        seed: u64,
    ) -> TabuSearch<'a, StdRng> {
        TabuSearch::new(evaluator, config, StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_infeasible_fails_at_construction() {
        let store = store(3, 2);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.0).unwrap();
        let err = TabuSearch::new(evaluator, TabuConfig::default(), StdRng::seed_from_u64(0))
            .err()
            .unwrap();
        assert!(err.is_infeasible());
        assert_eq!(err, SearchError::InfeasibleProblem { campaigns: 3, ads: 2 });
    }

    #[test]
    fn test_move_tabu_for_exactly_tenure_iterations() {
        let tenure = 4;
        let store = store(3, 18);
        let evaluator = FitnessEvaluator::new(&store, 1e6, 0.2).unwrap();
        let config = TabuConfig::default()
            .with_tabu_tenure(tenure)
            .with_neighborhood_size(12)
            .with_aspiration(false);
        let mut ts = search(evaluator, config, 42);

        let mut sampler = StdRng::seed_from_u64(7);
        let mut executed: Vec<Move> = Vec::new();
        for _ in 0..30 {
            let StepOutcome::Moved { mv, .. } = ts.step().unwrap() else {
                panic!("unexpected restart");
            };
            // The chosen neighbor came from a batch that rejected the moves
            // of the previous `tenure` iterations.
            let recent = &executed[executed.len().saturating_sub(tenure)..];
            assert!(!recent.contains(&mv), "tabu move {mv:?} was executed");
            executed.push(mv);
            let t = executed.len() - 1;

            let batch = generate(
                ts.current().allocation(),
                &ts.evaluator,
                ts.memory(),
                40,
                false,
                ts.best().fitness(),
                &mut sampler,
            );
            let recent = &executed[executed.len().saturating_sub(tenure)..];
            assert!(!batch.is_empty());
            assert!(batch.iter().all(|c| !recent.contains(&c.mv)));

            // Executed at t: forbidden for the next `tenure` neighborhoods,
            // i.e. those generated at t+1..=t+tenure.
            for back in 0..tenure.min(t + 1) {
                assert!(ts.memory().is_tabu(&executed[t - back]));
            }
            if t >= tenure {
                let expired = &executed[t - tenure];
                let renewed = executed[t - tenure + 1..].contains(expired);
                assert_eq!(ts.memory().is_tabu(expired), renewed);
            }
        }
    }

    #[test]
    fn test_diversification_perturbs_and_clears_memory() {
        for n in [4, 7, 9, 12, 50] {
            for seed in 0..5 {
                let store = store(2, n);
                let evaluator = FitnessEvaluator::new(&store, 1e6, 0.0).unwrap();
                let config = TabuConfig::default()
                    .with_intensification_threshold(7)
                    .with_diversification_threshold(10);
                let mut ts = search(evaluator, config, seed);

                for _ in 0..5 {
                    ts.step().unwrap();
                }
                assert!(!ts.memory().is_empty());

                let before = ts.current().allocation().owners(n);
                ts.stagnation = 10;
                ts.control().unwrap();

                assert!(ts.memory().is_empty());
                assert_eq!(ts.stagnation(), 0);
                assert_eq!(ts.diversifications, 1);
                let after = ts.current().allocation().owners(n);
                let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
                let fraction = changed as f64 / n as f64;
                assert!(changed >= 1, "n={n} seed={seed}: nothing moved");
                assert!(
                    (0.2..=0.3).contains(&fraction),
                    "n={n} seed={seed}: changed fraction {fraction}"
                );
                assert!(ts.current().allocation().is_valid(2, n));
                assert!(ts.current().is_evaluated());
            }
        }
    }

    #[test]
    fn test_intensification_restores_parameters() {
        let store = store(3, 24);
        let evaluator = FitnessEvaluator::new(&store, 1e6, 0.1).unwrap();
        let config = TabuConfig::default()
            .with_tabu_tenure(12)
            .with_neighborhood_size(30)
            .with_intensification_threshold(5)
            .with_diversification_threshold(1_000);
        let mut ts = search(evaluator, config, 3);

        ts.stagnation = 5;
        ts.control().unwrap();
        assert_eq!(ts.intensifications, 1);
        assert_eq!(ts.neighborhood_size, 30);
        assert_eq!(ts.memory().tenure(), 12);
        // Ten extra moves were recorded under the shrunken tenure of 6.
        assert!(ts.memory().num_moves() <= 6);
    }

    #[test]
    fn test_random_restart_keeps_best() {
        // One campaign: no relocation or swap exists, so every step restarts.
        let store = store(1, 4);
        let evaluator = FitnessEvaluator::new(&store, 1e6, 0.0).unwrap();
        let mut ts = search(evaluator, TabuConfig::default(), 1);
        let best = ts.best().clone();

        assert_eq!(ts.step().unwrap(), StepOutcome::Restarted);
        assert_eq!(ts.best(), &best);
        assert_eq!(ts.stagnation(), 0);
        assert_eq!(ts.restarts, 1);
    }

    #[test]
    fn test_run_tracks_best_and_history() {
        let store = store(4, 20);
        let evaluator = FitnessEvaluator::new(&store, 1e6, 0.3).unwrap();
        let config = TabuConfig::default()
            .with_max_iterations(60)
            .with_intensification_threshold(8)
            .with_diversification_threshold(20)
            .with_seed(5);
        let result = TabuRunner::run(evaluator, &config).unwrap();

        assert_eq!(result.iterations, 60);
        assert_eq!(result.history.len(), 60);
        for pair in result.fitness_history.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(result.best.allocation().is_valid(4, 20));
        let fresh = evaluator.evaluate(result.best.allocation());
        assert_eq!(fresh.fitness, result.best_fitness);
        assert!(result.history.iter().all(|s| s.current_fitness <= s.best_fitness));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let store = store(3, 15);
        let evaluator = FitnessEvaluator::new(&store, 1e6, 0.2).unwrap();
        let config = TabuConfig::default().with_max_iterations(40).with_seed(13);
        let a = TabuRunner::run(evaluator, &config).unwrap();
        let b = TabuRunner::run(evaluator, &config).unwrap();
        assert_eq!(a.fitness_history, b.fitness_history);
        assert_eq!(a.best.allocation(), b.best.allocation());
    }

    #[test]
    fn test_cancellation() {
        let store = store(2, 8);
        let evaluator = FitnessEvaluator::new(&store, 1e6, 0.0).unwrap();
        let config = TabuConfig::default().with_seed(2);
        let cancel = Arc::new(AtomicBool::new(true));
        let result = TabuRunner::run_with_cancel(evaluator, &config, Some(cancel)).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.iterations, 0);
        assert!(result.best.allocation().is_valid(2, 8));
    }
}
