//! GA evolutionary loop execution.
//!
//! [`GeneticAlgorithm`] owns the population and advances it one generation
//! at a time; [`GaRunner`] wraps it with seeding, cancellation and a
//! wall-clock limit.
//!
//! # Algorithm
//!
//! 1. Measure diversity (distinct allocations / population size). Below
//!    the threshold the generation runs in force-diversity mode.
//! 2. Carry the elites over unchanged: `max(2, 15%)` normally, `max(1, 10%)`
//!    in force-diversity mode.
//! 3. Carry a tail over: the worst `max(1, 5%)` normally; in force-diversity
//!    mode half of `max(3, 15%)` from the worst end plus a random sample of
//!    the middle of the population.
//! 4. Fill the rest with offspring: two tournament winners, crossover with
//!    repair, mutation of both children. A child failing validation is
//!    discarded and the cycle retried.
//! 5. Overwrite random non-elite slots with fresh random immigrants (3 in
//!    force-diversity mode, 1 otherwise).
//! 6. Evaluate, re-sort best first and update the best-ever snapshot.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::config::GaConfig;
use super::operators::{crossover, mutate};
use super::selection::tournament;
use super::types::GenerationStats;
use crate::error::{Result, SearchError};
use crate::model::{Allocation, FitnessEvaluator, Solution};

/// Offspring rejections tolerated per population slot before the remaining
/// slots are filled with random immigrants.
const MAX_REJECTIONS_PER_SLOT: usize = 50;

/// Result of a GA optimization run.
#[derive(Debug, Clone)]
pub struct GaResult {
    /// The best individual found during the entire run.
    pub best: Solution,

    /// Best fitness value (same as `best.fitness()`).
    pub best_fitness: f64,

    /// Total number of generations executed.
    pub generations: usize,

    /// Whether the run was cancelled externally.
    pub cancelled: bool,

    /// Whether the run stopped at its time limit.
    pub timed_out: bool,

    /// Best-ever fitness after initialization and after each generation.
    pub fitness_history: Vec<f64>,

    /// Population statistics per generation.
    pub history: Vec<GenerationStats>,
}

/// Population-based search over allocations.
///
/// Generic over the random source so tests and callers can inject a seeded
/// generator.
pub struct GeneticAlgorithm<'a, R: Rng> {
    evaluator: FitnessEvaluator<'a>,
    config: GaConfig,
    rng: R,
    population: Vec<Solution>,
    best: Option<Solution>,
    generation: usize,
    stagnation: usize,
    history: Vec<GenerationStats>,
}

impl<'a, R: Rng> GeneticAlgorithm<'a, R> {
    /// Creates an engine. No individual exists until [`initialize`] runs.
    ///
    /// # Errors
    /// - [`SearchError::InvalidConfig`] for an invalid configuration
    /// - [`SearchError::InfeasibleProblem`] / [`SearchError::EmptyInput`]
    ///   when the store cannot give every campaign an ad
    ///
    /// [`initialize`]: Self::initialize
    pub fn new(evaluator: FitnessEvaluator<'a>, config: GaConfig, rng: R) -> Result<Self> {
        config.validate()?;
        evaluator.store().ensure_feasible()?;
        Ok(Self {
            population: Vec::with_capacity(config.population_size),
            evaluator,
            config,
            rng,
            best: None,
            generation: 0,
            stagnation: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Current population, best first.
    pub fn population(&self) -> &[Solution] {
        &self.population
    }

    /// Best-ever individual, once the population exists.
    pub fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }

    /// Generations completed.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Consecutive generations without improving the best-ever fitness.
    pub fn stagnation(&self) -> usize {
        self.stagnation
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    fn dims(&self) -> (usize, usize) {
        let store = self.evaluator.store();
        (store.num_campaigns(), store.num_ads())
    }

    /// Builds and evaluates a random population, discarding any previous
    /// state.
    pub fn initialize(&mut self) -> Result<()> {
        let (k, n) = self.dims();
        self.population.clear();
        for _ in 0..self.config.population_size {
            let alloc = Allocation::random(k, n, &mut self.rng)?;
            alloc.validate(k, n)?;
            self.population.push(Solution::new(alloc));
        }
        evaluate_all(&self.evaluator, &mut self.population, self.config.parallel);
        sort_best_first(&mut self.population);

        self.best = self.population.first().cloned();
        self.generation = 0;
        self.stagnation = 0;
        self.history.clear();
        Ok(())
    }

    /// Advances one generation.
    ///
    /// Initializes the population first if needed.
    pub fn evolve(&mut self) -> Result<GenerationStats> {
        if self.population.is_empty() {
            self.initialize()?;
        }
        let (k, n) = self.dims();
        let size = self.config.population_size;
        let len = self.population.len();

        let force_diversity = population_diversity(&self.population) < self.config.diversity_threshold;
        if force_diversity {
            tracing::debug!(
                "GA: low diversity at generation {}, forcing exploration",
                self.generation
            );
        }

        let elite_count = self.config.elite_count(force_diversity).min(len);
        let mut next: Vec<Solution> = Vec::with_capacity(size + 3);
        next.extend_from_slice(&self.population[..elite_count]);

        // Tail carried over from the bottom of the ranking.
        if force_diversity {
            let tail = ((size as f64 * 0.15) as usize).max(3);
            let worst = tail.div_ceil(2).min(len);
            next.extend_from_slice(&self.population[len - worst..]);
            if len > elite_count + tail {
                let middle = &self.population[elite_count..len - worst];
                for i in index::sample(&mut self.rng, middle.len(), tail / 2) {
                    next.push(middle[i].clone());
                }
            }
        } else {
            let worst = ((size as f64 * 0.05) as usize).max(1).min(len);
            next.extend_from_slice(&self.population[len - worst..]);
        }
        next.truncate(size);

        // Offspring.
        let mut rejected = 0usize;
        let max_rejections = size * MAX_REJECTIONS_PER_SLOT;
        while next.len() < size {
            if rejected >= max_rejections {
                tracing::warn!(
                    "GA: {} offspring rejected at generation {}; filling {} slots with immigrants",
                    rejected,
                    self.generation,
                    size - next.len()
                );
                while next.len() < size {
                    next.push(Solution::new(Allocation::random(k, n, &mut self.rng)?));
                }
                break;
            }

            let p1 = tournament(&self.population, self.config.tournament_size, &mut self.rng);
            let p2 = tournament(&self.population, self.config.tournament_size, &mut self.rng);
            let children = crossover(
                self.population[p1].allocation(),
                self.population[p2].allocation(),
                n,
                self.config.crossover_rate,
                &mut self.rng,
            );

            for child in children {
                if next.len() >= size {
                    break;
                }
                let accepted = child.and_then(|mut alloc| {
                    mutate(
                        &mut alloc,
                        self.config.mutation_rate,
                        force_diversity,
                        &mut self.rng,
                    );
                    alloc.validate(k, n).map(|()| alloc)
                });
                match accepted {
                    Ok(alloc) => next.push(Solution::new(alloc)),
                    Err(err) => {
                        rejected += 1;
                        tracing::trace!("GA: offspring rejected: {}", err);
                    }
                }
            }
        }

        let immigrants = if force_diversity {
            self.config.low_diversity_immigrants
        } else {
            self.config.immigrants
        };
        for _ in 0..immigrants {
            if next.len() > elite_count + 1 {
                let slot = self.rng.random_range(elite_count..next.len());
                next[slot] = Solution::new(Allocation::random(k, n, &mut self.rng)?);
            }
        }

        evaluate_all(&self.evaluator, &mut next, self.config.parallel);
        sort_best_first(&mut next);
        self.population = next;

        let improved = match (self.population.first(), self.best.as_ref()) {
            (Some(top), Some(best)) => top.fitness() > best.fitness(),
            (Some(_), None) => true,
            _ => false,
        };
        if improved {
            self.best = self.population.first().cloned();
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }

        let stats = self.stats(force_diversity);
        self.history.push(stats);
        self.generation += 1;
        Ok(stats)
    }

    fn stats(&self, force_diversity: bool) -> GenerationStats {
        let count = self.population.len().max(1) as f64;
        let (best_fitness, best_roi, best_cost) = self
            .best
            .as_ref()
            .map_or((f64::NEG_INFINITY, 0.0, 0.0), |b| {
                (b.fitness(), b.total_roi(), b.total_cost())
            });
        GenerationStats {
            generation: self.generation,
            best_fitness,
            best_roi,
            best_cost,
            avg_fitness: self.population.iter().map(Solution::fitness).sum::<f64>() / count,
            avg_roi: self.population.iter().map(Solution::total_roi).sum::<f64>() / count,
            diversity: population_diversity(&self.population),
            force_diversity,
        }
    }

    /// Runs the configured number of generations.
    pub fn run(self) -> Result<GaResult> {
        self.run_with_cancel(None)
    }

    /// Runs with an optional cancellation token.
    ///
    /// The flag and the time limit are checked between generations; the
    /// best solution so far is returned either way.
    #[tracing::instrument(level = "debug", name = "GA Search", skip(self, cancel))]
    pub fn run_with_cancel(mut self, cancel: Option<Arc<AtomicBool>>) -> Result<GaResult> {
        let start = Instant::now();
        let (k, n) = self.dims();
        tracing::info!(
            "GA: {} campaigns, {} ads, population {}, {} generations",
            k,
            n,
            self.config.population_size,
            self.config.max_generations
        );

        self.initialize()?;
        let mut fitness_history = Vec::with_capacity(self.config.max_generations + 1);
        fitness_history.push(self.best.as_ref().map_or(f64::NEG_INFINITY, Solution::fitness));

        let mut cancelled = false;
        let mut timed_out = false;
        for gen in 0..self.config.max_generations {
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

            let stats = self.evolve()?;
            fitness_history.push(stats.best_fitness);

            if gen % 10 == 0 || gen + 1 == self.config.max_generations {
                tracing::debug!(
                    "GA: gen {:3} | ROI {:7.2}% | fitness {:8.3} | cost {:.0} | avg ROI {:7.2}% | div {:5.2}%",
                    gen,
                    stats.best_roi * 100.0,
                    stats.best_fitness,
                    stats.best_cost,
                    stats.avg_roi * 100.0,
                    stats.diversity * 100.0
                );
            }
        }

        let best = self.best.take().ok_or_else(|| {
            SearchError::InvalidConfig("population produced no individual".into())
        })?;
        tracing::info!(
            "GA: finished after {} generations, best fitness {:.4}, ROI {:.2}%",
            self.generation,
            best.fitness(),
            best.total_roi() * 100.0
        );

        Ok(GaResult {
            best_fitness: best.fitness(),
            best,
            generations: self.generation,
            cancelled,
            timed_out,
            fitness_history,
            history: self.history,
        })
    }
}

/// Executes the GA with a seeded [`StdRng`].
///
/// # Usage
///
/// ```ignore
/// let store = EntityStore::new(campaigns, ads)?;
/// let evaluator = FitnessEvaluator::new(&store, 50_000.0, 0.5)?;
/// let config = GaConfig::default().with_seed(42);
/// let result = GaRunner::run(evaluator, &config)?;
/// println!("Best fitness: {}", result.best_fitness);
/// ```
pub struct GaRunner;

impl GaRunner {
    /// Runs the GA optimization.
    pub fn run(evaluator: FitnessEvaluator<'_>, config: &GaConfig) -> Result<GaResult> {
        Self::run_with_cancel(evaluator, config, None)
    }

    /// Runs the GA with an optional cancellation token.
    ///
    /// If `cancel` is `Some` and the flag is set to `true`, the GA stops
    /// before the next generation and returns the best solution found so
    /// far.
    pub fn run_with_cancel(
        evaluator: FitnessEvaluator<'_>,
        config: &GaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<GaResult> {
        let rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        GeneticAlgorithm::new(evaluator, config.clone(), rng)?.run_with_cancel(cancel)
    }
}

/// Distinct allocations divided by population size, in `[0, 1]`.
///
/// Allocations are compared by [`Signature`](crate::model::Signature), so
/// list order inside a campaign does not count as diversity.
pub fn population_diversity(population: &[Solution]) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<_> = population
        .iter()
        .map(|s| s.allocation().signature())
        .collect();
    distinct.len() as f64 / population.len() as f64
}

/// Sorts by fitness, best (highest) first.
fn sort_best_first(population: &mut [Solution]) {
    population.sort_by(|a, b| {
        b.fitness()
            .partial_cmp(&a.fitness())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Evaluates every individual without a cached evaluation.
#[cfg(feature = "parallel")]
fn evaluate_all(evaluator: &FitnessEvaluator<'_>, population: &mut [Solution], parallel: bool) {
    use rayon::prelude::*;

    if parallel {
        population
            .par_iter_mut()
            .filter(|s| !s.is_evaluated())
            .for_each(|s| {
                evaluator.evaluate_solution(s);
            });
    } else {
        for s in population.iter_mut().filter(|s| !s.is_evaluated()) {
            evaluator.evaluate_solution(s);
        }
    }
}

/// Evaluates every individual without a cached evaluation.
#[cfg(not(feature = "parallel"))]
fn evaluate_all(evaluator: &FitnessEvaluator<'_>, population: &mut [Solution], _parallel: bool) {
    for s in population.iter_mut().filter(|s| !s.is_evaluated()) {
        evaluator.evaluate_solution(s);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ad, Campaign, EntityStore};

    /// Campaigns with different click volumes and ads with spread-out ROI,
    /// so allocations differ in fitness.
    fn store(k: usize, n: usize) -> EntityStore {
        let campaigns = (0..k)
            .map(|i| {
                Campaign::new(
                    100 + i as u64,
                    1_000.0,
                    50.0 * i as f64,
                    200.0,
                    100.0 + 40.0 * i as f64,
                )
            })
            .collect();
        let ads = (0..n)
            .map(|j| {
                Ad::new(
                    j as u64 + 1,
                    0.5 + 0.1 * (j % 7) as f64,
                    1.0 + 0.5 * (j % 5) as f64,
                    0.05 + 0.02 * (j % 4) as f64,
                )
            })
            .collect();
        EntityStore::new(campaigns, ads).unwrap()
    }

    fn engine<'a>(
        evaluator: FitnessEvaluator<'a>,
        config: GaConfig,
        seed: u64,
    ) -> GeneticAlgorithm<'a, StdRng> {
        GeneticAlgorithm::new(evaluator, config, StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_infeasible_fails_before_population() {
        let store = store(3, 2);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.0).unwrap();
        let err = GeneticAlgorithm::new(evaluator, GaConfig::default(), StdRng::seed_from_u64(1))
            .err()
            .unwrap();
        assert_eq!(err, SearchError::InfeasibleProblem { campaigns: 3, ads: 2 });
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = store(2, 4);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.0).unwrap();
        let config = GaConfig::default().with_population_size(1);
        assert!(matches!(
            GeneticAlgorithm::new(evaluator, config, StdRng::seed_from_u64(1)),
            Err(SearchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_every_individual_stays_valid() {
        let store = store(4, 20);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.5).unwrap();
        let config = GaConfig::default().with_population_size(30);
        let mut ga = engine(evaluator, config, 42);
        ga.initialize().unwrap();

        for _ in 0..15 {
            ga.evolve().unwrap();
            assert_eq!(ga.population().len(), 30);
            for ind in ga.population() {
                assert!(ind.allocation().validate(4, 20).is_ok());
                assert!(ind.is_evaluated());
            }
        }
    }

    #[test]
    fn test_population_sorted_best_first() {
        let store = store(3, 12);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.2).unwrap();
        let mut ga = engine(evaluator, GaConfig::default().with_population_size(20), 3);
        ga.evolve().unwrap();
        for pair in ga.population().windows(2) {
            assert!(pair[0].fitness() >= pair[1].fitness());
        }
    }

    #[test]
    fn test_best_is_monotone_and_independent() {
        let store = store(3, 15);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.3).unwrap();
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(30)
            .with_seed(7);
        let result = GaRunner::run(evaluator, &config).unwrap();

        for pair in result.fitness_history.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert_eq!(result.generations, 30);
        assert_eq!(result.fitness_history.len(), 31);
        assert_eq!(result.history.len(), 30);
        // The snapshot's cached score matches a fresh evaluation.
        let fresh = evaluator.evaluate(result.best.allocation());
        assert_eq!(fresh.fitness, result.best_fitness);
        assert!(result.best.allocation().is_valid(3, 15));
    }

    #[test]
    fn test_improves_on_initial_population() {
        let store = store(4, 24);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.5).unwrap();
        let config = GaConfig::default()
            .with_population_size(40)
            .with_max_generations(60)
            .with_seed(11);
        let result = GaRunner::run(evaluator, &config).unwrap();
        let initial = result.fitness_history[0];
        assert!(result.best_fitness >= initial);
        assert!(!result.cancelled);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let store = store(3, 10);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.1).unwrap();
        let config = GaConfig::default()
            .with_population_size(16)
            .with_max_generations(20)
            .with_seed(99);
        let a = GaRunner::run(evaluator, &config).unwrap();
        let b = GaRunner::run(evaluator, &config).unwrap();
        assert_eq!(a.best_fitness, b.best_fitness);
        assert_eq!(
            a.best.allocation().signature(),
            b.best.allocation().signature()
        );
        assert_eq!(a.fitness_history, b.fitness_history);
    }

    #[test]
    fn test_force_diversity_on_clone_population() {
        let store = store(3, 15);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.0).unwrap();
        let mut ga = engine(evaluator, GaConfig::default().with_population_size(20), 5);
        ga.initialize().unwrap();

        let clone = ga.population()[0].clone();
        ga.population = vec![clone; 20];
        assert!(population_diversity(ga.population()) < 0.1);

        let stats = ga.evolve().unwrap();
        assert!(stats.force_diversity);
        assert!(stats.diversity > 0.1);
        for ind in ga.population() {
            assert!(ind.allocation().is_valid(3, 15));
        }
    }

    #[test]
    fn test_stagnation_counter() {
        // A single campaign admits one allocation, so nothing ever improves.
        let store = store(1, 3);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.0).unwrap();
        let mut ga = engine(evaluator, GaConfig::default().with_population_size(4), 1);
        ga.initialize().unwrap();
        for expected in 1..=5 {
            ga.evolve().unwrap();
            assert_eq!(ga.stagnation(), expected);
        }
    }

    #[test]
    fn test_cancellation() {
        let store = store(2, 6);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.0).unwrap();
        let config = GaConfig::default()
            .with_population_size(10)
            .with_max_generations(1_000)
            .with_seed(42);

        let cancel = Arc::new(AtomicBool::new(true));
        let result = GaRunner::run_with_cancel(evaluator, &config, Some(cancel)).unwrap();
        assert!(result.cancelled, "expected cancelled result");
        assert_eq!(result.generations, 0);
        assert!(result.best.allocation().is_valid(2, 6));
    }

    #[test]
    fn test_population_diversity() {
        let a = Solution::new(Allocation::from_slots(vec![vec![0, 1], vec![2]]));
        let b = Solution::new(Allocation::from_slots(vec![vec![1, 0], vec![2]]));
        let c = Solution::new(Allocation::from_slots(vec![vec![0], vec![1, 2]]));
        assert_eq!(population_diversity(&[]), 0.0);
        assert_eq!(population_diversity(&[a.clone(), b.clone()]), 0.5);
        assert!((population_diversity(&[a, b, c]) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_evaluation_matches_sequential() {
        let store = store(3, 12);
        let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.2).unwrap();
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(10)
            .with_seed(8);
        let sequential = GaRunner::run(evaluator, &config).unwrap();
        let parallel = GaRunner::run(evaluator, &config.clone().with_parallel(true)).unwrap();
        // Evaluation draws no randomness, so the trajectories coincide.
        assert_eq!(sequential.fitness_history, parallel.fitness_history);
    }
}
