//! GA configuration.
//!
//! [`GaConfig`] holds all parameters that control the evolutionary loop.

use crate::error::{Result, SearchError};

/// Two elites plus one offspring slot.
const MIN_POPULATION_SIZE: usize = 3;

/// Configuration for the Genetic Algorithm.
///
/// Controls population size, operator rates, elitism under normal and
/// low-diversity conditions, termination and parallelism.
///
/// # Defaults
///
/// ```
/// use u_adalloc::ga::GaConfig;
///
/// let config = GaConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.max_generations, 250);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_adalloc::ga::GaConfig;
///
/// let config = GaConfig::default()
///     .with_population_size(60)
///     .with_mutation_rate(0.2)
///     .with_crossover_rate(0.8)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GaConfig {
    /// Number of individuals in the population.
    ///
    /// At least 3: two elites are always kept, and one slot must remain for
    /// offspring.
    pub population_size: usize,

    /// Number of generations to run. There is no convergence-based exit.
    pub max_generations: usize,

    /// Base mutation intensity (0.0–1.0).
    ///
    /// Scales both how many ads a mutation touches and the probability of
    /// each touch. Tripled (capped at 0.6) in low-diversity generations.
    pub mutation_rate: f64,

    /// Probability of recombining a parent pair (0.0–1.0).
    ///
    /// When crossover is not applied, both parents pass through as clones.
    pub crossover_rate: f64,

    /// Number of individuals sampled per tournament.
    pub tournament_size: usize,

    /// Fraction of the population carried over unchanged (at least 2).
    pub elite_ratio: f64,

    /// Elite fraction used in low-diversity generations (at least 1).
    pub low_diversity_elite_ratio: f64,

    /// Diversity (distinct allocations / population size) below which a
    /// generation runs in force-diversity mode.
    pub diversity_threshold: f64,

    /// Random immigrants injected per generation.
    pub immigrants: usize,

    /// Random immigrants injected per low-diversity generation.
    pub low_diversity_immigrants: usize,

    /// Whether to evaluate offspring in parallel using rayon.
    ///
    /// Only effective with the `parallel` feature.
    pub parallel: bool,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed.
    pub seed: Option<u64>,

    /// Optional wall-clock time limit in milliseconds.
    ///
    /// Checked between generations; the best solution so far is returned.
    pub time_limit_ms: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 250,
            mutation_rate: 0.15,
            crossover_rate: 0.85,
            tournament_size: 3,
            elite_ratio: 0.15,
            low_diversity_elite_ratio: 0.10,
            diversity_threshold: 0.1,
            immigrants: 1,
            low_diversity_immigrants: 3,
            parallel: false,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl GaConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the number of generations.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the tournament size.
    pub fn with_tournament_size(mut self, k: usize) -> Self {
        self.tournament_size = k;
        self
    }

    /// Sets the normal elite ratio.
    pub fn with_elite_ratio(mut self, ratio: f64) -> Self {
        self.elite_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Sets the diversity threshold for force-diversity mode.
    pub fn with_diversity_threshold(mut self, threshold: f64) -> Self {
        self.diversity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the wall-clock time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Elites kept in a generation.
    pub(crate) fn elite_count(&self, force_diversity: bool) -> usize {
        let n = self.population_size as f64;
        let count = if force_diversity {
            ((n * self.low_diversity_elite_ratio) as usize).max(1)
        } else {
            ((n * self.elite_ratio) as usize).max(2)
        };
        count.min(self.population_size)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.population_size < MIN_POPULATION_SIZE {
            return Err(invalid("population_size must be at least 3"));
        }
        if self.max_generations == 0 {
            return Err(invalid("max_generations must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(invalid("mutation_rate must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(invalid("crossover_rate must be within [0, 1]"));
        }
        if self.tournament_size == 0 {
            return Err(invalid("tournament_size must be at least 1"));
        }
        if self.elite_count(false) >= self.population_size
            || self.elite_count(true) >= self.population_size
        {
            return Err(invalid("elite ratio too high: elites fill entire population"));
        }
        if self.time_limit_ms == Some(0) {
            return Err(invalid("time_limit_ms must be positive or None"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SearchError {
    SearchError::InvalidConfig(msg.into())
}
