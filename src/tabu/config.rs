//! Tabu Search configuration.

use crate::error::{Result, SearchError};

/// Configuration parameters for Tabu Search.
///
/// # Examples
///
/// ```
/// use u_adalloc::tabu::TabuConfig;
///
/// let config = TabuConfig::default()
///     .with_max_iterations(1000)
///     .with_tabu_tenure(7)
///     .with_aspiration(true);
/// assert_eq!(config.max_iterations, 1000);
/// assert_eq!(config.tabu_tenure, 7);
/// ```
#[derive(Debug, Clone)]
pub struct TabuConfig {
    /// Number of main-loop iterations.
    pub max_iterations: usize,
    /// How many iterations a move stays in the tabu list.
    pub tabu_tenure: usize,
    /// Neighbors sampled per iteration.
    pub neighborhood_size: usize,
    /// Whether to use aspiration criterion (override tabu if the move
    /// produces a new global best).
    pub aspiration: bool,
    /// Intensify whenever the stagnation counter is a positive multiple of
    /// this value.
    pub intensification_threshold: usize,
    /// Diversify once the stagnation counter reaches this value.
    pub diversification_threshold: usize,
    /// Random seed (None for random).
    pub seed: Option<u64>,
    /// Optional wall-clock time limit in milliseconds, checked between
    /// iterations.
    pub time_limit_ms: Option<u64>,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tabu_tenure: 10,
            neighborhood_size: 30,
            aspiration: true,
            intensification_threshold: 50,
            diversification_threshold: 100,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl TabuConfig {
    /// Sets the maximum number of iterations.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Sets the tabu tenure (number of iterations a move remains tabu).
    pub fn with_tabu_tenure(mut self, tenure: usize) -> Self {
        self.tabu_tenure = tenure;
        self
    }

    /// Sets the number of neighbors sampled per iteration.
    pub fn with_neighborhood_size(mut self, n: usize) -> Self {
        self.neighborhood_size = n;
        self
    }

    /// Enables or disables aspiration criterion.
    pub fn with_aspiration(mut self, aspiration: bool) -> Self {
        self.aspiration = aspiration;
        self
    }

    /// Sets the intensification period.
    pub fn with_intensification_threshold(mut self, n: usize) -> Self {
        self.intensification_threshold = n;
        self
    }

    /// Sets the stagnation level that triggers diversification.
    pub fn with_diversification_threshold(mut self, n: usize) -> Self {
        self.diversification_threshold = n;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the wall-clock time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_iterations", self.max_iterations),
            ("tabu_tenure", self.tabu_tenure),
            ("neighborhood_size", self.neighborhood_size),
            ("intensification_threshold", self.intensification_threshold),
            ("diversification_threshold", self.diversification_threshold),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SearchError::InvalidConfig(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        if self.time_limit_ms == Some(0) {
            return Err(SearchError::InvalidConfig(
                "time_limit_ms must be positive or None".into(),
            ));
        }
        Ok(())
    }
}
