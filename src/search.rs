//! One-call entry points.
//!
//! Each call builds its own [`EntityStore`], [`FitnessEvaluator`] and random
//! source, so concurrent calls share nothing.
//!
//! ```
//! use u_adalloc::model::{Ad, Campaign};
//! use u_adalloc::ga::GaConfig;
//! use u_adalloc::search::run_genetic_search;
//!
//! let campaigns = vec![
//!     Campaign::new(1, 1_000.0, 0.0, 0.0, 100.0),
//!     Campaign::new(2, 1_000.0, 0.0, 0.0, 100.0),
//! ];
//! let ads = (1..=4).map(|id| Ad::new(id, 1.0, 10.0, 0.2)).collect();
//! let config = GaConfig::default()
//!     .with_population_size(10)
//!     .with_max_generations(5)
//!     .with_seed(1);
//!
//! let best = run_genetic_search(campaigns, ads, 3_000.0, 0.0, &config).unwrap();
//! assert_eq!(best.allocation.values().map(Vec::len).sum::<usize>(), 4);
//! ```

use crate::error::Result;
use crate::ga::{GaConfig, GaRunner};
use crate::model::{Ad, BestSolution, Campaign, EntityStore, FitnessEvaluator};
use crate::tabu::{TabuConfig, TabuRunner};

/// Runs the genetic algorithm and returns the best allocation found.
///
/// # Errors
/// - [`SearchError::InfeasibleProblem`](crate::SearchError::InfeasibleProblem)
///   when there are fewer ads than campaigns
/// - [`SearchError::EmptyInput`](crate::SearchError::EmptyInput),
///   [`SearchError::DuplicateId`](crate::SearchError::DuplicateId) for
///   malformed input
/// - [`SearchError::InvalidConfig`](crate::SearchError::InvalidConfig) for
///   out-of-range parameters
pub fn run_genetic_search(
    campaigns: Vec<Campaign>,
    ads: Vec<Ad>,
    total_budget: f64,
    risk_factor: f64,
    config: &GaConfig,
) -> Result<BestSolution> {
    let store = EntityStore::new(campaigns, ads)?;
    store.ensure_feasible()?;
    let evaluator = FitnessEvaluator::new(&store, total_budget, risk_factor)?;

    let result = GaRunner::run(evaluator, config)?;
    Ok(BestSolution::from_solution(&result.best, &evaluator))
}

/// Runs tabu search and returns the best allocation found.
///
/// # Errors
/// Same as [`run_genetic_search`].
pub fn run_tabu_search(
    campaigns: Vec<Campaign>,
    ads: Vec<Ad>,
    total_budget: f64,
    risk_factor: f64,
    config: &TabuConfig,
) -> Result<BestSolution> {
    let store = EntityStore::new(campaigns, ads)?;
    store.ensure_feasible()?;
    let evaluator = FitnessEvaluator::new(&store, total_budget, risk_factor)?;

    let result = TabuRunner::run(evaluator, config)?;
    Ok(BestSolution::from_solution(&result.best, &evaluator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use std::collections::BTreeSet;

    fn campaigns(k: u64) -> Vec<Campaign> {
        (1..=k)
            .map(|id| Campaign::new(id, 1_000.0, 100.0, 200.0, 150.0 + 25.0 * id as f64))
            .collect()
    }

    fn ads(n: u64) -> Vec<Ad> {
        (1..=n)
            .map(|id| Ad::new(100 + id, 0.5 + 0.1 * (id % 4) as f64, 2.0 + (id % 3) as f64, 0.1))
            .collect()
    }

    fn assert_complete(best: &BestSolution, k: u64, n: u64) {
        let campaign_ids: BTreeSet<u64> = best.allocation.keys().copied().collect();
        assert_eq!(campaign_ids, (1..=k).collect());
        assert!(best.allocation.values().all(|ads| !ads.is_empty()));
        let mut all: Vec<u64> = best.allocation.values().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (101..=100 + n).collect::<Vec<_>>());
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_genetic_search_end_to_end() {
        init_tracing();
        let config = GaConfig::default()
            .with_population_size(30)
            .with_max_generations(25)
            .with_seed(42);
        let best = run_genetic_search(campaigns(4), ads(20), 50_000.0, 0.5, &config).unwrap();
        assert_complete(&best, 4, 20);
        assert_eq!(best.campaign_metrics.len(), 4);
        assert!(best.fitness.is_finite());
    }

    #[test]
    fn test_tabu_search_end_to_end() {
        init_tracing();
        let config = TabuConfig::default()
            .with_max_iterations(40)
            .with_neighborhood_size(15)
            .with_seed(42);
        let best = run_tabu_search(campaigns(4), ads(20), 50_000.0, 0.5, &config).unwrap();
        assert_complete(&best, 4, 20);
        assert!(best.fitness.is_finite());
    }

    #[test]
    fn test_infeasible_problem() {
        let err = run_genetic_search(campaigns(3), ads(2), 10_000.0, 0.0, &GaConfig::default())
            .unwrap_err();
        assert_eq!(err, SearchError::InfeasibleProblem { campaigns: 3, ads: 2 });

        let err = run_tabu_search(campaigns(3), ads(2), 10_000.0, 0.0, &TabuConfig::default())
            .unwrap_err();
        assert!(err.is_infeasible());
    }

    #[test]
    fn test_empty_input() {
        let err = run_tabu_search(Vec::new(), ads(3), 10_000.0, 0.0, &TabuConfig::default())
            .unwrap_err();
        assert!(matches!(err, SearchError::EmptyInput { .. }));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let config = GaConfig::default().with_seed(1);
        assert!(matches!(
            run_genetic_search(campaigns(2), ads(4), 0.0, 0.0, &config),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(matches!(
            run_genetic_search(campaigns(2), ads(4), 1_000.0, -1.0, &config),
            Err(SearchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut dup = ads(3);
        dup.push(Ad::new(101, 1.0, 1.0, 0.1));
        let err = run_genetic_search(campaigns(2), dup, 10_000.0, 0.0, &GaConfig::default())
            .unwrap_err();
        assert_eq!(err, SearchError::DuplicateId { kind: "ad", id: 101 });
    }
}
