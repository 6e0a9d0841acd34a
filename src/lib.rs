//! Ad-to-campaign allocation under a budget ceiling.
//!
//! Every ad goes to exactly one campaign and every campaign receives at
//! least one ad. Allocations are scored by an ROI-weighted fitness with a
//! balance penalty and an over-budget penalty, and searched by two engines:
//!
//! - **Genetic Algorithm (GA)**: elitist population search with tournament
//!   selection, three crossover and three mutation operators, repair of
//!   broken offspring and a diversity-driven escalation mode.
//! - **Tabu Search (TS)**: single-trajectory search over relocation, swap
//!   and bundle moves with a tabu list, aspiration, and stagnation-driven
//!   intensification and diversification.
//!
//! # Architecture
//!
//! [`model`] holds the entities, the allocation representation and the
//! fitness function shared by both engines. [`ga`] and [`tabu`] each expose
//! a stateful search (`GeneticAlgorithm`, `TabuSearch`) and a one-shot
//! runner. [`search`] wraps the whole pipeline into one call per engine.
//!
//! Search is randomized. A seed in the engine configuration makes a run
//! reproducible; without one, runs draw from OS entropy.

pub mod error;
pub mod ga;
pub mod model;
pub mod search;
pub mod tabu;

pub use error::{AllocationError, Result, SearchError};
pub use model::{Ad, BestSolution, Campaign, EntityStore, FitnessEvaluator};
pub use search::{run_genetic_search, run_tabu_search};
