//! Genetic Algorithm engine.
//!
//! Evolves a population of [`Allocation`](crate::model::Allocation)s with
//! tournament selection, three crossover schemes followed by repair,
//! mutation and diversity-aware elitism.
//!
//! # Key Types
//!
//! - [`GaConfig`]: Algorithm parameters (population size, rates, elitism)
//! - [`GeneticAlgorithm`]: The engine, advanced one generation at a time
//! - [`GaRunner`]: Seeded execution with cancellation and a time limit
//! - [`GaResult`]: Final optimization result with statistics
//!
//! # Submodules
//!
//! - [`operators`]: Crossover and mutation on allocations
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - Grefenstette (1992), "Genetic Algorithms for Changing Environments"
//!   (random immigrants)

mod config;
pub mod operators;
mod runner;
mod selection;
mod types;

pub use config::GaConfig;
pub use runner::{population_diversity, GaResult, GaRunner, GeneticAlgorithm};
pub use selection::tournament;
pub use types::GenerationStats;
