//! Tabu Search (TS).
//!
//! A single-solution trajectory metaheuristic that uses memory structures
//! (the tabu list) to forbid recently executed moves, preventing cycling
//! and encouraging exploration of new regions of the search space.
//! Stagnation drives two escalation steps: intensification around the best
//! solution and diversification away from the current one.
//!
//! # References
//!
//! - Glover, F. (1989). "Tabu Search—Part I", *ORSA Journal on Computing* 1(3), 190-206.
//! - Glover, F. (1990). "Tabu Search—Part II", *ORSA Journal on Computing* 2(1), 4-32.

mod config;
mod memory;
pub mod neighborhood;
mod runner;
mod types;

pub use config::TabuConfig;
pub use memory::TabuMemory;
pub use runner::{StepOutcome, TabuResult, TabuRunner, TabuSearch};
pub use types::{IterationStats, Move};
