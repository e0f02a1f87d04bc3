//! The optimisation loop.
//!
//! - [`OptimiserConfig`]: run parameters with builder methods
//! - [`DataOptimiser`]: runs and resumes the loop
//! - [`History`]: every generation, in memory or under a root directory

mod config;
mod history;
mod runner;

pub use config::OptimiserConfig;
pub use history::{read_fitness, write_fitness, write_generation, FitnessRecord, History};
pub use runner::{DataOptimiser, DwindleFn, OptimiserResult, RunState, StopFn};
