//! Evolutionary synthesis of artificial tabular datasets.
//!
//! Given a fitness function over tables, the optimiser evolves a population of
//! datasets whose columns are sampled from families of statistical
//! distributions:
//!
//! - **Distributions**: parameterised samplers producing one column each
//!   (Bernoulli, Gamma, Normal, Poisson, Uniform, or your own
//!   [`distributions::Distribution`]).
//! - **Families**: registries of subtypes (parameter-limit regions) for one
//!   distribution, with capacity limits and a disk cache.
//! - **Individuals**: a table plus the instance that produced each column and
//!   the individual's own random stream.
//! - **Operators**: crossover, mutation, selection and shrink.
//! - **Optimiser**: memoised, optionally parallel fitness evaluation, per-slot
//!   reproducible streams, subtype pruning and shrinkage, with an in-memory or
//!   resumable disk-backed history.
//!
//! # Reproducibility
//!
//! All randomness flows from the master seed in [`OptimiserConfig`]. Slot
//! and family streams are derived from it, so two runs with the same seed and
//! families produce the same history, whatever the number of workers.

pub mod distributions;
pub mod error;
pub mod family;
pub mod fitness;
pub mod individual;
pub mod operators;
pub mod optimiser;
mod persist;
pub mod population;
pub mod random;
pub mod table;

pub use error::{BoxError, Error, Result};
pub use family::{Family, Subtype};
pub use fitness::{Evaluator, Fallible, FitnessCache, FitnessFunction};
pub use individual::{create_individual, Blueprint, ColBound, ColLimits, Individual, RowLimits};
pub use optimiser::{DataOptimiser, FitnessRecord, History, OptimiserConfig, OptimiserResult, RunState};
pub use persist::FORMAT_VERSION;
pub use table::{Column, DType, Table};
