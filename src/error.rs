//! Crate-wide error type.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by a failing fitness function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring, running or persisting an optimisation.
///
/// Every variant halts the current operation; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// An invalid parameter was supplied (limits, proportions, ratios).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A family cannot hold any more subtypes.
    #[error("family '{family}' cannot create a subtype (max_subtypes = {max})")]
    Capacity { family: String, max: usize },

    /// A per-family column request cannot be met from what is available.
    #[error("column constraint cannot be satisfied: {0}")]
    Constraint(String),

    /// A distribution was asked to sample with unusable parameters.
    #[error("distribution '{name}' cannot sample: {reason}")]
    Distribution { name: String, reason: String },

    /// Persisted metadata refers to a family that was not supplied.
    #[error("unknown family '{0}'")]
    UnknownFamily(String),

    /// A persisted blob was written by an incompatible format version.
    #[error("unsupported format version {found} in {path:?} (expected {expected})")]
    FormatVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// Persisted data is structurally wrong.
    #[error("corrupt data in {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The fitness function failed for one individual.
    #[error("fitness evaluation failed for individual {index}: {source}")]
    Fitness {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// The evaluation worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
