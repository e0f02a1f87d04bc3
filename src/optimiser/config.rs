//! Optimiser configuration.
//!
//! [`OptimiserConfig`] holds every parameter of a run. It is stored as
//! `config.json` next to a disk-backed history.

use crate::error::{Error, Result};
use crate::individual::{Blueprint, ColLimits, RowLimits};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for [`DataOptimiser`](super::DataOptimiser).
///
/// # Defaults
///
/// ```
/// use u_datasynth::OptimiserConfig;
///
/// let config = OptimiserConfig::default();
/// assert_eq!(config.size, 100);
/// assert_eq!(config.max_iter, 100);
/// assert!(!config.maximise);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_datasynth::{ColLimits, OptimiserConfig};
///
/// let config = OptimiserConfig::default()
///     .with_size(50)
///     .with_row_limits(10, 50)
///     .with_col_limits(ColLimits::per_family(vec![1, 0], vec![2, 3]))
///     .with_best_prop(0.2)
///     .with_shrinkage(0.9)
///     .with_seed(42);
/// assert!(config.validate(2).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimiserConfig {
    /// Number of individuals per generation.
    pub size: usize,

    /// Bounds on the number of rows of every individual.
    pub row_limits: RowLimits,

    /// Bounds on the number of columns, in total or per family.
    pub col_limits: ColLimits,

    /// Relative weights for picking families. `None` picks uniformly.
    pub weights: Option<Vec<f64>>,

    /// Maximum number of generations after the initial one.
    pub max_iter: usize,

    /// Proportion of each generation kept as the fittest parents.
    pub best_prop: f64,

    /// Proportion of each generation kept as randomly chosen parents.
    pub lucky_prop: f64,

    /// Probability that crossover takes each dimension from the first parent.
    pub crossover_prob: f64,

    /// Initial probability of each mutation step.
    ///
    /// A dwindle hook may change it between generations.
    pub mutation_prob: f64,

    /// Ratio in `(0, 1)` by which subtype limits shrink each generation.
    ///
    /// `None` disables shrinking.
    pub shrinkage: Option<f64>,

    /// Whether larger fitness is better.
    pub maximise: bool,

    /// Seed of the master stream. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Fitness worker threads. `None` evaluates on the calling thread.
    pub workers: Option<usize>,

    /// Directory to write every generation to. `None` keeps the history in
    /// memory.
    pub root: Option<PathBuf>,
}

impl Default for OptimiserConfig {
    fn default() -> Self {
        Self {
            size: 100,
            row_limits: RowLimits::new(1, 10),
            col_limits: ColLimits::total(1, 5),
            weights: None,
            max_iter: 100,
            best_prop: 0.25,
            lucky_prop: 0.0,
            crossover_prob: 0.5,
            mutation_prob: 0.01,
            shrinkage: None,
            maximise: false,
            seed: None,
            workers: None,
            root: None,
        }
    }
}

impl OptimiserConfig {
    /// Sets the population size.
    pub fn with_size(mut self, n: usize) -> Self {
        self.size = n;
        self
    }

    /// Sets the row limits.
    pub fn with_row_limits(mut self, min: usize, max: usize) -> Self {
        self.row_limits = RowLimits::new(min, max);
        self
    }

    /// Sets the column limits.
    pub fn with_col_limits(mut self, limits: ColLimits) -> Self {
        self.col_limits = limits;
        self
    }

    /// Sets the family weights.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Sets the maximum number of generations.
    pub fn with_max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }

    /// Sets the proportion of best parents.
    pub fn with_best_prop(mut self, prop: f64) -> Self {
        self.best_prop = prop.clamp(0.0, 1.0);
        self
    }

    /// Sets the proportion of lucky parents.
    pub fn with_lucky_prop(mut self, prop: f64) -> Self {
        self.lucky_prop = prop.clamp(0.0, 1.0);
        self
    }

    /// Sets the crossover probability.
    pub fn with_crossover_prob(mut self, prob: f64) -> Self {
        self.crossover_prob = prob.clamp(0.0, 1.0);
        self
    }

    /// Sets the initial mutation probability.
    pub fn with_mutation_prob(mut self, prob: f64) -> Self {
        self.mutation_prob = prob.clamp(0.0, 1.0);
        self
    }

    /// Enables shrinking with the given ratio.
    ///
    /// The ratio is not clamped; [`validate`](Self::validate) rejects values
    /// outside `(0, 1)`.
    pub fn with_shrinkage(mut self, ratio: f64) -> Self {
        self.shrinkage = Some(ratio);
        self
    }

    /// Sets whether fitness is maximised.
    pub fn with_maximise(mut self, maximise: bool) -> Self {
        self.maximise = maximise;
        self
    }

    /// Sets the master seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the number of fitness worker threads.
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    /// Writes the history under `root` instead of keeping it in memory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Limits and weights individuals are built from.
    pub fn blueprint(&self) -> Blueprint<'_> {
        Blueprint {
            row_limits: self.row_limits,
            col_limits: &self.col_limits,
            weights: self.weights.as_deref(),
        }
    }

    /// Number of best and lucky parents selected each generation.
    pub fn parent_counts(&self) -> (usize, usize) {
        let size = self.size as f64;
        (
            (self.best_prop * size).floor() as usize,
            (self.lucky_prop * size).floor() as usize,
        )
    }

    /// Validates the configuration for `n_families` families.
    ///
    /// Returns [`Error::Config`] describing the first invalid parameter.
    pub fn validate(&self, n_families: usize) -> Result<()> {
        if self.size < 2 {
            return Err(Error::Config("size must be at least 2".into()));
        }
        if n_families == 0 {
            return Err(Error::Config("at least one family is required".into()));
        }
        self.row_limits.validate()?;
        self.col_limits.validate(n_families)?;

        if let Some(weights) = &self.weights {
            if weights.len() != n_families {
                return Err(Error::Config(format!(
                    "{} weights given for {n_families} families",
                    weights.len()
                )));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || !weights.iter().any(|&w| w > 0.0) {
                return Err(Error::Config(
                    "weights must be non-negative, finite and not all zero".into(),
                ));
            }
        }

        for (name, p) in [
            ("best_prop", self.best_prop),
            ("lucky_prop", self.lucky_prop),
            ("crossover_prob", self.crossover_prob),
            ("mutation_prob", self.mutation_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!("{name} must lie in [0, 1], got {p}")));
            }
        }
        if self.best_prop + self.lucky_prop > 1.0 {
            return Err(Error::Config(
                "best_prop + lucky_prop must not exceed 1".into(),
            ));
        }
        if self.parent_counts() == (0, 0) {
            return Err(Error::Config(format!(
                "best_prop and lucky_prop select no parents from {} individuals",
                self.size
            )));
        }

        if let Some(k) = self.shrinkage {
            if !(k > 0.0 && k < 1.0) {
                return Err(Error::Config(format!(
                    "shrinkage must lie strictly between 0 and 1, got {k}"
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        Ok(())
    }
}
