//! Weighted choice of a family.

use crate::error::{Error, Result};
use crate::random::Stream;
use rand::distr::weighted::WeightedIndex;
use rand::Rng;

/// Draws family indices, uniformly or by relative weight.
#[derive(Debug, Clone)]
pub(crate) enum FamilyPicker {
    Uniform(usize),
    Weighted {
        index: WeightedIndex<f64>,
        positive: Vec<bool>,
    },
}

impl FamilyPicker {
    /// Builds a picker over `n` families.
    ///
    /// # Errors
    /// [`Error::Config`] if there are no families, or if `weights` has the
    /// wrong length, a negative or non-finite entry, or no positive entry.
    pub(crate) fn new(n: usize, weights: Option<&[f64]>) -> Result<Self> {
        if n == 0 {
            return Err(Error::Config("at least one family is required".into()));
        }
        let Some(weights) = weights else {
            return Ok(FamilyPicker::Uniform(n));
        };
        if weights.len() != n {
            return Err(Error::Config(format!(
                "{} weights given for {n} families",
                weights.len()
            )));
        }
        let index = WeightedIndex::new(weights)
            .map_err(|e| Error::Config(format!("invalid family weights: {e}")))?;
        Ok(FamilyPicker::Weighted {
            index,
            positive: weights.iter().map(|&w| w > 0.0).collect(),
        })
    }

    pub(crate) fn pick(&self, rng: &mut Stream) -> usize {
        match self {
            FamilyPicker::Uniform(n) => rng.random_range(0..*n),
            FamilyPicker::Weighted { index, .. } => rng.sample(index),
        }
    }

    /// Whether family `i` can ever be drawn.
    pub(crate) fn can_pick(&self, i: usize) -> bool {
        match self {
            FamilyPicker::Uniform(n) => i < *n,
            FamilyPicker::Weighted { positive, .. } => positive.get(i).copied().unwrap_or(false),
        }
    }
}
