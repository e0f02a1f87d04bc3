//! Structural limits on an individual's shape.

use crate::error::{Error, Result};
use crate::random::Stream;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive bounds on the number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLimits {
    pub min: usize,
    pub max: usize,
}

impl RowLimits {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, nrows: usize) -> bool {
        self.min <= nrows && nrows <= self.max
    }

    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(Error::Config(format!(
                "row limits [{}, {}] are reversed",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub(crate) fn draw(&self, rng: &mut Stream) -> usize {
        rng.random_range(self.min..=self.max)
    }
}

/// One side of the column limits: either a bound on the total number of
/// columns, or a bound per family (one entry per family, in family order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColBound {
    Total(usize),
    PerFamily(Vec<usize>),
}

impl ColBound {
    /// The bound on the total number of columns. A per-family bound
    /// aggregates to the sum of its entries.
    pub fn aggregate(&self) -> usize {
        match self {
            ColBound::Total(n) => *n,
            ColBound::PerFamily(v) => v.iter().sum(),
        }
    }

    fn per_family(&self, i: usize) -> Option<usize> {
        match self {
            ColBound::Total(_) => None,
            ColBound::PerFamily(v) => v.get(i).copied(),
        }
    }
}

/// Lower and upper bounds on the number of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColLimits {
    pub lower: ColBound,
    pub upper: ColBound,
}

impl ColLimits {
    pub fn new(lower: ColBound, upper: ColBound) -> Self {
        Self { lower, upper }
    }

    /// Bounds on the total number of columns only.
    pub fn total(min: usize, max: usize) -> Self {
        Self::new(ColBound::Total(min), ColBound::Total(max))
    }

    /// Per-family minimum and maximum column counts.
    pub fn per_family(min: Vec<usize>, max: Vec<usize>) -> Self {
        Self::new(ColBound::PerFamily(min), ColBound::PerFamily(max))
    }

    /// `(min, max)` total column counts.
    pub fn aggregate(&self) -> (usize, usize) {
        (self.lower.aggregate(), self.upper.aggregate())
    }

    /// Minimum number of columns family `i` must contribute.
    pub fn min_for(&self, i: usize) -> usize {
        self.lower.per_family(i).unwrap_or(0)
    }

    /// Maximum number of columns family `i` may contribute, if bounded.
    pub fn max_for(&self, i: usize) -> Option<usize> {
        self.upper.per_family(i)
    }

    /// Whether family `i` may contribute one more column given `count`.
    pub(crate) fn has_room(&self, i: usize, count: usize) -> bool {
        self.max_for(i).map_or(true, |max| count < max)
    }

    /// Checks the limits against the number of families in use.
    pub fn validate(&self, n_families: usize) -> Result<()> {
        for (side, bound) in [("lower", &self.lower), ("upper", &self.upper)] {
            if let ColBound::PerFamily(v) = bound {
                if v.len() != n_families {
                    return Err(Error::Config(format!(
                        "{side} column limit has {} entries for {n_families} families",
                        v.len()
                    )));
                }
            }
        }

        let (min, max) = self.aggregate();
        if min > max {
            return Err(Error::Config(format!(
                "column limits [{min}, {max}] are reversed"
            )));
        }

        for i in 0..n_families {
            if let Some(max) = self.max_for(i) {
                if self.min_for(i) > max {
                    return Err(Error::Config(format!(
                        "family {i} needs at least {} columns but allows at most {max}",
                        self.min_for(i)
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Everything needed to build an individual from scratch.
#[derive(Debug, Clone, Copy)]
pub struct Blueprint<'a> {
    pub row_limits: RowLimits,
    pub col_limits: &'a ColLimits,
    /// Relative family weights; uniform if `None`.
    pub weights: Option<&'a [f64]>,
}
