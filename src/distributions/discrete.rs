//! Built-in discrete distributions.

use super::types::{scalar_param, Distribution, ParamLimits, ParamRange, Params};
use crate::error::{Error, Result};
use crate::random::Stream;
use crate::table::{Column, DType};
use rand::Rng;

/// Bernoulli distribution (one binomial trial) with success probability
/// `prob` in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bernoulli;

impl Distribution for Bernoulli {
    fn name(&self) -> &str {
        "Bernoulli"
    }

    fn dtype(&self) -> DType {
        DType::Int
    }

    fn hard_limits(&self) -> ParamLimits {
        ParamLimits::from([("prob".to_string(), ParamRange::new(0.0, 1.0))])
    }

    fn sample(&self, params: &Params, nrows: usize, rng: &mut Stream) -> Result<Column> {
        let prob = scalar_param(self, params, "prob")?;
        let dist = rand_distr::Bernoulli::new(prob).map_err(|e| Error::Distribution {
            name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Column::Int(
            (0..nrows).map(|_| i64::from(rng.sample(dist))).collect(),
        ))
    }
}

/// Poisson distribution with rate `lam` in `[0, 10]`.
///
/// A zero rate yields a column of zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poisson;

impl Distribution for Poisson {
    fn name(&self) -> &str {
        "Poisson"
    }

    fn dtype(&self) -> DType {
        DType::Int
    }

    fn hard_limits(&self) -> ParamLimits {
        ParamLimits::from([("lam".to_string(), ParamRange::new(0.0, 10.0))])
    }

    fn sample(&self, params: &Params, nrows: usize, rng: &mut Stream) -> Result<Column> {
        let lam = scalar_param(self, params, "lam")?;
        if lam <= 0.0 {
            return Ok(Column::Int(vec![0; nrows]));
        }
        let dist = rand_distr::Poisson::new(lam).map_err(|e| Error::Distribution {
            name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Column::Int(
            (0..nrows)
                .map(|_| {
                    let x: f64 = rng.sample(&dist);
                    x as i64
                })
                .collect(),
        ))
    }
}
