//! Built-in continuous distributions.

use super::types::{scalar_param, Distribution, ParamLimits, ParamRange, ParamValue, Params};
use crate::error::{Error, Result};
use crate::random::Stream;
use crate::table::{Column, DType};
use rand::Rng;
use std::collections::BTreeMap;

fn limits(entries: &[(&str, f64, f64)]) -> ParamLimits {
    entries
        .iter()
        .map(|&(name, lo, hi)| (name.to_string(), ParamRange::new(lo, hi)))
        .collect()
}

/// Gamma distribution with shape `alpha` and scale `theta`, both in `[0, 10]`.
///
/// A zero shape or scale yields a column of zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gamma;

impl Distribution for Gamma {
    fn name(&self) -> &str {
        "Gamma"
    }

    fn dtype(&self) -> DType {
        DType::Float
    }

    fn hard_limits(&self) -> ParamLimits {
        limits(&[("alpha", 0.0, 10.0), ("theta", 0.0, 10.0)])
    }

    fn sample(&self, params: &Params, nrows: usize, rng: &mut Stream) -> Result<Column> {
        let alpha = scalar_param(self, params, "alpha")?;
        let theta = scalar_param(self, params, "theta")?;
        if alpha <= 0.0 || theta <= 0.0 {
            return Ok(Column::Float(vec![0.0; nrows]));
        }
        let dist = rand_distr::Gamma::new(alpha, theta).map_err(|e| Error::Distribution {
            name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Column::Float((0..nrows).map(|_| rng.sample(&dist)).collect()))
    }
}

/// Normal distribution with `mean` in `[-10, 10]` and `std` in `[0, 10]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normal;

impl Distribution for Normal {
    fn name(&self) -> &str {
        "Normal"
    }

    fn dtype(&self) -> DType {
        DType::Float
    }

    fn hard_limits(&self) -> ParamLimits {
        limits(&[("mean", -10.0, 10.0), ("std", 0.0, 10.0)])
    }

    fn sample(&self, params: &Params, nrows: usize, rng: &mut Stream) -> Result<Column> {
        let mean = scalar_param(self, params, "mean")?;
        let std = scalar_param(self, params, "std")?;
        let dist = rand_distr::Normal::new(mean, std).map_err(|e| Error::Distribution {
            name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Column::Float((0..nrows).map(|_| rng.sample(&dist)).collect()))
    }
}

/// Uniform distribution on `bounds`, two sorted values drawn from `[-10, 10]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl Distribution for Uniform {
    fn name(&self) -> &str {
        "Uniform"
    }

    fn dtype(&self) -> DType {
        DType::Float
    }

    fn hard_limits(&self) -> ParamLimits {
        limits(&[("bounds", -10.0, 10.0)])
    }

    fn draw_params(&self, limits: &ParamLimits, rng: &mut Stream) -> Params {
        let mut params = BTreeMap::new();
        if let Some(range) = limits.get("bounds") {
            let a = range.draw(rng);
            let b = range.draw(rng);
            let sorted = ParamRange::new(a, b);
            params.insert(
                "bounds".to_string(),
                ParamValue::Vector(vec![sorted.lower, sorted.upper]),
            );
        }
        params
    }

    fn sample(&self, params: &Params, nrows: usize, rng: &mut Stream) -> Result<Column> {
        let bounds = params
            .get("bounds")
            .map(ParamValue::values)
            .filter(|v| v.len() == 2)
            .ok_or_else(|| Error::Distribution {
                name: self.name().to_string(),
                reason: "parameter 'bounds' must hold two values".into(),
            })?;
        let range = ParamRange::new(bounds[0], bounds[1]);
        Ok(Column::Float((0..nrows).map(|_| range.draw(rng)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_stream;

    #[test]
    fn test_normal_sample_shape() {
        let mut rng = create_stream(1);
        let params = Normal.draw_params(&Normal.hard_limits(), &mut rng);
        let col = Normal.sample(&params, 50, &mut rng).unwrap();
        assert_eq!(col.len(), 50);
        assert_eq!(col.dtype(), DType::Float);
    }

    #[test]
    fn test_normal_rejects_negative_std() {
        let mut rng = create_stream(1);
        let params = Params::from([
            ("mean".to_string(), ParamValue::Scalar(0.0)),
            ("std".to_string(), ParamValue::Scalar(-1.0)),
        ]);
        assert!(Normal.sample(&params, 3, &mut rng).is_err());
    }

    #[test]
    fn test_gamma_zero_shape_gives_zeros() {
        let mut rng = create_stream(1);
        let params = Params::from([
            ("alpha".to_string(), ParamValue::Scalar(0.0)),
            ("theta".to_string(), ParamValue::Scalar(2.0)),
        ]);
        let col = Gamma.sample(&params, 4, &mut rng).unwrap();
        assert_eq!(col, Column::Float(vec![0.0; 4]));
    }

    #[test]
    fn test_gamma_values_non_negative() {
        let mut rng = create_stream(5);
        let params = Gamma.draw_params(&Gamma.hard_limits(), &mut rng);
        let col = Gamma.sample(&params, 100, &mut rng).unwrap();
        assert!(col.to_f64().iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_uniform_bounds_sorted_and_respected() {
        let mut rng = create_stream(9);
        for _ in 0..20 {
            let params = Uniform.draw_params(&Uniform.hard_limits(), &mut rng);
            let b = params["bounds"].values().to_vec();
            assert!(b[0] <= b[1]);
            let col = Uniform.sample(&params, 20, &mut rng).unwrap();
            assert!(col.to_f64().iter().all(|&x| b[0] <= x && x <= b[1]));
        }
    }

    #[test]
    fn test_missing_param_is_error() {
        let mut rng = create_stream(1);
        let err = Normal.sample(&Params::new(), 1, &mut rng).unwrap_err();
        assert!(matches!(err, Error::Distribution { .. }));
    }
}
