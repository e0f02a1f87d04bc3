//! The distribution capability and its parameter types.

use crate::error::{Error, Result};
use crate::random::Stream;
use crate::table::{Column, DType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed interval a parameter may be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub lower: f64,
    pub upper: f64,
}

impl ParamRange {
    /// Creates a range, ordering the two ends.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { lower: a, upper: b }
        } else {
            Self { lower: b, upper: a }
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    /// Draws a value uniformly from the closed range.
    pub fn draw(&self, rng: &mut Stream) -> f64 {
        if self.lower == self.upper {
            return self.lower;
        }
        rng.random_range(self.lower..=self.upper)
    }
}

/// Parameter name to allowed range.
pub type ParamLimits = BTreeMap<String, ParamRange>;

/// A realised parameter value: most parameters are scalars, some (such as
/// the bounds of a uniform distribution) hold several numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl ParamValue {
    /// All numbers held by this value.
    pub fn values(&self) -> &[f64] {
        match self {
            ParamValue::Scalar(x) => std::slice::from_ref(x),
            ParamValue::Vector(v) => v,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParamValue::Scalar(x) => Some(*x),
            ParamValue::Vector(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(x) => write!(f, "{x:.2}"),
            ParamValue::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| format!("{x:.2}")).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Parameter name to realised value.
pub type Params = BTreeMap<String, ParamValue>;

/// A pluggable generator of column values.
///
/// Implementors describe a family of distributions: its name, the type of
/// value it produces, the hard limits its parameters may never leave, and
/// how to sample a column given concrete parameters. A [`Family`](crate::Family)
/// wraps one implementor and hands out independently parameterised
/// [`Instance`](super::Instance)s of it.
///
/// # Implementing
///
/// ```
/// use std::collections::BTreeMap;
/// use rand::Rng;
/// use u_datasynth::distributions::{Distribution, ParamLimits, ParamRange, Params};
/// use u_datasynth::random::Stream;
/// use u_datasynth::{Column, DType, Result};
///
/// #[derive(Debug)]
/// struct Constant;
///
/// impl Distribution for Constant {
///     fn name(&self) -> &str { "Constant" }
///     fn dtype(&self) -> DType { DType::Float }
///     fn hard_limits(&self) -> ParamLimits {
///         BTreeMap::from([("value".to_string(), ParamRange::new(0.0, 1.0))])
///     }
///     fn sample(&self, params: &Params, nrows: usize, _rng: &mut Stream) -> Result<Column> {
///         let value = params["value"].values()[0];
///         Ok(Column::Float(vec![value; nrows]))
///     }
/// }
/// ```
pub trait Distribution: Send + Sync + fmt::Debug {
    /// Unique name, also used as the family's key on disk.
    fn name(&self) -> &str;

    /// Type of every value this distribution produces.
    fn dtype(&self) -> DType;

    /// Limits that parameter ranges may never exceed, even after shrinking.
    fn hard_limits(&self) -> ParamLimits;

    /// Draws concrete parameters within `limits`.
    ///
    /// The default draws every parameter uniformly as a scalar.
    fn draw_params(&self, limits: &ParamLimits, rng: &mut Stream) -> Params {
        limits
            .iter()
            .map(|(name, range)| (name.clone(), ParamValue::Scalar(range.draw(rng))))
            .collect()
    }

    /// Samples `nrows` values with the given parameters.
    fn sample(&self, params: &Params, nrows: usize, rng: &mut Stream) -> Result<Column>;
}

/// Looks up a scalar parameter, failing with a distribution error.
pub(crate) fn scalar_param(dist: &dyn Distribution, params: &Params, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(ParamValue::as_scalar)
        .ok_or_else(|| Error::Distribution {
            name: dist.name().to_string(),
            reason: format!("missing scalar parameter '{name}'"),
        })
}
