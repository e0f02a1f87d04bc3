//! Distribution capability.
//!
//! A [`Distribution`] is a pluggable generator of column values with
//! bounded, named parameters. The crate ships five built-ins; users add
//! their own by implementing the trait.
//!
//! # Built-ins
//!
//! | Name | dtype | Parameters (hard limits) |
//! |------|-------|--------------------------|
//! | [`Bernoulli`] | int | `prob` in `[0, 1]` |
//! | [`Gamma`] | float | `alpha`, `theta` in `[0, 10]` |
//! | [`Normal`] | float | `mean` in `[-10, 10]`, `std` in `[0, 10]` |
//! | [`Poisson`] | int | `lam` in `[0, 10]` |
//! | [`Uniform`] | float | `bounds` in `[-10, 10]` (two sorted values) |

mod continuous;
mod discrete;
mod instance;
mod types;

use std::sync::Arc;

pub use continuous::{Gamma, Normal, Uniform};
pub use discrete::{Bernoulli, Poisson};
pub use instance::{Instance, InstanceRecord};
pub use types::{Distribution, ParamLimits, ParamRange, ParamValue, Params};

/// Every built-in distribution, in alphabetical order.
pub fn all_distributions() -> Vec<Arc<dyn Distribution>> {
    vec![
        Arc::new(Bernoulli),
        Arc::new(Gamma),
        Arc::new(Normal),
        Arc::new(Poisson),
        Arc::new(Uniform),
    ]
}
