//! Evolutionary operators.
//!
//! Every operator returns new individuals and leaves its inputs untouched.
//! Randomness comes from an explicit [`Stream`](crate::random::Stream):
//! [`crossover`] consumes the offspring slot's stream, [`mutation`] continues
//! the individual's own stream and [`selection`] draws from the master
//! stream.
//!
//! - [`crossover`]: blends the columns of two parents
//! - [`mutation`]: perturbs shape and values
//! - [`selection`]: picks the best and some lucky parents
//! - [`shrink`]: narrows subtype parameter limits around the parents

mod crossover;
mod mutation;
mod selection;
mod shrink;

pub use crossover::crossover;
pub use mutation::mutation;
pub use selection::selection;
pub use shrink::shrink;
