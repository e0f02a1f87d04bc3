//! Parent selection.

use crate::error::{Error, Result};
use crate::individual::Individual;
use crate::random::Stream;
use rand::Rng;

/// Selects parents: the `floor(best_prop * size)` fittest individuals, best
/// first, followed by `floor(lucky_prop * size)` drawn uniformly from the
/// rest.
///
/// Ties go to the earlier individual and a NaN fitness is never preferred.
/// The population is not modified; parents are clones.
///
/// # Errors
/// [`Error::Config`] if both counts are zero or the fitness length differs
/// from the population size.
pub fn selection(
    population: &[Individual],
    fitness: &[f64],
    best_prop: f64,
    lucky_prop: f64,
    stream: &mut Stream,
    maximise: bool,
) -> Result<Vec<Individual>> {
    if population.len() != fitness.len() {
        return Err(Error::Config(format!(
            "{} fitness values for {} individuals",
            fitness.len(),
            population.len()
        )));
    }

    let size = population.len();
    let n_best = (best_prop * size as f64).floor() as usize;
    let n_lucky = (lucky_prop * size as f64).floor() as usize;
    if n_best == 0 && n_lucky == 0 {
        return Err(Error::Config(format!(
            "best_prop = {best_prop} and lucky_prop = {lucky_prop} select nobody from {size} individuals"
        )));
    }

    let mut remaining: Vec<usize> = (0..size).collect();
    let mut parents = Vec::with_capacity(n_best + n_lucky);

    for _ in 0..n_best {
        let Some(pos) = best_position(&remaining, fitness, maximise) else {
            break;
        };
        parents.push(population[remaining.remove(pos)].clone());
    }

    for _ in 0..n_lucky {
        if remaining.is_empty() {
            break;
        }
        let pos = stream.random_range(0..remaining.len());
        parents.push(population[remaining.remove(pos)].clone());
    }

    Ok(parents)
}

/// Position in `candidates` of the best fitness.
fn best_position(candidates: &[usize], fitness: &[f64], maximise: bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (pos, &idx) in candidates.iter().enumerate() {
        let f = fitness[idx];
        let better = match best {
            None => true,
            Some((_, b)) if b.is_nan() => !f.is_nan(),
            Some((_, b)) => {
                if maximise {
                    f > b
                } else {
                    f < b
                }
            }
        };
        if better {
            best = Some((pos, f));
        }
    }
    best.map(|(pos, _)| pos)
}
