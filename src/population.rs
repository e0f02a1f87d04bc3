//! Building whole populations.
//!
//! Slot `i` of a population always draws from `streams[i]`. After an
//! individual is built, its final stream state is written back to the slot,
//! so the next generation's slot `i` continues where this one stopped.

use crate::error::{Error, Result};
use crate::family::Family;
use crate::individual::{create_individual, Blueprint, Individual};
use crate::operators::{crossover, mutation};
use crate::random::Stream;
use rand::Rng;

/// Creates one individual per slot stream.
///
/// # Errors
/// [`Error::Config`] if fewer than two streams are given, plus anything
/// [`create_individual`] reports.
pub fn create_initial_population(
    blueprint: &Blueprint<'_>,
    families: &mut [Family],
    streams: &mut [Stream],
) -> Result<Vec<Individual>> {
    if streams.len() < 2 {
        return Err(Error::Config(
            "a population needs at least two individuals".into(),
        ));
    }

    let mut population = Vec::with_capacity(streams.len());
    for slot in streams.iter_mut() {
        let individual = create_individual(
            &blueprint.row_limits,
            blueprint.col_limits,
            families,
            blueprint.weights,
            slot.clone(),
        )?;
        *slot = individual.stream().clone();
        population.push(individual);
    }
    Ok(population)
}

/// Creates the next population of `size` individuals.
///
/// The parents fill the first slots unchanged. Every remaining slot gets the
/// mutated offspring of two parents drawn (with replacement) from `master`;
/// crossover uses the slot's stream and mutation continues from there.
///
/// # Errors
/// [`Error::Config`] if there are no parents or fewer streams than `size`,
/// plus anything the operators report.
#[allow(clippy::too_many_arguments)]
pub fn create_new_population(
    parents: &[Individual],
    size: usize,
    crossover_prob: f64,
    mutation_prob: f64,
    blueprint: &Blueprint<'_>,
    families: &mut [Family],
    streams: &mut [Stream],
    master: &mut Stream,
) -> Result<Vec<Individual>> {
    if parents.is_empty() {
        return Err(Error::Config("no parents to breed from".into()));
    }
    if streams.len() < size {
        return Err(Error::Config(format!(
            "{} streams for a population of {size}",
            streams.len()
        )));
    }

    let mut population: Vec<Individual> = parents.iter().take(size).cloned().collect();
    for (slot, parent) in population.iter().enumerate() {
        streams[slot] = parent.stream().clone();
    }

    for slot in population.len()..size {
        let a = master.random_range(0..parents.len());
        let b = master.random_range(0..parents.len());

        let offspring = crossover(
            &parents[a],
            &parents[b],
            blueprint.col_limits,
            families,
            streams[slot].clone(),
            crossover_prob,
        )?;
        let mutant = mutation(
            &offspring,
            mutation_prob,
            &blueprint.row_limits,
            blueprint.col_limits,
            families,
            blueprint.weights,
        )?;

        streams[slot] = mutant.stream().clone();
        population.push(mutant);
    }
    Ok(population)
}
