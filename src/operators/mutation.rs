//! Mutation: perturbing an individual's shape and values.

use crate::error::Result;
use crate::family::{family_index, Family, FamilyPicker};
use crate::individual::{draw_column, family_counts, ColLimits, Individual, RowLimits};
use crate::table::Table;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Returns a mutated copy of `individual`.
///
/// Each of the following happens independently with probability `prob`,
/// and only while the limits allow it:
///
/// 1. add a row, sampled per column from the column's own instance
/// 2. remove a random row
/// 3. add a column from a family picked by `weights` that is below its
///    per-family maximum
/// 4. remove a random column whose family is above its per-family minimum
///
/// Finally every value is resampled from its column's instance with
/// probability `prob`. All draws come from a copy of the individual's stream.
pub fn mutation(
    individual: &Individual,
    prob: f64,
    row_limits: &RowLimits,
    col_limits: &ColLimits,
    families: &mut [Family],
    weights: Option<&[f64]>,
) -> Result<Individual> {
    col_limits.validate(families.len())?;
    let picker = FamilyPicker::new(families.len(), weights)?;

    let mut rng = individual.stream().clone();
    let (mut nrows, mut columns) = individual.table().clone().into_columns();
    let mut metadata = individual.metadata().to_vec();

    // Rows.
    if rng.random::<f64>() < prob && nrows < row_limits.max {
        for (col, inst) in columns.iter_mut().zip(&metadata) {
            col.append(inst.sample(1, &mut rng)?);
        }
        nrows += 1;
    }
    if rng.random::<f64>() < prob && nrows > row_limits.min {
        let row = rng.random_range(0..nrows);
        for col in &mut columns {
            col.remove(row);
        }
        nrows -= 1;
    }

    // Columns.
    let mut counts = family_counts(&metadata, families)?;
    let (min_cols, max_cols) = col_limits.aggregate();

    if rng.random::<f64>() < prob && columns.len() < max_cols {
        let open = (0..families.len()).any(|i| picker.can_pick(i) && col_limits.has_room(i, counts[i]));
        if open {
            let i = loop {
                let i = picker.pick(&mut rng);
                if col_limits.has_room(i, counts[i]) {
                    break i;
                }
            };
            let (col, inst) = draw_column(&mut families[i], nrows, &mut rng)?;
            columns.push(col);
            metadata.push(inst);
            counts[i] += 1;
        }
    }

    if rng.random::<f64>() < prob && columns.len() > min_cols {
        let mut removable = Vec::new();
        for (j, inst) in metadata.iter().enumerate() {
            let i = family_index(families, inst.family())?;
            if counts[i] > col_limits.min_for(i) {
                removable.push((j, i));
            }
        }
        if let Some(&(j, i)) = removable.choose(&mut rng) {
            columns.remove(j);
            metadata.remove(j);
            counts[i] -= 1;
        }
    }

    // Values.
    for (col, inst) in columns.iter_mut().zip(&metadata) {
        for row in 0..nrows {
            if rng.random::<f64>() < prob {
                let value = inst.sample(1, &mut rng)?;
                col.set_from(row, &value);
            }
        }
    }

    Individual::new(Table::from_columns(nrows, columns), metadata, rng)
}
