//! Building individuals from scratch.

use super::limits::{ColLimits, RowLimits};
use super::Individual;
use crate::distributions::Instance;
use crate::error::{Error, Result};
use crate::family::{Family, FamilyPicker};
use crate::random::Stream;
use crate::table::{Column, Table};
use rand::Rng;

/// Creates an individual within the given limits.
///
/// The row count and total column count are drawn uniformly within their
/// bounds. Each family's per-family minimum is drawn first; the remaining
/// columns come from families picked by `weights` (uniform if `None`),
/// skipping families already at their per-family maximum. All randomness is
/// drawn from `stream`, whose final state the individual keeps.
///
/// # Errors
/// - [`Error::Config`] for invalid limits or weights
/// - [`Error::Constraint`] if no drawable family can take another column
///   before the column target is met
/// - [`Error::Capacity`] if a family cannot create an instance
pub fn create_individual(
    row_limits: &RowLimits,
    col_limits: &ColLimits,
    families: &mut [Family],
    weights: Option<&[f64]>,
    stream: Stream,
) -> Result<Individual> {
    row_limits.validate()?;
    col_limits.validate(families.len())?;
    let picker = FamilyPicker::new(families.len(), weights)?;

    let mut rng = stream;
    let nrows = row_limits.draw(&mut rng);
    let (min_cols, max_cols) = col_limits.aggregate();
    let ncols = rng.random_range(min_cols..=max_cols);

    let mut counts = vec![0usize; families.len()];
    let mut columns: Vec<Column> = Vec::with_capacity(ncols);
    let mut metadata: Vec<Instance> = Vec::with_capacity(ncols);

    for i in 0..families.len() {
        for _ in 0..col_limits.min_for(i) {
            let (col, inst) = draw_column(&mut families[i], nrows, &mut rng)?;
            columns.push(col);
            metadata.push(inst);
            counts[i] += 1;
        }
    }

    while columns.len() < ncols {
        let open = (0..families.len()).any(|i| picker.can_pick(i) && col_limits.has_room(i, counts[i]));
        if !open {
            return Err(Error::Constraint(format!(
                "{} of {ncols} columns drawn and every weighted family is at its maximum",
                columns.len()
            )));
        }

        let i = picker.pick(&mut rng);
        if !col_limits.has_room(i, counts[i]) {
            continue;
        }
        let (col, inst) = draw_column(&mut families[i], nrows, &mut rng)?;
        columns.push(col);
        metadata.push(inst);
        counts[i] += 1;
    }

    Individual::new(Table::from_columns(nrows, columns), metadata, rng)
}

/// Makes an instance from `family` and samples a column of `nrows` values.
pub(crate) fn draw_column(
    family: &mut Family,
    nrows: usize,
    rng: &mut Stream,
) -> Result<(Column, Instance)> {
    let inst = family.make_instance(rng)?;
    let col = inst.sample(nrows, rng)?;
    Ok((col, inst))
}
