//! Crossover: blending two parents into one offspring.

use crate::distributions::Instance;
use crate::error::{Error, Result};
use crate::family::{family_index, Family};
use crate::individual::{ColLimits, Individual};
use crate::random::Stream;
use crate::table::{Column, Table};
use rand::seq::index;
use rand::Rng;
use std::collections::HashMap;

/// A pooled column with its instance and family position.
#[derive(Clone, Copy)]
struct Gene<'a> {
    family: usize,
    column: &'a Column,
    instance: &'a Instance,
}

/// Creates an offspring from the pooled columns of two parents.
///
/// The offspring's row count and column count are each taken from `parent1`
/// with probability `prob`, otherwise from `parent2`. Per-family minimum
/// columns are inherited first, then the rest are drawn uniformly from the
/// remaining pool without exceeding per-family maxima. Columns that are too
/// long lose the same stream-drawn set of rows as every other column of
/// their length; columns that are too short are extended with samples from
/// their own instance.
///
/// # Errors
/// - [`Error::Constraint`] if the pool cannot meet a per-family minimum or
///   runs out of eligible columns before the column target
/// - [`Error::UnknownFamily`] if a parent column's family is not supplied
pub fn crossover(
    parent1: &Individual,
    parent2: &Individual,
    col_limits: &ColLimits,
    families: &[Family],
    stream: Stream,
    prob: f64,
) -> Result<Individual> {
    col_limits.validate(families.len())?;
    let mut rng = stream;

    let mut pool = Vec::with_capacity(parent1.ncols() + parent2.ncols());
    for parent in [parent1, parent2] {
        for (column, instance) in parent.table().columns().iter().zip(parent.metadata()) {
            pool.push(Gene {
                family: family_index(families, instance.family())?,
                column,
                instance,
            });
        }
    }

    let nrows = if rng.random::<f64>() < prob {
        parent1.nrows()
    } else {
        parent2.nrows()
    };
    let ncols = if rng.random::<f64>() < prob {
        parent1.ncols()
    } else {
        parent2.ncols()
    };

    let mut counts = vec![0usize; families.len()];
    let mut chosen: Vec<Gene<'_>> = Vec::with_capacity(ncols);

    for i in 0..families.len() {
        let min = col_limits.min_for(i);
        if min == 0 {
            continue;
        }
        let matching: Vec<usize> = (0..pool.len()).filter(|&k| pool[k].family == i).collect();
        if matching.len() < min {
            return Err(Error::Constraint(format!(
                "{} needs {min} columns but the parents hold {}",
                families[i].name(),
                matching.len()
            )));
        }
        let mut taken: Vec<usize> = index::sample(&mut rng, matching.len(), min)
            .into_iter()
            .map(|k| matching[k])
            .collect();
        for &k in &taken {
            chosen.push(pool[k]);
        }
        counts[i] += min;

        taken.sort_unstable_by(|a, b| b.cmp(a));
        for k in taken {
            pool.remove(k);
        }
    }

    while chosen.len() < ncols {
        if !pool.iter().any(|g| col_limits.has_room(g.family, counts[g.family])) {
            return Err(Error::Constraint(format!(
                "{} of {ncols} columns inherited and no pooled column fits",
                chosen.len()
            )));
        }
        let k = rng.random_range(0..pool.len());
        let family = pool[k].family;
        if !col_limits.has_room(family, counts[family]) {
            continue;
        }
        chosen.push(pool.remove(k));
        counts[family] += 1;
    }

    let mut drop_sets: HashMap<usize, Vec<bool>> = HashMap::new();
    let mut columns = Vec::with_capacity(chosen.len());
    let mut metadata = Vec::with_capacity(chosen.len());
    for gene in chosen {
        let mut column = gene.column.clone();
        let len = column.len();
        if len > nrows {
            let dropped = drop_sets.entry(len).or_insert_with(|| {
                let mut mask = vec![false; len];
                for k in index::sample(&mut rng, len, len - nrows) {
                    mask[k] = true;
                }
                mask
            });
            column.drop_rows(dropped);
        } else if len < nrows {
            column.append(gene.instance.sample(nrows - len, &mut rng)?);
        }
        columns.push(column);
        metadata.push(gene.instance.clone());
    }

    Individual::new(Table::from_columns(nrows, columns), metadata, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::tests::two_families;
    use crate::individual::{create_individual, RowLimits};
    use crate::random::create_stream;

    fn parent(families: &mut [Family], rows: usize, cols: usize, seed: u64) -> Individual {
        create_individual(
            &RowLimits::new(rows, rows),
            &ColLimits::total(cols, cols),
            families,
            None,
            create_stream(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_prob_one_takes_first_parent_shape() {
        let mut families = two_families(0);
        let p1 = parent(&mut families, 3, 2, 1);
        let p2 = parent(&mut families, 7, 4, 2);
        let limits = ColLimits::total(1, 5);

        for seed in 0..20 {
            let child = crossover(&p1, &p2, &limits, &families, create_stream(seed), 1.0).unwrap();
            assert_eq!(child.shape(), (3, 2));
        }
    }

    #[test]
    fn test_prob_zero_takes_second_parent_shape() {
        let mut families = two_families(0);
        let p1 = parent(&mut families, 3, 2, 1);
        let p2 = parent(&mut families, 7, 4, 2);
        let limits = ColLimits::total(1, 5);

        let child = crossover(&p1, &p2, &limits, &families, create_stream(4), 0.0).unwrap();
        assert_eq!(child.shape(), (7, 4));
    }

    #[test]
    fn test_dimensions_come_from_a_parent() {
        let mut families = two_families(3);
        let p1 = parent(&mut families, 2, 1, 5);
        let p2 = parent(&mut families, 6, 3, 6);
        let limits = ColLimits::total(1, 3);

        for seed in 0..30 {
            let child = crossover(&p1, &p2, &limits, &families, create_stream(seed), 0.5).unwrap();
            assert!(child.nrows() == 2 || child.nrows() == 6);
            assert!(child.ncols() == 1 || child.ncols() == 3);
        }
    }

    #[test]
    fn test_columns_come_from_parents() {
        let mut families = two_families(8);
        let p1 = parent(&mut families, 4, 3, 9);
        let p2 = parent(&mut families, 4, 3, 10);
        let limits = ColLimits::total(1, 6);

        let child = crossover(&p1, &p2, &limits, &families, create_stream(0), 0.5).unwrap();
        let pool: Vec<&Instance> = p1.metadata().iter().chain(p2.metadata()).collect();
        for (col, inst) in child.table().columns().iter().zip(child.metadata()) {
            assert!(pool.contains(&inst));
            assert_eq!(col.dtype(), inst.dtype());
        }
    }

    #[test]
    fn test_trimmed_columns_keep_their_values() {
        let mut families = two_families(2);
        let p1 = parent(&mut families, 2, 1, 11);
        let p2 = parent(&mut families, 5, 2, 12);
        let limits = ColLimits::total(1, 3);

        // Rows and columns from parent 1, so all columns are length 2 or
        // trimmed from length 5.
        let child = crossover(&p1, &p2, &limits, &families, create_stream(3), 1.0).unwrap();
        let pool: Vec<Vec<f64>> = p1
            .table()
            .columns()
            .iter()
            .chain(p2.table().columns())
            .map(Column::to_f64)
            .collect();
        for col in child.table().columns() {
            let values = col.to_f64();
            let is_subsequence = pool.iter().any(|src| {
                let mut it = src.iter();
                values.iter().all(|v| it.any(|s| s.to_bits() == v.to_bits()))
            });
            assert!(is_subsequence);
        }
    }

    #[test]
    fn test_per_family_minimum_inherited() {
        let mut families = two_families(4);
        let limits = ColLimits::per_family(vec![1, 1], vec![3, 3]);
        let make = |families: &mut [Family], seed| {
            create_individual(&RowLimits::new(3, 3), &limits, families, None, create_stream(seed))
                .unwrap()
        };
        let p1 = make(&mut families, 1);
        let p2 = make(&mut families, 2);

        for seed in 0..20 {
            let child = crossover(&p1, &p2, &limits, &families, create_stream(seed), 0.5).unwrap();
            let counts = child.family_counts(&families).unwrap();
            assert!(counts[0] >= 1 && counts[1] >= 1);
            assert!(counts[0] <= 3 && counts[1] <= 3);
        }
    }

    #[test]
    fn test_unmet_minimum_is_constraint_error() {
        let mut families = two_families(4);
        let only_normal = ColLimits::per_family(vec![1, 0], vec![1, 0]);
        let p1 = create_individual(
            &RowLimits::new(2, 2),
            &only_normal,
            &mut families,
            None,
            create_stream(1),
        )
        .unwrap();
        let p2 = p1.clone();

        let needs_poisson = ColLimits::per_family(vec![0, 1], vec![2, 2]);
        let err = crossover(&p1, &p2, &needs_poisson, &families, create_stream(0), 0.5).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }
}
