//! Individuals: a table plus the distribution behind each of its columns.

mod create;
mod io;
mod limits;

pub use create::create_individual;
pub(crate) use create::draw_column;
pub use limits::{Blueprint, ColBound, ColLimits, RowLimits};

use crate::distributions::Instance;
use crate::error::{Error, Result};
use crate::family::{family_index, Family};
use crate::random::Stream;
use crate::table::Table;

/// A candidate dataset.
///
/// Column `j` of the table was sampled from `metadata[j]`. The individual
/// owns a snapshot of its slot's stream; every operator that produces a new
/// individual draws from that stream and hands its final state on.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    table: Table,
    metadata: Vec<Instance>,
    stream: Stream,
    fitness: Option<f64>,
}

impl Individual {
    /// Pairs a table with its column metadata.
    ///
    /// # Errors
    /// [`Error::Corrupt`] if the column count or any column type disagrees
    /// with the metadata.
    pub fn new(table: Table, metadata: Vec<Instance>, stream: Stream) -> Result<Self> {
        if table.ncols() != metadata.len() {
            return Err(Error::Corrupt {
                path: Default::default(),
                reason: format!(
                    "{} columns but {} metadata entries",
                    table.ncols(),
                    metadata.len()
                ),
            });
        }
        for (j, (col, inst)) in table.columns().iter().zip(&metadata).enumerate() {
            if col.dtype() != inst.dtype() {
                return Err(Error::Corrupt {
                    path: Default::default(),
                    reason: format!(
                        "column {j} is {} but its {} instance produces {}",
                        col.dtype(),
                        inst.family(),
                        inst.dtype()
                    ),
                });
            }
        }
        Ok(Self {
            table,
            metadata,
            stream,
            fitness: None,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn metadata(&self) -> &[Instance] {
        &self.metadata
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        self.table.shape()
    }

    pub fn nrows(&self) -> usize {
        self.table.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.table.ncols()
    }

    /// Cached fitness, if evaluated.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Caches the fitness. Only the first value set is kept.
    pub fn set_fitness(&mut self, fitness: f64) {
        if self.fitness.is_none() {
            self.fitness = Some(fitness);
        }
    }

    /// Number of columns drawn from each family, in family order.
    ///
    /// # Errors
    /// [`Error::UnknownFamily`] if a column's family is not in `families`.
    pub fn family_counts(&self, families: &[Family]) -> Result<Vec<usize>> {
        family_counts(&self.metadata, families)
    }
}

pub(crate) fn family_counts(metadata: &[Instance], families: &[Family]) -> Result<Vec<usize>> {
    let mut counts = vec![0; families.len()];
    for inst in metadata {
        counts[family_index(families, inst.family())?] += 1;
    }
    Ok(counts)
}
