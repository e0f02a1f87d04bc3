//! Run history, in memory or on disk.
//!
//! A disk-backed run lays out its root directory as
//!
//! ```text
//! <root>/config.json                run configuration
//! <root>/fitness.csv                fitness,generation,individual
//! <root>/<generation>/<slot>/       one directory per individual
//! <root>/subtypes/<distribution>/   family caches
//! <root>/run.state                  resume checkpoint
//! ```

use crate::distributions::Distribution;
use crate::error::{Error, Result};
use crate::family::Family;
use crate::individual::Individual;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FITNESS_FILE: &str = "fitness.csv";

/// Fitness of one individual in one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub fitness: f64,
    pub generation: usize,
    pub individual: usize,
}

/// Every generation of a run.
#[derive(Debug, Clone)]
pub enum History {
    /// Populations and fitness kept in memory.
    InMemory {
        populations: Vec<Vec<Individual>>,
        fitness: Vec<FitnessRecord>,
    },
    /// Generations written under `root`, read back on demand.
    OnDisk {
        root: PathBuf,
        generations: usize,
        distributions: Vec<Arc<dyn Distribution>>,
    },
}

impl History {
    pub(crate) fn in_memory() -> Self {
        History::InMemory {
            populations: Vec::new(),
            fitness: Vec::new(),
        }
    }

    pub(crate) fn on_disk(root: &Path, families: &[Family]) -> Self {
        History::OnDisk {
            root: root.to_path_buf(),
            generations: 0,
            distributions: families.iter().map(|f| Arc::clone(f.distribution())).collect(),
        }
    }

    /// Number of recorded generations, the initial one included.
    pub fn len(&self) -> usize {
        match self {
            History::InMemory { populations, .. } => populations.len(),
            History::OnDisk { generations, .. } => *generations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root directory of a disk-backed history.
    pub fn root(&self) -> Option<&Path> {
        match self {
            History::InMemory { .. } => None,
            History::OnDisk { root, .. } => Some(root),
        }
    }

    /// The population of `generation`.
    ///
    /// On disk, individuals are read in slot order; their metadata is bound
    /// to the run's distributions.
    pub fn population(&self, generation: usize) -> Result<Vec<Individual>> {
        if generation >= self.len() {
            return Err(Error::Config(format!(
                "generation {generation} not recorded ({} generations)",
                self.len()
            )));
        }
        match self {
            History::InMemory { populations, .. } => Ok(populations[generation].clone()),
            History::OnDisk {
                root,
                distributions,
                ..
            } => {
                let families: Vec<Family> =
                    distributions.iter().map(|d| Family::new(Arc::clone(d))).collect();
                read_generation(root, generation, &families)
            }
        }
    }

    /// Every fitness record so far, in generation then slot order.
    pub fn fitness(&self) -> Result<Vec<FitnessRecord>> {
        match self {
            History::InMemory { fitness, .. } => Ok(fitness.clone()),
            History::OnDisk {
                root, generations, ..
            } => Ok(read_fitness(root)?
                .into_iter()
                .filter(|r| r.generation < *generations)
                .collect()),
        }
    }

    /// Records one generation.
    pub(crate) fn push(&mut self, population: &[Individual], fitness: &[f64], generation: usize) -> Result<()> {
        match self {
            History::InMemory {
                populations,
                fitness: records,
            } => {
                populations.push(population.to_vec());
                records.extend(fitness.iter().enumerate().map(|(individual, &f)| FitnessRecord {
                    fitness: f,
                    generation,
                    individual,
                }));
            }
            History::OnDisk {
                root, generations, ..
            } => {
                write_generation(population, fitness, generation, root)?;
                *generations = generation + 1;
            }
        }
        Ok(())
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        if let History::OnDisk { generations, .. } = self {
            *generations = len;
        }
    }
}

/// Writes a generation's fitness to `root/fitness.csv`.
///
/// Generation 0 starts a fresh file with a header; later generations are
/// appended.
pub fn write_fitness(fitness: &[f64], generation: usize, root: &Path) -> Result<()> {
    fs::create_dir_all(root)?;
    let path = root.join(FITNESS_FILE);

    let mut writer = if generation == 0 {
        csv::Writer::from_path(&path)?
    } else {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        csv::WriterBuilder::new().has_headers(false).from_writer(file)
    };
    for (individual, &f) in fitness.iter().enumerate() {
        writer.serialize(FitnessRecord {
            fitness: f,
            generation,
            individual,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads every record of `root/fitness.csv`.
pub fn read_fitness(root: &Path) -> Result<Vec<FitnessRecord>> {
    let mut reader = csv::Reader::from_path(root.join(FITNESS_FILE))?;
    let records = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Drops records of generations after `last` from `root/fitness.csv`.
pub(crate) fn truncate_fitness(root: &Path, last: usize) -> Result<Vec<FitnessRecord>> {
    let records: Vec<FitnessRecord> = read_fitness(root)?
        .into_iter()
        .filter(|r| r.generation <= last)
        .collect();

    let mut writer = csv::Writer::from_path(root.join(FITNESS_FILE))?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(records)
}

/// Removes the generation directories and `fitness.csv` of a previous run
/// stored under `root`, along with any files named in `extra`.
pub(crate) fn clear_run(root: &Path, extra: &[&str]) -> Result<()> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let is_generation = entry.file_type()?.is_dir()
            && entry.file_name().to_str().is_some_and(|s| s.parse::<usize>().is_ok());
        if is_generation {
            fs::remove_dir_all(entry.path())?;
        }
    }
    for name in std::iter::once(FITNESS_FILE).chain(extra.iter().copied()) {
        match fs::remove_file(root.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Writes every individual of a generation to `root/<generation>/<slot>/`,
/// then appends its fitness.
pub fn write_generation(
    population: &[Individual],
    fitness: &[f64],
    generation: usize,
    root: &Path,
) -> Result<()> {
    let dir = root.join(generation.to_string());
    for (slot, individual) in population.iter().enumerate() {
        individual.to_file(&dir.join(slot.to_string()))?;
    }
    write_fitness(fitness, generation, root)
}

/// Reads every individual of `root/<generation>/`, in slot order.
pub(crate) fn read_generation(root: &Path, generation: usize, families: &[Family]) -> Result<Vec<Individual>> {
    let dir = root.join(generation.to_string());
    let mut slots = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(slot) = entry.file_name().to_str().and_then(|s| s.parse::<usize>().ok()) {
            slots.push(slot);
        }
    }
    slots.sort_unstable();

    slots
        .into_iter()
        .map(|slot| Individual::from_file(&dir.join(slot.to_string()), families))
        .collect()
}
