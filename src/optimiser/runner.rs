//! The evolutionary loop.
//!
//! [`DataOptimiser`] orchestrates a run:
//! initialise → evaluate → record → select → prune → breed → evaluate →
//! shrink → record → repeat.

use super::config::OptimiserConfig;
use super::history::{clear_run, read_generation, truncate_fitness, FitnessRecord, History};
use crate::error::{Error, Result};
use crate::family::{Family, FamilyState};
use crate::fitness::{Evaluator, FitnessCache, FitnessFunction};
use crate::individual::Individual;
use crate::operators::{selection, shrink};
use crate::persist::{read_blob, write_blob};
use crate::population::{create_initial_population, create_new_population};
use crate::random::{create_stream, derive_streams, entropy_stream, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const CONFIG_FILE: &str = "config.json";
const CHECKPOINT_FILE: &str = "run.state";
const CHECKPOINT_TMP: &str = "run.state.tmp";

/// Convergence hook, called with each generation's fitness.
pub type StopFn = Box<dyn Fn(&[f64]) -> bool + Send + Sync>;

/// Mutation schedule, called with the current probability and generation.
pub type DwindleFn = Box<dyn Fn(f64, usize) -> f64 + Send + Sync>;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Uninitialised,
    Running,
    /// The stop hook reported convergence.
    Converged,
    /// `max_iter` generations were run.
    Exhausted,
}

/// Result of an optimisation run.
#[derive(Debug, Clone)]
pub struct OptimiserResult {
    /// The best individual seen during the entire run.
    pub best: Individual,

    /// Fitness of `best`.
    pub best_fitness: f64,

    /// Generations run after the initial one.
    pub generations: usize,

    /// How the run ended.
    pub state: RunState,

    /// Best fitness seen so far, at the end of each generation.
    pub fitness_history: Vec<f64>,
}

/// Everything needed to continue a disk-backed run, written after each
/// generation is complete.
///
/// Family registries and streams live here rather than in the family caches,
/// which are rewritten before the checkpoint and may run one generation
/// ahead of it.
#[derive(Serialize, Deserialize)]
struct RunCheckpoint {
    generation: usize,
    mutation_prob: f64,
    master: Stream,
    streams: Vec<Stream>,
    families: Vec<FamilyState>,
}

/// Evolves a population of datasets against a fitness function.
///
/// # Usage
///
/// ```
/// use std::sync::Arc;
/// use u_datasynth::distributions::{Normal, Poisson};
/// use u_datasynth::{DataOptimiser, Family, OptimiserConfig, Table};
///
/// let families = vec![Family::new(Arc::new(Normal)), Family::new(Arc::new(Poisson))];
/// let config = OptimiserConfig::default()
///     .with_size(10)
///     .with_max_iter(3)
///     .with_seed(42);
///
/// // Prefer tables with many rows.
/// let fitness = |t: &Table| -(t.nrows() as f64);
/// let mut optimiser = DataOptimiser::new(fitness, config, families).unwrap();
/// let result = optimiser.run().unwrap();
/// assert_eq!(result.generations, 3);
/// assert_eq!(result.fitness_history.len(), 4);
/// ```
pub struct DataOptimiser<F> {
    fitness: F,
    config: OptimiserConfig,
    families: Vec<Family>,
    stop: Option<StopFn>,
    dwindle: Option<DwindleFn>,
    evaluator: Evaluator,
    cache: FitnessCache,

    state: RunState,
    generation: usize,
    mutation_prob: f64,
    master: Stream,
    streams: Vec<Stream>,
    population: Vec<Individual>,
    pop_fitness: Vec<f64>,
    history: History,
    best: Option<(Individual, f64)>,
    best_trace: Vec<f64>,
}

impl<F: FitnessFunction> DataOptimiser<F> {
    /// Creates an optimiser over `families`.
    ///
    /// # Errors
    /// [`Error::Config`] if the configuration is invalid for the number of
    /// families or a family allows zero subtypes; [`Error::Pool`] if the
    /// worker pool cannot be built.
    pub fn new(fitness: F, config: OptimiserConfig, families: Vec<Family>) -> Result<Self> {
        config.validate(families.len())?;
        if let Some(family) = families.iter().find(|f| f.max_subtypes() == Some(0)) {
            return Err(Error::Config(format!(
                "{} allows no subtypes",
                family.name()
            )));
        }
        let evaluator = Evaluator::new(config.workers)?;
        let history = match &config.root {
            Some(root) => History::on_disk(root, &families),
            None => History::in_memory(),
        };
        let mutation_prob = config.mutation_prob;

        Ok(Self {
            fitness,
            config,
            families,
            stop: None,
            dwindle: None,
            evaluator,
            cache: FitnessCache::new(),
            state: RunState::Uninitialised,
            generation: 0,
            mutation_prob,
            master: entropy_stream(),
            streams: Vec::new(),
            population: Vec::new(),
            pop_fitness: Vec::new(),
            history,
            best: None,
            best_trace: Vec::new(),
        })
    }

    /// Stops the run once `stop` returns `true` for a generation's fitness.
    pub fn with_stop(mut self, stop: impl Fn(&[f64]) -> bool + Send + Sync + 'static) -> Self {
        self.stop = Some(Box::new(stop));
        self
    }

    /// Updates the mutation probability after every generation.
    ///
    /// The returned value is clamped to `[0, 1]`.
    pub fn with_dwindle(mut self, dwindle: impl Fn(f64, usize) -> f64 + Send + Sync + 'static) -> Self {
        self.dwindle = Some(Box::new(dwindle));
        self
    }

    pub fn config(&self) -> &OptimiserConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Index of the current generation; 0 is the initial population.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn mutation_prob(&self) -> f64 {
        self.mutation_prob
    }

    /// The current population, in slot order.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Fitness of the current population, in slot order.
    pub fn population_fitness(&self) -> &[f64] {
        &self.pop_fitness
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn cache(&self) -> &FitnessCache {
        &self.cache
    }

    /// Runs from a fresh initial population until convergence or `max_iter`.
    pub fn run(&mut self) -> Result<OptimiserResult> {
        self.initialise()?;
        self.record()?;
        self.check_stop();
        self.checkpoint()?;
        self.evolve()?;
        self.finish()
    }

    /// Continues the disk-backed run stored under `root` from its last
    /// complete generation.
    ///
    /// Families, slot streams, the master stream and the mutation probability
    /// are restored from the checkpoint, so the continued run matches one that
    /// was never interrupted. Fitness values already on disk are reloaded into
    /// the cache.
    ///
    /// # Errors
    /// [`Error::Config`] if the stored run has a different population size;
    /// [`Error::Corrupt`] if the checkpoint and the stored generation disagree.
    pub fn resume(&mut self, root: &Path) -> Result<OptimiserResult> {
        let stored: OptimiserConfig = serde_json::from_reader(fs::File::open(root.join(CONFIG_FILE))?)?;
        if stored.size != self.config.size {
            return Err(Error::Config(format!(
                "stored run has {} individuals, configured for {}",
                stored.size, self.config.size
            )));
        }

        let path = root.join(CHECKPOINT_FILE);
        let checkpoint: RunCheckpoint = read_blob(&path)?;
        if checkpoint.streams.len() != self.config.size || checkpoint.families.len() != self.families.len() {
            return Err(Error::Corrupt {
                path,
                reason: format!(
                    "checkpoint holds {} streams and {} families",
                    checkpoint.streams.len(),
                    checkpoint.families.len()
                ),
            });
        }
        if let Some((family, state)) = self
            .families
            .iter()
            .zip(&checkpoint.families)
            .find(|(f, s)| f.key() != s.key)
        {
            return Err(Error::Corrupt {
                path,
                reason: format!("checkpoint holds {} where {} is configured", state.key, family.key()),
            });
        }
        for (family, state) in self.families.iter_mut().zip(checkpoint.families) {
            family.set_state(state);
        }

        let last = checkpoint.generation;
        let records = truncate_fitness(root, last)?;
        let mut population = read_generation(root, last, &self.families)?;
        let mut pop_fitness = vec![f64::NAN; population.len()];
        for r in records.iter().filter(|r| r.generation == last) {
            if let Some(slot) = pop_fitness.get_mut(r.individual) {
                *slot = r.fitness;
            }
        }
        if population.len() != self.config.size {
            return Err(Error::Corrupt {
                path: root.join(last.to_string()),
                reason: format!("{} individuals stored", population.len()),
            });
        }
        for (ind, &f) in population.iter_mut().zip(&pop_fitness) {
            ind.set_fitness(f);
        }

        self.config.root = Some(root.to_path_buf());
        self.history = History::on_disk(root, &self.families);
        self.history.set_len(last + 1);
        self.reload_cache(&records)?;
        self.reload_best(&records)?;

        self.master = checkpoint.master;
        self.streams = checkpoint.streams;
        self.mutation_prob = checkpoint.mutation_prob;
        self.generation = last;
        self.population = population;
        self.pop_fitness = pop_fitness;
        self.state = RunState::Running;
        log::info!(
            "resuming run at {} from generation {last}",
            root.display()
        );

        self.check_stop();
        self.evolve()?;
        self.finish()
    }

    fn initialise(&mut self) -> Result<()> {
        self.master = self.config.seed.map_or_else(entropy_stream, create_stream);
        self.streams = derive_streams(&mut self.master, self.config.size);
        let family_streams = derive_streams(&mut self.master, self.families.len());
        for (family, stream) in self.families.iter_mut().zip(family_streams) {
            family.set_stream(stream);
        }

        if let Some(root) = &self.config.root {
            fs::create_dir_all(root)?;
            if root.join(CHECKPOINT_FILE).exists() {
                log::warn!("overwriting the run stored at {}", root.display());
            }
            clear_run(root, &[CHECKPOINT_FILE, CHECKPOINT_TMP])?;
            for family in &self.families {
                match fs::remove_dir_all(family.cache_dir(root)) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            let file = fs::File::create(root.join(CONFIG_FILE))?;
            serde_json::to_writer_pretty(file, &self.config)?;
            self.history = History::on_disk(root, &self.families);
        } else {
            self.history = History::in_memory();
        }

        let blueprint = self.config.blueprint();
        let mut population = create_initial_population(&blueprint, &mut self.families, &mut self.streams)?;
        self.pop_fitness = self.evaluator.evaluate(&self.fitness, &mut population, &mut self.cache)?;
        self.population = population;

        self.generation = 0;
        self.mutation_prob = self.config.mutation_prob;
        self.best = None;
        self.best_trace.clear();
        self.state = RunState::Running;
        Ok(())
    }

    fn evolve(&mut self) -> Result<()> {
        while self.state == RunState::Running {
            if self.generation >= self.config.max_iter {
                self.state = RunState::Exhausted;
                break;
            }
            self.step()?;
            self.record()?;
            self.check_stop();
            if let Some(dwindle) = &self.dwindle {
                self.mutation_prob = dwindle(self.mutation_prob, self.generation).clamp(0.0, 1.0);
            }
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Breeds and evaluates the next generation. Nothing is committed unless
    /// every step succeeds.
    fn step(&mut self) -> Result<()> {
        let mut master = self.master.clone();
        let mut streams = self.streams.clone();
        let mut families = self.families.clone();

        let parents = selection(
            &self.population,
            &self.pop_fitness,
            self.config.best_prop,
            self.config.lucky_prop,
            &mut master,
            self.config.maximise,
        )?;
        prune_subtypes(&parents, &mut families);

        let blueprint = self.config.blueprint();
        let mut population = create_new_population(
            &parents,
            self.config.size,
            self.config.crossover_prob,
            self.mutation_prob,
            &blueprint,
            &mut families,
            &mut streams,
            &mut master,
        )?;
        let pop_fitness = self.evaluator.evaluate(&self.fitness, &mut population, &mut self.cache)?;

        let generation = self.generation + 1;
        if let Some(ratio) = self.config.shrinkage {
            shrink(&parents, &mut families, generation, ratio)?;
        }

        self.master = master;
        self.streams = streams;
        self.families = families;
        self.population = population;
        self.pop_fitness = pop_fitness;
        self.generation = generation;
        Ok(())
    }

    /// Updates the best-so-far and appends the generation to the history.
    fn record(&mut self) -> Result<()> {
        if let Some(k) = best_index(&self.pop_fitness, self.config.maximise) {
            let f = self.pop_fitness[k];
            let improved = match &self.best {
                Some((_, best)) => is_better(f, *best, self.config.maximise),
                None => true,
            };
            if improved {
                self.best = Some((self.population[k].clone(), f));
            }
        }
        let best_fitness = self.best.as_ref().map_or(f64::NAN, |(_, f)| *f);
        self.best_trace.push(best_fitness);

        self.history.push(&self.population, &self.pop_fitness, self.generation)?;
        if let Some(root) = &self.config.root {
            for family in &self.families {
                family.save(root)?;
            }
        }

        log::info!(
            "generation {}: best fitness {best_fitness:.6}, {} tables evaluated, {} cache hits",
            self.generation,
            self.cache.misses(),
            self.cache.hits()
        );
        Ok(())
    }

    fn check_stop(&mut self) {
        if let Some(stop) = &self.stop {
            if stop(&self.pop_fitness) {
                log::info!("converged at generation {}", self.generation);
                self.state = RunState::Converged;
            }
        }
    }

    fn checkpoint(&self) -> Result<()> {
        let Some(root) = &self.config.root else {
            return Ok(());
        };
        let checkpoint = RunCheckpoint {
            generation: self.generation,
            mutation_prob: self.mutation_prob,
            master: self.master.clone(),
            streams: self.streams.clone(),
            families: self.families.iter().map(Family::state).collect(),
        };
        let tmp = root.join(CHECKPOINT_TMP);
        write_blob(&tmp, &checkpoint)?;
        fs::rename(&tmp, root.join(CHECKPOINT_FILE))?;
        Ok(())
    }

    fn reload_cache(&mut self, records: &[FitnessRecord]) -> Result<()> {
        for generation in 0..self.history.len() {
            let population = self.history.population(generation)?;
            for r in records.iter().filter(|r| r.generation == generation) {
                if let Some(ind) = population.get(r.individual) {
                    self.cache.insert(ind.table().content_hash(), r.fitness);
                }
            }
        }
        log::debug!("reloaded {} cached fitness values", self.cache.len());
        Ok(())
    }

    fn reload_best(&mut self, records: &[FitnessRecord]) -> Result<()> {
        let maximise = self.config.maximise;
        self.best_trace.clear();
        let mut best: Option<FitnessRecord> = None;
        for generation in 0..self.history.len() {
            for r in records.iter().filter(|r| r.generation == generation) {
                let improved = match &best {
                    Some(b) => is_better(r.fitness, b.fitness, maximise),
                    None => !r.fitness.is_nan(),
                };
                if improved {
                    best = Some(*r);
                }
            }
            self.best_trace.push(best.map_or(f64::NAN, |b| b.fitness));
        }

        self.best = match best {
            Some(r) => {
                let mut population = self.history.population(r.generation)?;
                if r.individual >= population.len() {
                    return Err(Error::Corrupt {
                        path: self.history.root().unwrap_or(Path::new("")).join(r.generation.to_string()),
                        reason: format!("no individual {}", r.individual),
                    });
                }
                Some((population.swap_remove(r.individual), r.fitness))
            }
            None => None,
        };
        Ok(())
    }

    /// Builds the result. If every fitness so far was NaN, the first
    /// individual of the current population is reported with a NaN fitness.
    fn finish(&self) -> Result<OptimiserResult> {
        let (best, best_fitness) = match &self.best {
            Some((best, f)) => (best.clone(), *f),
            None => {
                let first = self
                    .population
                    .first()
                    .ok_or_else(|| Error::Config("the optimiser has not run".into()))?;
                log::warn!("no individual has a comparable fitness");
                (first.clone(), f64::NAN)
            }
        };
        Ok(OptimiserResult {
            best,
            best_fitness,
            generations: self.generation,
            state: self.state,
            fitness_history: self.best_trace.clone(),
        })
    }
}

/// Restricts every family's active subtypes to those used by the parents.
fn prune_subtypes(parents: &[Individual], families: &mut [Family]) {
    for family in families.iter_mut() {
        let used: BTreeSet<usize> = parents
            .iter()
            .flat_map(|p| p.metadata())
            .filter(|inst| inst.family() == family.key())
            .map(|inst| inst.subtype_id())
            .collect();
        family.retain_subtypes(&used);
    }
}

fn is_better(a: f64, b: f64, maximise: bool) -> bool {
    if b.is_nan() {
        return !a.is_nan();
    }
    if maximise {
        a > b
    } else {
        a < b
    }
}

/// First best non-NaN position.
fn best_index(fitness: &[f64], maximise: bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (k, &f) in fitness.iter().enumerate() {
        if f.is_nan() {
            continue;
        }
        if best.map_or(true, |b| is_better(f, fitness[b], maximise)) {
            best = Some(k);
        }
    }
    best
}
