//! Fitness evaluation.
//!
//! A generation's fitness is a batch of independent tasks. [`Evaluator`]
//! runs the batch serially, or on a dedicated rayon pool when built with
//! more than one worker and the `parallel` feature. Results always line up
//! with the input order. A [`FitnessCache`] keyed by the table's content
//! hash guarantees that no table is evaluated twice in a run.

use crate::error::{BoxError, Error, Result};
use crate::individual::Individual;
use crate::table::Table;
use std::collections::{HashMap, HashSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A real-valued score of a dataset.
///
/// Any `Fn(&Table) -> f64 + Send + Sync` closure is a fitness function; use
/// [`Fallible`] for closures that can fail. Extra arguments are captured by
/// the closure.
pub trait FitnessFunction: Send + Sync {
    fn evaluate(&self, table: &Table) -> std::result::Result<f64, BoxError>;
}

impl<F> FitnessFunction for F
where
    F: Fn(&Table) -> f64 + Send + Sync,
{
    fn evaluate(&self, table: &Table) -> std::result::Result<f64, BoxError> {
        Ok(self(table))
    }
}

/// Adapts a closure returning `Result` into a [`FitnessFunction`].
pub struct Fallible<F>(pub F);

impl<F> FitnessFunction for Fallible<F>
where
    F: Fn(&Table) -> std::result::Result<f64, BoxError> + Send + Sync,
{
    fn evaluate(&self, table: &Table) -> std::result::Result<f64, BoxError> {
        (self.0)(table)
    }
}

/// Memoised fitness values keyed by [`Table::content_hash`].
#[derive(Debug, Clone, Default)]
pub struct FitnessCache {
    values: HashMap<String, f64>,
    hits: usize,
    misses: usize,
}

impl FitnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Option<f64> {
        self.values.get(hash).copied()
    }

    pub fn insert(&mut self, hash: String, fitness: f64) {
        self.values.insert(hash, fitness);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Tables that had to be evaluated.
    pub fn misses(&self) -> usize {
        self.misses
    }
}

/// Runs fitness batches, serially or on a bounded worker pool.
pub struct Evaluator {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Evaluator {
    /// Creates an evaluator with `workers` threads. `None` or `Some(1)`
    /// evaluates on the calling thread.
    ///
    /// # Errors
    /// [`Error::Config`] for zero workers, [`Error::Pool`] if the pool
    /// cannot be built.
    pub fn new(workers: Option<usize>) -> Result<Self> {
        if workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".into()));
        }

        #[cfg(feature = "parallel")]
        {
            let pool = match workers {
                Some(n) if n > 1 => Some(
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .thread_name(|i| format!("fitness-{i}"))
                        .build()
                        .map_err(|e| Error::Pool(e.to_string()))?,
                ),
                _ => None,
            };
            Ok(Self { pool })
        }

        #[cfg(not(feature = "parallel"))]
        {
            if workers.is_some_and(|n| n > 1) {
                log::warn!("built without the `parallel` feature; evaluating serially");
            }
            Ok(Self {})
        }
    }

    /// Number of threads fitness runs on.
    pub fn workers(&self) -> usize {
        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.current_num_threads();
        }
        1
    }

    /// Evaluates `population`, consulting and filling `cache`.
    ///
    /// Each distinct table not already cached is evaluated exactly once. The
    /// returned values follow the population order and are also cached on
    /// each individual.
    ///
    /// # Errors
    /// [`Error::Fitness`] for the first failing individual in population
    /// order. Nothing is cached from a failed batch.
    pub fn evaluate<F>(
        &self,
        fitness: &F,
        population: &mut [Individual],
        cache: &mut FitnessCache,
    ) -> Result<Vec<f64>>
    where
        F: FitnessFunction + ?Sized,
    {
        let hashes: Vec<String> = population.iter().map(|ind| ind.table().content_hash()).collect();

        let mut pending = Vec::new();
        let mut queued = HashSet::new();
        let mut hits = 0;
        for (k, hash) in hashes.iter().enumerate() {
            if cache.values.contains_key(hash) || !queued.insert(hash.as_str()) {
                hits += 1;
            } else {
                pending.push(k);
            }
        }

        let tables: Vec<&Table> = pending.iter().map(|&k| population[k].table()).collect();
        let results = self.run(fitness, &tables);

        let mut fresh = Vec::with_capacity(pending.len());
        for (&k, result) in pending.iter().zip(results) {
            let value = result.map_err(|source| Error::Fitness { index: k, source })?;
            fresh.push((k, value));
        }
        // Counters move only once the whole batch has succeeded.
        cache.hits += hits;
        cache.misses += fresh.len();
        for (k, value) in fresh {
            cache.insert(hashes[k].clone(), value);
        }
        log::debug!(
            "fitness: {} evaluated, {} cached",
            pending.len(),
            population.len() - pending.len()
        );

        let mut values = Vec::with_capacity(population.len());
        for (ind, hash) in population.iter_mut().zip(&hashes) {
            let value = cache.get(hash).unwrap_or(f64::NAN);
            ind.set_fitness(value);
            values.push(value);
        }
        Ok(values)
    }

    fn run<F>(&self, fitness: &F, tables: &[&Table]) -> Vec<std::result::Result<f64, BoxError>>
    where
        F: FitnessFunction + ?Sized,
    {
        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.install(|| tables.par_iter().map(|t| fitness.evaluate(t)).collect());
        }
        tables.iter().map(|t| fitness.evaluate(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::Normal;
    use crate::family::Family;
    use crate::random::create_stream;
    use crate::table::Column;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn individual(values: Vec<f64>) -> Individual {
        let table = Table::from_columns(values.len(), vec![Column::Float(values)]);
        let mut family = Family::new(Arc::new(Normal)).with_stream(create_stream(0));
        let inst = family.make_instance(&mut create_stream(0)).unwrap();
        Individual::new(table, vec![inst], create_stream(0)).unwrap()
    }

    fn sum(table: &Table) -> f64 {
        table.columns().iter().flat_map(Column::to_f64).sum()
    }

    #[test]
    fn test_values_in_input_order() {
        let evaluator = Evaluator::new(None).unwrap();
        let mut pop = vec![individual(vec![1.0, 2.0]), individual(vec![5.0]), individual(vec![-1.0])];
        let mut cache = FitnessCache::new();
        let values = evaluator.evaluate(&sum, &mut pop, &mut cache).unwrap();
        assert_eq!(values, vec![3.0, 5.0, -1.0]);
        assert_eq!(pop[1].fitness(), Some(5.0));
    }

    #[test]
    fn test_repeated_tables_evaluated_once() {
        let calls = AtomicUsize::new(0);
        let counting = |t: &Table| {
            calls.fetch_add(1, Ordering::SeqCst);
            sum(t)
        };
        let evaluator = Evaluator::new(None).unwrap();
        let mut cache = FitnessCache::new();

        let mut pop = vec![individual(vec![1.0]), individual(vec![1.0]), individual(vec![2.0])];
        evaluator.evaluate(&counting, &mut pop, &mut cache).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mut again = vec![individual(vec![2.0]), individual(vec![1.0])];
        let values = evaluator.evaluate(&counting, &mut again, &mut cache).unwrap();
        assert_eq!(values, vec![2.0, 1.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 3);
    }

    #[test]
    fn test_failure_reports_first_index() {
        let failing = Fallible(|t: &Table| -> std::result::Result<f64, BoxError> {
            let s = sum(t);
            if s < 0.0 {
                Err("negative".into())
            } else {
                Ok(s)
            }
        });
        let evaluator = Evaluator::new(None).unwrap();
        let mut cache = FitnessCache::new();
        let mut pop = vec![
            individual(vec![1.0]),
            individual(vec![1.0]),
            individual(vec![-1.0]),
            individual(vec![-2.0]),
        ];
        let err = evaluator.evaluate(&failing, &mut pop, &mut cache).unwrap_err();
        assert!(matches!(err, Error::Fitness { index: 2, .. }));
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(Evaluator::new(Some(0)), Err(Error::Config(_))));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_serial() {
        let serial = Evaluator::new(None).unwrap();
        let parallel = Evaluator::new(Some(3)).unwrap();
        assert_eq!(parallel.workers(), 3);

        let make = || (0..20).map(|i| individual(vec![i as f64, 0.5])).collect::<Vec<_>>();
        let (mut a, mut b) = (make(), make());
        let va = serial.evaluate(&sum, &mut a, &mut FitnessCache::new()).unwrap();
        let vb = parallel.evaluate(&sum, &mut b, &mut FitnessCache::new()).unwrap();
        assert_eq!(va, vb);
    }
}
