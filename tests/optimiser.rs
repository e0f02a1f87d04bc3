//! End-to-end runs of the optimiser.

use std::sync::Arc;
use u_datasynth::distributions::{Bernoulli, Normal, Poisson, Uniform};
use u_datasynth::random::create_stream;
use u_datasynth::{
    BoxError, ColLimits, DataOptimiser, Error, Fallible, Family, Individual, OptimiserConfig,
    RunState, Table,
};

fn families() -> Vec<Family> {
    vec![
        Family::new(Arc::new(Normal)),
        Family::new(Arc::new(Poisson)).with_max_subtypes(3),
        Family::new(Arc::new(Uniform)),
        Family::new(Arc::new(Bernoulli)),
    ]
}

fn config() -> OptimiserConfig {
    OptimiserConfig::default()
        .with_size(12)
        .with_row_limits(3, 15)
        .with_col_limits(ColLimits::total(1, 4))
        .with_max_iter(5)
        .with_best_prop(0.25)
        .with_lucky_prop(0.1)
        .with_mutation_prob(0.1)
        .with_shrinkage(0.9)
        .with_seed(2024)
}

/// Distance of the grand mean from 1.
fn mean_near_one(table: &Table) -> f64 {
    let values: Vec<f64> = table.columns().iter().flat_map(|c| c.to_f64()).collect();
    if values.is_empty() {
        return f64::MAX;
    }
    (values.iter().sum::<f64>() / values.len() as f64 - 1.0).abs()
}

fn tables(population: &[Individual]) -> Vec<Table> {
    population.iter().map(|ind| ind.table().clone()).collect()
}

fn run(config: OptimiserConfig) -> DataOptimiser<fn(&Table) -> f64> {
    let fitness: fn(&Table) -> f64 = mean_near_one;
    let mut opt = DataOptimiser::new(fitness, config, families()).unwrap();
    opt.run().unwrap();
    opt
}

// ===========================================================================
// Reproducibility
// ===========================================================================

#[test]
fn test_same_seed_same_history() {
    let a = run(config());
    let b = run(config());

    assert_eq!(a.history().len(), b.history().len());
    for gen in 0..a.history().len() {
        let pa = a.history().population(gen).unwrap();
        let pb = b.history().population(gen).unwrap();
        assert_eq!(tables(&pa), tables(&pb), "generation {gen} differs");
    }
    assert_eq!(a.history().fitness().unwrap(), b.history().fitness().unwrap());
}

#[cfg(feature = "parallel")]
#[test]
fn test_worker_count_does_not_change_history() {
    let serial = run(config());
    let parallel = run(config().with_workers(3));
    assert_eq!(tables(serial.population()), tables(parallel.population()));
    assert_eq!(serial.population_fitness(), parallel.population_fitness());
}

#[test]
fn test_unseeded_runs_differ() {
    let mut cfg = config().with_max_iter(0);
    cfg.seed = None;
    let a = run(cfg.clone());
    let b = run(cfg);
    assert_ne!(tables(a.population()), tables(b.population()));
}

// ===========================================================================
// Invariants across a run
// ===========================================================================

#[test]
fn test_every_individual_within_limits() {
    let opt = run(config());
    let cfg = opt.config();
    for gen in 0..opt.history().len() {
        for ind in opt.history().population(gen).unwrap() {
            assert!(cfg.row_limits.contains(ind.nrows()));
            assert!((1..=4).contains(&ind.ncols()));
            for (col, inst) in ind.table().columns().iter().zip(ind.metadata()) {
                assert_eq!(col.dtype(), inst.dtype());
                assert_eq!(col.len(), ind.nrows());
            }
        }
    }
}

#[test]
fn test_per_family_column_limits_respected() {
    let min = vec![1, 0, 0, 1];
    let max = vec![2, 1, 2, 1];
    let cfg = config()
        .with_col_limits(ColLimits::per_family(min.clone(), max.clone()))
        .with_mutation_prob(0.3)
        .with_max_iter(6);
    let opt = run(cfg);

    for gen in 0..opt.history().len() {
        for ind in opt.history().population(gen).unwrap() {
            let counts = ind.family_counts(opt.families()).unwrap();
            for (f, &n) in counts.iter().enumerate() {
                assert!(
                    (min[f]..=max[f]).contains(&n),
                    "generation {gen}: {n} columns of family {f}"
                );
            }
        }
    }
}

#[test]
fn test_family_capacity_respected() {
    let opt = run(config());
    let poisson = opt.families().iter().find(|f| f.key() == "Poisson").unwrap();
    assert!(poisson.n_active() <= 3);
}

#[test]
fn test_fitness_failure_aborts_run() {
    let fitness = Fallible(|t: &Table| -> Result<f64, BoxError> {
        if t.nrows() > 10 {
            Err(format!("{} rows", t.nrows()).into())
        } else {
            Ok(t.nrows() as f64)
        }
    });
    let cfg = config().with_row_limits(11, 12);
    let mut opt = DataOptimiser::new(fitness, cfg, families()).unwrap();
    let err = opt.run().unwrap_err();
    assert!(matches!(err, Error::Fitness { index: 0, .. }));
}

// ===========================================================================
// Disk history
// ===========================================================================

#[test]
fn test_disk_history_matches_memory() {
    let dir = tempfile::tempdir().unwrap();
    let memory = run(config());
    let disk = run(config().with_root(dir.path()));

    let root = dir.path();
    assert!(root.join("config.json").is_file());
    assert!(root.join("fitness.csv").is_file());
    assert!(root.join("run.state").is_file());
    assert!(root.join("subtypes").join("Normal").join("state.bin").is_file());
    assert!(root.join("0").join("0").join("main.csv").is_file());

    assert_eq!(disk.history().root(), Some(root));
    assert_eq!(disk.history().len(), memory.history().len());
    for gen in 0..memory.history().len() {
        let pm = memory.history().population(gen).unwrap();
        let pd = disk.history().population(gen).unwrap();
        assert_eq!(tables(&pm), tables(&pd));
        for (a, b) in pm.iter().zip(&pd) {
            assert_eq!(a.metadata(), b.metadata());
        }
    }
    assert_eq!(memory.history().fitness().unwrap(), disk.history().fitness().unwrap());
}

#[test]
fn test_family_cache_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let opt = run(config().with_root(dir.path()));

    let saved = &opt.families()[0];
    let loaded = Family::load(Arc::new(Normal), dir.path()).unwrap();
    assert_eq!(loaded.all_subtypes(), saved.all_subtypes());
    assert_eq!(loaded.next_subtype_id(), saved.next_subtype_id());
    assert_eq!(loaded.n_active(), saved.all_subtypes().len());
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    let interrupted = tempfile::tempdir().unwrap();
    let straight = tempfile::tempdir().unwrap();

    let first = run(config().with_max_iter(2).with_root(interrupted.path()));
    assert_eq!(first.generation(), 2);

    let fitness: fn(&Table) -> f64 = mean_near_one;
    let mut resumed = DataOptimiser::new(fitness, config(), families()).unwrap();
    let result = resumed.resume(interrupted.path()).unwrap();

    let reference = run(config().with_root(straight.path()));

    assert_eq!(result.state, RunState::Exhausted);
    assert_eq!(result.generations, 5);
    assert_eq!(tables(resumed.population()), tables(reference.population()));
    assert_eq!(resumed.population_fitness(), reference.population_fitness());
    assert_eq!(resumed.history().len(), 6);
    assert_eq!(
        resumed.history().fitness().unwrap(),
        reference.history().fitness().unwrap()
    );
}

#[test]
fn test_reused_root_starts_clean() {
    let reused = tempfile::tempdir().unwrap();
    let clean = tempfile::tempdir().unwrap();

    // A longer, larger run leaves more generations, slots and subtypes behind.
    run(config().with_seed(1).with_max_iter(8).with_root(reused.path()));

    let small = || config().with_seed(2).with_size(8);
    let second = run(small().with_max_iter(2).with_root(reused.path()));
    assert_eq!(second.history().len(), 3);
    assert_eq!(second.history().population(0).unwrap().len(), 8);
    assert!(!reused.path().join("3").exists());
    assert_eq!(
        second.history().fitness().unwrap(),
        run(small().with_max_iter(2)).history().fitness().unwrap()
    );

    let loaded = Family::load(Arc::new(Normal), reused.path()).unwrap();
    assert_eq!(loaded.all_subtypes(), second.families()[0].all_subtypes());

    let fitness: fn(&Table) -> f64 = mean_near_one;
    let mut resumed = DataOptimiser::new(fitness, small(), families()).unwrap();
    resumed.resume(reused.path()).unwrap();
    let reference = run(small().with_root(clean.path()));
    assert_eq!(tables(resumed.population()), tables(reference.population()));
    assert_eq!(
        resumed.history().fitness().unwrap(),
        reference.history().fitness().unwrap()
    );
}

#[test]
fn test_resume_ignores_family_caches_ahead_of_checkpoint() {
    let interrupted = tempfile::tempdir().unwrap();
    run(config().with_max_iter(2).with_root(interrupted.path()));

    // Caches written for a generation that never reached the checkpoint.
    let mut ahead = Family::new(Arc::new(Normal)).with_stream(create_stream(99));
    for _ in 0..6 {
        ahead.add_subtype(None);
    }
    ahead.save(interrupted.path()).unwrap();

    let fitness: fn(&Table) -> f64 = mean_near_one;
    let mut resumed = DataOptimiser::new(fitness, config(), families()).unwrap();
    resumed.resume(interrupted.path()).unwrap();
    let reference = run(config());

    assert_eq!(tables(resumed.population()), tables(reference.population()));
    assert_eq!(resumed.population_fitness(), reference.population_fitness());
    assert_eq!(
        resumed.families()[0].all_subtypes(),
        reference.families()[0].all_subtypes()
    );
}

#[test]
fn test_resume_rejects_other_size() {
    let dir = tempfile::tempdir().unwrap();
    run(config().with_max_iter(1).with_root(dir.path()));

    let fitness: fn(&Table) -> f64 = mean_near_one;
    let mut opt = DataOptimiser::new(fitness, config().with_size(20), families()).unwrap();
    assert!(matches!(opt.resume(dir.path()), Err(Error::Config(_))));
}
