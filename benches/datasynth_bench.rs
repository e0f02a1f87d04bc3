//! Criterion benchmarks for u-datasynth.
//!
//! Measures individual creation, table hashing and short optimiser runs on a
//! cheap fitness function, so the numbers reflect engine overhead.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use u_datasynth::distributions::{Gamma, Normal, Poisson};
use u_datasynth::random::create_stream;
use u_datasynth::{create_individual, ColLimits, DataOptimiser, Family, OptimiserConfig, RowLimits, Table};

fn families() -> Vec<Family> {
    vec![
        Family::new(Arc::new(Normal)).with_stream(create_stream(1)),
        Family::new(Arc::new(Poisson)).with_stream(create_stream(2)),
        Family::new(Arc::new(Gamma)).with_stream(create_stream(3)),
    ]
}

/// Mean of every cell; rewards tables centred on zero.
fn centred(table: &Table) -> f64 {
    let values: Vec<f64> = table.columns().iter().flat_map(|c| c.to_f64()).collect();
    if values.is_empty() {
        return f64::INFINITY;
    }
    (values.iter().sum::<f64>() / values.len() as f64).abs()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_create_individual(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_individual");

    for (rows, cols) in [(10usize, 3usize), (100, 5), (1000, 10)] {
        let row_limits = RowLimits::new(rows, rows);
        let col_limits = ColLimits::total(cols, cols);
        group.bench_with_input(
            BenchmarkId::new(format!("r{}_c{}", rows, cols), rows * cols),
            &(row_limits, col_limits),
            |b, (r, cl)| {
                let mut fams = families();
                let mut seed = 0u64;
                b.iter(|| {
                    seed += 1;
                    let ind = create_individual(black_box(r), black_box(cl), &mut fams, None, create_stream(seed));
                    black_box(ind)
                })
            },
        );
    }
    group.finish();
}

fn bench_content_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_hash");

    for rows in [100usize, 10_000] {
        let mut fams = families();
        let table = create_individual(
            &RowLimits::new(rows, rows),
            &ColLimits::total(5, 5),
            &mut fams,
            None,
            create_stream(9),
        )
        .unwrap()
        .table()
        .clone();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, t| {
            b.iter(|| black_box(t.content_hash()))
        });
    }
    group.finish();
}

fn bench_optimiser(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimiser");
    group.sample_size(10);

    for (size, gens) in [(20usize, 10usize), (50, 10)] {
        let config = OptimiserConfig::default()
            .with_size(size)
            .with_row_limits(5, 50)
            .with_col_limits(ColLimits::total(1, 4))
            .with_max_iter(gens)
            .with_mutation_prob(0.1)
            .with_seed(42);
        group.bench_with_input(
            BenchmarkId::new(format!("p{}_g{}", size, gens), size),
            &config,
            |b, cfg| {
                b.iter(|| {
                    let mut opt = DataOptimiser::new(centred, cfg.clone(), families()).unwrap();
                    black_box(opt.run().unwrap())
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_create_individual, bench_content_hash, bench_optimiser);
criterion_main!(benches);
