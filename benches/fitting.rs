//! Benchmarks for meterfit interpolation/extrapolation performance

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use meterfit::{Algorithm, Datapoint, ReadHistory};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn generate_readings(count: usize) -> Vec<Datapoint> {
    (0..count)
        .map(|i| {
            let value = 1000.0 + i as f64 * 12.5;
            Datapoint::new(value, start() + TimeDelta::hours(i as i64 * 37))
        })
        .collect()
}

fn bench_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation");
    let algorithm = Algorithm::default();

    // One week gap -> 167 hourly points
    let prev = Datapoint::new(100.0, start());
    let new = Datapoint::new(268.0, start() + TimeDelta::days(7));
    group.throughput(Throughput::Elements(167));

    group.bench_function("week_gap", |b| {
        b.iter(|| {
            let missing = algorithm.interpolate(black_box(&[prev]), black_box(&new));
            black_box(missing);
        })
    });

    group.finish();
}

fn bench_extrapolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("extrapolation");
    let algorithm = Algorithm::default();
    let points = generate_readings(11);
    let now = start() + TimeDelta::days(30);

    group.bench_function("full_history", |b| {
        b.iter(|| {
            let estimate = algorithm.extrapolate(black_box(&points), now);
            black_box(estimate);
        })
    });

    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");
    let readings = generate_readings(1000);
    group.throughput(Throughput::Elements(1000));

    group.bench_function("record_1000", |b| {
        b.iter(|| {
            let mut history = ReadHistory::new();
            for reading in &readings {
                history.record(*reading).ok();
            }
            black_box(history);
        })
    });

    group.bench_function("record_and_backfill_1000", |b| {
        let algorithm = Algorithm::default();
        b.iter(|| {
            let mut history = ReadHistory::new();
            let mut total = 0usize;
            for reading in &readings {
                if history.record(*reading).is_ok() {
                    total += algorithm.interpolate(history.previous(), reading).len();
                }
            }
            black_box(total);
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_interpolation,
    bench_extrapolation,
    bench_history
);
criterion_main!(benches);
