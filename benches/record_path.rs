//! Record and query path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use viewstats::core::{ManualClock, TagKey, TagMap, TagValue, Timestamp};
use viewstats::stats::{Aggregation, Measure, MeasureMap, StatsManager, View, ViewName, Window};

fn latency() -> Measure {
    Measure::double("latency", "Request latency", "ms").unwrap()
}

fn method_tags(i: usize) -> TagMap {
    let methods = ["GET", "POST", "PUT", "DELETE"];
    TagMap::new().with(
        TagKey::new("method").unwrap(),
        TagValue::new(methods[i % methods.len()]).unwrap(),
    )
}

fn register_views(manager: &StatsManager, window: Window) -> ViewName {
    let name = ViewName::new("latency_dist").unwrap();
    let view = View::new(
        name.clone(),
        "Latency distribution",
        latency(),
        Aggregation::distribution(vec![1.0, 5.0, 10.0, 50.0, 100.0]).unwrap(),
        vec![TagKey::new("method").unwrap()],
        window,
    )
    .unwrap();
    manager.register_view(view).unwrap();
    name
}

/// Single record through each delivery mode.
fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");
    let measure = latency();
    let tags: Vec<TagMap> = (0..4).map(method_tags).collect();

    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(10)));
    let direct = StatsManager::direct(clock.clone()).unwrap();
    register_views(&direct, Window::Cumulative);
    group.bench_function("direct", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            direct
                .record(&tags[i % tags.len()], MeasureMap::new().put(&measure, black_box(i as f64)))
                .unwrap();
        });
    });

    let queued = StatsManager::queued(clock).unwrap();
    register_views(&queued, Window::Cumulative);
    group.bench_function("queued", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            queued
                .record(&tags[i % tags.len()], MeasureMap::new().put(&measure, black_box(i as f64)))
                .unwrap();
        });
    });
    queued.flush().unwrap();

    group.finish();
}

/// Snapshotting an interval view as the clock moves through buckets.
fn bench_interval_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("interval_snapshot");
    let measure = latency();

    for rows in [1usize, 4] {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(10)));
        let manager = StatsManager::direct(clock.clone()).unwrap();
        let name = register_views(&manager, Window::Interval(Duration::from_secs(60)));
        for i in 0..1000 {
            clock.advance(Duration::from_millis(50));
            manager
                .record(&method_tags(i % rows), MeasureMap::new().put(&measure, i as f64))
                .unwrap();
        }

        group.bench_with_input(BenchmarkId::new("get_view", rows), &name, |b, name| {
            b.iter(|| {
                clock.advance(Duration::from_millis(10));
                black_box(manager.get_view(name).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = record_path;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2));
    targets = bench_record, bench_interval_snapshot
}

criterion_main!(record_path);
