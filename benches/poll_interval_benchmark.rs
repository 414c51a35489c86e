use chrono::NaiveTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ismart_bridge::services::presence::haversine_distance_m;
use ismart_bridge::services::scheduler::{next_poll_interval, SchedulerConfig};

fn benchmark_scheduler(c: &mut Criterion) {
    let config = SchedulerConfig::from_hours(180, 3600, 22, 6);

    let mut group = c.benchmark_group("poll_interval");

    let night = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
    group.bench_function("night_at_home", |b| {
        b.iter(|| next_poll_interval(black_box(night), black_box(true), &config))
    });

    let transition = NaiveTime::from_hms_opt(6, 10, 0).unwrap();
    group.bench_function("transition_window", |b| {
        b.iter(|| next_poll_interval(black_box(transition), black_box(true), &config))
    });

    group.finish();
}

fn benchmark_haversine(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance_m(
                black_box(48.8606),
                black_box(2.3522),
                black_box(48.8566),
                black_box(2.3522),
            )
        })
    });
}

criterion_group!(benches, benchmark_scheduler, benchmark_haversine);
criterion_main!(benches);
