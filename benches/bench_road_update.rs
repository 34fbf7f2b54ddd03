// benches/bench_road_update.rs
use adaptive_signal::models::demand::RandomNoise;
use adaptive_signal::models::road::{apply_synthetic_demand, Road, RoadId, RoadParams};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::{Duration, Instant};

fn bench_apply_synthetic_demand(c: &mut Criterion) {
    c.bench_function("apply_synthetic_demand", |b| {
        b.iter(|| {
            black_box(apply_synthetic_demand(
                black_box(40.0),
                black_box(1000.0),
                black_box(1.5),
                black_box(false),
                black_box(1.1),
            ))
        });
    });
}

fn bench_road_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("road_refresh");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("simulate_and_roll_emergency", |b| {
        let mut road = Road::new(RoadId(1), &RoadParams::new("Road 1", 40.0, 1000.0, 300.0, 1.0));
        let mut noise = RandomNoise::seeded(3);
        let start = Instant::now();
        let window = Duration::from_secs(5);
        let mut step = 0u64;
        b.iter(|| {
            step += 1;
            let now = start + Duration::from_secs(step);
            road.simulate_demand(&mut noise);
            road.roll_emergency(&mut noise, now, 0.005);
            road.expire_emergency(now, window);
            black_box(road.green_time());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_apply_synthetic_demand, bench_road_refresh);
criterion_main!(benches);
