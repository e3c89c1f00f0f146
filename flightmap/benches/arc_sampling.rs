use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flightmap::{sphere, synth, trajectory::TrajectorySampler};
use shared::GeoPoint;

fn benchmark_route_arcs(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_arc");

    let test_cases = vec![
        ("jfk_lax", GeoPoint::new(40.6413, -73.7781), GeoPoint::new(33.9416, -118.4085)),
        ("lhr_nrt", GeoPoint::new(51.4700, -0.4543), GeoPoint::new(35.7720, 140.3929)),
        ("near_antipodal", GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 179.999)),
    ];

    for (name, start, end) in test_cases {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(start, end),
            |b, &(start, end)| {
                b.iter(|| sphere::arc(black_box(start), black_box(end), 50));
            },
        );
    }

    group.finish();
}

fn benchmark_trajectory_sampling(c: &mut Criterion) {
    let sampler = TrajectorySampler::default();
    let now = Utc.with_ymd_and_hms(2025, 12, 30, 12, 0, 0).unwrap();

    c.bench_function("sample_trajectory_synthetic_pair", |b| {
        b.iter(|| sampler.sample_codes(black_box("ZZZ"), black_box("QQQ"), now));
    });
}

fn benchmark_seed(c: &mut Criterion) {
    c.bench_function("synthetic_coordinate", |b| {
        b.iter(|| synth::synthetic_coordinate(black_box("XYZ")));
    });
}

criterion_group!(
    benches,
    benchmark_route_arcs,
    benchmark_trajectory_sampling,
    benchmark_seed
);
criterion_main!(benches);
