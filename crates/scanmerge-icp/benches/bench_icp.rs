use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use scanmerge_3d::{PointCloud, RigidTransform};
use scanmerge_icp::{align, find_correspondences, CorrespondenceBackend, IcpConfig, KdTreeSearch};

fn random_cloud(num_points: usize) -> PointCloud {
    PointCloud::from_points(
        (0..num_points)
            .map(|_| {
                [
                    rand::random::<f64>(),
                    rand::random::<f64>(),
                    rand::random::<f64>(),
                ]
            })
            .collect(),
    )
}

fn bench_correspondences(c: &mut Criterion) {
    let mut group = c.benchmark_group("correspondences");

    for num_points in [100, 1000, 5000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);

        let target = random_cloud(*num_points);
        let source = target.transformed(&RigidTransform::from_translation([0.01, 0.0, 0.0]));

        group.bench_function(BenchmarkId::new("brute_force", &parameter_string), |b| {
            b.iter(|| find_correspondences(black_box(source.points()), target.points(), 0.25));
        });

        let search = KdTreeSearch::new(target.points());
        group.bench_function(BenchmarkId::new("kdtree", &parameter_string), |b| {
            b.iter(|| search.find_correspondences(black_box(source.points()), 0.25));
        });
    }
}

fn bench_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("align");

    let target = random_cloud(1000);
    let motion = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], 0.02, [0.02, 0.0, 0.01])
        .expect("valid axis");
    let source = target.transformed(&motion);

    for backend in [CorrespondenceBackend::BruteForce, CorrespondenceBackend::KdTree] {
        let config = IcpConfig {
            backend,
            ..Default::default()
        };
        group.bench_function(format!("{:?}", backend), |b| {
            b.iter(|| align(black_box(&source), black_box(&target), &config));
        });
    }
}

criterion_group!(benches, bench_correspondences, bench_align);
criterion_main!(benches);
