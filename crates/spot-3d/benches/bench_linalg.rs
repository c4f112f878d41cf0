use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use spot_3d::linalg::svd3;
use spot_3d::pointcloud::PointCloud;
use spot_3d::rigid::RigidTransform;
use spot_3d::transforms::axis_angle_to_rotation_matrix;

fn bench_transform_inplace(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_inplace");
    let mut rng = StdRng::seed_from_u64(42);

    let rotation = axis_angle_to_rotation_matrix(&[0.3, 1.0, -0.2], 0.5).unwrap();
    let transform = RigidTransform::with_scale(rotation, [0.1, -0.4, 2.0], 1.01);

    for num_points in [1_000, 10_000, 100_000] {
        let cloud = PointCloud::new(
            (0..num_points)
                .map(|_| [rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>()])
                .collect::<Vec<_>>(),
        );

        group.bench_with_input(BenchmarkId::new("f32", num_points), &cloud, |b, cloud| {
            let mut moved = cloud.clone();
            b.iter(|| moved.transform_inplace(black_box(&transform)))
        });
    }
    group.finish();
}

fn bench_svd3(c: &mut Criterion) {
    let m = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 10.0]];
    c.bench_function("svd3", |b| b.iter(|| svd3(black_box(&m))));
}

criterion_group!(benches, bench_transform_inplace, bench_svd3);
criterion_main!(benches);
