use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mp_tiles::{
    Contribution, CoordinateOrigin, GlobalProfile, MergeConfig, ProfileSlice, TileId, TileMerger,
};

fn slice(len: usize, seed: usize) -> ProfileSlice {
    ProfileSlice {
        distances: (0..len).map(|i| ((i * 7 + seed) as f64 * 0.1).sin().abs()).collect(),
        indices: (0..len).map(|i| (i * 13 + seed) % len).collect(),
    }
}

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile_fold");
    for n in [10_000, 100_000, 1_000_000] {
        let s = slice(n, 3);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut mp = GlobalProfile::new(n);
            b.iter(|| mp.fold(0, black_box(&s.distances), black_box(&s.indices), 0))
        });
    }
    group.finish();
}

fn bench_merge_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_self_join_grid");
    group.sample_size(10);
    for tiles in [4, 8, 16] {
        let width = 10_000;
        let config = MergeConfig::new(width, width, tiles * width, true);
        let contributions: Vec<_> = (0..tiles)
            .flat_map(|r| (r..tiles).map(move |c| TileId::new(r, c)))
            .map(|t| (t, slice(width, t.row * tiles + t.col)))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(tiles), &tiles, |b, _| {
            b.iter(|| {
                let mut merger = TileMerger::new(&config, CoordinateOrigin::default(), tiles * width);
                for (tile, s) in &contributions {
                    merger.apply(*tile, Contribution::A, s).unwrap();
                    if !tile.is_diagonal() {
                        merger.apply(*tile, Contribution::B, s).unwrap();
                    }
                }
                merger.into_profile()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fold, bench_merge_grid);
criterion_main!(benches);
