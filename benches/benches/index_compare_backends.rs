// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use strata_index::{Aabb2D, FlatIndex, Key, RTreeIndex};

fn gen_grid_rects(n: usize, cell: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push(Aabb2D::<f64>::from_xywh(x0, y0, cell, cell));
        }
    }
    out
}

fn gen_grid_rects_i64(n: usize, cell: i64) -> Vec<Aabb2D<i64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as i64 * cell;
            let y0 = y as i64 * cell;
            out.push(Aabb2D::new(x0, y0, x0 + cell, y0 + cell));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_clustered_rects(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        centers.push((rng.next_f64() * 2000.0, rng.next_f64() * 2000.0));
    }
    for (cx, cy) in centers {
        for _ in 0..per_cluster {
            let dx = (rng.next_f64() - 0.5) * spread;
            let dy = (rng.next_f64() - 0.5) * spread;
            out.push(Aabb2D::<f64>::from_xywh(cx + dx, cy + dy, 12.0, 12.0));
        }
    }
    out
}

fn bench_build_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_query_f64");
    let window = Aabb2D::<f64>::from_xywh(100.0, 100.0, 400.0, 400.0);
    for &n in &[32usize, 64, 128] {
        let rects = gen_grid_rects(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("flatvec_n{n}"), |b| {
            b.iter_batched(
                FlatIndex::<f64, u32>::new,
                |mut idx| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    black_box(idx.query_rect(window).len());
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("rtree_n{n}"), |b| {
            b.iter_batched(
                RTreeIndex::<f64, u32>::new,
                |mut idx| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    black_box(idx.query_rect(window).len());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_query_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_clustered_f64");
    let rects = gen_clustered_rects(32, 256, 120.0);
    let mut flat = FlatIndex::<f64, u32>::new();
    let mut rtree = RTreeIndex::<f64, u32>::new();
    for (i, r) in rects.iter().copied().enumerate() {
        flat.insert(r, i as u32);
        rtree.insert(r, i as u32);
    }
    let window = Aabb2D::<f64>::from_xywh(800.0, 800.0, 400.0, 400.0);
    group.throughput(Throughput::Elements(rects.len() as u64));
    group.bench_function("flatvec", |b| {
        b.iter(|| {
            let mut hits = 0_usize;
            flat.visit_rect(window, |_, _| {
                hits += 1;
                true
            });
            black_box(hits)
        });
    });
    group.bench_function("rtree", |b| {
        b.iter(|| {
            let mut hits = 0_usize;
            rtree.visit_rect(window, |_, _| {
                hits += 1;
                true
            });
            black_box(hits)
        });
    });
    group.bench_function("rtree_first_hit", |b| {
        b.iter(|| black_box(!rtree.visit_rect(window, |_, _| false)));
    });
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn_i64");
    for &n in &[32usize, 64] {
        let rects = gen_grid_rects_i64(n, 10);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("rtree_move_all_n{n}"), |b| {
            b.iter_batched(
                || {
                    let mut idx = RTreeIndex::<i64, u32>::new();
                    let keys: Vec<Key> = rects
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, r)| idx.insert(r, i as u32))
                        .collect();
                    (idx, keys)
                },
                |(mut idx, keys)| {
                    for (k, r) in keys.iter().zip(&rects) {
                        let moved = Aabb2D::new(r.min_x + 3, r.min_y + 3, r.max_x + 3, r.max_y + 3);
                        idx.update(*k, moved);
                    }
                    black_box(idx.len());
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("rtree_remove_half_n{n}"), |b| {
            b.iter_batched(
                || {
                    let mut idx = RTreeIndex::<i64, u32>::new();
                    let keys: Vec<Key> = rects
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, r)| idx.insert(r, i as u32))
                        .collect();
                    (idx, keys)
                },
                |(mut idx, keys)| {
                    for k in keys.iter().step_by(2) {
                        let _ = idx.remove(*k);
                    }
                    black_box(idx.len());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build_query, bench_query_only, bench_churn);
criterion_main!(benches);
