// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pin churn against `rstar`: zero-area boxes that keep moving a little,
//! with a window query after every round, like a drag over a dense board.

#![cfg(feature = "compare_rstar")]

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use strata_index::{Aabb2D, Key, RTreeIndex};

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

type Pin = GeomWithData<[f64; 2], u32>;

struct Rng(u64);

impl Rng {
    fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        ((x >> 11) as f64) / ((1_u64 << 53) as f64)
    }

    fn jitter(&mut self, p: [f64; 2]) -> [f64; 2] {
        [p[0] + self.next_f64() - 0.5, p[1] + self.next_f64() - 0.5]
    }
}

/// Pins on a 2.54 pitch with a few per footprint cell.
fn gen_pins(n: usize) -> Vec<[f64; 2]> {
    let mut rng = Rng(0x5eed_0f_b0a2d);
    let side = (n as f64).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            let x = (i % side) as f64 * 2.54;
            let y = (i / side) as f64 * 2.54;
            [x + rng.next_f64() * 0.1, y + rng.next_f64() * 0.1]
        })
        .collect()
}

fn pin_box(p: [f64; 2]) -> Aabb2D<f64> {
    Aabb2D::from_xywh(p[0], p[1], 0.0, 0.0)
}

fn bench_pin_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_pin_churn");
    for &n in &[4_096_usize, 16_384] {
        let pins = gen_pins(n);
        let window = Aabb2D::<f64>::from_xywh(20.0, 20.0, 60.0, 60.0);
        // Every tenth pin moves per round.
        group.throughput(Throughput::Elements((n / 10) as u64));

        group.bench_function(format!("strata_update_query_n{n}"), |b| {
            let mut idx = RTreeIndex::<f64, u32>::new();
            let mut pos = pins.clone();
            let keys: Vec<Key> = pos
                .iter()
                .enumerate()
                .map(|(i, &p)| idx.insert(pin_box(p), i as u32))
                .collect();
            let mut rng = Rng(7);
            let mut round = 0;
            b.iter(|| {
                for i in (round % 10..n).step_by(10) {
                    pos[i] = rng.jitter(pos[i]);
                    idx.update(keys[i], pin_box(pos[i]));
                }
                round += 1;
                black_box(idx.query_rect(window).len())
            });
        });

        group.bench_function(format!("rstar_remove_insert_query_n{n}"), |b| {
            let mut pos = pins.clone();
            let mut tree = RTree::bulk_load(
                pos.iter()
                    .enumerate()
                    .map(|(i, &p)| Pin::new(p, i as u32))
                    .collect(),
            );
            let mut rng = Rng(7);
            let mut round = 0;
            let envelope = AABB::from_corners(
                [window.min_x, window.min_y],
                [window.max_x, window.max_y],
            );
            b.iter(|| {
                for i in (round % 10..n).step_by(10) {
                    tree.remove(&Pin::new(pos[i], i as u32));
                    pos[i] = rng.jitter(pos[i]);
                    tree.insert(Pin::new(pos[i], i as u32));
                }
                round += 1;
                black_box(tree.locate_in_envelope_intersecting(&envelope).count())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pin_churn);
criterion_main!(benches);
