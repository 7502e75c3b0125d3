// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Strata Index: insert, update, remove, and query.

use strata_index::{Aabb2D, RTreeIndex};

fn main() {
    let mut idx: RTreeIndex<i64, u32> = RTreeIndex::new();
    let k1 = idx.insert(Aabb2D::new(0, 0, 10, 10), 1);
    let k2 = idx.insert(Aabb2D::new(5, 5, 15, 15), 2);

    // Move box 1
    idx.update(k1, Aabb2D::new(20, 0, 30, 10));
    println!("box 1 now at {:?}", idx.get(k1));

    // Query a point
    let hits = idx.query_point(6, 6);
    println!("hits at (6,6): {hits:?}");

    // Stale keys are ignored once removed.
    println!("removed payload: {:?}", idx.remove(k2));
    println!("second remove: {:?}", idx.remove(k2));

    // Float boxes round outward onto the integer grid.
    let snapped = Aabb2D::<i64>::from_f64_outward(Aabb2D::new(0.5, 0.5, 3.2, 3.9));
    println!("snapped: {snapped:?}");
}
