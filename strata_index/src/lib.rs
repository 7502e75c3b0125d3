// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=strata_index --heading-base-level=0

//! Strata Index: a generic 2D AABB index.
//!
//! Strata Index is the spatial building block under a layered scene view:
//! one index per layer answers "what intersects this rectangle" in
//! better-than-linear time while entries churn.
//!
//! - Insert, update, and remove axis-aligned bounding boxes (AABBs) with copyable payloads.
//! - Query by point or intersecting rectangle, collecting or through a short-circuiting visitor.
//! - Generational [`Key`] handles: a removed entry's key never aliases a newer one.
//!
//! It is generic over the scalar type `T` and does not depend on any geometry crate.
//! Boxes are closed, so zero-area boxes (points, hairlines) are found by any
//! query that touches them.
//!
//! Changes are applied to the backend immediately; there is no batching step.
//!
//! # Example
//!
//! ```rust
//! use strata_index::{Aabb2D, RTreeIndex};
//!
//! let mut idx: RTreeIndex<i64, u32> = RTreeIndex::new();
//! let k1 = idx.insert(Aabb2D::new(0, 0, 10, 10), 1);
//! let _k2 = idx.insert(Aabb2D::new(5, 5, 15, 15), 2);
//!
//! // Move the first box out of the way.
//! idx.update(k1, Aabb2D::new(20, 0, 30, 10));
//!
//! // Query a point inside the second box.
//! let hits = idx.query_point(6, 6);
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].1, 2);
//!
//! // Touching edges count as intersecting.
//! assert_eq!(idx.query_rect(Aabb2D::new(30, 10, 40, 20)).len(), 1);
//! ```
//!
//! ## Choosing a backend
//!
//! - `RTreeF64`/`RTreeI64` (via [`RTreeIndex`]): R-tree with area/margin splits, widened
//!   metrics, and condense-on-remove. The general-purpose choice.
//! - [`FlatVec`] (via [`FlatIndex`]): linear scans. Good for very small sets and as a
//!   reference implementation in tests.
//!
//! ### Mixed integer and float coordinates
//!
//! Integer boxes convert to float with [`Aabb2D::to_f64`], exactly up to 2^53.
//! Float boxes convert to integer with [`Aabb2D::from_f64_outward`], which floors
//! minimum edges and ceils maximum edges so the integer box always covers the
//! float one.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod index;
pub mod types;

pub use backend::Backend;
pub use backends::flatvec::FlatVec;
pub use backends::rtree::{RTree, RTreeF64, RTreeI64};
pub use index::{FlatIndex, Key, RTreeIndex, SpatialIndex};
pub use types::{Aabb2D, Scalar};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn backends_agree_on_degenerate_and_touching_boxes() {
        let boxes = [
            Aabb2D::new(0.0, 0.0, 10.0, 10.0),
            Aabb2D::point(10.0, 10.0),
            Aabb2D::new(10.0, -5.0, 10.0, 20.0),
            Aabb2D::new(11.0, 11.0, 12.0, 12.0),
        ];
        let mut rtree: RTreeIndex<f64, usize> = RTreeIndex::new();
        let mut flat: FlatIndex<f64, usize> = FlatIndex::new();
        for (i, b) in boxes.iter().enumerate() {
            rtree.insert(*b, i);
            flat.insert(*b, i);
        }
        let q = Aabb2D::new(10.0, 10.0, 10.5, 10.5);
        let mut a: Vec<usize> = rtree.query_rect(q).into_iter().map(|(_, p)| p).collect();
        let mut b: Vec<usize> = flat.query_rect(q).into_iter().map(|(_, p)| p).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, [0, 1, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn removed_entries_disappear_from_queries() {
        let mut idx: RTreeIndex<i64, u32> = RTreeIndex::new();
        let k = idx.insert(Aabb2D::new(0, 0, 10, 10), 1);
        idx.insert(Aabb2D::new(0, 0, 10, 10), 2);
        idx.remove(k);
        let hits: Vec<u32> = idx.query_point(1, 1).into_iter().map(|(_, p)| p).collect();
        assert_eq!(hits, [2]);
    }
}
