// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::types::Aabb2D;

/// Spatial backend abstraction used by [`SpatialIndex`](crate::SpatialIndex).
///
/// Backends only see dense slot numbers; the index owns keys and payloads.
pub trait Backend<T: Copy + PartialOrd + Debug> {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Update an existing slot's AABB.
    fn update(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Remove a slot from the spatial structure. Unknown slots are ignored.
    fn remove(&mut self, slot: usize);

    /// Clear all spatial structures.
    fn clear(&mut self);

    /// Visit slots whose AABB intersects `rect` until `visit` returns `false`.
    ///
    /// Returns `false` if the visit was cut short.
    fn visit_rect(&self, rect: Aabb2D<T>, visit: &mut dyn FnMut(usize) -> bool) -> bool;

    /// Collect slots whose AABB intersects the rectangle.
    fn query_rect(&self, rect: Aabb2D<T>) -> Vec<usize> {
        let mut out = Vec::new();
        self.visit_rect(rect, &mut |slot| {
            out.push(slot);
            true
        });
        out
    }
}
