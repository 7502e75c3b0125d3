// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `SpatialIndex` API, generic over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::flatvec::FlatVec;
use crate::backends::rtree::RTree;
use crate::types::{Aabb2D, Scalar};

/// Generational handle for entries.
///
/// A key stays valid until its entry is removed; a reused slot gets a new
/// generation, so stale keys never alias a newer entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Slots are 32-bit; an index never holds more than u32::MAX entries."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct Slot<T, P> {
    generation: u32,
    entry: Option<(Aabb2D<T>, P)>,
}

/// A 2D AABB index parameterized by a spatial backend.
///
/// Changes reach the backend immediately: a query issued right after
/// [`insert`](Self::insert) sees the new entry.
#[derive(Debug)]
pub struct SpatialIndex<T: Copy + PartialOrd + Debug, P: Copy + Debug, B: Backend<T>> {
    slots: Vec<Slot<T, P>>,
    free_list: Vec<usize>,
    len: usize,
    backend: B,
}

impl<T, P, B> SpatialIndex<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T> + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<T, P, B> Default for SpatialIndex<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P, B> SpatialIndex<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T>,
{
    /// Create an empty index around an already configured backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            backend,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a new AABB with payload. Returns a stable handle `Key`.
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> Key {
        let idx = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx];
            slot.generation = slot.generation.wrapping_add(1);
            slot.entry = Some((aabb, payload));
            idx
        } else {
            self.slots.push(Slot {
                generation: 1,
                entry: Some((aabb, payload)),
            });
            self.slots.len() - 1
        };
        self.backend.insert(idx, aabb);
        self.len += 1;
        Key::new(idx, self.slots[idx].generation)
    }

    /// Move an existing entry. Returns `false` for stale keys.
    pub fn update(&mut self, key: Key, aabb: Aabb2D<T>) -> bool {
        let Some((bbox, _)) = self.entry_mut(key) else {
            return false;
        };
        if *bbox != aabb {
            *bbox = aabb;
            self.backend.update(key.idx(), aabb);
        }
        true
    }

    /// Remove an entry, returning its payload. Stale keys yield `None`.
    pub fn remove(&mut self, key: Key) -> Option<P> {
        let slot = self.slots.get_mut(key.idx())?;
        if slot.generation != key.1 {
            return None;
        }
        let (_, payload) = slot.entry.take()?;
        self.backend.remove(key.idx());
        self.free_list.push(key.idx());
        self.len -= 1;
        Some(payload)
    }

    /// The box and payload stored under `key`.
    pub fn get(&self, key: Key) -> Option<(Aabb2D<T>, P)> {
        let slot = self.slots.get(key.idx())?;
        if slot.generation != key.1 {
            return None;
        }
        slot.entry
    }

    /// Whether `key` refers to a live entry.
    pub fn contains_key(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Remove every entry. Outstanding keys become stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free_list.push(i);
        }
        // Pop order hands out low slots first.
        self.free_list.reverse();
        self.backend.clear();
        self.len = 0;
    }

    /// Visit entries whose AABB intersects `rect` until `visit` returns `false`.
    ///
    /// Returns `false` if the visit was cut short.
    pub fn visit_rect(&self, rect: Aabb2D<T>, mut visit: impl FnMut(Key, P) -> bool) -> bool {
        self.backend.visit_rect(rect, &mut |i| match self.slots.get(i) {
            Some(Slot {
                generation,
                entry: Some((_, payload)),
            }) => visit(Key::new(i, *generation), *payload),
            _ => true,
        })
    }

    /// Entries whose AABB intersects the given rectangle.
    pub fn query_rect(&self, rect: Aabb2D<T>) -> Vec<(Key, P)> {
        let mut out = Vec::new();
        self.visit_rect(rect, |k, p| {
            out.push((k, p));
            true
        });
        out
    }

    /// Entries whose AABB contains the point (edges included).
    pub fn query_point(&self, x: T, y: T) -> Vec<(Key, P)> {
        self.query_rect(Aabb2D::point(x, y))
    }

    /// Iterate over all live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, Aabb2D<T>, P)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.entry
                .map(|(bbox, payload)| (Key::new(i, s.generation), bbox, payload))
        })
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut (Aabb2D<T>, P)> {
        let slot = self.slots.get_mut(key.idx())?;
        if slot.generation != key.1 {
            return None;
        }
        slot.entry.as_mut()
    }
}

/// Index backed by a linear scan.
pub type FlatIndex<T, P> = SpatialIndex<T, P, FlatVec<T>>;

/// Index backed by an R-tree.
pub type RTreeIndex<T, P> = SpatialIndex<T, P, RTree<T>>;

impl<T: Scalar, P: Copy + Debug> RTreeIndex<T, P> {
    /// Create an R-tree index with a custom node fan-out.
    pub fn with_max_children(max_children: usize) -> Self {
        Self::with_backend(RTree::with_max_children(max_children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn stale_keys_are_ignored_after_slot_reuse() {
        let mut idx: RTreeIndex<i64, u32> = RTreeIndex::new();
        let k1 = idx.insert(Aabb2D::new(0, 0, 1, 1), 1);
        assert_eq!(idx.remove(k1), Some(1));
        let k2 = idx.insert(Aabb2D::new(0, 0, 1, 1), 2);
        assert_eq!(k1.idx(), k2.idx());
        assert_ne!(k1, k2);
        assert!(!idx.update(k1, Aabb2D::new(5, 5, 6, 6)));
        assert_eq!(idx.remove(k1), None);
        assert_eq!(idx.get(k2), Some((Aabb2D::new(0, 0, 1, 1), 2)));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn update_moves_entry_for_queries() {
        let mut idx: RTreeIndex<f64, u8> = RTreeIndex::new();
        let k = idx.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), 7);
        assert!(idx.update(k, Aabb2D::new(20.0, 20.0, 30.0, 30.0)));
        assert!(idx.query_point(5.0, 5.0).is_empty());
        assert_eq!(idx.query_point(25.0, 25.0), vec![(k, 7)]);
    }

    #[test]
    fn clear_invalidates_keys() {
        let mut idx: FlatIndex<i64, ()> = FlatIndex::new();
        let k = idx.insert(Aabb2D::new(0, 0, 1, 1), ());
        idx.clear();
        assert!(idx.is_empty());
        assert!(!idx.contains_key(k));
        let k2 = idx.insert(Aabb2D::new(0, 0, 1, 1), ());
        assert_ne!(k, k2);
        assert_eq!(idx.query_point(0, 0), vec![(k2, ())]);
    }

    #[test]
    fn iter_lists_live_entries() {
        let mut idx: RTreeIndex<i64, u32> = RTreeIndex::with_max_children(4);
        let keys: Vec<Key> = (0..10)
            .map(|i| idx.insert(Aabb2D::new(i, i, i + 1, i + 1), u32::try_from(i).unwrap()))
            .collect();
        idx.remove(keys[3]);
        let payloads: Vec<u32> = idx.iter().map(|(_, _, p)| p).collect();
        assert_eq!(payloads, vec![0, 1, 2, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn visit_rect_short_circuits() {
        let mut idx: RTreeIndex<i64, u32> = RTreeIndex::new();
        for i in 0..20 {
            idx.insert(Aabb2D::new(0, 0, 10, 10), i);
        }
        let mut seen = 0;
        assert!(!idx.visit_rect(Aabb2D::point(1, 1), |_, _| {
            seen += 1;
            seen < 5
        }));
        assert_eq!(seen, 5);
    }
}
