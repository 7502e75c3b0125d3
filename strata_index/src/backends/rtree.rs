// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree backend generic over scalar `T: Scalar`.
//!
//! Nodes live in an arena with a free list. Removal condenses underfull nodes
//! by re-inserting their items, so the tree stays balanced under heavy churn
//! (drag operations in an editor move the same items many times per second).

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar, area, margin};

const DEFAULT_MAX_CHILDREN: usize = 8;

#[derive(Copy, Clone, Debug)]
enum Entry<T> {
    Node(usize),
    Item { slot: usize, bbox: Aabb2D<T> },
}

#[derive(Clone, Debug)]
struct RNode<T> {
    bbox: Aabb2D<T>,
    leaf: bool,
    children: Vec<Entry<T>>,
}

/// R-tree backend using an area/margin split heuristic and widened metrics.
pub struct RTree<T: Scalar> {
    max_children: usize,
    min_children: usize,
    root: Option<usize>,
    nodes: Vec<RNode<T>>,
    free_nodes: Vec<usize>,
    slots: Vec<Option<Aabb2D<T>>>,
    len: usize,
}

impl<T: Scalar> Default for RTree<T> {
    fn default() -> Self {
        Self::with_max_children(DEFAULT_MAX_CHILDREN)
    }
}

type Boxed<T> = Vec<(Entry<T>, Aabb2D<T>)>;

impl<T: Scalar> RTree<T> {
    /// Create an empty tree whose nodes hold at most `max_children` entries.
    ///
    /// Fan-outs below 4 are raised to 4.
    pub fn with_max_children(max_children: usize) -> Self {
        debug_assert!(max_children >= 4, "R-tree fan-out must be at least 4");
        let max_children = max_children.max(4);
        Self {
            max_children,
            min_children: max_children / 2,
            root: None,
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            slots: Vec::new(),
            len: 0,
        }
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels from the root to the leaves (0 when empty).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cursor = self.root;
        while let Some(i) = cursor {
            height += 1;
            let node = &self.nodes[i];
            cursor = match node.children.first() {
                Some(Entry::Node(child)) if !node.leaf => Some(*child),
                _ => None,
            };
        }
        height
    }

    fn entry_bbox(&self, e: &Entry<T>) -> Aabb2D<T> {
        match e {
            Entry::Node(i) => self.nodes[*i].bbox,
            Entry::Item { bbox, .. } => *bbox,
        }
    }

    fn children_bbox(&self, children: &[Entry<T>]) -> Option<Aabb2D<T>> {
        let mut it = children.iter().map(|c| self.entry_bbox(c));
        let first = it.next()?;
        Some(it.fold(first, |acc, b| acc.union(&b)))
    }

    fn refresh_bbox(&mut self, node: usize) {
        if let Some(bbox) = self.children_bbox(&self.nodes[node].children) {
            self.nodes[node].bbox = bbox;
        }
    }

    fn alloc_node(&mut self, node: RNode<T>) -> usize {
        if let Some(i) = self.free_nodes.pop() {
            self.nodes[i] = node;
            i
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn insert_entry(&mut self, slot: usize, bbox: Aabb2D<T>) {
        let item = Entry::Item { slot, bbox };
        let Some(root) = self.root else {
            let idx = self.alloc_node(RNode {
                bbox,
                leaf: true,
                children: vec![item],
            });
            self.root = Some(idx);
            return;
        };
        if let Some(sibling) = self.insert_into(root, item, bbox) {
            let bbox = self.nodes[root].bbox.union(&self.nodes[sibling].bbox);
            let idx = self.alloc_node(RNode {
                bbox,
                leaf: false,
                children: vec![Entry::Node(root), Entry::Node(sibling)],
            });
            self.root = Some(idx);
        }
    }

    /// Returns the index of a new sibling when `node` had to split.
    fn insert_into(&mut self, node: usize, item: Entry<T>, bbox: Aabb2D<T>) -> Option<usize> {
        self.nodes[node].bbox = if self.nodes[node].children.is_empty() {
            bbox
        } else {
            self.nodes[node].bbox.union(&bbox)
        };
        if self.nodes[node].leaf {
            self.nodes[node].children.push(item);
        } else {
            let pos = self.choose_subtree(node, &bbox);
            if let Entry::Node(child) = self.nodes[node].children[pos]
                && let Some(sibling) = self.insert_into(child, item, bbox)
            {
                self.nodes[node]
                    .children
                    .insert(pos + 1, Entry::Node(sibling));
            }
        }
        if self.nodes[node].children.len() > self.max_children {
            Some(self.split_node(node))
        } else {
            None
        }
    }

    /// Least enlargement, then smallest area.
    fn choose_subtree(&self, node: usize, bbox: &Aabb2D<T>) -> usize {
        let mut best = 0;
        let mut best_cost: Option<(T::Acc, T::Acc)> = None;
        for (i, c) in self.nodes[node].children.iter().enumerate() {
            let cb = self.entry_bbox(c);
            let a = area(&cb);
            let grow = area(&cb.union(bbox)) - a;
            let better = match best_cost {
                None => true,
                Some((g, ar)) => grow < g || (grow == g && a < ar),
            };
            if better {
                best = i;
                best_cost = Some((grow, a));
            }
        }
        best
    }

    fn split_node(&mut self, node: usize) -> usize {
        let children = core::mem::take(&mut self.nodes[node].children);
        let boxed: Boxed<T> = children
            .into_iter()
            .map(|c| {
                let b = self.entry_bbox(&c);
                (c, b)
            })
            .collect();
        let (left, right) = split_entries(boxed, self.min_children);
        let leaf = self.nodes[node].leaf;
        let (left_bbox, right_bbox) = (union_of(&left), union_of(&right));
        if let Some(b) = left_bbox {
            self.nodes[node].bbox = b;
        }
        self.nodes[node].children = left.into_iter().map(|(e, _)| e).collect();
        self.alloc_node(RNode {
            bbox: right_bbox.unwrap_or(self.nodes[node].bbox),
            leaf,
            children: right.into_iter().map(|(e, _)| e).collect(),
        })
    }

    /// Record the root-to-leaf path to the leaf holding `slot`.
    fn find_leaf(&self, node: usize, slot: usize, bbox: &Aabb2D<T>, path: &mut Vec<usize>) -> bool {
        if !self.nodes[node].bbox.contains(bbox) {
            return false;
        }
        path.push(node);
        let n = &self.nodes[node];
        if n.leaf {
            if n
                .children
                .iter()
                .any(|c| matches!(c, Entry::Item { slot: s, .. } if *s == slot))
            {
                return true;
            }
        } else {
            for c in &n.children {
                if let Entry::Node(child) = c
                    && self.find_leaf(*child, slot, bbox, path)
                {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    fn remove_entry(&mut self, slot: usize, bbox: Aabb2D<T>) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let mut path = Vec::new();
        if !self.find_leaf(root, slot, &bbox, &mut path) {
            return false;
        }
        let Some(&leaf) = path.last() else {
            return false;
        };
        self.nodes[leaf]
            .children
            .retain(|c| !matches!(c, Entry::Item { slot: s, .. } if *s == slot));
        self.condense(&path);
        true
    }

    /// Walk back up `path`, dissolving underfull nodes and tightening boxes.
    fn condense(&mut self, path: &[usize]) {
        let mut orphans = Vec::new();
        for depth in (1..path.len()).rev() {
            let (node, parent) = (path[depth], path[depth - 1]);
            if self.nodes[node].children.len() < self.min_children {
                self.nodes[parent]
                    .children
                    .retain(|c| !matches!(c, Entry::Node(n) if *n == node));
                self.drain_subtree(node, &mut orphans);
            } else {
                self.refresh_bbox(node);
            }
        }
        if let Some(root) = self.root {
            self.refresh_bbox(root);
        }
        self.shrink_root();
        for (slot, bbox) in orphans {
            self.insert_entry(slot, bbox);
        }
    }

    fn drain_subtree(&mut self, node: usize, out: &mut Vec<(usize, Aabb2D<T>)>) {
        let children = core::mem::take(&mut self.nodes[node].children);
        for c in children {
            match c {
                Entry::Item { slot, bbox } => out.push((slot, bbox)),
                Entry::Node(child) => self.drain_subtree(child, out),
            }
        }
        self.free_nodes.push(node);
    }

    fn shrink_root(&mut self) {
        while let Some(root) = self.root {
            let (empty, only_child) = {
                let n = &self.nodes[root];
                let only_child = match n.children.as_slice() {
                    [Entry::Node(child)] if !n.leaf => Some(*child),
                    _ => None,
                };
                (n.children.is_empty(), only_child)
            };
            if empty {
                self.free_nodes.push(root);
                self.root = None;
            } else if let Some(child) = only_child {
                self.nodes[root].children.clear();
                self.free_nodes.push(root);
                self.root = Some(child);
            } else {
                break;
            }
        }
    }

    /// Try to move `slot` within its current leaf; returns false when it no longer fits.
    fn update_in_place(&mut self, slot: usize, old: Aabb2D<T>, new: Aabb2D<T>) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let mut path = Vec::new();
        if !self.find_leaf(root, slot, &old, &mut path) {
            return false;
        }
        let Some(&leaf) = path.last() else {
            return false;
        };
        if !self.nodes[leaf].bbox.contains(&new) {
            return false;
        }
        for c in &mut self.nodes[leaf].children {
            if let Entry::Item { slot: s, bbox } = c
                && *s == slot
            {
                *bbox = new;
            }
        }
        for &node in path.iter().rev() {
            self.refresh_bbox(node);
        }
        true
    }
}

fn union_of<T: Scalar>(entries: &[(Entry<T>, Aabb2D<T>)]) -> Option<Aabb2D<T>> {
    let mut it = entries.iter().map(|(_, b)| *b);
    let first = it.next()?;
    Some(it.fold(first, |acc, b| acc.union(&b)))
}

fn centroid<T: Scalar>(b: &Aabb2D<T>, axis: usize) -> T {
    if axis == 0 {
        T::mid(b.min_x, b.max_x)
    } else {
        T::mid(b.min_y, b.max_y)
    }
}

/// Running unions from the front; `suffix` mode runs from the back.
fn running_bounds<T: Scalar>(v: &[(Entry<T>, Aabb2D<T>)], suffix: bool) -> Vec<Aabb2D<T>> {
    let mut out = Vec::with_capacity(v.len());
    let mut acc: Option<Aabb2D<T>> = None;
    let mut push = |b: &Aabb2D<T>| {
        let u = acc.map_or(*b, |a| a.union(b));
        out.push(u);
        acc = Some(u);
    };
    if suffix {
        v.iter().rev().for_each(|(_, b)| push(b));
        out.reverse();
    } else {
        v.iter().for_each(|(_, b)| push(b));
    }
    out
}

/// Area-weighted split with a margin tie-break. See the module docs in [`crate::backends`].
fn split_entries<T: Scalar>(entries: Boxed<T>, min_children: usize) -> (Boxed<T>, Boxed<T>) {
    let n = entries.len();
    let mut best: Option<(T::Acc, T::Acc, usize, Boxed<T>)> = None;
    for axis in 0..2 {
        let mut v = entries.clone();
        v.sort_by(|a, b| {
            centroid(&a.1, axis)
                .partial_cmp(&centroid(&b.1, axis))
                .unwrap_or(Ordering::Equal)
        });
        let prefix = running_bounds(&v, false);
        let suffix = running_bounds(&v, true);
        let mut axis_best: Option<(T::Acc, T::Acc, usize)> = None;
        for k in min_children..=n.saturating_sub(min_children) {
            if k == 0 || k >= n {
                continue;
            }
            let (lb, rb) = (prefix[k - 1], suffix[k]);
            let cost = area(&lb) * T::acc_from_usize(k) + area(&rb) * T::acc_from_usize(n - k);
            let marg = margin(&lb) + margin(&rb);
            let better = match axis_best {
                None => true,
                Some((c, m, _)) => cost < c || (cost == c && marg < m),
            };
            if better {
                axis_best = Some((cost, marg, k));
            }
        }
        if let Some((cost, marg, k)) = axis_best {
            let better = match &best {
                None => true,
                Some((c, m, _, _)) => cost < *c || (cost == *c && marg < *m),
            };
            if better {
                best = Some((cost, marg, k, v));
            }
        }
    }
    match best {
        Some((_, _, k, mut v)) => {
            let right = v.split_off(k);
            (v, right)
        }
        None => {
            let mut v = entries;
            let right = v.split_off(n / 2);
            (v, right)
        }
    }
}

impl<T: Scalar> Backend<T> for RTree<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if self.slots.get(slot).is_some_and(Option::is_some) {
            self.update(slot, aabb);
            return;
        }
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(aabb);
        self.insert_entry(slot, aabb);
        self.len += 1;
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<T>) {
        let Some(old) = self.slots.get(slot).copied().flatten() else {
            return;
        };
        if old == aabb {
            return;
        }
        if !self.update_in_place(slot, old, aabb) {
            self.remove_entry(slot, old);
            self.insert_entry(slot, aabb);
        }
        self.slots[slot] = Some(aabb);
    }

    fn remove(&mut self, slot: usize) {
        let Some(old) = self.slots.get_mut(slot).and_then(Option::take) else {
            return;
        };
        self.remove_entry(slot, old);
        self.len -= 1;
    }

    fn clear(&mut self) {
        self.root = None;
        self.nodes.clear();
        self.free_nodes.clear();
        self.slots.clear();
        self.len = 0;
    }

    fn visit_rect(&self, rect: Aabb2D<T>, visit: &mut dyn FnMut(usize) -> bool) -> bool {
        let Some(root) = self.root else {
            return true;
        };
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let n = &self.nodes[i];
            if !n.bbox.intersects(&rect) {
                continue;
            }
            for c in &n.children {
                match c {
                    Entry::Item { slot, bbox } => {
                        if bbox.intersects(&rect) && !visit(*slot) {
                            return false;
                        }
                    }
                    Entry::Node(child) => stack.push(*child),
                }
            }
        }
        true
    }
}

impl<T: Scalar> Debug for RTree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("max_children", &self.max_children)
            .field("min_children", &self.min_children)
            .field("arena_nodes", &self.nodes.len())
            .field("free_nodes", &self.free_nodes.len())
            .field("alive", &self.len)
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

/// R-tree with i64 coordinates and i128 metrics.
pub type RTreeI64 = RTree<i64>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64 = RTree<f64>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::flatvec::FlatVec;

    impl<T: Scalar> RTree<T> {
        fn check_invariants(&self) {
            let Some(root) = self.root else {
                assert_eq!(self.len, 0, "empty tree must have no items");
                return;
            };
            let mut leaf_depth = None;
            let mut count = 0;
            self.check_node(root, 0, &mut leaf_depth, &mut count);
            assert_eq!(count, self.len, "item count mismatch");
        }

        fn check_node(
            &self,
            node: usize,
            depth: usize,
            leaf_depth: &mut Option<usize>,
            count: &mut usize,
        ) {
            let n = &self.nodes[node];
            assert!(n.children.len() <= self.max_children, "overfull node");
            if depth > 0 {
                assert!(n.children.len() >= self.min_children, "underfull node");
            }
            assert_eq!(
                Some(n.bbox),
                self.children_bbox(&n.children),
                "stale node bbox"
            );
            if n.leaf {
                match leaf_depth {
                    Some(d) => assert_eq!(*d, depth, "leaves at different depths"),
                    None => *leaf_depth = Some(depth),
                }
            }
            for c in &n.children {
                match (c, n.leaf) {
                    (Entry::Item { slot, bbox }, true) => {
                        assert_eq!(self.slots[*slot], Some(*bbox), "slot table out of sync");
                        *count += 1;
                    }
                    (Entry::Node(child), false) => {
                        self.check_node(*child, depth + 1, leaf_depth, count);
                    }
                    _ => panic!("entry kind does not match node kind"),
                }
            }
        }
    }

    struct Rng(u64);

    impl Rng {
        fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn below(&mut self, n: u64) -> i64 {
            i64::try_from(self.next_u64() % n).unwrap()
        }

        fn aabb(&mut self) -> Aabb2D<i64> {
            let x = self.below(1000);
            let y = self.below(1000);
            // Zero-size boxes are frequent on purpose (pads, vias, points).
            Aabb2D::new(x, y, x + self.below(40), y + self.below(40))
        }
    }

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn basic_insert_query() {
        let mut t = RTreeI64::default();
        t.insert(0, Aabb2D::new(0, 0, 10, 10));
        t.insert(1, Aabb2D::new(5, 5, 15, 15));
        assert_eq!(sorted(t.query_rect(Aabb2D::point(6, 6))), vec![0, 1]);
        assert_eq!(t.query_rect(Aabb2D::new(12, 12, 20, 20)), vec![1]);
        assert!(t.query_rect(Aabb2D::new(30, 30, 40, 40)).is_empty());
        t.check_invariants();
    }

    #[test]
    fn split_grows_height_and_keeps_balance() {
        let mut t = RTreeI64::default();
        for i in 0..200 {
            let x = i64::try_from(i).unwrap() * 3;
            t.insert(i, Aabb2D::new(x, 0, x + 2, 2));
        }
        assert!(t.height() >= 3);
        t.check_invariants();
        assert_eq!(t.query_rect(Aabb2D::new(-10, -10, 10_000, 10)).len(), 200);
    }

    #[test]
    fn random_churn_matches_linear_scan() {
        let mut rng = Rng(0xDEAD_BEEF_CAFE_F00D);
        let mut tree = RTreeI64::default();
        let mut flat = FlatVec::<i64>::default();
        let mut live: Vec<bool> = vec![false; 400];
        for round in 0..4000 {
            let slot = usize::try_from(rng.below(400)).unwrap();
            match rng.below(3) {
                0 => {
                    let b = rng.aabb();
                    tree.insert(slot, b);
                    flat.insert(slot, b);
                    live[slot] = true;
                }
                1 if live[slot] => {
                    let b = rng.aabb();
                    tree.update(slot, b);
                    flat.update(slot, b);
                }
                _ => {
                    tree.remove(slot);
                    flat.remove(slot);
                    live[slot] = false;
                }
            }
            if round % 97 == 0 {
                tree.check_invariants();
                let q = rng.aabb();
                let q = Aabb2D::new(q.min_x, q.min_y, q.max_x + 100, q.max_y + 100);
                assert_eq!(sorted(tree.query_rect(q)), sorted(flat.query_rect(q)));
            }
        }
        tree.check_invariants();
        assert_eq!(tree.len(), live.iter().filter(|l| **l).count());
    }

    #[test]
    fn remove_everything_empties_tree_and_reuses_nodes() {
        let mut t = RTreeF64::default();
        for i in 0..64 {
            let x = f64::from(u32::try_from(i).unwrap());
            t.insert(i, Aabb2D::from_xywh(x, x, 1.0, 1.0));
        }
        let arena = t.nodes.len();
        for i in 0..64 {
            t.remove(i);
        }
        assert!(t.is_empty());
        assert_eq!(t.height(), 0);
        t.check_invariants();
        for i in 0..64 {
            let x = f64::from(u32::try_from(i).unwrap());
            t.insert(i, Aabb2D::from_xywh(x, x, 1.0, 1.0));
        }
        assert!(t.nodes.len() <= arena + 1, "freed nodes should be recycled");
        t.check_invariants();
    }

    #[test]
    fn update_in_place_does_not_allocate() {
        let mut b = RTreeI64::default();
        b.insert(0, Aabb2D::new(0, 0, 10, 10));
        b.insert(1, Aabb2D::new(12, 0, 22, 10));
        let arena_before = b.nodes.len();
        b.update(0, Aabb2D::new(1, 1, 9, 9));
        assert_eq!(b.nodes.len(), arena_before);
        assert!(b.query_rect(Aabb2D::point(0, 0)).is_empty());
        assert_eq!(b.query_rect(Aabb2D::point(5, 5)), vec![0]);
        b.update(0, Aabb2D::new(100, 100, 110, 110));
        assert_eq!(b.query_rect(Aabb2D::point(105, 105)), vec![0]);
        assert_eq!(b.query_rect(Aabb2D::point(15, 5)), vec![1]);
        b.check_invariants();
    }

    #[test]
    fn zero_area_items_split_cleanly() {
        let mut t = RTreeF64::default();
        for i in 0..50 {
            t.insert(i, Aabb2D::point(0.0, 0.0));
        }
        t.check_invariants();
        assert_eq!(t.query_rect(Aabb2D::point(0.0, 0.0)).len(), 50);
        assert!(t.query_rect(Aabb2D::point(0.5, 0.0)).is_empty());
    }

    #[test]
    fn visitor_can_stop_early() {
        let mut t = RTreeI64::default();
        for i in 0..30 {
            t.insert(i, Aabb2D::new(0, 0, 10, 10));
        }
        let mut n = 0;
        let complete = t.visit_rect(Aabb2D::point(5, 5), &mut |_| {
            n += 1;
            n < 3
        });
        assert!(!complete);
        assert_eq!(n, 3);
    }
}
