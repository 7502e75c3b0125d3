// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer identifiers and the layer table: an arena of layer records, a sparse
//! id map, the top-layer override set, and an explicit rendering-order permutation.

use alloc::borrow::Cow;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use strata_index::RTreeIndex;

use crate::item::ItemKey;
use crate::target::RenderTarget;

/// Identifier of a layer.
///
/// Layer ids are small non-negative integers below the view's configured
/// maximum layer count.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl From<u32> for LayerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Per-layer spatial index of the items occupying it.
pub(crate) type LayerIndex = RTreeIndex<f64, ItemKey>;

/// One layer record.
#[derive(Debug)]
pub(crate) struct Layer {
    pub(crate) id: LayerId,
    pub(crate) visible: bool,
    /// Rendered, but skipped by hit-test queries that ask for it.
    pub(crate) display_only: bool,
    pub(crate) diff: bool,
    pub(crate) has_negatives: bool,
    /// Lower renders first.
    pub(crate) order: i32,
    pub(crate) target: RenderTarget,
    pub(crate) required: SmallVec<[LayerId; 4]>,
    pub(crate) index: LayerIndex,
}

impl Layer {
    fn new(id: LayerId) -> Self {
        Self {
            id,
            visible: true,
            display_only: false,
            diff: false,
            has_negatives: false,
            order: default_order(id),
            target: RenderTarget::Cached,
            required: SmallVec::new(),
            index: LayerIndex::new(),
        }
    }
}

fn default_order(id: LayerId) -> i32 {
    i32::try_from(id.0).unwrap_or(i32::MAX)
}

/// Sort key, ascending from bottom to top.
type OrderKey = (bool, i32, LayerId);

#[derive(Debug)]
pub(crate) struct LayerTable {
    max_layers: u32,
    slots: HashMap<LayerId, usize>,
    layers: Vec<Layer>,
    /// Arena slots from bottom to top; only meaningful while `!order_stale`.
    sorted: Vec<usize>,
    order_stale: bool,
    top: HashSet<LayerId>,
    top_enabled: bool,
}

impl LayerTable {
    pub(crate) fn new(max_layers: u32) -> Self {
        Self {
            max_layers,
            slots: HashMap::new(),
            layers: Vec::new(),
            sorted: Vec::new(),
            order_stale: false,
            top: HashSet::new(),
            top_enabled: true,
        }
    }

    pub(crate) fn max_layers(&self) -> u32 {
        self.max_layers
    }

    pub(crate) fn len(&self) -> usize {
        self.layers.len()
    }

    pub(crate) fn get(&self, id: LayerId) -> Option<&Layer> {
        self.slots.get(&id).map(|&slot| &self.layers[slot])
    }

    pub(crate) fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.slots.get(&id).map(|&slot| &mut self.layers[slot])
    }

    /// Look up a layer, creating it on first reference. `None` for ids out of range.
    pub(crate) fn ensure(&mut self, id: LayerId) -> Option<&mut Layer> {
        if id.0 >= self.max_layers {
            return None;
        }
        let slot = match self.slots.get(&id) {
            Some(&slot) => slot,
            None => {
                self.layers.push(Layer::new(id));
                let slot = self.layers.len() - 1;
                self.slots.insert(id, slot);
                self.order_stale = true;
                slot
            }
        };
        Some(&mut self.layers[slot])
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }

    pub(crate) fn at(&self, slot: usize) -> &Layer {
        &self.layers[slot]
    }

    fn key_of(&self, id: LayerId) -> OrderKey {
        let order = self.get(id).map_or(default_order(id), |l| l.order);
        (self.top_enabled && self.top.contains(&id), order, id)
    }

    pub(crate) fn invalidate_order(&mut self) {
        self.order_stale = true;
    }

    pub(crate) fn is_order_stale(&self) -> bool {
        self.order_stale
    }

    fn compute_order(&self) -> Vec<usize> {
        let mut slots: Vec<usize> = (0..self.layers.len()).collect();
        slots.sort_by_key(|&s| self.key_of(self.layers[s].id));
        slots
    }

    /// Recompute the cached rendering order.
    pub(crate) fn refresh_order(&mut self) {
        self.sorted = self.compute_order();
        self.order_stale = false;
    }

    /// Arena slots from bottom to top, sorted on the fly while the cache is stale.
    pub(crate) fn ordered(&self) -> Cow<'_, [usize]> {
        if self.order_stale {
            Cow::Owned(self.compute_order())
        } else {
            Cow::Borrowed(&self.sorted)
        }
    }

    /// Every layer's position in the cached order, bottom = 0.
    pub(crate) fn depths(&self) -> HashMap<LayerId, i32> {
        self.sorted
            .iter()
            .enumerate()
            .map(|(pos, &slot)| {
                (
                    self.layers[slot].id,
                    i32::try_from(pos).unwrap_or(i32::MAX),
                )
            })
            .collect()
    }

    /// Sort ids top-most first.
    pub(crate) fn sort_ids(&self, ids: &mut [LayerId]) {
        ids.sort_by_key(|&id| core::cmp::Reverse(self.key_of(id)));
    }

    pub(crate) fn is_top(&self, id: LayerId) -> bool {
        self.top.contains(&id)
    }

    /// Returns whether the set changed.
    pub(crate) fn set_top(&mut self, id: LayerId, enabled: bool) -> bool {
        let changed = if enabled {
            self.top.insert(id)
        } else {
            self.top.remove(&id)
        };
        if changed {
            self.order_stale = true;
        }
        changed
    }

    pub(crate) fn clear_top(&mut self) -> bool {
        if self.top.is_empty() {
            return false;
        }
        self.top.clear();
        self.order_stale = true;
        true
    }

    pub(crate) fn top_enabled(&self) -> bool {
        self.top_enabled
    }

    pub(crate) fn enable_top(&mut self, enable: bool) -> bool {
        if self.top_enabled == enable {
            return false;
        }
        self.top_enabled = enable;
        self.order_stale = true;
        true
    }

    pub(crate) fn top_layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.top.iter().copied()
    }

    /// Own flag AND every required layer effectively visible.
    ///
    /// A layer reached again through a dependency cycle counts as visible.
    pub(crate) fn is_enabled(&self, id: LayerId) -> bool {
        let mut path = SmallVec::<[LayerId; 8]>::new();
        self.enabled_inner(id, &mut path)
    }

    fn enabled_inner(&self, id: LayerId, path: &mut SmallVec<[LayerId; 8]>) -> bool {
        if path.contains(&id) {
            return true;
        }
        let Some(layer) = self.get(id) else {
            return false;
        };
        if !layer.visible {
            return false;
        }
        path.push(id);
        let ok = layer.required.iter().all(|r| self.enabled_inner(*r, path));
        path.pop();
        ok
    }
}
