// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The view: item registry, per-layer indices, layer configuration, viewport,
//! dirty targets, preview, and redraw orchestration.

use alloc::rc::{Rc, Weak};
use core::cell::Cell;
use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use log::{debug, trace, warn};
use smallvec::SmallVec;
use strata_index::{Aabb2D, Key};

use crate::gal::{Gal, GroupId, Painter};
use crate::item::{DropQueue, ItemFlags, ItemKey, LayerSet, UpdateFlags, ViewItem};
use crate::layer::{LayerId, LayerTable};
use crate::preview::PreviewGroup;
use crate::target::{DirtyTargets, RenderTarget};
use crate::util::rect_to_aabb;
use crate::viewport::{DEFAULT_BOUNDARY, DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE, Viewport};

/// Default number of layer ids a view accepts.
pub const DEFAULT_MAX_LAYERS: u32 = 512;

/// Construction-time settings for a [`View`].
#[derive(Clone, Debug)]
pub struct ViewConfig {
    /// Layer ids must be below this value; larger ids are ignored.
    pub max_layers: u32,
    /// Lower scale limit.
    pub min_scale: f64,
    /// Upper scale limit.
    pub max_scale: f64,
    /// Rectangle the view center is confined to.
    pub boundary: Rect,
    /// Order items within a layer by draw priority.
    pub use_draw_priority: bool,
    /// Reverse the draw-priority order.
    pub reverse_draw_order: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            max_layers: DEFAULT_MAX_LAYERS,
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            boundary: DEFAULT_BOUNDARY,
            use_draw_priority: false,
            reverse_draw_order: false,
        }
    }
}

/// Options for [`View::query`] and friends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Skip display-only layers.
    pub exclude_display_only: bool,
}

impl QueryOptions {
    /// Options for hit testing: display-only layers are skipped.
    pub const HIT_TEST: Self = Self {
        exclude_display_only: true,
    };
}

/// One query match.
#[derive(Clone)]
pub struct QueryHit {
    /// The matched item.
    pub item: Rc<dyn ViewItem>,
    /// The layer it matched on.
    pub layer: LayerId,
}

impl QueryHit {
    /// Identity of the matched item.
    pub fn key(&self) -> ItemKey {
        ItemKey::of(&*self.item)
    }

    /// Whether this hit refers to `item`.
    pub fn is<I: ViewItem + ?Sized>(&self, item: &I) -> bool {
        self.key() == ItemKey::of(item)
    }
}

impl core::fmt::Debug for QueryHit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryHit")
            .field("item", &self.key())
            .field("layer", &self.layer)
            .finish()
    }
}

#[derive(Debug)]
struct ItemRecord {
    item: Weak<dyn ViewItem>,
    priority: i32,
    flags: ItemFlags,
    pending: UpdateFlags,
    bbox: Rect,
    entries: SmallVec<[(LayerId, Key); 4]>,
    /// Cached backend groups, one per cached layer drawn so far.
    groups: SmallVec<[(LayerId, GroupId); 2]>,
}

impl ItemRecord {
    fn group_on(&self, layer: LayerId) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|(l, _)| *l == layer)
            .map(|&(_, g)| g)
    }
}

/// A layered, spatially indexed view over externally owned items.
///
/// Items are registered as `Rc<I>` and held weakly. Each occupied layer keeps
/// an R-tree of its items, so [`query`](Self::query) and redraw only touch
/// what intersects the requested rectangle.
pub struct View {
    layers: LayerTable,
    items: HashMap<ItemKey, ItemRecord>,
    viewport: Viewport,
    targets: DirtyTargets,
    next_priority: i32,
    use_draw_priority: bool,
    reverse_draw_order: bool,
    pending_updates: Vec<ItemKey>,
    dropped: Rc<DropQueue>,
    preview: PreviewGroup,
    stale_groups: Vec<GroupId>,
    pending_recolors: Vec<(ItemKey, LayerId)>,
    group_depths_stale: bool,
    /// Dead records stepped over by queries and redraws since the last sweep.
    dead_seen: Cell<usize>,
}

impl core::fmt::Debug for View {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("View")
            .field("items", &self.items.len())
            .field("layers", &self.layers.len())
            .field("viewport", &self.viewport)
            .field("targets", &self.targets)
            .field("pending_updates", &self.pending_updates.len())
            .field("preview", &self.preview)
            .finish_non_exhaustive()
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_layers(mut layers: LayerSet) -> LayerSet {
    let mut seen = LayerSet::new();
    layers.retain(|l| {
        if seen.contains(l) {
            false
        } else {
            seen.push(*l);
            true
        }
    });
    layers
}

fn paint(item: &dyn ViewItem, layer: LayerId, gal: &mut dyn Gal, painter: &mut dyn Painter) {
    if !painter.draw(item, layer, gal) {
        item.draw(layer, gal);
    }
}

impl View {
    /// Create a view with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ViewConfig::default())
    }

    /// Create a view with `config`.
    pub fn with_config(config: ViewConfig) -> Self {
        Self {
            layers: LayerTable::new(config.max_layers),
            items: HashMap::new(),
            viewport: Viewport::new(config.min_scale, config.max_scale, config.boundary),
            targets: DirtyTargets::default(),
            next_priority: 0,
            use_draw_priority: config.use_draw_priority,
            reverse_draw_order: config.reverse_draw_order,
            pending_updates: Vec::new(),
            dropped: Rc::new(DropQueue::default()),
            preview: PreviewGroup::default(),
            stale_groups: Vec::new(),
            pending_recolors: Vec::new(),
            group_depths_stale: false,
            dead_seen: Cell::new(0),
        }
    }

    // --- items ---

    /// Register `item` on every layer it occupies.
    ///
    /// Without an explicit `priority` the item gets the next sequential one.
    /// Adding an item twice is ignored; returns whether the item was added.
    pub fn add<I: ViewItem + 'static>(&mut self, item: &Rc<I>, priority: Option<i32>) -> bool {
        let item: Rc<dyn ViewItem> = Rc::clone(item) as Rc<dyn ViewItem>;
        self.add_dyn(&item, priority)
    }

    /// [`add`](Self::add) for an already type-erased item.
    pub fn add_dyn(&mut self, item: &Rc<dyn ViewItem>, priority: Option<i32>) -> bool {
        self.purge_dead(false);
        let key = ItemKey::of(&**item);
        if self.items.contains_key(&key) {
            debug!("ignoring duplicate add of {key:?}");
            return false;
        }
        let priority = priority.unwrap_or_else(|| {
            let p = self.next_priority;
            self.next_priority = self.next_priority.wrapping_add(1);
            p
        });
        let bbox = item.bounding_box();
        let aabb = rect_to_aabb(bbox);
        let mut entries = SmallVec::new();
        for layer in dedup_layers(item.layers()) {
            let Some(l) = self.layers.ensure(layer) else {
                debug!("layer {} out of range; {key:?} not indexed on it", layer.0);
                continue;
            };
            entries.push((layer, l.index.insert(aabb, key)));
            self.targets.mark(l.target);
        }
        if let Some(link) = item.view_link()
            && !link.attach(key, Rc::downgrade(&self.dropped))
        {
            debug!("{key:?} is linked to another view; dropping it will not purge it here");
        }
        self.items.insert(
            key,
            ItemRecord {
                item: Rc::downgrade(item),
                priority,
                flags: ItemFlags::VISIBLE,
                pending: UpdateFlags::empty(),
                bbox,
                entries,
                groups: SmallVec::new(),
            },
        );
        trace!("added {key:?} with priority {priority}");
        true
    }

    /// Unregister `item` from every layer. Unknown items are ignored.
    pub fn remove<I: ViewItem + ?Sized>(&mut self, item: &I) -> bool {
        self.purge_dead(false);
        let key = ItemKey::of(item);
        let Some(record) = self.items.remove(&key) else {
            return false;
        };
        if let Some(link) = item.view_link() {
            link.detach();
        }
        self.purge(key, record);
        trace!("removed {key:?}");
        true
    }

    fn purge(&mut self, key: ItemKey, record: ItemRecord) {
        for (layer, k) in record.entries {
            if let Some(l) = self.layers.get_mut(layer) {
                l.index.remove(k);
                self.targets.mark(l.target);
            }
        }
        self.stale_groups
            .extend(record.groups.into_iter().map(|(_, g)| g));
        self.pending_updates.retain(|k| *k != key);
        self.pending_recolors.retain(|(k, _)| *k != key);
    }

    /// Purge items whose owners dropped them. Returns how many were purged.
    ///
    /// Sweeps every record, so items without a [`ViewLink`](crate::ViewLink) are
    /// purged too. Mutations and redraws run a cheaper pass automatically: they
    /// drain the linked drop queue and only sweep once a query or redraw has
    /// stepped over a dead entry.
    pub fn collect_dropped(&mut self) -> usize {
        self.purge_dead(true)
    }

    fn purge_dead(&mut self, sweep: bool) -> usize {
        let mut keys = match self.dropped.try_borrow_mut() {
            Ok(mut queue) => core::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        };
        let seen = self.dead_seen.replace(0);
        if sweep || seen > 0 {
            keys.extend(
                self.items
                    .iter()
                    .filter(|(_, r)| r.item.strong_count() == 0)
                    .map(|(k, _)| *k),
            );
        }
        let mut purged = 0;
        for key in keys {
            let dead = self
                .items
                .get(&key)
                .is_some_and(|r| r.item.strong_count() == 0);
            if dead && let Some(record) = self.items.remove(&key) {
                self.purge(key, record);
                trace!("purged dropped {key:?}");
                purged += 1;
            }
        }
        purged
    }

    /// Remove every item and empty the preview. Layer settings are kept.
    pub fn clear(&mut self) {
        for record in self.items.values() {
            if let Some(item) = record.item.upgrade()
                && let Some(link) = item.view_link()
            {
                link.detach();
            }
            self.stale_groups
                .extend(record.groups.iter().map(|&(_, g)| g));
        }
        self.items.clear();
        for layer in self.layers.iter_mut() {
            layer.index.clear();
        }
        self.pending_updates.clear();
        self.pending_recolors.clear();
        if let Ok(mut queue) = self.dropped.try_borrow_mut() {
            queue.clear();
        }
        self.preview.clear();
        self.dead_seen.set(0);
        self.targets.mark_all();
    }

    /// Whether `item` is registered and still alive.
    pub fn has_item<I: ViewItem + ?Sized>(&self, item: &I) -> bool {
        self.items
            .get(&ItemKey::of(item))
            .is_some_and(|r| r.item.strong_count() > 0)
    }

    /// Number of registered items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Draw priority of `item`.
    pub fn draw_priority<I: ViewItem + ?Sized>(&self, item: &I) -> Option<i32> {
        self.items.get(&ItemKey::of(item)).map(|r| r.priority)
    }

    /// Bounding box `item` is currently indexed with.
    pub fn indexed_bounds<I: ViewItem + ?Sized>(&self, item: &I) -> Option<Rect> {
        self.items.get(&ItemKey::of(item)).map(|r| r.bbox)
    }

    // --- per-item visibility ---

    /// Show or hide `item` independently of its layers.
    pub fn set_visible<I: ViewItem + ?Sized>(&mut self, item: &I, visible: bool) {
        let key = ItemKey::of(item);
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        if record.flags.contains(ItemFlags::VISIBLE) != visible {
            record.flags.set(ItemFlags::VISIBLE, visible);
            self.queue_update(key, UpdateFlags::APPEARANCE | UpdateFlags::COLOR);
        }
    }

    /// Temporarily hide a visible item, optionally from overlays too.
    ///
    /// Un-hiding clears both marks. Invisible items are left alone.
    pub fn hide<I: ViewItem + ?Sized>(&mut self, item: &I, hide: bool, hide_overlay: bool) {
        let key = ItemKey::of(item);
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        if !record.flags.contains(ItemFlags::VISIBLE) {
            return;
        }
        if hide_overlay {
            record.flags |= ItemFlags::OVERLAY_HIDDEN;
        }
        if hide {
            record.flags |= ItemFlags::HIDDEN;
        } else {
            record.flags -= ItemFlags::HIDDEN | ItemFlags::OVERLAY_HIDDEN;
        }
        self.queue_update(key, UpdateFlags::APPEARANCE);
    }

    /// Whether `item` has its own visible flag set.
    pub fn is_visible<I: ViewItem + ?Sized>(&self, item: &I) -> bool {
        self.items
            .get(&ItemKey::of(item))
            .is_some_and(|r| r.flags.contains(ItemFlags::VISIBLE))
    }

    /// Whether `item` is hidden from overlay compositing.
    pub fn is_hidden_on_overlay<I: ViewItem + ?Sized>(&self, item: &I) -> bool {
        self.items
            .get(&ItemKey::of(item))
            .is_some_and(|r| r.flags.contains(ItemFlags::OVERLAY_HIDDEN))
    }

    // --- updates ---

    fn queue_update(&mut self, key: ItemKey, flags: UpdateFlags) {
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        if record.pending.is_empty() {
            self.pending_updates.push(key);
        }
        record.pending |= flags;
        for (layer, _) in &record.entries {
            if let Some(l) = self.layers.get(*layer) {
                self.targets.mark(l.target);
            }
        }
    }

    /// Flag `item` for re-evaluation by the next [`update_items`](Self::update_items).
    ///
    /// The targets of its current layers are marked dirty immediately.
    pub fn update<I: ViewItem + ?Sized>(&mut self, item: &I, flags: UpdateFlags) {
        if flags.is_empty() {
            return;
        }
        let key = ItemKey::of(item);
        if !self.items.contains_key(&key) {
            debug!("update of unregistered {key:?} ignored");
            return;
        }
        self.queue_update(key, flags);
    }

    /// Flag every item with `flags`.
    pub fn update_all_items(&mut self, flags: UpdateFlags) {
        self.update_all_items_conditionally(flags, |_| true);
    }

    /// Flag every item for which `condition` holds with `flags`.
    pub fn update_all_items_conditionally(
        &mut self,
        flags: UpdateFlags,
        mut condition: impl FnMut(&dyn ViewItem) -> bool,
    ) {
        if flags.is_empty() {
            return;
        }
        let keys: Vec<ItemKey> = self
            .items
            .iter()
            .filter_map(|(key, record)| {
                let item = record.item.upgrade()?;
                condition(&*item).then_some(*key)
            })
            .collect();
        for key in keys {
            self.queue_update(key, flags);
        }
    }

    /// Apply all pending item updates: re-index moved items, move items between
    /// layers, and schedule cached group rebuilds or recolors.
    pub fn update_items(&mut self) {
        self.purge_dead(false);
        for key in core::mem::take(&mut self.pending_updates) {
            self.invalidate_item(key);
        }
    }

    fn invalidate_item(&mut self, key: ItemKey) {
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        let mut flags = core::mem::replace(&mut record.pending, UpdateFlags::empty());
        let Some(item) = record.item.upgrade() else {
            return;
        };
        if flags.contains(UpdateFlags::INITIAL_ADD) {
            flags = UpdateFlags::ALL;
        }
        trace!("updating {key:?} with {flags:?}");
        if flags.contains(UpdateFlags::LAYERS) {
            self.reindex_layers(key, &*item);
        } else if flags.contains(UpdateFlags::GEOMETRY) {
            self.reindex_bounds(key, &*item);
        }
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        if flags.intersects(UpdateFlags::GEOMETRY | UpdateFlags::LAYERS | UpdateFlags::REPAINT) {
            self.stale_groups
                .extend(record.groups.drain(..).map(|(_, g)| g));
        } else if flags.contains(UpdateFlags::COLOR) {
            self.pending_recolors
                .extend(record.groups.iter().map(|&(layer, _)| (key, layer)));
        }
        for (layer, _) in &record.entries {
            if let Some(l) = self.layers.get(*layer) {
                self.targets.mark(l.target);
            }
        }
    }

    fn reindex_bounds(&mut self, key: ItemKey, item: &dyn ViewItem) {
        let bbox = item.bounding_box();
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        record.bbox = bbox;
        let aabb = rect_to_aabb(bbox);
        for (layer, k) in &record.entries {
            if let Some(l) = self.layers.get_mut(*layer) {
                l.index.update(*k, aabb);
                self.targets.mark(l.target);
            }
        }
    }

    fn reindex_layers(&mut self, key: ItemKey, item: &dyn ViewItem) {
        let bbox = item.bounding_box();
        let layers = dedup_layers(item.layers());
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        record.bbox = bbox;
        for (layer, k) in record.entries.drain(..) {
            if let Some(l) = self.layers.get_mut(layer) {
                l.index.remove(k);
                self.targets.mark(l.target);
            }
        }
        let aabb = rect_to_aabb(bbox);
        for layer in layers {
            let Some(l) = self.layers.ensure(layer) else {
                debug!("layer {} out of range; {key:?} not indexed on it", layer.0);
                continue;
            };
            record.entries.push((layer, l.index.insert(aabb, key)));
            self.targets.mark(l.target);
        }
    }

    // --- queries ---

    /// Items intersecting `rect` on effectively visible layers, top-most layer first.
    pub fn query(&self, rect: Rect, options: QueryOptions) -> Vec<QueryHit> {
        let mut out = Vec::new();
        self.query_with(rect, options, |hit| {
            out.push(hit.clone());
            true
        });
        out
    }

    /// Visitor form of [`query`](Self::query); stops when `visit` returns `false`.
    ///
    /// Returns the number of hits visited.
    pub fn query_with(
        &self,
        rect: Rect,
        options: QueryOptions,
        mut visit: impl FnMut(&QueryHit) -> bool,
    ) -> usize {
        let aabb = rect_to_aabb(rect);
        let order = self.layers.ordered();
        let mut visited = 0;
        for &slot in order.iter().rev() {
            let layer = self.layers.at(slot);
            if options.exclude_display_only && layer.display_only {
                continue;
            }
            if !self.layers.is_enabled(layer.id) {
                continue;
            }
            let mut keys = Vec::new();
            layer.index.visit_rect(aabb, |_, key| {
                keys.push(key);
                true
            });
            if self.use_draw_priority {
                self.sort_draw_order(&mut keys);
                keys.reverse();
            }
            for key in keys {
                let Some(item) = self.items.get(&key).and_then(|r| r.item.upgrade()) else {
                    self.dead_seen.set(self.dead_seen.get() + 1);
                    continue;
                };
                visited += 1;
                if !visit(&QueryHit {
                    item,
                    layer: layer.id,
                }) {
                    return visited;
                }
            }
        }
        visited
    }

    /// Items whose bounds contain `point`.
    pub fn hit_test(&self, point: Point, options: QueryOptions) -> Vec<QueryHit> {
        self.query(Rect::from_points(point, point), options)
    }

    /// Sort into draw order: ascending priority, or descending when reversed.
    fn sort_draw_order(&self, keys: &mut [ItemKey]) {
        keys.sort_by_key(|k| self.items.get(k).map_or(0, |r| r.priority));
        if self.reverse_draw_order {
            keys.reverse();
        }
    }

    /// Order items within a layer by draw priority.
    pub fn use_draw_priority(&mut self, enabled: bool) {
        if self.use_draw_priority != enabled {
            self.use_draw_priority = enabled;
            self.targets.mark_all();
        }
    }

    /// Whether items are ordered by draw priority.
    pub fn is_using_draw_priority(&self) -> bool {
        self.use_draw_priority
    }

    /// Reverse the draw-priority order.
    pub fn reverse_draw_order(&mut self, reverse: bool) {
        if self.reverse_draw_order != reverse {
            self.reverse_draw_order = reverse;
            self.targets.mark_all();
        }
    }

    // --- layers ---

    /// Number of layers created so far.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer ids must be below this value.
    pub fn max_layers(&self) -> u32 {
        self.layers.max_layers()
    }

    /// Mark the targets of `id` and of every layer that requires it dirty.
    fn mark_layer_dirty(&mut self, id: LayerId) {
        let mut affected: SmallVec<[LayerId; 8]> = SmallVec::new();
        affected.push(id);
        loop {
            let before = affected.len();
            for l in self.layers.iter() {
                if !affected.contains(&l.id) && l.required.iter().any(|r| affected.contains(r)) {
                    affected.push(l.id);
                }
            }
            if affected.len() == before {
                break;
            }
        }
        for id in affected {
            if let Some(l) = self.layers.get(id) {
                self.targets.mark(l.target);
            }
        }
    }

    fn ensure_layer(&mut self, id: LayerId) -> bool {
        if self.layers.ensure(id).is_none() {
            debug!("layer {} out of range; ignored", id.0);
            return false;
        }
        true
    }

    /// Show or hide a layer.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) {
        if !self.ensure_layer(id) {
            return;
        }
        if let Some(l) = self.layers.get_mut(id)
            && l.visible != visible
        {
            l.visible = visible;
            self.mark_layer_dirty(id);
        }
    }

    /// The layer's own visible flag (`false` for unknown layers).
    pub fn is_layer_visible(&self, id: LayerId) -> bool {
        self.layers.get(id).is_some_and(|l| l.visible)
    }

    /// Effective visibility: own flag and every required layer, transitively.
    pub fn is_layer_enabled(&self, id: LayerId) -> bool {
        self.layers.is_enabled(id)
    }

    /// Composite the layer as a difference against what lies below.
    pub fn set_layer_diff(&mut self, id: LayerId, diff: bool) {
        if !self.ensure_layer(id) {
            return;
        }
        if let Some(l) = self.layers.get_mut(id)
            && l.diff != diff
        {
            l.diff = diff;
            self.targets.mark(l.target);
        }
    }

    /// Declare that the layer draws negative (clearing) shapes.
    pub fn set_layer_has_negatives(&mut self, id: LayerId, has_negatives: bool) {
        if !self.ensure_layer(id) {
            return;
        }
        if let Some(l) = self.layers.get_mut(id)
            && l.has_negatives != has_negatives
        {
            l.has_negatives = has_negatives;
            self.targets.mark(l.target);
        }
    }

    /// Render the layer but let hit tests skip it.
    pub fn set_layer_display_only(&mut self, id: LayerId, display_only: bool) {
        if !self.ensure_layer(id) {
            return;
        }
        if let Some(l) = self.layers.get_mut(id) {
            l.display_only = display_only;
        }
    }

    /// Whether the layer is display-only.
    pub fn is_layer_display_only(&self, id: LayerId) -> bool {
        self.layers.get(id).is_some_and(|l| l.display_only)
    }

    /// Route the layer to `target`. Both the old and the new target become dirty.
    pub fn set_layer_target(&mut self, id: LayerId, target: RenderTarget) {
        if !self.ensure_layer(id) {
            return;
        }
        let Some(l) = self.layers.get_mut(id) else {
            return;
        };
        let old = l.target;
        if old == target {
            return;
        }
        l.target = target;
        self.targets.mark(old);
        self.targets.mark(target);
        if old == RenderTarget::Cached {
            self.drop_layer_groups(id);
        }
    }

    fn drop_layer_groups(&mut self, id: LayerId) {
        for record in self.items.values_mut() {
            record.groups.retain(|(l, g)| {
                if *l == id {
                    self.stale_groups.push(*g);
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Target the layer is routed to.
    pub fn layer_target(&self, id: LayerId) -> Option<RenderTarget> {
        self.layers.get(id).map(|l| l.target)
    }

    /// Whether the layer renders into the cached target.
    pub fn is_cached(&self, id: LayerId) -> bool {
        self.layer_target(id) == Some(RenderTarget::Cached)
    }

    /// Set the layer's rendering order; lower renders first.
    pub fn set_layer_order(&mut self, id: LayerId, order: i32) {
        if !self.ensure_layer(id) {
            return;
        }
        if let Some(l) = self.layers.get_mut(id)
            && l.order != order
        {
            l.order = order;
            self.layers.invalidate_order();
            self.mark_layer_dirty(id);
        }
    }

    /// Rendering order of the layer.
    pub fn layer_order(&self, id: LayerId) -> Option<i32> {
        self.layers.get(id).map(|l| l.order)
    }

    /// Make `id` visible only while `required` is visible, or drop that dependency.
    pub fn set_required(&mut self, id: LayerId, required: LayerId, enabled: bool) {
        if !self.ensure_layer(id) || !self.ensure_layer(required) {
            return;
        }
        let Some(l) = self.layers.get_mut(id) else {
            return;
        };
        let present = l.required.contains(&required);
        if enabled && !present {
            l.required.push(required);
        } else if !enabled && present {
            l.required.retain(|r| *r != required);
        } else {
            return;
        }
        self.mark_layer_dirty(id);
    }

    /// Sort `ids` by effective rendering order, top-most first.
    ///
    /// Top layers sort ahead of every other layer while top-layer display is enabled.
    pub fn sort_layers(&self, ids: &mut [LayerId]) {
        self.layers.sort_ids(ids);
    }

    /// Add `id` to or remove it from the top-layer set.
    pub fn set_top_layer(&mut self, id: LayerId, enabled: bool) {
        if !self.ensure_layer(id) {
            return;
        }
        if self.layers.set_top(id, enabled) && self.layers.top_enabled() {
            self.mark_layer_dirty(id);
        }
    }

    /// Whether `id` is in the top-layer set.
    pub fn is_top_layer(&self, id: LayerId) -> bool {
        self.layers.is_top(id)
    }

    /// Turn top-layer display on or off without forgetting the set.
    pub fn enable_top_layer(&mut self, enable: bool) {
        if self.layers.enable_top(enable) {
            self.mark_top_layers_dirty();
        }
    }

    /// Empty the top-layer set.
    pub fn clear_top_layers(&mut self) {
        if self.layers.top_enabled() {
            self.mark_top_layers_dirty();
        }
        self.layers.clear_top();
    }

    fn mark_top_layers_dirty(&mut self) {
        let top: SmallVec<[LayerId; 8]> = self.layers.top_layers().collect();
        for id in top {
            self.mark_layer_dirty(id);
        }
    }

    /// Re-sort the cached layer order, re-depth cached groups, and mark every target dirty.
    pub fn update_all_layers_order(&mut self) {
        self.layers.refresh_order();
        self.group_depths_stale = true;
        self.targets.mark_all();
    }

    /// Schedule recoloring of the layer's cached groups and mark its target dirty.
    pub fn update_layer_color(&mut self, id: LayerId) {
        let Some(l) = self.layers.get(id) else {
            return;
        };
        if l.target == RenderTarget::Cached {
            self.pending_recolors
                .extend(l.index.iter().map(|(_, _, key)| (key, id)));
        }
        self.targets.mark(l.target);
    }

    /// [`update_layer_color`](Self::update_layer_color) for every layer.
    pub fn update_all_layers_color(&mut self) {
        let ids: Vec<LayerId> = self.layers.iter().map(|l| l.id).collect();
        for id in ids {
            self.update_layer_color(id);
        }
    }

    // --- dirty targets ---

    /// Mark one target dirty.
    pub fn mark_target_dirty(&mut self, target: RenderTarget) {
        self.targets.mark(target);
    }

    /// Whether `target` needs redrawing.
    pub fn is_target_dirty(&self, target: RenderTarget) -> bool {
        self.targets.is_dirty(target)
    }

    /// Whether any target needs redrawing.
    pub fn is_dirty(&self) -> bool {
        self.targets.any()
    }

    /// Mark every target dirty.
    pub fn mark_dirty(&mut self) {
        self.targets.mark_all();
    }

    /// Mark every target clean.
    pub fn mark_clean(&mut self) {
        self.targets.clear_all();
    }

    /// Clear the dirty flags once a redraw pass has consumed them.
    pub fn clear_targets(&mut self) {
        self.targets.clear_all();
    }

    // --- viewport ---

    /// The viewport transform.
    pub fn viewport_transform(&self) -> &Viewport {
        &self.viewport
    }

    /// Center and zoom so that `rect` fills the screen.
    pub fn set_viewport(&mut self, rect: Rect) {
        if self.viewport.set_viewport(rect) {
            self.targets.mark_all();
        } else {
            warn!("set_viewport({rect:?}) ignored: screen size is {:?}", self.viewport.screen_size());
        }
    }

    /// World rectangle currently on screen.
    pub fn viewport(&self) -> Rect {
        self.viewport.viewport()
    }

    /// Rectangle queried by redraw; the same as [`viewport`](Self::viewport).
    pub fn visible_rect(&self) -> Rect {
        self.viewport.viewport()
    }

    /// Zoom to `scale` around `anchor` (the center when `None`).
    pub fn set_scale(&mut self, scale: f64, anchor: Option<Point>) {
        self.viewport.set_scale(scale, anchor);
        self.targets.mark_all();
    }

    /// Screen pixels per world unit.
    pub fn scale(&self) -> f64 {
        self.viewport.scale()
    }

    /// Pan so that `center` is in the middle of the screen (clamped to the boundary).
    pub fn set_center(&mut self, center: Point) {
        self.viewport.set_center(center);
        self.targets.mark_all();
    }

    /// World point in the middle of the screen.
    pub fn center(&self) -> Point {
        self.viewport.center()
    }

    /// Mirror the x and/or y axis.
    pub fn set_mirror(&mut self, mirror_x: bool, mirror_y: bool) {
        self.viewport.set_mirror(mirror_x, mirror_y);
        self.targets.mark_all();
    }

    /// Mirror flags for the x and y axes.
    pub fn mirror(&self) -> (bool, bool) {
        self.viewport.mirror()
    }

    /// Confine the view center to `boundary`.
    pub fn set_boundary(&mut self, boundary: Rect) {
        self.viewport.set_boundary(boundary);
        self.targets.mark_all();
    }

    /// Integer variant of [`set_boundary`](Self::set_boundary).
    pub fn set_boundary_int(&mut self, boundary: Aabb2D<i64>) {
        self.viewport.set_boundary_int(boundary);
        self.targets.mark_all();
    }

    /// Rectangle the view center is confined to.
    pub fn boundary(&self) -> Rect {
        self.viewport.boundary()
    }

    /// Set scale limits; `max` must exceed `min`.
    pub fn set_scale_limits(&mut self, min: f64, max: f64) {
        let before = self.viewport.scale();
        self.viewport.set_scale_limits(min, max);
        if self.viewport.scale() != before {
            self.targets.mark_all();
        }
    }

    /// Current `(min, max)` scale limits.
    pub fn scale_limits(&self) -> (f64, f64) {
        self.viewport.scale_limits()
    }

    /// Set the screen size in pixels.
    pub fn set_screen_size(&mut self, size: Size) {
        if self.viewport.screen_size() != size {
            self.viewport.set_screen_size(size);
            self.targets.mark_all();
        }
    }

    /// Screen size in pixels.
    pub fn screen_size(&self) -> Size {
        self.viewport.screen_size()
    }

    /// World point to screen point.
    pub fn to_screen(&self, p: Point) -> Point {
        self.viewport.to_screen(p)
    }

    /// Screen point to world point.
    pub fn to_world(&self, p: Point) -> Point {
        self.viewport.to_world(p)
    }

    /// World direction to screen direction.
    pub fn to_screen_vec(&self, v: Vec2) -> Vec2 {
        self.viewport.to_screen_vec(v)
    }

    /// Screen direction to world direction.
    pub fn to_world_vec(&self, v: Vec2) -> Vec2 {
        self.viewport.to_world_vec(v)
    }

    /// World length to screen length.
    pub fn to_screen_size(&self, size: f64) -> f64 {
        self.viewport.to_screen_size(size)
    }

    /// Screen length to world length.
    pub fn to_world_size(&self, size: f64) -> f64 {
        self.viewport.to_world_size(size)
    }

    /// Full world-to-screen transform.
    pub fn world_to_screen(&self) -> Affine {
        self.viewport.world_to_screen()
    }

    // --- preview ---

    /// Reset the preview to an empty, shown group.
    pub fn init_preview(&mut self) {
        self.preview.clear();
        self.preview.set_shown(true);
        self.targets.mark(RenderTarget::Overlay);
    }

    /// Empty the preview, releasing owned items.
    pub fn clear_preview(&mut self) {
        self.preview.clear();
        self.targets.mark(RenderTarget::Overlay);
    }

    /// Add `item` to the preview and show it.
    ///
    /// With `take_ownership` the preview keeps the item alive until cleared;
    /// otherwise it only holds a weak reference.
    pub fn add_to_preview<I: ViewItem + 'static>(&mut self, item: &Rc<I>, take_ownership: bool) {
        let item: Rc<dyn ViewItem> = Rc::clone(item) as Rc<dyn ViewItem>;
        self.add_dyn_to_preview(item, take_ownership);
    }

    /// [`add_to_preview`](Self::add_to_preview) for an already type-erased item.
    pub fn add_dyn_to_preview(&mut self, item: Rc<dyn ViewItem>, take_ownership: bool) {
        if !self.preview.add(item, take_ownership) {
            debug!("item already in preview");
        }
        self.preview.set_shown(true);
        self.targets.mark(RenderTarget::Overlay);
    }

    /// Remove `item` from the preview.
    pub fn remove_from_preview<I: ViewItem + ?Sized>(&mut self, item: &I) -> bool {
        let removed = self.preview.remove(ItemKey::of(item));
        if removed {
            self.targets.mark(RenderTarget::Overlay);
        }
        removed
    }

    /// Show or hide the preview.
    pub fn show_preview(&mut self, show: bool) {
        if self.preview.set_shown(show) {
            self.targets.mark(RenderTarget::Overlay);
        }
    }

    /// Whether the preview is shown.
    pub fn is_preview_shown(&self) -> bool {
        self.preview.is_shown()
    }

    /// Number of preview entries (borrowed entries may have been dropped).
    pub fn preview_len(&self) -> usize {
        self.preview.len()
    }

    // --- redraw ---

    /// Repaint every target.
    pub fn redraw(&mut self, gal: &mut dyn Gal, painter: &mut dyn Painter) {
        self.targets.mark_all();
        self.redraw_dirty(gal, painter);
    }

    /// Apply pending updates, then repaint only the dirty targets and mark them clean.
    pub fn redraw_dirty(&mut self, gal: &mut dyn Gal, painter: &mut dyn Painter) {
        if let Some(size) = gal.screen_size() {
            self.set_screen_size(size);
        }
        self.update_items();
        if self.layers.is_order_stale() {
            self.layers.refresh_order();
            self.group_depths_stale = true;
        }
        self.flush_groups(gal, painter);
        if !self.targets.any() {
            return;
        }
        gal.set_world_to_screen(self.viewport.world_to_screen());
        self.clear_dirty_surfaces(gal);

        let dirty = self.targets.dirty_set();
        let rect = rect_to_aabb(self.viewport.viewport());
        let order = self.layers.ordered().into_owned();
        for (depth, &slot) in order.iter().enumerate() {
            let layer = self.layers.at(slot);
            if !dirty.has(layer.target) || !self.layers.is_enabled(layer.id) {
                continue;
            }
            let (id, target, diff, negatives) =
                (layer.id, layer.target, layer.diff, layer.has_negatives);
            let depth = i32::try_from(depth).unwrap_or(i32::MAX);
            let keys = self.renderable_on(slot, rect);
            gal.set_target(target);
            gal.set_layer_depth(depth);
            if diff {
                gal.begin_diff_layer();
            }
            if negatives {
                gal.begin_negatives_layer();
            }
            for key in keys {
                self.draw_item(key, id, target == RenderTarget::Cached, gal, painter);
            }
            if negatives {
                gal.end_negatives_layer();
            }
            if diff {
                gal.end_diff_layer();
            }
        }
        if dirty.has(RenderTarget::Overlay) && self.preview.is_shown() {
            self.draw_preview(gal, painter);
        }
        self.targets.clear_all();
    }

    /// Wipe dirty surfaces. Cached and non-cached content is composited
    /// together, so wiping either wipes (and repaints) both.
    fn clear_dirty_surfaces(&mut self, gal: &mut dyn Gal) {
        if self.targets.is_dirty(RenderTarget::Cached)
            || self.targets.is_dirty(RenderTarget::NonCached)
        {
            gal.clear_target(RenderTarget::NonCached);
            gal.clear_target(RenderTarget::Cached);
            self.targets.mark(RenderTarget::Cached);
            self.targets.mark(RenderTarget::NonCached);
        }
        if self.targets.is_dirty(RenderTarget::Overlay) {
            gal.clear_target(RenderTarget::Overlay);
        }
    }

    fn flush_groups(&mut self, gal: &mut dyn Gal, painter: &mut dyn Painter) {
        for group in self.stale_groups.drain(..) {
            gal.delete_group(group);
        }
        for (key, layer) in core::mem::take(&mut self.pending_recolors) {
            if let Some(record) = self.items.get(&key)
                && let Some(group) = record.group_on(layer)
                && let Some(item) = record.item.upgrade()
            {
                gal.change_group_color(group, painter.color(&*item, layer));
            }
        }
        if core::mem::take(&mut self.group_depths_stale) {
            let depths = self.layers.depths();
            for record in self.items.values() {
                for &(layer, group) in &record.groups {
                    if let Some(&depth) = depths.get(&layer) {
                        gal.change_group_depth(group, depth);
                    }
                }
            }
        }
    }

    /// Items on the layer at `slot` that intersect `rect` and should be drawn, in draw order.
    fn renderable_on(&self, slot: usize, rect: Aabb2D<f64>) -> Vec<ItemKey> {
        let layer = self.layers.at(slot);
        let scale = self.viewport.scale();
        let mut keys = Vec::new();
        layer.index.visit_rect(rect, |_, key| {
            let Some(record) = self.items.get(&key) else {
                return true;
            };
            let Some(item) = record.item.upgrade() else {
                self.dead_seen.set(self.dead_seen.get() + 1);
                return true;
            };
            if record.flags == ItemFlags::VISIBLE && item.min_draw_scale(layer.id) < scale {
                keys.push(key);
            }
            true
        });
        if self.use_draw_priority {
            self.sort_draw_order(&mut keys);
        }
        keys
    }

    fn draw_item(
        &mut self,
        key: ItemKey,
        layer: LayerId,
        cached: bool,
        gal: &mut dyn Gal,
        painter: &mut dyn Painter,
    ) {
        let Some(record) = self.items.get_mut(&key) else {
            return;
        };
        let Some(item) = record.item.upgrade() else {
            return;
        };
        if cached {
            if let Some(group) = record.group_on(layer) {
                gal.draw_group(group);
                return;
            }
            if let Some(group) = gal.begin_group() {
                paint(&*item, layer, gal, painter);
                gal.end_group();
                record.groups.push((layer, group));
                gal.draw_group(group);
                return;
            }
        }
        paint(&*item, layer, gal, painter);
    }

    fn draw_preview(&self, gal: &mut dyn Gal, painter: &mut dyn Painter) {
        let items = self.preview.items();
        if items.is_empty() {
            return;
        }
        gal.set_target(RenderTarget::Overlay);
        gal.set_layer_depth(i32::try_from(self.layers.len()).unwrap_or(i32::MAX));
        for item in items {
            let mut layers = dedup_layers(item.layers());
            self.layers.sort_ids(&mut layers);
            for &layer in layers.iter().rev() {
                if self.layers.is_enabled(layer) {
                    paint(&*item, layer, gal, painter);
                }
            }
        }
    }
}
