// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawable items: the [`ViewItem`] trait, per-item flags, and the destruction back-link.

use alloc::rc::Weak;
use alloc::vec::Vec;
use core::cell::RefCell;

use kurbo::Rect;
use smallvec::SmallVec;

use crate::gal::Gal;
use crate::layer::LayerId;

/// Layers an item occupies.
pub type LayerSet = SmallVec<[LayerId; 4]>;

/// A drawable entity managed by a [`View`](crate::View).
///
/// Items are owned by the caller (as `Rc<I>`); the view only keeps a weak
/// reference. Embed a [`ViewLink`] and return it from [`view_link`](Self::view_link)
/// so that dropping the item purges it from the view automatically.
pub trait ViewItem {
    /// World-space bounding box.
    fn bounding_box(&self) -> Rect;

    /// Layers this item is drawn on.
    fn layers(&self) -> LayerSet;

    /// Draw the item on `layer`. Called when the painter declines to draw it.
    fn draw(&self, layer: LayerId, gal: &mut dyn Gal) {
        let _ = (layer, gal);
    }

    /// The item is only drawn on `layer` while the view scale exceeds this value.
    fn min_draw_scale(&self, layer: LayerId) -> f64 {
        let _ = layer;
        0.0
    }

    /// Back-link used to notify the view when the item is dropped.
    fn view_link(&self) -> Option<&ViewLink> {
        None
    }
}

/// Identity of an item inside a view.
///
/// This is the address of the item's `Rc` allocation. The view holds a `Weak`
/// to every registered item, which keeps the allocation (and so the address)
/// reserved until the item is purged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(usize);

impl ItemKey {
    /// Key of `item`.
    pub fn of<I: ?Sized>(item: &I) -> Self {
        Self(core::ptr::from_ref(item).cast::<()>().addr())
    }

    pub(crate) fn of_weak<I: ?Sized>(item: &Weak<I>) -> Self {
        Self(item.as_ptr().cast::<()>().addr())
    }
}

/// Keys of dropped items waiting to be purged.
pub(crate) type DropQueue = RefCell<Vec<ItemKey>>;

/// Back-link from an item to the view it is registered with.
///
/// Dropping a linked item pushes its key onto the view's drop queue; the view
/// purges the item on its next mutation or redraw, or when
/// [`View::collect_dropped`](crate::View::collect_dropped) is called.
#[derive(Debug, Default)]
pub struct ViewLink {
    slot: RefCell<Option<(ItemKey, Weak<DropQueue>)>>,
}

impl ViewLink {
    /// Create an unattached link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the link is attached to a live view.
    pub fn is_attached(&self) -> bool {
        self.slot
            .borrow()
            .as_ref()
            .is_some_and(|(_, queue)| queue.strong_count() > 0)
    }

    /// Returns `false` if the link already belongs to another live view.
    pub(crate) fn attach(&self, key: ItemKey, queue: Weak<DropQueue>) -> bool {
        let Ok(mut slot) = self.slot.try_borrow_mut() else {
            return false;
        };
        if let Some((_, existing)) = slot.as_ref()
            && existing.strong_count() > 0
            && !existing.ptr_eq(&queue)
        {
            return false;
        }
        *slot = Some((key, queue));
        true
    }

    pub(crate) fn detach(&self) {
        if let Ok(mut slot) = self.slot.try_borrow_mut() {
            *slot = None;
        }
    }
}

impl Drop for ViewLink {
    fn drop(&mut self) {
        if let Some((key, queue)) = self.slot.get_mut().take()
            && let Some(queue) = queue.upgrade()
            && let Ok(mut queue) = queue.try_borrow_mut()
        {
            queue.push(key);
        }
    }
}

bitflags::bitflags! {
    /// Per-item visibility state.
    ///
    /// An item is drawn only when its flags are exactly [`ItemFlags::VISIBLE`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// Item is visible.
        const VISIBLE        = 0b0000_0001;
        /// Item is temporarily hidden (for example while a tool drags a copy).
        const HIDDEN         = 0b0000_0010;
        /// Item is also hidden from overlay compositing.
        const OVERLAY_HIDDEN = 0b0000_0100;
    }
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self::VISIBLE
    }
}

bitflags::bitflags! {
    /// What changed about an item since it was last indexed and drawn.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u8 {
        /// Visibility or style changed; redraw only.
        const APPEARANCE  = 0b0000_0001;
        /// Color changed; cached groups are recolored instead of rebuilt.
        const COLOR       = 0b0000_0010;
        /// Bounding box changed.
        const GEOMETRY    = 0b0000_0100;
        /// Occupied layers changed.
        const LAYERS      = 0b0000_1000;
        /// Item was just added.
        const INITIAL_ADD = 0b0001_0000;
        /// Cached groups must be rebuilt.
        const REPAINT     = 0b0010_0000;
        /// Everything except [`UpdateFlags::INITIAL_ADD`].
        const ALL = Self::APPEARANCE.bits()
            | Self::COLOR.bits()
            | Self::GEOMETRY.bits()
            | Self::LAYERS.bits()
            | Self::REPAINT.bits();
    }
}
