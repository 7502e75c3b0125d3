// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transient, unindexed overlay items (drag previews, tool feedback).

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use crate::item::{ItemKey, ViewItem};

enum PreviewEntry {
    /// Released when the preview is cleared.
    Owned(Rc<dyn ViewItem>),
    Borrowed(Weak<dyn ViewItem>),
}

impl PreviewEntry {
    fn item(&self) -> Option<Rc<dyn ViewItem>> {
        match self {
            Self::Owned(rc) => Some(Rc::clone(rc)),
            Self::Borrowed(weak) => weak.upgrade(),
        }
    }

    fn key(&self) -> ItemKey {
        match self {
            Self::Owned(rc) => ItemKey::of(&**rc),
            Self::Borrowed(weak) => ItemKey::of_weak(weak),
        }
    }
}

pub(crate) struct PreviewGroup {
    entries: Vec<PreviewEntry>,
    shown: bool,
}

impl Default for PreviewGroup {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            shown: true,
        }
    }
}

impl core::fmt::Debug for PreviewGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let owned = self
            .entries
            .iter()
            .filter(|e| matches!(e, PreviewEntry::Owned(_)))
            .count();
        f.debug_struct("PreviewGroup")
            .field("entries", &self.entries.len())
            .field("owned", &owned)
            .field("shown", &self.shown)
            .finish()
    }
}

impl PreviewGroup {
    /// Drop every entry; owned items are released.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `false` if the item is already in the preview.
    pub(crate) fn add(&mut self, item: Rc<dyn ViewItem>, take_ownership: bool) -> bool {
        let key = ItemKey::of(&*item);
        if self.entries.iter().any(|e| e.key() == key) {
            return false;
        }
        self.entries.push(if take_ownership {
            PreviewEntry::Owned(item)
        } else {
            PreviewEntry::Borrowed(Rc::downgrade(&item))
        });
        true
    }

    pub(crate) fn remove(&mut self, key: ItemKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key() != key);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_shown(&self) -> bool {
        self.shown
    }

    pub(crate) fn set_shown(&mut self, shown: bool) -> bool {
        let changed = self.shown != shown;
        self.shown = shown;
        changed
    }

    /// Live items in insertion order.
    pub(crate) fn items(&self) -> Vec<Rc<dyn ViewItem>> {
        self.entries.iter().filter_map(PreviewEntry::item).collect()
    }
}
