// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render targets and the dirty-target tracker.

/// A composited surface that can be invalidated and redrawn on its own.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderTarget {
    /// Main surface whose contents are cached between frames (board items).
    Cached,
    /// Surface repainted from scratch on every redraw (ratsnest, grid).
    NonCached,
    /// Always-on-top surface for selections, previews, and tool feedback.
    Overlay,
}

impl RenderTarget {
    /// Number of render targets.
    pub const COUNT: usize = 3;

    /// All targets in compositing order.
    pub const ALL: [Self; Self::COUNT] = [Self::Cached, Self::NonCached, Self::Overlay];

    /// Dense index of this target.
    pub const fn index(self) -> usize {
        match self {
            Self::Cached => 0,
            Self::NonCached => 1,
            Self::Overlay => 2,
        }
    }

    /// Target for a dense index; `None` when out of range.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Cached),
            1 => Some(Self::NonCached),
            2 => Some(Self::Overlay),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// A set of render targets.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TargetSet: u8 {
        /// [`RenderTarget::Cached`]
        const CACHED    = 0b0000_0001;
        /// [`RenderTarget::NonCached`]
        const NONCACHED = 0b0000_0010;
        /// [`RenderTarget::Overlay`]
        const OVERLAY   = 0b0000_0100;
    }
}

impl From<RenderTarget> for TargetSet {
    fn from(target: RenderTarget) -> Self {
        match target {
            RenderTarget::Cached => Self::CACHED,
            RenderTarget::NonCached => Self::NONCACHED,
            RenderTarget::Overlay => Self::OVERLAY,
        }
    }
}

impl TargetSet {
    /// Whether `target` is in the set.
    pub fn has(self, target: RenderTarget) -> bool {
        self.contains(target.into())
    }

    /// Iterate the targets in the set in compositing order.
    pub fn targets(self) -> impl Iterator<Item = RenderTarget> {
        RenderTarget::ALL.into_iter().filter(move |t| self.has(*t))
    }
}

/// Per-target CLEAN/DIRTY state.
///
/// Starts with every target dirty so the first redraw paints everything.
/// Flags are only cleared explicitly; mutations never clean a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyTargets {
    dirty: TargetSet,
}

impl Default for DirtyTargets {
    fn default() -> Self {
        Self {
            dirty: TargetSet::all(),
        }
    }
}

impl DirtyTargets {
    /// Mark one target dirty.
    pub fn mark(&mut self, target: RenderTarget) {
        self.dirty |= target.into();
    }

    /// Mark every target in `set` dirty.
    pub fn mark_set(&mut self, set: TargetSet) {
        self.dirty |= set;
    }

    /// Mark every target dirty.
    pub fn mark_all(&mut self) {
        self.dirty = TargetSet::all();
    }

    /// Mark every target clean.
    pub fn clear_all(&mut self) {
        self.dirty = TargetSet::empty();
    }

    /// Whether `target` needs redrawing.
    pub fn is_dirty(&self, target: RenderTarget) -> bool {
        self.dirty.has(target)
    }

    /// Whether any target needs redrawing.
    pub fn any(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// The dirty targets as a set.
    pub fn dirty_set(&self) -> TargetSet {
        self.dirty
    }
}
