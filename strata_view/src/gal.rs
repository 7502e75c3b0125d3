// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering backend and painter interfaces, plus a headless recording backend.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Affine, BezPath, Size};

use crate::item::ViewItem;
use crate::layer::LayerId;
use crate::target::RenderTarget;

/// An sRGB color with alpha, 8 bits per channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color([u8; 4]);

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(u8::MAX, u8::MAX, u8::MAX);

    /// Creates a color from its RGBA components.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Creates a color from RGB components with 100% alpha.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, u8::MAX)
    }

    /// The `[r, g, b, a]` components.
    pub const fn components(self) -> [u8; 4] {
        self.0
    }
}

/// Handle of a recorded draw group inside a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

/// Graphics abstraction layer: the surface a [`View`](crate::View) draws into.
///
/// Draw calls are issued in world coordinates; the backend applies the
/// world-to-screen transform it was last given. Everything except the path
/// primitives has a no-op default, so simple backends only implement drawing.
pub trait Gal {
    /// Transform applied to subsequent world-space draw calls.
    fn set_world_to_screen(&mut self, transform: Affine) {
        let _ = transform;
    }

    /// Pixel size of the output surface, if the backend knows it.
    ///
    /// When this differs from the view's screen size the view adopts it at the
    /// start of the next redraw.
    fn screen_size(&self) -> Option<Size> {
        None
    }

    /// Direct subsequent draw calls to `target`.
    fn set_target(&mut self, target: RenderTarget) {
        let _ = target;
    }

    /// Wipe `target` before it is repainted.
    fn clear_target(&mut self, target: RenderTarget) {
        let _ = target;
    }

    /// Stacking depth for subsequent draw calls; higher draws above lower.
    fn set_layer_depth(&mut self, depth: i32) {
        let _ = depth;
    }

    /// Start a layer composited as a difference against what is below.
    fn begin_diff_layer(&mut self) {}

    /// Finish the current difference layer.
    fn end_diff_layer(&mut self) {}

    /// Start a layer that may contain negative (clearing) shapes.
    fn begin_negatives_layer(&mut self) {}

    /// Finish the current negatives layer.
    fn end_negatives_layer(&mut self) {}

    /// Begin recording draw calls into a new group.
    ///
    /// Returns `None` when the backend does not cache groups; the view then
    /// draws cached layers immediately on every redraw.
    fn begin_group(&mut self) -> Option<GroupId> {
        None
    }

    /// Stop recording the current group.
    fn end_group(&mut self) {}

    /// Replay a recorded group.
    fn draw_group(&mut self, group: GroupId) {
        let _ = group;
    }

    /// Discard a recorded group.
    fn delete_group(&mut self, group: GroupId) {
        let _ = group;
    }

    /// Recolor everything recorded in a group.
    fn change_group_color(&mut self, group: GroupId, color: Color) {
        let _ = (group, color);
    }

    /// Move a recorded group to another stacking depth.
    fn change_group_depth(&mut self, group: GroupId, depth: i32) {
        let _ = (group, depth);
    }

    /// Fill a world-space path.
    fn fill_path(&mut self, path: &BezPath, color: Color);

    /// Stroke a world-space path with a world-space width.
    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color);
}

/// Style resolver that turns an item on a layer into draw calls.
pub trait Painter {
    /// Draw `item` on `layer`. Return `false` to fall back to [`ViewItem::draw`].
    fn draw(&mut self, item: &dyn ViewItem, layer: LayerId, gal: &mut dyn Gal) -> bool;

    /// Color of `item` on `layer`, used to recolor cached groups.
    fn color(&self, item: &dyn ViewItem, layer: LayerId) -> Color;
}

/// A command captured by [`RecordingGal`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// [`Gal::set_world_to_screen`]
    SetWorldToScreen(Affine),
    /// [`Gal::set_target`]
    SetTarget(RenderTarget),
    /// [`Gal::clear_target`]
    ClearTarget(RenderTarget),
    /// [`Gal::set_layer_depth`]
    SetLayerDepth(i32),
    /// [`Gal::begin_diff_layer`]
    BeginDiffLayer,
    /// [`Gal::end_diff_layer`]
    EndDiffLayer,
    /// [`Gal::begin_negatives_layer`]
    BeginNegativesLayer,
    /// [`Gal::end_negatives_layer`]
    EndNegativesLayer,
    /// [`Gal::draw_group`]
    DrawGroup(GroupId),
    /// [`Gal::delete_group`]
    DeleteGroup(GroupId),
    /// [`Gal::change_group_color`]
    ChangeGroupColor(GroupId, Color),
    /// [`Gal::change_group_depth`]
    ChangeGroupDepth(GroupId, i32),
    /// [`Gal::fill_path`]
    FillPath {
        /// Path in world coordinates.
        path: BezPath,
        /// Fill color.
        color: Color,
    },
    /// [`Gal::stroke_path`]
    StrokePath {
        /// Path in world coordinates.
        path: BezPath,
        /// Stroke width in world units.
        width: f64,
        /// Stroke color.
        color: Color,
    },
}

/// Headless backend that records every call.
///
/// Draw calls issued between [`Gal::begin_group`] and [`Gal::end_group`] are
/// stored in the group instead of the main command list; replaying a group
/// records a single [`Command::DrawGroup`].
#[derive(Clone, Debug, Default)]
pub struct RecordingGal {
    commands: Vec<Command>,
    groups: HashMap<GroupId, Vec<Command>>,
    recording: Option<GroupId>,
    next_group: u32,
    screen_size: Option<Size>,
    groups_enabled: bool,
}

impl RecordingGal {
    /// A recorder that supports groups.
    pub fn new() -> Self {
        Self {
            groups_enabled: true,
            ..Self::default()
        }
    }

    /// A recorder that declines to cache groups.
    pub fn without_groups() -> Self {
        Self::default()
    }

    /// Report `size` as the screen size.
    pub fn with_screen_size(mut self, size: Size) -> Self {
        self.screen_size = Some(size);
        self
    }

    /// Commands recorded outside groups.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Take the recorded commands, leaving the list empty.
    pub fn take_commands(&mut self) -> Vec<Command> {
        core::mem::take(&mut self.commands)
    }

    /// Commands recorded into `group`, if it still exists.
    pub fn group(&self, group: GroupId) -> Option<&[Command]> {
        self.groups.get(&group).map(Vec::as_slice)
    }

    /// Number of live groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn push(&mut self, command: Command) {
        match self.recording.and_then(|g| self.groups.get_mut(&g)) {
            Some(group) => group.push(command),
            None => self.commands.push(command),
        }
    }
}

impl Gal for RecordingGal {
    fn set_world_to_screen(&mut self, transform: Affine) {
        self.push(Command::SetWorldToScreen(transform));
    }

    fn screen_size(&self) -> Option<Size> {
        self.screen_size
    }

    fn set_target(&mut self, target: RenderTarget) {
        self.push(Command::SetTarget(target));
    }

    fn clear_target(&mut self, target: RenderTarget) {
        self.push(Command::ClearTarget(target));
    }

    fn set_layer_depth(&mut self, depth: i32) {
        self.push(Command::SetLayerDepth(depth));
    }

    fn begin_diff_layer(&mut self) {
        self.push(Command::BeginDiffLayer);
    }

    fn end_diff_layer(&mut self) {
        self.push(Command::EndDiffLayer);
    }

    fn begin_negatives_layer(&mut self) {
        self.push(Command::BeginNegativesLayer);
    }

    fn end_negatives_layer(&mut self) {
        self.push(Command::EndNegativesLayer);
    }

    fn begin_group(&mut self) -> Option<GroupId> {
        if !self.groups_enabled || self.recording.is_some() {
            return None;
        }
        self.next_group += 1;
        let id = GroupId(self.next_group);
        self.groups.insert(id, Vec::new());
        self.recording = Some(id);
        Some(id)
    }

    fn end_group(&mut self) {
        self.recording = None;
    }

    fn draw_group(&mut self, group: GroupId) {
        self.push(Command::DrawGroup(group));
    }

    fn delete_group(&mut self, group: GroupId) {
        self.groups.remove(&group);
        self.push(Command::DeleteGroup(group));
    }

    fn change_group_color(&mut self, group: GroupId, color: Color) {
        if let Some(cmds) = self.groups.get_mut(&group) {
            for cmd in cmds.iter_mut() {
                match cmd {
                    Command::FillPath { color: c, .. } | Command::StrokePath { color: c, .. } => {
                        *c = color;
                    }
                    _ => {}
                }
            }
        }
        self.push(Command::ChangeGroupColor(group, color));
    }

    fn change_group_depth(&mut self, group: GroupId, depth: i32) {
        self.push(Command::ChangeGroupDepth(group, depth));
    }

    fn fill_path(&mut self, path: &BezPath, color: Color) {
        self.push(Command::FillPath {
            path: path.clone(),
            color,
        });
    }

    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color) {
        self.push(Command::StrokePath {
            path: path.clone(),
            width,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape};

    #[test]
    fn group_contents_stay_out_of_the_main_list() {
        let mut gal = RecordingGal::new();
        let path = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.1);
        let g = gal.begin_group().unwrap();
        gal.fill_path(&path, Color::WHITE);
        gal.end_group();
        gal.draw_group(g);
        assert_eq!(gal.commands(), [Command::DrawGroup(g)]);
        assert_eq!(gal.group(g).map(<[Command]>::len), Some(1));

        gal.change_group_color(g, Color::BLACK);
        assert!(matches!(
            gal.group(g).unwrap()[0],
            Command::FillPath {
                color: Color::BLACK,
                ..
            }
        ));
        gal.delete_group(g);
        assert_eq!(gal.group_count(), 0);
    }

    #[test]
    fn groups_can_be_disabled() {
        let mut gal = RecordingGal::without_groups();
        assert_eq!(gal.begin_group(), None);
        gal.stroke_path(&BezPath::new(), 1.0, Color::BLACK);
        assert_eq!(gal.commands().len(), 1);
    }
}
