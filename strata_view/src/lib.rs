// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=strata_view --heading-base-level=0

//! Strata View: a Kurbo-native, layered, spatially indexed scene view.
//!
//! Strata View sits between a document model and a drawing backend in CAD and
//! EDA style editors, where thousands of items are spread over many stacked layers.
//!
//! - Items implement [`ViewItem`] and are owned by the caller; the view holds them weakly.
//! - Every layer keeps its own R-tree (from `strata_index`), so queries and redraws only touch what is on screen.
//! - Layers carry visibility, an explicit rendering order, a top-layer override set, and
//!   "required" dependencies on other layers.
//! - A [`Viewport`] maps world to screen coordinates with zoom, pan, mirroring, and a boundary.
//! - Layers render into one of three [`RenderTarget`]s. Each target has a dirty flag, so an
//!   incremental redraw repaints only what changed.
//! - A preview group draws transient items on the overlay without indexing them.
//!
//! ## Drawing
//!
//! The view does not rasterize anything. It drives a [`Gal`] (graphics abstraction layer)
//! through a [`Painter`] that picks styles. Backends that can cache recorded groups get
//! their cached-layer content recorded once and replayed; color-only updates recolor the
//! group in place. [`RecordingGal`] is a headless backend that records commands.
//!
//! ## Updates
//!
//! Changing an item's geometry or layers is announced with [`View::update`] and applied by
//! [`View::update_items`], which also runs at the start of every redraw. Dropping an item
//! that carries a [`ViewLink`] purges it from the view automatically.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use kurbo::{Point, Rect, Size};
//! use strata_view::{LayerId, LayerSet, QueryOptions, View, ViewItem};
//!
//! struct Pad(Rect);
//!
//! impl ViewItem for Pad {
//!     fn bounding_box(&self) -> Rect {
//!         self.0
//!     }
//!
//!     fn layers(&self) -> LayerSet {
//!         [LayerId(5)].into_iter().collect()
//!     }
//! }
//!
//! let mut view = View::new();
//! view.set_screen_size(Size::new(800.0, 600.0));
//!
//! let pad = Rc::new(Pad(Rect::new(0.0, 0.0, 10.0, 10.0)));
//! view.add(&pad, None);
//!
//! let hits = view.query(Rect::new(0.0, 0.0, 20.0, 20.0), QueryOptions::default());
//! assert_eq!(hits.len(), 1);
//! assert!(hits[0].is(&*pad));
//!
//! // Hidden layers drop out of queries.
//! view.set_layer_visible(LayerId(5), false);
//! assert!(view.query(Rect::new(0.0, 0.0, 20.0, 20.0), QueryOptions::default()).is_empty());
//!
//! // Zooming about the origin doubles screen distances.
//! view.set_center(Point::ZERO);
//! view.set_scale(2.0, Some(Point::ZERO));
//! assert_eq!(view.to_screen(Point::new(10.0, 0.0)), Point::new(420.0, 300.0));
//! ```

#![no_std]

extern crate alloc;

mod gal;
mod item;
mod layer;
mod preview;
mod target;
mod util;
mod view;
mod viewport;

pub use gal::{Color, Command, Gal, GroupId, Painter, RecordingGal};
pub use item::{ItemFlags, ItemKey, LayerSet, UpdateFlags, ViewItem, ViewLink};
pub use layer::LayerId;
pub use target::{DirtyTargets, RenderTarget, TargetSet};
pub use view::{DEFAULT_MAX_LAYERS, QueryHit, QueryOptions, View, ViewConfig};
pub use viewport::{DEFAULT_BOUNDARY, DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE, Viewport};

/// Re-export of the spatial index crate used for per-layer indexing.
pub use strata_index;
