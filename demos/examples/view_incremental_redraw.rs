// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental redraw with a recording backend.
//!
//! Shows cached groups being recorded once and replayed, a color-only update
//! recoloring a group in place, an overlay-only repaint, and a drag preview.
//!
//! Run:
//! - `cargo run -p strata_demos --example view_incremental_redraw`

use std::cell::Cell;
use std::rc::Rc;

use kurbo::{Point, Rect, Shape, Size};
use strata_view::{
    Color, Command, Gal, LayerId, LayerSet, Painter, RecordingGal, RenderTarget, UpdateFlags,
    View, ViewItem, ViewLink,
};

const BOARD: LayerId = LayerId(1);
const CURSOR: LayerId = LayerId(60);

struct Item {
    rect: Cell<Rect>,
    layer: LayerId,
    link: ViewLink,
}

impl ViewItem for Item {
    fn bounding_box(&self) -> Rect {
        self.rect.get()
    }

    fn layers(&self) -> LayerSet {
        [self.layer].into_iter().collect()
    }

    fn view_link(&self) -> Option<&ViewLink> {
        Some(&self.link)
    }
}

struct Palette {
    highlight: bool,
}

impl Painter for Palette {
    fn draw(&mut self, item: &dyn ViewItem, layer: LayerId, gal: &mut dyn Gal) -> bool {
        gal.fill_path(&item.bounding_box().to_path(0.1), self.color(item, layer));
        true
    }

    fn color(&self, _item: &dyn ViewItem, layer: LayerId) -> Color {
        match (layer, self.highlight) {
            (CURSOR, _) => Color::rgb(255, 255, 0),
            (_, true) => Color::rgb(255, 64, 64),
            (_, false) => Color::rgb(200, 120, 40),
        }
    }
}

fn summarize(step: &str, gal: &mut RecordingGal) {
    let cmds = gal.take_commands();
    let count = |f: fn(&Command) -> bool| cmds.iter().filter(|c| f(c)).count();
    println!(
        "{step:<22} commands={:<3} fills={:<2} group_draws={:<2} recolors={:<2} clears={}",
        cmds.len(),
        count(|c| matches!(c, Command::FillPath { .. })),
        count(|c| matches!(c, Command::DrawGroup(_))),
        count(|c| matches!(c, Command::ChangeGroupColor(..))),
        count(|c| matches!(c, Command::ClearTarget(_))),
    );
}

fn main() {
    let mut view = View::new();
    view.set_layer_target(CURSOR, RenderTarget::Overlay);
    view.set_center(Point::new(50.0, 50.0));

    let pads: Vec<_> = (0..4)
        .map(|i| {
            let x = f64::from(i) * 25.0;
            Rc::new(Item {
                rect: Cell::new(Rect::new(x, 0.0, x + 20.0, 20.0)),
                layer: BOARD,
                link: ViewLink::new(),
            })
        })
        .collect();
    for pad in &pads {
        view.add(pad, None);
    }
    let cursor = Rc::new(Item {
        rect: Cell::new(Rect::new(48.0, 48.0, 52.0, 52.0)),
        layer: CURSOR,
        link: ViewLink::new(),
    });
    view.add(&cursor, None);

    let mut gal = RecordingGal::new().with_screen_size(Size::new(200.0, 200.0));
    let mut painter = Palette { highlight: false };

    view.redraw(&mut gal, &mut painter);
    summarize("first redraw", &mut gal);

    view.redraw(&mut gal, &mut painter);
    summarize("full redraw (replay)", &mut gal);

    cursor.rect.set(Rect::new(58.0, 48.0, 62.0, 52.0));
    view.update(&*cursor, UpdateFlags::GEOMETRY);
    view.redraw_dirty(&mut gal, &mut painter);
    summarize("cursor moved", &mut gal);

    painter.highlight = true;
    view.update(&*pads[2], UpdateFlags::COLOR);
    view.redraw_dirty(&mut gal, &mut painter);
    summarize("pad highlighted", &mut gal);

    let ghost = Rc::new(Item {
        rect: Cell::new(Rect::new(0.0, 30.0, 20.0, 50.0)),
        layer: BOARD,
        link: ViewLink::new(),
    });
    view.init_preview();
    view.add_to_preview(&ghost, true);
    drop(ghost);
    view.redraw_dirty(&mut gal, &mut painter);
    summarize("drag preview", &mut gal);

    view.clear_preview();
    view.redraw_dirty(&mut gal, &mut painter);
    summarize("preview cleared", &mut gal);
}
