// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! View basics.
//!
//! Registers a few items on stacked layers, then queries them while toggling
//! layer visibility, a required layer, and a top-layer override.
//!
//! Run:
//! - `cargo run -p strata_demos --example view_basics`

use std::rc::Rc;

use kurbo::{Point, Rect, Size};
use strata_view::{LayerId, LayerSet, QueryOptions, View, ViewItem, ViewLink};

const COPPER_TOP: LayerId = LayerId(0);
const COPPER_BOTTOM: LayerId = LayerId(31);
const PADS: LayerId = LayerId(40);
const PAD_NUMBERS: LayerId = LayerId(41);

struct Part {
    name: &'static str,
    rect: Rect,
    layers: LayerSet,
    link: ViewLink,
}

impl ViewItem for Part {
    fn bounding_box(&self) -> Rect {
        self.rect
    }

    fn layers(&self) -> LayerSet {
        self.layers.clone()
    }

    fn view_link(&self) -> Option<&ViewLink> {
        Some(&self.link)
    }
}

fn part(name: &'static str, rect: Rect, layers: &[LayerId]) -> Rc<Part> {
    Rc::new(Part {
        name,
        rect,
        layers: layers.iter().copied().collect(),
        link: ViewLink::new(),
    })
}

fn dump(view: &View, label: &str, parts: &[Rc<Part>]) {
    let hits = view.query(Rect::new(0.0, 0.0, 50.0, 50.0), QueryOptions::default());
    let names: Vec<_> = hits
        .iter()
        .filter_map(|h| {
            parts
                .iter()
                .find(|p| h.is(&***p))
                .map(|p| format!("{}@{}", p.name, h.layer.0))
        })
        .collect();
    println!("{label:<28} {names:?}");
}

fn main() {
    let mut view = View::new();
    view.set_screen_size(Size::new(800.0, 600.0));

    let parts = vec![
        part("track", Rect::new(0.0, 10.0, 40.0, 12.0), &[COPPER_TOP]),
        part("via", Rect::new(18.0, 8.0, 22.0, 14.0), &[COPPER_TOP, COPPER_BOTTOM]),
        part("pad", Rect::new(30.0, 30.0, 36.0, 36.0), &[PADS, PAD_NUMBERS]),
    ];
    for s in &parts {
        view.add(s, None);
    }
    // Pad numbers only make sense while pads are shown.
    view.set_required(PAD_NUMBERS, PADS, true);

    dump(&view, "initial", &parts);

    view.set_layer_visible(PADS, false);
    dump(&view, "pads hidden", &parts);
    view.set_layer_visible(PADS, true);

    view.set_top_layer(COPPER_BOTTOM, true);
    dump(&view, "bottom copper on top", &parts);

    view.enable_top_layer(false);
    dump(&view, "top layers disabled", &parts);

    // Dropping an item purges it from the view.
    let mut parts = parts;
    drop(parts.remove(1));
    println!("purged {} dropped item(s)", view.collect_dropped());
    dump(&view, "via dropped", &parts);

    view.set_scale(4.0, Some(Point::ZERO));
    println!(
        "scale {} maps (10, 0) to {:?}",
        view.scale(),
        view.to_screen(Point::new(10.0, 0.0))
    );
}
