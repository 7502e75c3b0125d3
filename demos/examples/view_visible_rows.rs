// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visible-window example: scroll the viewport over a long list of rows and
//! query what is on screen.
//!
//! Run:
//! - `cargo run -p strata_demos --example view_visible_rows`

use std::rc::Rc;

use kurbo::{Point, Rect, Size};
use strata_view::{LayerId, LayerSet, QueryOptions, View, ViewItem};

const ROW_H: f64 = 20.0;
const WIDTH: f64 = 200.0;

struct Row(Rect);

impl ViewItem for Row {
    fn bounding_box(&self) -> Rect {
        self.0
    }

    fn layers(&self) -> LayerSet {
        [LayerId(0)].into_iter().collect()
    }
}

fn main() {
    let mut view = View::new();
    view.set_screen_size(Size::new(WIDTH, 100.0));

    let rows: Vec<_> = (0..1000_usize)
        .map(|i| {
            let y0 = i as f64 * ROW_H;
            Rc::new(Row(Rect::new(0.0, y0, WIDTH, y0 + ROW_H)))
        })
        .collect();
    for row in &rows {
        view.add(row, None);
    }

    // Simulate a few scroll positions by moving the view center.
    for scroll in [0.0, 30.0, 200.0, 600.0] {
        view.set_center(Point::new(WIDTH / 2.0, scroll + 50.0));
        let visible = view.query(view.visible_rect(), QueryOptions::default());
        let mut indices: Vec<_> = visible
            .iter()
            .filter_map(|hit| rows.iter().position(|r| hit.is(&**r)))
            .collect();
        indices.sort_unstable();
        println!("scroll={scroll:.1} -> visible indices: {indices:?}");
    }
}
