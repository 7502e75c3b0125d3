// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{BezPath, Point, Rect, Shape, Size};
use strata_view::{
    Color, Gal, LayerId, LayerSet, Painter, QueryOptions, RenderTarget, UpdateFlags, View,
    ViewItem, ViewLink,
};

struct Track {
    rect: Rect,
    layers: LayerSet,
    link: ViewLink,
}

impl ViewItem for Track {
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

/// Counts draw calls instead of rasterizing.
#[derive(Default)]
struct CountingGal {
    fills: usize,
}

impl Gal for CountingGal {
    fn fill_path(&mut self, _path: &BezPath, _color: Color) {
        self.fills += 1;
    }

    fn stroke_path(&mut self, _path: &BezPath, _width: f64, _color: Color) {
        self.fills += 1;
    }
}

struct FlatPainter;

impl Painter for FlatPainter {
    fn draw(&mut self, item: &dyn ViewItem, _layer: LayerId, gal: &mut dyn Gal) -> bool {
        gal.fill_path(&item.bounding_box().to_path(0.1), Color::WHITE);
        true
    }

    fn color(&self, _item: &dyn ViewItem, _layer: LayerId) -> Color {
        Color::WHITE
    }
}

fn gen_board(n: usize, layers: u32) -> Vec<Rc<Track>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * 10.0;
            let y0 = y as f64 * 10.0;
            let layer = ((x + y) % layers as usize) as u32;
            out.push(Rc::new(Track {
                rect: Rect::new(x0, y0, x0 + 8.0, y0 + 8.0),
                layers: [LayerId(layer), LayerId(layers + layer)].into_iter().collect(),
                link: ViewLink::new(),
            }));
        }
    }
    out
}

fn populated_view(board: &[Rc<Track>]) -> View {
    let mut view = View::new();
    view.set_screen_size(Size::new(400.0, 400.0));
    view.set_center(Point::new(200.0, 200.0));
    for track in board {
        view.add(track, None);
    }
    view
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_add");
    for &n in &[32usize, 64] {
        let board = gen_board(n, 8);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("add_n{n}"), |b| {
            b.iter_batched(
                View::new,
                |mut view| {
                    for track in &board {
                        view.add(track, None);
                    }
                    black_box(view.item_count());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_query");
    let board = gen_board(128, 8);
    let mut view = populated_view(&board);
    let window = Rect::new(300.0, 300.0, 500.0, 500.0);
    group.bench_function("query_window", |b| {
        b.iter(|| black_box(view.query(window, QueryOptions::default()).len()));
    });
    group.bench_function("hit_test", |b| {
        b.iter(|| black_box(view.hit_test(Point::new(404.0, 404.0), QueryOptions::HIT_TEST).len()));
    });
    view.set_top_layer(LayerId(3), true);
    view.set_layer_visible(LayerId(5), false);
    group.bench_function("query_window_with_top_layer", |b| {
        b.iter(|| black_box(view.query(window, QueryOptions::default()).len()));
    });
    group.finish();
}

fn bench_redraw(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_redraw");
    let board = gen_board(128, 8);
    let mut view = populated_view(&board);
    for id in 8..16 {
        view.set_layer_target(LayerId(id), RenderTarget::NonCached);
    }
    let mut gal = CountingGal::default();
    let mut painter = FlatPainter;
    group.bench_function("full", |b| {
        b.iter(|| {
            view.redraw(&mut gal, &mut painter);
            black_box(gal.fills)
        });
    });
    group.bench_function("overlay_only", |b| {
        b.iter(|| {
            view.mark_target_dirty(RenderTarget::Overlay);
            view.redraw_dirty(&mut gal, &mut painter);
            black_box(gal.fills)
        });
    });
    group.bench_function("after_geometry_update", |b| {
        b.iter(|| {
            view.update(&*board[0], UpdateFlags::GEOMETRY);
            view.redraw_dirty(&mut gal, &mut painter);
            black_box(gal.fills)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_add, bench_query, bench_redraw);
criterion_main!(benches);
