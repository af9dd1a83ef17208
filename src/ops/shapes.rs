use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::canvas::PixelSurface;

/// Ratio between a star's outer and inner radius.
pub const STAR_INNER_RATIO: f32 = 2.5;
/// Upper bound for the rounded rectangle corner radius.
pub const MAX_CORNER_RADIUS: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    RoundedRect,
    Circle,
    Line,
    Triangle,
    Pentagon,
    Hexagon,
    Diamond,
    Star,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::RoundedRect => "Rounded Rectangle",
            ShapeKind::Circle => "Circle",
            ShapeKind::Line => "Line",
            ShapeKind::Triangle => "Triangle",
            ShapeKind::Pentagon => "Pentagon",
            ShapeKind::Hexagon => "Hexagon",
            ShapeKind::Diamond => "Diamond",
            ShapeKind::Star => "Star",
        }
    }
}

// ============================================================================
// Geometry – outline derived from anchor + current drag point
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeGeometry {
    /// Axis-aligned box, optionally with rounded corners.
    Box {
        cx: f32,
        cy: f32,
        hx: f32,
        hy: f32,
        corner_radius: f32,
    },
    Circle { cx: f32, cy: f32, radius: f32 },
    Segment { a: (f32, f32), b: (f32, f32) },
    /// Closed polyline through the vertices.
    Path(Vec<(f32, f32)>),
}

/// Corner radius for a rounded rectangle of the given signed size.
pub fn rounded_corner_radius(width: f32, height: f32) -> f32 {
    MAX_CORNER_RADIUS.min(width.abs() / 4.0).min(height.abs() / 4.0)
}

/// The 10 vertices of a 5-point star, alternating outer (radius `outer`) and
/// inner (radius `outer / 2.5`), starting straight up and advancing 36°.
pub fn star_vertices(cx: f32, cy: f32, outer: f32) -> Vec<(f32, f32)> {
    let inner = outer / STAR_INNER_RATIO;
    let step = PI / 5.0;
    let mut rot = 3.0 * FRAC_PI_2;
    let mut verts = Vec::with_capacity(10);
    for _ in 0..5 {
        verts.push((cx + rot.cos() * outer, cy + rot.sin() * outer));
        rot += step;
        verts.push((cx + rot.cos() * inner, cy + rot.sin() * inner));
        rot += step;
    }
    verts
}

/// Vertices of a regular `sides`-gon of circumradius `radius`, first vertex up.
pub fn regular_polygon_vertices(cx: f32, cy: f32, radius: f32, sides: u32) -> Vec<(f32, f32)> {
    let step = TAU / sides as f32;
    (0..sides)
        .map(|i| {
            let a = -FRAC_PI_2 + step * i as f32;
            (cx + a.cos() * radius, cy + a.sin() * radius)
        })
        .collect()
}

/// Resolve the outline for a drag from `anchor` to `current`.
///
/// Boxes span the two points (negative extents just flip direction); the
/// circle, star and regular polygons are centred on the anchor with the drag
/// distance as radius.
pub fn shape_geometry(kind: ShapeKind, anchor: (f32, f32), current: (f32, f32)) -> ShapeGeometry {
    let w = current.0 - anchor.0;
    let h = current.1 - anchor.1;
    let radius = (w * w + h * h).sqrt();
    let (ax, ay) = anchor;
    match kind {
        ShapeKind::Rectangle | ShapeKind::RoundedRect => ShapeGeometry::Box {
            cx: ax + w * 0.5,
            cy: ay + h * 0.5,
            hx: w.abs() * 0.5,
            hy: h.abs() * 0.5,
            corner_radius: if kind == ShapeKind::RoundedRect {
                rounded_corner_radius(w, h)
            } else {
                0.0
            },
        },
        ShapeKind::Circle => ShapeGeometry::Circle { cx: ax, cy: ay, radius },
        ShapeKind::Line => ShapeGeometry::Segment { a: anchor, b: current },
        ShapeKind::Triangle => ShapeGeometry::Path(regular_polygon_vertices(ax, ay, radius, 3)),
        ShapeKind::Diamond => ShapeGeometry::Path(regular_polygon_vertices(ax, ay, radius, 4)),
        ShapeKind::Pentagon => ShapeGeometry::Path(regular_polygon_vertices(ax, ay, radius, 5)),
        ShapeKind::Hexagon => ShapeGeometry::Path(regular_polygon_vertices(ax, ay, radius, 6)),
        ShapeKind::Star => ShapeGeometry::Path(star_vertices(ax, ay, radius)),
    }
}

impl ShapeGeometry {
    /// Unsigned distance from (px, py) to the outline.
    fn outline_distance(&self, px: f32, py: f32) -> f32 {
        match self {
            ShapeGeometry::Box {
                cx,
                cy,
                hx,
                hy,
                corner_radius,
            } => sdf_rounded_box(px - cx, py - cy, *hx, *hy, *corner_radius).abs(),
            ShapeGeometry::Circle { cx, cy, radius } => {
                let dx = px - cx;
                let dy = py - cy;
                ((dx * dx + dy * dy).sqrt() - radius).abs()
            }
            ShapeGeometry::Segment { a, b } => sdf_line_segment(px, py, a.0, a.1, b.0, b.1),
            ShapeGeometry::Path(verts) => polyline_distance(verts, true, px, py),
        }
    }

    /// (min_x, min_y, max_x, max_y) of the outline centreline.
    fn bounds(&self) -> (f32, f32, f32, f32) {
        match self {
            ShapeGeometry::Box { cx, cy, hx, hy, .. } => (cx - hx, cy - hy, cx + hx, cy + hy),
            ShapeGeometry::Circle { cx, cy, radius } => {
                (cx - radius, cy - radius, cx + radius, cy + radius)
            }
            ShapeGeometry::Segment { a, b } => (a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1)),
            ShapeGeometry::Path(verts) => points_bounds(verts),
        }
    }
}

// ============================================================================
// SDF helpers
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

#[inline]
fn sdf_rounded_box(px: f32, py: f32, hx: f32, hy: f32, r: f32) -> f32 {
    let r = r.min(hx).min(hy).max(0.0);
    sdf_box(px, py, hx - r, hy - r) - r
}

/// Distance from (px, py) to the segment a→b. Degenerate segments act as points.
#[inline]
pub(crate) fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;
    let t = if len2 < 1e-12 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

fn polyline_distance(verts: &[(f32, f32)], closed: bool, px: f32, py: f32) -> f32 {
    match verts.len() {
        0 => f32::MAX,
        1 => sdf_line_segment(px, py, verts[0].0, verts[0].1, verts[0].0, verts[0].1),
        n => {
            let mut d = f32::MAX;
            for w in verts.windows(2) {
                d = d.min(sdf_line_segment(px, py, w[0].0, w[0].1, w[1].0, w[1].1));
            }
            if closed {
                let (a, b) = (verts[n - 1], verts[0]);
                d = d.min(sdf_line_segment(px, py, a.0, a.1, b.0, b.1));
            }
            d
        }
    }
}

fn points_bounds(verts: &[(f32, f32)]) -> (f32, f32, f32, f32) {
    verts.iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    )
}

/// Smoothstep between edge0 and edge1.
#[inline]
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ============================================================================
// Rasterization
// ============================================================================

/// Rasterize an outline of `stroke_width` into a tight RGBA buffer.
///
/// Returns `(buf, buf_w, buf_h, offset_x, offset_y)`; the offset is the
/// buffer's top-left corner in canvas coordinates.
fn rasterize_outline<F>(
    distance: F,
    bounds: (f32, f32, f32, f32),
    stroke_width: f32,
    color: Rgba<u8>,
    canvas_w: u32,
    canvas_h: u32,
) -> (Vec<u8>, u32, u32, i32, i32)
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let half = stroke_width.max(1.0) * 0.5;
    let pad = half + 2.0;
    let (min_x, min_y, max_x, max_y) = bounds;

    let x0 = ((min_x - pad).floor() as i32).max(0);
    let y0 = ((min_y - pad).floor() as i32).max(0);
    let x1 = ((max_x + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((max_y + pad).ceil() as i32).min(canvas_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return (Vec::new(), 0, 0, 0, 0);
    }

    let row_bytes = buf_w as usize * 4;
    let mut buf = vec![0u8; row_bytes * buf_h as usize];

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row as i32) as f32 + 0.5;
            for col in 0..buf_w as usize {
                let px = (x0 + col as i32) as f32 + 0.5;
                let band = distance(px, py) - half;
                let coverage = smoothstep(0.5, -0.5, band);
                if coverage > 0.001 {
                    let idx = col * 4;
                    row_buf[idx] = color[0];
                    row_buf[idx + 1] = color[1];
                    row_buf[idx + 2] = color[2];
                    row_buf[idx + 3] = (color[3] as f32 * coverage).round().min(255.0) as u8;
                }
            }
        });

    (buf, buf_w, buf_h, x0, y0)
}

/// Stroke a shape outline onto the surface.
pub fn draw_shape(surface: &mut PixelSurface, geometry: &ShapeGeometry, stroke_width: f32, color: Rgba<u8>) {
    let (w, h) = surface.dimensions();
    let (buf, bw, bh, ox, oy) = rasterize_outline(
        |x, y| geometry.outline_distance(x, y),
        geometry.bounds(),
        stroke_width,
        color,
        w,
        h,
    );
    if bw > 0 {
        surface.composite_region(ox, oy, bw, bh, &buf);
    }
}

/// Stroke an open (or closed) polyline through `verts`.
pub fn draw_polyline(
    surface: &mut PixelSurface,
    verts: &[(f32, f32)],
    closed: bool,
    stroke_width: f32,
    color: Rgba<u8>,
) {
    if verts.is_empty() {
        return;
    }
    let (w, h) = surface.dimensions();
    let (buf, bw, bh, ox, oy) = rasterize_outline(
        |x, y| polyline_distance(verts, closed, x, y),
        points_bounds(verts),
        stroke_width,
        color,
        w,
        h,
    );
    if bw > 0 {
        surface.composite_region(ox, oy, bw, bh, &buf);
    }
}

// ============================================================================
// ShapeDraft – live drag preview
// ============================================================================

/// One shape drag. Holds the pixels from before the drag so every preview
/// frame starts from a clean buffer.
#[derive(Clone, Debug)]
pub struct ShapeDraft {
    pub kind: ShapeKind,
    pub anchor: (f32, f32),
    pub current: (f32, f32),
    pub color: Rgba<u8>,
    pub stroke_width: f32,
    before: RgbaImage,
}

impl ShapeDraft {
    pub fn begin(
        surface: &PixelSurface,
        kind: ShapeKind,
        anchor: (f32, f32),
        color: Rgba<u8>,
        stroke_width: f32,
    ) -> Self {
        Self {
            kind,
            anchor,
            current: anchor,
            color,
            stroke_width,
            before: surface.to_rgba_image(),
        }
    }

    /// Reset the surface to its pre-drag state and draw the shape up to `current`.
    pub fn update(&mut self, surface: &mut PixelSurface, current: (f32, f32)) {
        self.current = current;
        surface.replace_image(self.before.clone());
        draw_shape(surface, &self.geometry(), self.stroke_width, self.color);
    }

    /// Put back the pre-drag pixels (gesture cancelled).
    pub fn cancel(self, surface: &mut PixelSurface) {
        surface.replace_image(self.before);
    }

    /// Geometry between the anchor and the latest pointer position.
    pub fn geometry(&self) -> ShapeGeometry {
        shape_geometry(self.kind, self.anchor, self.current)
    }
}

// ============================================================================
// PolygonDraft – click-to-add free-form polygon
// ============================================================================

/// Vertices of the polygon being built. Each click redraws the open path
/// through every vertex on top of the pre-polygon pixels.
#[derive(Clone, Debug)]
pub struct PolygonDraft {
    pub vertices: Vec<(f32, f32)>,
    pub color: Rgba<u8>,
    pub stroke_width: f32,
    before: RgbaImage,
}

impl PolygonDraft {
    pub fn begin(surface: &PixelSurface, color: Rgba<u8>, stroke_width: f32) -> Self {
        Self {
            vertices: Vec::new(),
            color,
            stroke_width,
            before: surface.to_rgba_image(),
        }
    }

    /// Append a vertex and redraw. Returns the vertex count.
    pub fn add_vertex(&mut self, surface: &mut PixelSurface, p: (f32, f32)) -> usize {
        self.vertices.push(p);
        self.redraw(surface, false);
        self.vertices.len()
    }

    /// Final render, optionally joining the last vertex back to the first.
    pub fn finish(self, surface: &mut PixelSurface, close: bool) {
        if close && self.vertices.len() > 2 {
            self.redraw(surface, true);
        }
    }

    /// Drop the polygon and restore the pixels it was drawn over.
    pub fn cancel(self, surface: &mut PixelSurface) {
        surface.replace_image(self.before);
    }

    fn redraw(&self, surface: &mut PixelSurface, closed: bool) {
        surface.replace_image(self.before.clone());
        draw_polyline(surface, &self.vertices, closed, self.stroke_width, self.color);
    }
}
