use image::Rgba;

use crate::canvas::PixelSurface;
use crate::components::tools::{BrushBehavior, ToolProperties};
use crate::ops::shapes::{sdf_line_segment, smoothstep};

/// Below this hardness the brush and eraser lay down soft radial daubs.
pub const SOFT_HARDNESS_THRESHOLD: f32 = 0.9;

/// Simple positional hash for pseudorandom per-stamp jitter.
/// Produces a deterministic u32 from floating-point position + counter.
pub fn stamp_hash(x: f32, y: f32, counter: u32) -> u32 {
    let ix = (x * 100.0) as i32 as u32;
    let iy = (y * 100.0) as i32 as u32;
    let mut h = ix
        .wrapping_mul(374761393)
        .wrapping_add(iy.wrapping_mul(668265263))
        .wrapping_add(counter.wrapping_mul(1013904223));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

/// Map a hash to [-1, 1].
#[inline]
fn hash_signed(h: u32) -> f32 {
    (h as f32 / u32::MAX as f32) * 2.0 - 1.0
}

/// Stamp footprint width for a behaviour. The pencil is a thin fixed line.
pub fn effective_width(behavior: BrushBehavior, size: f32) -> f32 {
    match behavior {
        BrushBehavior::Pencil => (size / 4.0).max(1.0),
        _ => size.max(1.0),
    }
}

// ============================================================================
// StrokeGesture – one freehand drag
// ============================================================================

/// State for one freehand drag, from pointer-down to pointer-up.
///
/// Stamps are placed every `step` pixels of travelled distance, carried over
/// between pointer samples, so stroke density does not depend on how often
/// pointer events arrive.
#[derive(Clone, Debug)]
pub struct StrokeGesture {
    pub behavior: BrushBehavior,
    pub color: Rgba<u8>,
    width: f32,
    /// Brush size before the pencil narrowing; jitter scales with this.
    size: f32,
    hardness: f32,
    step: f32,
    jitter: f32,
    seed: u32,
    last_sample: (f32, f32),
    /// Distance travelled since the last stamp.
    carry: f32,
    stamp_count: u32,
    prev_stamp: Option<(f32, f32)>,
}

impl StrokeGesture {
    /// Start a stroke. No pixels are touched until [`StrokeGesture::stamp_start`].
    pub fn new(behavior: BrushBehavior, color: Rgba<u8>, props: &ToolProperties, start: (f32, f32)) -> Self {
        Self {
            behavior,
            color,
            width: effective_width(behavior, props.size),
            size: props.size.max(1.0),
            hardness: props.hardness.clamp(0.0, 1.0),
            step: props.stamp_step(),
            jitter: props.jitter.clamp(0.0, 1.0),
            seed: props.jitter_seed,
            last_sample: start,
            carry: 0.0,
            stamp_count: 0,
            prev_stamp: None,
        }
    }

    /// Start a stroke and put the first stamp down at the press position.
    pub fn begin(
        surface: &mut PixelSurface,
        behavior: BrushBehavior,
        color: Rgba<u8>,
        props: &ToolProperties,
        start: (f32, f32),
    ) -> Self {
        let mut gesture = Self::new(behavior, color, props, start);
        gesture.stamp_start(surface);
        gesture
    }

    pub fn stamp_start(&mut self, surface: &mut PixelSurface) {
        let start = self.last_sample;
        self.stamp(surface, start);
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn stamp_count(&self) -> u32 {
        self.stamp_count
    }

    /// Whether stamps are soft radial daubs rather than hard joined segments.
    pub fn is_soft(&self) -> bool {
        self.hardness < SOFT_HARDNESS_THRESHOLD && self.behavior != BrushBehavior::Pencil
    }

    /// Walk from the previous sample to `to` and return the positions where
    /// stamps fall, before jitter. Does not touch pixels.
    pub fn advance_to(&mut self, to: (f32, f32)) -> Vec<(f32, f32)> {
        let (x0, y0) = self.last_sample;
        let dx = to.0 - x0;
        let dy = to.1 - y0;
        let dist = (dx * dx + dy * dy).sqrt();
        self.last_sample = to;
        if dist <= f32::EPSILON {
            return Vec::new();
        }

        let (ux, uy) = (dx / dist, dy / dist);
        let mut points = Vec::new();
        let mut t = self.step - self.carry;
        while t <= dist {
            points.push((x0 + ux * t, y0 + uy * t));
            t += self.step;
        }
        self.carry = dist - (t - self.step);
        points
    }

    /// Continue the stroke to `to`, stamping along the way.
    pub fn move_to(&mut self, surface: &mut PixelSurface, to: (f32, f32)) {
        for p in self.advance_to(to) {
            self.stamp(surface, p);
        }
    }

    fn jittered(&self, p: (f32, f32)) -> (f32, f32) {
        if self.jitter <= 0.0 {
            return p;
        }
        let amount = 0.5 * self.size * self.jitter;
        let counter = self.stamp_count.wrapping_mul(2) ^ self.seed;
        let jx = hash_signed(stamp_hash(p.0, p.1, counter));
        let jy = hash_signed(stamp_hash(p.0, p.1, counter.wrapping_add(1)));
        (p.0 + jx * amount, p.1 + jy * amount)
    }

    fn stamp(&mut self, surface: &mut PixelSurface, p: (f32, f32)) {
        let p = self.jittered(p);
        if self.is_soft() {
            stamp_soft(surface, p, self.width * 0.5, self.hardness, self.color);
        } else {
            let from = self.prev_stamp.unwrap_or(p);
            let aa = self.behavior != BrushBehavior::Pencil;
            stamp_segment(surface, from, p, self.width * 0.5, self.color, aa);
        }
        self.prev_stamp = Some(p);
        self.stamp_count += 1;
    }
}

// ============================================================================
// Stamp rasterizers
// ============================================================================

/// Pixel index bounds around a disc, clipped to the surface.
fn stamp_bounds(surface: &PixelSurface, min: (f32, f32), max: (f32, f32), pad: f32) -> Option<(i32, i32, i32, i32)> {
    let x0 = ((min.0 - pad).floor() as i32).max(0);
    let y0 = ((min.1 - pad).floor() as i32).max(0);
    let x1 = ((max.0 + pad).ceil() as i32).min(surface.width() as i32 - 1);
    let y1 = ((max.1 + pad).ceil() as i32).min(surface.height() as i32 - 1);
    if x0 > x1 || y0 > y1 { None } else { Some((x0, y0, x1, y1)) }
}

/// Radially softened daub: opaque inside `hardness * radius`, fading to
/// nothing at `radius`.
fn stamp_soft(surface: &mut PixelSurface, c: (f32, f32), radius: f32, hardness: f32, color: Rgba<u8>) {
    let radius = radius.max(0.5);
    let solid = radius * hardness;
    let fade = (radius - solid).max(1e-3);
    let Some((x0, y0, x1, y1)) = stamp_bounds(surface, c, c, radius + 1.0) else { return };

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 - c.0;
            let dy = y as f32 - c.1;
            let d = (dx * dx + dy * dy).sqrt();
            let alpha = if d <= solid {
                1.0
            } else if d >= radius {
                0.0
            } else {
                1.0 - smoothstep(0.0, 1.0, (d - solid) / fade)
            };
            if alpha > 0.0 {
                surface.blend_pixel_clipped(x, y, color, alpha);
            }
        }
    }
}

/// Hard round-capped segment `from` → `to`. Without `aa` the edge is binary.
fn stamp_segment(
    surface: &mut PixelSurface,
    from: (f32, f32),
    to: (f32, f32),
    radius: f32,
    color: Rgba<u8>,
    aa: bool,
) {
    let radius = radius.max(0.5);
    let min = (from.0.min(to.0), from.1.min(to.1));
    let max = (from.0.max(to.0), from.1.max(to.1));
    let Some((x0, y0, x1, y1)) = stamp_bounds(surface, min, max, radius + 1.0) else { return };

    for y in y0..=y1 {
        for x in x0..=x1 {
            let d = sdf_line_segment(x as f32, y as f32, from.0, from.1, to.0, to.1);
            let coverage = if aa {
                smoothstep(0.5, -0.5, d - radius)
            } else if d <= radius {
                1.0
            } else {
                0.0
            };
            if coverage > 0.001 {
                surface.blend_pixel_clipped(x, y, color, coverage);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn props(size: f32, hardness: f32, spacing: f32, jitter: f32) -> ToolProperties {
        ToolProperties {
            size,
            hardness,
            spacing,
            jitter,
            ..ToolProperties::default()
        }
    }

    #[test]
    fn spacing_is_independent_of_sample_rate() {
        let p = props(10.0, 1.0, 1.0, 0.0);
        for sample_step in [0.7f32, 3.0, 7.0, 13.0, 100.0] {
            let mut gesture = StrokeGesture::new(BrushBehavior::Brush, BLACK, &p, (0.0, 0.0));
            let mut stamps = vec![(0.0f32, 0.0f32)];
            let mut x = 0.0;
            // Ends just past 100 so float drift cannot drop the stamp at 100.
            while x < 100.5 {
                x = (x + sample_step).min(100.5);
                stamps.extend(gesture.advance_to((x, 0.0)));
            }
            assert_eq!(stamps.len(), 11, "sample step {}", sample_step);
            for w in stamps.windows(2) {
                let gap = w[1].0 - w[0].0;
                assert!(gap >= 10.0 - 1e-3 && gap <= 11.0, "gap {} at step {}", gap, sample_step);
            }
        }
    }

    #[test]
    fn carry_spans_direction_changes() {
        let p = props(10.0, 1.0, 1.0, 0.0);
        let mut gesture = StrokeGesture::new(BrushBehavior::Brush, BLACK, &p, (0.0, 0.0));
        assert!(gesture.advance_to((6.0, 0.0)).is_empty());
        let pts = gesture.advance_to((6.0, 6.0));
        assert_eq!(pts.len(), 1);
        assert!((pts[0].1 - 4.0).abs() < 1e-4);
    }

    #[test]
    fn minimum_step_is_one_pixel() {
        let p = props(2.0, 1.0, 0.1, 0.0);
        let gesture = StrokeGesture::new(BrushBehavior::Brush, BLACK, &p, (0.0, 0.0));
        assert_eq!(gesture.step(), 1.0);
    }

    #[test]
    fn pencil_is_thin_and_hard() {
        let p = props(20.0, 0.1, 0.2, 0.0);
        let gesture = StrokeGesture::new(BrushBehavior::Pencil, BLACK, &p, (0.0, 0.0));
        assert_eq!(gesture.width(), 5.0);
        assert!(!gesture.is_soft());
        let brush = StrokeGesture::new(BrushBehavior::Brush, BLACK, &p, (0.0, 0.0));
        assert!(brush.is_soft());
    }

    #[test]
    fn hard_stroke_paints_along_path() {
        let mut surface = PixelSurface::new_filled(50, 20, WHITE).unwrap();
        let p = props(4.0, 1.0, 0.2, 0.0);
        let mut gesture = StrokeGesture::begin(&mut surface, BrushBehavior::Brush, BLACK, &p, (5.0, 10.0));
        gesture.move_to(&mut surface, (45.0, 10.0));
        for x in 5..=45 {
            assert_eq!(surface.read_pixel(x, 10), BLACK, "gap at x={}", x);
        }
        assert_eq!(surface.read_pixel(25, 2), WHITE);
    }

    #[test]
    fn soft_daub_fades_to_edge() {
        let mut surface = PixelSurface::new_filled(40, 40, WHITE).unwrap();
        let p = props(20.0, 0.2, 0.2, 0.0);
        StrokeGesture::begin(&mut surface, BrushBehavior::Brush, BLACK, &p, (20.0, 20.0));
        assert_eq!(surface.read_pixel(20, 20), BLACK);
        let mid = surface.read_pixel(26, 20);
        assert!(mid[0] > 0 && mid[0] < 255, "expected partial coverage, got {:?}", mid);
        assert_eq!(surface.read_pixel(31, 20), WHITE);
    }

    #[test]
    fn jitter_is_bounded_and_deterministic() {
        let p = props(10.0, 1.0, 0.5, 1.0);
        let g = StrokeGesture::new(BrushBehavior::Brush, BLACK, &p, (0.0, 0.0));
        for i in 0..50 {
            let base = (i as f32 * 3.0, 7.0);
            let j = g.jittered(base);
            assert!((j.0 - base.0).abs() <= 5.0 && (j.1 - base.1).abs() <= 5.0);
            assert_eq!(j, g.jittered(base));
        }
    }

    #[test]
    fn pencil_jitter_follows_brush_size() {
        let p = props(10.0, 1.0, 0.5, 1.0);
        let pencil = StrokeGesture::new(BrushBehavior::Pencil, BLACK, &p, (0.0, 0.0));
        let brush = StrokeGesture::new(BrushBehavior::Brush, BLACK, &p, (0.0, 0.0));
        assert_eq!(pencil.width(), 2.5);
        let mut widest = 0.0f32;
        for i in 0..50 {
            let base = (i as f32 * 3.0, 7.0);
            let j = pencil.jittered(base);
            assert_eq!(j, brush.jittered(base));
            widest = widest.max((j.0 - base.0).abs()).max((j.1 - base.1).abs());
        }
        assert!(widest > pencil.width(), "pencil jitter only reached {}", widest);
        assert!(widest <= 5.0);
    }

    #[test]
    fn eraser_paints_its_color() {
        let mut surface = PixelSurface::new_filled(20, 20, BLACK).unwrap();
        let p = props(6.0, 1.0, 0.2, 0.0);
        StrokeGesture::begin(&mut surface, BrushBehavior::Eraser, WHITE, &p, (10.0, 10.0));
        assert_eq!(surface.read_pixel(10, 10), WHITE);
        assert_eq!(surface.read_pixel(10, 10)[3], 255);
    }
}
