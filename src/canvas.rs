use image::{Rgba, RgbaImage};

use crate::error::{CanvasError, Result};
use crate::io::{self, Snapshot};

/// Largest surface accepted by [`PixelSurface::new_filled`] (~256 megapixels).
pub const MAX_PIXELS: u64 = 256_000_000;

/// A pixel with zero alpha.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// PIXEL SURFACE – the single raster buffer owned by an editor session
// ============================================================================

/// Width × height grid of unpremultiplied RGBA8 pixels.
///
/// Coordinates passed to the pixel accessors must already be inside the
/// surface; callers clamp (see [`PixelSurface::clamp_point`]). The clipped
/// variants (`blend_pixel_clipped`, `write_region`) accept signed
/// coordinates and silently drop whatever falls outside.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelSurface {
    image: RgbaImage,
}

impl PixelSurface {
    // ---- construction -------------------------------------------------------

    /// Create a surface filled with `color`.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self> {
        validate_dimensions(width, height)?;
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, color),
        })
    }

    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::new_filled(width, height, TRANSPARENT)
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        Self { image }
    }

    // ---- dimensions ---------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Clamp a floating-point canvas position to the nearest valid pixel.
    pub fn clamp_point(&self, x: f32, y: f32) -> (u32, u32) {
        let max_x = self.width().saturating_sub(1) as f32;
        let max_y = self.height().saturating_sub(1) as f32;
        (x.round().clamp(0.0, max_x) as u32, y.round().clamp(0.0, max_y) as u32)
    }

    // ---- pixel access -------------------------------------------------------

    #[inline]
    pub fn read_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        debug_assert!(x < self.width() && y < self.height());
        *self.image.get_pixel(x, y)
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        debug_assert!(x < self.width() && y < self.height());
        self.image.put_pixel(x, y, pixel);
    }

    /// Source-over composite `color` scaled by `coverage` onto the pixel at
    /// (x, y). Positions outside the surface are ignored.
    #[inline]
    pub fn blend_pixel_clipped(&mut self, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let base = self.image.get_pixel_mut(x as u32, y as u32);
        *base = blend_over(*base, color, coverage);
    }

    /// Copy a tightly packed RGBA block onto the surface at (dst_x, dst_y),
    /// replacing the destination pixels. Rows and columns outside the surface
    /// are clipped.
    pub fn write_region(&mut self, dst_x: i32, dst_y: i32, src_w: u32, src_h: u32, data: &[u8]) {
        debug_assert_eq!(data.len(), src_w as usize * src_h as usize * 4);
        let width = self.width() as i32;
        let height = self.height() as i32;

        let x0 = dst_x.max(0);
        let x1 = (dst_x + src_w as i32).min(width);
        if x0 >= x1 {
            return;
        }
        let run = (x1 - x0) as usize * 4;
        let stride = self.width() as usize * 4;
        let raw: &mut [u8] = &mut self.image;

        for sy in 0..src_h as i32 {
            let gy = dst_y + sy;
            if gy < 0 || gy >= height {
                continue;
            }
            let src_off = (sy as usize * src_w as usize + (x0 - dst_x) as usize) * 4;
            let dst_off = gy as usize * stride + x0 as usize * 4;
            raw[dst_off..dst_off + run].copy_from_slice(&data[src_off..src_off + run]);
        }
    }

    /// Composite a tightly packed RGBA block (e.g. rasterized text or a shape
    /// outline) over the surface at (dst_x, dst_y) using each source pixel's alpha.
    pub fn composite_region(&mut self, dst_x: i32, dst_y: i32, src_w: u32, src_h: u32, data: &[u8]) {
        debug_assert_eq!(data.len(), src_w as usize * src_h as usize * 4);
        for sy in 0..src_h {
            for sx in 0..src_w {
                let off = (sy as usize * src_w as usize + sx as usize) * 4;
                if data[off + 3] == 0 {
                    continue;
                }
                let px = Rgba([data[off], data[off + 1], data[off + 2], data[off + 3]]);
                self.blend_pixel_clipped(dst_x + sx as i32, dst_y + sy as i32, px, 1.0);
            }
        }
    }

    // ---- bulk operations ----------------------------------------------------

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Make the whole surface transparent.
    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    /// Replace the whole buffer (dimensions included).
    pub(crate) fn replace_image(&mut self, image: RgbaImage) {
        self.image = image;
    }

    pub(crate) fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        self.image.clone()
    }

    // ---- snapshot / restore -------------------------------------------------

    /// Encode the current content into a lossless, self-describing snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::encode(&self.image)
    }

    /// Replace the surface content with a snapshot. Decoding happens before
    /// anything is touched, so a malformed snapshot leaves the surface unchanged.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        let decoded = io::decode_image(snapshot.as_bytes())?;
        self.image = decoded;
        Ok(())
    }
}

/// Reject zero-sized or absurdly large canvases.
pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    let total = width as u64 * height as u64;
    if width == 0 || height == 0 || total > MAX_PIXELS {
        return Err(CanvasError::InvalidDimensions(width, height));
    }
    Ok(())
}

/// Unpremultiplied source-over. `coverage` scales the source alpha.
#[inline]
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let coverage = coverage.clamp(0.0, 1.0);
    if top[3] == 0 || coverage <= 0.0 {
        return base;
    }
    // Fast path: opaque paint at full coverage overwrites
    if top[3] == 255 && coverage >= 1.0 {
        return top;
    }

    let base_a = base[3] as f32 / 255.0;
    let top_a = top[3] as f32 / 255.0 * coverage;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |i: usize| {
        let b = base[i] as f32 / 255.0;
        let t = top[i] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn zero_sized_surface_is_rejected() {
        assert!(matches!(
            PixelSurface::new(0, 10),
            Err(CanvasError::InvalidDimensions(0, 10))
        ));
    }

    #[test]
    fn snapshot_round_trip_is_bit_exact() {
        let mut surface = PixelSurface::new(7, 5).unwrap();
        for y in 0..5 {
            for x in 0..7 {
                surface.put_pixel(x, y, Rgba([x as u8 * 30, y as u8 * 50, 7, (x * y) as u8 * 9]));
            }
        }
        let snap = surface.snapshot().unwrap();
        let original = surface.clone();

        surface.fill(BLACK);
        surface.restore(&snap).unwrap();
        assert_eq!(surface, original);
    }

    #[test]
    fn restore_replaces_dimensions() {
        let small = PixelSurface::new_filled(3, 4, BLACK).unwrap();
        let snap = small.snapshot().unwrap();
        let mut surface = PixelSurface::new_filled(10, 10, WHITE).unwrap();
        surface.restore(&snap).unwrap();
        assert_eq!(surface.dimensions(), (3, 4));
        assert_eq!(surface.read_pixel(2, 3), BLACK);
    }

    #[test]
    fn failed_restore_leaves_surface_untouched() {
        let mut surface = PixelSurface::new_filled(4, 4, WHITE).unwrap();
        let before = surface.clone();
        let garbage = Snapshot::from_bytes(vec![1, 2, 3, 4, 5]);
        assert!(surface.restore(&garbage).is_err());
        assert_eq!(surface, before);
    }

    #[test]
    fn write_region_clips_at_edges() {
        let mut surface = PixelSurface::new_filled(4, 4, WHITE).unwrap();
        let block = [0u8, 0, 0, 255].repeat(9);
        surface.write_region(2, -1, 3, 3, &block);
        assert_eq!(surface.read_pixel(2, 0), BLACK);
        assert_eq!(surface.read_pixel(3, 1), BLACK);
        assert_eq!(surface.read_pixel(2, 2), WHITE);
        assert_eq!(surface.read_pixel(1, 0), WHITE);
    }

    #[test]
    fn blend_over_opaque_base_stays_opaque() {
        let out = blend_over(WHITE, Rgba([0, 0, 0, 255]), 0.5);
        assert_eq!(out[3], 255);
        assert!(out[0] > 120 && out[0] < 135);
    }

    #[test]
    fn blend_over_transparent_top_is_noop() {
        assert_eq!(blend_over(WHITE, TRANSPARENT, 1.0), WHITE);
        assert_eq!(blend_over(WHITE, BLACK, 0.0), WHITE);
    }

    #[test]
    fn clamp_point_stays_inside() {
        let surface = PixelSurface::new(10, 5).unwrap();
        assert_eq!(surface.clamp_point(-3.0, 2.4), (0, 2));
        assert_eq!(surface.clamp_point(40.0, 40.0), (9, 4));
    }
}
