use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{self, PixelSurface, TRANSPARENT};
use crate::error::{CanvasError, Result};

/// Inset used by [`CropRect::default_inset`].
pub const DEFAULT_CROP_INSET: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Where existing content sits when the canvas size changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    TopLeft,
    Center,
    BottomRight,
}

/// Axis-aligned crop region in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Keep the top-left region, shrinking both dimensions by 100 pixels
    /// (never below 1).
    pub fn default_inset(canvas_w: u32, canvas_h: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: canvas_w.saturating_sub(DEFAULT_CROP_INSET).max(1),
            height: canvas_h.saturating_sub(DEFAULT_CROP_INSET).max(1),
        }
    }

    pub fn validate(&self, canvas_w: u32, canvas_h: u32) -> Result<()> {
        let fits_x = self.x.checked_add(self.width).is_some_and(|r| r <= canvas_w);
        let fits_y = self.y.checked_add(self.height).is_some_and(|b| b <= canvas_h);
        if self.width == 0 || self.height == 0 || !fits_x || !fits_y {
            return Err(CanvasError::InvalidCrop {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                canvas_width: canvas_w,
                canvas_height: canvas_h,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Rotate content clockwise by `degrees` about the canvas centre.
///
/// Dimensions never change: corners that leave the canvas are clipped and
/// uncovered areas become transparent. Quarter turns map pixels exactly.
pub fn rotate(surface: &mut PixelSurface, degrees: f32) {
    let turns = degrees.rem_euclid(360.0);
    if turns == 0.0 {
        return;
    }
    let src = surface.to_rgba_image();
    let (w, h) = src.dimensions();

    let (sin, cos, exact) = snapped_sin_cos(turns);
    let cx = w as f32 * 0.5;
    let cy = h as f32 * 0.5;

    let row_bytes = w as usize * 4;
    let mut out = vec![0u8; row_bytes * h as usize];
    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = y as f32 + 0.5 - cy;
            for x in 0..w as usize {
                let dx = x as f32 + 0.5 - cx;
                // Inverse rotation back into the source.
                let sx = dx * cos + dy * sin + cx;
                let sy = -dx * sin + dy * cos + cy;
                let px = if exact {
                    nearest_sample(&src, sx, sy)
                } else {
                    bilinear_sample(&src, sx - 0.5, sy - 0.5)
                };
                row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
            }
        });

    if let Some(img) = RgbaImage::from_raw(w, h, out) {
        surface.replace_image(img);
    }
}

/// sin/cos of `degrees`, snapped to exact values on quarter turns.
fn snapped_sin_cos(degrees: f32) -> (f32, f32, bool) {
    let quarter = degrees / 90.0;
    if (quarter - quarter.round()).abs() < 1e-6 {
        match (quarter.round() as i32).rem_euclid(4) {
            0 => (0.0, 1.0, true),
            1 => (1.0, 0.0, true),
            2 => (0.0, -1.0, true),
            _ => (-1.0, 0.0, true),
        }
    } else {
        let r = degrees.to_radians();
        (r.sin(), r.cos(), false)
    }
}

fn nearest_sample(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let ix = x.floor() as i64;
    let iy = y.floor() as i64;
    if ix < 0 || iy < 0 || ix >= img.width() as i64 || iy >= img.height() as i64 {
        TRANSPARENT
    } else {
        *img.get_pixel(ix as u32, iy as u32)
    }
}

fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= img.width() as i32 || sy >= img.height() as i32 {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

// ---------------------------------------------------------------------------
// Flip / crop / resize
// ---------------------------------------------------------------------------

pub fn flip(surface: &mut PixelSurface, axis: FlipAxis) {
    let mut img = surface.to_rgba_image();
    match axis {
        FlipAxis::Horizontal => imageops::flip_horizontal_in_place(&mut img),
        FlipAxis::Vertical => imageops::flip_vertical_in_place(&mut img),
    }
    surface.replace_image(img);
}

/// Keep only `rect`, re-anchored at the origin.
pub fn crop(surface: &mut PixelSurface, rect: CropRect) -> Result<()> {
    let (w, h) = surface.dimensions();
    rect.validate(w, h)?;
    let cropped = imageops::crop_imm(surface.image(), rect.x, rect.y, rect.width, rect.height).to_image();
    surface.replace_image(cropped);
    Ok(())
}

/// Change the canvas size without scaling. Content keeps its pixel size and
/// is placed at `anchor`; new area is filled with `fill`.
pub fn resize_canvas(
    surface: &mut PixelSurface,
    new_w: u32,
    new_h: u32,
    anchor: Anchor,
    fill: Rgba<u8>,
) -> Result<()> {
    canvas::validate_dimensions(new_w, new_h)?;
    let (old_w, old_h) = surface.dimensions();

    let offset = |new: u32, old: u32| -> i64 {
        match anchor {
            Anchor::TopLeft => 0,
            Anchor::Center => (new as i64 - old as i64) / 2,
            Anchor::BottomRight => new as i64 - old as i64,
        }
    };
    let mut new_img = RgbaImage::from_pixel(new_w, new_h, fill);
    imageops::replace(&mut new_img, surface.image(), offset(new_w, old_w), offset(new_h, old_h));
    surface.replace_image(new_img);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(w: u32, h: u32) -> PixelSurface {
        PixelSurface::from_rgba_image(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 17 % 256) as u8, (y * 29 % 256) as u8, ((x + y) % 256) as u8, 255])
        }))
    }

    #[test]
    fn four_quarter_turns_are_identity_on_square() {
        let mut surface = patterned(9, 9);
        let original = surface.clone();
        for _ in 0..4 {
            rotate(&mut surface, 90.0);
        }
        assert_eq!(surface, original);

        let mut even = patterned(8, 8);
        let even_original = even.clone();
        rotate(&mut even, 270.0);
        rotate(&mut even, -270.0);
        assert_eq!(even, even_original);
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        let mut surface = PixelSurface::new(4, 4).unwrap();
        let red = Rgba([255, 0, 0, 255]);
        surface.put_pixel(0, 0, red);
        rotate(&mut surface, 90.0);
        assert_eq!(surface.read_pixel(3, 0), red);
        assert_eq!(surface.read_pixel(0, 0), TRANSPARENT);
    }

    #[test]
    fn rotation_keeps_dimensions() {
        let mut surface = patterned(10, 4);
        rotate(&mut surface, 90.0);
        assert_eq!(surface.dimensions(), (10, 4));
        // The band outside the rotated content is cleared.
        assert_eq!(surface.read_pixel(0, 0), TRANSPARENT);

        let mut odd = patterned(12, 12);
        rotate(&mut odd, 45.0);
        assert_eq!(odd.dimensions(), (12, 12));
        assert_eq!(odd.read_pixel(0, 0), TRANSPARENT);
        assert_eq!(odd.read_pixel(6, 6)[3], 255);
    }

    #[test]
    fn flip_twice_is_identity() {
        let mut surface = patterned(5, 3);
        let original = surface.clone();
        flip(&mut surface, FlipAxis::Horizontal);
        assert_eq!(surface.read_pixel(0, 0), original.read_pixel(4, 0));
        flip(&mut surface, FlipAxis::Horizontal);
        flip(&mut surface, FlipAxis::Vertical);
        assert_eq!(surface.read_pixel(0, 0), original.read_pixel(0, 2));
        flip(&mut surface, FlipAxis::Vertical);
        assert_eq!(surface, original);
    }

    #[test]
    fn crop_reanchors_at_origin() {
        let mut surface = patterned(10, 8);
        let original = surface.clone();
        crop(&mut surface, CropRect::new(2, 3, 4, 5)).unwrap();
        assert_eq!(surface.dimensions(), (4, 5));
        assert_eq!(surface.read_pixel(0, 0), original.read_pixel(2, 3));
        assert_eq!(surface.read_pixel(3, 4), original.read_pixel(5, 7));
    }

    #[test]
    fn invalid_crop_is_rejected_without_change() {
        let mut surface = patterned(10, 8);
        let original = surface.clone();
        assert!(crop(&mut surface, CropRect::new(8, 0, 5, 2)).is_err());
        assert!(crop(&mut surface, CropRect::new(0, 0, 0, 2)).is_err());
        assert!(crop(&mut surface, CropRect::new(u32::MAX, 0, 2, 2)).is_err());
        assert_eq!(surface, original);
    }

    #[test]
    fn default_inset_shrinks_by_hundred() {
        assert_eq!(CropRect::default_inset(1200, 800), CropRect::new(0, 0, 1100, 700));
        assert_eq!(CropRect::default_inset(50, 300), CropRect::new(0, 0, 1, 200));
    }

    #[test]
    fn resize_canvas_fills_new_area() {
        let mut surface = patterned(4, 4);
        let original = surface.clone();
        let white = Rgba([255, 255, 255, 255]);
        resize_canvas(&mut surface, 6, 5, Anchor::TopLeft, white).unwrap();
        assert_eq!(surface.dimensions(), (6, 5));
        assert_eq!(surface.read_pixel(3, 3), original.read_pixel(3, 3));
        assert_eq!(surface.read_pixel(5, 4), white);

        resize_canvas(&mut surface, 2, 2, Anchor::Center, white).unwrap();
        assert_eq!(surface.dimensions(), (2, 2));
        assert!(resize_canvas(&mut surface, 0, 2, Anchor::Center, white).is_err());
    }
}
