use image::Rgba;

use crate::canvas::PixelSurface;

/// Span flood fill from `(seed_x, seed_y)`.
///
/// Fills the 4-connected region whose pixels exactly equal the seed pixel.
/// Works on a copy of the buffer and writes it back once at the end.
/// Returns `false` without touching anything when the seed is outside the
/// surface or already equals `fill` at full opacity.
pub fn flood_fill(surface: &mut PixelSurface, seed_x: u32, seed_y: u32, fill: Rgba<u8>) -> bool {
    let (width, height) = surface.dimensions();
    if seed_x >= width || seed_y >= height {
        return false;
    }
    let target = surface.read_pixel(seed_x, seed_y);
    let fill = Rgba([fill[0], fill[1], fill[2], 255]);
    if target == fill {
        return false;
    }

    let w = width as usize;
    let h = height as usize;
    let mut data = surface.image().as_raw().clone();
    let target = target.0;
    let fill = fill.0;

    let matches = |data: &[u8], x: usize, y: usize| -> bool {
        let i = (y * w + x) * 4;
        data[i..i + 4] == target
    };

    let mut stack: Vec<(usize, usize)> = vec![(seed_x as usize, seed_y as usize)];
    while let Some((x, mut y)) = stack.pop() {
        // Climb to the top of this column's matching run.
        while y > 0 && matches(&data, x, y - 1) {
            y -= 1;
        }

        let mut span_left = false;
        let mut span_right = false;
        while y < h && matches(&data, x, y) {
            let i = (y * w + x) * 4;
            data[i..i + 4].copy_from_slice(&fill);

            if x > 0 {
                let left = matches(&data, x - 1, y);
                if left && !span_left {
                    stack.push((x - 1, y));
                }
                span_left = left;
            }
            if x + 1 < w {
                let right = matches(&data, x + 1, y);
                if right && !span_right {
                    stack.push((x + 1, y));
                }
                span_right = right;
            }
            y += 1;
        }
    }

    surface.raw_mut().copy_from_slice(&data);
    true
}
