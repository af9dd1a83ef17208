use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::Rgba;

use crate::canvas::PixelSurface;
use crate::error::{CanvasError, Result};

/// Line pitch as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Lay out a single line of text, left-aligned at x = 0 with the baseline at
/// `baseline_y`. Returns `(glyphs, total_width)`.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32, baseline_y: f32) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, baseline_y));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    (glyphs, cursor_x)
}

/// Text rasterized into a tight RGBA block positioned in canvas space.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    fn empty() -> Self {
        Self {
            buf: Vec::new(),
            buf_w: 0,
            buf_h: 0,
            off_x: 0,
            off_y: 0,
        }
    }
}

/// Rasterize multi-line text with its top edge at `(origin_x, origin_y)`.
///
/// Each `\n` starts a new line `font_size * 1.2` below the previous one.
/// Output is clipped to the canvas.
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    origin_y: f32,
    color: Rgba<u8>,
    canvas_w: u32,
    canvas_h: u32,
) -> RasterizedText {
    let ascent = font.as_scaled(font_size).ascent();
    let line_height = font_size * LINE_HEIGHT_FACTOR;

    let mut all_glyphs: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let (glyphs, _) = layout_line(font, line, font_size, line_idx as f32 * line_height + ascent);
        all_glyphs.extend(glyphs);
    }
    if all_glyphs.is_empty() {
        return RasterizedText::empty();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(gx, gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return RasterizedText::empty();
    }

    // Canvas-space box, clamped.
    let bx0 = ((origin_x + min_x).floor() as i32 - 2).max(0);
    let by0 = ((origin_y + min_y).floor() as i32 - 2).max(0);
    let bx1 = ((origin_x + max_x).ceil() as i32 + 2).min(canvas_w as i32);
    let by1 = ((origin_y + max_y).ceil() as i32 + 2).min(canvas_h as i32);
    let buf_w = (bx1 - bx0).max(0) as u32;
    let buf_h = (by1 - by0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return RasterizedText::empty();
    }

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        let Some(outlined) = font.outline_glyph(glyph) else { continue };
        let b = outlined.px_bounds();
        outlined.draw(|px, py, cov| {
            let ix = b.min.x as i32 + px as i32 - bx0;
            let iy = b.min.y as i32 + py as i32 - by0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        });
    }

    let mut buf = vec![0u8; coverage.len() * 4];
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            let idx = i * 4;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = (color[3] as f32 * cov.min(1.0)).round() as u8;
        }
    }

    RasterizedText {
        buf,
        buf_w,
        buf_h,
        off_x: bx0,
        off_y: by0,
    }
}

/// Load a font by family name from the system, falling back to the generic
/// sans-serif face.
pub fn load_system_font(family: &str) -> Result<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &Properties::new(),
        )
        .map_err(|_| CanvasError::FontUnavailable(family.to_string()))?;

    let font_data = handle
        .load()
        .map_err(|_| CanvasError::FontUnavailable(family.to_string()))?;
    let bytes = font_data
        .copy_font_data()
        .ok_or_else(|| CanvasError::FontUnavailable(family.to_string()))?;
    FontArc::try_from_vec((*bytes).clone()).map_err(|_| CanvasError::FontUnavailable(family.to_string()))
}

// ============================================================================
// TextDraft – the idle -> editing -> idle state machine
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKey {
    Enter { shift: bool },
    Escape,
    Backspace,
}

/// What the caller should do after a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAction {
    Continue,
    Commit,
    Cancel,
}

/// Text being typed at an anchor point. Exists only while editing.
#[derive(Clone, Debug, PartialEq)]
pub struct TextDraft {
    pub anchor: (f32, f32),
    pub text: String,
}

impl TextDraft {
    pub fn new(anchor: (f32, f32)) -> Self {
        Self {
            anchor,
            text: String::new(),
        }
    }

    pub fn insert(&mut self, s: &str) {
        self.text.push_str(s);
    }

    /// Apply a key. Shift+Enter inserts a line break.
    pub fn key(&mut self, key: TextKey) -> TextAction {
        match key {
            TextKey::Enter { shift: true } => {
                self.text.push('\n');
                TextAction::Continue
            }
            TextKey::Enter { shift: false } => TextAction::Commit,
            TextKey::Escape => TextAction::Cancel,
            TextKey::Backspace => {
                self.text.pop();
                TextAction::Continue
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Rasterize the draft onto the surface. Returns `false` for blank input.
    pub fn render(&self, surface: &mut PixelSurface, font: &FontArc, font_size: f32, color: Rgba<u8>) -> bool {
        if self.is_blank() {
            return false;
        }
        let (w, h) = surface.dimensions();
        let raster = rasterize_text(font, &self.text, font_size, self.anchor.0, self.anchor.1, color, w, h);
        if raster.buf_w > 0 {
            surface.composite_region(raster.off_x, raster.off_y, raster.buf_w, raster.buf_h, &raster.buf);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_commits_and_shift_enter_breaks_line() {
        let mut draft = TextDraft::new((10.0, 10.0));
        draft.insert("hello");
        assert_eq!(draft.key(TextKey::Enter { shift: true }), TextAction::Continue);
        draft.insert("world");
        assert_eq!(draft.text, "hello\nworld");
        assert_eq!(draft.key(TextKey::Enter { shift: false }), TextAction::Commit);
    }

    #[test]
    fn escape_cancels_and_backspace_edits() {
        let mut draft = TextDraft::new((0.0, 0.0));
        draft.insert("ab");
        assert_eq!(draft.key(TextKey::Backspace), TextAction::Continue);
        assert_eq!(draft.text, "a");
        assert_eq!(draft.key(TextKey::Escape), TextAction::Cancel);
    }

    #[test]
    fn whitespace_is_blank() {
        let mut draft = TextDraft::new((0.0, 0.0));
        assert!(draft.is_blank());
        draft.insert("  \n\t ");
        assert!(draft.is_blank());
        draft.insert("x");
        assert!(!draft.is_blank());
    }

    #[test]
    fn renders_when_a_system_font_exists() {
        // Headless CI images may ship without any fonts.
        let Ok(font) = load_system_font("DejaVu Sans") else { return };
        let mut surface = PixelSurface::new_filled(200, 80, Rgba([255, 255, 255, 255])).unwrap();
        let before = surface.clone();
        let mut draft = TextDraft::new((5.0, 5.0));
        draft.insert("Hi\nthere");
        assert!(draft.render(&mut surface, &font, 20.0, Rgba([0, 0, 0, 255])));
        assert_ne!(surface, before);
        // Nothing is drawn above the anchor.
        for x in 0..200 {
            assert_eq!(surface.read_pixel(x, 0), Rgba([255, 255, 255, 255]));
        }
    }
}
