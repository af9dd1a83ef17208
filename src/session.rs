use ab_glyph::FontArc;
use image::{Rgba, RgbaImage};
use std::path::Path;
use uuid::Uuid;

use crate::canvas::PixelSurface;
use crate::components::colors::{to_hex, ColorPair};
use crate::components::history::{DecodedRestore, HistoryManager, PendingRestore, RestoreSequencer};
use crate::components::layers::LayerStack;
use crate::components::tools::{BrushBehavior, Tool, ToolProperties};
use crate::error::Result;
use crate::io::{self, SaveFormat, Snapshot};
use crate::ops::fill::flood_fill;
use crate::ops::shapes::{PolygonDraft, ShapeDraft};
use crate::ops::stroke::StrokeGesture;
use crate::ops::text::{self, TextAction, TextDraft, TextKey};
use crate::ops::transform::{self, Anchor, CropRect, FlipAxis};
use crate::settings::EngineSettings;
use crate::{log_debug, log_info, log_warn};

/// A pointer sample in canvas space (already corrected for zoom).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    /// Secondary (right) button: paints and fills with the secondary colour.
    pub secondary: bool,
}

impl PointerEvent {
    pub fn primary(x: f32, y: f32) -> Self {
        Self { x, y, secondary: false }
    }

    pub fn secondary(x: f32, y: f32) -> Self {
        Self { x, y, secondary: true }
    }
}

/// What a pointer-down did.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureOutcome {
    /// Nothing happened (locked or hidden layer).
    Ignored,
    /// A stroke or shape drag is now in progress.
    Started,
    /// Fill ran; `false` when it was a no-op.
    Filled(bool),
    /// Picker read a pixel and assigned it to the primary or secondary colour.
    ColorPicked { hex: String, color: Rgba<u8> },
    /// The text tool is now waiting for input at the press position.
    TextEditing,
    /// The press ended an open text draft instead of starting a gesture;
    /// `true` if text was drawn.
    TextCommitted(bool),
    /// A polygon vertex was added; carries the vertex count.
    PolygonVertex(usize),
}

/// Drag-scoped state. Exactly one exists between pointer-down and pointer-up.
#[derive(Debug, Default)]
enum ActiveGesture {
    #[default]
    Idle,
    Stroke(StrokeGesture),
    Shape(ShapeDraft),
}

// ============================================================================
// EDITOR SESSION – the handle callers use to drive the canvas
// ============================================================================

/// Owns the pixel surface and everything that edits it.
///
/// Only immutable copies of the pixels leave the session (snapshots,
/// encoded images, single pixel reads).
pub struct EditorSession {
    pub id: Uuid,
    surface: PixelSurface,
    history: HistoryManager,
    sequencer: RestoreSequencer,
    layers: LayerStack,
    colors: ColorPair,
    tool: Tool,
    properties: ToolProperties,
    gesture: ActiveGesture,
    polygon: Option<PolygonDraft>,
    text: Option<TextDraft>,
    font: Option<FontArc>,
}

impl EditorSession {
    /// Blank canvas sized and coloured from `settings`.
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let surface = PixelSurface::new_filled(settings.canvas_width, settings.canvas_height, settings.background)?;
        Self::with_surface(surface, settings)
    }

    /// Session editing an existing image.
    pub fn from_image(image: RgbaImage, settings: &EngineSettings) -> Result<Self> {
        crate::canvas::validate_dimensions(image.width(), image.height())?;
        Self::with_surface(PixelSurface::from_rgba_image(image), settings)
    }

    fn with_surface(surface: PixelSurface, settings: &EngineSettings) -> Result<Self> {
        let mut history = HistoryManager::new(settings.max_undo_steps);
        history.record("New Canvas", &surface)?;
        let session = Self {
            id: Uuid::new_v4(),
            surface,
            history,
            sequencer: RestoreSequencer::default(),
            layers: LayerStack::default(),
            colors: ColorPair {
                primary: settings.primary_color,
                secondary: settings.secondary_color,
            },
            tool: Tool::default(),
            properties: ToolProperties::from_settings(settings).sanitized(),
            gesture: ActiveGesture::Idle,
            polygon: None,
            text: None,
            font: None,
        };
        let (w, h) = session.surface.dimensions();
        log_info!("Session {}: {}x{} canvas", session.id, w, h);
        Ok(session)
    }

    // ---- accessors ----------------------------------------------------------

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// Pixel at (x, y), or `None` outside the canvas.
    pub fn read_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        let (w, h) = self.surface.dimensions();
        (x < w && y < h).then(|| self.surface.read_pixel(x, y))
    }

    /// Owned copy of the current pixels.
    pub fn to_rgba_image(&self) -> RgbaImage {
        self.surface.to_rgba_image()
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        self.surface.snapshot()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    pub fn colors(&self) -> ColorPair {
        self.colors
    }

    pub fn set_colors(&mut self, colors: ColorPair) {
        self.colors = colors;
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn properties(&self) -> &ToolProperties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: ToolProperties) {
        self.properties = properties.sanitized();
    }

    /// Use this font for the text tool instead of looking one up by family.
    pub fn set_font(&mut self, font: FontArc) {
        self.font = Some(font);
    }

    pub fn is_editing_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn is_gesture_active(&self) -> bool {
        !matches!(self.gesture, ActiveGesture::Idle)
    }

    pub fn polygon_vertex_count(&self) -> usize {
        self.polygon.as_ref().map_or(0, |p| p.vertices.len())
    }

    // ---- tool switching -----------------------------------------------------

    /// Switch tools. Open text is committed and an in-progress polygon is
    /// finalized (left open) first.
    pub fn set_tool(&mut self, tool: Tool) -> Result<()> {
        if tool == self.tool {
            return Ok(());
        }
        self.settle()?;
        log_info!("Tool: {} -> {}", self.tool.name(), tool.name());
        self.tool = tool;
        Ok(())
    }

    // ---- pointer input ------------------------------------------------------

    fn clamp(&self, ev: &PointerEvent) -> (f32, f32) {
        let (x, y) = self.surface.clamp_point(ev.x, ev.y);
        (x as f32, y as f32)
    }

    pub fn pointer_down(&mut self, ev: PointerEvent) -> Result<GestureOutcome> {
        if self.text.is_some() {
            let drawn = self.commit_text()?;
            return Ok(GestureOutcome::TextCommitted(drawn));
        }
        if !self.layers.active_is_editable() {
            log_warn!("Pointer ignored: layer '{}' is locked or hidden", self.layers.active().name);
            return Ok(GestureOutcome::Ignored);
        }
        self.cancel_gesture();

        let pos = self.clamp(&ev);
        let color = self.colors.for_button(ev.secondary);

        if let Some(behavior) = BrushBehavior::from_tool(self.tool) {
            let color = if behavior == BrushBehavior::Eraser { self.colors.secondary } else { color };
            let stroke = StrokeGesture::begin(&mut self.surface, behavior, color, &self.properties, pos);
            self.gesture = ActiveGesture::Stroke(stroke);
            return Ok(GestureOutcome::Started);
        }
        if let Some(kind) = self.tool.shape_kind() {
            let draft = ShapeDraft::begin(&self.surface, kind, pos, color, self.properties.size);
            self.gesture = ActiveGesture::Shape(draft);
            return Ok(GestureOutcome::Started);
        }

        match self.tool {
            Tool::Fill => {
                let changed = flood_fill(&mut self.surface, pos.0 as u32, pos.1 as u32, color);
                if changed {
                    self.commit("Flood Fill")?;
                }
                Ok(GestureOutcome::Filled(changed))
            }
            Tool::Picker => {
                let picked = self.surface.read_pixel(pos.0 as u32, pos.1 as u32);
                if ev.secondary {
                    self.colors.secondary = picked;
                } else {
                    self.colors.primary = picked;
                }
                Ok(GestureOutcome::ColorPicked {
                    hex: to_hex(picked),
                    color: picked,
                })
            }
            Tool::Text => {
                self.text = Some(TextDraft::new(pos));
                Ok(GestureOutcome::TextEditing)
            }
            Tool::Polygon => {
                let size = self.properties.size;
                let surface = &mut self.surface;
                let draft = self
                    .polygon
                    .get_or_insert_with(|| PolygonDraft::begin(surface, color, size));
                Ok(GestureOutcome::PolygonVertex(draft.add_vertex(surface, pos)))
            }
            _ => Ok(GestureOutcome::Ignored),
        }
    }

    pub fn pointer_move(&mut self, ev: PointerEvent) {
        let pos = self.clamp(&ev);
        match &mut self.gesture {
            ActiveGesture::Stroke(stroke) => stroke.move_to(&mut self.surface, pos),
            ActiveGesture::Shape(draft) => draft.update(&mut self.surface, pos),
            ActiveGesture::Idle => {}
        }
    }

    /// End the drag. Returns `true` if a history entry was recorded.
    pub fn pointer_up(&mut self, ev: PointerEvent) -> Result<bool> {
        let pos = self.clamp(&ev);
        match std::mem::take(&mut self.gesture) {
            ActiveGesture::Stroke(mut stroke) => {
                stroke.move_to(&mut self.surface, pos);
                let label = match stroke.behavior {
                    BrushBehavior::Pencil => "Pencil Stroke",
                    BrushBehavior::Brush => "Brush Stroke",
                    BrushBehavior::Eraser => "Eraser Stroke",
                };
                self.commit(label)?;
                Ok(true)
            }
            ActiveGesture::Shape(mut draft) => {
                draft.update(&mut self.surface, pos);
                self.commit(draft.kind.label())?;
                Ok(true)
            }
            ActiveGesture::Idle => Ok(false),
        }
    }

    /// Abandon the current drag and put back the pixels it touched.
    pub fn cancel_gesture(&mut self) {
        match std::mem::take(&mut self.gesture) {
            ActiveGesture::Shape(draft) => draft.cancel(&mut self.surface),
            ActiveGesture::Stroke(_) => {
                if let Some(entry) = self.history.current()
                    && let Err(e) = self.surface.restore(&entry.snapshot)
                {
                    log_warn!("Could not roll back cancelled stroke: {}", e);
                }
            }
            ActiveGesture::Idle => {}
        }
    }

    // ---- polygon ------------------------------------------------------------

    /// Finish the free-form polygon. `close` joins the last vertex to the first.
    /// A polygon with fewer than two vertices is discarded. Returns `true` if
    /// a history entry was recorded.
    pub fn finalize_polygon(&mut self, close: bool) -> Result<bool> {
        let Some(draft) = self.polygon.take() else { return Ok(false) };
        if draft.vertices.len() < 2 {
            draft.cancel(&mut self.surface);
            return Ok(false);
        }
        draft.finish(&mut self.surface, close);
        self.commit("Polygon")?;
        Ok(true)
    }

    // ---- text ---------------------------------------------------------------

    pub fn text_input(&mut self, s: &str) {
        if let Some(draft) = &mut self.text {
            draft.insert(s);
        }
    }

    /// Feed a key to the open text draft. Returns `true` if text was drawn.
    pub fn text_key(&mut self, key: TextKey) -> Result<bool> {
        let Some(draft) = &mut self.text else { return Ok(false) };
        match draft.key(key) {
            TextAction::Continue => Ok(false),
            TextAction::Commit => self.commit_text(),
            TextAction::Cancel => {
                self.cancel_text();
                Ok(false)
            }
        }
    }

    /// Draw the open text draft (also used when focus is lost). Blank drafts
    /// are dropped without a history entry. If no font is available the
    /// draft stays open and the surface is untouched.
    pub fn commit_text(&mut self) -> Result<bool> {
        let Some(draft) = self.text.take() else { return Ok(false) };
        if draft.is_blank() {
            return Ok(false);
        }
        if self.font.is_none() {
            match text::load_system_font(&self.properties.font_family) {
                Ok(font) => self.font = Some(font),
                Err(e) => {
                    self.text = Some(draft);
                    return Err(e);
                }
            }
        }
        let Some(font) = self.font.as_ref() else { return Ok(false) };
        draft.render(&mut self.surface, font, self.properties.font_size(), self.colors.primary);
        self.commit("Text")?;
        Ok(true)
    }

    pub fn cancel_text(&mut self) {
        self.text = None;
    }

    // ---- history ------------------------------------------------------------

    fn commit(&mut self, description: &str) -> Result<()> {
        self.history.record(description, &self.surface)?;
        self.sequencer.note_commit();
        log_info!(
            "History: '{}' ({} of {})",
            description,
            self.history.cursor() + 1,
            self.history.len()
        );
        log_debug!(
            "History: {} undo / {} redo, {} bytes of snapshots",
            self.history.undo_count(),
            self.history.redo_count(),
            self.history.memory_usage()
        );
        Ok(())
    }

    /// Close open work before the buffer is replaced wholesale: a drag in
    /// progress is rolled back, typed text is committed and an open polygon
    /// is finalized as drawn. Each of those commits records its own entry.
    fn settle(&mut self) -> Result<()> {
        self.cancel_gesture();
        if self.text.is_some() {
            self.commit_text()?;
        }
        if self.polygon.is_some() {
            self.finalize_polygon(false)?;
        }
        Ok(())
    }

    /// Step back one entry. Open text or polygon drafts are committed first,
    /// so undo while drafting reverts the draft and redo brings it back.
    pub fn undo(&mut self) -> Result<bool> {
        self.settle()?;
        let moved = self.history.undo(&mut self.surface)?;
        if moved {
            self.sequencer.note_commit();
        }
        Ok(moved)
    }

    /// Step forward one entry. Committing an open draft first clears the
    /// redo tail, in which case this returns `false`.
    pub fn redo(&mut self) -> Result<bool> {
        self.settle()?;
        let moved = self.history.redo(&mut self.surface)?;
        if moved {
            self.sequencer.note_commit();
        }
        Ok(moved)
    }

    // ---- canvas transforms --------------------------------------------------

    pub fn rotate(&mut self, degrees: f32) -> Result<()> {
        self.settle()?;
        transform::rotate(&mut self.surface, degrees);
        self.commit("Rotate")
    }

    pub fn flip(&mut self, axis: FlipAxis) -> Result<()> {
        self.settle()?;
        transform::flip(&mut self.surface, axis);
        self.commit(match axis {
            FlipAxis::Horizontal => "Flip Horizontal",
            FlipAxis::Vertical => "Flip Vertical",
        })
    }

    pub fn crop(&mut self, rect: CropRect) -> Result<()> {
        let (w, h) = self.surface.dimensions();
        rect.validate(w, h)?;
        self.settle()?;
        transform::crop(&mut self.surface, rect)?;
        self.commit("Crop")
    }

    /// Crop using the fixed 100 px inset.
    pub fn crop_default(&mut self) -> Result<()> {
        let (w, h) = self.surface.dimensions();
        self.crop(CropRect::default_inset(w, h))
    }

    /// Resize the canvas, keeping content at the top-left and filling new
    /// area with the secondary colour.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.resize_anchored(width, height, Anchor::TopLeft)
    }

    pub fn resize_anchored(&mut self, width: u32, height: u32, anchor: Anchor) -> Result<()> {
        crate::canvas::validate_dimensions(width, height)?;
        self.settle()?;
        transform::resize_canvas(&mut self.surface, width, height, anchor, self.colors.secondary)?;
        self.commit("Resize Canvas")
    }

    /// Fill the whole canvas with the secondary colour.
    pub fn clear(&mut self) -> Result<()> {
        self.settle()?;
        self.surface.fill(self.colors.secondary);
        self.commit("Clear")
    }

    // ---- encoded image exchange ---------------------------------------------

    /// Lossless encoding of the current pixels.
    pub fn get_current_buffer_as_encoded_image(&self) -> Result<Vec<u8>> {
        Ok(self.surface.snapshot()?.into_bytes())
    }

    /// Replace the canvas with an encoded image, synchronously.
    /// Decode failures leave the canvas unchanged.
    pub fn load_from_encoded_image(&mut self, bytes: &[u8]) -> Result<bool> {
        let pending = self.begin_load(bytes.to_vec());
        self.finish_load(pending.decode())
    }

    /// Issue a load whose decode can run elsewhere (e.g. `rayon::spawn`).
    /// Hand the decoded result to [`EditorSession::finish_load`].
    pub fn begin_load(&mut self, bytes: Vec<u8>) -> PendingRestore {
        PendingRestore::new(self.sequencer.issue(), bytes)
    }

    /// Apply a finished decode. Returns `Ok(false)` when a newer load or edit
    /// has superseded it; the canvas is untouched in that case and on error.
    pub fn finish_load(&mut self, decoded: DecodedRestore) -> Result<bool> {
        if !self.sequencer.is_current(decoded.generation) {
            log_warn!(
                "Dropping stale load #{} (latest issued #{})",
                decoded.generation,
                self.sequencer.latest_issued()
            );
            return Ok(false);
        }
        let image = match decoded.image {
            Ok(image) => image,
            Err(e) => {
                log_warn!("Load #{} failed to decode: {}", decoded.generation, e);
                return Err(e);
            }
        };
        crate::canvas::validate_dimensions(image.width(), image.height())?;
        self.sequencer.accept(decoded.generation);
        self.settle()?;
        self.surface.replace_image(image);
        self.history.record("Load Image", &self.surface)?;
        log_info!("Loaded image #{} ({}x{})", decoded.generation, self.surface.width(), self.surface.height());
        Ok(true)
    }

    // ---- export -------------------------------------------------------------

    pub fn export(&self, format: SaveFormat, quality: u8) -> Result<Vec<u8>> {
        self.warn_if_flattened(format);
        io::encode_to_vec(self.surface.image(), format, quality)
    }

    pub fn save(&self, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
        self.warn_if_flattened(format);
        io::encode_and_write(self.surface.image(), path, format, quality)?;
        log_info!("Saved {} as {}", path.display(), format.extension());
        Ok(())
    }

    /// Whether exporting as `format` would drop translucent pixels' alpha.
    pub fn loses_alpha(&self, format: SaveFormat) -> bool {
        format.is_opaque() && self.surface.image().pixels().any(|p| p[3] < 255)
    }

    fn warn_if_flattened(&self, format: SaveFormat) {
        if self.loses_alpha(format) {
            log_warn!("Export: {} has no alpha channel, transparency is dropped", format.extension());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::{BLACK, WHITE};

    fn small_settings(w: u32, h: u32) -> EngineSettings {
        EngineSettings {
            canvas_width: w,
            canvas_height: h,
            ..EngineSettings::default()
        }
    }

    #[test]
    fn new_session_has_baseline_entry() {
        let session = EditorSession::new(&small_settings(16, 16)).unwrap();
        assert_eq!(session.history().len(), 1);
        assert!(!session.history().can_undo());
        assert_eq!(session.read_pixel(0, 0), Some(WHITE));
        assert_eq!(session.read_pixel(16, 0), None);
    }

    #[test]
    fn stroke_records_once_on_release() {
        let mut session = EditorSession::new(&small_settings(40, 40)).unwrap();
        session.set_tool(Tool::Pencil).unwrap();
        session.pointer_down(PointerEvent::primary(5.0, 5.0)).unwrap();
        session.pointer_move(PointerEvent::primary(20.0, 5.0));
        session.pointer_move(PointerEvent::primary(30.0, 5.0));
        assert_eq!(session.history().len(), 1);
        assert!(session.pointer_up(PointerEvent::primary(35.0, 5.0)).unwrap());
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.read_pixel(20, 5), Some(BLACK));
    }

    #[test]
    fn pointer_outside_canvas_is_clamped() {
        let mut session = EditorSession::new(&small_settings(10, 10)).unwrap();
        session.set_tool(Tool::Fill).unwrap();
        let outcome = session.pointer_down(PointerEvent::primary(-50.0, 400.0)).unwrap();
        assert_eq!(outcome, GestureOutcome::Filled(true));
    }

    #[test]
    fn picker_sets_color_and_reports_hex() {
        let mut session = EditorSession::new(&small_settings(10, 10)).unwrap();
        session.set_tool(Tool::Picker).unwrap();
        let outcome = session.pointer_down(PointerEvent::secondary(3.0, 3.0)).unwrap();
        assert_eq!(
            outcome,
            GestureOutcome::ColorPicked {
                hex: "#ffffff".into(),
                color: WHITE
            }
        );
        assert_eq!(session.colors().secondary, WHITE);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn locked_layer_ignores_gestures() {
        let mut session = EditorSession::new(&small_settings(10, 10)).unwrap();
        let id = session.layers().active().id;
        session.layers_mut().set_locked(id, true).unwrap();
        session.set_tool(Tool::Fill).unwrap();
        let outcome = session.pointer_down(PointerEvent::primary(1.0, 1.0)).unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored);
        assert_eq!(session.read_pixel(1, 1), Some(WHITE));
    }

    #[test]
    fn tool_switch_finalizes_polygon() {
        let mut session = EditorSession::new(&small_settings(30, 30)).unwrap();
        session.set_tool(Tool::Polygon).unwrap();
        session.pointer_down(PointerEvent::primary(2.0, 2.0)).unwrap();
        let outcome = session.pointer_down(PointerEvent::primary(25.0, 2.0)).unwrap();
        assert_eq!(outcome, GestureOutcome::PolygonVertex(2));
        assert_eq!(session.history().len(), 1);
        session.set_tool(Tool::Brush).unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.polygon_vertex_count(), 0);
    }

    #[test]
    fn single_vertex_polygon_is_discarded() {
        let mut session = EditorSession::new(&small_settings(30, 30)).unwrap();
        session.set_tool(Tool::Polygon).unwrap();
        session.pointer_down(PointerEvent::primary(10.0, 10.0)).unwrap();
        assert!(!session.finalize_polygon(true).unwrap());
        assert_eq!(session.read_pixel(10, 10), Some(WHITE));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn blank_text_is_discarded() {
        let mut session = EditorSession::new(&small_settings(30, 30)).unwrap();
        session.set_tool(Tool::Text).unwrap();
        assert_eq!(
            session.pointer_down(PointerEvent::primary(3.0, 3.0)).unwrap(),
            GestureOutcome::TextEditing
        );
        session.text_input("   ");
        assert!(!session.text_key(TextKey::Enter { shift: false }).unwrap());
        assert!(!session.is_editing_text());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn escape_discards_text() {
        let mut session = EditorSession::new(&small_settings(30, 30)).unwrap();
        session.set_tool(Tool::Text).unwrap();
        session.pointer_down(PointerEvent::primary(3.0, 3.0)).unwrap();
        session.text_input("hello");
        assert!(!session.text_key(TextKey::Escape).unwrap());
        assert!(!session.is_editing_text());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn pointer_down_while_editing_only_commits() {
        let mut session = EditorSession::new(&small_settings(30, 30)).unwrap();
        session.set_tool(Tool::Text).unwrap();
        session.pointer_down(PointerEvent::primary(3.0, 3.0)).unwrap();
        // Blank draft: the press closes editing and starts nothing else.
        let outcome = session.pointer_down(PointerEvent::primary(10.0, 10.0)).unwrap();
        assert_eq!(outcome, GestureOutcome::TextCommitted(false));
        assert!(!session.is_editing_text());
        assert!(!session.is_gesture_active());
    }
}
