use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CanvasError, Result};
use crate::log_info;

/// Largest stack the session will build.
const MAX_LAYERS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::ColorBurn => "Color Burn",
            BlendMode::HardLight => "Hard Light",
            BlendMode::SoftLight => "Soft Light",
        }
    }

    /// Compositing-operator key (`source-over`, `color-dodge`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            BlendMode::Normal => "source-over",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
        }
    }

    pub fn from_key(key: &str) -> Option<BlendMode> {
        BlendMode::all().iter().copied().find(|m| m.key() == key)
    }
}

/// Layer bookkeeping. There is no per-layer bitmap; all drawing lands on the
/// session's single surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub blend_mode: BlendMode,
    pub opacity: f32,
}

impl LayerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            locked: false,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
        }
    }
}

// ============================================================================
// LAYER STACK
// ============================================================================

/// Ordered layer list (index 0 is the bottom) with one active layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<LayerInfo>,
    active: usize,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self {
            layers: vec![LayerInfo::new("Background")],
            active: 0,
        }
    }
}

impl LayerStack {
    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &LayerInfo {
        &self.layers[self.active]
    }

    /// Whether drawing gestures are currently accepted.
    pub fn active_is_editable(&self) -> bool {
        let layer = self.active();
        !layer.locked && layer.visible
    }

    /// Append a new layer above the active one and make it active.
    pub fn add_layer(&mut self, name: Option<&str>) -> Result<Uuid> {
        if self.layers.len() >= MAX_LAYERS {
            return Err(CanvasError::InvalidOp(format!(
                "layer limit of {} reached",
                MAX_LAYERS
            )));
        }
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => format!("Layer {}", self.layers.len() + 1),
        };
        let layer = LayerInfo::new(name);
        let id = layer.id;
        log_info!("Layers: added '{}' ({})", layer.name, id);
        self.layers.insert(self.active + 1, layer);
        self.active += 1;
        Ok(id)
    }

    /// Remove a layer. The last remaining layer cannot be removed.
    pub fn remove_layer(&mut self, id: Uuid) -> Result<()> {
        if self.layers.len() <= 1 {
            return Err(CanvasError::InvalidOp("cannot remove the only layer".into()));
        }
        let idx = self.index_of(id)?;
        self.layers.remove(idx);
        if self.active >= self.layers.len() || (self.active > idx) {
            self.active = self.active.saturating_sub(1);
        }
        Ok(())
    }

    /// Copy a layer's properties into a new layer directly above it. The copy
    /// gets a fresh id and becomes active.
    pub fn duplicate_layer(&mut self, id: Uuid) -> Result<Uuid> {
        if self.layers.len() >= MAX_LAYERS {
            return Err(CanvasError::InvalidOp(format!(
                "layer limit of {} reached",
                MAX_LAYERS
            )));
        }
        let idx = self.index_of(id)?;
        let mut copy = self.layers[idx].clone();
        copy.id = Uuid::new_v4();
        copy.name = format!("{} copy", copy.name);
        let new_id = copy.id;
        self.layers.insert(idx + 1, copy);
        self.active = idx + 1;
        Ok(new_id)
    }

    pub fn set_active(&mut self, id: Uuid) -> Result<()> {
        self.active = self.index_of(id)?;
        Ok(())
    }

    pub fn set_visible(&mut self, id: Uuid, visible: bool) -> Result<()> {
        self.get_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_locked(&mut self, id: Uuid, locked: bool) -> Result<()> {
        self.get_mut(id)?.locked = locked;
        Ok(())
    }

    pub fn rename(&mut self, id: Uuid, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CanvasError::InvalidOp("layer name cannot be empty".into()));
        }
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_opacity(&mut self, id: Uuid, opacity: f32) -> Result<()> {
        self.get_mut(id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_blend_mode(&mut self, id: Uuid, mode: BlendMode) -> Result<()> {
        self.get_mut(id)?.blend_mode = mode;
        Ok(())
    }

    /// Move a layer to `new_index`, keeping the same layer active.
    pub fn move_layer(&mut self, id: Uuid, new_index: usize) -> Result<()> {
        let from = self.index_of(id)?;
        let to = new_index.min(self.layers.len() - 1);
        let active_id = self.layers[self.active].id;
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        self.active = self.index_of(active_id)?;
        Ok(())
    }

    fn index_of(&self, id: Uuid) -> Result<usize> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| CanvasError::InvalidOp(format!("unknown layer {}", id)))
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut LayerInfo> {
        let idx = self.index_of(id)?;
        Ok(&mut self.layers[idx])
    }
}
