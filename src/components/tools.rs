use serde::{Deserialize, Serialize};

use crate::ops::shapes::ShapeKind;
use crate::settings::EngineSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tool {
    Pencil,
    #[default]
    Brush,
    Eraser,
    Fill,
    Text,
    Picker,
    Rectangle,
    RoundedRect,
    Circle,
    Line,
    Triangle,
    Pentagon,
    Hexagon,
    Diamond,
    Star,
    Polygon,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Pencil,
            Tool::Brush,
            Tool::Eraser,
            Tool::Fill,
            Tool::Text,
            Tool::Picker,
            Tool::Rectangle,
            Tool::RoundedRect,
            Tool::Circle,
            Tool::Line,
            Tool::Triangle,
            Tool::Pentagon,
            Tool::Hexagon,
            Tool::Diamond,
            Tool::Star,
            Tool::Polygon,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Pencil => "pencil",
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
            Tool::Fill => "fill",
            Tool::Text => "text",
            Tool::Picker => "picker",
            Tool::Rectangle => "rect",
            Tool::RoundedRect => "rounded-rect",
            Tool::Circle => "circle",
            Tool::Line => "line",
            Tool::Triangle => "triangle",
            Tool::Pentagon => "pentagon",
            Tool::Hexagon => "hexagon",
            Tool::Diamond => "diamond",
            Tool::Star => "star",
            Tool::Polygon => "polygon",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        let name = name.trim().to_ascii_lowercase();
        Tool::all().iter().copied().find(|t| t.name() == name)
    }

    /// Freehand tools driven by the stamp renderer.
    pub fn is_stroke(&self) -> bool {
        matches!(self, Tool::Pencil | Tool::Brush | Tool::Eraser)
    }

    /// Drag-to-size shapes previewed against a pre-drag snapshot.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::RoundedRect => Some(ShapeKind::RoundedRect),
            Tool::Circle => Some(ShapeKind::Circle),
            Tool::Line => Some(ShapeKind::Line),
            Tool::Triangle => Some(ShapeKind::Triangle),
            Tool::Pentagon => Some(ShapeKind::Pentagon),
            Tool::Hexagon => Some(ShapeKind::Hexagon),
            Tool::Diamond => Some(ShapeKind::Diamond),
            Tool::Star => Some(ShapeKind::Star),
            _ => None,
        }
    }
}

/// How a stroke tool lays down stamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushBehavior {
    /// Thin, hard, fixed-width line.
    Pencil,
    /// Soft or hard round brush in the gesture colour.
    Brush,
    /// Same stamping as `Brush`, painting the secondary colour.
    Eraser,
}

impl BrushBehavior {
    pub fn from_tool(tool: Tool) -> Option<Self> {
        match tool {
            Tool::Pencil => Some(BrushBehavior::Pencil),
            Tool::Brush => Some(BrushBehavior::Brush),
            Tool::Eraser => Some(BrushBehavior::Eraser),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolProperties {
    /// Brush width in pixels. Also drives pencil width, shape outline width
    /// and text size.
    pub size: f32,
    /// 0.0 (soft airbrush) ..= 1.0 (hard edge). Softening kicks in below 0.9.
    pub hardness: f32,
    /// Stamp spacing as a fraction of `size`.
    pub spacing: f32,
    /// Per-stamp random offset as a fraction of `size` (0 = none).
    pub jitter: f32,
    /// Seed mixed into the jitter hash.
    pub jitter_seed: u32,
    pub font_family: String,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            size: 5.0,
            hardness: 0.8,
            spacing: 0.2,
            jitter: 0.0,
            jitter_seed: 0,
            font_family: "Arial".to_string(),
        }
    }
}

impl ToolProperties {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            size: settings.brush_size,
            hardness: settings.hardness,
            spacing: settings.spacing,
            jitter: settings.jitter,
            jitter_seed: settings.jitter_seed,
            font_family: settings.font_family.clone(),
        }
    }

    /// Clamp every field into its usable range.
    pub fn sanitized(mut self) -> Self {
        self.size = self.size.clamp(1.0, 500.0);
        self.hardness = self.hardness.clamp(0.0, 1.0);
        self.spacing = self.spacing.clamp(0.01, 10.0);
        self.jitter = self.jitter.clamp(0.0, 1.0);
        self
    }

    /// Distance between stamps along a stroke.
    pub fn stamp_step(&self) -> f32 {
        (self.size * self.spacing).max(1.0)
    }

    /// Text tool font size in pixels.
    pub fn font_size(&self) -> f32 {
        (self.size * 4.0).max(12.0)
    }
}
