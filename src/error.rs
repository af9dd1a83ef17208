use thiserror::Error;

/// Errors surfaced by the canvas engine.
///
/// Undo/redo at the ends of history, no-op fills and empty text commits are
/// not errors; those report `false` instead.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid crop rectangle {x},{y} {width}x{height} for a {canvas_width}x{canvas_height} canvas")]
    InvalidCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error("Invalid canvas dimensions {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("No usable font for family '{0}'")]
    FontUnavailable(String),

    #[error("Invalid color '{0}'")]
    InvalidColor(String),

    #[error("Invalid operation '{0}'")]
    InvalidOp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CanvasError>;
