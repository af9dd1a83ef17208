#![allow(clippy::too_many_arguments)]

//! AintPro canvas engine: a single-surface raster editor with freehand
//! strokes, shape previews, flood fill, text placement, canvas transforms
//! and snapshot undo/redo.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

pub use canvas::PixelSurface;
pub use error::{CanvasError, Result};
pub use io::{SaveFormat, Snapshot};
pub use session::{EditorSession, GestureOutcome, PointerEvent};
pub use settings::EngineSettings;
