//! Retouch: a single-document raster image editing engine.
//!
//! [`editor::Editor`] owns the open document and applies geometry, tone,
//! catalog effects, strokes, text stamps and crops with bounded undo/redo.
//! The pixel operations themselves live in [`ops`] and work on plain
//! [`buffer::PixelBuffer`]s.

#[macro_use]
pub mod logger;

pub mod buffer;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod settings;

pub use buffer::PixelBuffer;
pub use editor::Editor;
pub use error::{EditorError, Result};
