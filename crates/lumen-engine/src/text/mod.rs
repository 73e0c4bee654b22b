//! Font loading and text rasterization.
//!
//! Text objects are drawn as textured quads; this module turns a string into the RGBA bitmap
//! the loader uploads.

mod font_system;

pub use font_system::{FontId, FontLoadError, FontSystem, TextAlign};
