//! Color model shared by objects, materials and lights.
//!
//! Colors are linear premultiplied RGBA, matching the blend state used by the 2D and particle
//! pipelines.

mod color;

pub use color::Color;
