//! Shader selection and per-draw uniform binding.
//!
//! The program set is closed. Selection is a pure function of the object variant; texture
//! presence only toggles a flag inside the chosen program.

mod frame;
mod program;
mod uniforms;

pub use frame::{FrameState, FrameUniforms};
pub use program::{casts_shadow, select_shader, ShaderProgram};
pub use uniforms::{bind_uniforms, flags, DrawUniforms};
