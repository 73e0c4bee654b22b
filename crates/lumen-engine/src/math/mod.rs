//! Rotation and transform conventions.
//!
//! Vector and matrix primitives come from `glam`. This module only pins down how Euler angles
//! and object transforms are composed so every consumer agrees on one convention.

mod euler;
mod transform;

pub use euler::Euler;
pub use transform::Transform;
