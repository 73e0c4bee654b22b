//! Scene model: objects, materials, camera and light.
//!
//! Responsibilities:
//! - closed set of object variants sharing one common capability (`Object`)
//! - deterministic 2D ordering (layer, then id)
//! - camera and light state consumed once per frame by the render pass

mod align;
mod camera;
mod id;
mod key;
mod light;
mod material;
mod object;
mod z_index;

pub mod geometry;

pub use align::Alignment;
pub use camera::{Camera, CameraMatrices, Projection, Ray};
pub use id::{MaterialId, ObjectId};
pub use key::SortKey;
pub use light::DirectionalLight;
pub use material::Material;
pub use object::{
    Line3D, Object, Object2D, Object3D, ObjectKind, Particle3D, Shape2D, Shape3D, Surface,
};
pub use z_index::ZIndex;
