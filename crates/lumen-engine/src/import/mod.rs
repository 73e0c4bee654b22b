//! File importers producing loader descriptors.
//!
//! Importers run on any thread. Their output is plain CPU data; nothing touches the GPU until
//! the resulting descriptor is requested from a loader.

mod image;
mod obj;

pub use self::image::{decode_image, load_image};
pub use obj::{load_obj, parse_obj, NormalMode};
