//! GPU resource loader.
//!
//! Resources are requested by content: equal descriptors share one entry, counted by the
//! handles that reference it. Requests never block. Uploads are queued and executed later on
//! the owning thread, in request order.

mod descriptor;
#[allow(clippy::module_inception)]
mod loader;

pub use descriptor::{Descriptor, ImageData, MeshData, ResourceKind, Sampling, Topology};
pub use loader::{EntryId, LoadStatus, ResourceHandle, ResourceLoader, UploadStats};
