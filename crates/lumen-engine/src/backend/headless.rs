use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BackendError;
use crate::loader::{ImageData, MeshData, ResourceKind};
use crate::scene::ObjectId;
use crate::shader::ShaderProgram;

use super::{DrawCall, FrameGlobals, GpuBackend, GpuHandle};

/// Everything submitted during one frame.
#[derive(Debug, Clone)]
pub struct HeadlessFrame {
    pub globals: FrameGlobals,
    pub draws: Vec<DrawCall>,
}

impl HeadlessFrame {
    /// Objects in draw order, shadow-map draws excluded.
    pub fn objects(&self) -> Vec<ObjectId> {
        self.draws
            .iter()
            .filter(|d| d.program != ShaderProgram::ShadowMap)
            .map(|d| d.object)
            .collect()
    }

    pub fn programs(&self) -> Vec<ShaderProgram> {
        self.draws.iter().map(|d| d.program).collect()
    }

    pub fn shadow_draws(&self) -> usize {
        self.draws.iter().filter(|d| d.program == ShaderProgram::ShadowMap).count()
    }
}

#[derive(Debug, Default)]
struct LogState {
    uploads: Vec<(GpuHandle, ResourceKind)>,
    freed: Vec<GpuHandle>,
    live: BTreeSet<GpuHandle>,
    frames: Vec<HeadlessFrame>,
    size: (u32, u32),
}

/// Shared view of what a [`HeadlessBackend`] received.
///
/// Cloning is cheap; clones observe the same log, so a test can keep one after handing the
/// backend to a context.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLog {
    state: Arc<Mutex<LogState>>,
}

impl HeadlessLog {
    pub fn upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    pub fn uploads_of(&self, kind: ResourceKind) -> usize {
        self.state.lock().uploads.iter().filter(|(_, k)| *k == kind).count()
    }

    pub fn freed(&self) -> Vec<GpuHandle> {
        self.state.lock().freed.clone()
    }

    /// Handles uploaded and not yet freed.
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.state.lock().live.contains(&handle)
    }

    /// Completed frames.
    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn last_frame(&self) -> Option<HeadlessFrame> {
        self.state.lock().frames.last().cloned()
    }

    pub fn size(&self) -> (u32, u32) {
        self.state.lock().size
    }
}

/// Backend that validates and records calls without touching a GPU.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    log: HeadlessLog,
    next_handle: u64,
    current: Option<HeadlessFrame>,
    fail_uploads: bool,
    skip_frames: u32,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> HeadlessLog {
        self.log.clone()
    }

    /// Makes every following upload fail as if the device rejected it.
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    /// The next `count` calls to `begin_frame` report a busy surface.
    pub fn skip_frames(&mut self, count: u32) {
        self.skip_frames = count;
    }

    fn allocate(&mut self, kind: ResourceKind) -> Result<GpuHandle, BackendError> {
        if self.fail_uploads {
            return Err(BackendError::OutOfMemory);
        }
        self.next_handle += 1;
        let handle = GpuHandle::from_raw(self.next_handle);

        let mut state = self.log.state.lock();
        state.uploads.push((handle, kind));
        state.live.insert(handle);
        log::trace!("headless: {kind:?} uploaded as {handle:?}");
        Ok(handle)
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle, BackendError> {
        mesh.validate()?;
        self.allocate(ResourceKind::Mesh)
    }

    fn upload_texture(&mut self, image: &ImageData) -> Result<GpuHandle, BackendError> {
        image.validate()?;
        self.allocate(ResourceKind::Texture)
    }

    fn free(&mut self, handle: GpuHandle) {
        let mut state = self.log.state.lock();
        if state.live.remove(&handle) {
            state.freed.push(handle);
        } else {
            log::warn!("headless: free of unknown {handle:?}");
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.state.lock().size = (width, height);
    }

    fn begin_frame(&mut self, globals: &FrameGlobals) -> Result<bool, BackendError> {
        if self.skip_frames > 0 {
            self.skip_frames -= 1;
            return Ok(false);
        }
        self.current = Some(HeadlessFrame { globals: *globals, draws: Vec::new() });
        Ok(true)
    }

    fn draw(&mut self, call: &DrawCall) {
        let Some(frame) = self.current.as_mut() else {
            log::warn!("headless: draw outside a frame ignored");
            return;
        };
        frame.draws.push(*call);
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        if let Some(frame) = self.current.take() {
            self.log.state.lock().frames.push(frame);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_tracked_until_freed() {
        let mut backend = HeadlessBackend::new();
        let log = backend.log();

        let a = backend.upload_texture(&ImageData::solid(1, 1, [0; 4])).unwrap();
        let b = backend.upload_texture(&ImageData::solid(1, 1, [1; 4])).unwrap();
        assert!(a.raw() < b.raw());
        assert_eq!(log.live_count(), 2);

        backend.free(a);
        backend.free(a);
        assert_eq!(log.freed(), vec![a]);
        assert!(log.is_live(b));
    }

    #[test]
    fn invalid_input_and_injected_failures() {
        let mut backend = HeadlessBackend::new();
        assert!(matches!(
            backend.upload_mesh(&MeshData::default()),
            Err(BackendError::InvalidMesh(_))
        ));

        backend.set_fail_uploads(true);
        assert!(backend.upload_texture(&ImageData::solid(1, 1, [0; 4])).is_err());
        assert_eq!(backend.log().upload_count(), 0);
    }
}
