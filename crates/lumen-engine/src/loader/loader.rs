use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuHandle};
use crate::error::{BackendError, Reference, RenderError};

use super::descriptor::{Descriptor, ImageData, MeshData, ResourceKind};

/// Upload state of a loader entry.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LoadStatus {
    Queued,
    Uploading,
    Resident,
    /// Permanent. The entry never becomes resident.
    Failed(BackendError),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry #{}", self.0)
    }
}

/// Counters returned by [`ResourceLoader::process_uploads`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct UploadStats {
    pub uploaded: usize,
    pub failed: usize,
    /// Queued uploads dropped because every requester released them first.
    pub skipped: usize,
    pub freed: usize,
}

struct Entry {
    key: Arc<Descriptor>,
    use_count: usize,
    status: LoadStatus,
    gpu: Option<GpuHandle>,
}

#[derive(Default)]
struct LoaderState {
    entries: HashMap<EntryId, Entry>,
    by_key: HashMap<Arc<Descriptor>, EntryId>,
    queue: VecDeque<EntryId>,
    /// GPU handles whose entry died; freed on the owning thread.
    orphaned: Vec<GpuHandle>,
    next_entry: u64,
}

struct Shared {
    owner: ThreadId,
    state: Mutex<LoaderState>,
}

/// Deduplicating, reference-counted GPU resource loader.
///
/// `request` and handle drops may happen on any thread. Uploads and frees only ever run on the
/// thread that created the loader, inside [`process_uploads`](Self::process_uploads).
#[derive(Clone)]
pub struct ResourceLoader {
    shared: Arc<Shared>,
}

impl ResourceLoader {
    /// Creates a loader owned by the calling thread.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                owner: thread::current().id(),
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }

    pub fn owner_thread(&self) -> ThreadId {
        self.shared.owner
    }

    /// Registers interest in `descriptor`.
    ///
    /// Content-equal descriptors share one entry; the returned handle may still be pending.
    pub fn request(&self, descriptor: impl Into<Arc<Descriptor>>) -> ResourceHandle {
        let descriptor = descriptor.into();
        let mut state = self.shared.state.lock();

        if let Some(&id) = state.by_key.get(&*descriptor) {
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.use_count += 1;
                log::trace!("{id} shared, use count {}", entry.use_count);
                return ResourceHandle {
                    shared: Arc::clone(&self.shared),
                    entry: id,
                    key: Arc::clone(&entry.key),
                };
            }
        }

        let id = EntryId(state.next_entry);
        state.next_entry += 1;
        state.entries.insert(
            id,
            Entry {
                key: Arc::clone(&descriptor),
                use_count: 1,
                status: LoadStatus::Queued,
                gpu: None,
            },
        );
        state.by_key.insert(Arc::clone(&descriptor), id);
        state.queue.push_back(id);
        log::debug!("{id} queued ({:?})", descriptor.kind());

        ResourceHandle {
            shared: Arc::clone(&self.shared),
            entry: id,
            key: descriptor,
        }
    }

    pub fn request_mesh(&self, mesh: MeshData) -> ResourceHandle {
        self.request(Descriptor::Mesh(mesh))
    }

    pub fn request_texture(&self, image: ImageData) -> ResourceHandle {
        self.request(Descriptor::Texture(image))
    }

    /// Gives up one reference. Equivalent to dropping the handle.
    pub fn release(&self, handle: ResourceHandle) {
        drop(handle);
    }

    /// True when `handle` was issued by this loader.
    pub fn owns(&self, handle: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.shared, &handle.shared)
    }

    pub fn is_same(&self, other: &ResourceLoader) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn is_resident(&self, handle: &ResourceHandle) -> bool {
        self.owns(handle) && handle.is_resident()
    }

    pub fn get(&self, handle: &ResourceHandle) -> Result<GpuHandle, RenderError> {
        if !self.owns(handle) {
            return Err(RenderError::InvalidReference(Reference::Resource));
        }
        handle.get()
    }

    /// Number of live entries (distinct descriptors with at least one requester).
    pub fn entry_count(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Number of uploads waiting for the owning thread.
    pub fn queued_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Frees orphaned GPU handles, then runs every upload queued before this call in FIFO order.
    ///
    /// The lock is not held while the backend works, so other threads can keep requesting.
    pub fn process_uploads(
        &self,
        backend: &mut dyn GpuBackend,
    ) -> Result<UploadStats, RenderError> {
        self.process_uploads_limited(backend, usize::MAX)
    }

    /// Like [`process_uploads`](Self::process_uploads) but runs at most `budget` uploads.
    /// Entries released before their upload are dropped without using the budget. The rest stay
    /// queued, in order, for the next call.
    pub fn process_uploads_limited(
        &self,
        backend: &mut dyn GpuBackend,
        budget: usize,
    ) -> Result<UploadStats, RenderError> {
        self.check_thread()?;

        let mut stats = UploadStats::default();

        let orphaned = std::mem::take(&mut self.shared.state.lock().orphaned);
        for handle in orphaned {
            backend.free(handle);
            stats.freed += 1;
        }

        let mut remaining = budget;
        while remaining > 0 {
            let (id, key) = {
                let mut state = self.shared.state.lock();
                let Some(id) = state.queue.pop_front() else { break };
                let Some(entry) = state.entries.get_mut(&id) else {
                    log::trace!("{id} released before upload; skipped");
                    stats.skipped += 1;
                    continue;
                };
                entry.status = LoadStatus::Uploading;
                (id, Arc::clone(&entry.key))
            };
            remaining -= 1;

            let result = match &*key {
                Descriptor::Mesh(mesh) => backend.upload_mesh(mesh),
                Descriptor::Texture(image) => backend.upload_texture(image),
            };

            let orphan = {
                let mut state = self.shared.state.lock();
                match state.entries.get_mut(&id) {
                    Some(entry) => {
                        match result {
                            Ok(gpu) => {
                                log::debug!("{id} resident as {gpu:?}");
                                entry.status = LoadStatus::Resident;
                                entry.gpu = Some(gpu);
                                stats.uploaded += 1;
                            }
                            Err(err) => {
                                log::warn!("{id} upload failed: {err}");
                                entry.status = LoadStatus::Failed(err);
                                stats.failed += 1;
                            }
                        }
                        None
                    }
                    // Released while the upload ran.
                    None => result.ok(),
                }
            };

            if let Some(gpu) = orphan {
                log::trace!("{id} finished after release; freeing {gpu:?}");
                backend.free(gpu);
                stats.freed += 1;
            }
        }

        Ok(stats)
    }

    /// Frees every GPU handle still tracked and fails the remaining entries.
    ///
    /// Used on context teardown so no GPU handle outlives its backend.
    pub(crate) fn evict_all(&self, backend: &mut dyn GpuBackend) -> Result<usize, RenderError> {
        self.check_thread()?;

        let handles: Vec<GpuHandle> = {
            let mut state = self.shared.state.lock();
            state.queue.clear();
            let mut handles = std::mem::take(&mut state.orphaned);
            for entry in state.entries.values_mut() {
                handles.extend(entry.gpu.take());
                entry.status = LoadStatus::Failed(BackendError::ContextDropped);
            }
            handles
        };

        let freed = handles.len();
        for handle in handles {
            backend.free(handle);
        }
        if freed > 0 {
            log::debug!("evicted {freed} gpu resource(s)");
        }
        Ok(freed)
    }

    fn check_thread(&self) -> Result<(), RenderError> {
        let actual = thread::current().id();
        if actual == self.shared.owner {
            Ok(())
        } else {
            Err(RenderError::WrongThread { owner: self.shared.owner, actual })
        }
    }
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("owner", &self.shared.owner)
            .field("entries", &self.entry_count())
            .finish()
    }
}

/// Counted reference to a loader entry.
///
/// Cloning adds a requester; dropping removes one. When the last handle goes the entry leaves
/// the table at once and its GPU handle is freed on the next upload pass.
pub struct ResourceHandle {
    shared: Arc<Shared>,
    entry: EntryId,
    key: Arc<Descriptor>,
}

impl ResourceHandle {
    pub fn entry(&self) -> EntryId {
        self.entry
    }

    pub fn kind(&self) -> ResourceKind {
        self.key.kind()
    }

    /// The descriptor this handle was requested with.
    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.key
    }

    pub fn status(&self) -> LoadStatus {
        self.shared
            .state
            .lock()
            .entries
            .get(&self.entry)
            .map(|e| e.status.clone())
            .unwrap_or(LoadStatus::Failed(BackendError::ContextDropped))
    }

    pub fn is_resident(&self) -> bool {
        self.status() == LoadStatus::Resident
    }

    /// Number of handles currently sharing this entry.
    pub fn use_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .entries
            .get(&self.entry)
            .map_or(0, |e| e.use_count)
    }

    pub fn get(&self) -> Result<GpuHandle, RenderError> {
        let state = self.shared.state.lock();
        let Some(entry) = state.entries.get(&self.entry) else {
            return Err(RenderError::InvalidReference(Reference::Resource));
        };
        match (&entry.status, entry.gpu) {
            (LoadStatus::Resident, Some(gpu)) => Ok(gpu),
            (LoadStatus::Failed(err), _) => Err(RenderError::ResourceLoadFailed(err.clone())),
            _ => Err(RenderError::NotReady),
        }
    }

    pub(crate) fn belongs_to(&self, loader: &ResourceLoader) -> bool {
        Arc::ptr_eq(&self.shared, &loader.shared)
    }
}

impl Clone for ResourceHandle {
    fn clone(&self) -> Self {
        let mut state = self.shared.state.lock();
        if let Some(entry) = state.entries.get_mut(&self.entry) {
            entry.use_count += 1;
        }
        Self {
            shared: Arc::clone(&self.shared),
            entry: self.entry,
            key: Arc::clone(&self.key),
        }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        let Some(entry) = state.entries.get_mut(&self.entry) else { return };

        entry.use_count = entry.use_count.saturating_sub(1);
        if entry.use_count > 0 {
            return;
        }

        let Some(entry) = state.entries.remove(&self.entry) else { return };
        if state.by_key.get(&entry.key) == Some(&self.entry) {
            state.by_key.remove(&entry.key);
        }
        if let Some(gpu) = entry.gpu {
            state.orphaned.push(gpu);
        }
        log::debug!("{} released ({:?})", self.entry, entry.status);
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("entry", &self.entry)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DrawCall, FrameGlobals, HeadlessBackend};
    use crate::loader::descriptor::ImageData;

    fn texture(seed: u8) -> Descriptor {
        Descriptor::Texture(ImageData::solid(2, 2, [seed, 0, 0, 255]))
    }

    /// Drops the last handle to an entry from inside its texture upload, while the loader has
    /// it marked as uploading.
    struct ReleaseDuringUpload {
        inner: HeadlessBackend,
        releasing: Option<ResourceHandle>,
    }

    impl GpuBackend for ReleaseDuringUpload {
        fn name(&self) -> &'static str {
            "release-during-upload"
        }

        fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle, BackendError> {
            self.inner.upload_mesh(mesh)
        }

        fn upload_texture(&mut self, image: &ImageData) -> Result<GpuHandle, BackendError> {
            let uploaded = self.inner.upload_texture(image);
            self.releasing.take();
            uploaded
        }

        fn free(&mut self, handle: GpuHandle) {
            self.inner.free(handle);
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.inner.resize(width, height);
        }

        fn begin_frame(&mut self, globals: &FrameGlobals) -> Result<bool, BackendError> {
            self.inner.begin_frame(globals)
        }

        fn draw(&mut self, call: &DrawCall) {
            self.inner.draw(call);
        }

        fn end_frame(&mut self) -> Result<(), BackendError> {
            self.inner.end_frame()
        }
    }

    #[test]
    fn request_is_pending_until_processed() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let handle = loader.request(texture(1));
        assert_eq!(handle.status(), LoadStatus::Queued);
        assert_eq!(handle.get(), Err(RenderError::NotReady));
        assert!(!loader.is_resident(&handle));

        let stats = loader.process_uploads(&mut backend).unwrap();
        assert_eq!(stats.uploaded, 1);
        assert!(loader.is_resident(&handle));
        assert!(loader.get(&handle).is_ok());
    }

    #[test]
    fn equal_descriptors_share_one_entry() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let a = loader.request(texture(7));
        let b = loader.request(texture(7));
        assert_eq!(a.entry(), b.entry());
        assert_eq!(a.use_count(), 2);
        assert_eq!(loader.entry_count(), 1);
        assert_eq!(loader.queued_count(), 1);

        loader.process_uploads(&mut backend).unwrap();
        assert_eq!(a.get().unwrap(), b.get().unwrap());
        assert_eq!(backend.log().upload_count(), 1);

        let c = a.clone();
        assert_eq!(c.use_count(), 3);
        drop(a);
        drop(c);
        assert_eq!(b.use_count(), 1);
        assert!(b.is_resident());
    }

    #[test]
    fn releasing_last_reference_frees_and_allows_fresh_entry() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();
        let log = backend.log();

        let first = loader.request(texture(3));
        loader.process_uploads(&mut backend).unwrap();
        let first_entry = first.entry();
        let first_gpu = first.get().unwrap();

        loader.release(first);
        assert_eq!(loader.entry_count(), 0);

        let stats = loader.process_uploads(&mut backend).unwrap();
        assert_eq!(stats.freed, 1);
        assert!(log.freed().contains(&first_gpu));

        let again = loader.request(texture(3));
        assert_ne!(again.entry(), first_entry);
        assert_eq!(again.status(), LoadStatus::Queued);
        assert_eq!(again.use_count(), 1);
    }

    #[test]
    fn uploads_run_in_request_order() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let handles: Vec<_> = (0..4).map(|i| loader.request(texture(i))).collect();
        loader.process_uploads(&mut backend).unwrap();

        let gpus: Vec<u64> = handles.iter().map(|h| h.get().unwrap().raw()).collect();
        let mut sorted = gpus.clone();
        sorted.sort_unstable();
        assert_eq!(gpus, sorted);
    }

    #[test]
    fn orphaned_queued_upload_is_skipped() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        drop(loader.request(texture(9)));
        let stats = loader.process_uploads(&mut backend).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.uploaded, 0);
        assert_eq!(backend.log().upload_count(), 0);
    }

    #[test]
    fn release_during_upload_frees_on_completion() {
        let loader = ResourceLoader::new();
        let handle = loader.request(texture(4));
        let mut backend = ReleaseDuringUpload {
            inner: HeadlessBackend::new(),
            releasing: Some(handle),
        };
        let log = backend.inner.log();

        let stats = loader.process_uploads(&mut backend).unwrap();
        assert_eq!(stats.uploaded, 0);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.freed, 1);
        assert_eq!(log.upload_count(), 1);
        assert_eq!(log.live_count(), 0);
        assert_eq!(loader.entry_count(), 0);

        // Nothing is left over for the next drain.
        let stats = loader.process_uploads(&mut backend).unwrap();
        assert_eq!(stats, UploadStats::default());
    }

    #[test]
    fn failed_upload_is_permanent() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let bad = loader.request(Descriptor::Texture(ImageData::new(4, 4, 4, vec![0; 3])));
        let stats = loader.process_uploads(&mut backend).unwrap();
        assert_eq!(stats.failed, 1);
        assert!(matches!(bad.get(), Err(RenderError::ResourceLoadFailed(_))));

        // A later requester of the same content sees the same failure without a retry.
        let again = loader.request(Descriptor::Texture(ImageData::new(4, 4, 4, vec![0; 3])));
        assert_eq!(again.entry(), bad.entry());
        assert_eq!(loader.queued_count(), 0);
        assert!(matches!(again.status(), LoadStatus::Failed(_)));
    }

    #[test]
    fn uploads_are_owner_thread_only() {
        let loader = ResourceLoader::new();
        let remote = loader.clone();

        let result = std::thread::spawn(move || {
            // Requests are fine from any thread.
            let handle = remote.request(texture(5));
            let mut backend = HeadlessBackend::new();
            let upload = remote.process_uploads(&mut backend);
            (handle.use_count(), upload)
        })
        .join()
        .unwrap();

        assert_eq!(result.0, 1);
        assert!(matches!(result.1, Err(RenderError::WrongThread { .. })));
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let a = ResourceLoader::new();
        let b = ResourceLoader::new();
        let handle = a.request(texture(1));
        assert!(!b.owns(&handle));
        assert_eq!(
            b.get(&handle),
            Err(RenderError::InvalidReference(Reference::Resource))
        );
    }

    #[test]
    fn evict_all_frees_resident_entries() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let kept = loader.request(texture(2));
        loader.process_uploads(&mut backend).unwrap();
        assert_eq!(loader.evict_all(&mut backend).unwrap(), 1);
        assert_eq!(backend.log().live_count(), 0);
        assert_eq!(
            kept.get(),
            Err(RenderError::ResourceLoadFailed(BackendError::ContextDropped))
        );
    }

    #[test]
    fn budget_leaves_the_rest_queued_in_order() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let a = loader.request(texture(1));
        let b = loader.request(texture(2));
        let c = loader.request(texture(3));

        let stats = loader.process_uploads_limited(&mut backend, 2).unwrap();
        assert_eq!(stats.uploaded, 2);
        assert!(a.is_resident() && b.is_resident());
        assert_eq!(c.status(), LoadStatus::Queued);
        assert_eq!(loader.queued_count(), 1);

        loader.process_uploads_limited(&mut backend, 2).unwrap();
        assert!(c.is_resident());
    }

    #[test]
    fn released_entries_do_not_use_the_budget() {
        let loader = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        drop(loader.request(texture(1)));
        drop(loader.request(texture(2)));
        let kept = loader.request(texture(3));

        let stats = loader.process_uploads_limited(&mut backend, 1).unwrap();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.uploaded, 1);
        assert!(kept.is_resident());
        assert_eq!(loader.queued_count(), 0);
    }
}
