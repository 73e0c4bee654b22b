//! The rendering context: object and material registries, input callbacks and the render pass.

use std::collections::{BTreeMap, HashSet};
use std::thread;

use glam::Vec2;

use crate::backend::{DrawCall, FrameGlobals, GpuBackend, GpuHandle};
use crate::config::ContextConfig;
use crate::error::{Reference, RenderError};
use crate::input::{InputEvent, InputState, KeyEvent, PointerButtonEvent, WheelEvent};
use crate::loader::{ResourceHandle, ResourceLoader, UploadStats};
use crate::paint::Color;
use crate::scene::{Camera, DirectionalLight, Material, MaterialId, Object, ObjectId, SortKey};
use crate::shader::{bind_uniforms, casts_shadow, select_shader, FrameState, ShaderProgram};
use crate::time::{FrameClock, FrameTime};

/// Outcome of one [`Context::render_frame`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Main-pass draws issued.
    pub draw_calls: usize,
    pub shadow_draws: usize,
    /// Visible objects left out because a resource is not resident yet.
    pub skipped_pending: usize,
    /// The backend had no surface to draw into; nothing was issued.
    pub skipped_frame: bool,
    /// Objects drawn with a placeholder or left out after a failed upload.
    pub degraded: Vec<(ObjectId, RenderError)>,
    pub uploads: UploadStats,
}

type Handler<'w, A> = Option<Box<dyn FnMut(&mut Context<'w>, A) + 'w>>;

/// One replaceable handler per event kind.
struct Callbacks<'w> {
    mouse_move: Handler<'w, Vec2>,
    mouse_press: Handler<'w, PointerButtonEvent>,
    mouse_release: Handler<'w, PointerButtonEvent>,
    mouse_wheel: Handler<'w, WheelEvent>,
    mouse_entry: Handler<'w, bool>,
    key_press: Handler<'w, KeyEvent>,
    key_release: Handler<'w, KeyEvent>,
    resize: Handler<'w, (u32, u32)>,
}

impl Default for Callbacks<'_> {
    fn default() -> Self {
        Self {
            mouse_move: None,
            mouse_press: None,
            mouse_release: None,
            mouse_wheel: None,
            mouse_entry: None,
            key_press: None,
            key_release: None,
            resize: None,
        }
    }
}

/// What the render pass learned about one resource slot.
enum Residency {
    Ready(GpuHandle),
    Pending,
    Failed(RenderError),
}

fn residency(handle: &ResourceHandle) -> Residency {
    match handle.get() {
        Ok(gpu) => Residency::Ready(gpu),
        Err(RenderError::NotReady) => Residency::Pending,
        Err(err) => Residency::Failed(err),
    }
}

/// What one object can draw with this frame, decided once for every pass.
enum Drawable {
    Ready {
        mesh: GpuHandle,
        texture: Option<GpuHandle>,
        /// Texture failure; the object draws untextured.
        degraded: Option<RenderError>,
    },
    /// Some resource is not resident yet.
    Pending,
    /// The mesh failed; nothing can be drawn.
    Broken(RenderError),
}

fn resolve(object: &Object, material: Option<&Material>) -> Drawable {
    let texture = object.texture().or_else(|| material.and_then(Material::texture));
    let texture = texture.map(residency);

    let mesh = match residency(object.mesh()) {
        Residency::Ready(mesh) => mesh,
        Residency::Failed(err) => return Drawable::Broken(err),
        Residency::Pending => return Drawable::Pending,
    };
    match texture {
        None => Drawable::Ready { mesh, texture: None, degraded: None },
        Some(Residency::Ready(gpu)) => Drawable::Ready { mesh, texture: Some(gpu), degraded: None },
        Some(Residency::Pending) => Drawable::Pending,
        Some(Residency::Failed(err)) => Drawable::Ready { mesh, texture: None, degraded: Some(err) },
    }
}

/// Owner of one scene and the backend it renders with.
///
/// The context is bound to the thread that created it. Uploads, frees and draws all happen there;
/// other threads may only request resources through a cloned [`ResourceLoader`].
pub struct Context<'w> {
    config: ContextConfig,
    backend: Box<dyn GpuBackend + 'w>,
    loader: ResourceLoader,

    objects: BTreeMap<ObjectId, Object>,
    next_object: u64,
    materials: BTreeMap<MaterialId, Material>,
    next_material: u64,

    camera: Camera,
    light: DirectionalLight,
    size: (u32, u32),
    scale_factor: f64,

    clock: FrameClock,
    last_frame: Option<FrameTime>,
    input: InputState,
    callbacks: Callbacks<'w>,

    /// Objects already reported as degraded, so the warning is logged once.
    warned: HashSet<ObjectId>,
}

impl<'w> Context<'w> {
    /// Creates a context owned by the calling thread.
    pub fn new(backend: impl GpuBackend + 'w, config: ContextConfig) -> Self {
        let backend: Box<dyn GpuBackend + 'w> = Box::new(backend);
        log::info!("context created with {} backend", backend.name());

        Self {
            camera: Camera::new(config.projection),
            light: config.light,
            config,
            backend,
            loader: ResourceLoader::new(),
            objects: BTreeMap::new(),
            next_object: 1,
            materials: BTreeMap::new(),
            next_material: 1,
            size: (0, 0),
            scale_factor: 1.0,
            clock: FrameClock::new(),
            last_frame: None,
            input: InputState::default(),
            callbacks: Callbacks::default(),
            warned: HashSet::new(),
        }
    }

    fn check_thread(&self) -> Result<(), RenderError> {
        let owner = self.loader.owner_thread();
        let actual = thread::current().id();
        if owner == actual {
            Ok(())
        } else {
            Err(RenderError::WrongThread { owner, actual })
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    /// Loader objects and materials must be built against.
    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn light(&self) -> &DirectionalLight {
        &self.light
    }

    pub fn set_light(&mut self, light: DirectionalLight) {
        self.light = light;
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.config.clear_color = color;
    }

    pub fn set_shadows(&mut self, enabled: bool) {
        self.config.shadows = enabled;
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Smoothed frames per second.
    pub fn fps(&self) -> f32 {
        self.clock.fps()
    }

    /// Timing of the most recent frame.
    pub fn frame_time(&self) -> Option<FrameTime> {
        self.last_frame
    }

    /// Physical size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Size in logical pixels, the unit of 2D objects and pointer positions.
    pub fn logical_size(&self) -> Vec2 {
        Vec2::new(self.size.0 as f32, self.size.1 as f32) / self.scale_factor.max(f64::EPSILON) as f32
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    // ── objects ───────────────────────────────────────────────────────────

    /// Registers `object` and returns its id.
    ///
    /// The object must come from this context's loader and may only reference live materials.
    pub fn add_object(&mut self, mut object: Object) -> Result<ObjectId, RenderError> {
        self.check_thread()?;

        if !object.loader().is_same(&self.loader) {
            return Err(RenderError::ForeignObject);
        }
        if let Some(material) = object.material() {
            if !self.materials.contains_key(&material) {
                return Err(RenderError::InvalidReference(Reference::Material(material)));
            }
        }

        let id = ObjectId(self.next_object);
        self.next_object += 1;
        object.assign_id(id);
        self.objects.insert(id, object);
        log::debug!("{id} added");
        Ok(id)
    }

    /// Unregisters an object and releases every resource it held.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), RenderError> {
        self.check_thread()?;
        let object = self
            .objects
            .remove(&id)
            .ok_or(RenderError::InvalidReference(Reference::Object(id)))?;
        self.warned.remove(&id);
        drop(object);
        log::debug!("{id} removed");
        Ok(())
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Changes made through the returned reference apply from the next frame on.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    /// Attaches or detaches a material. Only 3D shapes carry materials.
    pub fn assign_material(
        &mut self,
        id: ObjectId,
        material: Option<MaterialId>,
    ) -> Result<(), RenderError> {
        if let Some(material) = material {
            if !self.materials.contains_key(&material) {
                return Err(RenderError::InvalidReference(Reference::Material(material)));
            }
        }
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(RenderError::InvalidReference(Reference::Object(id)))?;
        if !object.set_material(material) {
            log::debug!("{id} cannot carry a material; ignored");
        }
        Ok(())
    }

    // ── materials ─────────────────────────────────────────────────────────

    pub fn add_material(&mut self, material: Material) -> Result<MaterialId, RenderError> {
        self.check_thread()?;
        if let Some(texture) = material.texture() {
            if !texture.belongs_to(&self.loader) {
                return Err(RenderError::ForeignObject);
            }
        }

        let id = MaterialId(self.next_material);
        self.next_material += 1;
        log::debug!("{id} added ({})", material.name);
        self.materials.insert(id, material);
        Ok(id)
    }

    /// Removes a material no object refers to any more.
    pub fn remove_material(&mut self, id: MaterialId) -> Result<(), RenderError> {
        self.check_thread()?;
        if !self.materials.contains_key(&id) {
            return Err(RenderError::InvalidReference(Reference::Material(id)));
        }

        let count = self.objects.values().filter(|o| o.material() == Some(id)).count();
        if count > 0 {
            return Err(RenderError::DanglingMaterialReference { material: id, count });
        }

        self.materials.remove(&id);
        log::debug!("{id} removed");
        Ok(())
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    // ── size ──────────────────────────────────────────────────────────────

    /// Resizes the drawable area (physical pixels) and fires the resize handler.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.size == (width, height) {
            return;
        }
        self.size = (width, height);
        self.backend.resize(width, height);
        if width > 0 && height > 0 {
            self.camera.set_aspect(width as f32 / height as f32);
        }
        self.fire(|c| &mut c.resize, (width, height));
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if scale_factor > 0.0 {
            self.scale_factor = scale_factor;
        }
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Runs queued uploads and pending frees now instead of at the next frame.
    pub fn process_uploads(&mut self) -> Result<UploadStats, RenderError> {
        self.loader.process_uploads(self.backend.as_mut())
    }

    /// Draws every visible, resident object once.
    ///
    /// Per-object failures end up in the report; only context-level errors are returned.
    pub fn render_frame(&mut self) -> Result<FrameReport, RenderError> {
        self.check_thread()?;

        let budget = self.config.upload_budget.unwrap_or(usize::MAX);
        let mut report = FrameReport {
            uploads: self.loader.process_uploads_limited(self.backend.as_mut(), budget)?,
            ..FrameReport::default()
        };

        self.last_frame = Some(self.clock.tick());

        let camera = self.camera.matrices();
        let frame = FrameState::new(
            camera,
            self.logical_size(),
            &self.light,
            self.config.shadows,
            self.config.shadow_extent,
        );
        let globals = FrameGlobals {
            uniforms: frame.uniforms(&self.light),
            clear_color: self.config.clear_color,
            shadows: self.config.shadows,
        };

        if !self.backend.begin_frame(&globals)? {
            log::trace!("frame skipped by {} backend", self.backend.name());
            report.skipped_frame = true;
            return Ok(report);
        }

        let mut world = Vec::new();
        let mut screen = Vec::new();
        for (id, object) in &self.objects {
            if object.is_hidden() {
                continue;
            }
            let material = object.material().and_then(|m| self.materials.get(&m));
            let drawable = resolve(object, material);
            match object.as_2d() {
                Some(o) => screen.push((SortKey::new(o.z_order, *id), object, material, drawable)),
                None => world.push((*id, object, material, drawable)),
            }
        }
        screen.sort_by_key(|(key, ..)| *key);

        if self.config.shadows {
            for (id, object, material, drawable) in &world {
                let Drawable::Ready { mesh, .. } = drawable else { continue };
                if !casts_shadow(object) {
                    continue;
                }
                self.backend.draw(&DrawCall {
                    object: *id,
                    program: ShaderProgram::ShadowMap,
                    mesh: *mesh,
                    texture: None,
                    uniforms: bind_uniforms(
                        ShaderProgram::ShadowMap,
                        object,
                        *material,
                        &frame,
                        false,
                    ),
                });
                report.shadow_draws += 1;
            }
        }

        let screen = screen
            .into_iter()
            .map(|(key, object, material, drawable)| (key.id, object, material, drawable));
        for (id, object, material, drawable) in world.into_iter().chain(screen) {
            let (mesh, texture) = match drawable {
                Drawable::Ready { mesh, texture, degraded } => {
                    if let Some(err) = degraded {
                        if self.warned.insert(id) {
                            log::warn!("{id} drawn without its texture: {err}");
                        }
                        report.degraded.push((id, err));
                    }
                    (mesh, texture)
                }
                Drawable::Pending => {
                    report.skipped_pending += 1;
                    continue;
                }
                Drawable::Broken(err) => {
                    if self.warned.insert(id) {
                        log::warn!("{id} has no usable mesh and is not drawn: {err}");
                    }
                    report.degraded.push((id, err));
                    continue;
                }
            };

            let program = select_shader(object);
            self.backend.draw(&DrawCall {
                object: id,
                program,
                mesh,
                texture,
                uniforms: bind_uniforms(program, object, material, &frame, texture.is_some()),
            });
            report.draw_calls += 1;
        }

        self.backend.end_frame()?;
        Ok(report)
    }

    /// Releases every object, material and GPU resource.
    ///
    /// Dropping the context does the same; this form makes the point explicit.
    pub fn teardown(self) {
        drop(self);
    }

    fn release_all(&mut self) {
        let objects = std::mem::take(&mut self.objects);
        let materials = std::mem::take(&mut self.materials);
        log::debug!(
            "tearing down context: {} object(s), {} material(s)",
            objects.len(),
            materials.len()
        );
        drop(objects);
        drop(materials);

        if let Err(err) = self.loader.evict_all(self.backend.as_mut()) {
            log::error!("context teardown failed: {err}");
        }
    }

    // ── input ─────────────────────────────────────────────────────────────

    /// Updates the input state and fires the matching handler, if any.
    pub fn dispatch_input(&mut self, event: &InputEvent) {
        self.input.apply(event);
        match *event {
            InputEvent::PointerMoved(p) => self.fire(|c| &mut c.mouse_move, p),
            InputEvent::PointerPressed(b) => self.fire(|c| &mut c.mouse_press, b),
            InputEvent::PointerReleased(b) => self.fire(|c| &mut c.mouse_release, b),
            InputEvent::Wheel(w) => self.fire(|c| &mut c.mouse_wheel, w),
            InputEvent::PointerEntry(entered) => self.fire(|c| &mut c.mouse_entry, entered),
            InputEvent::KeyPressed(k) => self.fire(|c| &mut c.key_press, k),
            InputEvent::KeyReleased(k) => self.fire(|c| &mut c.key_release, k),
            InputEvent::ModifiersChanged(_) | InputEvent::Focused(_) => {}
        }
    }

    /// Runs the handler in `slot` with the context borrowed mutably.
    ///
    /// A handler that installs a replacement for itself while running is not restored.
    fn fire<A>(
        &mut self,
        slot: for<'a> fn(&'a mut Callbacks<'w>) -> &'a mut Handler<'w, A>,
        arg: A,
    ) {
        let Some(mut handler) = slot(&mut self.callbacks).take() else { return };
        handler(self, arg);
        let current = slot(&mut self.callbacks);
        if current.is_none() {
            *current = Some(handler);
        }
    }

    pub fn on_mouse_move(&mut self, f: impl FnMut(&mut Context<'w>, Vec2) + 'w) {
        self.callbacks.mouse_move = Some(Box::new(f));
    }

    pub fn on_mouse_press(&mut self, f: impl FnMut(&mut Context<'w>, PointerButtonEvent) + 'w) {
        self.callbacks.mouse_press = Some(Box::new(f));
    }

    pub fn on_mouse_release(&mut self, f: impl FnMut(&mut Context<'w>, PointerButtonEvent) + 'w) {
        self.callbacks.mouse_release = Some(Box::new(f));
    }

    pub fn on_mouse_wheel(&mut self, f: impl FnMut(&mut Context<'w>, WheelEvent) + 'w) {
        self.callbacks.mouse_wheel = Some(Box::new(f));
    }

    /// `true` when the pointer enters the window, `false` when it leaves.
    pub fn on_mouse_entry(&mut self, f: impl FnMut(&mut Context<'w>, bool) + 'w) {
        self.callbacks.mouse_entry = Some(Box::new(f));
    }

    pub fn on_key_press(&mut self, f: impl FnMut(&mut Context<'w>, KeyEvent) + 'w) {
        self.callbacks.key_press = Some(Box::new(f));
    }

    pub fn on_key_release(&mut self, f: impl FnMut(&mut Context<'w>, KeyEvent) + 'w) {
        self.callbacks.key_release = Some(Box::new(f));
    }

    /// Receives the new physical size.
    pub fn on_resize(&mut self, f: impl FnMut(&mut Context<'w>, (u32, u32)) + 'w) {
        self.callbacks.resize = Some(Box::new(f));
    }

    /// Removes every installed handler.
    pub fn clear_handlers(&mut self) {
        self.callbacks = Callbacks::default();
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::backend::HeadlessBackend;
    use crate::input::{Key, Modifiers};

    fn key(key: Key) -> KeyEvent {
        KeyEvent { key, modifiers: Modifiers::default(), code: 0, repeat: false }
    }

    #[test]
    fn ids_increase_and_are_never_reused() {
        let mut ctx = Context::new(HeadlessBackend::new(), ContextConfig::default());
        let a = ctx.add_object(Object::sphere(ctx.loader(), 1.0)).unwrap();
        ctx.remove_object(a).unwrap();
        let b = ctx.add_object(Object::sphere(ctx.loader(), 1.0)).unwrap();
        assert!(b > a);
        assert_eq!(ctx.object(b).and_then(Object::id), Some(b));
        assert_eq!(
            ctx.remove_object(a),
            Err(RenderError::InvalidReference(Reference::Object(a)))
        );
    }

    #[test]
    fn foreign_objects_are_rejected() {
        let mut ctx = Context::new(HeadlessBackend::new(), ContextConfig::default());
        let other = ResourceLoader::new();
        assert_eq!(
            ctx.add_object(Object::cuboid(&other, 1.0, 1.0, 1.0)),
            Err(RenderError::ForeignObject)
        );
        assert_eq!(ctx.object_count(), 0);
    }

    #[test]
    fn unknown_material_is_an_invalid_reference() {
        let mut ctx = Context::new(HeadlessBackend::new(), ContextConfig::default());
        let m = ctx.add_material(Material::new("steel")).unwrap();
        ctx.remove_material(m).unwrap();

        let object = Object::sphere(ctx.loader(), 1.0).with_material(m);
        assert_eq!(
            ctx.add_object(object),
            Err(RenderError::InvalidReference(Reference::Material(m)))
        );
    }

    #[test]
    fn resize_updates_aspect_and_fires_handler() {
        let mut ctx = Context::new(HeadlessBackend::new(), ContextConfig::default());
        let seen = Rc::new(Cell::new((0, 0)));
        let sink = Rc::clone(&seen);
        ctx.on_resize(move |_, size| sink.set(size));

        ctx.resize(800, 400);
        assert_eq!(seen.get(), (800, 400));
        assert_eq!(ctx.camera().aspect(), 2.0);

        ctx.set_scale_factor(2.0);
        assert_eq!(ctx.logical_size(), Vec2::new(400.0, 200.0));
    }

    #[test]
    fn handlers_are_replaceable_and_survive_dispatch() {
        let mut ctx = Context::new(HeadlessBackend::new(), ContextConfig::default());
        let presses = Rc::new(Cell::new(0));

        let counter = Rc::clone(&presses);
        ctx.on_key_press(move |_, _| counter.set(counter.get() + 1));
        ctx.dispatch_input(&InputEvent::KeyPressed(key(Key::A)));
        ctx.dispatch_input(&InputEvent::KeyPressed(key(Key::B)));
        assert_eq!(presses.get(), 2);
        assert!(ctx.input().key_down(Key::A));

        ctx.on_key_press(|_, _| {});
        ctx.dispatch_input(&InputEvent::KeyPressed(key(Key::C)));
        assert_eq!(presses.get(), 2);
    }

    #[test]
    fn handler_may_replace_itself() {
        let mut ctx = Context::new(HeadlessBackend::new(), ContextConfig::default());
        let moves = Rc::new(Cell::new(0));

        let counter = Rc::clone(&moves);
        ctx.on_mouse_move(move |ctx, _| {
            counter.set(counter.get() + 1);
            let inner = Rc::clone(&counter);
            ctx.on_mouse_move(move |_, _| inner.set(inner.get() + 100));
        });

        ctx.dispatch_input(&InputEvent::PointerMoved(Vec2::ONE));
        ctx.dispatch_input(&InputEvent::PointerMoved(Vec2::ONE));
        assert_eq!(moves.get(), 101);
    }

    #[test]
    fn hidden_objects_are_not_drawn() {
        let backend = HeadlessBackend::new();
        let log = backend.log();
        let mut ctx = Context::new(backend, ContextConfig { shadows: false, ..Default::default() });

        let id = ctx.add_object(Object::sphere(ctx.loader(), 1.0).with_hidden(true)).unwrap();
        let report = ctx.render_frame().unwrap();
        assert_eq!(report.draw_calls, 0);
        assert_eq!(report.skipped_pending, 0);

        if let Some(object) = ctx.object_mut(id) {
            object.set_hidden(false);
        }
        ctx.render_frame().unwrap();
        assert_eq!(log.last_frame().map(|f| f.objects()), Some(vec![id]));
    }

    #[test]
    fn skipped_frames_issue_nothing() {
        let mut backend = HeadlessBackend::new();
        backend.skip_frames(1);
        let log = backend.log();
        let mut ctx = Context::new(backend, ContextConfig::default());
        ctx.add_object(Object::sphere(ctx.loader(), 1.0)).unwrap();

        let report = ctx.render_frame().unwrap();
        assert!(report.skipped_frame);
        assert_eq!(report.uploads.uploaded, 1);
        assert_eq!(log.frame_count(), 0);

        let report = ctx.render_frame().unwrap();
        assert!(!report.skipped_frame);
        assert_eq!(report.draw_calls, 1);
    }
}
