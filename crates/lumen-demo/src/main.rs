use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context as _;
use glam::{Vec2, Vec3};

use lumen_engine::core::{App, AppControl, FrameCtx};
use lumen_engine::input::{Key, MouseButton};
use lumen_engine::loader::{ImageData, Sampling};
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::math::{Euler, Transform};
use lumen_engine::paint::Color;
use lumen_engine::scene::{Alignment, Material, Object, ObjectId};
use lumen_engine::text::{FontId, FontSystem};
use lumen_engine::window::{Runtime, RuntimeConfig};
use lumen_engine::{Context, FrameReport};

/// Orbit camera state shared between the input handlers and the app.
struct Orbit {
    target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    dragging: bool,
    last_pointer: Option<Vec2>,
    exit: bool,
}

impl Orbit {
    fn apply(&self, ctx: &mut Context<'_>) {
        let (sp, cp) = self.pitch.sin_cos();
        let (sy, cy) = self.yaw.sin_cos();
        let offset = Vec3::new(cp * cy, cp * sy, sp) * self.distance;
        let camera = ctx.camera_mut();
        camera.set_translation(self.target + offset);
        camera.look_at(self.target);
    }
}

struct Demo {
    orbit: Rc<RefCell<Orbit>>,
    fonts: FontSystem,
    font: Option<FontId>,
    spinner: Option<ObjectId>,
    label: Option<ObjectId>,
    angle: f32,
    label_timer: f32,
}

impl Demo {
    fn new() -> Self {
        let mut fonts = FontSystem::new();
        let font = match load_font() {
            Some(bytes) => fonts
                .load_font(&bytes)
                .map_err(|e| log::warn!("font unusable, text disabled: {e}"))
                .ok(),
            None => {
                log::warn!("no system font found, text disabled");
                None
            }
        };

        Self {
            orbit: Rc::new(RefCell::new(Orbit {
                target: Vec3::new(0.0, 0.0, 0.5),
                yaw: 200f32.to_radians(),
                pitch: 25f32.to_radians(),
                distance: 8.0,
                dragging: false,
                last_pointer: None,
                exit: false,
            })),
            fonts,
            font,
            spinner: None,
            label: None,
            angle: 0.0,
            label_timer: 0.0,
        }
    }

    fn build_scene(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        let loader = ctx.loader().clone();

        let floor = ctx.add_material(
            Material::new("floor")
                .with_color(Color::rgb(0.55, 0.55, 0.6))
                .with_surface(0.0, 0.9, 1.0)
                .with_texture(&loader, checkerboard(64, 8)),
        )?;
        let brass = ctx.add_material(
            Material::new("brass")
                .with_color(Color::rgb(0.9, 0.7, 0.3))
                .with_surface(0.8, 0.3, 0.8),
        )?;

        ctx.add_object(
            Object::cuboid(&loader, 10.0, 10.0, 0.1)
                .with_material(floor)
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -0.05))),
        )?;

        self.spinner = Some(ctx.add_object(
            Object::cuboid(&loader, 1.0, 1.0, 1.0)
                .with_color(Color::rgb(0.8, 0.2, 0.2))
                .with_transform(Transform::from_translation(Vec3::new(0.0, -2.0, 0.5))),
        )?);

        ctx.add_object(
            Object::sphere(&loader, 1.2)
                .with_material(brass)
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 0.6))),
        )?;

        ctx.add_object(
            Object::cylinder(&loader, 0.6, 1.8)
                .with_color(Color::rgb(0.2, 0.5, 0.9))
                .with_transform(Transform::from_translation(Vec3::new(0.0, 2.0, 0.9))),
        )?;

        // Axes.
        for (dir, color) in [
            (Vec3::X, Color::rgb(1.0, 0.0, 0.0)),
            (Vec3::Y, Color::rgb(0.0, 1.0, 0.0)),
            (Vec3::Z, Color::rgb(0.0, 0.0, 1.0)),
        ] {
            ctx.add_object(Object::line(&loader, Vec3::ZERO, dir * 3.0, 0.03).with_color(color))?;
        }

        let glow = radial_dot(32);
        for i in 0..12 {
            let a = i as f32 / 12.0 * std::f32::consts::TAU;
            let position = Vec3::new(a.cos() * 3.5, a.sin() * 3.5, 1.5);
            ctx.add_object(
                Object::particle(&loader, position, 0.4, glow.clone())
                    .with_color(Color::from_straight(1.0, 0.9, 0.5, 0.8)),
            )?;
        }

        ctx.add_object(
            Object::sprite(&loader, checkerboard(32, 4), Vec2::new(96.0, 96.0))
                .with_alignment(Alignment::BottomRight)
                .with_position(Vec2::new(-16.0, -16.0))
                .with_z_order(1),
        )?;

        if let Some(font) = self.font {
            let text = Object::text(&loader, &self.fonts, font, "lumen", 28.0)
                .context("failed to rasterize label")?
                .with_position(Vec2::new(16.0, 16.0))
                .with_z_order(2);
            self.label = Some(ctx.add_object(text)?);
        }

        Ok(())
    }

    fn install_handlers(&self, ctx: &mut Context<'_>) {
        let orbit = Rc::clone(&self.orbit);
        ctx.on_mouse_press(move |_, ev| {
            if ev.button == MouseButton::Left {
                let mut o = orbit.borrow_mut();
                o.dragging = true;
                o.last_pointer = Some(ev.position);
            }
        });

        let orbit = Rc::clone(&self.orbit);
        ctx.on_mouse_release(move |_, ev| {
            if ev.button == MouseButton::Left {
                orbit.borrow_mut().dragging = false;
            }
        });

        let orbit = Rc::clone(&self.orbit);
        ctx.on_mouse_move(move |ctx, pos| {
            let mut o = orbit.borrow_mut();
            if let (true, Some(last)) = (o.dragging, o.last_pointer) {
                let delta = pos - last;
                o.yaw -= delta.x * 0.01;
                o.pitch = (o.pitch + delta.y * 0.01).clamp(-1.4, 1.4);
                o.apply(ctx);
            }
            o.last_pointer = Some(pos);
        });

        let orbit = Rc::clone(&self.orbit);
        ctx.on_mouse_wheel(move |ctx, ev| {
            let mut o = orbit.borrow_mut();
            let lines = ev.delta.lines(20.0).y;
            o.distance = (o.distance * 0.9f32.powf(lines)).clamp(2.0, 40.0);
            o.apply(ctx);
        });

        let orbit = Rc::clone(&self.orbit);
        ctx.on_mouse_entry(move |_, entered| {
            if !entered {
                orbit.borrow_mut().dragging = false;
            }
        });

        let orbit = Rc::clone(&self.orbit);
        ctx.on_key_press(move |ctx, ev| match ev.key {
            Key::Escape => orbit.borrow_mut().exit = true,
            Key::S if !ev.repeat => {
                let shadows = !ctx.config().shadows;
                ctx.set_shadows(shadows);
                log::info!("shadows {}", if shadows { "on" } else { "off" });
            }
            _ => {}
        });

        ctx.on_resize(|_, (w, h)| log::debug!("resized to {w}x{h}"));
    }
}

impl App for Demo {
    fn setup(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        self.build_scene(ctx)?;
        self.install_handlers(ctx);
        self.orbit.borrow().apply(ctx);
        log::info!("scene ready: {} objects, {} materials", ctx.object_count(), ctx.material_count());
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.orbit.borrow().exit {
            return AppControl::Exit;
        }

        let dt = frame.dt();
        self.angle += dt;
        if let Some(object) = self.spinner.and_then(|id| frame.context.object_mut(id)) {
            if let Some(o) = object.as_3d_mut() {
                o.transform.rotation = Euler::new(self.angle * 0.5, 0.0, self.angle);
            }
        }

        self.label_timer += dt;
        if self.label_timer >= 0.5 {
            self.label_timer = 0.0;
            let text = format!("lumen  {:.0} fps", frame.context.fps());
            if let Some(object) = self.label.and_then(|id| frame.context.object_mut(id)) {
                if let Err(e) = object.set_text(&self.fonts, &text) {
                    log::warn!("label update failed: {e}");
                }
            }
        }

        AppControl::Continue
    }

    fn frame_rendered(&mut self, report: &FrameReport) {
        for (id, err) in &report.degraded {
            log::trace!("{id} degraded: {err}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "lumen demo".into(),
            ..RuntimeConfig::default()
        },
        Demo::new(),
    )
}

fn checkerboard(size: u32, cells: u32) -> ImageData {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x / cell + y / cell) % 2 == 0 { 235 } else { 90 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    ImageData::new(size, size, 4, pixels).with_sampling(Sampling::Nearest)
}

fn radial_dot(size: u32) -> ImageData {
    let half = size as f32 * 0.5;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let d = Vec2::new(x as f32 + 0.5 - half, y as f32 + 0.5 - half).length() / half;
            let a = ((1.0 - d).clamp(0.0, 1.0).powi(2) * 255.0) as u8;
            pixels.extend_from_slice(&[255, 255, 255, a]);
        }
    }
    ImageData::new(size, size, 4, pixels)
}

fn load_font() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}
