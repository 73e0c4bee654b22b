use anyhow::{Context as _, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::backend::WgpuBackend;
use crate::config::ContextConfig;
use crate::context::Context;
use crate::core::{App as CoreApp, AppControl, FrameCtx, WindowCtx};
use crate::device::GpuInit;
use crate::input::translate_window_event;
use crate::time::FrameTime;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub gpu: GpuInit,
    pub context: ContextConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            gpu: GpuInit::default(),
            context: ContextConfig::default(),
        }
    }
}

/// Runtime context passed to the application.
///
/// Commands are buffered and applied after the current callback returns.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }

    /// Stops the continuous redraw loop; the window then only redraws on resize or expose.
    pub fn set_continuous(&mut self, continuous: bool) {
        self.commands.push(Command::Continuous(continuous));
    }
}

enum Command {
    Exit,
    Continuous(bool),
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window, hands its [`Context`] to `app` and drives it until the window closes.
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[not_covariant]
    context: Context<'this>,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    app: A,

    entry: Option<WindowEntry>,
    continuous: bool,
    exit_requested: bool,
    /// First fatal error; returned from [`Runtime::run`].
    failure: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, app: A) -> Self {
        Self {
            config,
            app,
            entry: None,
            continuous: true,
            exit_requested: false,
            failure: None,
        }
    }

    fn fail(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.exit_requested = true;
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.config.gpu.clone();
        let context_config = self.config.context.clone();

        let mut entry = WindowEntryTryBuilder {
            window,
            context_builder: |w| {
                let backend = pollster::block_on(WgpuBackend::new(w, gpu_init))
                    .context("GPU initialization failed for window")?;
                Ok::<_, anyhow::Error>(Context::new(backend, context_config))
            },
        }
        .try_build()?;

        let app = &mut self.app;
        entry.with_mut(|fields| -> Result<()> {
            let size = fields.window.inner_size();
            fields.context.set_scale_factor(fields.window.scale_factor());
            fields.context.resize(size.width, size.height);
            app.setup(fields.context).context("application setup failed")
        })?;

        self.entry = Some(entry);
        Ok(())
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop, mut ctx: RuntimeCtx) {
        for cmd in ctx.commands.drain(..) {
            match cmd {
                Command::Exit => self.exit_requested = true,
                Command::Continuous(on) => self.continuous = on,
            }
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else { return };

        let mut runtime_ctx = RuntimeCtx::default();
        let app = &mut self.app;

        let result = entry.with_mut(|fields| -> Result<AppControl> {
            let time = fields.context.frame_time().unwrap_or_else(|| FrameTime {
                dt: 0.0,
                now: std::time::Instant::now(),
                frame_index: 0,
            });

            let control = {
                let mut frame = FrameCtx {
                    window: WindowCtx { window: fields.window },
                    context: &mut *fields.context,
                    time,
                    runtime: &mut runtime_ctx,
                };
                app.update(&mut frame)
            };
            if control == AppControl::Exit {
                return Ok(control);
            }

            fields.window.pre_present_notify();
            let report = fields.context.render_frame().context("render_frame failed")?;
            if !report.degraded.is_empty() {
                log::trace!("{} degraded draw(s) this frame", report.degraded.len());
            }
            app.frame_rendered(&report);
            Ok(control)
        });

        match result {
            Ok(AppControl::Exit) => runtime_ctx.exit(),
            Ok(AppControl::Continue) => {}
            Err(err) => self.fail(err),
        }

        self.apply_commands(event_loop, runtime_ctx);
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(e.context("failed to create initial window"));
            event_loop.exit();
            return;
        }

        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        if self.continuous {
            if let Some(entry) = &self.entry {
                entry.with_window(|w| w.request_redraw());
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some(entry) = self.entry.as_mut() else { return };
        if entry.with_window(|w| w.id()) != window_id {
            return;
        }

        // Input first, so handlers see the event before the runtime reacts to it.
        entry.with_mut(|fields| {
            let scale = fields.window.scale_factor();
            if let Some(ev) = translate_window_event(scale, fields.context.input(), &event) {
                fields.context.dispatch_input(&ev);
            }
        });

        match &event {
            WindowEvent::CloseRequested => {
                // Dropping the entry tears the context down while the window is still alive.
                self.entry = None;
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                entry.with_context_mut(|ctx| ctx.resize(new_size.width, new_size.height));
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let new_size = entry.with_window(|w| w.inner_size());
                entry.with_context_mut(|ctx| {
                    ctx.set_scale_factor(*scale_factor);
                    ctx.resize(new_size.width, new_size.height);
                });
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.entry.take().is_some() {
            log::debug!("window closed");
        }
    }
}
