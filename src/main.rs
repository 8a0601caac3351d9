// meshview - minimal Vulkan mesh viewer
//
// Loads a triangle mesh (procedural cube or OBJ file), uploads it to
// device-local memory, and renders it every frame with a push-constant MVP
// transform.
//
// Build order: device context -> swapchain -> depth target -> pipeline ->
// renderer -> mesh. Teardown runs strictly in reverse; a failure anywhere
// during startup unwinds the components built so far and exits non-zero.

mod assets;
mod backend;
mod camera;
mod config;

use anyhow::{Context, Result};
use glam::Vec3;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes},
};

use backend::{
    CreateInfo, DepthTarget, DeviceContext, Mesh, RenderPipeline, Renderer, Swapchain, Vertex,
};
use camera::Camera;
use config::Config;

fn main() -> Result<()> {
    let config = Config::load();
    init_logging();
    log::info!(
        "Starting meshview ({}x{})",
        config.window.width,
        config.window.height
    );

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("event loop failed")?;

    // Failures inside the event loop cannot propagate through winit;
    // surface them here so the process exits non-zero.
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}

struct App {
    config: Config,
    window: Option<Arc<Window>>,

    ctx: Option<DeviceContext>,
    swapchain: Option<Swapchain>,
    depth: Option<DepthTarget>,
    pipeline: Option<RenderPipeline>,
    renderer: Option<Renderer>,
    mesh: Option<Mesh>,
    camera: Camera,

    /// Set by resize events; presentation resources are rebuilt before the
    /// next frame.
    needs_resize: bool,
    /// Set while the framebuffer is 0x0. Rendering and swapchain rebuilds
    /// are deferred until a non-zero size is reported again.
    is_minimized: bool,

    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let mut camera = Camera::default();
        camera.set_perspective(
            config.camera.fovy_degrees.to_radians(),
            config.camera.near,
            config.camera.far,
        );
        camera.set_look_at(
            Vec3::from(config.camera.eye),
            Vec3::from(config.camera.center),
            Vec3::from(config.camera.up),
        );

        Self {
            config,
            window: None,
            ctx: None,
            swapchain: None,
            depth: None,
            pipeline: None,
            renderer: None,
            mesh: None,
            camera,
            needs_resize: false,
            is_minimized: false,
            failure: None,
        }
    }

    fn init_gpu(&mut self, window: &Window) -> Result<()> {
        let display = window
            .display_handle()
            .context("failed to get display handle")?
            .as_raw();
        let window_handle = window
            .window_handle()
            .context("failed to get window handle")?
            .as_raw();

        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation;
        let mut ctx = DeviceContext::init(
            display,
            window_handle,
            &CreateInfo {
                enable_validation,
                enable_debug_utils: self.config.debug.debug_utils,
            },
        )?;

        let size = window.inner_size();

        let mut swapchain = match Swapchain::init(
            &ctx,
            [size.width, size.height],
            self.config.present_mode(),
        ) {
            Ok(sc) => sc,
            Err(e) => {
                ctx.shutdown();
                return Err(e.into());
            }
        };

        let mut depth = match DepthTarget::init(&ctx, swapchain.extent()) {
            Ok(d) => d,
            Err(e) => {
                swapchain.shutdown(&ctx);
                ctx.shutdown();
                return Err(e.into());
            }
        };

        let mut pipeline = match RenderPipeline::init(
            &ctx,
            swapchain.format(),
            Some(depth.format()),
            &self.config.scene.vert_shader,
            &self.config.scene.frag_shader,
        ) {
            Ok(pl) => pl,
            Err(e) => {
                depth.shutdown(&ctx);
                swapchain.shutdown(&ctx);
                ctx.shutdown();
                return Err(e.into());
            }
        };

        let mut renderer = match Renderer::init(
            &ctx,
            &swapchain,
            &pipeline,
            Some(&depth),
            self.config.graphics.clear_color,
        ) {
            Ok(rd) => rd,
            Err(e) => {
                pipeline.shutdown(&ctx);
                depth.shutdown(&ctx);
                swapchain.shutdown(&ctx);
                ctx.shutdown();
                return Err(e.into());
            }
        };

        let mesh = match self.load_mesh(&ctx) {
            Ok(m) => m,
            Err(e) => {
                renderer.shutdown(&ctx);
                pipeline.shutdown(&ctx);
                depth.shutdown(&ctx);
                swapchain.shutdown(&ctx);
                ctx.shutdown();
                return Err(e);
            }
        };

        self.ctx = Some(ctx);
        self.swapchain = Some(swapchain);
        self.depth = Some(depth);
        self.pipeline = Some(pipeline);
        self.renderer = Some(renderer);
        self.mesh = Some(mesh);

        log::info!("Vulkan initialized");
        Ok(())
    }

    fn load_mesh(&self, ctx: &DeviceContext) -> Result<Mesh> {
        match &self.config.scene.model {
            Some(path) => {
                let obj = assets::load_obj(path)
                    .with_context(|| format!("failed to load model {path:?}"))?;
                let vertices: Vec<Vertex> = obj
                    .positions
                    .iter()
                    .map(|&pos| Vertex {
                        pos,
                        color: backend::mesh::position_color(pos),
                    })
                    .collect();
                Ok(Mesh::from_data(ctx, &vertices, &obj.indices)?)
            }
            None => Ok(Mesh::cube(ctx)?),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.is_minimized {
            return;
        }

        let Some(window) = self.window.clone() else {
            return;
        };
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            self.is_minimized = true;
            return;
        }
        let framebuffer = [size.width, size.height];

        if let (Some(ctx), Some(sc), Some(depth), Some(pl), Some(rd), Some(mesh)) = (
            self.ctx.as_ref(),
            self.swapchain.as_mut(),
            self.depth.as_mut(),
            self.pipeline.as_ref(),
            self.renderer.as_mut(),
            self.mesh.as_ref(),
        ) {
            if self.needs_resize {
                if let Err(e) = rd.recreate_presentation(ctx, framebuffer, sc, pl, Some(depth)) {
                    log::error!("swapchain recreation failed: {e}");
                    self.failure = Some(e.into());
                    event_loop.exit();
                    return;
                }
                self.needs_resize = false;
            }

            match rd.draw_frame(ctx, framebuffer, sc, pl, Some(depth), mesh, &self.camera) {
                Ok(_status) => {}
                Err(e) => {
                    // Anything other than presentation staleness is fatal.
                    log::error!("render failed: {e}");
                    self.failure = Some(e.into());
                    event_loop.exit();
                }
            }
        }
    }

    fn teardown_gpu(&mut self) {
        let Some(mut ctx) = self.ctx.take() else {
            return;
        };

        if let Err(e) = ctx.wait_idle() {
            log::warn!("wait_idle during teardown failed: {e}");
        }

        if let Some(mut mesh) = self.mesh.take() {
            mesh.shutdown(&ctx);
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.shutdown(&ctx);
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.shutdown(&ctx);
        }
        if let Some(mut depth) = self.depth.take() {
            depth.shutdown(&ctx);
        }
        if let Some(mut swapchain) = self.swapchain.take() {
            swapchain.shutdown(&ctx);
        }
        ctx.shutdown();

        log::info!("GPU resources released");
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        // Wait for events by default; frames are driven by redraw requests,
        // so a minimized window leaves the loop blocked until an event
        // arrives.
        event_loop.set_control_flow(ControlFlow::Wait);

        let attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                self.failure = Some(anyhow::Error::from(e).context("failed to create window"));
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_gpu(&window) {
            log::error!("initialization failed: {e:#}");
            self.failure = Some(e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                } else {
                    if self.is_minimized {
                        log::info!("Window restored ({}x{})", size.width, size.height);
                    }
                    self.is_minimized = false;
                    self.needs_resize = true;
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Continuous redraws while visible; while minimized nothing is
        // requested and the loop blocks on the next window event.
        if !self.is_minimized {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.teardown_gpu();
    }
}
