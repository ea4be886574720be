use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use futures::executor::LocalPool;
use glam::UVec2;
use mipview_assets::{AssetManifest, FsSource};
use mipview_common::CaptureAngle;
use mipview_input::{CameraSyncController, CameraTween, InteractionEvent, SyncConfig, ViewShortcut, ViewerAction};
use mipview_material::MaterialBinder;
use mipview_persist::{CameraStateStore, PoseFile, StoreEvent};
use mipview_render::{CaptureConfig, ViewCapture};
use mipview_render_wgpu::{OffscreenCapture, OrbitCamera, WgpuRenderer};
use mipview_scene::{GridLayout, Scene};
use mipview_stream::{LodConfig, ResolutionText, RevealOrder, StreamedTexture, TextureLoader};
use mipview_tools::{SceneLogger, ViewerInspector};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const INITIAL_SIZE: PhysicalSize<u32> = PhysicalSize {
    width: 1280,
    height: 720,
};

#[derive(Parser)]
#[command(name = "mipview-desktop", about = "Progressive texture viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding the texture, its auxiliary maps and the fallback
    #[arg(long, default_value = "./assets")]
    assets: PathBuf,

    /// Milliseconds between LOD steps
    #[arg(long, default_value_t = 200)]
    cadence_ms: u64,

    /// Quiet period before a camera change is committed
    #[arg(long, default_value_t = 100)]
    debounce_ms: u64,

    /// Cubes per side of the grid
    #[arg(long, default_value_t = 12)]
    grid_size: u32,

    /// Distance between cube centers
    #[arg(long, default_value_t = 1.2)]
    spacing: f32,

    /// coarse-to-fine or fine-to-coarse
    #[arg(long, default_value = "coarse-to-fine")]
    reveal_order: RevealOrder,

    /// Camera state file, loaded at startup and written after each commit
    #[arg(long)]
    pose_file: Option<PathBuf>,

    /// Where captures are written
    #[arg(long, default_value = ".")]
    capture_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    Orbit,
    Pan,
}

/// Application state.
struct AppState {
    scene: Scene,
    materials: MaterialBinder,
    texture: StreamedTexture,
    pool: LocalPool,
    store: CameraStateStore,
    sync: CameraSyncController,
    camera: OrbitCamera,
    tween: Option<CameraTween>,
    capture: ViewCapture,
    scene_log: SceneLogger,
    pose_file: Option<PoseFile>,
    capture_dir: PathBuf,
    resolution: Rc<Cell<ResolutionText>>,
    pending_capture: Option<CaptureAngle>,
    drag: Option<Drag>,
    uv_offset: f32,
    show_panel: bool,
    epoch: Instant,
}

impl AppState {
    fn new(cli: &Cli) -> Result<Self> {
        let epoch = Instant::now();
        let scene = Scene::new(GridLayout {
            size: cli.grid_size,
            spacing: cli.spacing,
        })?;
        let mut materials = MaterialBinder::new();
        for id in scene.ids() {
            materials.attach(id);
        }

        let manifest_path = cli.assets.join("manifest.json");
        let manifest = if manifest_path.exists() {
            AssetManifest::load(&manifest_path)
                .with_context(|| format!("reading {}", manifest_path.display()))?
        } else {
            AssetManifest::default()
        };
        let loader = Arc::new(TextureLoader::new(Arc::new(FsSource::new(&cli.assets))));
        let pool = LocalPool::new();

        let resolution = Rc::new(Cell::new(ResolutionText::Loading));
        let mut texture = StreamedTexture::new(
            manifest,
            LodConfig {
                cadence: Duration::from_millis(cli.cadence_ms.max(1)),
                order: cli.reveal_order,
            },
        );
        let shown = Rc::clone(&resolution);
        texture.on_resolution(move |text| shown.set(*text));
        texture.request(loader, &pool.spawner())?;

        let pose_file = cli.pose_file.clone().map(PoseFile::new);
        let store = match pose_file.as_ref().map(PoseFile::load).transpose() {
            Ok(Some(Some(snapshot))) => CameraStateStore::from_snapshot(&snapshot)?,
            Ok(_) => CameraStateStore::new(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable pose file");
                CameraStateStore::new()
            }
        };
        let camera = OrbitCamera::from_pose(
            &store.pose(),
            store.projection(),
            UVec2::new(INITIAL_SIZE.width, INITIAL_SIZE.height),
        );

        Ok(Self {
            scene,
            materials,
            texture,
            pool,
            store,
            sync: CameraSyncController::new(SyncConfig {
                debounce: Duration::from_millis(cli.debounce_ms),
            }),
            camera,
            tween: None,
            capture: ViewCapture::new(CaptureConfig::default()),
            scene_log: SceneLogger::start(Duration::ZERO),
            pose_file,
            capture_dir: cli.capture_dir.clone(),
            resolution,
            pending_capture: None,
            drag: None,
            uv_offset: 0.0,
            show_panel: true,
            epoch,
        })
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn update(&mut self) {
        let now = self.now();
        self.pool.run_until_stalled();
        self.texture.poll(now, &mut self.materials);

        if let Some(tween) = &self.tween {
            let frame = tween.sample(now);
            self.camera.apply_tween(&frame);
            let pose = self.camera.pose();
            if frame.finished {
                self.tween = None;
                self.sync.handle(InteractionEvent::End(pose), now, &mut self.store);
            } else {
                self.sync.handle(InteractionEvent::Change(pose), now, &mut self.store);
            }
        }
        self.sync.poll(now, &mut self.store);
        self.scene_log.poll(now, &self.scene, &self.materials);
        self.persist_commits();
    }

    fn persist_commits(&mut self) {
        let changed = self
            .store
            .drain_events()
            .iter()
            .any(|e| !matches!(e, StoreEvent::Rejected));
        if !changed {
            return;
        }
        if let Some(file) = &self.pose_file {
            if let Err(e) = file.save(&self.store.snapshot()) {
                tracing::error!("failed to write pose file: {e}");
            }
        }
    }

    fn apply(&mut self, action: ViewerAction) {
        let now = self.now();
        match action {
            ViewerAction::ToggleProjection => {
                let projection = self.store.toggle_projection();
                self.camera.set_projection(projection);
            }
            ViewerAction::ResetPosition => {
                // Settle an interrupted tween first so its pending sample
                // cannot land after the reset.
                if self.tween.take().is_some() {
                    let pose = self.camera.pose();
                    self.sync.handle(InteractionEvent::End(pose), now, &mut self.store);
                }
                // A drag keeps going from the reset pose; its older sample
                // is dropped.
                self.sync.cancel_pending();
                self.store.reset_position();
                self.camera.apply_pose(&self.store.pose());
            }
            ViewerAction::Capture(angle) => {
                self.pending_capture = Some(angle);
            }
            ViewerAction::SetTextureOffset(value) => match self.materials.apply_offset(value) {
                Ok(applied) => self.uv_offset = applied,
                Err(e) => tracing::warn!("texture offset rejected: {e}"),
            },
            ViewerAction::ViewShortcut(shortcut) => self.start_tween(shortcut, now),
        }
    }

    fn start_tween(&mut self, shortcut: ViewShortcut, now: Duration) {
        if self.drag.is_some() {
            return;
        }
        self.tween = Some(CameraTween::to_shortcut(
            shortcut,
            self.camera.position,
            self.camera.up,
            self.camera.target,
            now,
        ));
        self.sync.handle(InteractionEvent::Start, now, &mut self.store);
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        if event.physical_key == PhysicalKey::Code(KeyCode::F1) {
            self.show_panel = !self.show_panel;
            return;
        }
        let action = event
            .text
            .as_ref()
            .and_then(|t| t.chars().next())
            .and_then(ViewerAction::from_key);
        if let Some(action) = action {
            self.apply(action);
        }
    }

    fn begin_drag(&mut self, drag: Drag) {
        if self.tween.is_some() || self.drag.is_some() {
            return;
        }
        self.drag = Some(drag);
        let now = self.now();
        self.sync.handle(InteractionEvent::Start, now, &mut self.store);
    }

    fn end_drag(&mut self, drag: Drag) {
        if self.drag != Some(drag) {
            return;
        }
        self.drag = None;
        let now = self.now();
        let pose = self.camera.pose();
        self.sync.handle(InteractionEvent::End(pose), now, &mut self.store);
    }

    fn drag_by(&mut self, dx: f32, dy: f32) {
        let moved = match self.drag {
            Some(Drag::Orbit) => self.camera.orbit(dx, dy),
            Some(Drag::Pan) => self.camera.pan(dx, dy),
            None => false,
        };
        if moved {
            let now = self.now();
            let pose = self.camera.pose();
            self.sync.handle(InteractionEvent::Change(pose), now, &mut self.store);
        }
    }

    fn scroll(&mut self, lines: f32) {
        if self.tween.is_some() || !self.camera.zoom(lines) {
            return;
        }
        let now = self.now();
        let pose = self.camera.pose();
        self.sync.handle(InteractionEvent::Start, now, &mut self.store);
        self.sync.handle(InteractionEvent::Change(pose), now, &mut self.store);
        self.sync.handle(InteractionEvent::End(pose), now, &mut self.store);
    }

    fn shutdown(&mut self) {
        self.sync.teardown();
        self.scene_log.cancel();
        self.texture.teardown(&mut self.materials);
    }

    fn draw_ui(&mut self, ctx: &EguiContext) -> Vec<ViewerAction> {
        let mut actions = Vec::new();

        if let Some(overlay) = ViewerInspector::overlay(self.texture.resource()) {
            egui::Area::new(egui::Id::new("loading_overlay"))
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.colored_label(egui::Color32::WHITE, overlay.progress_line());
                        ui.colored_label(egui::Color32::WHITE, overlay.resolution_line());
                    });
                });
        }

        if !self.show_panel {
            return actions;
        }

        let summary = ViewerInspector::summary(&self.scene, &self.materials, self.texture.resource());
        egui::SidePanel::left("viewer")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Mipview");
                ui.separator();
                ui.label(format!("Cubes: {}  Faces: {}", summary.cubes, summary.faces));
                ui.label(format!("Texture: {:?}", summary.state));
                ui.label(format!("Resolution: {}", self.resolution.get()));
                let pose = self.store.pose();
                ui.label(format!(
                    "Camera: ({:.1}, {:.1}, {:.1})",
                    pose.position.x, pose.position.y, pose.position.z
                ));
                ui.label(format!("Projection: {:?}", self.store.projection()));
                ui.separator();

                ui.heading("Camera");
                ui.horizontal(|ui| {
                    if ui.button("Toggle projection (P)").clicked() {
                        actions.push(ViewerAction::ToggleProjection);
                    }
                    if ui.button("Reset (R)").clicked() {
                        actions.push(ViewerAction::ResetPosition);
                    }
                });
                ui.horizontal_wrapped(|ui| {
                    for shortcut in ViewShortcut::ALL {
                        if ui.button(format!("{shortcut:?}")).clicked() {
                            actions.push(ViewerAction::ViewShortcut(shortcut));
                        }
                    }
                });
                ui.separator();

                ui.heading("Texture");
                let mut offset = self.uv_offset;
                if ui
                    .add(egui::Slider::new(&mut offset, 0.0..=1.0).text("Offset"))
                    .changed()
                {
                    actions.push(ViewerAction::SetTextureOffset(offset));
                }
                ui.separator();

                ui.heading("Capture");
                ui.horizontal_wrapped(|ui| {
                    for angle in CaptureAngle::ALL {
                        if ui.button(angle.as_str()).clicked() {
                            actions.push(ViewerAction::Capture(angle));
                        }
                    }
                });

                ui.separator();
                ui.small("F1: Toggle panel | LMB: Orbit | RMB: Pan | Wheel: Zoom | 8 2 4 6 5 0: Views");
            });
        actions
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    renderer: Option<WgpuRenderer>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            window: None,
            surface: None,
            device: None,
            queue: None,
            config: None,
            renderer: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    /// Push changed material state to the GPU, then run a queued capture.
    fn sync_gpu(&mut self) {
        let (Some(device), Some(queue), Some(renderer)) = (&self.device, &self.queue, &mut self.renderer) else {
            return;
        };
        let state = &mut self.state;
        if let Some(frame) = state.materials.take_dirty() {
            renderer.apply_material(device, queue, &frame, |id| state.texture.chain_for(id));
        }

        let Some(angle) = state.pending_capture.take() else {
            return;
        };
        let live = state.camera.to_virtual();
        let mut offscreen = OffscreenCapture::new(device, queue, renderer);
        match state.capture.capture(angle, &live, &mut offscreen, &mut state.camera) {
            Ok(image) => {
                let path = state.capture_dir.join(image.file_name());
                let written = std::fs::create_dir_all(&state.capture_dir)
                    .and_then(|()| std::fs::write(&path, image.bytes()));
                match written {
                    Ok(()) => tracing::info!(path = %path.display(), "capture written"),
                    Err(e) => tracing::error!("failed to write {}: {e}", path.display()),
                }
            }
            Err(e) => tracing::error!("capture failed: {e}"),
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Mipview")
            .with_inner_size(INITIAL_SIZE);
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("mipview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.state.camera.resize(config.width, config.height);

        let mut renderer = WgpuRenderer::new(&device, &queue, surface_format, config.width, config.height)
            .expect("create renderer");
        renderer.set_scene(&queue, &self.state.scene);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        self.window = Some(window);
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        self.renderer = Some(renderer);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            // Releases always reach the viewer so a drag cannot get stuck.
            let release = matches!(
                event,
                WindowEvent::MouseInput {
                    state: ElementState::Released,
                    ..
                }
            );
            if response.consumed && !release {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.state.shutdown();
                if let (Some(renderer), Some(device)) = (&mut self.renderer, &self.device) {
                    renderer.release_all(device);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(device), Some(config)) =
                    (&self.surface, &self.device, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(device, config);
                    self.state.camera.resize(config.width, config.height);
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(device, config.width, config.height);
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.state.handle_key(&event);
            }
            WindowEvent::MouseInput { button, state, .. } => {
                let drag = match button {
                    MouseButton::Left => Drag::Orbit,
                    MouseButton::Right => Drag::Pan,
                    _ => return,
                };
                match state {
                    ElementState::Pressed => self.state.begin_drag(drag),
                    ElementState::Released => self.state.end_drag(drag),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                self.state.scroll(lines);
            }
            WindowEvent::RedrawRequested => {
                self.state.update();
                self.sync_gpu();

                let (Some(surface), Some(device), Some(queue), Some(window)) =
                    (&self.surface, &self.device, &self.queue, &self.window)
                else {
                    return;
                };

                let output = match surface.get_current_texture() {
                    Ok(t) => t,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(config) = &self.config {
                            surface.configure(device, config);
                        }
                        return;
                    }
                    Err(e) => {
                        tracing::error!("surface error: {e}");
                        return;
                    }
                };

                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                if let Some(renderer) = &mut self.renderer {
                    renderer.render(device, queue, &view, &self.state.camera.to_virtual());
                }

                let (Some(egui_winit), Some(egui_renderer), Some(config)) =
                    (&mut self.egui_winit, &mut self.egui_renderer, &self.config)
                else {
                    return;
                };
                let raw_input = egui_winit.take_egui_input(window);
                let mut actions = Vec::new();
                let full_output = self.egui_ctx.run(raw_input, |ctx| {
                    actions = self.state.draw_ui(ctx);
                });
                for action in actions {
                    self.state.apply(action);
                }

                egui_winit.handle_platform_output(window, full_output.platform_output);

                let paint_jobs = self
                    .egui_ctx
                    .tessellate(full_output.shapes, full_output.pixels_per_point);

                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [config.width, config.height],
                    pixels_per_point: full_output.pixels_per_point,
                };

                for (id, image_delta) in &full_output.textures_delta.set {
                    egui_renderer.update_texture(device, queue, *id, image_delta);
                }
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("egui_encoder"),
                });
                egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
                {
                    let mut pass = encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("egui_pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Load,
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            ..Default::default()
                        })
                        .forget_lifetime();
                    egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
                }
                queue.submit(std::iter::once(encoder.finish()));
                for id in &full_output.textures_delta.free {
                    egui_renderer.free_texture(id);
                }

                output.present();
                window.request_redraw();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.state.drag_by(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("mipview-desktop starting");

    let state = AppState::new(&cli)?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    Ok(())
}
