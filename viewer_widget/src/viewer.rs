//! Model viewer - the root component a host page embeds
//!
//! All state lives on the host thread. Loader tasks run on the tokio runtime
//! and only talk back through the pipeline channel, which is drained at the
//! start of every render tick (or awaited with [`ModelViewer::next_load_event`]).

use std::path::Path;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use viewer_core::camera::PerspectiveCamera;
use viewer_core::config::{ConfigEffect, ConfigField, ConfigPatch, ViewerConfig};
use viewer_core::error::Result;
use viewer_core::gesture::{GestureTracker, InputEvent, InputResponse};
use viewer_core::rig::{CameraRig, MomentumState};
use viewer_core::scene::{NodeId, SceneGraph};
use viewer_render::asset_manager::AssetManager;
use viewer_render::environment::{EnvironmentGenerator, EquirectBaker};
use viewer_render::loader::{ImportedModel, LoaderRegistry};
use viewer_render::renderer::{HeadlessRenderer, RenderBackend};

use crate::assembly::{SceneAssembly, dispose_environment};
use crate::fade::{FadeAnimation, FadeStep};
use crate::overlay::LoadingOverlay;
use crate::pipeline::{LoadEvent, LoadEventKind, LoadPipeline, auto_frame_distance, placeholder_model};
use crate::render_loop::{FrameQueue, RenderLoop};
use crate::screenshot::{self, CaptureTarget, DirectoryDownloads, DownloadSink, Screenshot};
use crate::surface::{HeadlessSurface, RenderSurface};

/// Notification for the host page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    /// A model (or the placeholder) is fully shown
    ModelLoaded { generation: u64 },
}

/// Collaborators a viewer is built from
pub struct ViewerParts {
    pub renderer: Box<dyn RenderBackend>,
    pub surface: Box<dyn RenderSurface>,
    pub registry: LoaderRegistry,
    pub environment: Box<dyn EnvironmentGenerator>,
    pub downloads: Box<dyn DownloadSink>,
}

impl ViewerParts {
    /// Software renderer, file loaders, and screenshots saved to `downloads_dir`
    pub fn headless(config: &ViewerConfig, downloads_dir: impl AsRef<Path>) -> Self {
        Self {
            renderer: Box::new(HeadlessRenderer::new(config.width, config.height)),
            surface: Box::new(HeadlessSurface::new()),
            registry: LoaderRegistry::with_file_loaders(),
            environment: Box::new(EquirectBaker::default()),
            downloads: Box::new(DirectoryDownloads::new(downloads_dir)),
        }
    }
}

pub struct ModelViewer {
    config: ViewerConfig,
    runtime: Handle,
    renderer: Box<dyn RenderBackend>,
    surface: Box<dyn RenderSurface>,
    environment: Box<dyn EnvironmentGenerator>,
    downloads: Box<dyn DownloadSink>,
    scene: SceneGraph,
    assets: AssetManager,
    camera: Option<PerspectiveCamera>,
    rig: CameraRig,
    gestures: GestureTracker,
    assembly: Option<SceneAssembly>,
    pipeline: LoadPipeline,
    fade: Option<FadeAnimation>,
    frames: FrameQueue,
    render_loop: RenderLoop,
    overlay: LoadingOverlay,
    events: Vec<ViewerEvent>,
    mounted: bool,
}

impl ModelViewer {
    pub fn new(config: ViewerConfig, parts: ViewerParts, runtime: Handle) -> Self {
        let ViewerParts {
            renderer,
            surface,
            registry,
            environment,
            downloads,
        } = parts;
        Self {
            rig: CameraRig::new(&config),
            config,
            runtime,
            renderer,
            surface,
            environment,
            downloads,
            scene: SceneGraph::new(),
            assets: AssetManager::new(),
            camera: None,
            gestures: GestureTracker::new(),
            assembly: None,
            pipeline: LoadPipeline::new(registry),
            fade: None,
            frames: FrameQueue::new(),
            render_loop: RenderLoop::new(),
            overlay: LoadingOverlay::default(),
            events: Vec::new(),
            mounted: false,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.camera.as_ref()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn assembly(&self) -> Option<&SceneAssembly> {
        self.assembly.as_ref()
    }

    pub fn renderer(&self) -> &dyn RenderBackend {
        self.renderer.as_ref()
    }

    pub fn overlay(&self) -> LoadingOverlay {
        self.overlay
    }

    pub fn frames(&self) -> &FrameQueue {
        &self.frames
    }

    pub fn generation(&self) -> u64 {
        self.pipeline.generation()
    }

    /// Root node of the displayed model
    pub fn current_model(&self) -> Option<NodeId> {
        self.pipeline.current_model()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_running()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Whether the host should draw the screenshot button over the panel
    pub fn screenshot_button_visible(&self) -> bool {
        self.mounted && self.config.show_screenshot_button
    }

    /// Host notifications since the last call
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Build the scene, start the render loop and load the configured model
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        if self.renderer.is_disposed() {
            warn!("viewer was unmounted and cannot be mounted again");
            return;
        }
        let (width, height) = (self.config.width, self.config.height);
        self.surface.attach_canvas(width, height);
        self.renderer.set_size(width, height);

        let mut camera = PerspectiveCamera::new(self.config.fov, 1.0);
        camera.set_viewport_size(width, height);
        self.camera = Some(camera);

        let assembly = SceneAssembly::build(&mut self.scene, &mut self.assets, &self.config);
        assembly.rebuild_environment(
            &mut self.scene,
            &mut self.assets,
            self.environment.as_mut(),
            self.config.environment,
        );
        self.assembly = Some(assembly);

        self.rig = CameraRig::new(&self.config);
        self.render_loop.start(&mut self.frames);
        self.mounted = true;
        info!(width, height, "model viewer mounted");

        let url = self.config.model_url().map(str::to_owned);
        self.load_model(url.as_deref());
    }

    /// Tear everything down; in-flight loads become stale
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;

        if let Some(mut fade) = self.fade.take() {
            fade.cancel(&mut self.frames);
        }
        self.render_loop.stop(&mut self.frames);
        self.pipeline.next_generation();
        let disposed = self.pipeline.dispose_current(&mut self.scene, &mut self.assets);
        debug!(?disposed, "model released");

        if let Some(mut assembly) = self.assembly.take() {
            assembly.dispose_ground(&mut self.scene, &mut self.assets);
            dispose_environment(&mut self.scene, &mut self.assets);
            for node in assembly.lights.all() {
                self.scene.despawn_recursive(node);
            }
            self.scene.despawn_recursive(assembly.rig.pivot);
        }
        self.renderer.dispose();
        if self.surface.canvas_is_child() {
            self.surface.remove_canvas();
        }
        self.camera = None;
        self.gestures = GestureTracker::new();
        info!("model viewer unmounted");
    }

    /// Route a host input event through the gesture tracker
    pub fn handle_input(&mut self, event: &InputEvent) -> InputResponse {
        if !self.mounted {
            return InputResponse::Ignored;
        }
        self.gestures.handle(event, &self.config, &mut self.rig)
    }

    /// Apply a partial config and carry out the effects it implies
    pub fn update_config(&mut self, patch: ConfigPatch) -> Vec<ConfigEffect> {
        let changed = self.config.apply_patch(patch);
        let effects = ConfigEffect::for_fields(&changed);
        if !changed.is_empty() {
            debug!(fields = ?changed, effects = ?effects, "config updated");
        }
        if !self.mounted {
            return effects;
        }

        for effect in &effects {
            match effect {
                ConfigEffect::ReloadModel => {
                    let url = self.config.model_url().map(str::to_owned);
                    self.load_model(url.as_deref());
                }
                ConfigEffect::UpdateCamera => self.update_camera(&changed),
                ConfigEffect::UpdateLights => {
                    if let Some(assembly) = &self.assembly {
                        assembly.update_light_intensities(&mut self.scene, &self.config);
                    }
                }
                ConfigEffect::RebuildEnvironment => {
                    if let Some(assembly) = &self.assembly {
                        assembly.rebuild_environment(
                            &mut self.scene,
                            &mut self.assets,
                            self.environment.as_mut(),
                            self.config.environment,
                        );
                    }
                }
            }
        }
        effects
    }

    fn update_camera(&mut self, changed: &[ConfigField]) {
        let (width, height) = (self.config.width, self.config.height);
        if changed.iter().any(|f| matches!(f, ConfigField::Width | ConfigField::Height)) {
            self.surface.resize(width, height);
            self.renderer.set_size(width, height);
        }
        if let Some(camera) = self.camera.as_mut() {
            camera.fov = self.config.fov;
            camera.set_viewport_size(width, height);
        }

        self.rig.set_limits(&self.config);
        if changed.contains(&ConfigField::DefaultZoom) {
            self.rig.set_zoom(self.config.default_zoom, true);
        }
        if changed
            .iter()
            .any(|f| matches!(f, ConfigField::RotationX | ConfigField::RotationY))
        {
            self.rig.reset_view(&self.config);
        }
        if changed.contains(&ConfigField::OffsetY) {
            if let Some(assembly) = &self.assembly {
                assembly.place_ground(&mut self.scene, &self.config);
            }
        }
        self.apply_rig();
    }

    /// Replace the displayed model. `None` (or a blank URL) shows the
    /// placeholder. Returns the generation of this load.
    pub fn load_model(&mut self, url: Option<&str>) -> u64 {
        let generation = self.pipeline.next_generation();
        if !self.mounted {
            debug!(generation, "load requested before mount");
            return generation;
        }

        if let Some(mut fade) = self.fade.take() {
            fade.cancel(&mut self.frames);
        }
        self.overlay.reset(self.config.placeholder_image.is_some());
        let disposed = self.pipeline.dispose_current(&mut self.scene, &mut self.assets);
        debug!(?disposed, "previous model released");

        match url.map(str::trim).filter(|url| !url.is_empty()) {
            None => {
                info!(generation, "no model url, showing placeholder");
                self.show_placeholder(generation);
            }
            Some(url) => match self.pipeline.spawn_load(&self.runtime, url, generation) {
                Ok(()) => info!(url, generation, "loading model"),
                Err(e) => {
                    warn!(url, error = %e, "model load failed");
                    self.show_placeholder(generation);
                }
            },
        }
        generation
    }

    /// Apply every load event already delivered; returns how many there were
    pub fn process_load_events(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.pipeline.try_next_event() {
            self.apply_load_event(event);
            count += 1;
        }
        count
    }

    /// Wait for the next load event and apply it
    pub async fn next_load_event(&mut self) -> bool {
        match self.pipeline.next_event().await {
            Some(event) => {
                self.apply_load_event(event);
                true
            }
            None => false,
        }
    }

    fn apply_load_event(&mut self, event: LoadEvent) {
        let LoadEvent { generation, kind } = event;
        if !self.pipeline.is_current(generation) {
            debug!(generation, current = self.pipeline.generation(), "discarding stale load event");
            return;
        }
        match kind {
            LoadEventKind::Progress { loaded, total } => self.overlay.set_progress(loaded, total),
            LoadEventKind::Finished(Ok(model)) if model.is_renderable() => {
                self.show_model(&model, generation, true);
            }
            LoadEventKind::Finished(Ok(model)) => {
                warn!(model = %model.name, "model has nothing to render");
                self.show_placeholder(generation);
            }
            LoadEventKind::Finished(Err(e)) => {
                warn!(error = %e, "model load failed");
                self.show_placeholder(generation);
            }
        }
    }

    fn show_placeholder(&mut self, generation: u64) {
        info!(generation, "showing placeholder model");
        self.show_model(&placeholder_model(), generation, false);
    }

    fn show_model(&mut self, model: &ImportedModel, generation: u64, allow_fade: bool) {
        let Some(group) = self.assembly.as_ref().map(|a| a.rig.group) else {
            return;
        };
        let root = self
            .pipeline
            .install(&mut self.scene, &mut self.assets, group, model, self.config.target_radius);

        let zoom = if self.config.auto_frame {
            auto_frame_distance(self.config.target_radius, self.config.fov)
        } else {
            self.config.default_zoom
        };
        self.rig.set_zoom(zoom, true);
        self.rig.reset_view(&self.config);
        self.rig.momentum = MomentumState::default();
        if let Some(assembly) = &self.assembly {
            assembly.place_ground(&mut self.scene, &self.config);
        }
        self.apply_rig();
        self.render_now();

        if allow_fade && self.config.fade_in {
            if let Some(mut fade) = FadeAnimation::begin(&self.scene, &mut self.assets, root, generation) {
                fade.schedule(&mut self.frames);
                self.fade = Some(fade);
                return;
            }
        }
        self.complete_load(generation);
    }

    fn complete_load(&mut self, generation: u64) {
        self.overlay.finish();
        self.events.push(ViewerEvent::ModelLoaded { generation });
        info!(generation, "model loaded");
    }

    /// Run every animation-frame callback due at host time `now_ms`
    pub fn advance_frame(&mut self, now_ms: f64) {
        for handle in self.frames.take_pending() {
            if self.render_loop.owns(handle) {
                self.tick(now_ms);
            } else if self.fade.as_ref().is_some_and(|fade| fade.owns(handle)) {
                self.fade_tick(now_ms);
            }
        }
    }

    fn tick(&mut self, now_ms: f64) {
        self.process_load_events();
        let dt = self.render_loop.clock.delta(now_ms);
        self.rig.step(dt, &self.config);
        self.apply_rig();
        self.render_now();
        self.render_loop.reschedule(&mut self.frames);
    }

    fn fade_tick(&mut self, now_ms: f64) {
        let Some(mut fade) = self.fade.take() else {
            return;
        };
        if !self.pipeline.is_current(fade.generation) {
            debug!(generation = fade.generation, "dropping stale fade");
            return;
        }
        match fade.tick(&mut self.assets, now_ms) {
            FadeStep::Running => {
                self.render_now();
                fade.schedule(&mut self.frames);
                self.fade = Some(fade);
            }
            FadeStep::Complete => {
                self.render_now();
                self.complete_load(fade.generation);
            }
        }
    }

    fn apply_rig(&mut self) {
        self.rig.apply(
            &mut self.scene,
            self.assembly.as_ref().map(|assembly| assembly.rig),
            self.camera.as_mut(),
            &self.config,
        );
    }

    fn render_now(&mut self) {
        if let Some(camera) = &self.camera {
            self.renderer.render(&self.scene, &self.assets, camera);
        }
    }

    /// Capture the panel as `model.png`. `Ok(None)` when not mounted.
    pub fn capture_screenshot(&mut self) -> Result<Option<Screenshot>> {
        let (Some(assembly), Some(camera)) = (&self.assembly, &self.camera) else {
            return Ok(None);
        };
        let lights = assembly.lights.all();
        let target = CaptureTarget {
            scene: &mut self.scene,
            assets: &self.assets,
            camera,
            renderer: self.renderer.as_mut(),
            lights: &lights,
            ground: assembly.ground.map(|ground| ground.node),
        };
        screenshot::capture(target, self.downloads.as_mut()).map(Some)
    }
}

impl Drop for ModelViewer {
    fn drop(&mut self) {
        self.unmount();
    }
}
