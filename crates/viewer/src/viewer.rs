//! The viewer: owns scene state, the GPU backend, and the asset loader, and
//! runs everything from a single frame-driven entry point.

use std::time::Duration;

use glam::{Mat4, Vec3};
use shared::{ViewMode, ViewerConfig};
use tracing::{debug, error, info, warn};

use crate::backend::{GeometryId, GpuBackend, MaterialId};
use crate::error::{AssetKind, ViewerError, ViewerResult};
use crate::loader::{AssetLoader, LoadCompletion, LoadRequest, LoadTicket, LoadedAsset};
use crate::skeleton::{build_skeleton_mesh, SkeletonStyle};
use crate::state::scene::GpuResources;
use crate::state::{MeshNodeHandle, NodeRole, SceneNode, SkeletonNodeHandle, ViewerSceneState};
use crate::surface::{self, PrepareOptions, PreparedSurface, SurfaceMaterial, CENTER_EPSILON};
use crate::viewport::camera::CameraPose;
use crate::viewport::fit::{self, FitContext};
use crate::viewport::interaction::{focus_pose, InteractionAction, InteractionEvent};
use crate::viewport::lighting::LightRig;
use crate::viewport::mesh::MeshData;
use crate::viewport::picking::{Aabb, Ray};
use crate::viewport::tween::CameraTween;
use crate::viewport::view_mode;

/// Distance multiple used when focusing the root marker
const ROOT_FOCUS_FACTOR: f32 = 2.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
    Failed,
}

/// One node to draw this frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub role: NodeRole,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub translation: Vec3,
}

/// Everything the renderer needs for one frame
#[derive(Clone, Debug)]
pub struct FrameOutput {
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub lights: LightRig,
    pub background: [f32; 3],
    pub draws: Vec<DrawItem>,
}

pub struct Viewer<B: GpuBackend> {
    config: ViewerConfig,
    lifecycle: LifecycleState,
    backend: Option<B>,
    loader: Option<AssetLoader>,
    state: ViewerSceneState,
    style: SkeletonStyle,
    mesh_seq: u64,
    skeleton_seq: u64,
    frame_loop_running: bool,
    input_attached: bool,
}

impl<B: GpuBackend> Viewer<B> {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            lifecycle: LifecycleState::Uninitialized,
            backend: None,
            loader: None,
            state: ViewerSceneState::default(),
            style: SkeletonStyle::default(),
            mesh_seq: 0,
            skeleton_seq: 0,
            frame_loop_running: false,
            input_attached: false,
        }
    }

    pub fn with_skeleton_style(mut self, style: SkeletonStyle) -> Self {
        self.style = style;
        self
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn state(&self) -> &ViewerSceneState {
        &self.state
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn is_frame_loop_running(&self) -> bool {
        self.frame_loop_running
    }

    pub fn is_input_attached(&self) -> bool {
        self.input_attached
    }

    fn ensure_ready(&self) -> ViewerResult<()> {
        match self.lifecycle {
            LifecycleState::Ready => Ok(()),
            other => Err(ViewerError::invalid_state(format!("viewer is {other:?}"))),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Acquire the drawing surface, start the frame loop, issue the initial loads
    pub fn initialize(&mut self, mut backend: B, loader: AssetLoader) -> ViewerResult<()> {
        if self.lifecycle != LifecycleState::Uninitialized {
            return Err(ViewerError::invalid_state(format!(
                "initialize called in state {:?}",
                self.lifecycle
            )));
        }
        self.lifecycle = LifecycleState::Initializing;

        if let Err(e) = backend.create_surface() {
            error!("Viewer initialization failed: {e}");
            self.lifecycle = LifecycleState::Failed;
            return Err(match e {
                e @ ViewerError::PlatformUnsupported { .. } => e,
                other => ViewerError::PlatformUnsupported {
                    reason: other.to_string(),
                },
            });
        }

        self.backend = Some(backend);
        self.loader = Some(loader);
        self.state.lights = LightRig::default();
        self.state.wireframe = self.config.wireframe;
        view_mode::apply_view_mode(&mut self.state, self.config.view_mode);
        self.input_attached = true;
        self.frame_loop_running = true;

        let config = self.config.clone();
        self.issue_loads(&config);
        self.lifecycle = LifecycleState::Ready;
        info!("Viewer ready");
        Ok(())
    }

    /// Tear down exactly once: stop the loop, detach input, release the
    /// context, release every node's GPU objects, detach the surface.
    /// Failures are logged, never propagated.
    pub fn dispose(&mut self) {
        if self.lifecycle == LifecycleState::Disposed {
            return;
        }
        let was = self.lifecycle;
        self.lifecycle = LifecycleState::Disposed;

        self.frame_loop_running = false;
        if let Some(loader) = self.loader.as_mut() {
            loader.shutdown();
        }
        self.input_attached = false;
        self.state.interaction.reset();

        let nodes = self.state.nodes.drain();
        self.state.mesh = None;
        self.state.skeleton = None;

        match self.backend.as_mut() {
            Some(backend) => {
                backend.release_context();
                for node in &nodes {
                    if let Some(gpu) = node.gpu {
                        backend.release_geometry(gpu.geometry);
                        backend.release_material(gpu.material);
                    }
                }
                backend.detach_surface();
            }
            None if !nodes.is_empty() => warn!("disposing {} nodes without a backend", nodes.len()),
            None => {}
        }
        info!("Viewer disposed (was {was:?}, released {} nodes)", nodes.len());
    }

    // ── Loading ──────────────────────────────────────────────

    /// Replace the asset references and load them
    pub fn load_assets(&mut self, config: ViewerConfig) -> ViewerResult<()> {
        self.ensure_ready()?;
        self.config.mesh_asset = config.mesh_asset;
        self.config.compressed_mesh_asset = config.compressed_mesh_asset;
        self.config.skeleton_asset = config.skeleton_asset;
        self.config.edge_split = config.edge_split;
        self.state.errors.clear();
        let config = self.config.clone();
        self.issue_loads(&config);
        Ok(())
    }

    fn issue_loads(&mut self, config: &ViewerConfig) {
        if config.skeleton_asset.is_none() {
            self.remove_node(NodeRole::Skeleton);
        }
        if config.mesh_asset.is_none() && config.compressed_mesh_asset.is_none() {
            self.remove_node(NodeRole::Mesh);
        }

        let Some(loader) = self.loader.as_ref() else {
            return;
        };

        self.skeleton_seq += 1;
        if let Some(asset) = &config.skeleton_asset {
            loader.request(
                LoadTicket {
                    kind: AssetKind::Skeleton,
                    seq: self.skeleton_seq,
                },
                LoadRequest::Skeleton { asset: asset.clone() },
            );
        }

        self.mesh_seq += 1;
        if config.mesh_asset.is_some() || config.compressed_mesh_asset.is_some() {
            loader.request(
                LoadTicket {
                    kind: AssetKind::Mesh,
                    seq: self.mesh_seq,
                },
                LoadRequest::Mesh {
                    compressed: config.compressed_mesh_asset.clone(),
                    uncompressed: config.mesh_asset.clone(),
                    options: PrepareOptions {
                        edge_split: config.edge_split,
                        ..Default::default()
                    },
                },
            );
        }
        debug!("issued loads (skeleton seq {}, mesh seq {})", self.skeleton_seq, self.mesh_seq);
    }

    fn apply_completion(&mut self, completion: LoadCompletion) {
        let LoadCompletion { ticket, result } = completion;
        let current = match ticket.kind {
            AssetKind::Skeleton => self.skeleton_seq,
            AssetKind::Mesh => self.mesh_seq,
        };
        if ticket.seq != current {
            debug!("discarding stale {} load (seq {} != {current})", ticket.kind, ticket.seq);
            return;
        }

        match result {
            Ok(LoadedAsset::Skeleton { asset, reconstruction }) => {
                let mesh = build_skeleton_mesh(&reconstruction, &self.style);
                let Some(bounds) = Aabb::from_mesh(&mesh) else {
                    warn!("{}", ViewerError::EmptyGeometry { kind: AssetKind::Skeleton, asset });
                    return;
                };
                // SWC and surface share a source frame, so follow the mesh's offset when there is one
                let translation = match self.state.mesh_node() {
                    Some(mesh) => mesh.translation,
                    None => surface::centering_offset(&bounds, CENTER_EPSILON).unwrap_or(Vec3::ZERO),
                };
                let node = SceneNode {
                    role: NodeRole::Skeleton,
                    asset,
                    mesh,
                    bounds,
                    translation,
                    material: SurfaceMaterial::skeleton(),
                    visible: true,
                    gpu: None,
                    dirty: true,
                };
                if self.place_node(node) {
                    self.state.root_marker = reconstruction.root.map(|r| r.position);
                    self.after_load(FitContext::Skeleton);
                }
            }
            Ok(LoadedAsset::Mesh { asset, surface }) => {
                let PreparedSurface {
                    mesh,
                    bounds,
                    material,
                    dirty,
                } = surface;
                let mut node = SceneNode {
                    role: NodeRole::Mesh,
                    asset,
                    mesh,
                    bounds,
                    translation: Vec3::ZERO,
                    material,
                    visible: true,
                    gpu: None,
                    dirty,
                };
                if let Some(offset) = surface::centering_offset(&node.world_bounds(), CENTER_EPSILON) {
                    debug!("centering mesh by {offset:?}");
                    node.translation += offset;
                }
                let translation = node.translation;
                if self.place_node(node) {
                    self.align_skeleton(translation);
                    self.after_load(FitContext::Mesh);
                }
            }
            Err(e) if !e.is_user_visible() => warn!("{e}"),
            Err(e) => {
                error!("{e}");
                self.state.push_error(e);
            }
        }
    }

    /// Upload and insert a node, replacing the previous node of the same role
    fn place_node(&mut self, mut node: SceneNode) -> bool {
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };

        node.material.wireframe = self.state.wireframe;
        let geometry = match backend.upload_geometry(&node.mesh) {
            Ok(id) => id,
            Err(e) => {
                error!("geometry upload failed for {}: {e}", node.asset);
                self.state.push_error(e);
                return false;
            }
        };
        let material = match backend.create_material(&node.material) {
            Ok(id) => id,
            Err(e) => {
                backend.release_geometry(geometry);
                error!("material creation failed for {}: {e}", node.asset);
                self.state.push_error(e);
                return false;
            }
        };
        node.gpu = Some(GpuResources { geometry, material });
        node.dirty = false;

        let role = node.role;
        self.remove_node(role);

        let id = self.state.nodes.insert(node);
        match role {
            NodeRole::Mesh => self.state.mesh = Some(MeshNodeHandle(id)),
            NodeRole::Skeleton => self.state.skeleton = Some(SkeletonNodeHandle(id)),
        }
        view_mode::sync_visibility(&mut self.state);
        true
    }

    /// Drop the node of `role`, if any, and release its GPU objects
    fn remove_node(&mut self, role: NodeRole) {
        let previous = match role {
            NodeRole::Mesh => self.state.mesh.take().map(|h| h.id()),
            NodeRole::Skeleton => self.state.skeleton.take().map(|h| h.id()),
        };
        let Some(old) = previous.and_then(|id| self.state.nodes.remove(id)) else {
            return;
        };
        if role == NodeRole::Skeleton {
            self.state.root_marker = None;
        }
        if let (Some(backend), Some(gpu)) = (self.backend.as_mut(), old.gpu) {
            backend.release_geometry(gpu.geometry);
            backend.release_material(gpu.material);
        }
    }

    /// Move the skeleton into the mesh's centered frame
    fn align_skeleton(&mut self, translation: Vec3) {
        if let Some(skeleton) = self.state.skeleton_node_mut() {
            if skeleton.translation != translation {
                debug!("aligning skeleton to mesh frame: {:?} -> {translation:?}", skeleton.translation);
                skeleton.translation = translation;
            }
        }
    }

    /// Frame the freshly loaded node and rescale the lights
    fn after_load(&mut self, context: FitContext) {
        let node = match context {
            FitContext::Mesh => self.state.mesh_node(),
            FitContext::Skeleton => self.state.skeleton_node(),
        };
        let Some(bounds) = node.map(|n| n.world_bounds()) else {
            return;
        };

        let fit = fit::fit_aabb(&bounds, self.state.camera.fov, context);
        fit.apply(&mut self.state.camera);
        self.state.lights = LightRig::fit(fit.max_dim);
        self.state.capture_initial_pose();
        debug!("fitted camera: distance {:.3}, max_dim {:.3}", fit.distance, fit.max_dim);
    }

    // ── Frame loop ───────────────────────────────────────────

    /// Advance one frame: apply finished loads, step any animation, and
    /// describe what to draw.
    pub fn frame(&mut self, now: Duration, aspect: f32) -> ViewerResult<FrameOutput> {
        self.ensure_ready()?;

        let completions = self.loader.as_mut().map(|l| l.poll()).unwrap_or_default();
        for completion in completions {
            self.apply_completion(completion);
        }

        match self.state.interaction.handle(InteractionEvent::Tick(now)) {
            InteractionAction::Camera(pose) | InteractionAction::Finished(pose) => self.state.camera.set_pose(pose),
            _ => {}
        }

        let draws = self
            .state
            .nodes
            .iter()
            .filter(|n| n.visible)
            .filter_map(|n| {
                n.gpu.map(|gpu| DrawItem {
                    role: n.role,
                    geometry: gpu.geometry,
                    material: gpu.material,
                    translation: n.translation,
                })
            })
            .collect();

        let [r, g, b] = self.config.background_color;
        Ok(FrameOutput {
            view_projection: self.state.camera.view_projection(aspect.max(f32::EPSILON)),
            camera_position: self.state.camera.position,
            lights: self.state.lights.clone(),
            background: [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0],
            draws,
        })
    }

    // ── Interaction ──────────────────────────────────────────

    /// Feed a primary click at `pos` inside the viewport `rect`
    pub fn handle_click(&mut self, pos: egui::Pos2, rect: egui::Rect, now: Duration) -> ViewerResult<InteractionAction> {
        self.ensure_ready()?;
        let action = self.state.interaction.handle(InteractionEvent::Click(now));
        if action == InteractionAction::ResolveDouble {
            let ray = self.state.camera.screen_ray(pos, rect);
            self.resolve_double_click(&ray, now);
        }
        Ok(action)
    }

    fn resolve_double_click(&mut self, ray: &Ray, now: Duration) {
        let destination = match self.state.pick(ray) {
            Some(hit) => {
                debug!("double-click hit at {hit:?}");
                Some(focus_pose(self.state.camera.position, hit, self.config.focus_ratio()))
            }
            None => self.restore_pose(),
        };
        if let Some(to) = destination {
            self.begin_animation(to, now);
        }
    }

    /// Initial pose if captured, else a fresh fit of the visible node
    fn restore_pose(&mut self) -> Option<CameraPose> {
        if let Some(pose) = self.state.initial_pose {
            return Some(pose);
        }
        let fit = self.state.fit_visible()?;
        fit.apply_limits(&mut self.state.camera);
        Some(fit.pose())
    }

    fn begin_animation(&mut self, to: CameraPose, now: Duration) -> bool {
        let tween = CameraTween::new(now, self.state.camera.pose(), to);
        match self.state.interaction.handle(InteractionEvent::Begin(tween)) {
            InteractionAction::Started => true,
            _ => {
                debug!("camera animation rejected, one is already running");
                false
            }
        }
    }

    /// Animate back to the initial view. Returns whether an animation started.
    pub fn reset_view(&mut self, now: Duration) -> ViewerResult<bool> {
        self.ensure_ready()?;
        if self.state.animation_in_flight() {
            return Ok(false);
        }
        Ok(match self.restore_pose() {
            Some(to) => self.begin_animation(to, now),
            None => false,
        })
    }

    /// Animate to the skeleton's root marker
    pub fn focus_root(&mut self, now: Duration) -> ViewerResult<bool> {
        self.ensure_ready()?;
        let Some(root) = self.state.root_world() else {
            return Ok(false);
        };
        if self.state.animation_in_flight() {
            return Ok(false);
        }

        let camera = &self.state.camera;
        let distance = self.style.marker_radius / (camera.fov * 0.5).tan() * ROOT_FOCUS_FACTOR;
        let dir = (camera.position - camera.target).normalize_or_zero();
        let dir = if dir == Vec3::ZERO { Vec3::Z } else { dir };
        let to = CameraPose {
            position: root + dir * distance,
            target: root,
        };
        Ok(self.begin_animation(to, now))
    }

    pub fn orbit(&mut self, dx: f32, dy: f32) {
        if self.lifecycle == LifecycleState::Ready && !self.state.animation_in_flight() {
            self.state.camera.rotate(dx, dy);
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        if self.lifecycle == LifecycleState::Ready && !self.state.animation_in_flight() {
            self.state.camera.pan(dx, dy);
        }
    }

    pub fn zoom(&mut self, delta: f32) {
        if self.lifecycle == LifecycleState::Ready && !self.state.animation_in_flight() {
            self.state.camera.zoom(delta);
        }
    }

    // ── Reactive configuration ───────────────────────────────

    pub fn set_view_mode(&mut self, mode: ViewMode) -> ViewerResult<()> {
        self.ensure_ready()?;
        self.config.view_mode = mode;
        view_mode::apply_view_mode(&mut self.state, mode);
        Ok(())
    }

    pub fn set_wireframe(&mut self, enabled: bool) -> ViewerResult<()> {
        self.ensure_ready()?;
        self.config.wireframe = enabled;
        self.state.wireframe = enabled;

        let Some(backend) = self.backend.as_mut() else {
            return Ok(());
        };
        for node in self.state.nodes.iter_mut() {
            node.material.wireframe = enabled;
            if let Some(gpu) = node.gpu {
                backend.update_material(gpu.material, &node.material);
            }
        }
        Ok(())
    }

    pub fn toggle_wireframe(&mut self) -> ViewerResult<bool> {
        let enabled = !self.state.wireframe;
        self.set_wireframe(enabled)?;
        Ok(enabled)
    }

    /// Prepared surface mesh and its node translation, for export
    pub fn mesh_geometry(&self) -> Option<(&MeshData, Vec3)> {
        self.state.mesh_node().map(|n| (&n.mesh, n.translation))
    }

    /// Drain user-visible errors
    pub fn take_errors(&mut self) -> Vec<ViewerError> {
        std::mem::take(&mut self.state.errors)
    }
}

impl<B: GpuBackend> Drop for Viewer<B> {
    fn drop(&mut self) {
        if self.lifecycle != LifecycleState::Uninitialized {
            self.dispose();
        }
    }
}
