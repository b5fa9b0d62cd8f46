//! Headless harness: drives a `Viewer` against a recording GPU backend.
//!
//! The backend log is shared through `Arc<Mutex<..>>` so tests can inspect
//! release order and leaks after the viewer has been disposed or dropped.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use shared::ViewerConfig;

use crate::backend::{GeometryId, GpuBackend, MaterialId};
use crate::error::{ViewerError, ViewerResult};
use crate::fixtures;
use crate::loader::{AssetLoader, MemorySource};
use crate::surface::{GeometryDecoder, SurfaceMaterial};
use crate::validation::MeshValidator;
use crate::viewer::{FrameOutput, Viewer};
use crate::viewport::camera::CameraPose;
use crate::viewport::interaction::InteractionAction;
use crate::viewport::mesh::MeshData;
use crate::viewport::tween::ANIMATION_DURATION;

/// One recorded backend call
#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    CreateSurface,
    UploadGeometry(GeometryId),
    CreateMaterial(MaterialId),
    UpdateMaterial { id: MaterialId, wireframe: bool },
    ReleaseGeometry(GeometryId),
    ReleaseMaterial(MaterialId),
    ReleaseContext,
    DetachSurface,
}

#[derive(Debug, Default)]
pub struct BackendLog {
    pub events: Vec<BackendEvent>,
    pub live_geometry: BTreeSet<GeometryId>,
    pub live_materials: BTreeSet<MaterialId>,
    /// Releases of handles that were not live
    pub double_frees: usize,
}

impl BackendLog {
    pub fn count(&self, pred: impl Fn(&BackendEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn position(&self, event: &BackendEvent) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    /// Nothing left allocated
    pub fn is_clean(&self) -> bool {
        self.live_geometry.is_empty() && self.live_materials.is_empty() && self.double_frees == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct SharedLog(Arc<Mutex<BackendLog>>);

impl SharedLog {
    pub fn lock(&self) -> MutexGuard<'_, BackendLog> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `GpuBackend` that records calls instead of touching a GPU
#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: SharedLog,
    next_id: u64,
    fail_surface: bool,
}

impl RecordingBackend {
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            next_id: 0,
            fail_surface: false,
        }
    }

    /// Backend whose surface creation always fails
    pub fn unsupported(log: SharedLog) -> Self {
        Self {
            fail_surface: true,
            ..Self::new(log)
        }
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    fn create_surface(&mut self) -> ViewerResult<()> {
        self.log.lock().events.push(BackendEvent::CreateSurface);
        if self.fail_surface {
            return Err(ViewerError::PlatformUnsupported {
                reason: "no GPU context available".into(),
            });
        }
        Ok(())
    }

    fn upload_geometry(&mut self, _mesh: &MeshData) -> ViewerResult<GeometryId> {
        let id = GeometryId(self.next());
        let mut log = self.log.lock();
        log.events.push(BackendEvent::UploadGeometry(id));
        log.live_geometry.insert(id);
        Ok(id)
    }

    fn create_material(&mut self, _material: &SurfaceMaterial) -> ViewerResult<MaterialId> {
        let id = MaterialId(self.next());
        let mut log = self.log.lock();
        log.events.push(BackendEvent::CreateMaterial(id));
        log.live_materials.insert(id);
        Ok(id)
    }

    fn update_material(&mut self, id: MaterialId, material: &SurfaceMaterial) {
        self.log.lock().events.push(BackendEvent::UpdateMaterial {
            id,
            wireframe: material.wireframe,
        });
    }

    fn release_geometry(&mut self, id: GeometryId) {
        let mut log = self.log.lock();
        log.events.push(BackendEvent::ReleaseGeometry(id));
        if !log.live_geometry.remove(&id) {
            log.double_frees += 1;
        }
    }

    fn release_material(&mut self, id: MaterialId) {
        let mut log = self.log.lock();
        log.events.push(BackendEvent::ReleaseMaterial(id));
        if !log.live_materials.remove(&id) {
            log.double_frees += 1;
        }
    }

    fn release_context(&mut self) {
        self.log.lock().events.push(BackendEvent::ReleaseContext);
    }

    fn detach_surface(&mut self) {
        self.log.lock().events.push(BackendEvent::DetachSurface);
    }
}

/// Viewer plus a recording backend, an in-memory asset source, and a manual clock
pub struct ViewerHarness {
    pub viewer: Viewer<RecordingBackend>,
    pub log: SharedLog,
    pub clock: Duration,
    pub rect: egui::Rect,
}

impl ViewerHarness {
    /// Initialize a viewer over `source`; loads complete on the first frame.
    pub fn new(config: ViewerConfig, source: MemorySource) -> ViewerResult<Self> {
        Self::build(config, AssetLoader::inline(Arc::new(source)))
    }

    pub fn with_decoder(
        config: ViewerConfig,
        source: MemorySource,
        decoder: Arc<dyn GeometryDecoder>,
    ) -> ViewerResult<Self> {
        Self::build(config, AssetLoader::inline(Arc::new(source)).with_decoder(decoder))
    }

    fn build(config: ViewerConfig, loader: AssetLoader) -> ViewerResult<Self> {
        let log = SharedLog::default();
        let mut viewer = Viewer::new(config);
        viewer.initialize(RecordingBackend::new(log.clone()), loader)?;
        Ok(Self {
            viewer,
            log,
            clock: Duration::ZERO,
            rect: fixtures::viewport_rect(),
        })
    }

    // ── Clock / frames ────────────────────────────────────────

    /// Advance the clock by `ms` and run one frame
    pub fn step(&mut self, ms: u64) -> ViewerResult<FrameOutput> {
        self.clock += Duration::from_millis(ms);
        let aspect = self.rect.width() / self.rect.height();
        self.viewer.frame(self.clock, aspect)
    }

    /// Run frames at ~60Hz until no animation is in flight
    pub fn settle(&mut self) -> ViewerResult<()> {
        let max_frames = ANIMATION_DURATION.as_millis() as u64 / 16 + 4;
        for _ in 0..max_frames {
            self.step(16)?;
            if !self.viewer.state().animation_in_flight() {
                return Ok(());
            }
        }
        Err(ViewerError::invalid_state("animation did not finish"))
    }

    // ── Input ─────────────────────────────────────────────────

    pub fn click_at(&mut self, pos: egui::Pos2) -> ViewerResult<InteractionAction> {
        self.viewer.handle_click(pos, self.rect, self.clock)
    }

    /// Two clicks `gap_ms` apart at `pos`; returns the second click's action
    pub fn double_click_at(&mut self, pos: egui::Pos2, gap_ms: u64) -> ViewerResult<InteractionAction> {
        self.click_at(pos)?;
        self.clock += Duration::from_millis(gap_ms);
        self.click_at(pos)
    }

    /// Double-click just off the viewport center, away from where box diagonals meet
    pub fn double_click_center(&mut self) -> ViewerResult<InteractionAction> {
        self.double_click_at(self.rect.center() + egui::vec2(12.0, 7.0), 100)
    }

    /// Double-click near the top-left corner, where fitted models leave empty space
    pub fn double_click_empty(&mut self) -> ViewerResult<InteractionAction> {
        self.double_click_at(self.rect.min + egui::vec2(2.0, 2.0), 100)
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn pose(&self) -> CameraPose {
        self.viewer.state().camera.pose()
    }

    /// Validation errors of the loaded surface mesh, if any
    pub fn validate_mesh(&self) -> Vec<String> {
        self.viewer
            .mesh_geometry()
            .map(|(mesh, _)| MeshValidator::new(mesh).validate_all())
            .unwrap_or_default()
    }
}
