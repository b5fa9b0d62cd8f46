pub mod scene;
pub mod settings;

use glam::Vec3;
use shared::ViewMode;

pub use scene::{MeshNodeHandle, NodeRole, SceneArena, SceneNode, SkeletonNodeHandle};
pub use settings::ViewerSettings;

use crate::error::ViewerError;
use crate::viewport::camera::{CameraPose, OrbitCamera};
use crate::viewport::fit::{self, CameraFit, FitContext};
use crate::viewport::interaction::Interaction;
use crate::viewport::lighting::LightRig;
use crate::viewport::picking::{pick_triangle, Ray};

/// Per-viewer state, owned by the `Viewer` and passed by reference to the
/// components that act on it.
#[derive(Default)]
pub struct ViewerSceneState {
    pub camera: OrbitCamera,
    /// Captured after the first successful load, never overwritten
    pub initial_pose: Option<CameraPose>,
    pub view_mode: ViewMode,
    pub wireframe: bool,
    pub interaction: Interaction,
    pub nodes: SceneArena,
    pub mesh: Option<MeshNodeHandle>,
    pub skeleton: Option<SkeletonNodeHandle>,
    pub lights: LightRig,
    /// Skeleton root marker in the source frame, before node translation
    pub root_marker: Option<Vec3>,
    /// User-visible load errors, oldest first
    pub errors: Vec<ViewerError>,
}

impl ViewerSceneState {
    pub fn mesh_node(&self) -> Option<&SceneNode> {
        self.mesh.and_then(|h| self.nodes.get(h.id()))
    }

    pub fn skeleton_node(&self) -> Option<&SceneNode> {
        self.skeleton.and_then(|h| self.nodes.get(h.id()))
    }

    pub fn skeleton_node_mut(&mut self) -> Option<&mut SceneNode> {
        self.skeleton.and_then(|h| self.nodes.get_mut(h.id()))
    }

    /// Root marker with the skeleton's translation applied
    pub fn root_world(&self) -> Option<Vec3> {
        let skeleton = self.skeleton_node()?;
        self.root_marker.map(|r| r + skeleton.translation)
    }

    pub fn animation_in_flight(&self) -> bool {
        self.interaction.is_animating()
    }

    /// Record the restore pose unless one was already captured
    pub fn capture_initial_pose(&mut self) {
        if self.initial_pose.is_none() {
            self.initial_pose = Some(self.camera.pose());
        }
    }

    /// Fit for whichever node is currently shown, mesh preferred
    pub fn fit_visible(&self) -> Option<CameraFit> {
        let fov = self.camera.fov;
        if let Some(node) = self.mesh_node().filter(|n| n.visible) {
            return Some(fit::fit_aabb(&node.world_bounds(), fov, FitContext::Mesh));
        }
        self.skeleton_node()
            .filter(|n| n.visible)
            .map(|node| fit::fit_aabb(&node.world_bounds(), fov, FitContext::Skeleton))
    }

    /// Nearest hit on the visible mesh and skeleton geometry
    pub fn pick(&self, ray: &Ray) -> Option<Vec3> {
        [self.mesh_node(), self.skeleton_node()]
            .into_iter()
            .flatten()
            .filter(|n| n.visible)
            .filter_map(|n| pick_triangle(ray, &n.mesh, Some(&n.bounds), n.translation))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .map(|hit| hit.point)
    }

    pub fn push_error(&mut self, error: ViewerError) {
        self.errors.push(error);
    }
}
