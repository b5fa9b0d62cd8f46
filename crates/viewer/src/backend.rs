//! GPU seam between the viewer core and a concrete renderer.
//!
//! The desktop binary implements this over glow; the headless harness uses a
//! recording implementation that tracks every live handle.

use crate::error::ViewerResult;
use crate::surface::SurfaceMaterial;
use crate::viewport::mesh::MeshData;

/// Handle to an uploaded vertex/index buffer pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

/// Handle to a material parameter block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

pub trait GpuBackend {
    /// Acquire a drawing surface. Errors here are fatal for the viewer.
    fn create_surface(&mut self) -> ViewerResult<()>;

    fn upload_geometry(&mut self, mesh: &MeshData) -> ViewerResult<GeometryId>;

    fn create_material(&mut self, material: &SurfaceMaterial) -> ViewerResult<MaterialId>;

    fn update_material(&mut self, id: MaterialId, material: &SurfaceMaterial);

    fn release_geometry(&mut self, id: GeometryId);

    fn release_material(&mut self, id: MaterialId);

    /// Give up the rendering context. Called once, during teardown.
    fn release_context(&mut self);

    /// Remove the drawing surface from its host. Last teardown step.
    fn detach_surface(&mut self);
}
