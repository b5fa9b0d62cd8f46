//! Factory functions for test data: SWC text, meshes, and prepared scene state.

use glam::Vec3;
use shared::ViewerConfig;

use crate::state::{MeshNodeHandle, NodeRole, SceneNode, SkeletonNodeHandle, ViewerSceneState};
use crate::surface::{RawSurface, SurfaceMaterial};
use crate::viewport::mesh;
use crate::viewport::picking::Aabb;

// ── SWC text ─────────────────────────────────────────────────

/// Root plus one child one unit along +X
pub const SWC_SIMPLE: &str = "\
# simple two-sample skeleton
1 1 0 0 0 1.0 -1
2 1 1 0 0 0.5 1
";

/// Small branched neuron with mixed neurite types
pub const SWC_BRANCHED: &str = "\
# id type x y z radius parent
1 1 0 0 0 4.0 -1
2 3 5 0 0 1.0 1
3 3 10 2 0 0.8 2
4 3 10 -2 0 0.8 2
5 2 -5 0 0 0.6 1
6 2 -12 0 1 0.5 5
7 4 0 8 0 1.2 1
8 4 0 8 0 1.0 7
9 4 0 15 0 0.9 8
10 3 3 3 3 0.5 42
";

/// Two records with parent -1; the second one's sub-tree is detached
pub const SWC_TWO_ROOTS: &str = "\
1 1 0 0 0 1 -1
2 3 1 0 0 0.5 1
10 1 5 5 5 1 -1
11 3 6 5 5 0.5 10
";

/// Soma away from the origin, in the same frame as `cube_obj_at(OFFSET_SOMA, ..)`
pub const SWC_OFFSET: &str = "\
1 1 100 100 100 1.0 -1
2 3 102 100 100 0.5 1
3 3 100 104 100 0.5 1
";

pub const OFFSET_SOMA: Vec3 = Vec3::new(100.0, 100.0, 100.0);

// ── Meshes ───────────────────────────────────────────────────

/// Unit-half-size cube centered at the origin, 8 shared vertices, outward winding
pub const CUBE_OBJ: &str = "\
# cube
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
f 1 4 3
f 1 3 2
f 5 6 7
f 5 7 8
f 1 2 6
f 1 6 5
f 4 8 7
f 4 7 3
f 1 5 8
f 1 8 4
f 2 3 7
f 2 7 6
";

const CUBE_FACES: [u32; 36] = [
    0, 3, 2, 0, 2, 1, // -Z
    4, 5, 6, 4, 6, 7, // +Z
    0, 1, 5, 0, 5, 4, // -Y
    3, 7, 6, 3, 6, 2, // +Y
    0, 4, 7, 0, 7, 3, // -X
    1, 2, 6, 1, 6, 5, // +X
];

/// Cube with half extent `half` centered at the origin
pub fn cube_surface(half: f32) -> RawSurface {
    cube_surface_at(Vec3::ZERO, half)
}

/// Cube with half extent `half` centered at `center`
pub fn cube_surface_at(center: Vec3, half: f32) -> RawSurface {
    let h = half;
    let corners = [
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, h, -h),
        Vec3::new(-h, h, -h),
        Vec3::new(-h, -h, h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(-h, h, h),
    ];
    RawSurface {
        positions: corners.iter().map(|c| *c + center).collect(),
        indices: CUBE_FACES.to_vec(),
        normals: None,
        tangents: None,
    }
}

/// Cube as OBJ text with half extent `half` centered at `center`
pub fn cube_obj_at(center: Vec3, half: f32) -> String {
    let raw = cube_surface_at(center, half);
    let mut out = String::new();
    for p in &raw.positions {
        out.push_str(&format!("v {} {} {}\n", p.x, p.y, p.z));
    }
    for tri in raw.indices.chunks_exact(3) {
        out.push_str(&format!("f {} {} {}\n", tri[0] + 1, tri[1] + 1, tri[2] + 1));
    }
    out
}

// ── Config / state ───────────────────────────────────────────

pub fn config_skeleton(asset: &str) -> ViewerConfig {
    ViewerConfig {
        skeleton_asset: Some(asset.to_string()),
        ..Default::default()
    }
}

pub fn config_mesh(asset: &str) -> ViewerConfig {
    ViewerConfig {
        mesh_asset: Some(asset.to_string()),
        ..Default::default()
    }
}

pub fn config_both(skeleton: &str, mesh: &str) -> ViewerConfig {
    ViewerConfig {
        skeleton_asset: Some(skeleton.to_string()),
        mesh_asset: Some(mesh.to_string()),
        ..Default::default()
    }
}

/// An 800x600 viewport rectangle at the origin
pub fn viewport_rect() -> egui::Rect {
    egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0))
}

fn sphere_node(role: NodeRole, center: Vec3, material: SurfaceMaterial) -> SceneNode {
    let m = mesh::sphere(center, 1.0, 12, 12, material.base_color);
    let bounds = Aabb::from_points(m.positions()).unwrap_or(Aabb {
        min: center,
        max: center,
    });
    SceneNode {
        role,
        asset: format!("{role:?}"),
        mesh: m,
        bounds,
        translation: Vec3::ZERO,
        material,
        visible: true,
        gpu: None,
        dirty: true,
    }
}

/// Scene state holding a mesh node and a skeleton node (no GPU objects)
pub fn state_with_both_nodes() -> ViewerSceneState {
    let mut state = ViewerSceneState::default();
    let mesh_id = state
        .nodes
        .insert(sphere_node(NodeRole::Mesh, Vec3::ZERO, SurfaceMaterial::surface()));
    let skeleton_id = state.nodes.insert(sphere_node(
        NodeRole::Skeleton,
        Vec3::new(0.0, 3.0, 0.0),
        SurfaceMaterial::skeleton(),
    ));
    state.mesh = Some(MeshNodeHandle(mesh_id));
    state.skeleton = Some(SkeletonNodeHandle(skeleton_id));
    state
}
