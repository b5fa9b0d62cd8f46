use std::fmt::Write;

use glam::Vec3;

use crate::viewport::mesh::MeshData;

/// Write a mesh as Wavefront OBJ text.
///
/// Positions are written in world space (`translation` applied). Faces
/// reference position and normal by the same 1-based index (`f a//a b//b c//c`).
pub fn mesh_to_obj(mesh: &MeshData, translation: Vec3) -> String {
    let mut out = String::with_capacity(mesh.vertices.len() * 12);
    let _ = writeln!(out, "# {} vertices, {} faces", mesh.vertex_count(), mesh.triangle_count());

    for i in 0..mesh.vertex_count() {
        let p = mesh.position(i) + translation;
        let _ = writeln!(out, "v {} {} {}", p.x, p.y, p.z);
    }
    for i in 0..mesh.vertex_count() {
        let n = mesh.normal(i);
        let _ = writeln!(out, "vn {} {} {}", n.x, n.y, n.z);
    }
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
        let _ = writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}");
    }

    out
}
