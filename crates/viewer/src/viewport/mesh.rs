use glam::{Quat, Vec3};

/// Floats per vertex in [`MeshData::vertices`]
pub const STRIDE: usize = 9;

/// CPU-side mesh data: interleaved [pos.x, pos.y, pos.z, norm.x, norm.y, norm.z, r, g, b]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// 9 floats per vertex: position(3) + normal(3) + color(3)
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn position(&self, i: usize) -> Vec3 {
        let b = i * STRIDE;
        Vec3::new(self.vertices[b], self.vertices[b + 1], self.vertices[b + 2])
    }

    pub fn normal(&self, i: usize) -> Vec3 {
        let b = i * STRIDE + 3;
        Vec3::new(self.vertices[b], self.vertices[b + 1], self.vertices[b + 2])
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.vertex_count()).map(|i| self.position(i))
    }

    /// Vertex positions of triangle `tri`
    pub fn triangle(&self, tri: usize) -> [Vec3; 3] {
        let i = &self.indices[tri * 3..tri * 3 + 3];
        [
            self.position(i[0] as usize),
            self.position(i[1] as usize),
            self.position(i[2] as usize),
        ]
    }

    /// Build from separate position / normal arrays sharing one index buffer
    pub fn from_indexed(positions: &[Vec3], normals: &[Vec3], indices: Vec<u32>, color: [f32; 3]) -> Self {
        let mut vertices = Vec::with_capacity(positions.len() * STRIDE);
        for (i, p) in positions.iter().enumerate() {
            let n = normals.get(i).copied().unwrap_or(Vec3::Y);
            push_vert(&mut vertices, *p, n, color);
        }
        Self { vertices, indices }
    }

    /// Append another mesh, offsetting its indices
    pub fn append(&mut self, other: &MeshData) {
        let base = self.vertex_count() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Overwrite the color channel of every vertex
    pub fn set_color(&mut self, color: [f32; 3]) {
        for v in self.vertices.chunks_exact_mut(STRIDE) {
            v[6..9].copy_from_slice(&color);
        }
    }
}

// ── Primitive generation ─────────────────────────────────────

pub fn sphere(center: Vec3, radius: f32, rings: u32, sectors: u32, color: [f32; 3]) -> MeshData {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for r in 0..=rings {
        let phi = std::f32::consts::PI * r as f32 / rings as f32;
        let sp = phi.sin();
        let cp = phi.cos();

        for s in 0..=sectors {
            let theta = std::f32::consts::TAU * s as f32 / sectors as f32;
            let n = Vec3::new(sp * theta.cos(), cp, sp * theta.sin());
            push_vert(&mut vertices, center + n * radius, n, color);
        }
    }

    for r in 0..rings {
        for s in 0..sectors {
            let i0 = r * (sectors + 1) + s;
            let i1 = i0 + 1;
            let i2 = i0 + sectors + 1;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }

    MeshData { vertices, indices }
}

/// Tapered cylinder from `start` (radius `r_start`) to `end` (radius `r_end`), capped.
///
/// Returns an empty mesh when the two points coincide.
pub fn frustum(start: Vec3, r_start: f32, end: Vec3, r_end: f32, segments: u32, color: [f32; 3]) -> MeshData {
    let axis = end - start;
    let length = axis.length();
    if length <= f32::EPSILON {
        return MeshData::default();
    }

    let rotation = Quat::from_rotation_arc(Vec3::Y, axis / length);
    let place = |p: Vec3| start + rotation * p;
    let orient = |n: Vec3| unit_or_up(rotation * n);

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let slope = (r_start - r_end) / length;

    for i in 0..segments {
        let a0 = (i as f32) * std::f32::consts::TAU / segments as f32;
        let a1 = ((i + 1) as f32) * std::f32::consts::TAU / segments as f32;
        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();

        let n0 = orient(Vec3::new(c0, slope, s0).normalize());
        let n1 = orient(Vec3::new(c1, slope, s1).normalize());

        let base = (vertices.len() / STRIDE) as u32;
        push_vert(&mut vertices, place(Vec3::new(r_start * c0, 0.0, r_start * s0)), n0, color);
        push_vert(&mut vertices, place(Vec3::new(r_start * c1, 0.0, r_start * s1)), n1, color);
        push_vert(&mut vertices, place(Vec3::new(r_end * c1, length, r_end * s1)), n1, color);
        push_vert(&mut vertices, place(Vec3::new(r_end * c0, length, r_end * s0)), n0, color);

        indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    }

    add_cap(&mut vertices, &mut indices, r_end, length, segments, true, &place, orient(Vec3::Y), color);
    add_cap(&mut vertices, &mut indices, r_start, 0.0, segments, false, &place, orient(Vec3::NEG_Y), color);

    MeshData { vertices, indices }
}

// ── Helpers ──────────────────────────────────────────────────

/// Normalize, falling back to +Y for zero-length input
pub fn unit_or_up(v: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n == Vec3::ZERO {
        Vec3::Y
    } else {
        n
    }
}

fn push_vert(v: &mut Vec<f32>, p: Vec3, n: Vec3, c: [f32; 3]) {
    v.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, c[0], c[1], c[2]]);
}

#[allow(clippy::too_many_arguments)]
fn add_cap(
    vertices: &mut Vec<f32>,
    indices: &mut Vec<u32>,
    radius: f32,
    y: f32,
    segments: u32,
    facing_up: bool,
    place: &dyn Fn(Vec3) -> Vec3,
    normal: Vec3,
    color: [f32; 3],
) {
    if radius <= 0.0 {
        return;
    }
    let center_idx = (vertices.len() / STRIDE) as u32;
    push_vert(vertices, place(Vec3::new(0.0, y, 0.0)), normal, color);

    for i in 0..segments {
        let angle = (i as f32) * std::f32::consts::TAU / segments as f32;
        let p = Vec3::new(radius * angle.cos(), y, radius * angle.sin());
        push_vert(vertices, place(p), normal, color);
    }

    for i in 0..segments {
        let next = (i + 1) % segments;
        if facing_up {
            indices.extend_from_slice(&[center_idx, center_idx + 1 + next, center_idx + 1 + i]);
        } else {
            indices.extend_from_slice(&[center_idx, center_idx + 1 + i, center_idx + 1 + next]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frustum_spans_endpoints() {
        let m = frustum(Vec3::ZERO, 1.0, Vec3::new(1.0, 0.0, 0.0), 0.5, 8, [1.0, 0.0, 0.0]);
        assert!(!m.is_empty());
        let min_x = m.positions().map(|p| p.x).fold(f32::MAX, f32::min);
        let max_x = m.positions().map(|p| p.x).fold(f32::MIN, f32::max);
        assert_relative_eq!(min_x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(max_x, 1.0, epsilon = 1e-5);

        // child end keeps radius 1.0, parent end 0.5
        let max_y_at_start = m
            .positions()
            .filter(|p| p.x.abs() < 1e-4)
            .map(|p| p.y.abs())
            .fold(0.0, f32::max);
        let max_y_at_end = m
            .positions()
            .filter(|p| (p.x - 1.0).abs() < 1e-4)
            .map(|p| p.y.abs())
            .fold(0.0, f32::max);
        assert_relative_eq!(max_y_at_start, 1.0, epsilon = 1e-4);
        assert_relative_eq!(max_y_at_end, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_frustum_degenerate_is_empty() {
        let p = Vec3::new(3.0, 2.0, 1.0);
        assert!(frustum(p, 1.0, p, 1.0, 8, [1.0; 3]).is_empty());
    }

    #[test]
    fn test_sphere_radius() {
        let c = Vec3::new(1.0, 2.0, 3.0);
        let m = sphere(c, 2.0, 8, 8, [1.0; 3]);
        for p in m.positions() {
            assert_relative_eq!((p - c).length(), 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_append_offsets_indices() {
        let mut a = sphere(Vec3::ZERO, 1.0, 4, 4, [1.0; 3]);
        let count = a.vertex_count() as u32;
        let b = sphere(Vec3::X, 1.0, 4, 4, [1.0; 3]);
        a.append(&b);
        assert_eq!(a.vertex_count(), 2 * count as usize);
        assert!(a.indices.iter().any(|&i| i >= count));
        assert!(a.indices.iter().all(|&i| (i as usize) < a.vertex_count()));
    }
}
