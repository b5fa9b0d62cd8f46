//! Integrity checks for prepared `MeshData`.

use glam::Vec3;

use crate::viewport::mesh::{MeshData, STRIDE};
use crate::viewport::picking::Aabb;

/// Validator for `MeshData` integrity checks.
pub struct MeshValidator<'a> {
    mesh: &'a MeshData,
}

impl<'a> MeshValidator<'a> {
    pub fn new(mesh: &'a MeshData) -> Self {
        Self { mesh }
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// Vertex buffer length is a whole number of vertices
    pub fn is_stride_valid(&self) -> bool {
        self.mesh.vertices.len() % STRIDE == 0
    }

    pub fn is_index_stride_valid(&self) -> bool {
        self.mesh.indices.len() % 3 == 0
    }

    pub fn are_indices_in_range(&self) -> bool {
        let max_idx = self.vertex_count() as u32;
        self.mesh.indices.iter().all(|&i| i < max_idx)
    }

    /// Every vertex normal has unit length within `epsilon`
    pub fn are_normals_normalized(&self, epsilon: f32) -> bool {
        (0..self.vertex_count()).all(|i| (self.mesh.normal(i).length() - 1.0).abs() <= epsilon)
    }

    /// Triangles with (near) zero area
    pub fn degenerate_triangle_count(&self) -> usize {
        (0..self.triangle_count())
            .filter(|&t| {
                let [a, b, c] = self.mesh.triangle(t);
                (b - a).cross(c - a).length_squared() <= f32::EPSILON * f32::EPSILON
            })
            .count()
    }

    pub fn aabb(&self) -> Option<Aabb> {
        Aabb::from_mesh(self.mesh)
    }

    /// Bounding box center after applying `translation` is within `epsilon` of the origin
    pub fn is_centered(&self, translation: Vec3, epsilon: f32) -> bool {
        self.aabb()
            .map(|b| b.translated(translation).center().abs().max_element() <= epsilon)
            .unwrap_or(false)
    }

    /// All vertices carry the same color
    pub fn is_uniform_color(&self) -> bool {
        let mut colors = self.mesh.vertices.chunks_exact(STRIDE).map(|v| [v[6], v[7], v[8]]);
        match colors.next() {
            Some(first) => colors.all(|c| c == first),
            None => true,
        }
    }

    /// Run all validation checks and return a list of error messages.
    /// An empty list means the mesh is valid.
    pub fn validate_all(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.is_stride_valid() {
            errors.push(format!(
                "Vertex buffer length {} is not a multiple of {STRIDE}",
                self.mesh.vertices.len()
            ));
            // remaining checks index into the buffer
            return errors;
        }

        if !self.is_index_stride_valid() {
            errors.push(format!(
                "Index buffer length {} is not a multiple of 3",
                self.mesh.indices.len()
            ));
        }

        if !self.are_indices_in_range() {
            let max_idx = self.vertex_count() as u32;
            let out_of_range: Vec<_> = self.mesh.indices.iter().filter(|&&i| i >= max_idx).take(5).collect();
            errors.push(format!(
                "Indices out of range (vertex_count={max_idx}): {out_of_range:?}"
            ));
        }

        if self.vertex_count() > 0 && !self.are_normals_normalized(1e-3) {
            errors.push("Some normals are not unit-length (epsilon=1e-3)".to_string());
        }

        errors
    }
}
