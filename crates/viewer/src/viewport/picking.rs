use glam::Vec3;

use super::mesh::MeshData;

/// A ray in world space
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Bounding box of a point set, `None` when empty
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self { min: first, max: first };
        for p in iter {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        Some(aabb)
    }

    /// Compute AABB from MeshData (9 floats per vertex: pos+normal+color)
    pub fn from_mesh(data: &MeshData) -> Option<Self> {
        Self::from_points(data.positions())
    }

    /// Center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest extent along any axis
    pub fn max_dim(&self) -> f32 {
        self.size().max_element()
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Ray-AABB intersection using the slab method.
/// Returns the distance along the ray to the nearest hit, or None.
///
/// An axis the ray runs parallel to only constrains the origin, which
/// keeps `0 * inf` out of the interval math.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let mut tmin = f32::NEG_INFINITY;
    let mut tmax = f32::INFINITY;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if dir == 0.0 {
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let t1 = (lo - origin) * inv;
        let t2 = (hi - origin) * inv;
        tmin = tmin.max(t1.min(t2));
        tmax = tmax.min(t1.max(t2));
    }

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Möller-Trumbore ray-triangle intersection algorithm.
/// Returns the distance along the ray if hit, or None if no intersection.
pub fn ray_triangle_intersect(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    // Intersection is behind ray origin
    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Nearest intersection of a ray with a mesh
#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    /// Index of the triangle (into mesh.indices / 3)
    pub triangle_index: usize,
    /// Distance from ray origin to hit point
    pub distance: f32,
    /// World-space hit point
    pub point: Vec3,
}

/// Find the nearest triangle of `mesh` (placed at `offset`) hit by the ray.
///
/// The mesh bounding box is tested first so rays that miss the node never
/// walk its triangles.
pub fn pick_triangle(ray: &Ray, mesh: &MeshData, bounds: Option<&Aabb>, offset: Vec3) -> Option<TriangleHit> {
    if let Some(aabb) = bounds {
        ray_aabb(ray, &aabb.translated(offset))?;
    }

    let mut best: Option<TriangleHit> = None;

    for tri_idx in 0..mesh.triangle_count() {
        let [v0, v1, v2] = mesh.triangle(tri_idx);
        if let Some(dist) = ray_triangle_intersect(ray, v0 + offset, v1 + offset, v2 + offset) {
            if best.as_ref().is_none_or(|b| dist < b.distance) {
                best = Some(TriangleHit {
                    triangle_index: tri_idx,
                    distance: dist,
                    point: ray.at(dist),
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::mesh;
    use approx::assert_relative_eq;

    fn ray_down_z(x: f32, y: f32) -> Ray {
        Ray {
            origin: Vec3::new(x, y, 10.0),
            direction: Vec3::NEG_Z,
        }
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points([Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, -2.0, 0.0)]).unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(3.0, 0.0, 2.0));
        assert_eq!(aabb.center(), Vec3::new(1.0, -1.0, 1.0));
        assert_eq!(aabb.max_dim(), 4.0);
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_ray_aabb_hit_and_miss() {
        let aabb = Aabb { min: Vec3::splat(-1.0), max: Vec3::splat(1.0) };
        let hit = ray_aabb(&ray_down_z(0.0, 0.0), &aabb).unwrap();
        assert_relative_eq!(hit, 9.0, epsilon = 1e-5);
        assert!(ray_aabb(&ray_down_z(5.0, 0.0), &aabb).is_none());
    }

    #[test]
    fn test_ray_aabb_axis_parallel_on_slab_face() {
        // origin lies on the x = 1 face plane and the ray never moves in x
        let aabb = Aabb { min: Vec3::splat(-1.0), max: Vec3::splat(1.0) };
        let hit = ray_aabb(&ray_down_z(1.0, 0.0), &aabb).unwrap();
        assert_relative_eq!(hit, 9.0, epsilon = 1e-5);
        let hit = ray_aabb(&ray_down_z(-1.0, -1.0), &aabb).unwrap();
        assert_relative_eq!(hit, 9.0, epsilon = 1e-5);
        assert!(ray_aabb(&ray_down_z(1.0001, 0.0), &aabb).is_none());
    }

    #[test]
    fn test_pick_triangle_nearest() {
        let sphere = mesh::sphere(Vec3::ZERO, 1.0, 16, 16, [1.0; 3]);
        let bounds = Aabb::from_mesh(&sphere);
        let hit = pick_triangle(&ray_down_z(0.0, 0.0), &sphere, bounds.as_ref(), Vec3::ZERO).unwrap();
        // front surface of the sphere, not the back
        assert!(hit.point.z > 0.9, "hit {:?}", hit.point);
        assert_relative_eq!(hit.distance, 10.0 - hit.point.z, epsilon = 1e-4);
    }

    #[test]
    fn test_pick_triangle_respects_offset() {
        let sphere = mesh::sphere(Vec3::ZERO, 1.0, 12, 12, [1.0; 3]);
        let bounds = Aabb::from_mesh(&sphere);
        let offset = Vec3::new(5.0, 0.0, 0.0);
        assert!(pick_triangle(&ray_down_z(0.0, 0.0), &sphere, bounds.as_ref(), offset).is_none());
        assert!(pick_triangle(&ray_down_z(5.0, 0.0), &sphere, bounds.as_ref(), offset).is_some());
    }
}
