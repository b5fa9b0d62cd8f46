//! Surface mesh decoding and preparation.
//!
//! Whatever the source format, normals coming from the file are discarded
//! and recomputed from topology, optionally after splitting hard edges.

use std::collections::HashMap;
use std::io::{BufReader, Cursor};

use glam::Vec3;
use tracing::debug;

use crate::error::{ViewerError, ViewerResult};
use crate::viewport::mesh::{unit_or_up, MeshData};
use crate::viewport::picking::Aabb;

/// Angle above which an edge is treated as a crease when splitting
pub const DEFAULT_CREASE_ANGLE_DEG: f32 = 30.0;

/// Bounding-box center offset tolerated before a mesh is re-centered
pub const CENTER_EPSILON: f32 = 0.1;

/// Triangulated surface as decoded, before preparation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSurface {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Supplied by the source file; never used for shading
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<[f32; 4]>>,
}

impl RawSurface {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Container formats the viewer can read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Stl,
    /// Compressed geometry handled by a [`GeometryDecoder`]
    Compressed,
}

impl MeshFormat {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "obj" => Some(MeshFormat::Obj),
            "stl" => Some(MeshFormat::Stl),
            "drc" => Some(MeshFormat::Compressed),
            _ => None,
        }
    }

    /// Detect from a `format=` query parameter, else from the file extension
    pub fn detect(asset: &str) -> Option<Self> {
        let (path, query) = match asset.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (asset, None),
        };

        if let Some(query) = query {
            let from_query = query
                .split('&')
                .filter_map(|kv| kv.split_once('='))
                .find(|(k, _)| *k == "format")
                .and_then(|(_, v)| Self::from_token(v));
            if from_query.is_some() {
                return from_query;
            }
        }

        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        file.rsplit_once('.').and_then(|(_, ext)| Self::from_token(ext))
    }
}

/// Quality variants of one compressed asset, told apart by a token in the reference
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityTier {
    Refined,
    Mc,
}

impl QualityTier {
    pub fn token(self) -> &'static str {
        match self {
            QualityTier::Refined => "refined",
            QualityTier::Mc => "mc",
        }
    }

    /// Reference of the lower-fidelity variant, if `asset` names the refined one
    pub fn fallback_ref(asset: &str) -> Option<String> {
        let high = QualityTier::Refined.token();
        let at = asset.rfind(high)?;
        let mut out = String::with_capacity(asset.len());
        out.push_str(&asset[..at]);
        out.push_str(QualityTier::Mc.token());
        out.push_str(&asset[at + high.len()..]);
        Some(out)
    }
}

/// Host-provided decoder for compressed geometry
pub trait GeometryDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RawSurface, String>;
}

pub fn decode_obj(bytes: &[u8]) -> Result<RawSurface, String> {
    let mut reader = BufReader::new(Cursor::new(bytes));
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Err(tobj::LoadError::OpenFileFailed),
    )
    .map_err(|e| e.to_string())?;

    let mut surface = RawSurface::default();
    let mut normals = Vec::new();

    for model in &models {
        let m = &model.mesh;
        let offset = surface.positions.len() as u32;
        surface
            .positions
            .extend(m.positions.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])));
        normals.extend(m.normals.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])));
        surface.indices.extend(m.indices.iter().map(|i| i + offset));
    }

    if normals.len() == surface.positions.len() && !normals.is_empty() {
        surface.normals = Some(normals);
    }
    debug!(
        "OBJ decoded: {} models, {} vertices, {} triangles",
        models.len(),
        surface.positions.len(),
        surface.triangle_count()
    );
    Ok(surface)
}

pub fn decode_stl(bytes: &[u8]) -> Result<RawSurface, String> {
    let mut reader = Cursor::new(bytes);
    let stl = stl_io::read_stl(&mut reader).map_err(|e| e.to_string())?;

    let positions = stl.vertices.iter().map(|v| Vec3::new(v.0[0], v.0[1], v.0[2])).collect();
    let indices = stl
        .faces
        .iter()
        .flat_map(|f| f.vertices.iter().map(|&i| i as u32))
        .collect();

    Ok(RawSurface {
        positions,
        indices,
        normals: None,
        tangents: None,
    })
}

/// Decode uncompressed bytes according to `format`
pub fn decode_uncompressed(format: MeshFormat, asset: &str, bytes: &[u8]) -> ViewerResult<RawSurface> {
    let decoded = match format {
        MeshFormat::Stl => decode_stl(bytes),
        MeshFormat::Obj | MeshFormat::Compressed => decode_obj(bytes),
    };
    decoded.map_err(|details| ViewerError::DecodeFailed {
        asset: asset.to_string(),
        details,
    })
}

/// Area-weighted vertex normals; isolated or degenerate vertices get +Y
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        // cross product length is twice the triangle area
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals.into_iter().map(unit_or_up).collect()
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[rb] = ra;
    }
}

/// Duplicate vertices along edges whose dihedral angle exceeds `crease_deg`.
///
/// Face corners meeting at a vertex stay welded when they are connected
/// through a chain of smooth manifold edges; each remaining group becomes its
/// own vertex.
pub fn split_edges(positions: &[Vec3], indices: &[u32], crease_deg: f32) -> (Vec<Vec3>, Vec<u32>) {
    let face_count = indices.len() / 3;
    let cos_crease = crease_deg.to_radians().cos();

    let face_normals: Vec<Vec3> = indices
        .chunks_exact(3)
        .map(|t| {
            let [a, b, c] = [t[0] as usize, t[1] as usize, t[2] as usize];
            (positions[b] - positions[a])
                .cross(positions[c] - positions[a])
                .normalize_or_zero()
        })
        .collect();

    let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for f in 0..face_count {
        for k in 0..3 {
            let a = indices[f * 3 + k];
            let b = indices[f * 3 + (k + 1) % 3];
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(f);
        }
    }

    let corner_of = |f: usize, v: u32| (0..3).find(|&k| indices[f * 3 + k] == v).map(|k| f * 3 + k);

    let mut parent: Vec<usize> = (0..face_count * 3).collect();
    for (&(a, b), faces) in &edge_faces {
        let [f1, f2] = faces.as_slice() else { continue };
        if face_normals[*f1].dot(face_normals[*f2]) < cos_crease {
            continue;
        }
        for v in [a, b] {
            if let (Some(c1), Some(c2)) = (corner_of(*f1, v), corner_of(*f2, v)) {
                union(&mut parent, c1, c2);
            }
        }
    }

    let mut remap: HashMap<(u32, usize), u32> = HashMap::new();
    let mut out_positions = Vec::new();
    let mut out_indices = Vec::with_capacity(face_count * 3);
    for corner in 0..face_count * 3 {
        let v = indices[corner];
        let root = find(&mut parent, corner);
        let id = *remap.entry((v, root)).or_insert_with(|| {
            out_positions.push(positions[v as usize]);
            (out_positions.len() - 1) as u32
        });
        out_indices.push(id);
    }

    (out_positions, out_indices)
}

/// Fixed physically-based material parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceMaterial {
    pub base_color: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    /// Take color from the vertex stream instead of `base_color`
    pub use_vertex_color: bool,
    pub wireframe: bool,
}

impl SurfaceMaterial {
    /// Material applied to every prepared surface mesh
    pub fn surface() -> Self {
        Self {
            base_color: [0.78, 0.80, 0.86],
            metalness: 0.1,
            roughness: 0.45,
            clearcoat: 0.3,
            clearcoat_roughness: 0.25,
            use_vertex_color: false,
            wireframe: false,
        }
    }

    /// Material for skeleton geometry, colored per neurite type
    pub fn skeleton() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0],
            metalness: 0.0,
            roughness: 0.6,
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            use_vertex_color: true,
            wireframe: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrepareOptions {
    pub edge_split: bool,
    pub crease_angle_deg: f32,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            edge_split: false,
            crease_angle_deg: DEFAULT_CREASE_ANGLE_DEG,
        }
    }
}

/// Surface ready to be placed in the scene
#[derive(Clone, Debug)]
pub struct PreparedSurface {
    pub mesh: MeshData,
    /// Local-space bounds (before node translation)
    pub bounds: Aabb,
    pub material: SurfaceMaterial,
    /// Attributes changed since decode and need upload
    pub dirty: bool,
}

/// Recompute normals, optionally split hard edges, apply the surface material.
///
/// Fails with `EmptyGeometry` when there is nothing to draw, and with
/// `DecodeFailed` when indices point outside the vertex list.
pub fn prepare(raw: RawSurface, asset: &str, options: &PrepareOptions) -> ViewerResult<PreparedSurface> {
    let RawSurface {
        positions,
        indices,
        normals: _,
        tangents: _,
    } = raw;

    if positions.is_empty() || indices.len() < 3 {
        return Err(ViewerError::EmptyGeometry {
            kind: crate::error::AssetKind::Mesh,
            asset: asset.to_string(),
        });
    }
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(ViewerError::DecodeFailed {
            asset: asset.to_string(),
            details: format!("index {bad} out of range for {} vertices", positions.len()),
        });
    }

    let mut indices = indices;
    indices.truncate(indices.len() / 3 * 3);

    let (positions, indices) = if options.edge_split {
        let before = positions.len();
        let (p, i) = split_edges(&positions, &indices, options.crease_angle_deg);
        debug!("edge split: {} -> {} vertices", before, p.len());
        (p, i)
    } else {
        (positions, indices)
    };

    let normals = compute_vertex_normals(&positions, &indices);
    let material = SurfaceMaterial::surface();
    let mesh = MeshData::from_indexed(&positions, &normals, indices, material.base_color);
    let bounds = Aabb::from_points(positions.iter().copied()).ok_or_else(|| ViewerError::EmptyGeometry {
        kind: crate::error::AssetKind::Mesh,
        asset: asset.to_string(),
    })?;

    Ok(PreparedSurface {
        mesh,
        bounds,
        material,
        dirty: true,
    })
}

/// Translation that re-centers a node whose world bounds are `world_bounds`,
/// or `None` when the center is already within `epsilon` of the origin.
pub fn centering_offset(world_bounds: &Aabb, epsilon: f32) -> Option<Vec3> {
    let c = world_bounds.center();
    if c.abs().max_element() > epsilon {
        Some(-c)
    } else {
        None
    }
}
