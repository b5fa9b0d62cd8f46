//! SWC skeleton parsing and reconstruction into renderable geometry.
//!
//! Records are `id type x y z radius parent`, whitespace separated, one per
//! line. The reconstructor emits one root marker and one tapered connector
//! per child whose parent resolves.

use std::collections::BTreeMap;

use glam::Vec3;
use shared::NeuriteType;
use tracing::{debug, warn};

use crate::viewport::mesh::{self, MeshData};

/// Parent id marking a root record
pub const ROOT_PARENT: i64 = -1;

/// Color of the root marker
pub const ROOT_MARKER_COLOR: [f32; 3] = [1.0, 0.55, 0.0];

/// One SWC record
#[derive(Clone, Debug, PartialEq)]
pub struct SkeletonNode {
    pub id: i64,
    pub kind: NeuriteType,
    pub position: Vec3,
    pub radius: f32,
    pub parent_id: i64,
}

impl SkeletonNode {
    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT
    }
}

/// Parsed skeleton keyed by record id (ascending iteration order)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub nodes: BTreeMap<i64, SkeletonNode>,
    /// Lines that looked like records but failed to parse
    pub skipped_lines: usize,
}

impl Skeleton {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn parse_int(field: &str) -> Option<i64> {
    field
        .parse::<i64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
}

fn parse_record(fields: &[&str]) -> Option<SkeletonNode> {
    let id = parse_int(fields[0])?;
    if id < 0 {
        return None;
    }
    let kind = NeuriteType::from_code(parse_int(fields[1])?);
    let x: f32 = fields[2].parse().ok()?;
    let y: f32 = fields[3].parse().ok()?;
    let z: f32 = fields[4].parse().ok()?;
    let radius: f32 = fields[5].parse().ok()?;
    let parent_id = parse_int(fields[6])?;

    Some(SkeletonNode {
        id,
        kind,
        position: Vec3::new(x, y, z),
        radius: if radius.is_finite() { radius.max(0.0) } else { 0.0 },
        parent_id,
    })
}

/// Parse SWC text. Blank lines, `#` comments, and lines with fewer than
/// seven fields are skipped. A repeated id replaces the earlier record.
pub fn parse_swc(text: &str) -> Skeleton {
    let mut skeleton = Skeleton::default();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            continue;
        }
        match parse_record(&fields) {
            Some(node) => {
                skeleton.nodes.insert(node.id, node);
            }
            None => {
                debug!("skipping malformed SWC line {}: {line}", line_no + 1);
                skeleton.skipped_lines += 1;
            }
        }
    }

    skeleton
}

/// Connector between a child sample and its parent
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkeletonEdge {
    pub child_position: Vec3,
    pub child_radius: f32,
    pub parent_position: Vec3,
    pub parent_radius: f32,
    pub kind: NeuriteType,
}

impl SkeletonEdge {
    pub fn length(&self) -> f32 {
        self.child_position.distance(self.parent_position)
    }
}

/// Root marker location and the record that produced it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootMarker {
    pub id: i64,
    pub position: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconstruction {
    pub root: Option<RootMarker>,
    pub edges: Vec<SkeletonEdge>,
    /// Child records whose connector would have zero length
    pub degenerate_dropped: usize,
    /// Additional `parent == -1` records that did not get a marker
    pub detached_roots: Vec<i64>,
    /// Child records whose parent id is not present
    pub unresolved: Vec<i64>,
}

impl Reconstruction {
    /// Markers plus connectors
    pub fn primitive_count(&self) -> usize {
        self.edges.len() + usize::from(self.root.is_some())
    }
}

/// Derive the root marker and connectors from parsed records.
///
/// Only the first root (lowest id) gets a marker. Sub-trees hanging off
/// additional roots keep their connectors; the extra roots are reported.
pub fn reconstruct(skeleton: &Skeleton) -> Reconstruction {
    let mut out = Reconstruction::default();

    for node in skeleton.nodes.values() {
        if node.is_root() {
            if out.root.is_none() {
                out.root = Some(RootMarker {
                    id: node.id,
                    position: node.position,
                });
            } else {
                out.detached_roots.push(node.id);
            }
            continue;
        }

        let Some(parent) = skeleton.nodes.get(&node.parent_id) else {
            out.unresolved.push(node.id);
            continue;
        };

        let edge = SkeletonEdge {
            child_position: node.position,
            child_radius: node.radius,
            parent_position: parent.position,
            parent_radius: parent.radius,
            kind: node.kind,
        };
        if edge.length() <= 0.0 {
            out.degenerate_dropped += 1;
            continue;
        }
        out.edges.push(edge);
    }

    if !out.detached_roots.is_empty() {
        warn!(
            "skeleton has {} additional root record(s) {:?}; rendered as detached sub-trees without markers",
            out.detached_roots.len(),
            out.detached_roots
        );
    }
    if !out.unresolved.is_empty() {
        warn!(
            "skeleton has {} record(s) with unknown parent; skipped {:?}",
            out.unresolved.len(),
            out.unresolved
        );
    }

    out
}

/// Visual parameters for skeleton geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkeletonStyle {
    /// Radius of the root marker sphere
    pub marker_radius: f32,
    /// Radial segments per connector
    pub segments: u32,
    pub marker_rings: u32,
}

impl Default for SkeletonStyle {
    fn default() -> Self {
        Self {
            marker_radius: 1.0,
            segments: 8,
            marker_rings: 12,
        }
    }
}

/// Merge the marker and all connectors into one vertex-colored mesh
pub fn build_skeleton_mesh(recon: &Reconstruction, style: &SkeletonStyle) -> MeshData {
    let mut data = MeshData::default();

    if let Some(root) = &recon.root {
        data.append(&mesh::sphere(
            root.position,
            style.marker_radius,
            style.marker_rings,
            style.marker_rings * 2,
            ROOT_MARKER_COLOR,
        ));
    }

    for edge in &recon.edges {
        data.append(&mesh::frustum(
            edge.child_position,
            edge.child_radius,
            edge.parent_position,
            edge.parent_radius,
            style.segments,
            edge.kind.color(),
        ));
    }

    data
}
