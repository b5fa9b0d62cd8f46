//! Asset loading through the viewer: fallbacks, stale results, partial failure.

use std::sync::Arc;

use morph_viewer_lib::error::{AssetKind, ViewerError};
use morph_viewer_lib::fixtures::*;
use morph_viewer_lib::harness::{BackendEvent, ViewerHarness};
use morph_viewer_lib::loader::MemorySource;
use morph_viewer_lib::surface::{GeometryDecoder, RawSurface};
use morph_viewer_lib::validation::MeshValidator;
use shared::ViewerConfig;

/// Decodes any buffer equal to `b"ok"` into a cube
struct StubDecoder;

impl GeometryDecoder for StubDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RawSurface, String> {
        if bytes == b"ok" {
            Ok(cube_surface(1.0))
        } else {
            Err("unsupported bitstream".into())
        }
    }
}

fn compressed_config(compressed: &str, uncompressed: Option<&str>) -> ViewerConfig {
    ViewerConfig {
        compressed_mesh_asset: Some(compressed.to_string()),
        mesh_asset: uncompressed.map(str::to_string),
        ..Default::default()
    }
}

#[test]
fn test_compressed_mesh_tier_fallback() {
    let source = MemorySource::new()
        .with("cell_refined.drc", b"garbage".to_vec())
        .with("cell_mc.drc", b"ok".to_vec());
    let mut h =
        ViewerHarness::with_decoder(compressed_config("cell_refined.drc", None), source, Arc::new(StubDecoder)).unwrap();
    h.step(16).unwrap();

    let node = h.viewer.state().mesh_node().unwrap();
    assert_eq!(node.asset, "cell_mc.drc");
    assert!(h.viewer.take_errors().is_empty());
}

#[test]
fn test_compressed_failure_uses_uncompressed_ref() {
    let source = MemorySource::new()
        .with("cell_refined.drc", b"garbage".to_vec())
        .with("cell.obj", CUBE_OBJ);
    let config = compressed_config("cell_refined.drc", Some("cell.obj"));
    let mut h = ViewerHarness::with_decoder(config, source, Arc::new(StubDecoder)).unwrap();
    h.step(16).unwrap();

    assert_eq!(h.viewer.state().mesh_node().unwrap().asset, "cell.obj");
}

struct EmptyDecoder;

impl GeometryDecoder for EmptyDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<RawSurface, String> {
        Ok(RawSurface::default())
    }
}

#[test]
fn test_empty_compressed_mesh_uses_uncompressed_ref() {
    let source = MemorySource::new()
        .with("n_refined.drc", b"payload".to_vec())
        .with("n.obj", CUBE_OBJ);
    let config = compressed_config("n_refined.drc", Some("n.obj"));
    let mut h = ViewerHarness::with_decoder(config, source, Arc::new(EmptyDecoder)).unwrap();
    h.step(16).unwrap();

    assert_eq!(h.viewer.state().mesh_node().unwrap().asset, "n.obj");
    assert!(h.viewer.take_errors().is_empty());
}

#[test]
fn test_all_mesh_sources_fail() {
    let source = MemorySource::new().with("n.swc", SWC_SIMPLE);
    let config = ViewerConfig {
        skeleton_asset: Some("n.swc".into()),
        ..compressed_config("cell_refined.drc", None)
    };
    let mut h = ViewerHarness::with_decoder(config, source, Arc::new(StubDecoder)).unwrap();
    h.step(16).unwrap();

    assert!(h.viewer.state().mesh.is_none());
    assert!(h.viewer.state().skeleton.is_some());
    let errors = h.viewer.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ViewerError::AssetFetchFailed { kind: AssetKind::Mesh, .. }));
}

#[test]
fn test_skeleton_failure_keeps_mesh() {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ);
    let mut h = ViewerHarness::new(config_both("missing.swc", "cube.obj"), source).unwrap();
    h.step(16).unwrap();

    assert!(h.viewer.state().mesh.is_some());
    assert!(h.viewer.state().skeleton.is_none());
    let errors = h.viewer.take_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].user_message(), "Failed to load skeleton");
}

#[test]
fn test_empty_skeleton_is_not_user_visible() {
    let source = MemorySource::new().with("empty.swc", "# header only\n");
    let mut h = ViewerHarness::new(config_skeleton("empty.swc"), source).unwrap();
    h.step(16).unwrap();

    assert!(h.viewer.state().skeleton.is_none());
    assert!(h.viewer.take_errors().is_empty());
}

#[test]
fn test_stale_load_is_discarded() {
    let source = MemorySource::new()
        .with("a.swc", SWC_SIMPLE)
        .with("b.swc", SWC_BRANCHED);
    let mut h = ViewerHarness::new(config_skeleton("a.swc"), source).unwrap();

    // second request lands before the first completion is applied
    h.viewer.load_assets(config_skeleton("b.swc")).unwrap();
    h.step(16).unwrap();

    let node = h.viewer.state().skeleton_node().unwrap();
    assert_eq!(node.asset, "b.swc");
    let uploads = h.log.lock().count(|e| matches!(e, BackendEvent::UploadGeometry(_)));
    assert_eq!(uploads, 1);
}

#[test]
fn test_replacing_asset_releases_previous_node() {
    let source = MemorySource::new()
        .with("a.swc", SWC_SIMPLE)
        .with("b.swc", SWC_BRANCHED);
    let mut h = ViewerHarness::new(config_skeleton("a.swc"), source).unwrap();
    h.step(16).unwrap();
    h.viewer.load_assets(config_skeleton("b.swc")).unwrap();
    h.step(16).unwrap();

    assert_eq!(h.viewer.state().nodes.len(), 1);
    let log = h.log.lock();
    assert_eq!(log.live_geometry.len(), 1);
    assert_eq!(log.live_materials.len(), 1);
    assert_eq!(log.double_frees, 0);
}

#[test]
fn test_clearing_reference_removes_node() {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ).with("n.swc", SWC_SIMPLE);
    let mut h = ViewerHarness::new(config_both("n.swc", "cube.obj"), source).unwrap();
    h.step(16).unwrap();

    h.viewer.load_assets(config_skeleton("n.swc")).unwrap();
    h.step(16).unwrap();
    assert!(h.viewer.state().mesh.is_none());
    assert!(h.viewer.state().skeleton.is_some());
    assert_eq!(h.log.lock().live_geometry.len(), 1);
}

#[test]
fn test_two_roots_render_one_marker() {
    let source = MemorySource::new().with("two.swc", SWC_TWO_ROOTS);
    let mut h = ViewerHarness::new(config_skeleton("two.swc"), source).unwrap();
    h.step(16).unwrap();

    let root = h.viewer.state().root_marker.unwrap();
    assert!(root.length() < 1e-6);
}

#[test]
fn test_edge_split_mesh_is_valid() {
    let config = ViewerConfig {
        edge_split: true,
        ..config_mesh("cube.obj")
    };
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ);
    let mut h = ViewerHarness::new(config, source).unwrap();
    h.step(16).unwrap();

    let (mesh, _) = h.viewer.mesh_geometry().unwrap();
    let v = MeshValidator::new(mesh);
    assert!(v.validate_all().is_empty());
    assert_eq!(v.vertex_count(), 24);
    assert_eq!(v.triangle_count(), 12);
}

#[test]
fn test_stl_mesh_loads() {
    let mut stl = Vec::new();
    let raw = cube_surface(1.0);
    let triangles: Vec<stl_io::Triangle> = raw
        .indices
        .chunks_exact(3)
        .map(|t| {
            let p = |i: u32| {
                let v = raw.positions[i as usize];
                stl_io::Vertex::new([v.x, v.y, v.z])
            };
            stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
                vertices: [p(t[0]), p(t[1]), p(t[2])],
            }
        })
        .collect();
    stl_io::write_stl(&mut stl, triangles.iter()).unwrap();

    let source = MemorySource::new().with("cube.stl", stl);
    let mut h = ViewerHarness::new(config_mesh("cube.stl"), source).unwrap();
    h.step(16).unwrap();

    let (mesh, _) = h.viewer.mesh_geometry().unwrap();
    assert_eq!(mesh.triangle_count(), 12);
    assert!(h.validate_mesh().is_empty());
}
