//! End-to-end viewer behavior against the recording backend.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use glam::Vec3;
use morph_viewer_lib::error::ViewerError;
use morph_viewer_lib::fixtures::*;
use morph_viewer_lib::harness::{BackendEvent, RecordingBackend, SharedLog, ViewerHarness};
use morph_viewer_lib::loader::{AssetLoader, MemorySource};
use morph_viewer_lib::viewer::{LifecycleState, Viewer};
use morph_viewer_lib::viewport::interaction::InteractionAction;
use shared::{ViewMode, ViewerConfig};

fn cube_harness() -> ViewerHarness {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ);
    let mut h = ViewerHarness::new(config_mesh("cube.obj"), source).unwrap();
    h.step(16).unwrap();
    h
}

fn branched_harness() -> ViewerHarness {
    let source = MemorySource::new().with("n.swc", SWC_BRANCHED);
    let mut h = ViewerHarness::new(config_skeleton("n.swc"), source).unwrap();
    h.step(16).unwrap();
    h
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn test_initialize_reaches_ready() {
    let h = cube_harness();
    assert_eq!(h.viewer.lifecycle(), LifecycleState::Ready);
    assert!(h.viewer.is_frame_loop_running());
    assert!(h.viewer.is_input_attached());
    assert!(h.validate_mesh().is_empty());
}

#[test]
fn test_platform_unsupported_is_fatal() {
    let log = SharedLog::default();
    let mut viewer = Viewer::new(config_mesh("cube.obj"));
    let loader = AssetLoader::inline(Arc::new(MemorySource::new()));
    let err = viewer.initialize(RecordingBackend::unsupported(log.clone()), loader).unwrap_err();

    assert!(matches!(err, ViewerError::PlatformUnsupported { .. }));
    assert_eq!(viewer.lifecycle(), LifecycleState::Failed);
    assert!(viewer.frame(Duration::ZERO, 1.0).is_err());
    assert_eq!(log.lock().count(|e| matches!(e, BackendEvent::UploadGeometry(_))), 0);
}

#[test]
fn test_dispose_releases_everything_in_order() {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ).with("n.swc", SWC_SIMPLE);
    let mut h = ViewerHarness::new(config_both("n.swc", "cube.obj"), source).unwrap();
    h.step(16).unwrap();
    assert_eq!(h.viewer.state().nodes.len(), 2);

    h.viewer.dispose();
    assert_eq!(h.viewer.lifecycle(), LifecycleState::Disposed);
    assert!(!h.viewer.is_frame_loop_running());
    assert!(!h.viewer.is_input_attached());

    let log = h.log.lock();
    assert!(log.is_clean(), "{log:?}");
    let context = log.position(&BackendEvent::ReleaseContext).unwrap();
    let detach = log.position(&BackendEvent::DetachSurface).unwrap();
    assert_eq!(detach, log.events.len() - 1);
    let first_release = log
        .events
        .iter()
        .position(|e| matches!(e, BackendEvent::ReleaseGeometry(_)))
        .unwrap();
    assert!(context < first_release);
}

#[test]
fn test_dispose_runs_once() {
    let mut h = cube_harness();
    h.viewer.dispose();
    let after_first = h.log.lock().events.len();
    h.viewer.dispose();
    assert_eq!(h.log.lock().events.len(), after_first);
    assert!(h.step(16).is_err());

    let log = h.log.clone();
    drop(h);
    assert_eq!(log.lock().events.len(), after_first);
    assert_eq!(log.lock().count(|e| *e == BackendEvent::ReleaseContext), 1);
}

#[test]
fn test_repeated_mount_cycles_do_not_leak() {
    for _ in 0..5 {
        let h = cube_harness();
        let log = h.log.clone();
        drop(h);
        assert!(log.lock().is_clean());
    }
}

// ── Camera fit ────────────────────────────────────────────────

#[test]
fn test_mesh_fit_distance() {
    let h = cube_harness();
    let pose = h.pose();
    assert_relative_eq!(pose.target.length(), 0.0, epsilon = 1e-4);
    // cube extent 2, vertical fov 75 degrees, mesh margin 1.2
    assert_relative_eq!(pose.distance(), 1.5638, epsilon = 1e-3);
    assert_eq!(h.viewer.state().initial_pose, Some(pose));
}

#[test]
fn test_offset_mesh_is_centered() {
    let obj = cube_obj_at(Vec3::new(50.0, -20.0, 5.0), 1.0);
    let source = MemorySource::new().with("far.obj", obj);
    let mut h = ViewerHarness::new(config_mesh("far.obj"), source).unwrap();
    h.step(16).unwrap();

    let node = h.viewer.state().mesh_node().unwrap();
    assert!(node.world_bounds().center().length() < 0.1);
    assert_relative_eq!(h.pose().target.length(), 0.0, epsilon = 1e-3);
}

#[test]
fn test_skeleton_and_mesh_share_centered_frame() {
    let source = MemorySource::new()
        .with("n.swc", SWC_OFFSET)
        .with("soma.obj", cube_obj_at(OFFSET_SOMA, 3.0));
    let mut h = ViewerHarness::new(config_both("n.swc", "soma.obj"), source).unwrap();
    h.step(16).unwrap();

    let mesh = h.viewer.state().mesh_node().unwrap();
    let skeleton = h.viewer.state().skeleton_node().unwrap();
    assert_eq!(mesh.translation, skeleton.translation);
    assert!(mesh.world_bounds().center().length() < 1e-3);
    assert!(h.viewer.state().root_world().unwrap().length() < 1e-3);
    assert_relative_eq!(h.pose().target.length(), 0.0, epsilon = 1e-3);
}

#[test]
fn test_mesh_loaded_after_skeleton_realigns_it() {
    let source = MemorySource::new()
        .with("n.swc", SWC_OFFSET)
        .with("soma.obj", cube_obj_at(OFFSET_SOMA, 3.0));
    let mut h = ViewerHarness::new(config_skeleton("n.swc"), source).unwrap();
    h.step(16).unwrap();
    // alone, the skeleton is centered on its own box
    let alone = h.viewer.state().skeleton_node().unwrap();
    assert!(alone.world_bounds().center().length() < 1e-3);

    h.viewer.load_assets(config_both("n.swc", "soma.obj")).unwrap();
    h.step(16).unwrap();
    let mesh = h.viewer.state().mesh_node().unwrap();
    let skeleton = h.viewer.state().skeleton_node().unwrap();
    assert_eq!(mesh.translation, skeleton.translation);
    assert!(h.viewer.state().root_world().unwrap().length() < 1e-3);
}

// ── Double-click focus ────────────────────────────────────────

#[test]
fn test_double_click_on_model_zooms_to_hit() {
    let mut h = cube_harness();
    let before = h.pose();
    assert_eq!(h.double_click_center().unwrap(), InteractionAction::ResolveDouble);
    assert!(h.viewer.state().animation_in_flight());
    h.settle().unwrap();

    let after = h.pose();
    let hit = after.target;
    // front face of the cube
    assert_relative_eq!(hit.z, 1.0, epsilon = 1e-4);
    assert!(hit.x.abs() < 1.0 && hit.y.abs() < 1.0);
    let expected = before.position.distance(hit) * 0.2;
    assert_relative_eq!(after.position.distance(hit), expected, epsilon = 1e-3);
}

#[test]
fn test_double_click_on_empty_space_restores_initial_pose() {
    let mut h = branched_harness();
    let initial = h.viewer.state().initial_pose.unwrap();

    h.viewer.pan(1.0, 0.5);
    assert_ne!(h.pose(), initial);

    h.double_click_empty().unwrap();
    h.settle().unwrap();
    assert_eq!(h.pose(), initial);
}

#[test]
fn test_slow_clicks_are_not_a_double_click() {
    let mut h = cube_harness();
    let action = h.double_click_at(h.rect.center(), 301).unwrap();
    assert_eq!(action, InteractionAction::Armed);
    assert!(!h.viewer.state().animation_in_flight());
}

#[test]
fn test_input_ignored_during_animation() {
    let mut h = cube_harness();
    h.double_click_center().unwrap();
    h.step(16).unwrap();
    let mid = h.pose();

    assert_eq!(h.click_at(h.rect.center()).unwrap(), InteractionAction::Ignored);
    h.viewer.orbit(90.0, 0.0);
    h.viewer.zoom(0.5);
    assert_eq!(h.pose(), mid);
    assert!(!h.viewer.reset_view(h.clock).unwrap());
}

#[test]
fn test_animation_finishes_when_node_removed_mid_flight() {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ).with("n.swc", SWC_SIMPLE);
    let mut h = ViewerHarness::new(config_mesh("cube.obj"), source).unwrap();
    h.step(16).unwrap();

    assert_eq!(h.double_click_center().unwrap(), InteractionAction::ResolveDouble);
    h.step(16).unwrap();
    assert!(h.viewer.state().animation_in_flight());

    h.viewer.load_assets(config_skeleton("n.swc")).unwrap();
    assert!(h.viewer.state().mesh.is_none());
    h.settle().unwrap();
    assert!(!h.viewer.state().animation_in_flight());
    assert!(h.step(16).is_ok());
}

#[test]
fn test_reset_view_returns_to_initial_pose() {
    let mut h = cube_harness();
    let initial = h.pose();
    h.viewer.pan(0.5, 0.25);
    assert!(h.viewer.reset_view(h.clock).unwrap());
    h.settle().unwrap();
    assert_eq!(h.pose(), initial);
}

#[test]
fn test_focus_root_targets_marker() {
    let mut h = branched_harness();
    assert!(h.viewer.focus_root(h.clock).unwrap());
    h.settle().unwrap();
    let root = h.viewer.state().root_world().unwrap();
    assert!(h.pose().target.distance(root) < 1e-4);
}

// ── Reactive configuration ────────────────────────────────────

#[test]
fn test_view_mode_changes_visibility_not_camera() {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ).with("n.swc", SWC_BRANCHED);
    let mut h = ViewerHarness::new(config_both("n.swc", "cube.obj"), source).unwrap();
    h.step(16).unwrap();
    let pose = h.pose();

    h.viewer.set_view_mode(ViewMode::Skeleton).unwrap();
    let out = h.step(16).unwrap();
    assert_eq!(out.draws.len(), 1);
    assert!(!h.viewer.state().mesh_node().unwrap().visible);
    assert!(h.viewer.state().skeleton_node().unwrap().visible);

    h.viewer.set_view_mode(ViewMode::Both).unwrap();
    assert_eq!(h.step(16).unwrap().draws.len(), 2);
    assert_eq!(h.pose(), pose);
}

#[test]
fn test_wireframe_toggle_updates_materials() {
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ).with("n.swc", SWC_SIMPLE);
    let mut h = ViewerHarness::new(config_both("n.swc", "cube.obj"), source).unwrap();
    h.step(16).unwrap();

    assert!(h.viewer.toggle_wireframe().unwrap());
    let log = h.log.lock();
    let updates = log.count(|e| matches!(e, BackendEvent::UpdateMaterial { wireframe: true, .. }));
    assert_eq!(updates, 2);
    drop(log);
    assert!(h.viewer.state().nodes.iter().all(|n| n.material.wireframe));

    assert!(!h.viewer.toggle_wireframe().unwrap());
    assert!(h.viewer.state().nodes.iter().all(|n| !n.material.wireframe));
}

#[test]
fn test_wireframe_from_config_applies_to_new_nodes() {
    let config = ViewerConfig {
        wireframe: true,
        ..config_mesh("cube.obj")
    };
    let source = MemorySource::new().with("cube.obj", CUBE_OBJ);
    let mut h = ViewerHarness::new(config, source).unwrap();
    h.step(16).unwrap();
    assert!(h.viewer.state().mesh_node().unwrap().material.wireframe);
}

// ── Lights ────────────────────────────────────────────────────

#[test]
fn test_lights_rescale_to_model() {
    let h = branched_harness();
    let out_scale = h.viewer.state().lights.scale();
    assert!(out_scale > 5.0);

    let small = cube_harness();
    assert_relative_eq!(small.viewer.state().lights.scale(), 5.0);
}
