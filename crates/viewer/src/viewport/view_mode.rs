use shared::ViewMode;

use crate::state::ViewerSceneState;

/// Switch modality visibility. The camera is left where it is.
pub fn apply_view_mode(state: &mut ViewerSceneState, mode: ViewMode) {
    state.view_mode = mode;
    sync_visibility(state);
}

/// Push the current mode onto the mesh and skeleton nodes
pub fn sync_visibility(state: &mut ViewerSceneState) {
    let mode = state.view_mode;
    if let Some(node) = state.mesh.and_then(|h| state.nodes.get_mut(h.id())) {
        node.visible = mode.mesh_visible();
    }
    if let Some(node) = state.skeleton.and_then(|h| state.nodes.get_mut(h.id())) {
        node.visible = mode.skeleton_visible();
    }
}
