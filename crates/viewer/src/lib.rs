// Library crate: exposes the viewer core for integration tests and headless use.
// The egui app shell and the glow renderer stay in the binary crate.

pub mod backend;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod harness;
pub mod loader;
pub mod skeleton;
pub mod state;
pub mod surface;
pub mod validation;
pub mod viewer;

/// Camera, picking, and mesh types shared by the core and the renderer.
/// GL drawing lives in the binary crate.
pub mod viewport {
    pub mod camera;
    pub mod fit;
    pub mod interaction;
    pub mod lighting;
    pub mod mesh;
    pub mod picking;
    pub mod tween;
    pub mod view_mode;
}
