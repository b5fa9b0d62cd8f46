//! 3D viewport panel: pointer input plus the glow paint callback

mod gl_renderer;
pub use morph_viewer_lib::viewport::mesh;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egui::Ui;
use morph_viewer_lib::viewer::{LifecycleState, Viewer};

pub use gl_renderer::{GlBackend, GlRenderer};

/// Degrees of orbit per dragged pixel
const ORBIT_SPEED: f32 = 0.4;
/// Zoom fraction per scrolled point
const ZOOM_SPEED: f32 = 0.0015;

pub struct ViewportPanel {
    renderer: Option<Arc<Mutex<GlRenderer>>>,
}

impl ViewportPanel {
    pub fn new(renderer: Option<Arc<Mutex<GlRenderer>>>) -> Self {
        Self { renderer }
    }

    pub fn show(&mut self, ui: &mut Ui, viewer: &mut Viewer<GlBackend>) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let now = Duration::from_secs_f64(ui.input(|i| i.time));

        if viewer.lifecycle() != LifecycleState::Ready {
            self.draw_placeholder(ui, rect, viewer.lifecycle());
            return;
        }

        self.handle_input(ui, &response, rect, viewer, now);

        let aspect = rect.width() / rect.height().max(1.0);
        let frame = match viewer.frame(now, aspect) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("frame failed: {e}");
                return;
            }
        };

        if viewer.state().animation_in_flight() {
            ui.ctx().request_repaint();
        }

        if !ui.is_rect_visible(rect) {
            return;
        }

        let Some(renderer) = self.renderer.clone() else {
            self.draw_placeholder(ui, rect, LifecycleState::Failed);
            return;
        };

        let callback = egui::PaintCallback {
            rect,
            callback: Arc::new(eframe::egui_glow::CallbackFn::new(move |info, painter| {
                let clip = info.clip_rect_in_pixels();
                let viewport = [
                    clip.left_px as f32,
                    clip.from_bottom_px as f32,
                    clip.width_px as f32,
                    clip.height_px as f32,
                ];
                if let Ok(r) = renderer.lock() {
                    r.paint(painter.gl(), &frame, viewport);
                }
            })),
        };
        ui.painter().add(callback);

        self.draw_hint(ui, rect, viewer);
    }

    fn handle_input(
        &self,
        ui: &Ui,
        response: &egui::Response,
        rect: egui::Rect,
        viewer: &mut Viewer<GlBackend>,
        now: Duration,
    ) {
        if response.clicked_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Err(e) = viewer.handle_click(pos, rect, now) {
                    tracing::warn!("click ignored: {e}");
                }
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            viewer.orbit(delta.x * ORBIT_SPEED, delta.y * ORBIT_SPEED);
        }

        if response.dragged_by(egui::PointerButton::Secondary) || response.dragged_by(egui::PointerButton::Middle) {
            let delta = response.drag_delta();
            let camera = &viewer.state().camera;
            // world units per screen point at the target depth
            let scale = camera.distance() * 2.0 * (camera.fov * 0.5).tan() / rect.height().max(1.0);
            viewer.pan(-delta.x * scale, delta.y * scale);
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll.abs() > 0.1 {
                viewer.zoom(scroll * ZOOM_SPEED);
            }
        }
    }

    fn draw_hint(&self, ui: &Ui, rect: egui::Rect, viewer: &Viewer<GlBackend>) {
        let painter = ui.painter_at(rect);
        let state = viewer.state();
        if state.mesh.is_none() && state.skeleton.is_none() {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Open an SWC skeleton or a surface mesh",
                egui::FontId::proportional(14.0),
                egui::Color32::from_rgb(120, 120, 130),
            );
        }
        painter.text(
            egui::pos2(rect.center().x, rect.bottom() - 8.0),
            egui::Align2::CENTER_BOTTOM,
            "LMB orbit · RMB pan · scroll zoom · double-click focus",
            egui::FontId::proportional(11.0),
            egui::Color32::from_rgb(100, 100, 110),
        );
    }

    fn draw_placeholder(&self, ui: &Ui, rect: egui::Rect, lifecycle: LifecycleState) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(30, 30, 34));
        let text = match lifecycle {
            LifecycleState::Failed => "OpenGL is not available on this platform",
            LifecycleState::Disposed => "Viewer closed",
            _ => "Initializing...",
        };
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(14.0),
            egui::Color32::from_rgb(200, 120, 120),
        );
    }
}
