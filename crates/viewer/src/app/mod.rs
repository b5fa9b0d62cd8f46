//! Main application module

mod styles;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use shared::{ViewMode, ViewerConfig};

use crate::export;
use crate::loader::{AssetLoader, FileSource};
use crate::state::ViewerSettings;
use crate::viewer::{LifecycleState, Viewer};
use crate::viewport::{GlBackend, ViewportPanel};

/// Poll interval for background loads when nothing else triggers a repaint
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Desktop shell around one `Viewer`
pub struct ViewerApp {
    viewer: Viewer<GlBackend>,
    viewport: ViewportPanel,
    settings: ViewerSettings,
    /// Messages shown in the status bar
    errors: Vec<String>,
    status: String,
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ViewerConfig, settings: ViewerSettings) -> Self {
        styles::configure_styles(&cc.egui_ctx, settings.ui.font_size);

        let backend = GlBackend::new(cc.gl.clone());
        let renderer = backend.renderer();
        let source = Arc::new(FileSource::new());
        let loader = AssetLoader::background(source.clone()).unwrap_or_else(|e| {
            tracing::warn!("{e}; loading on the UI thread");
            AssetLoader::inline(source)
        });

        let mut viewer = Viewer::new(config).with_skeleton_style(settings.skeleton_style());
        let mut errors = Vec::new();
        if let Err(e) = viewer.initialize(backend, loader) {
            tracing::error!("Failed to initialize viewer: {e}");
            errors.push(e.user_message());
        }

        Self {
            viewer,
            viewport: ViewportPanel::new(Some(renderer)),
            settings,
            errors,
            status: String::new(),
        }
    }

    fn ready(&self) -> bool {
        self.viewer.lifecycle() == LifecycleState::Ready
    }

    fn report<T>(&mut self, result: crate::error::ViewerResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("{e}");
                self.errors.push(e.user_message());
                None
            }
        }
    }

    fn reload(&mut self, edit: impl FnOnce(&mut ViewerConfig)) {
        let mut config = self.viewer.config().clone();
        edit(&mut config);
        let result = self.viewer.load_assets(config);
        self.report(result);
    }

    // ── File actions ─────────────────────────────────────────

    fn open_skeleton(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Open SWC skeleton")
            .add_filter("SWC", &["swc"])
            .pick_file()
        {
            self.status = format!("Loading {}", path.display());
            self.reload(|c| c.skeleton_asset = Some(path_ref(path)));
        }
    }

    fn open_mesh(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Open surface mesh")
            .add_filter("Mesh", &["obj", "stl"])
            .pick_file()
        {
            self.status = format!("Loading {}", path.display());
            self.reload(|c| {
                c.compressed_mesh_asset = None;
                c.mesh_asset = Some(path_ref(path));
            });
        }
    }

    fn export_obj(&mut self) {
        let Some((mesh, translation)) = self.viewer.mesh_geometry() else {
            self.errors.push("No mesh loaded".to_string());
            return;
        };
        let obj = export::mesh_to_obj(mesh, translation);
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Export mesh")
            .add_filter("OBJ", &["obj"])
            .set_file_name("mesh.obj")
            .save_file()
        {
            match std::fs::write(&path, obj) {
                Ok(()) => {
                    tracing::info!("Exported mesh to {}", path.display());
                    self.status = format!("Exported {}", path.display());
                }
                Err(e) => {
                    tracing::error!("Failed to write {}: {e}", path.display());
                    self.errors.push(format!("Failed to write {}", path.display()));
                }
            }
        }
    }

    // ── Panels ───────────────────────────────────────────────

    fn toolbar(&mut self, ui: &mut egui::Ui, now: Duration) {
        ui.horizontal(|ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open skeleton...").clicked() {
                    ui.close_menu();
                    self.open_skeleton();
                }
                if ui.button("Open mesh...").clicked() {
                    ui.close_menu();
                    self.open_mesh();
                }
                ui.separator();
                if ui.button("Export mesh as OBJ...").clicked() {
                    ui.close_menu();
                    self.export_obj();
                }
            });

            ui.separator();
            ui.add_enabled_ui(self.ready(), |ui| {
                let mut mode = self.viewer.config().view_mode;
                for candidate in ViewMode::all() {
                    ui.selectable_value(&mut mode, *candidate, candidate.label());
                }
                if mode != self.viewer.config().view_mode {
                    let result = self.viewer.set_view_mode(mode);
                    self.report(result);
                }

                ui.separator();
                let mut wireframe = self.viewer.config().wireframe;
                if ui.checkbox(&mut wireframe, "Wireframe").changed() {
                    let result = self.viewer.set_wireframe(wireframe);
                    self.report(result);
                }

                let mut edge_split = self.viewer.config().edge_split;
                if ui
                    .checkbox(&mut edge_split, "Edge split")
                    .on_hover_text("Split hard edges of the surface mesh (reloads it)")
                    .changed()
                {
                    self.settings.surface.edge_split = edge_split;
                    self.reload(|c| c.edge_split = edge_split);
                }

                ui.separator();
                if ui.button("Reset view").clicked() {
                    let result = self.viewer.reset_view(now);
                    self.report(result);
                }
                let has_root = self.viewer.state().root_world().is_some();
                if ui.add_enabled(has_root, egui::Button::new("Focus root")).clicked() {
                    let result = self.viewer.focus_root(now);
                    self.report(result);
                }
            });
        });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let state = self.viewer.state();
            let describe = |node: Option<&crate::state::SceneNode>| match node {
                Some(n) => format!("{} ({} tris)", n.asset, n.mesh.triangle_count()),
                None => "-".to_string(),
            };
            ui.weak(format!("Skeleton: {}", describe(state.skeleton_node())));
            ui.separator();
            ui.weak(format!("Mesh: {}", describe(state.mesh_node())));

            if !self.status.is_empty() {
                ui.separator();
                ui.weak(&self.status);
            }

            if let Some(last) = self.errors.last() {
                ui.separator();
                ui.colored_label(egui::Color32::from_rgb(230, 110, 110), last);
                if ui.small_button("x").clicked() {
                    self.errors.clear();
                }
            }
        });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Duration::from_secs_f64(ctx.input(|i| i.time));

        for e in self.viewer.take_errors() {
            self.errors.push(e.user_message());
        }
        if !self.viewer.state().nodes.is_empty() {
            self.status.clear();
        }

        if ctx.input(|i| i.key_pressed(egui::Key::W)) && self.ready() {
            let result = self.viewer.toggle_wireframe();
            self.report(result);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::R)) && self.ready() {
            let result = self.viewer.reset_view(now);
            self.report(result);
        }

        egui::TopBottomPanel::top("toolbar")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(8, 4)))
            .show(ctx, |ui| self.toolbar(ui, now));

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(8, 2)))
            .show(ctx, |ui| self.status_bar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.viewport.show(ui, &mut self.viewer));

        if self.ready() {
            ctx.request_repaint_after(LOAD_POLL_INTERVAL);
        }
    }

    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        self.viewer.dispose();
        self.settings.save();
    }
}

fn path_ref(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
