mod app;
mod viewport;

// Re-export library modules so that `crate::viewer`, `crate::state`, etc.
// resolve to the lib crate types everywhere in the binary.
pub use morph_viewer_lib::error;
pub use morph_viewer_lib::export;
pub use morph_viewer_lib::loader;
pub use morph_viewer_lib::state;
pub use morph_viewer_lib::viewer;

use error::{ViewerError, ViewerResult};
use shared::{ViewMode, ViewerConfig};

use app::ViewerApp;
use state::ViewerSettings;

const USAGE: &str = "\
usage: morph-viewer [--config <file.json>] [--skeleton <file.swc>] [--mesh <file.obj|stl>]
                    [--compressed-mesh <file>] [--view-mode skeleton|mesh|both]
                    [--wireframe] [--edge-split]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "morph_viewer=info,morph_viewer_lib=info".into()),
        )
        .init();

    let settings = ViewerSettings::load();
    let config = match parse_args(std::env::args().skip(1), settings.base_config()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Morphology Viewer")
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([480.0, 360.0]),
        depth_buffer: 24,
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "morph-viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, config, settings)))),
    ) {
        tracing::error!("Failed to start application: {e}");
    }
}

/// Build the viewer configuration from command-line arguments.
/// `--config` is applied first; explicit flags override it.
fn parse_args(args: impl Iterator<Item = String>, base: ViewerConfig) -> ViewerResult<ViewerConfig> {
    let args: Vec<String> = args.collect();

    let mut config = base;
    if let Some(path) = flag_value(&args, "--config")? {
        let json = std::fs::read_to_string(path).map_err(|e| config_error(format!("failed to read {path}: {e}")))?;
        config = ViewerConfig::from_json(&json).map_err(|e| config_error(format!("failed to parse {path}: {e}")))?;
        tracing::info!("Loaded config from {path}");
    }

    if let Some(v) = flag_value(&args, "--skeleton")? {
        config.skeleton_asset = Some(v.to_string());
    }
    if let Some(v) = flag_value(&args, "--mesh")? {
        config.mesh_asset = Some(v.to_string());
    }
    if let Some(v) = flag_value(&args, "--compressed-mesh")? {
        config.compressed_mesh_asset = Some(v.to_string());
    }
    if let Some(v) = flag_value(&args, "--view-mode")? {
        config.view_mode = v.parse::<ViewMode>().map_err(config_error)?;
    }
    config.wireframe |= args.iter().any(|a| a == "--wireframe");
    config.edge_split |= args.iter().any(|a| a == "--edge-split");

    const KNOWN: &[&str] = &[
        "--config",
        "--skeleton",
        "--mesh",
        "--compressed-mesh",
        "--view-mode",
        "--wireframe",
        "--edge-split",
    ];
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if !KNOWN.contains(&arg) {
            return Err(config_error(format!("unknown argument '{arg}'")));
        }
        // flags with a value consume the next argument
        i += if matches!(arg, "--wireframe" | "--edge-split") { 1 } else { 2 };
    }

    Ok(config)
}

fn config_error(details: String) -> ViewerError {
    ViewerError::Config { details }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> ViewerResult<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| config_error(format!("{flag} requires a value"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_flags_fill_config() {
        let cfg = parse_args(
            args(&["--skeleton", "n.swc", "--mesh", "m.obj", "--view-mode", "mesh", "--wireframe"]),
            ViewerConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.skeleton_asset.as_deref(), Some("n.swc"));
        assert_eq!(cfg.mesh_asset.as_deref(), Some("m.obj"));
        assert_eq!(cfg.view_mode, ViewMode::Mesh);
        assert!(cfg.wireframe);
        assert!(!cfg.edge_split);
    }

    #[test]
    fn test_missing_value_and_unknown_flag() {
        assert!(parse_args(args(&["--mesh"]), ViewerConfig::default()).is_err());
        assert!(parse_args(args(&["--bogus"]), ViewerConfig::default()).is_err());
        assert!(parse_args(args(&["--view-mode", "wire"]), ViewerConfig::default()).is_err());
    }

    #[test]
    fn test_config_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{ "skeleton_asset": "a.swc", "background_color": [0, 0, 0] }"#).unwrap();
        let path = path.to_string_lossy().into_owned();

        let cfg = parse_args(args(&["--config", path.as_str(), "--skeleton", "b.swc"]), ViewerConfig::default()).unwrap();
        assert_eq!(cfg.skeleton_asset.as_deref(), Some("b.swc"));
        assert_eq!(cfg.background_color, [0, 0, 0]);
    }
}
