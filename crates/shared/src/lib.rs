use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reference to an already-resolved asset (file path or URL)
pub type AssetRef = String;

/// Default fraction of the camera-to-point distance kept after a double-click zoom
pub const DEFAULT_FOCUS_RATIO: f32 = 0.2;

/// Which of the two modalities are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[serde(alias = "swc")]
    Skeleton,
    #[serde(alias = "obj")]
    Mesh,
    #[default]
    Both,
}

impl ViewMode {
    /// Skeleton is drawn unless the mode is exactly `Mesh`
    pub fn skeleton_visible(self) -> bool {
        self != ViewMode::Mesh
    }

    /// Mesh is drawn unless the mode is exactly `Skeleton`
    pub fn mesh_visible(self) -> bool {
        self != ViewMode::Skeleton
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Skeleton => "Skeleton",
            ViewMode::Mesh => "Mesh",
            ViewMode::Both => "Both",
        }
    }

    pub fn all() -> &'static [ViewMode] {
        &[ViewMode::Skeleton, ViewMode::Mesh, ViewMode::Both]
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skeleton" | "swc" => Ok(ViewMode::Skeleton),
            "mesh" | "obj" => Ok(ViewMode::Mesh),
            "both" => Ok(ViewMode::Both),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}

/// SWC structure identifier (column 2 of a record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuriteType {
    Undefined,
    Dendrite,
    Axon,
    Basal,
    Apical,
    Fork,
    Terminal,
    Custom,
}

impl NeuriteType {
    /// Map a raw SWC type code. Codes above 7 are treated as custom types,
    /// negative codes as undefined.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => NeuriteType::Dendrite,
            2 => NeuriteType::Axon,
            3 => NeuriteType::Basal,
            4 => NeuriteType::Apical,
            5 => NeuriteType::Fork,
            6 => NeuriteType::Terminal,
            c if c >= 7 => NeuriteType::Custom,
            _ => NeuriteType::Undefined,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            NeuriteType::Undefined => 0,
            NeuriteType::Dendrite => 1,
            NeuriteType::Axon => 2,
            NeuriteType::Basal => 3,
            NeuriteType::Apical => 4,
            NeuriteType::Fork => 5,
            NeuriteType::Terminal => 6,
            NeuriteType::Custom => 7,
        }
    }

    /// Display color (linear RGB, 0..1)
    pub fn color(self) -> [f32; 3] {
        match self {
            NeuriteType::Undefined => [0.0, 0.0, 0.0],
            NeuriteType::Dendrite => [1.0, 0.0, 0.0],
            NeuriteType::Axon => [0.0, 1.0, 0.0],
            NeuriteType::Basal => [0.0, 0.0, 1.0],
            NeuriteType::Apical => [1.0, 0.0, 1.0],
            NeuriteType::Fork => [1.0, 1.0, 0.0],
            NeuriteType::Terminal => [0.0, 1.0, 1.0],
            NeuriteType::Custom => [1.0, 1.0, 1.0],
        }
    }
}

/// Configuration surface of one viewer instance.
///
/// Everything is read once at mount, except `view_mode` and `wireframe`
/// which the embedding UI may change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Uncompressed triangulated surface (OBJ / STL)
    pub mesh_asset: Option<AssetRef>,
    /// Compressed surface, tried before `mesh_asset` when present
    pub compressed_mesh_asset: Option<AssetRef>,
    /// SWC skeleton text
    pub skeleton_asset: Option<AssetRef>,
    pub view_mode: ViewMode,
    /// Background color RGB
    pub background_color: [u8; 3],
    pub wireframe: bool,
    pub double_click_focus_ratio: f32,
    /// Split hard edges when preparing the surface (authoring context)
    pub edge_split: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mesh_asset: None,
            compressed_mesh_asset: None,
            skeleton_asset: None,
            view_mode: ViewMode::Both,
            background_color: [240, 240, 240],
            wireframe: false,
            double_click_focus_ratio: DEFAULT_FOCUS_RATIO,
            edge_split: false,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// True when at least one asset reference is configured
    pub fn has_assets(&self) -> bool {
        self.mesh_asset.is_some()
            || self.compressed_mesh_asset.is_some()
            || self.skeleton_asset.is_some()
    }

    /// Focus ratio clamped into (0, 1]; non-finite values fall back to the default
    pub fn focus_ratio(&self) -> f32 {
        let r = self.double_click_focus_ratio;
        if r.is_finite() && r > 0.0 {
            r.min(1.0)
        } else {
            DEFAULT_FOCUS_RATIO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_mode_visibility() {
        assert!(ViewMode::Skeleton.skeleton_visible());
        assert!(!ViewMode::Skeleton.mesh_visible());
        assert!(!ViewMode::Mesh.skeleton_visible());
        assert!(ViewMode::Mesh.mesh_visible());
        assert!(ViewMode::Both.skeleton_visible());
        assert!(ViewMode::Both.mesh_visible());
    }

    #[test]
    fn test_view_mode_parse_aliases() {
        assert_eq!("swc".parse::<ViewMode>(), Ok(ViewMode::Skeleton));
        assert_eq!("OBJ".parse::<ViewMode>(), Ok(ViewMode::Mesh));
        assert_eq!(" both ".parse::<ViewMode>(), Ok(ViewMode::Both));
        assert!("wire".parse::<ViewMode>().is_err());
    }

    #[test]
    fn test_neurite_type_codes() {
        assert_eq!(NeuriteType::from_code(0), NeuriteType::Undefined);
        assert_eq!(NeuriteType::from_code(2), NeuriteType::Axon);
        assert_eq!(NeuriteType::from_code(7), NeuriteType::Custom);
        assert_eq!(NeuriteType::from_code(12), NeuriteType::Custom);
        assert_eq!(NeuriteType::from_code(-3), NeuriteType::Undefined);
        for code in 0..=7u8 {
            assert_eq!(NeuriteType::from_code(code as i64).code(), code);
        }
    }

    #[test]
    fn test_out_of_range_codes_use_custom_and_undefined_colors() {
        assert_eq!(NeuriteType::from_code(42).color(), [1.0, 1.0, 1.0]);
        assert_eq!(NeuriteType::from_code(-1).color(), [0.0, 0.0, 0.0]);
        assert_eq!(NeuriteType::from_code(3).color(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let cfg = ViewerConfig::from_json(r#"{ "skeleton_asset": "a.swc", "view_mode": "swc" }"#)
            .unwrap();
        assert_eq!(cfg.skeleton_asset.as_deref(), Some("a.swc"));
        assert_eq!(cfg.view_mode, ViewMode::Skeleton);
        assert_eq!(cfg.double_click_focus_ratio, DEFAULT_FOCUS_RATIO);
        assert!(!cfg.edge_split);
        assert!(cfg.has_assets());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let cfg = ViewerConfig {
            mesh_asset: Some("m.obj".into()),
            wireframe: true,
            ..Default::default()
        };
        let back = ViewerConfig::from_json(&cfg.to_json()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_focus_ratio_sanitized() {
        let mut cfg = ViewerConfig::default();
        cfg.double_click_focus_ratio = -1.0;
        assert_eq!(cfg.focus_ratio(), DEFAULT_FOCUS_RATIO);
        cfg.double_click_focus_ratio = f32::NAN;
        assert_eq!(cfg.focus_ratio(), DEFAULT_FOCUS_RATIO);
        cfg.double_click_focus_ratio = 3.0;
        assert_eq!(cfg.focus_ratio(), 1.0);
        cfg.double_click_focus_ratio = 0.5;
        assert_eq!(cfg.focus_ratio(), 0.5);
    }
}
