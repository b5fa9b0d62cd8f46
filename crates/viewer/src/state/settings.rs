//! Persisted viewer preferences

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared::{ViewerConfig, DEFAULT_FOCUS_RATIO};

use crate::skeleton::SkeletonStyle;

/// Viewport preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    /// Background color RGB
    pub background_color: [u8; 3],
    /// Fraction of the camera-to-point distance kept after a double-click
    pub focus_ratio: f32,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            background_color: [240, 240, 240],
            focus_ratio: DEFAULT_FOCUS_RATIO,
        }
    }
}

/// Skeleton display preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonSettings {
    /// Root marker radius
    pub marker_radius: f32,
    /// Radial segments per connector
    pub segments: u32,
}

impl Default for SkeletonSettings {
    fn default() -> Self {
        let style = SkeletonStyle::default();
        Self {
            marker_radius: style.marker_radius,
            segments: style.segments,
        }
    }
}

/// Surface mesh preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SurfaceSettings {
    /// Split hard edges by default
    pub edge_split: bool,
}

/// UI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Font size in points
    pub font_size: f32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self { font_size: 14.0 }
    }
}

/// All persisted settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerSettings {
    pub viewport: ViewportSettings,
    pub skeleton: SkeletonSettings,
    pub surface: SurfaceSettings,
    pub ui: UiSettings,
}

impl ViewerSettings {
    /// Default location under the platform config dir
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "morph-viewer", "morph-viewer")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(path) = Self::default_path() {
            if let Err(e) = self.save_to(&path) {
                tracing::warn!("Failed to save settings to {}: {e}", path.display());
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Config with these preferences filled in and no assets
    pub fn base_config(&self) -> ViewerConfig {
        ViewerConfig {
            background_color: self.viewport.background_color,
            double_click_focus_ratio: self.viewport.focus_ratio,
            edge_split: self.surface.edge_split,
            ..Default::default()
        }
    }

    pub fn skeleton_style(&self) -> SkeletonStyle {
        SkeletonStyle {
            marker_radius: self.skeleton.marker_radius.max(f32::EPSILON),
            segments: self.skeleton.segments.max(3),
            ..Default::default()
        }
    }
}
