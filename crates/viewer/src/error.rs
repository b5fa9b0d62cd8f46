//! Error taxonomy for the morphology viewer.
//!
//! Only `PlatformUnsupported` is fatal. Asset errors are recovered locally:
//! the affected node is simply absent and the other modality keeps rendering.

use std::fmt;

use thiserror::Error;

/// Result type alias for viewer operations.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Which modality an asset belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Skeleton,
    Mesh,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Skeleton => f.write_str("skeleton"),
            AssetKind::Mesh => f.write_str("mesh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    /// No GPU-capable drawing surface. Surfaced immediately, never retried.
    #[error("platform unsupported: {reason}")]
    PlatformUnsupported { reason: String },

    /// Fetch or parse failure for one modality.
    #[error("failed to load {kind}: {details}")]
    AssetFetchFailed { kind: AssetKind, asset: String, details: String },

    /// Compressed geometry could not be decoded.
    #[error("failed to decode {asset}: {details}")]
    DecodeFailed { asset: String, details: String },

    /// Parsing succeeded but produced nothing to draw. Warning only.
    #[error("{kind} asset {asset} produced no geometry")]
    EmptyGeometry { kind: AssetKind, asset: String },

    /// Operation issued in a lifecycle state that does not accept it.
    #[error("invalid viewer state: {details}")]
    InvalidState { details: String },

    /// Malformed configuration file.
    #[error("invalid configuration: {details}")]
    Config { details: String },
}

impl ViewerError {
    pub fn fetch_failed(kind: AssetKind, asset: &str, details: impl Into<String>) -> Self {
        ViewerError::AssetFetchFailed {
            kind,
            asset: asset.to_string(),
            details: details.into(),
        }
    }

    pub fn invalid_state(details: impl Into<String>) -> Self {
        ViewerError::InvalidState {
            details: details.into(),
        }
    }

    /// True for errors that should be shown to the user.
    /// Empty geometry is a warning and stays in the log.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ViewerError::EmptyGeometry { .. })
    }

    /// Short message for the status overlay
    pub fn user_message(&self) -> String {
        match self {
            ViewerError::AssetFetchFailed { kind, .. } => format!("Failed to load {kind}"),
            ViewerError::DecodeFailed { .. } => "Failed to load mesh".to_string(),
            other => other.to_string(),
        }
    }
}
