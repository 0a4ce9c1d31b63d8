//! Viewer configuration
//!
//! Defaults are compiled in; a JSON file may override any subset of fields
//! and `SHELFVIEW_API_BASE` overrides the API base last.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Environment variable overriding [`ViewerConfig::api_base`]
pub const API_BASE_ENV: &str = "SHELFVIEW_API_BASE";

/// Tunables for preview loading and rendering
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Root of the REST API
    pub api_base: String,
    /// Detail canvas edge length in pixels (square)
    pub preview_size: u32,
    /// Largest bounding-box dimension after normalization
    pub model_scale: f32,
    pub detail_camera_distance: f32,
    pub card_camera_distance: f32,
    /// Detail 3D files above this size need an explicit user action
    pub autoload_max_bytes: u64,
    /// Visibility margin for model cards (px)
    pub card_margin_px: f32,
    /// Visibility margin for detail previews (px)
    pub detail_margin_px: f32,
    /// Card spin per frame in radians
    pub card_rotation_step: f32,
    pub capability_poll_ms: u64,
    pub capability_timeout_ms: u64,
    /// Models shown on the dashboard
    pub dashboard_recent_models: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base: shelfview_api::DEFAULT_API_BASE.to_string(),
            preview_size: 300,
            model_scale: 50.0,
            detail_camera_distance: 80.0,
            card_camera_distance: 70.0,
            autoload_max_bytes: 10_000_000,
            card_margin_px: 50.0,
            detail_margin_px: 200.0,
            card_rotation_step: 0.005,
            capability_poll_ms: 100,
            capability_timeout_ms: 10_000,
            dashboard_recent_models: 6,
        }
    }
}

impl ViewerConfig {
    /// Parse a (possibly partial) JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                log::info!("Loaded config from {}", path.display());
                Self::from_json_str(&text)?
            }
            None => Self::default(),
        };
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.is_empty() {
                config.api_base = base;
            }
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.model_scale > 0.0 && self.model_scale.is_finite()) {
            return Err(Error::Config(format!("model_scale must be positive, got {}", self.model_scale)));
        }
        if self.preview_size == 0 {
            return Err(Error::Config("preview_size must be non-zero".into()));
        }
        if self.capability_poll_ms == 0 {
            return Err(Error::Config("capability_poll_ms must be non-zero".into()));
        }
        Ok(())
    }
}
