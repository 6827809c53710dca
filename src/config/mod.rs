//! Application Configuration
//!
//! User settings stored in TOML format. Every section falls back to its
//! defaults, so a partial file only overrides what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::analysis::tags::ClassifierConfig;
use crate::analysis::text::MatcherConfig;
use crate::capture::LoopConfig;
use crate::editor::corners::EditorConfig;
use crate::vision::contour::DetectorConfig;
use crate::vision::rectify::RectifyConfig;
use crate::vision::stabilizer::StabilizerConfig;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Edge pipeline and contour validation
    pub detection: DetectorConfig,
    /// Temporal smoothing of detections
    pub stabilizer: StabilizerConfig,
    /// Detection loop timing
    pub capture: LoopConfig,
    /// Output size limits for rectified images
    pub rectify: RectifyConfig,
    /// Keyword matching thresholds
    pub matcher: MatcherConfig,
    /// Tag scoring weights
    pub classifier: ClassifierConfig,
    /// Corner editor handles
    pub editor: EditorConfig,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    Ok(crate::storage::get_config_dir()?.join("config.toml"))
}

/// Load `path`, or the default location when `None`.
///
/// A missing default file yields the defaults; an explicitly named file
/// must exist.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = load_config(path)?;
        info!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    let default_path = match default_config_path() {
        Ok(p) => p,
        Err(e) => {
            warn!("No config directory available ({}), using defaults", e);
            return Ok(AppConfig::default());
        }
    };
    if !default_path.exists() {
        return Ok(AppConfig::default());
    }
    let config = load_config(&default_path)?;
    info!("Loaded configuration from {}", default_path.display());
    Ok(config)
}
