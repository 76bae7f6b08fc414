//! Configuration loading and parsing.
//!
//! Parses `arbor.toml` (or an override path provided by the binary). Three
//! sections, all optional:
//!
//! ```toml
//! [smart_collapse]
//! enabled = true
//! budget = 1200000.0
//!
//! [timeouts]
//! layout_ms = 10000
//! render_ms = 5000
//! application_event_ms = 5000
//! render_config_ms = 3000
//! tree_op_ms = 3000
//!
//! [render]
//! long_labels_enabled = true
//! show_aggregated_edge_counts = true
//! ```
//!
//! Unknown fields are ignored (TOML deserialization tolerance) so the file
//! format can grow without breaking older binaries; a file that fails to
//! parse at all falls back to defaults rather than aborting startup. The
//! raw file string is retained for diagnostics.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SmartCollapseConfig {
    pub enabled: bool,
    /// Screen-area budget (px²) for first-layout expansion.
    pub budget: f64,
}

impl Default for SmartCollapseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            budget: 1_200_000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub layout_ms: u64,
    pub render_ms: u64,
    pub application_event_ms: u64,
    pub render_config_ms: u64,
    pub tree_op_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            layout_ms: 10_000,
            render_ms: 5_000,
            application_event_ms: 5_000,
            render_config_ms: 3_000,
            tree_op_ms: 3_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderSection {
    pub long_labels_enabled: bool,
    pub show_aggregated_edge_counts: bool,
    pub fit_view_on_render: bool,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            long_labels_enabled: true,
            show_aggregated_edge_counts: true,
            fit_view_on_render: true,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    pub smart_collapse: SmartCollapseConfig,
    pub timeouts: TimeoutsConfig,
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string (kept for diagnostics), if one was read.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path following platform conventions: a local
/// `arbor.toml` wins over the platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("arbor.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("arbor").join("arbor.toml");
    }
    PathBuf::from("arbor.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(err) => {
                warn!(
                    target: "config",
                    path = %path.display(),
                    error = %err,
                    "config_parse_failed_using_defaults"
                );
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}
