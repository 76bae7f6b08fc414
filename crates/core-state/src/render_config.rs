//! Render configuration and partial-update merging.
//!
//! The coordinator's `render_config_update` operation class carries a
//! `RenderConfigPatch`; only the fields present in the patch change. The
//! full config is serializable so defaults can come from `arbor.toml` and
//! diagnostics can dump the effective values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// When false, long-label display is globally disabled and label toggles
    /// reset nodes to their default footprint.
    pub long_labels_enabled: bool,
    /// Show `"<n> edges"` labels on aggregated edges.
    pub show_aggregated_edge_counts: bool,
    /// Hint forwarded to the render collaborator after a pipeline run.
    pub fit_view_on_render: bool,
    /// Render collapsed containers at their compact footprint.
    pub compact_collapsed_containers: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            long_labels_enabled: true,
            show_aggregated_edge_counts: true,
            fit_view_on_render: true,
            compact_collapsed_containers: true,
        }
    }
}

/// Sparse update; `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfigPatch {
    pub long_labels_enabled: Option<bool>,
    pub show_aggregated_edge_counts: Option<bool>,
    pub fit_view_on_render: Option<bool>,
    pub compact_collapsed_containers: Option<bool>,
}

impl RenderConfig {
    /// Apply a sparse patch; returns true if anything changed.
    pub fn merge(&mut self, patch: &RenderConfigPatch) -> bool {
        let before = self.clone();
        if let Some(v) = patch.long_labels_enabled {
            self.long_labels_enabled = v;
        }
        if let Some(v) = patch.show_aggregated_edge_counts {
            self.show_aggregated_edge_counts = v;
        }
        if let Some(v) = patch.fit_view_on_render {
            self.fit_view_on_render = v;
        }
        if let Some(v) = patch.compact_collapsed_containers {
            self.compact_collapsed_containers = v;
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut config = RenderConfig::default();
        assert!(!config.merge(&RenderConfigPatch::default()));
        assert_eq!(config, RenderConfig::default());
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let mut config = RenderConfig::default();
        let changed = config.merge(&RenderConfigPatch {
            long_labels_enabled: Some(false),
            ..Default::default()
        });
        assert!(changed);
        assert!(!config.long_labels_enabled);
        assert!(config.fit_view_on_render, "unnamed field untouched");
    }

    #[test]
    fn same_value_patch_reports_unchanged() {
        let mut config = RenderConfig::default();
        let changed = config.merge(&RenderConfigPatch {
            fit_view_on_render: Some(true),
            ..Default::default()
        });
        assert!(!changed);
    }
}
