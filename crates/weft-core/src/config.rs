use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// Directory holding the index and config inside a vault.
pub const VAULT_DIR: &str = ".weft";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub densify: DensifyConfig,
    #[serde(default)]
    pub status: StatusThresholds,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Scoring weights and limits for the densification pipeline.
///
/// The four weights are expected to sum to 1.0. This is not enforced at
/// load time; [`DensifyConfig::weight_sum`] exists so tests can check it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensifyConfig {
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_tag_weight")]
    pub tag_weight: f64,
    #[serde(default = "default_graph_weight")]
    pub graph_weight: f64,
    #[serde(default = "default_topic_weight")]
    pub topic_weight: f64,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_max_links")]
    pub max_links: usize,
    #[serde(default = "default_edge_type")]
    pub default_edge_type: String,
    #[serde(default = "default_proximity_max_hops")]
    pub proximity_max_hops: usize,
}

impl Default for DensifyConfig {
    fn default() -> Self {
        Self {
            lexical_weight: default_lexical_weight(),
            tag_weight: default_tag_weight(),
            graph_weight: default_graph_weight(),
            topic_weight: default_topic_weight(),
            min_score: default_min_score(),
            max_links: default_max_links(),
            default_edge_type: default_edge_type(),
            proximity_max_hops: default_proximity_max_hops(),
        }
    }
}

impl DensifyConfig {
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.lexical_weight + self.tag_weight + self.graph_weight + self.topic_weight
    }
}

/// Outgoing-edge thresholds for machine-computed note status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusThresholds {
    #[serde(default = "default_linked_threshold")]
    pub linked_threshold: usize,
    #[serde(default = "default_connected_threshold")]
    pub connected_threshold: usize,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            linked_threshold: default_linked_threshold(),
            connected_threshold: default_connected_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_activation_decay")]
    pub activation_decay: f64,
    #[serde(default = "default_pagerank_damping")]
    pub pagerank_damping: f64,
    #[serde(default = "default_pagerank_tolerance")]
    pub pagerank_tolerance: f64,
    #[serde(default = "default_pagerank_max_iter")]
    pub pagerank_max_iter: usize,
    #[serde(default = "default_gap_betweenness_weight")]
    pub gap_betweenness_weight: f64,
    #[serde(default = "default_gap_boundary_weight")]
    pub gap_boundary_weight: f64,
    #[serde(default = "default_louvain_max_passes")]
    pub louvain_max_passes: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            activation_decay: default_activation_decay(),
            pagerank_damping: default_pagerank_damping(),
            pagerank_tolerance: default_pagerank_tolerance(),
            pagerank_max_iter: default_pagerank_max_iter(),
            gap_betweenness_weight: default_gap_betweenness_weight(),
            gap_boundary_weight: default_gap_boundary_weight(),
            louvain_max_passes: default_louvain_max_passes(),
        }
    }
}

/// Path of the SQLite index inside a vault.
#[must_use]
pub fn index_path(vault_root: &Path) -> PathBuf {
    vault_root.join(VAULT_DIR).join("index.sqlite3")
}

/// Load `.weft/config.toml`, falling back to defaults when it is absent.
///
/// # Errors
///
/// Returns a config error if the file exists but cannot be read or parsed.
pub fn load_vault_config(vault_root: &Path) -> Result<VaultConfig> {
    let path = vault_root.join(VAULT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(VaultConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|err| WeftError::Config(format!("failed to read {}: {err}", path.display())))?;

    toml::from_str::<VaultConfig>(&content)
        .map_err(|err| WeftError::Config(format!("failed to parse {}: {err}", path.display())))
}

const fn default_lexical_weight() -> f64 {
    0.4
}

const fn default_tag_weight() -> f64 {
    0.3
}

const fn default_graph_weight() -> f64 {
    0.2
}

const fn default_topic_weight() -> f64 {
    0.1
}

const fn default_min_score() -> f64 {
    0.35
}

const fn default_max_links() -> usize {
    5
}

fn default_edge_type() -> String {
    "relates".to_string()
}

const fn default_proximity_max_hops() -> usize {
    5
}

const fn default_linked_threshold() -> usize {
    1
}

const fn default_connected_threshold() -> usize {
    3
}

const fn default_activation_decay() -> f64 {
    0.5
}

const fn default_pagerank_damping() -> f64 {
    0.85
}

const fn default_pagerank_tolerance() -> f64 {
    1e-6
}

const fn default_pagerank_max_iter() -> usize {
    100
}

const fn default_gap_betweenness_weight() -> f64 {
    0.6
}

const fn default_gap_boundary_weight() -> f64 {
    0.4
}

const fn default_louvain_max_passes() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn default_weights_sum_to_one() {
        let cfg = DensifyConfig::default();
        assert!((cfg.weight_sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_vault_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.densify.max_links, 5);
        assert_eq!(cfg.status.linked_threshold, 1);
        assert_eq!(cfg.status.connected_threshold, 3);
        assert!((cfg.analytics.pagerank_damping - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(VAULT_DIR)).expect("create .weft");
        std::fs::write(
            dir.path().join(VAULT_DIR).join("config.toml"),
            "[densify]\nmin_score = 0.6\nmax_links = 2\n\n[status]\nconnected_threshold = 4\n",
        )
        .expect("write config");

        let cfg = load_vault_config(dir.path()).expect("load should succeed");
        assert!((cfg.densify.min_score - 0.6).abs() < f64::EPSILON);
        assert_eq!(cfg.densify.max_links, 2);
        assert_eq!(cfg.densify.default_edge_type, "relates");
        assert_eq!(cfg.status.connected_threshold, 4);
        assert_eq!(cfg.status.linked_threshold, 1);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(VAULT_DIR)).expect("create .weft");
        std::fs::write(dir.path().join(VAULT_DIR).join("config.toml"), "[densify\n")
            .expect("write config");

        let err = load_vault_config(dir.path()).expect_err("parse should fail");
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }
}
