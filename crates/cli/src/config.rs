//! `wtree.toml` config loading.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use weighted_tree_core::parsers::CollapsedOptions;
use weighted_tree_protocol::DataType;

pub const DEFAULT_PATH: &str = "wtree.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Group levels named by the leading frames of each folded stack,
    /// outermost first.
    #[serde(default)]
    pub element_levels: Vec<String>,

    /// Grouping level applied before printing: 0 merges everything, 1 is
    /// the first of `element_levels`.
    #[serde(default)]
    pub group_level: Option<usize>,

    /// Number of colours of the palette; its own default when unset.
    #[serde(default)]
    pub palette_colors: Option<usize>,

    /// Unit of the weights, for display.
    #[serde(default)]
    pub weight_unit: DataType,

    /// Default log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deepest call-tree level printed; everything when unset.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

fn default_log_level() -> String {
    "warn".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            element_levels: Vec::new(),
            group_level: None,
            palette_colors: None,
            weight_unit: DataType::default(),
            log_level: default_log_level(),
            max_depth: None,
        }
    }
}

impl Config {
    /// Read the config at `path`. A missing file is `Ok(None)`.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(s) => toml::from_str::<Config>(&s)
                .map(Some)
                .with_context(|| format!("failed to parse config {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read config {}", path.display())),
        }
    }

    pub fn collapsed_options(&self) -> CollapsedOptions {
        CollapsedOptions::with_levels(self.element_levels.iter().cloned())
    }
}
