use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::droid::session_view::{GroupBy, SessionSort};

const APP_DIR: &str = "droid-dash";
const CONFIG_FILE: &str = "config.json";
const LEGACY_CONFIG_FILE: &str = ".droid-dash.json";
const DEFAULT_SESSIONS_DIR: &str = "~/.factory/sessions";

/// Display preferences handed to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub default_sort: SessionSort,
    pub default_group: GroupBy,
    pub hide_empty_sessions: bool,
    /// Days shown by the per-project heatmap
    pub heatmap_days: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_sort: SessionSort::TokensDesc,
            default_group: GroupBy::Project,
            hide_empty_sessions: true,
            heatmap_days: 60,
        }
    }
}

/// Pricing per million tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PricingConfig {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cache_write_per_million: f64,
    pub cache_read_per_million: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
            cache_write_per_million: 3.75,
            cache_read_per_million: 0.30,
        }
    }
}

/// Rates for one model. Unset rates come from `Config::default_pricing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PricingOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_per_million: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_per_million: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_per_million: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_per_million: Option<f64>,
}

impl PricingOverride {
    /// Fill the unset rates from `base`
    pub fn resolve(&self, base: &PricingConfig) -> PricingConfig {
        PricingConfig {
            input_per_million: self.input_per_million.unwrap_or(base.input_per_million),
            output_per_million: self.output_per_million.unwrap_or(base.output_per_million),
            cache_write_per_million: self
                .cache_write_per_million
                .unwrap_or(base.cache_write_per_million),
            cache_read_per_million: self
                .cache_read_per_million
                .unwrap_or(base.cache_read_per_million),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one directory per project; `~` is expanded
    pub sessions_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sessions_dir: DEFAULT_SESSIONS_DIR.to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub default_pricing: PricingConfig,
    /// Per-model rates, overriding the built-in table
    pub model_pricing: BTreeMap<String, PricingOverride>,
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from the first config file found, or defaults
    pub fn load() -> Self {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Load configuration from a specific file. Missing or invalid files give defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Config::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring invalid config {}: {e}", path.display());
            Config::default()
        })
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Config file candidates in priority order
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = Self::default_config_path() {
            paths.push(path);
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(LEGACY_CONFIG_FILE));
        }
        paths
    }

    /// `$XDG_CONFIG_HOME/droid-dash/config.json`, falling back to `~/.config`
    pub fn default_config_path() -> Option<PathBuf> {
        let config_dir = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(xdg_config) => PathBuf::from(xdg_config),
            None => dirs::home_dir()?.join(".config"),
        };
        Some(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn find_config_file() -> Option<PathBuf> {
        Self::config_paths().into_iter().find(|p| p.exists())
    }

    /// Fully resolved rates for every configured model
    pub fn resolved_model_pricing(&self) -> BTreeMap<String, PricingConfig> {
        self.model_pricing
            .iter()
            .map(|(model, rates)| (model.clone(), rates.resolve(&self.default_pricing)))
            .collect()
    }

    /// Sessions root with a leading `~` expanded
    pub fn sessions_dir(&self) -> PathBuf {
        expand_home(&self.paths.sessions_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
