//! Session configuration via `relay.toml`
//!
//! The distributed-rendering mode selector, thresholds and the cache-size
//! limit are supplied from outside and read-only for the control plane.
//! Every process in a session must load the same configuration: the values
//! decide which collective calls run each frame.

use crate::error::{RelayError, RelayResult};
use crate::types::MoveMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "relay.toml";

const MIB: u64 = 1024 * 1024;

/// How the view picks the move mode for non-cloned items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliverySelector {
    /// Pass-through above `remote_render_threshold`, collect below it
    Auto,
    /// Always render where the data lives
    PassThrough,
    /// Always collect to the root process
    Collect,
    /// Always replicate to every process
    Clone,
}

impl DeliverySelector {
    /// Resolve the view-level move mode for one frame
    ///
    /// `global_size` must be the same on every process (the result of a
    /// reduction), otherwise processes disagree on the collective sequence.
    pub fn resolve(&self, global_size: u64, threshold: u64, processes: usize) -> MoveMode {
        if processes <= 1 {
            return MoveMode::PassThrough;
        }
        match self {
            DeliverySelector::Auto if global_size > threshold => MoveMode::PassThrough,
            DeliverySelector::Auto => MoveMode::CollectToRoot,
            DeliverySelector::PassThrough => MoveMode::PassThrough,
            DeliverySelector::Collect => MoveMode::CollectToRoot,
            DeliverySelector::Clone => MoveMode::CloneToAll,
        }
    }
}

/// `[delivery]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryConfig {
    /// Move-mode selector
    #[serde(default = "default_selector")]
    pub mode: DeliverySelector,
    /// Bytes of visible geometry above which `auto` renders remotely
    #[serde(default = "default_threshold")]
    pub remote_render_threshold: u64,
    /// Bytes of visible geometry above which interactive frames use LOD
    #[serde(default = "default_threshold")]
    pub lod_threshold: u64,
    /// Balance redistributable items across processes in pass-through mode
    #[serde(default)]
    pub redistribute: bool,
}

fn default_selector() -> DeliverySelector {
    DeliverySelector::Auto
}

fn default_threshold() -> u64 {
    20 * MIB
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            mode: default_selector(),
            remote_render_threshold: default_threshold(),
            lod_threshold: default_threshold(),
            redistribute: false,
        }
    }
}

/// `[cache]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Enable the cache-pressure check before each update
    #[serde(default)]
    pub enabled: bool,
    /// Visible cached bytes above which "cache full" is broadcast
    #[serde(default = "default_cache_limit")]
    pub limit: u64,
}

fn default_cache_limit() -> u64 {
    100 * MIB
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: false,
            limit: default_cache_limit(),
        }
    }
}

/// `[streaming]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingConfig {
    /// Views accept streaming commands
    #[serde(default)]
    pub enabled: bool,
    /// Initial depth limit for newly tracked representations, -1 for none
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
}

fn default_max_depth() -> i32 {
    -1
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            enabled: false,
            max_depth: default_max_depth(),
        }
    }
}

/// Session configuration loaded from `relay.toml`
///
/// # Example
///
/// ```toml
/// [delivery]
/// mode = "auto"
/// remote_render_threshold = 20971520
///
/// [cache]
/// enabled = true
/// limit = 104857600
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// Delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Cache-pressure settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Progressive refinement settings
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl RelayConfig {
    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns an error if a depth limit below -1 is configured or the cache
    /// is enabled with a zero limit.
    pub fn validate(&self) -> RelayResult<()> {
        if self.streaming.max_depth < -1 {
            return Err(RelayError::config(format!(
                "streaming.max_depth must be -1 or non-negative, got {}",
                self.streaming.max_depth
            )));
        }
        if self.cache.enabled && self.cache.limit == 0 {
            return Err(RelayError::config(
                "cache.limit must be positive when the cache is enabled",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Relay session configuration
#
# Every process in a session must use the same file.

[delivery]
# "auto" (default), "pass-through", "collect" or "clone"
#   "auto" renders where the data lives once the visible geometry exceeds
#   remote_render_threshold, and collects it to the root process otherwise.
mode = "auto"
remote_render_threshold = 20971520
# Interactive frames switch to reduced geometry above this size.
lod_threshold = 20971520
# Balance redistributable geometry across processes in pass-through mode.
redistribute = false

[cache]
enabled = false
limit = 104857600

[streaming]
enabled = false
# -1 means no depth limit
max_depth = -1
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            RelayError::config(format!("Invalid config file '{}': {}", path.display(), e))
        })
    }

    /// Parse and validate config text
    pub fn from_toml_str(content: &str) -> RelayResult<Self> {
        let config: RelayConfig =
            toml::from_str(content).map_err(|e| RelayError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> RelayResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> RelayResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RelayError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
