//! Reconciliation settings.

use crate::error::ReconcileResult;
use invrecon_types::Priority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Per-plugin settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Trust of this plugin's value for each snapshot field. Zero or absent
    /// means the plugin is never preferred for the field.
    pub results_priority: BTreeMap<String, i32>,
}

/// Engine configuration, usually loaded from a TOML file:
///
/// ```toml
/// save_priority = 205
/// override_priority = false
///
/// [plugins.puppet.results_priority]
/// serial_number = 30
/// hostname = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Priority the automerger saves selected results at.
    pub save_priority: Priority,
    /// Lets lower-priority passes overwrite fields written at a higher one.
    pub override_priority: bool,
    pub plugins: BTreeMap<String, PluginConfig>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            save_priority: Priority::AUTOMERGE,
            override_priority: false,
            plugins: BTreeMap::new(),
        }
    }
}

impl ReconcileConfig {
    pub fn from_toml_str(contents: &str) -> ReconcileResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads the configuration from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded reconcile config from {:?}", path);
        Ok(config)
    }

    /// Configured trust of `plugin` for `field`; 0 when not configured.
    #[must_use]
    pub fn plugin_priority(&self, plugin: &str, field: &str) -> i32 {
        self.plugins
            .get(plugin)
            .and_then(|p| p.results_priority.get(field))
            .copied()
            .unwrap_or(0)
    }

    /// Write policy for a pass at `priority` under this configuration.
    #[must_use]
    pub fn policy(&self, priority: Priority) -> SavePolicy {
        SavePolicy {
            priority,
            force: self.override_priority,
        }
    }
}

/// Priority a pass writes at, and whether it may overwrite fields written at
/// a higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    pub priority: Priority,
    pub force: bool,
}

impl SavePolicy {
    #[must_use]
    pub const fn new(priority: Priority) -> Self {
        Self {
            priority,
            force: false,
        }
    }
}
