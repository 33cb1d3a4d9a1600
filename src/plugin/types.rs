//! Core plugin types.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum host version assumed when a plugin does not declare one.
pub const DEFAULT_REQUIRED_HOST_VERSION: &str = "1.0.0";

/// Symbol every dynamic plugin module exports.
pub const ENTRY_SYMBOL: &str = "launcher_plugin_entrypoint";

/// Disable reason for plugins whose dependencies never resolved.
pub const REASON_UNRESOLVED: &str = "unresolved dependencies";

/// Disable reason for plugins that are part of a dependency cycle.
pub const REASON_CIRCULAR: &str = "circular dependency";

/// Disable reason for plugins the user switched off in a previous run.
pub const REASON_USER_PREFERENCE: &str = "disabled by user preference";

/// Default reason for [`PluginHost::disable_plugin`](super::PluginHost::disable_plugin).
pub const REASON_MANUAL_DISABLE: &str = "Manual disable";

/// Reason used when the host shuts down.
pub const REASON_SHUTDOWN: &str = "Application shutdown";

static PLUGIN_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid plugin id regex"));

/// Whether `id` is a well-formed plugin id (`author.name` by convention).
pub fn is_valid_plugin_id(id: &str) -> bool {
    PLUGIN_ID_RE.is_match(id)
}

/// Static identity of a plugin, captured once at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Globally unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the plugin does.
    pub description: String,
    /// Plugin version.
    pub version: String,
    /// Plugin author.
    pub author: String,
    /// Minimum host version required.
    pub required_host_version: String,
    /// Ids of plugins that must be enabled first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Whether the plugin offers a configuration UI.
    #[serde(default)]
    pub has_configuration: bool,
}

/// Lifecycle state of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PluginState {
    /// Loaded, not yet enabled or disabled.
    Loaded,
    /// Enabled and active.
    Enabled,
    /// Disabled, with the reason.
    Disabled { reason: String },
}

impl PluginState {
    /// Whether this is the enabled state.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Get the display name for this state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Enabled => "enabled",
            Self::Disabled { .. } => "disabled",
        }
    }

    /// Get the icon for this state.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Loaded => "·",
            Self::Enabled => "✓",
            Self::Disabled { .. } => "○",
        }
    }

    /// Reason the plugin is disabled, if it is.
    pub fn disabled_reason(&self) -> Option<&str> {
        match self {
            Self::Disabled { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Snapshot of a loaded plugin, safe to hand out of the host.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    /// Identity.
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,
    /// Lifecycle state.
    #[serde(flatten)]
    pub state: PluginState,
    /// Module the plugin was loaded from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<PathBuf>,
}

impl PluginInfo {
    /// Plugin id.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Whether the plugin is enabled.
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }
}

/// Health report returned by [`Plugin::status`](super::Plugin::status).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    /// Overall health.
    pub healthy: bool,
    /// Human-readable status.
    pub message: String,
    /// Errors found.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Warnings found.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// When the report was produced.
    pub last_update: DateTime<Local>,
}

impl Default for PluginStatus {
    fn default() -> Self {
        Self {
            healthy: true,
            message: "OK".to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            last_update: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_id_validation() {
        assert!(is_valid_plugin_id("author.name"));
        assert!(is_valid_plugin_id("a.one"));
        assert!(is_valid_plugin_id("Mythical.Example-Plugin_2"));
        assert!(!is_valid_plugin_id(""));
        assert!(!is_valid_plugin_id(".hidden"));
        assert!(!is_valid_plugin_id("a/b"));
        assert!(!is_valid_plugin_id("has space"));
    }

    #[test]
    fn test_plugin_state() {
        assert!(PluginState::Enabled.is_enabled());
        assert!(!PluginState::Loaded.is_enabled());

        let disabled = PluginState::Disabled { reason: REASON_UNRESOLVED.to_string() };
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.disabled_reason(), Some("unresolved dependencies"));
        assert_eq!(disabled.to_string(), "disabled");
        assert_eq!(PluginState::Enabled.icon(), "✓");
    }

    #[test]
    fn test_plugin_info_serialization() {
        let info = PluginInfo {
            descriptor: PluginDescriptor {
                id: "a.three".to_string(),
                name: "Three".to_string(),
                description: String::new(),
                version: "0.1.0".to_string(),
                author: "a".to_string(),
                required_host_version: DEFAULT_REQUIRED_HOST_VERSION.to_string(),
                dependencies: vec!["a.missing".to_string()],
                has_configuration: false,
            },
            state: PluginState::Disabled { reason: REASON_UNRESOLVED.to_string() },
            module: None,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["id"], "a.three");
        assert_eq!(json["state"], "disabled");
        assert_eq!(json["reason"], "unresolved dependencies");
        assert!(json.get("module").is_none());
    }

    #[test]
    fn test_default_status() {
        let status = PluginStatus::default();
        assert!(status.healthy);
        assert_eq!(status.message, "OK");
        assert!(status.errors.is_empty());
    }
}
