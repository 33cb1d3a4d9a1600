//! Configuration management for the launcher host.
//!
//! Handles loading and saving host configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::APP_NAME;

/// Name of the project-local configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".launcher-host.toml";

/// Host configuration.
///
/// When a file sets `data_dir` but leaves a derived path out, that path
/// follows `data_dir` the same way [`HostConfig::with_data_dir`] does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawHostConfig")]
pub struct HostConfig {
    /// Version the host reports to plugins and checks minimum versions against.
    pub host_version: String,

    /// Directory scanned (recursively) for plugin modules.
    pub plugins_dir: PathBuf,

    /// Root data directory.
    pub data_dir: PathBuf,

    /// JSON file backing the preference store.
    pub preferences_file: PathBuf,

    /// Directory holding the game installation (`versions/` lives here).
    pub game_dir: PathBuf,

    /// File extension of loadable plugin modules.
    pub module_extension: String,

    /// Default log filter when `--verbose` is not given.
    pub log_level: String,
}

/// Configuration as written in a file, before paths are derived.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHostConfig {
    host_version: Option<String>,
    plugins_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    preferences_file: Option<PathBuf>,
    game_dir: Option<PathBuf>,
    module_extension: Option<String>,
    log_level: Option<String>,
}

impl From<RawHostConfig> for HostConfig {
    fn from(raw: RawHostConfig) -> Self {
        let mut config =
            Self::with_data_dir(raw.data_dir.unwrap_or_else(Self::default_data_dir));
        if let Some(version) = raw.host_version {
            config.host_version = version;
        }
        if let Some(dir) = raw.plugins_dir {
            config.plugins_dir = dir;
        }
        if let Some(file) = raw.preferences_file {
            config.preferences_file = file;
        }
        if let Some(dir) = raw.game_dir {
            config.game_dir = dir;
        }
        if let Some(extension) = raw.module_extension {
            config.module_extension = extension;
        }
        if let Some(level) = raw.log_level {
            config.log_level = level;
        }
        config
    }
}

impl HostConfig {
    /// Build a configuration rooted at a single data directory.
    ///
    /// Every other path is derived from `data_dir`, which is what tests and
    /// portable installs want.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            plugins_dir: data_dir.join("plugins"),
            preferences_file: data_dir.join("preferences.json"),
            game_dir: data_dir.join("game"),
            data_dir,
            ..Self::default()
        }
    }

    /// Set the host version.
    pub fn with_host_version(mut self, version: impl Into<String>) -> Self {
        self.host_version = version.into();
        self
    }

    /// Set the module extension.
    pub fn with_module_extension(mut self, extension: impl Into<String>) -> Self {
        self.module_extension = extension.into();
        self
    }

    /// Directory that holds per-plugin data directories.
    pub fn plugin_data_root(&self) -> PathBuf {
        self.plugins_dir.join("data")
    }

    /// Data directory for a single plugin.
    pub fn plugin_data_dir(&self, plugin_id: &str) -> PathBuf {
        self.plugin_data_root().join(plugin_id)
    }

    /// Load configuration from the default locations.
    ///
    /// Looks for config in:
    /// 1. `.launcher-host.toml` in current directory
    /// 2. `~/.config/launcher-host/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_dir.join("config.toml"), content)?;

        Ok(())
    }

    /// Get the global config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir().map_or_else(|| PathBuf::from(".").join(APP_NAME), |d| d.join(APP_NAME))
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        let data_dir = Self::default_data_dir();
        Self {
            host_version: crate::VERSION.to_string(),
            plugins_dir: data_dir.join("plugins"),
            preferences_file: data_dir.join("preferences.json"),
            game_dir: data_dir.join("game"),
            data_dir,
            module_extension: std::env::consts::DLL_EXTENSION.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.host_version, crate::VERSION);
        assert_eq!(config.log_level, "warn");
        assert!(config.plugins_dir.ends_with("plugins"));
    }

    #[test]
    fn test_with_data_dir_derives_paths() {
        let config = HostConfig::with_data_dir("/tmp/lh");
        assert_eq!(config.plugins_dir, PathBuf::from("/tmp/lh/plugins"));
        assert_eq!(config.preferences_file, PathBuf::from("/tmp/lh/preferences.json"));
        assert_eq!(config.plugin_data_dir("a.one"), PathBuf::from("/tmp/lh/plugins/data/a.one"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            host_version = "2.1.0"
            plugins_dir = "/opt/launcher/plugins"
            log_level = "info"
        "#;

        let config: HostConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host_version, "2.1.0");
        assert_eq!(config.plugins_dir, PathBuf::from("/opt/launcher/plugins"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.module_extension, std::env::consts::DLL_EXTENSION);

        let config: HostConfig = toml::from_str(r#"data_dir = "/srv/launcher""#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/launcher"));
        assert_eq!(config.plugins_dir, PathBuf::from("/srv/launcher/plugins"));
        assert_eq!(config.preferences_file, PathBuf::from("/srv/launcher/preferences.json"));
        assert_eq!(config.game_dir, PathBuf::from("/srv/launcher/game"));
        assert_eq!(
            config.plugin_data_dir("a.one"),
            PathBuf::from("/srv/launcher/plugins/data/a.one")
        );

        let config: HostConfig = toml::from_str(
            r#"
            data_dir = "/srv/launcher"
            game_dir = "/mnt/games"
        "#,
        )
        .unwrap();
        assert_eq!(config.game_dir, PathBuf::from("/mnt/games"));
        assert_eq!(config.plugins_dir, PathBuf::from("/srv/launcher/plugins"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "host_version = \"3.0.0\"\n").unwrap();

        let config = HostConfig::load_from_file(&path).unwrap();
        assert_eq!(config.host_version, "3.0.0");
    }
}
