//! Host-side services exposed to plugins through their context.
//!
//! Two seams live here: [`HostUi`], the bridge to whatever front end embeds
//! the host, and [`LauncherServices`], read-only launcher state plus a single
//! mutation point for launch arguments.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::PluginResult;
use crate::core::PreferenceStore;

/// Severity of a message box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Warning,
    Error,
    Success,
}

/// Host UI region a plugin button can be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiLocation {
    Settings,
    MainMenu,
    GameLaunch,
    UserProfile,
}

impl std::fmt::Display for UiLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Settings => "Settings",
            Self::MainMenu => "MainMenu",
            Self::GameLaunch => "GameLaunch",
            Self::UserProfile => "UserProfile",
        };
        f.write_str(name)
    }
}

/// Click callback for injected UI elements.
pub type UiCallback = Arc<dyn Fn() + Send + Sync>;

/// Opaque handle to a host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Menu entry a plugin asks the host to add.
#[derive(Clone)]
pub struct MenuItem {
    pub text: String,
    /// Parent menu, `None` for the top level.
    pub parent: Option<String>,
    pub on_click: UiCallback,
}

/// Button a plugin asks the host to add.
#[derive(Clone)]
pub struct UiButton {
    pub text: String,
    pub location: UiLocation,
    pub on_click: UiCallback,
}

/// A window built by a plugin for the host to display.
pub trait PluginWindow: Send {
    /// Window title.
    fn title(&self) -> String;

    /// Present the window. Modal windows block until closed.
    fn show(&mut self, modal: bool) -> anyhow::Result<()>;
}

/// Bridge to the embedding front end.
///
/// Injection requests are best effort: a host without the requested region
/// logs the request and returns `false`.
pub trait HostUi: Send + Sync {
    /// Show a message box.
    fn show_message(&self, plugin_id: &str, message: &str, title: &str, kind: MessageKind);

    /// Add a menu item. Returns whether it was placed.
    fn add_menu_item(&self, plugin_id: &str, item: MenuItem) -> bool;

    /// Add a button. Returns whether it was placed.
    fn add_button(&self, plugin_id: &str, button: UiButton) -> bool;

    /// Display a plugin window.
    fn show_window(
        &self,
        plugin_id: &str,
        window: Box<dyn PluginWindow>,
        modal: bool,
    ) -> anyhow::Result<()>;
}

/// UI bridge for hosts without a front end. Every request is logged.
#[derive(Debug, Default)]
pub struct HeadlessUi;

impl HostUi for HeadlessUi {
    fn show_message(&self, plugin_id: &str, message: &str, title: &str, kind: MessageKind) {
        match kind {
            MessageKind::Error => tracing::error!(plugin = plugin_id, title, "{}", message),
            MessageKind::Warning => tracing::warn!(plugin = plugin_id, title, "{}", message),
            MessageKind::Info | MessageKind::Success => {
                tracing::info!(plugin = plugin_id, title, "{}", message);
            }
        }
    }

    fn add_menu_item(&self, plugin_id: &str, item: MenuItem) -> bool {
        tracing::info!(
            plugin = plugin_id,
            text = %item.text,
            parent = ?item.parent,
            "Requested to add menu item"
        );
        false
    }

    fn add_button(&self, plugin_id: &str, button: UiButton) -> bool {
        tracing::info!(
            plugin = plugin_id,
            text = %button.text,
            location = %button.location,
            "Requested to add button"
        );
        false
    }

    fn show_window(
        &self,
        plugin_id: &str,
        window: Box<dyn PluginWindow>,
        modal: bool,
    ) -> anyhow::Result<()> {
        tracing::info!(plugin = plugin_id, title = %window.title(), modal, "Requested to show window");
        Ok(())
    }
}

/// Launch settings as stored by the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    pub ram_mb: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub fullscreen: bool,
    pub custom_args: String,
    pub join_server_ip: String,
    pub join_server_port: u16,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            ram_mb: 4096,
            screen_width: 854,
            screen_height: 480,
            fullscreen: false,
            custom_args: String::new(),
            join_server_ip: String::new(),
            join_server_port: 25565,
        }
    }
}

/// Launcher state a plugin may read, plus one narrow write.
pub trait LauncherServices: Send + Sync {
    /// Installed game versions.
    fn installed_versions(&self) -> Vec<String>;

    /// Currently selected game version.
    fn current_version(&self) -> Option<String>;

    /// Game installation directory.
    fn game_directory(&self) -> PathBuf;

    /// Current launch settings.
    fn launch_settings(&self) -> LaunchSettings;

    /// Append to the custom launch-argument string.
    fn append_launch_arguments(&self, arguments: &str) -> PluginResult<()>;
}

const KEY_LAST_VERSION: &str = "LastVersion";
const KEY_RAM_MB: &str = "RamMb";
const KEY_SCREEN_WIDTH: &str = "ScreenWidth";
const KEY_SCREEN_HEIGHT: &str = "ScreenHeight";
const KEY_FULLSCREEN: &str = "FullScreen";
const KEY_CUSTOM_ARGS: &str = "CustomArgs";
const KEY_JOIN_SERVER_IP: &str = "JoinServerIP";
const KEY_JOIN_SERVER_PORT: &str = "JoinServerPort";

/// [`LauncherServices`] backed by the host preference store and the game
/// directory on disk.
pub struct PreferenceLauncherServices {
    preferences: Arc<dyn PreferenceStore>,
    game_dir: PathBuf,
}

impl PreferenceLauncherServices {
    /// Create the service.
    pub fn new(preferences: Arc<dyn PreferenceStore>, game_dir: impl Into<PathBuf>) -> Self {
        Self { preferences, game_dir: game_dir.into() }
    }
}

impl LauncherServices for PreferenceLauncherServices {
    fn installed_versions(&self) -> Vec<String> {
        let versions_dir = self.game_dir.join("versions");
        let entries = match std::fs::read_dir(&versions_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %versions_dir.display(), error = %e, "No installed versions");
                return Vec::new();
            }
        };

        let mut versions: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(ToString::to_string))
            .collect();
        versions.sort();
        versions
    }

    fn current_version(&self) -> Option<String> {
        self.preferences.get_or(KEY_LAST_VERSION, None)
    }

    fn game_directory(&self) -> PathBuf {
        self.game_dir.clone()
    }

    fn launch_settings(&self) -> LaunchSettings {
        let defaults = LaunchSettings::default();
        let prefs = self.preferences.as_ref();
        LaunchSettings {
            ram_mb: prefs.get_or(KEY_RAM_MB, defaults.ram_mb),
            screen_width: prefs.get_or(KEY_SCREEN_WIDTH, defaults.screen_width),
            screen_height: prefs.get_or(KEY_SCREEN_HEIGHT, defaults.screen_height),
            fullscreen: prefs.get_or(KEY_FULLSCREEN, defaults.fullscreen),
            custom_args: prefs.get_or(KEY_CUSTOM_ARGS, defaults.custom_args),
            join_server_ip: prefs.get_or(KEY_JOIN_SERVER_IP, defaults.join_server_ip),
            join_server_port: prefs.get_or(KEY_JOIN_SERVER_PORT, defaults.join_server_port),
        }
    }

    fn append_launch_arguments(&self, arguments: &str) -> PluginResult<()> {
        let arguments = arguments.trim();
        if arguments.is_empty() {
            return Ok(());
        }

        let current: String = self.preferences.get_or(KEY_CUSTOM_ARGS, String::new());
        let updated = if current.trim().is_empty() {
            arguments.to_string()
        } else {
            format!("{} {}", current.trim_end(), arguments)
        };

        self.preferences.set_value(KEY_CUSTOM_ARGS, &updated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemoryPreferenceStore;
    use tempfile::TempDir;

    fn services(game_dir: &std::path::Path) -> (Arc<dyn PreferenceStore>, PreferenceLauncherServices) {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let services = PreferenceLauncherServices::new(Arc::clone(&prefs), game_dir);
        (prefs, services)
    }

    #[test]
    fn test_launch_settings_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let (_, services) = services(temp_dir.path());

        assert_eq!(services.launch_settings(), LaunchSettings::default());
        assert_eq!(services.launch_settings().join_server_port, 25565);
        assert!(services.current_version().is_none());
    }

    #[test]
    fn test_launch_settings_from_preferences() {
        let temp_dir = TempDir::new().unwrap();
        let (prefs, services) = services(temp_dir.path());
        prefs.set_value("RamMb", &8192u32).unwrap();
        prefs.set_value("FullScreen", &true).unwrap();
        prefs.set_value("LastVersion", &"1.20.4").unwrap();

        let settings = services.launch_settings();
        assert_eq!(settings.ram_mb, 8192);
        assert!(settings.fullscreen);
        assert_eq!(settings.screen_width, 854);
        assert_eq!(services.current_version().as_deref(), Some("1.20.4"));
    }

    #[test]
    fn test_append_launch_arguments() {
        let temp_dir = TempDir::new().unwrap();
        let (_, services) = services(temp_dir.path());

        services.append_launch_arguments("-Dfoo=1").unwrap();
        services.append_launch_arguments("  ").unwrap();
        services.append_launch_arguments("-Dbar=2").unwrap();

        assert_eq!(services.launch_settings().custom_args, "-Dfoo=1 -Dbar=2");
    }

    #[test]
    fn test_installed_versions() {
        let temp_dir = TempDir::new().unwrap();
        let versions = temp_dir.path().join("versions");
        std::fs::create_dir_all(versions.join("1.20.4")).unwrap();
        std::fs::create_dir_all(versions.join("1.8.9")).unwrap();
        std::fs::write(versions.join("launcher_profiles.json"), "{}").unwrap();

        let (_, services) = services(temp_dir.path());
        assert_eq!(services.installed_versions(), vec!["1.20.4", "1.8.9"]);
    }

    #[test]
    fn test_headless_ui_declines_injection() {
        let ui = HeadlessUi;
        let item = MenuItem { text: "Tools".to_string(), parent: None, on_click: Arc::new(|| {}) };
        assert!(!ui.add_menu_item("a.one", item));

        let button = UiButton {
            text: "Sync".to_string(),
            location: UiLocation::Settings,
            on_click: Arc::new(|| {}),
        };
        assert!(!ui.add_button("a.one", button));
    }
}
