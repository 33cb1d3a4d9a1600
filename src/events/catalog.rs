//! Events published by the launcher and the plugin host.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use super::{CancelState, EventMeta};
use crate::core::Session;

/// A user signed in.
#[derive(Debug, Clone, Default)]
pub struct UserLoginEvent {
    pub meta: EventMeta,
    pub session: Option<Session>,
    pub username: String,
    pub offline: bool,
}

/// A user signed out.
#[derive(Debug, Clone, Default)]
pub struct UserLogoutEvent {
    pub meta: EventMeta,
    pub username: String,
    pub was_offline: bool,
}

/// The game is about to launch. Cancelling aborts the launch.
#[derive(Debug, Clone, Default)]
pub struct GameLaunchEvent {
    pub meta: EventMeta,
    pub cancel: CancelState,
    pub version: String,
    pub username: String,
    pub ram_mb: u32,
    pub launch_options: HashMap<String, Value>,
    pub jvm_arguments: Vec<String>,
}

/// The game process was started (or failed to start).
#[derive(Debug, Clone, Default)]
pub struct GameLaunchedEvent {
    pub meta: EventMeta,
    pub version: String,
    pub username: String,
    pub process_id: u32,
    pub launch_success: bool,
    pub error_message: Option<String>,
}

/// The game process exited.
#[derive(Debug, Clone, Default)]
pub struct GameExitEvent {
    pub meta: EventMeta,
    pub version: String,
    pub username: String,
    pub process_id: u32,
    pub exit_code: i32,
    pub play_time: Duration,
}

/// The application finished starting up.
#[derive(Debug, Clone, Default)]
pub struct ApplicationStartEvent {
    pub meta: EventMeta,
    pub version: String,
    pub working_directory: PathBuf,
    pub arguments: Vec<String>,
}

/// The application is about to exit. Cancelling keeps it running.
#[derive(Debug, Clone, Default)]
pub struct ApplicationExitEvent {
    pub meta: EventMeta,
    pub cancel: CancelState,
    pub reason: String,
}

/// A host setting changed.
#[derive(Debug, Clone, Default)]
pub struct SettingsChangedEvent {
    pub meta: EventMeta,
    pub setting_name: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// The user picked a game version.
#[derive(Debug, Clone, Default)]
pub struct VersionSelectedEvent {
    pub meta: EventMeta,
    pub version: String,
    pub version_type: String,
    pub previous_version: Option<String>,
}

/// A game version install started.
#[derive(Debug, Clone, Default)]
pub struct VersionInstallStartEvent {
    pub meta: EventMeta,
    pub version: String,
    pub version_type: String,
}

/// A game version install finished.
#[derive(Debug, Clone, Default)]
pub struct VersionInstallCompleteEvent {
    pub meta: EventMeta,
    pub version: String,
    pub version_type: String,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Progress of a file download.
#[derive(Debug, Clone, Default)]
pub struct DownloadProgressEvent {
    pub meta: EventMeta,
    pub file_name: String,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub status: String,
}

impl DownloadProgressEvent {
    /// Completion in percent, `0.0` when the total is unknown.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.bytes_downloaded as f64 * 100.0 / self.total_bytes as f64
        }
    }
}

/// A plugin was loaded into the host.
#[derive(Debug, Clone, Default)]
pub struct PluginLoadedEvent {
    pub meta: EventMeta,
    pub plugin_id: String,
    pub plugin_name: String,
    pub plugin_version: String,
    pub plugin_author: String,
}

/// A plugin was removed from the host.
#[derive(Debug, Clone, Default)]
pub struct PluginUnloadedEvent {
    pub meta: EventMeta,
    pub plugin_id: String,
    pub plugin_name: String,
    pub reason: String,
}

/// A plugin was enabled.
#[derive(Debug, Clone, Default)]
pub struct PluginEnabledEvent {
    pub meta: EventMeta,
    pub plugin_id: String,
    pub plugin_name: String,
}

/// A plugin was disabled.
#[derive(Debug, Clone, Default)]
pub struct PluginDisabledEvent {
    pub meta: EventMeta,
    pub plugin_id: String,
    pub plugin_name: String,
    pub reason: String,
}

/// Something went wrong somewhere in the launcher.
#[derive(Debug, Clone, Default)]
pub struct ErrorEvent {
    pub meta: EventMeta,
    pub error_message: String,
    pub source: String,
    pub severity: String,
}

/// A non-fatal warning.
#[derive(Debug, Clone, Default)]
pub struct WarningEvent {
    pub meta: EventMeta,
    pub warning_message: String,
    pub source: String,
}

/// A user-facing notification request.
#[derive(Debug, Clone, Default)]
pub struct NotificationEvent {
    pub meta: EventMeta,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub duration: Duration,
}

/// The UI theme changed.
#[derive(Debug, Clone, Default)]
pub struct ThemeChangedEvent {
    pub meta: EventMeta,
    pub old_theme: String,
    pub new_theme: String,
}

/// A window was shown or hidden.
#[derive(Debug, Clone, Default)]
pub struct UiVisibilityChangedEvent {
    pub meta: EventMeta,
    pub visible: bool,
    pub form_name: String,
    pub reason: String,
}

crate::impl_event!(
    UserLoginEvent,
    UserLogoutEvent,
    GameLaunchedEvent,
    GameExitEvent,
    ApplicationStartEvent,
    SettingsChangedEvent,
    VersionSelectedEvent,
    VersionInstallStartEvent,
    VersionInstallCompleteEvent,
    DownloadProgressEvent,
    PluginLoadedEvent,
    PluginUnloadedEvent,
    PluginEnabledEvent,
    PluginDisabledEvent,
    ErrorEvent,
    WarningEvent,
    NotificationEvent,
    ThemeChangedEvent,
    UiVisibilityChangedEvent,
);

crate::impl_cancellable_event!(GameLaunchEvent, ApplicationExitEvent);
