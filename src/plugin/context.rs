//! The per-plugin context: the only surface a plugin uses to reach the host.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::host::HostShared;
use super::services::{
    HostUi, LauncherServices, MenuItem, MessageKind, PluginWindow, UiButton, UiCallback,
    UiLocation,
};
use super::types::PluginInfo;
use super::PluginResult;
use crate::core::{PreferenceError, PreferenceStore, Session};
use crate::events::EventBus;

/// Callback for a named inter-plugin message. Receives the message name and
/// the optional payload.
pub type MessageHandler = Arc<dyn Fn(&str, Option<&Value>) -> anyhow::Result<()> + Send + Sync>;

/// Preference key holding the persisted enabled flag of a plugin.
pub(crate) fn enabled_key(plugin_id: &str) -> String {
    format!("plugin/{plugin_id}/enabled")
}

/// Capability-scoped handle issued to one plugin.
pub struct PluginContext {
    plugin_id: String,
    host_version: String,
    working_dir: PathBuf,
    data_dir: PathBuf,
    bus: EventBus,
    config: PluginConfig,
    logger: PluginLogger,
    ui: PluginUi,
    launcher: Arc<dyn LauncherServices>,
    host: Weak<HostShared>,
    session: RwLock<Option<Session>>,
}

/// Everything needed to build a [`PluginContext`].
pub(crate) struct ContextParts {
    pub plugin_id: String,
    pub host_version: String,
    pub working_dir: PathBuf,
    pub data_dir: PathBuf,
    pub bus: EventBus,
    pub preferences: Arc<dyn PreferenceStore>,
    pub ui: Arc<dyn HostUi>,
    pub launcher: Arc<dyn LauncherServices>,
    pub host: Weak<HostShared>,
    pub session: Option<Session>,
}

impl PluginContext {
    /// Build a context and create the plugin's data directory.
    pub(crate) fn new(parts: ContextParts) -> Self {
        if let Err(e) = std::fs::create_dir_all(&parts.data_dir) {
            tracing::warn!(
                plugin = %parts.plugin_id,
                path = %parts.data_dir.display(),
                error = %e,
                "Failed to create plugin data directory"
            );
        }

        Self {
            config: PluginConfig::new(&parts.plugin_id, parts.preferences),
            logger: PluginLogger::new(&parts.plugin_id),
            ui: PluginUi::new(&parts.plugin_id, parts.ui),
            plugin_id: parts.plugin_id,
            host_version: parts.host_version,
            working_dir: parts.working_dir,
            data_dir: parts.data_dir,
            bus: parts.bus,
            launcher: parts.launcher,
            host: parts.host,
            session: RwLock::new(parts.session),
        }
    }

    /// Id of the plugin this context belongs to.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Version of the running host.
    pub fn host_version(&self) -> &str {
        &self.host_version
    }

    /// Host working directory.
    pub fn working_directory(&self) -> &Path {
        &self.working_dir
    }

    /// Directory reserved for this plugin's files.
    pub fn data_directory(&self) -> &Path {
        &self.data_dir
    }

    /// The host event bus.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Namespaced configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Id-tagged logger.
    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }

    /// UI bridge.
    pub fn ui(&self) -> &PluginUi {
        &self.ui
    }

    /// Launcher state and launch-argument access.
    pub fn launcher(&self) -> &dyn LauncherServices {
        self.launcher.as_ref()
    }

    /// Current user session, if anyone is logged in.
    pub fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub(crate) fn set_session(&self, session: Option<Session>) {
        *self.session.write() = session;
    }

    /// Look up another loaded plugin.
    pub fn get_plugin(&self, id: &str) -> Option<PluginInfo> {
        self.host.upgrade().and_then(|host| host.plugin_info(id))
    }

    /// Every loaded plugin, in load order.
    pub fn all_plugins(&self) -> Vec<PluginInfo> {
        self.host.upgrade().map(|host| host.all_plugin_infos()).unwrap_or_default()
    }

    /// Whether the plugin `id` is loaded and enabled.
    pub fn is_plugin_enabled(&self, id: &str) -> bool {
        self.host.upgrade().is_some_and(|host| host.is_enabled(id))
    }

    /// Send a one-way message to another plugin.
    pub fn send_message(&self, target_id: &str, message: &str, data: Option<Value>) {
        match self.host.upgrade() {
            Some(host) => host.send_message(Some(&self.plugin_id), target_id, message, data.as_ref()),
            None => self.logger.warning("Host is gone, message dropped"),
        }
    }

    /// Handle a named message sent to this plugin. Replaces any previous
    /// handler for the same message.
    pub fn register_message_handler(
        &self,
        message: &str,
        handler: impl Fn(&str, Option<&Value>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        if let Some(host) = self.host.upgrade() {
            if let Err(e) = host.register_handler(&self.plugin_id, message, Arc::new(handler)) {
                self.logger.warning(&format!("Failed to register handler for '{message}': {e}"));
            }
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("host_version", &self.host_version)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

/// Configuration store scoped to one plugin.
///
/// Keys are stored as `plugin/<id>/config/<key>` in the host preference store,
/// so two plugins never see each other's values.
pub struct PluginConfig {
    prefix: String,
    store: Arc<dyn PreferenceStore>,
}

impl PluginConfig {
    fn new(plugin_id: &str, store: Arc<dyn PreferenceStore>) -> Self {
        Self { prefix: format!("plugin/{plugin_id}/config/"), store }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read a value, or `default` if missing or of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.store.get_or(&self.full_key(key), default)
    }

    /// Write a value.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> PluginResult<()> {
        let value = serde_json::to_value(value).map_err(PreferenceError::from)?;
        self.store.set(&self.full_key(key), value)?;
        Ok(())
    }

    /// Remove a value.
    pub fn delete(&self, key: &str) -> PluginResult<()> {
        self.store.delete(&self.full_key(key))?;
        Ok(())
    }

    /// Whether a value is stored under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.store.exists(&self.full_key(key))
    }

    /// Every key this plugin has stored.
    pub fn keys(&self) -> Vec<String> {
        self.store
            .keys_with_prefix(&self.prefix)
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(ToString::to_string))
            .collect()
    }
}

/// Logger that tags every record with the plugin id.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_id: String,
}

impl PluginLogger {
    fn new(plugin_id: &str) -> Self {
        Self { plugin_id: plugin_id.to_string() }
    }

    pub fn info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_id, "[Plugin:{}] {}", self.plugin_id, message);
    }

    pub fn warning(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_id, "[Plugin:{}] {}", self.plugin_id, message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin_id, "[Plugin:{}] {}", self.plugin_id, message);
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_id, "[Plugin:{}] {}", self.plugin_id, message);
    }
}

/// UI bridge scoped to one plugin.
pub struct PluginUi {
    plugin_id: String,
    ui: Arc<dyn HostUi>,
}

impl PluginUi {
    fn new(plugin_id: &str, ui: Arc<dyn HostUi>) -> Self {
        Self { plugin_id: plugin_id.to_string(), ui }
    }

    /// Show a message box.
    pub fn show_message(&self, message: &str, title: &str, kind: MessageKind) {
        self.ui.show_message(&self.plugin_id, message, title, kind);
    }

    /// Ask the host for a menu item. Returns whether it was placed.
    pub fn add_menu_item(&self, text: &str, parent: Option<&str>, on_click: UiCallback) -> bool {
        let item = MenuItem {
            text: text.to_string(),
            parent: parent.map(ToString::to_string),
            on_click,
        };
        self.ui.add_menu_item(&self.plugin_id, item)
    }

    /// Ask the host for a button. Returns whether it was placed.
    pub fn add_button(&self, text: &str, location: UiLocation, on_click: UiCallback) -> bool {
        let button = UiButton { text: text.to_string(), location, on_click };
        self.ui.add_button(&self.plugin_id, button)
    }

    /// Show a plugin window. Failures are logged.
    pub fn show_window(&self, window: Box<dyn PluginWindow>, modal: bool) -> bool {
        match self.ui.show_window(&self.plugin_id, window, modal) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(plugin = %self.plugin_id, error = %e, "Failed to show plugin window");
                false
            }
        }
    }
}
