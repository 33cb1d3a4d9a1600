//! The plugin contract.
//!
//! Every plugin implements [`Plugin`] and embeds a [`PluginBase`], which holds
//! the context the host hands over at load time plus the loaded/enabled flags
//! the host keeps in sync.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::context::PluginContext;
use super::services::{MessageKind, WindowId};
use super::types::{PluginDescriptor, PluginStatus, DEFAULT_REQUIRED_HOST_VERSION};
use super::PluginResult;
use crate::core::guard;

/// Trait that all plugins must implement.
///
/// Identity methods have no defaults. Lifecycle hooks default to logging
/// through the plugin's context.
pub trait Plugin: Send {
    /// Globally unique id, `author.name` by convention.
    fn id(&self) -> &str;

    /// Display name.
    fn name(&self) -> &str;

    /// What the plugin does.
    fn description(&self) -> &str;

    /// Plugin version.
    fn version(&self) -> &str;

    /// Plugin author.
    fn author(&self) -> &str;

    /// Minimum host version.
    fn required_host_version(&self) -> &str {
        DEFAULT_REQUIRED_HOST_VERSION
    }

    /// Ids of plugins that must be enabled before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether [`Plugin::show_configuration`] does anything useful.
    fn has_configuration(&self) -> bool {
        false
    }

    /// Shared plugin state.
    fn base(&self) -> &PluginBase;

    /// Shared plugin state, mutably.
    fn base_mut(&mut self) -> &mut PluginBase;

    /// Called once after the plugin is registered. The context is already
    /// attached to [`Plugin::base`] when this runs.
    fn on_load(&mut self, context: Arc<PluginContext>) -> PluginResult<()> {
        context.logger().info(&format!("Plugin {} v{} loaded", self.name(), self.version()));
        Ok(())
    }

    /// Called on every transition to enabled.
    fn on_enable(&mut self) -> PluginResult<()> {
        self.base().log_info(&format!("Plugin {} enabled", self.name()));
        Ok(())
    }

    /// Called on every transition from enabled, including before unload.
    fn on_disable(&mut self) -> PluginResult<()> {
        self.base().log_info(&format!("Plugin {} disabled", self.name()));
        Ok(())
    }

    /// Called once before the plugin is dropped.
    fn on_unload(&mut self) -> PluginResult<()> {
        self.base().log_info(&format!("Plugin {} unloaded", self.name()));
        Ok(())
    }

    /// Show the configuration UI.
    fn show_configuration(&mut self, _parent: Option<WindowId>) {
        self.base().show_message(
            &format!("{} has no configuration options.", self.name()),
            "Plugin Configuration",
            MessageKind::Info,
        );
    }

    /// Whether every declared dependency is currently enabled.
    fn validate_configuration(&self) -> bool {
        let dependencies = self.dependencies();
        if dependencies.is_empty() {
            return true;
        }

        let Some(context) = self.base().context() else {
            return false;
        };

        dependencies.iter().all(|dep| {
            let enabled = context.is_plugin_enabled(dep);
            if !enabled {
                context.logger().warning(&format!("Dependency {dep} is not enabled"));
            }
            enabled
        })
    }

    /// Health report.
    fn status(&self) -> PluginStatus {
        let base = self.base();
        let mut status = PluginStatus::default();

        if !base.is_loaded() {
            status.errors.push("Plugin is not loaded".to_string());
        }
        if !base.is_enabled() {
            status.warnings.push("Plugin is disabled".to_string());
        }

        let dependencies_ok = self.validate_configuration();
        if !dependencies_ok {
            status.errors.push("Dependencies are not enabled".to_string());
        }

        status.healthy = base.is_loaded() && base.is_enabled() && dependencies_ok;
        status.message = if status.healthy {
            "OK".to_string()
        } else if base.is_enabled() {
            "Unhealthy".to_string()
        } else {
            "Disabled".to_string()
        };
        status
    }

    /// Snapshot of this plugin's identity.
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            version: self.version().to_string(),
            author: self.author().to_string(),
            required_host_version: self.required_host_version().to_string(),
            dependencies: self.dependencies(),
            has_configuration: self.has_configuration(),
        }
    }
}

/// State every plugin embeds.
#[derive(Default)]
pub struct PluginBase {
    context: Option<Arc<PluginContext>>,
    loaded: bool,
    enabled: bool,
}

impl PluginBase {
    /// Create an unattached base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context handed over by the host, once loaded.
    pub fn context(&self) -> Option<&Arc<PluginContext>> {
        self.context.as_ref()
    }

    /// Whether `on_load` has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the host currently has this plugin enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn attach(&mut self, context: Arc<PluginContext>) {
        self.context = Some(context);
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Log at info level.
    pub fn log_info(&self, message: &str) {
        match &self.context {
            Some(ctx) => ctx.logger().info(message),
            None => tracing::info!("{}", message),
        }
    }

    /// Log at warning level.
    pub fn log_warning(&self, message: &str) {
        match &self.context {
            Some(ctx) => ctx.logger().warning(message),
            None => tracing::warn!("{}", message),
        }
    }

    /// Log at error level.
    pub fn log_error(&self, message: &str) {
        match &self.context {
            Some(ctx) => ctx.logger().error(message),
            None => tracing::error!("{}", message),
        }
    }

    /// Log at debug level.
    pub fn log_debug(&self, message: &str) {
        match &self.context {
            Some(ctx) => ctx.logger().debug(message),
            None => tracing::debug!("{}", message),
        }
    }

    /// Read a configuration value, or `default` before load.
    pub fn config_value<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match &self.context {
            Some(ctx) => ctx.config().get(key, default),
            None => default,
        }
    }

    /// Write a configuration value. Ignored before load.
    pub fn set_config_value<T: Serialize>(&self, key: &str, value: &T) -> PluginResult<()> {
        match &self.context {
            Some(ctx) => ctx.config().set(key, value),
            None => Ok(()),
        }
    }

    /// Show a message box through the host UI.
    pub fn show_message(&self, message: &str, title: &str, kind: MessageKind) {
        match &self.context {
            Some(ctx) => ctx.ui().show_message(message, title, kind),
            None => tracing::info!(title, "{}", message),
        }
    }

    /// Run `operation`, logging any error or panic and returning `default`
    /// in that case.
    pub fn safe_execute<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce() -> anyhow::Result<T>,
        default: T,
    ) -> T {
        match guard::isolate(operation) {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                self.log_error(&format!("Error in {operation_name}: {e:#}"));
                default
            }
            Err(panic) => {
                self.log_error(&format!("Error in {operation_name}: {panic}"));
                default
            }
        }
    }
}

impl std::fmt::Debug for PluginBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginBase")
            .field("plugin", &self.context.as_ref().map(|c| c.plugin_id().to_string()))
            .field("loaded", &self.loaded)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare {
        base: PluginBase,
        deps: Vec<String>,
    }

    impl Plugin for Bare {
        fn id(&self) -> &str {
            "test.bare"
        }
        fn name(&self) -> &str {
            "Bare"
        }
        fn description(&self) -> &str {
            ""
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn author(&self) -> &str {
            "test"
        }
        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }
        fn base(&self) -> &PluginBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut PluginBase {
            &mut self.base
        }
    }

    #[test]
    fn test_defaults() {
        let plugin = Bare { base: PluginBase::new(), deps: Vec::new() };
        let descriptor = plugin.descriptor();

        assert_eq!(descriptor.required_host_version, "1.0.0");
        assert!(descriptor.dependencies.is_empty());
        assert!(!descriptor.has_configuration);
        assert!(plugin.validate_configuration());
    }

    #[test]
    fn test_unattached_dependencies_are_unmet() {
        let plugin = Bare { base: PluginBase::new(), deps: vec!["a.one".to_string()] };
        assert!(!plugin.validate_configuration());
    }

    #[test]
    fn test_status_derivation() {
        let mut plugin = Bare { base: PluginBase::new(), deps: Vec::new() };
        let status = plugin.status();
        assert!(!status.healthy);
        assert_eq!(status.errors, vec!["Plugin is not loaded".to_string()]);

        plugin.base_mut().set_loaded(true);
        plugin.base_mut().set_enabled(true);
        let status = plugin.status();
        assert!(status.healthy);
        assert_eq!(status.message, "OK");
    }

    #[test]
    fn test_safe_execute() {
        let base = PluginBase::new();
        assert_eq!(base.safe_execute("ok", || Ok(7), 0), 7);
        assert_eq!(base.safe_execute("fails", || anyhow::bail!("nope"), 0), 0);
        assert_eq!(base.safe_execute("panics", || -> anyhow::Result<i32> { panic!("boom") }, 3), 3);
    }

    #[test]
    fn test_config_before_load() {
        let base = PluginBase::new();
        assert_eq!(base.config_value("color", "red".to_string()), "red");
        assert!(base.set_config_value("color", &"blue").is_ok());
    }
}
