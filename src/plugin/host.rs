//! The plugin host.
//!
//! Owns every loaded plugin and drives it through
//! `Loaded -> {Enabled <-> Disabled} -> unloaded`. Plugin code (hooks, message
//! handlers) always runs with no registry lock held, so it may call back into
//! the host through its context.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use walkdir::WalkDir;

use super::context::{enabled_key, ContextParts, MessageHandler, PluginContext};
use super::contract::Plugin;
use super::loader::{default_loader, ModuleHandle, ModuleLoader, PluginFactory, PluginModule};
use super::resolver;
use super::services::{
    HeadlessUi, HostUi, LauncherServices, PreferenceLauncherServices, WindowId,
};
use super::types::{
    is_valid_plugin_id, PluginDescriptor, PluginInfo, PluginState, PluginStatus,
    REASON_SHUTDOWN, REASON_UNRESOLVED, REASON_USER_PREFERENCE,
};
use super::version::is_version_compatible;
use super::{PluginError, PluginResult};
use crate::core::{guard, HostConfig, JsonPreferenceStore, PreferenceStore, Session};
use crate::events::{
    ApplicationStartEvent, EventBus, PluginDisabledEvent, PluginEnabledEvent, PluginLoadedEvent,
    PluginUnloadedEvent,
};

type PluginCell = Arc<Mutex<Box<dyn Plugin>>>;

/// Runtime record of one loaded plugin.
///
/// Field order matters: everything that may run module code drops before
/// `module`.
struct PluginRecord {
    descriptor: PluginDescriptor,
    instance: PluginCell,
    context: Arc<PluginContext>,
    handlers: HashMap<String, MessageHandler>,
    state: PluginState,
    module: Arc<ModuleHandle>,
}

impl PluginRecord {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            descriptor: self.descriptor.clone(),
            state: self.state.clone(),
            module: Some(self.module.path().to_path_buf()),
        }
    }
}

#[derive(Default)]
struct Registry {
    records: HashMap<String, PluginRecord>,
    /// Ids in load order.
    order: Vec<String>,
}

impl Registry {
    fn remove(&mut self, id: &str) -> Option<PluginRecord> {
        self.order.retain(|o| o != id);
        self.records.remove(id)
    }
}

/// State shared between the host handle and plugin contexts.
pub(crate) struct HostShared {
    config: HostConfig,
    working_dir: PathBuf,
    bus: EventBus,
    preferences: Arc<dyn PreferenceStore>,
    ui: Arc<dyn HostUi>,
    launcher: Arc<dyn LauncherServices>,
    registry: RwLock<Registry>,
    /// Modules of unloaded plugins. Their event subscriptions may still point
    /// into them until the bus is cleared.
    retired: Mutex<Vec<Arc<ModuleHandle>>>,
    loader: Box<dyn ModuleLoader>,
    lifecycle: ReentrantMutex<()>,
    session: RwLock<Option<Session>>,
    initialized: AtomicBool,
}

/// Handle to the plugin host. Cheap to clone.
#[derive(Clone)]
pub struct PluginHost {
    shared: Arc<HostShared>,
}

/// Builder for [`PluginHost`]. Every collaborator has a default.
pub struct PluginHostBuilder {
    config: HostConfig,
    working_dir: Option<PathBuf>,
    bus: Option<EventBus>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    ui: Option<Arc<dyn HostUi>>,
    launcher: Option<Arc<dyn LauncherServices>>,
    loader: Option<Box<dyn ModuleLoader>>,
}

impl PluginHostBuilder {
    /// Working directory reported to plugins. Defaults to the data directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Event bus to publish on.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Preference store. Defaults to a JSON file at `preferences_file`.
    pub fn preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    /// UI bridge. Defaults to [`HeadlessUi`].
    pub fn ui(mut self, ui: Arc<dyn HostUi>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Launcher services. Defaults to [`PreferenceLauncherServices`].
    pub fn launcher(mut self, launcher: Arc<dyn LauncherServices>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Module loader. Defaults to native libraries with `module_extension`.
    pub fn loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Build the host.
    pub fn build(self) -> PluginResult<PluginHost> {
        let config = self.config;

        let preferences: Arc<dyn PreferenceStore> = match self.preferences {
            Some(store) => store,
            None => Arc::new(JsonPreferenceStore::open(&config.preferences_file)?),
        };
        let launcher = self.launcher.unwrap_or_else(|| {
            Arc::new(PreferenceLauncherServices::new(Arc::clone(&preferences), &config.game_dir))
        });
        let loader = self.loader.unwrap_or_else(|| default_loader(&config.module_extension));

        let shared = HostShared {
            working_dir: self.working_dir.unwrap_or_else(|| config.data_dir.clone()),
            bus: self.bus.unwrap_or_default(),
            preferences,
            ui: self.ui.unwrap_or_else(|| Arc::new(HeadlessUi)),
            launcher,
            registry: RwLock::new(Registry::default()),
            retired: Mutex::new(Vec::new()),
            loader,
            lifecycle: ReentrantMutex::new(()),
            session: RwLock::new(None),
            initialized: AtomicBool::new(false),
            config,
        };

        Ok(PluginHost { shared: Arc::new(shared) })
    }
}

impl PluginHost {
    /// Create a host with default collaborators.
    pub fn new(config: HostConfig) -> PluginResult<Self> {
        Self::builder(config).build()
    }

    /// Start building a host.
    pub fn builder(config: HostConfig) -> PluginHostBuilder {
        PluginHostBuilder {
            config,
            working_dir: None,
            bus: None,
            preferences: None,
            ui: None,
            launcher: None,
            loader: None,
        }
    }

    /// Host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.shared.config
    }

    /// The event bus shared with every plugin.
    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// The host preference store.
    pub fn preferences(&self) -> &Arc<dyn PreferenceStore> {
        &self.shared.preferences
    }

    /// Record the starting session and announce application start.
    ///
    /// Only the first call has any effect.
    pub fn initialize(&self, session: Option<Session>) {
        if self.shared.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Plugin host already initialized");
            return;
        }

        self.update_current_session(session);
        self.shared.bus.emit(ApplicationStartEvent {
            version: self.shared.config.host_version.clone(),
            working_directory: self.shared.working_dir.clone(),
            arguments: std::env::args().skip(1).collect(),
            ..Default::default()
        });
        tracing::info!(version = %self.shared.config.host_version, "Plugin host initialized");
    }

    /// Load every module under the plugins directory, then resolve
    /// dependencies. Returns the number of plugins loaded.
    pub fn load_all(&self) -> PluginResult<usize> {
        let _guard = self.shared.lifecycle.lock();
        let shared = &self.shared;
        let plugins_dir = &shared.config.plugins_dir;

        if !plugins_dir.exists() {
            std::fs::create_dir_all(plugins_dir)?;
            tracing::info!(path = %plugins_dir.display(), "Created plugins directory");
        }

        let data_root = shared.config.plugin_data_root();
        let modules: Vec<PathBuf> = WalkDir::new(plugins_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != data_root)
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read plugins directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| shared.loader.is_module(path))
            .collect();

        let mut loaded = 0;
        for path in &modules {
            match shared.load_module(path) {
                Ok(ids) => loaded += ids.len(),
                Err(e) => {
                    tracing::warn!(module = %path.display(), error = %e, "Failed to load plugin module");
                }
            }
        }

        tracing::info!(plugins = loaded, modules = modules.len(), "Loaded plugins");
        shared.resolve_dependencies();
        Ok(loaded)
    }

    /// Load every plugin exported by the module at `path`.
    ///
    /// Returns the ids of the plugins that loaded. Individual plugins that
    /// fail are logged and skipped; only a missing or unreadable module is an
    /// error. Loaded plugins start in [`PluginState::Loaded`].
    pub fn load_plugin(&self, path: &Path) -> PluginResult<Vec<String>> {
        let _guard = self.shared.lifecycle.lock();
        self.shared.load_module(path)
    }

    /// Run dependency resolution over every loaded plugin.
    pub fn resolve_dependencies(&self) {
        let _guard = self.shared.lifecycle.lock();
        self.shared.resolve_dependencies();
    }

    /// Disable (if enabled) and unload a plugin.
    ///
    /// The plugin is removed even when a hook fails; the first hook error is
    /// returned.
    pub fn unload_plugin(&self, id: &str, reason: &str) -> PluginResult<()> {
        let _guard = self.shared.lifecycle.lock();
        self.shared.unload(id, reason)
    }

    /// Enable a plugin whose dependencies are all enabled.
    pub fn enable_plugin(&self, id: &str) -> PluginResult<()> {
        let _guard = self.shared.lifecycle.lock();
        self.shared.enable(id)
    }

    /// Disable a plugin and remember the choice.
    pub fn disable_plugin(&self, id: &str, reason: &str) -> PluginResult<()> {
        let _guard = self.shared.lifecycle.lock();
        self.shared.disable(id, reason, true)
    }

    /// Snapshot of a loaded plugin.
    pub fn get_plugin(&self, id: &str) -> Option<PluginInfo> {
        self.shared.plugin_info(id)
    }

    /// Snapshots of every loaded plugin, in load order.
    pub fn all_plugins(&self) -> Vec<PluginInfo> {
        self.shared.all_plugin_infos()
    }

    /// Whether `id` is loaded and enabled.
    pub fn is_plugin_enabled(&self, id: &str) -> bool {
        self.shared.is_enabled(id)
    }

    /// The plugin's own health report.
    pub fn plugin_status(&self, id: &str) -> PluginResult<PluginStatus> {
        let instance = self.shared.instance(id)?;
        let status = guard::isolate(|| instance.lock().status()).unwrap_or_else(|panic| {
            PluginStatus {
                healthy: false,
                message: "Status check failed".to_string(),
                errors: vec![panic],
                ..PluginStatus::default()
            }
        });
        Ok(status)
    }

    /// Ask a plugin to show its configuration UI.
    pub fn show_configuration(&self, id: &str, parent: Option<WindowId>) -> PluginResult<()> {
        let instance = self.shared.instance(id)?;
        run_hook(id, "show_configuration", &instance, |plugin| {
            plugin.show_configuration(parent);
            Ok(())
        })
    }

    /// Current session.
    pub fn current_session(&self) -> Option<Session> {
        self.shared.session.read().clone()
    }

    /// Store a new session and push it to every plugin context.
    pub fn update_current_session(&self, session: Option<Session>) {
        *self.shared.session.write() = session.clone();

        let contexts: Vec<Arc<PluginContext>> = self
            .shared
            .registry
            .read()
            .records
            .values()
            .map(|record| Arc::clone(&record.context))
            .collect();

        for context in contexts {
            context.set_session(session.clone());
        }
        tracing::debug!(user = ?session.as_ref().map(|s| s.username.as_str()), "Session updated");
    }

    /// Send a one-way message to a plugin. Missing handlers and handler
    /// failures are logged, never reported.
    pub fn send_plugin_message(&self, target_id: &str, message: &str, data: Option<Value>) {
        self.shared.send_message(None, target_id, message, data.as_ref());
    }

    /// Register (or replace) the handler for `message` on plugin `owner_id`.
    pub fn register_message_handler(
        &self,
        owner_id: &str,
        message: &str,
        handler: impl Fn(&str, Option<&Value>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> PluginResult<()> {
        self.shared.register_handler(owner_id, message, Arc::new(handler))
    }

    /// Unload every plugin, newest first, and clear the event bus.
    pub fn unload_all_plugins(&self) {
        let _guard = self.shared.lifecycle.lock();
        let ids: Vec<String> = self.shared.registry.read().order.iter().rev().cloned().collect();

        for id in &ids {
            if let Err(e) = self.shared.unload(id, REASON_SHUTDOWN) {
                tracing::warn!(plugin = %id, error = %e, "Failed to unload plugin");
            }
        }

        self.shared.bus.clear();
        self.shared.retired.lock().clear();
        tracing::info!(count = ids.len(), "All plugins unloaded");
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugins_dir", &self.shared.config.plugins_dir)
            .field("plugins", &self.shared.registry.read().order)
            .finish_non_exhaustive()
    }
}

/// Run a plugin hook with the instance locked, turning errors and panics
/// into [`PluginError::Lifecycle`].
fn run_hook(
    id: &str,
    hook: &'static str,
    instance: &PluginCell,
    f: impl FnOnce(&mut dyn Plugin) -> PluginResult<()>,
) -> PluginResult<()> {
    let outcome = guard::isolate(|| {
        let mut plugin = instance.lock();
        f(&mut **plugin)
    });

    let message = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic,
    };

    tracing::error!(plugin = %id, hook, error = %message, "Plugin hook failed");
    Err(PluginError::Lifecycle { id: id.to_string(), hook, message })
}

impl HostShared {
    fn instance(&self, id: &str) -> PluginResult<PluginCell> {
        self.registry
            .read()
            .records
            .get(id)
            .map(|record| Arc::clone(&record.instance))
            .ok_or_else(|| PluginError::NotLoaded(id.to_string()))
    }

    fn set_state(&self, id: &str, state: PluginState) {
        if let Some(record) = self.registry.write().records.get_mut(id) {
            record.state = state;
        }
    }

    pub(crate) fn plugin_info(&self, id: &str) -> Option<PluginInfo> {
        self.registry.read().records.get(id).map(PluginRecord::info)
    }

    pub(crate) fn all_plugin_infos(&self) -> Vec<PluginInfo> {
        let registry = self.registry.read();
        registry.order.iter().filter_map(|id| registry.records.get(id)).map(PluginRecord::info).collect()
    }

    pub(crate) fn is_enabled(&self, id: &str) -> bool {
        self.registry.read().records.get(id).is_some_and(|record| record.state.is_enabled())
    }

    fn validate(&self, descriptor: &PluginDescriptor) -> PluginResult<()> {
        let invalid = |reason: &str| PluginError::InvalidPlugin {
            id: descriptor.id.clone(),
            reason: reason.to_string(),
        };

        if descriptor.id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if !is_valid_plugin_id(&descriptor.id) {
            return Err(invalid("id may only contain letters, digits, '.', '_' and '-'"));
        }
        if descriptor.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if descriptor.version.trim().is_empty() {
            return Err(invalid("version is empty"));
        }

        let host_version = &self.config.host_version;
        if !is_version_compatible(&descriptor.required_host_version, host_version) {
            return Err(PluginError::IncompatibleVersion {
                id: descriptor.id.clone(),
                required: descriptor.required_host_version.clone(),
                available: host_version.clone(),
            });
        }

        Ok(())
    }

    fn load_module(self: &Arc<Self>, path: &Path) -> PluginResult<Vec<String>> {
        if !path.exists() {
            return Err(PluginError::NotFound(path.to_path_buf()));
        }

        let PluginModule { factories, handle } = self.loader.load(path)?;
        if factories.is_empty() {
            return Err(PluginError::NoPlugins(path.to_path_buf()));
        }

        let module = Arc::new(handle);
        let mut loaded = Vec::new();
        for factory in factories {
            match self.load_one(factory.as_ref(), &module) {
                Ok(id) => loaded.push(id),
                Err(e) => tracing::warn!(
                    module = %path.display(),
                    plugin_type = factory.type_name(),
                    error = %e,
                    "Failed to load plugin"
                ),
            }
        }

        Ok(loaded)
    }

    fn load_one(
        self: &Arc<Self>,
        factory: &dyn PluginFactory,
        module: &Arc<ModuleHandle>,
    ) -> PluginResult<String> {
        let creation_failed =
            |message: String| PluginError::LoadError(format!("{}: {message}", factory.type_name()));

        let mut plugin = match guard::isolate(|| factory.create()) {
            Ok(Ok(plugin)) => plugin,
            Ok(Err(e)) => return Err(creation_failed(format!("{e:#}"))),
            Err(panic) => return Err(creation_failed(panic)),
        };

        let descriptor = guard::isolate(|| plugin.descriptor()).map_err(creation_failed)?;
        self.validate(&descriptor)?;

        let id = descriptor.id.clone();
        if self.registry.read().records.contains_key(&id) {
            return Err(PluginError::AlreadyLoaded(id));
        }

        let context = Arc::new(PluginContext::new(ContextParts {
            plugin_id: id.clone(),
            host_version: self.config.host_version.clone(),
            working_dir: self.working_dir.clone(),
            data_dir: self.config.plugin_data_dir(&id),
            bus: self.bus.scoped(&id),
            preferences: Arc::clone(&self.preferences),
            ui: Arc::clone(&self.ui),
            launcher: Arc::clone(&self.launcher),
            host: Arc::downgrade(self),
            session: self.session.read().clone(),
        }));
        plugin.base_mut().attach(Arc::clone(&context));

        let instance: PluginCell = Arc::new(Mutex::new(plugin));
        {
            let mut registry = self.registry.write();
            registry.order.push(id.clone());
            registry.records.insert(
                id.clone(),
                PluginRecord {
                    descriptor: descriptor.clone(),
                    instance: Arc::clone(&instance),
                    context: Arc::clone(&context),
                    handlers: HashMap::new(),
                    state: PluginState::Loaded,
                    module: Arc::clone(module),
                },
            );
        }

        if let Err(e) = run_hook(&id, "on_load", &instance, |p| p.on_load(Arc::clone(&context))) {
            let subscriptions = self.bus.unsubscribe_owner(&id);
            let record = self.registry.write().remove(&id);
            drop(instance);
            if let Some(record) = record {
                // Closures the plugin handed out may still point into the module.
                self.retired.lock().push(Arc::clone(&record.module));
            }
            tracing::debug!(plugin = %id, subscriptions, "Rolled back failed load");
            return Err(e);
        }
        instance.lock().base_mut().set_loaded(true);

        tracing::info!(plugin = %id, version = %descriptor.version, "Plugin loaded");
        self.bus.emit(PluginLoadedEvent {
            plugin_id: id.clone(),
            plugin_name: descriptor.name,
            plugin_version: descriptor.version,
            plugin_author: descriptor.author,
            ..Default::default()
        });

        Ok(id)
    }

    fn resolve_dependencies(&self) {
        let plugins: Vec<(String, Vec<String>)> = {
            let registry = self.registry.read();
            registry
                .order
                .iter()
                .filter_map(|id| registry.records.get(id))
                .map(|record| (record.descriptor.id.clone(), record.descriptor.dependencies.clone()))
                .collect()
        };

        let resolution = resolver::resolve(&plugins);

        for id in &resolution.order {
            if self.is_enabled(id) {
                continue;
            }

            if !self.preferences.get_or(&enabled_key(id), true) {
                tracing::info!(plugin = %id, "Plugin disabled by user preference");
                self.mark_disabled(id, REASON_USER_PREFERENCE);
                continue;
            }

            if let Err(e) = self.enable(id) {
                let reason = match e {
                    PluginError::DependenciesUnmet { .. } => REASON_UNRESOLVED.to_string(),
                    other => other.to_string(),
                };
                self.mark_disabled(id, &reason);
            }
        }

        for (id, reason) in &resolution.unresolved {
            tracing::warn!(plugin = %id, reason, "Plugin dependencies could not be resolved");
            self.mark_disabled(id, reason);
        }
    }

    /// Record `reason` on a plugin that must stay disabled.
    fn mark_disabled(&self, id: &str, reason: &str) {
        if self.is_enabled(id) {
            if let Err(e) = self.disable(id, reason, false) {
                tracing::warn!(plugin = %id, error = %e, "Failed to disable plugin");
            }
        } else {
            self.set_state(id, PluginState::Disabled { reason: reason.to_string() });
        }
    }

    fn enable(&self, id: &str) -> PluginResult<()> {
        let (instance, descriptor, previous) = {
            let registry = self.registry.read();
            let Some(record) = registry.records.get(id) else {
                tracing::warn!(plugin = %id, "Plugin is not loaded");
                return Err(PluginError::NotLoaded(id.to_string()));
            };
            (Arc::clone(&record.instance), record.descriptor.clone(), record.state.clone())
        };

        if previous.is_enabled() {
            tracing::debug!(plugin = %id, "Plugin is already enabled");
            return Ok(());
        }

        let valid = guard::isolate(|| instance.lock().validate_configuration()).unwrap_or(false);
        if !valid {
            let missing: Vec<String> = descriptor
                .dependencies
                .iter()
                .filter(|dep| !self.is_enabled(dep))
                .cloned()
                .collect();
            tracing::warn!(plugin = %id, missing = ?missing, "Plugin configuration is invalid, not enabling");
            return Err(PluginError::DependenciesUnmet { id: id.to_string(), missing });
        }

        self.set_state(id, PluginState::Enabled);
        let hook = run_hook(id, "on_enable", &instance, |plugin| {
            plugin.base_mut().set_enabled(true);
            plugin.on_enable()
        });
        if let Err(e) = hook {
            instance.lock().base_mut().set_enabled(false);
            self.set_state(id, previous);
            return Err(e);
        }

        if let Err(e) = self.preferences.set_value(&enabled_key(id), &true) {
            tracing::warn!(plugin = %id, error = %e, "Failed to save plugin state");
        }

        tracing::info!(plugin = %id, "Plugin enabled");
        self.bus.emit(PluginEnabledEvent {
            plugin_id: id.to_string(),
            plugin_name: descriptor.name,
            ..Default::default()
        });
        Ok(())
    }

    fn disable(&self, id: &str, reason: &str, persist: bool) -> PluginResult<()> {
        let (instance, name, state) = {
            let registry = self.registry.read();
            let Some(record) = registry.records.get(id) else {
                tracing::warn!(plugin = %id, "Plugin is not loaded");
                return Err(PluginError::NotLoaded(id.to_string()));
            };
            (Arc::clone(&record.instance), record.descriptor.name.clone(), record.state.clone())
        };

        match state {
            PluginState::Enabled => {}
            PluginState::Loaded => {
                self.set_state(id, PluginState::Disabled { reason: reason.to_string() });
                return Ok(());
            }
            PluginState::Disabled { .. } => {
                tracing::debug!(plugin = %id, "Plugin is already disabled");
                return Ok(());
            }
        }

        self.set_state(id, PluginState::Disabled { reason: reason.to_string() });
        let hook = run_hook(id, "on_disable", &instance, |plugin| {
            plugin.base_mut().set_enabled(false);
            plugin.on_disable()
        });

        if persist {
            if let Err(e) = self.preferences.set_value(&enabled_key(id), &false) {
                tracing::warn!(plugin = %id, error = %e, "Failed to save plugin state");
            }
        }

        tracing::info!(plugin = %id, reason, "Plugin disabled");
        self.bus.emit(PluginDisabledEvent {
            plugin_id: id.to_string(),
            plugin_name: name,
            reason: reason.to_string(),
            ..Default::default()
        });
        hook
    }

    fn unload(&self, id: &str, reason: &str) -> PluginResult<()> {
        let instance = match self.instance(id) {
            Ok(instance) => instance,
            Err(e) => {
                tracing::warn!(plugin = %id, "Plugin is not loaded");
                return Err(e);
            }
        };

        // Shutdown must not overwrite the user's saved choice.
        let disabled = if self.is_enabled(id) { self.disable(id, reason, false) } else { Ok(()) };
        if let Err(e) = &disabled {
            tracing::warn!(plugin = %id, error = %e, "Failed to disable plugin before unload");
        }

        let hook = run_hook(id, "on_unload", &instance, |plugin| {
            let result = plugin.on_unload();
            plugin.base_mut().set_loaded(false);
            result
        });
        drop(instance);

        let record = self.registry.write().remove(id);
        let Some(record) = record else {
            return disabled.and(hook);
        };

        let name = record.descriptor.name.clone();
        self.retired.lock().push(Arc::clone(&record.module));
        drop(record);

        tracing::info!(plugin = %id, reason, "Plugin unloaded");
        self.bus.emit(PluginUnloadedEvent {
            plugin_id: id.to_string(),
            plugin_name: name,
            reason: reason.to_string(),
            ..Default::default()
        });
        disabled.and(hook)
    }

    pub(crate) fn send_message(
        &self,
        sender: Option<&str>,
        target_id: &str,
        message: &str,
        data: Option<&Value>,
    ) {
        let handler = self
            .registry
            .read()
            .records
            .get(target_id)
            .and_then(|record| record.handlers.get(message).cloned());

        let Some(handler) = handler else {
            tracing::debug!(from = ?sender, target = target_id, message, "No handler for plugin message");
            return;
        };

        match guard::isolate(|| handler(message, data)) {
            Ok(Ok(())) => {
                tracing::debug!(from = ?sender, target = target_id, message, "Plugin message delivered");
            }
            Ok(Err(e)) => {
                tracing::error!(target = target_id, message, error = %e, "Plugin message handler failed");
            }
            Err(panic) => {
                tracing::error!(target = target_id, message, error = %panic, "Plugin message handler panicked");
            }
        }
    }

    pub(crate) fn register_handler(
        &self,
        owner_id: &str,
        message: &str,
        handler: MessageHandler,
    ) -> PluginResult<()> {
        let mut registry = self.registry.write();
        let record = registry
            .records
            .get_mut(owner_id)
            .ok_or_else(|| PluginError::NotLoaded(owner_id.to_string()))?;

        record.handlers.insert(message.to_string(), handler);
        tracing::debug!(plugin = %owner_id, message, "Registered message handler");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemoryPreferenceStore;
    use crate::plugin::{PluginBase, PluginExport, StaticModuleLoader};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Sample {
        base: PluginBase,
    }

    impl Plugin for Sample {
        fn id(&self) -> &str {
            "test.sample"
        }
        fn name(&self) -> &str {
            "Sample"
        }
        fn description(&self) -> &str {
            "Test plugin"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn author(&self) -> &str {
            "test"
        }
        fn base(&self) -> &PluginBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut PluginBase {
            &mut self.base
        }
    }

    fn host(temp_dir: &TempDir) -> PluginHost {
        let loader = StaticModuleLoader::new("plugin").register("sample", || {
            let mut export = PluginExport::new();
            export.register_factory(Box::new(crate::plugin::DefaultFactory::<Sample>::new()));
            export
        });
        PluginHost::builder(HostConfig::with_data_dir(temp_dir.path()))
            .preferences(Arc::new(MemoryPreferenceStore::new()))
            .loader(loader)
            .build()
            .unwrap()
    }

    fn write_module(host: &PluginHost, stem: &str) -> PathBuf {
        let dir = &host.config().plugins_dir;
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(format!("{stem}.plugin"));
        std::fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_load_missing_module() {
        let temp_dir = TempDir::new().unwrap();
        let host = host(&temp_dir);

        let result = host.load_plugin(&temp_dir.path().join("nope.plugin"));
        assert!(matches!(result, Err(PluginError::NotFound(_))));
    }

    #[test]
    fn test_loaded_state_then_enable() {
        let temp_dir = TempDir::new().unwrap();
        let host = host(&temp_dir);
        let path = write_module(&host, "sample");

        let ids = host.load_plugin(&path).unwrap();
        assert_eq!(ids, vec!["test.sample"]);
        assert_eq!(host.get_plugin("test.sample").unwrap().state, PluginState::Loaded);
        assert!(!host.is_plugin_enabled("test.sample"));

        host.enable_plugin("test.sample").unwrap();
        assert!(host.is_plugin_enabled("test.sample"));
        assert!(host.plugin_status("test.sample").unwrap().healthy);
    }

    #[test]
    fn test_operations_on_unknown_plugin() {
        let temp_dir = TempDir::new().unwrap();
        let host = host(&temp_dir);

        assert!(matches!(host.enable_plugin("x.y"), Err(PluginError::NotLoaded(_))));
        assert!(matches!(host.disable_plugin("x.y", "r"), Err(PluginError::NotLoaded(_))));
        assert!(matches!(host.unload_plugin("x.y", "r"), Err(PluginError::NotLoaded(_))));
        assert!(host.register_message_handler("x.y", "ping", |_, _| Ok(())).is_err());
        host.send_plugin_message("x.y", "ping", None);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let host = host(&temp_dir);
        let starts = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let counter = Arc::clone(&starts);
        host.events().on::<ApplicationStartEvent>(0, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        host.initialize(Some(Session::offline("Steve")));
        host.initialize(None);

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(host.current_session().unwrap().username, "Steve");
    }
}
