//! Plugin system for the launcher host.
//!
//! Plugins are native Rust types implementing [`Plugin`]. Modules export them
//! through factories ([`declare_plugins!`](crate::declare_plugins) for shared
//! libraries, [`StaticModuleLoader`] for plugins compiled into the host), and
//! the [`PluginHost`] drives each one through its lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! load_plugin ──> Loaded ──> Enabled <──> Disabled ──> unload_plugin
//! ```
//!
//! After a bulk [`PluginHost::load_all`], dependencies are resolved and every
//! plugin whose dependencies are satisfied is enabled, unless the user
//! disabled it in an earlier run.
//!
//! Plugins run with full host privileges: there is no sandbox and no timeout
//! on hooks.

mod context;
mod contract;
mod error;
mod host;
mod loader;
mod resolver;
mod services;
mod types;
mod version;

pub use context::{MessageHandler, PluginConfig, PluginContext, PluginLogger, PluginUi};
pub use contract::{Plugin, PluginBase};
pub use error::{PluginError, PluginResult};
pub use host::{PluginHost, PluginHostBuilder};
#[cfg(feature = "dylib")]
pub use loader::DylibModuleLoader;
pub use loader::{
    default_loader, DefaultFactory, ModuleHandle, ModuleLoader, PluginExport, PluginFactory,
    PluginModule, StaticModuleLoader,
};
pub use resolver::{resolve, Resolution};
pub use services::{
    HeadlessUi, HostUi, LaunchSettings, LauncherServices, MenuItem, MessageKind, PluginWindow,
    PreferenceLauncherServices, UiButton, UiCallback, UiLocation, WindowId,
};
pub use types::{
    is_valid_plugin_id, PluginDescriptor, PluginInfo, PluginState, PluginStatus,
    DEFAULT_REQUIRED_HOST_VERSION, ENTRY_SYMBOL, REASON_CIRCULAR, REASON_MANUAL_DISABLE,
    REASON_SHUTDOWN, REASON_UNRESOLVED, REASON_USER_PREFERENCE,
};
pub use version::{is_version_compatible, HostVersion};
