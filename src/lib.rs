//! # launcher-host
//!
//! Plugin host and event bus for a desktop game launcher.
//!
//! Third-party plugins are loaded at runtime, given a capability-scoped
//! context, and driven through a load/enable/disable/unload lifecycle.
//! Plugins and the launcher talk to each other through a typed,
//! priority-ordered event bus.
//!
//! ## Features
//!
//! - **Event bus**: synchronous, priority-ordered dispatch with per-handler
//!   fault isolation and cancellable events
//! - **Plugin contexts**: namespaced configuration, id-tagged logging, UI and
//!   launcher bridges, inter-plugin messaging
//! - **Dependency resolution**: plugins enable after their dependencies;
//!   cycles and missing dependencies leave them disabled with a reason
//! - **Module loading**: native shared libraries or compiled-in registries
//!
//! ## Quick Start
//!
//! ```bash
//! # List plugins found in the configured plugins directory
//! launcher-host list
//!
//! # Turn one off for future runs
//! launcher-host disable author.name
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::significant_drop_in_scrutinee)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::new_without_default)]
#![allow(clippy::use_self)]

pub mod core;
pub mod events;
pub mod plugin;

// Re-export commonly used types
pub use core::{HostConfig, JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore, Session};
pub use events::{Cancellable, Event, EventBus, EventMeta};
pub use plugin::{
    Plugin, PluginBase, PluginContext, PluginError, PluginHost, PluginInfo, PluginResult,
    PluginState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "launcher-host";
