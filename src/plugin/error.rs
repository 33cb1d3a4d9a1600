//! Plugin system error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::PreferenceError;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur during plugin operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin module file not found.
    #[error("Plugin module not found: {0}")]
    NotFound(PathBuf),

    /// No plugin with this id is loaded.
    #[error("Plugin '{0}' is not loaded")]
    NotLoaded(String),

    /// A plugin with this id is already loaded.
    #[error("Plugin '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// Plugin identity failed validation.
    #[error("Invalid plugin '{id}': {reason}")]
    InvalidPlugin { id: String, reason: String },

    /// Plugin requires a newer host.
    #[error("Plugin '{id}' requires host version {required}, but current version is {available}")]
    IncompatibleVersion { id: String, required: String, available: String },

    /// Module could not be loaded.
    #[error("Failed to load plugin module: {0}")]
    LoadError(String),

    /// Module loaded but exports no plugins.
    #[error("No plugin types found in {0}")]
    NoPlugins(PathBuf),

    /// A lifecycle hook failed.
    #[error("Plugin '{id}' failed in {hook}: {message}")]
    Lifecycle { id: String, hook: &'static str, message: String },

    /// Declared dependencies are not enabled.
    #[error("Plugin '{id}' has dependencies that are not enabled: {}", .missing.join(", "))]
    DependenciesUnmet { id: String, missing: Vec<String> },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Preference store error.
    #[error("Preference store error: {0}")]
    Preferences(#[from] PreferenceError),
}
