//! Core host services: configuration, persistent preferences, and the
//! signed-in session.

mod config;
pub(crate) mod guard;
mod preferences;
mod session;

pub use config::{HostConfig, LOCAL_CONFIG_FILE};
pub use preferences::{
    JsonPreferenceStore, MemoryPreferenceStore, PreferenceError, PreferenceResult,
    PreferenceStore,
};
pub use session::Session;
