//! Event model and event bus.
//!
//! Events are plain structs built on one of two shapes: the base envelope
//! ([`EventMeta`]) or the cancellable variant (envelope plus
//! [`CancelState`]). The [`EventBus`] routes them by exact Rust type.
//!
//! # Example
//!
//! ```
//! use launcher_host::events::{Cancellable, EventBus, GameLaunchEvent};
//!
//! let bus = EventBus::new();
//! bus.on::<GameLaunchEvent>(10, |e| {
//!     if e.version.is_empty() {
//!         e.cancel("no version selected");
//!     }
//!     Ok(())
//! });
//!
//! let launch = bus.emit(GameLaunchEvent::default());
//! assert!(launch.is_cancelled());
//! ```

mod bus;
mod catalog;
mod model;

pub use bus::{EventBus, Handler, HandlerResult};
pub use catalog::{
    ApplicationExitEvent, ApplicationStartEvent, DownloadProgressEvent, ErrorEvent,
    GameExitEvent, GameLaunchEvent, GameLaunchedEvent, NotificationEvent, PluginDisabledEvent,
    PluginEnabledEvent, PluginLoadedEvent, PluginUnloadedEvent, SettingsChangedEvent,
    ThemeChangedEvent, UiVisibilityChangedEvent, UserLoginEvent, UserLogoutEvent,
    VersionInstallCompleteEvent, VersionInstallStartEvent, VersionSelectedEvent, WarningEvent,
};
pub use model::{event_name, CancelState, Cancellable, Event, EventMeta};
