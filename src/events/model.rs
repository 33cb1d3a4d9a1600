//! Event envelope and the cancellable event shape.

use std::any::Any;
use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde_json::Value;

/// Envelope shared by every event.
///
/// The timestamp is fixed at construction. Subscribers may set `handled` and
/// stash auxiliary values in `data`.
#[derive(Debug, Clone)]
pub struct EventMeta {
    timestamp: DateTime<Local>,
    /// Set by a subscriber that fully processed the event.
    pub handled: bool,
    /// Free-form auxiliary values.
    pub data: HashMap<String, Value>,
}

impl EventMeta {
    /// Create an envelope stamped with the current time.
    pub fn new() -> Self {
        Self { timestamp: Local::now(), handled: false, data: HashMap::new() }
    }

    /// When the event was created.
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation flag and reason carried by cancellable events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelState {
    /// Whether a subscriber cancelled the operation.
    pub cancelled: bool,
    /// Free-text reason for the cancellation.
    pub reason: Option<String>,
}

/// An event that can be published on the [`EventBus`](super::EventBus).
///
/// Implement it with [`impl_event!`](crate::impl_event) on a struct that has
/// a `meta: EventMeta` field.
pub trait Event: Any + Send {
    /// The envelope.
    fn meta(&self) -> &EventMeta;

    /// The envelope, mutably.
    fn meta_mut(&mut self) -> &mut EventMeta;

    /// The cancellable view of this event, if it has one.
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        None
    }

    /// Creation time.
    fn timestamp(&self) -> DateTime<Local> {
        self.meta().timestamp()
    }

    /// Whether a subscriber marked the event handled.
    fn is_handled(&self) -> bool {
        self.meta().handled
    }

    /// Mark the event handled (or not).
    fn set_handled(&mut self, handled: bool) {
        self.meta_mut().handled = handled;
    }

    /// Auxiliary value by key.
    fn data(&self, key: &str) -> Option<&Value> {
        self.meta().data.get(key)
    }

    /// Store an auxiliary value.
    fn set_data(&mut self, key: &str, value: Value) {
        self.meta_mut().data.insert(key.to_string(), value);
    }

    /// Whether dispatch must stop: handled, cancellable, and cancelled.
    fn stops_dispatch(&self) -> bool {
        self.is_handled() && self.as_cancellable().is_some_and(|c| c.is_cancelled())
    }
}

/// An event whose publisher aborts the represented operation once cancelled.
///
/// Implement it with [`impl_cancellable_event!`](crate::impl_cancellable_event)
/// on a struct that has `meta: EventMeta` and `cancel: CancelState` fields.
pub trait Cancellable: Event {
    /// The cancellation state.
    fn cancel_state(&self) -> &CancelState;

    /// The cancellation state, mutably.
    fn cancel_state_mut(&mut self) -> &mut CancelState;

    /// Whether the operation was cancelled.
    fn is_cancelled(&self) -> bool {
        self.cancel_state().cancelled
    }

    /// Reason given for the cancellation.
    fn cancellation_reason(&self) -> Option<&str> {
        self.cancel_state().reason.as_deref()
    }

    /// Cancel the operation and mark the event handled, which stops dispatch.
    fn cancel(&mut self, reason: &str) {
        let state = self.cancel_state_mut();
        state.cancelled = true;
        state.reason = Some(reason.to_string());
        self.set_handled(true);
    }
}

/// Short type name of an event, without its module path.
pub fn event_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Implement [`Event`] for structs carrying a `meta: EventMeta` field.
#[macro_export]
macro_rules! impl_event {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::events::Event for $t {
                fn meta(&self) -> &$crate::events::EventMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut $crate::events::EventMeta {
                    &mut self.meta
                }
            }
        )+
    };
}

/// Implement [`Event`] and [`Cancellable`] for structs carrying
/// `meta: EventMeta` and `cancel: CancelState` fields.
#[macro_export]
macro_rules! impl_cancellable_event {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::events::Event for $t {
                fn meta(&self) -> &$crate::events::EventMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut $crate::events::EventMeta {
                    &mut self.meta
                }

                fn as_cancellable(&self) -> Option<&dyn $crate::events::Cancellable> {
                    Some(self)
                }
            }

            impl $crate::events::Cancellable for $t {
                fn cancel_state(&self) -> &$crate::events::CancelState {
                    &self.cancel
                }

                fn cancel_state_mut(&mut self) -> &mut $crate::events::CancelState {
                    &mut self.cancel
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Ping {
        meta: EventMeta,
    }

    #[derive(Debug, Default)]
    struct Launch {
        meta: EventMeta,
        cancel: CancelState,
    }

    crate::impl_event!(Ping);
    crate::impl_cancellable_event!(Launch);

    #[test]
    fn test_meta_defaults() {
        let before = Local::now();
        let ping = Ping::default();
        assert!(!ping.is_handled());
        assert!(ping.meta().data.is_empty());
        assert!(ping.timestamp() >= before);
        assert!(ping.as_cancellable().is_none());
    }

    #[test]
    fn test_data_bag() {
        let mut ping = Ping::default();
        ping.set_data("source", Value::from("test"));
        assert_eq!(ping.data("source"), Some(&Value::from("test")));
        assert!(ping.data("missing").is_none());
    }

    #[test]
    fn test_cancel_marks_handled() {
        let mut launch = Launch::default();
        assert!(!launch.stops_dispatch());

        launch.cancel("not today");
        assert!(launch.is_cancelled());
        assert!(launch.is_handled());
        assert_eq!(launch.cancellation_reason(), Some("not today"));
        assert!(launch.stops_dispatch());
    }

    #[test]
    fn test_cancelled_but_unhandled_does_not_stop() {
        let mut launch = Launch::default();
        launch.cancel_state_mut().cancelled = true;
        assert!(!launch.stops_dispatch());
    }

    #[test]
    fn test_handled_plain_event_does_not_stop() {
        let mut ping = Ping::default();
        ping.set_handled(true);
        assert!(!ping.stops_dispatch());
    }

    #[test]
    fn test_event_name() {
        assert_eq!(event_name::<Ping>(), "Ping");
        assert_eq!(event_name::<String>(), "String");
    }
}
