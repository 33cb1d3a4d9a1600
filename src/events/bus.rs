//! Type-keyed, priority-ordered event bus.
//!
//! Dispatch is synchronous on the publishing thread. The subscription table
//! sits behind one mutex; `publish` snapshots the subscriber list under the
//! lock and runs handlers outside it, so handlers may freely subscribe or
//! unsubscribe. A subscriber added mid-publish misses the in-flight event.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::model::{event_name, Event};
use crate::core::guard::isolate;

/// Result returned by event handlers.
pub type HandlerResult = anyhow::Result<()>;

type Callback<E> = dyn Fn(&mut E) -> HandlerResult + Send + Sync;
type ErasedCallback = dyn Fn(&mut dyn Any) -> HandlerResult + Send + Sync;

/// A subscribable event handler.
///
/// Identity is the underlying allocation: clones of one `Handler` are the
/// same handler for [`EventBus::unsubscribe`], two `Handler::new` calls with
/// identical closures are not.
pub struct Handler<E: Event> {
    callback: Arc<Callback<E>>,
}

impl<E: Event> Handler<E> {
    /// Wrap a closure as a handler.
    pub fn new(f: impl Fn(&mut E) -> HandlerResult + Send + Sync + 'static) -> Self {
        Self { callback: Arc::new(f) }
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.callback).cast::<()>() as usize
    }
}

impl<E: Event> Clone for Handler<E> {
    fn clone(&self) -> Self {
        Self { callback: Arc::clone(&self.callback) }
    }
}

impl<E: Event> std::fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("event", &event_name::<E>()).finish()
    }
}

#[derive(Clone)]
struct Subscription {
    identity: usize,
    priority: i32,
    event: &'static str,
    owner: Option<Arc<str>>,
    dispatch: Arc<ErasedCallback>,
}

/// Publish/subscribe dispatcher shared by the host and every plugin context.
///
/// Cloning yields another handle to the same subscription table. A handle
/// from [`EventBus::scoped`] also tags every subscription it makes with an
/// owner, so the host can drop a plugin's handlers in one call.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<Mutex<HashMap<TypeId, Vec<Subscription>>>>,
    owner: Option<Arc<str>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the same table whose subscriptions belong to `owner`.
    pub fn scoped(&self, owner: &str) -> Self {
        Self { subscriptions: Arc::clone(&self.subscriptions), owner: Some(Arc::from(owner)) }
    }

    /// Owner this handle tags subscriptions with, if any.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Remove every subscription made through a handle scoped to `owner`.
    ///
    /// Returns how many registrations were removed.
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut table = self.subscriptions.lock();
        let mut removed = 0;

        for list in table.values_mut() {
            let before = list.len();
            list.retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - list.len();
        }
        table.retain(|_, list| !list.is_empty());

        if removed > 0 {
            tracing::debug!(owner, removed, "Removed owner subscriptions");
        }
        removed
    }

    /// Register `handler` for events of type `E`.
    ///
    /// Higher priorities run first. Registering the same handler twice adds
    /// two independent registrations.
    pub fn subscribe<E: Event>(&self, handler: &Handler<E>, priority: i32) {
        let callback = Arc::clone(&handler.callback);
        let dispatch: Arc<ErasedCallback> = Arc::new(move |event: &mut dyn Any| {
            match event.downcast_mut::<E>() {
                Some(event) => callback(event),
                None => Ok(()),
            }
        });

        let subscription = Subscription {
            identity: handler.identity(),
            priority,
            event: event_name::<E>(),
            owner: self.owner.clone(),
            dispatch,
        };

        let mut table = self.subscriptions.lock();
        let list = table.entry(TypeId::of::<E>()).or_default();
        let position = list.partition_point(|s| s.priority >= priority);
        list.insert(position, subscription);

        tracing::debug!(event = event_name::<E>(), priority, "Subscribed to event");
    }

    /// Wrap `f` in a [`Handler`], subscribe it, and return it for later
    /// unsubscription.
    pub fn on<E: Event>(
        &self,
        priority: i32,
        f: impl Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    ) -> Handler<E> {
        let handler = Handler::new(f);
        self.subscribe(&handler, priority);
        handler
    }

    /// Remove every registration of `handler` for `E`.
    ///
    /// Returns how many registrations were removed; zero is not an error.
    pub fn unsubscribe<E: Event>(&self, handler: &Handler<E>) -> usize {
        let identity = handler.identity();
        let type_id = TypeId::of::<E>();

        let mut table = self.subscriptions.lock();
        let Some(list) = table.get_mut(&type_id) else {
            return 0;
        };

        let before = list.len();
        list.retain(|s| s.identity != identity);
        let removed = before - list.len();

        if list.is_empty() {
            table.remove(&type_id);
        }

        if removed > 0 {
            tracing::debug!(event = event_name::<E>(), removed, "Unsubscribed from event");
        }
        removed
    }

    /// Deliver `event` to every handler registered for its exact type.
    ///
    /// Handler errors and panics are logged and skipped. Dispatch stops early
    /// once the event is handled, cancellable, and cancelled. Returns the
    /// number of handlers invoked.
    pub fn publish<E: Event>(&self, event: &mut E) -> usize {
        let subscribers = {
            let table = self.subscriptions.lock();
            match table.get(&TypeId::of::<E>()) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => return 0,
            }
        };

        let name = event_name::<E>();
        tracing::debug!(event = name, subscribers = subscribers.len(), "Publishing event");

        let mut invoked = 0;
        for subscription in &subscribers {
            invoked += 1;
            let outcome = isolate(|| (subscription.dispatch)(&mut *event as &mut dyn Any));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(event = subscription.event, error = %e, "Error handling event");
                }
                Err(panic) => {
                    tracing::error!(event = subscription.event, error = %panic, "Event handler panicked");
                }
            }

            if event.stops_dispatch() {
                tracing::debug!(event = name, "Event was cancelled, stopping further processing");
                break;
            }
        }

        invoked
    }

    /// Publish an owned event and hand it back for inspection.
    pub fn emit<E: Event>(&self, mut event: E) -> E {
        self.publish(&mut event);
        event
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.subscriptions.lock().clear();
        tracing::info!("All event subscriptions cleared");
    }

    /// Drop every subscription for `E`.
    pub fn clear_subscriptions<E: Event>(&self) {
        if self.subscriptions.lock().remove(&TypeId::of::<E>()).is_some() {
            tracing::debug!(event = event_name::<E>(), "Cleared all subscriptions for event");
        }
    }

    /// Number of registrations for `E`.
    pub fn subscription_count<E: Event>(&self) -> usize {
        self.subscriptions.lock().get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }

    /// Number of registrations across all event types.
    pub fn total_subscription_count(&self) -> usize {
        self.subscriptions.lock().values().map(Vec::len).sum()
    }

    /// Names of event types that currently have subscribers, sorted.
    pub fn subscribed_event_types(&self) -> Vec<&'static str> {
        let table = self.subscriptions.lock();
        let mut names: Vec<_> =
            table.values().filter_map(|list| list.first().map(|s| s.event)).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.total_subscription_count())
            .finish()
    }
}
