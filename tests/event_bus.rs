//! Event Bus Integration Tests
//!
//! Exercises the bus through the public API with both catalog events and
//! events declared outside the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::json;

use launcher_host::events::{
    ApplicationExitEvent, CancelState, Cancellable, Event, EventBus, EventMeta, GameLaunchEvent,
    Handler, NotificationEvent,
};

// ============================================================================
// Custom Events
// ============================================================================

#[derive(Debug, Default)]
struct SkinChangedEvent {
    meta: EventMeta,
    skin: String,
}

#[derive(Debug, Default)]
struct ServerJoinEvent {
    meta: EventMeta,
    cancel: CancelState,
    address: String,
}

launcher_host::impl_event!(SkinChangedEvent);
launcher_host::impl_cancellable_event!(ServerJoinEvent);

fn recorder() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_equal_priority_keeps_registration_order() {
    let bus = EventBus::new();
    let seen = recorder();

    for name in ["first", "second", "third"] {
        let s = Arc::clone(&seen);
        bus.on::<SkinChangedEvent>(0, move |_| {
            s.lock().push(name.to_string());
            Ok(())
        });
    }
    let s = Arc::clone(&seen);
    bus.on::<SkinChangedEvent>(1, move |_| {
        s.lock().push("urgent".to_string());
        Ok(())
    });

    bus.publish(&mut SkinChangedEvent::default());
    assert_eq!(*seen.lock(), vec!["urgent", "first", "second", "third"]);
}

#[test]
fn test_handlers_see_earlier_mutations() {
    let bus = EventBus::new();

    bus.on::<SkinChangedEvent>(10, |e| {
        e.skin = "steve".to_string();
        e.set_data("touched_by", json!("first"));
        Ok(())
    });
    bus.on::<SkinChangedEvent>(0, |e| {
        assert_eq!(e.skin, "steve");
        e.skin.push_str("-classic");
        Ok(())
    });

    let event = bus.emit(SkinChangedEvent::default());
    assert_eq!(event.skin, "steve-classic");
    assert_eq!(event.data("touched_by"), Some(&json!("first")));
}

#[test]
fn test_handled_plain_event_keeps_dispatching() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let c = Arc::clone(&calls);
        bus.on::<NotificationEvent>(0, move |e| {
            e.set_handled(true);
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    assert_eq!(bus.publish(&mut NotificationEvent::default()), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancelled_launch_stops_lower_priorities() {
    let bus = EventBus::new();
    let seen = recorder();

    let s = Arc::clone(&seen);
    bus.on::<GameLaunchEvent>(100, move |e| {
        s.lock().push("validator".to_string());
        if e.version.is_empty() {
            e.cancel("no version selected");
        }
        Ok(())
    });
    let s = Arc::clone(&seen);
    bus.on::<GameLaunchEvent>(0, move |e| {
        s.lock().push("argument tweaker".to_string());
        e.jvm_arguments.push("-Xss2M".to_string());
        Ok(())
    });

    let vetoed = bus.emit(GameLaunchEvent::default());
    assert!(vetoed.is_cancelled());
    assert_eq!(vetoed.cancellation_reason(), Some("no version selected"));
    assert!(vetoed.jvm_arguments.is_empty());

    let launched = bus.emit(GameLaunchEvent { version: "1.20.4".to_string(), ..Default::default() });
    assert!(!launched.is_cancelled());
    assert_eq!(launched.jvm_arguments, vec!["-Xss2M"]);
    assert_eq!(*seen.lock(), vec!["validator", "validator", "argument tweaker"]);
}

#[test]
fn test_custom_cancellable_event() {
    let bus = EventBus::new();
    bus.on::<ServerJoinEvent>(0, |e| {
        if e.address.ends_with(".invalid") {
            e.cancel("blocked server");
        }
        Ok(())
    });

    assert!(bus.emit(ServerJoinEvent { address: "play.invalid".into(), ..Default::default() }).is_cancelled());
    assert!(!bus.emit(ServerJoinEvent { address: "play.example".into(), ..Default::default() }).is_cancelled());
}

#[test]
fn test_failure_before_cancel_does_not_block() {
    let bus = EventBus::new();

    bus.on::<ApplicationExitEvent>(10, |_| anyhow::bail!("autosave failed"));
    bus.on::<ApplicationExitEvent>(5, |_| panic!("tray icon gone"));
    bus.on::<ApplicationExitEvent>(0, |e| {
        e.cancel("download in progress");
        Ok(())
    });

    let exit = bus.emit(ApplicationExitEvent { reason: "user closed window".into(), ..Default::default() });
    assert!(exit.is_cancelled());
    assert!(exit.is_handled());
}

// ============================================================================
// Subscription Management
// ============================================================================

#[test]
fn test_handler_unsubscribing_itself() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<Handler<SkinChangedEvent>>>> = Arc::new(Mutex::new(None));

    let inner_bus = bus.clone();
    let inner_slot = Arc::clone(&slot);
    let c = Arc::clone(&calls);
    let handler = bus.on::<SkinChangedEvent>(0, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        if let Some(me) = inner_slot.lock().take() {
            inner_bus.unsubscribe(&me);
        }
        Ok(())
    });
    *slot.lock() = Some(handler);

    bus.publish(&mut SkinChangedEvent::default());
    bus.publish(&mut SkinChangedEvent::default());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscription_count::<SkinChangedEvent>(), 0);
}

#[test]
fn test_clones_share_one_table() {
    let bus = EventBus::new();
    let other = bus.clone();

    other.on::<SkinChangedEvent>(0, |_| Ok(()));
    assert_eq!(bus.subscription_count::<SkinChangedEvent>(), 1);
    assert_eq!(bus.subscribed_event_types(), vec!["SkinChangedEvent"]);

    bus.clear();
    assert_eq!(other.total_subscription_count(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_publish_and_subscribe() {
    let bus = EventBus::new();
    let delivered = Arc::new(AtomicUsize::new(0));

    let d = Arc::clone(&delivered);
    bus.on::<SkinChangedEvent>(0, move |_| {
        d.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    bus.publish(&mut SkinChangedEvent::default());
                }
            })
        })
        .collect();

    let subscriber = {
        let bus = bus.clone();
        thread::spawn(move || {
            for priority in 0..50 {
                let handler = bus.on::<SkinChangedEvent>(priority, |_| Ok(()));
                bus.unsubscribe(&handler);
            }
        })
    };

    for publisher in publishers {
        publisher.join().unwrap();
    }
    subscriber.join().unwrap();

    assert_eq!(delivered.load(Ordering::SeqCst), 1000);
    assert_eq!(bus.subscription_count::<SkinChangedEvent>(), 1);
}
