//! Performance benchmarks for launcher-host.
//!
//! This module contains benchmarks for:
//! - Event publishing with many subscribers
//! - Early exit on cancelled events
//! - Dependency resolution over large plugin sets
//! - Host version comparison
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use launcher_host::events::{Cancellable, EventBus, GameLaunchEvent, NotificationEvent};
use launcher_host::plugin::{is_version_compatible, resolve};

// ============================================================================
// Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    /// A bus with `handlers` no-op subscribers spread over a few priorities.
    pub fn notification_bus(handlers: usize) -> EventBus {
        let bus = EventBus::new();
        for i in 0..handlers {
            let priority = i32::try_from(i % 7).unwrap_or_default();
            bus.on::<NotificationEvent>(priority, |e| {
                black_box(&e.title);
                Ok(())
            });
        }
        bus
    }

    /// A launch bus whose highest-priority handler vetoes every launch.
    pub fn vetoing_bus(handlers: usize) -> EventBus {
        let bus = EventBus::new();
        bus.on::<GameLaunchEvent>(i32::MAX, |e| {
            e.cancel("benchmark veto");
            Ok(())
        });
        for _ in 0..handlers {
            bus.on::<GameLaunchEvent>(0, |e| {
                e.jvm_arguments.push("-Xmx2G".to_string());
                Ok(())
            });
        }
        bus
    }

    /// `count` plugins where each depends on the one before, listed in
    /// reverse so resolution needs the worst number of passes.
    pub fn dependency_chain(count: usize) -> Vec<(String, Vec<String>)> {
        (0..count)
            .rev()
            .map(|i| {
                let deps = if i == 0 { Vec::new() } else { vec![format!("bench.p{}", i - 1)] };
                (format!("bench.p{i}"), deps)
            })
            .collect()
    }

    /// `count` independent plugins sharing one common library plugin.
    pub fn star(count: usize) -> Vec<(String, Vec<String>)> {
        let mut plugins = vec![("bench.lib".to_string(), Vec::new())];
        plugins.extend((0..count).map(|i| (format!("bench.s{i}"), vec!["bench.lib".to_string()])));
        plugins
    }
}

// ============================================================================
// Event Bus Benchmarks
// ============================================================================

fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    for handlers in [1, 10, 100, 1000] {
        let bus = fixtures::notification_bus(handlers);
        group.throughput(Throughput::Elements(handlers as u64));
        group.bench_with_input(BenchmarkId::new("handlers", handlers), &bus, |b, bus| {
            b.iter(|| {
                let mut event = NotificationEvent {
                    title: "Update available".to_string(),
                    ..Default::default()
                };
                black_box(bus.publish(&mut event))
            });
        });
    }

    group.finish();
}

fn bench_publish_no_subscribers(c: &mut Criterion) {
    let bus = EventBus::new();
    c.bench_function("publish_no_subscribers", |b| {
        b.iter(|| black_box(bus.publish(&mut NotificationEvent::default())));
    });
}

fn bench_cancelled_launch(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancelled_launch");

    for handlers in [10, 1000] {
        let bus = fixtures::vetoing_bus(handlers);
        group.bench_with_input(BenchmarkId::new("handlers", handlers), &bus, |b, bus| {
            b.iter(|| {
                let launch = bus.emit(GameLaunchEvent::default());
                black_box(launch.is_cancelled())
            });
        });
    }

    group.finish();
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let bus = fixtures::notification_bus(100);
    c.bench_function("subscribe_unsubscribe", |b| {
        b.iter(|| {
            let handler = bus.on::<NotificationEvent>(3, |_| Ok(()));
            black_box(bus.unsubscribe(&handler))
        });
    });
}

// ============================================================================
// Resolution Benchmarks
// ============================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for count in [10, 50, 200] {
        let chain = fixtures::dependency_chain(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("chain", count), &chain, |b, plugins| {
            b.iter(|| black_box(resolve(plugins)));
        });

        let star = fixtures::star(count);
        group.bench_with_input(BenchmarkId::new("star", count), &star, |b, plugins| {
            b.iter(|| black_box(resolve(plugins)));
        });
    }

    group.finish();
}

fn bench_version_check(c: &mut Criterion) {
    let cases = [("1.0.0", "1.0.0"), ("1.2", "1.10.3"), ("2.0.0.1", "2.0.0"), ("garbage", "1.0.0")];
    c.bench_function("version_compatible", |b| {
        b.iter(|| {
            for (required, current) in &cases {
                black_box(is_version_compatible(black_box(required), black_box(current)));
            }
        });
    });
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(
    bus_benches,
    bench_publish_fan_out,
    bench_publish_no_subscribers,
    bench_cancelled_launch,
    bench_subscribe_unsubscribe,
);

criterion_group!(resolver_benches, bench_resolve, bench_version_check,);

criterion_main!(bus_benches, resolver_benches);
