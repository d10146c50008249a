// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

#[test]
fn test_monitor_initial_state() {
    assert!(ConnectivityMonitor::new(true).is_online());
    assert!(!ConnectivityMonitor::new(false).is_online());
}

#[test]
fn test_set_online_reports_edges_only() {
    let monitor = ConnectivityMonitor::new(false);

    assert_eq!(monitor.set_online(false), None);
    assert_eq!(monitor.set_online(true), Some(Transition::Online));
    assert_eq!(monitor.set_online(true), None);
    assert_eq!(monitor.set_online(false), Some(Transition::Offline));
    assert!(!monitor.is_online());
}

#[test]
fn test_clones_share_state() {
    let monitor = ConnectivityMonitor::new(false);
    let clone = monitor.clone();
    monitor.set_online(true);
    assert!(clone.is_online());
}

#[tokio::test]
async fn test_flapping_delivers_every_transition() {
    let monitor = ConnectivityMonitor::new(true);
    let mut transitions = monitor.subscribe();

    monitor.set_online(false);
    monitor.set_online(true);
    monitor.set_online(false);
    monitor.set_online(true);

    assert_eq!(transitions.next().await, Some(Transition::Offline));
    assert_eq!(transitions.next().await, Some(Transition::Online));
    assert_eq!(transitions.next().await, Some(Transition::Offline));
    assert_eq!(transitions.next().await, Some(Transition::Online));
}

#[tokio::test]
async fn test_transitions_end_when_monitor_dropped() {
    let monitor = ConnectivityMonitor::new(true);
    let mut transitions = monitor.subscribe();
    drop(monitor);
    assert_eq!(transitions.next().await, None);
}

#[tokio::test]
async fn test_on_online_fires_per_online_edge() {
    let monitor = ConnectivityMonitor::new(false);
    let count = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&count);
    let handle = monitor.on_online(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    monitor.set_online(true);
    monitor.set_online(false);
    monitor.set_online(true);

    tokio::time::timeout(Duration::from_secs(1), async {
        while count.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 2);
    handle.abort();
}

#[tokio::test]
async fn test_on_offline_fires_once_per_offline_edge() {
    let monitor = ConnectivityMonitor::new(true);
    let count = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&count);
    let handle = monitor.on_offline(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    monitor.set_online(false);
    // Repeated state is not an edge
    monitor.set_online(false);
    monitor.set_online(true);
    monitor.set_online(true);
    monitor.set_online(false);

    tokio::time::timeout(Duration::from_secs(1), async {
        while count.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    // Give a spurious third call the chance to land
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
    handle.abort();
}
