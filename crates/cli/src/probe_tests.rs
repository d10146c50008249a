// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tokio::net::TcpListener;
use yare::parameterized;

#[parameterized(
    explicit_port = { "ws://127.0.0.1:7890", "127.0.0.1:7890" },
    ws_default = { "ws://example.org/feed", "example.org:80" },
    wss_default = { "wss://example.org", "example.org:443" },
)]
fn test_probe_addr_from_url(url: &str, expected: &str) {
    assert_eq!(probe_addr(url).unwrap(), expected);
}

#[parameterized(
    http = { "http://example.org" },
    no_scheme = { "example.org:80" },
    garbage = { "::::" },
)]
fn test_probe_addr_rejects(url: &str) {
    assert!(matches!(probe_addr(url), Err(Error::Config(_))));
}

#[tokio::test]
async fn test_probe_once_reachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    assert!(probe_once(&addr, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_probe_once_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    assert!(!probe_once(&addr, Duration::from_millis(500)).await);
}

#[tokio::test]
async fn test_probe_marks_monitor_online() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = RemoteConfig {
        url: format!("ws://127.0.0.1:{}", port),
        probe_interval_ms: 10,
        probe_timeout_ms: 500,
        ..RemoteConfig::default()
    };
    let monitor = ConnectivityMonitor::new(false);
    let mut transitions = monitor.subscribe();

    let probe = ConnectivityProbe::new(&config, monitor.clone()).unwrap();
    let handle = probe.spawn();

    let transition = tokio::time::timeout(Duration::from_secs(2), transitions.next())
        .await
        .unwrap();
    assert_eq!(transition, Some(crate::connectivity::Transition::Online));
    assert!(monitor.is_online());

    probe.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}
