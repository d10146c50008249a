// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Host connectivity sampling.
//!
//! The probe periodically opens a TCP connection to the remote store's address
//! and feeds the result into a [`ConnectivityMonitor`]. It runs in a background
//! task so callers stay responsive while a sample is in flight.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_util::sync::CancellationToken;

use crate::config::RemoteConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};

/// Derives the `host:port` to probe from a `ws://` or `wss://` URL.
pub fn probe_addr(url: &str) -> Result<String> {
    let uri: Uri = url
        .parse()
        .map_err(|e| Error::Config(format!("invalid remote url '{}': {}", url, e)))?;

    let default_port = match uri.scheme_str() {
        Some("ws") => 80,
        Some("wss") => 443,
        _ => {
            return Err(Error::Config(format!(
                "invalid remote url '{}': must be ws:// or wss://",
                url
            )))
        }
    };

    let host = uri
        .host()
        .ok_or_else(|| Error::Config(format!("invalid remote url '{}': missing host", url)))?;
    let port = uri.port_u16().unwrap_or(default_port);

    Ok(format!("{}:{}", host, port))
}

/// Samples connectivity once. Any connect error or timeout counts as offline.
pub async fn probe_once(addr: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Background connectivity sampler.
pub struct ConnectivityProbe {
    addr: String,
    interval: Duration,
    timeout: Duration,
    monitor: ConnectivityMonitor,
    cancel_token: CancellationToken,
}

impl ConnectivityProbe {
    /// Creates a probe for the configured remote.
    pub fn new(config: &RemoteConfig, monitor: ConnectivityMonitor) -> Result<Self> {
        Ok(ConnectivityProbe {
            addr: probe_addr(&config.url)?,
            interval: Duration::from_millis(config.probe_interval_ms),
            timeout: Duration::from_millis(config.probe_timeout_ms),
            monitor,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Starts sampling. The first sample is taken immediately.
    pub fn spawn(&self) -> JoinHandle<()> {
        let addr = self.addr.clone();
        let interval = self.interval;
        let timeout = self.timeout;
        let monitor = self.monitor.clone();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                let online = tokio::select! {
                    _ = cancel_token.cancelled() => return,
                    online = probe_once(&addr, timeout) => online,
                };
                monitor.set_online(online);

                tokio::select! {
                    _ = cancel_token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        })
    }

    /// Stops sampling.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
