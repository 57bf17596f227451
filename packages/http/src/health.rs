//! Health probing of remote entry URLs.
//!
//! A development aid: each probe is a `HEAD` request bounded by a fixed
//! timeout, so a hung dev server shows up as down instead of stalling.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures::future::join_all;
use mosaic_federation::{RemoteDescriptor, RemoteRegistry};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::HttpError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    Up { code: u16, latency_ms: u64 },
    Down { reason: String },
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, HealthStatus::Up { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteHealth {
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub status: HealthStatus,
}

/// Probes entry URLs with a fixed timeout.
#[derive(Clone)]
pub struct HealthProbe {
    client: Client,
    timeout: Duration,
}

impl HealthProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            client: Client::builder().build()?,
            timeout,
        })
    }

    pub fn with_default_timeout() -> Result<Self, HttpError> {
        Self::new(Self::DEFAULT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one remote. Never fails; problems are reported as `Down`.
    pub async fn probe(&self, remote: &RemoteDescriptor) -> RemoteHealth {
        let started = Instant::now();
        let request = self.client.head(remote.entry_url.clone()).send();

        // Dropping the request future on timeout aborts it.
        let status = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => HealthStatus::Down {
                reason: format!("no response within {}ms", self.timeout.as_millis()),
            },
            Ok(Err(error)) => HealthStatus::Down {
                reason: error.to_string(),
            },
            Ok(Ok(response)) if response.status().is_success() => HealthStatus::Up {
                code: response.status().as_u16(),
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Ok(Ok(response)) => HealthStatus::Down {
                reason: format!("HTTP {}", response.status().as_u16()),
            },
        };

        debug!(remote = %remote.name, ?status, "probed remote");
        RemoteHealth {
            name: remote.name.clone(),
            url: remote.entry_url.to_string(),
            status,
        }
    }

    /// Probe every remote concurrently, in registry order.
    pub async fn probe_all(&self, registry: &RemoteRegistry) -> Vec<RemoteHealth> {
        join_all(registry.iter().map(|remote| self.probe(remote))).await
    }
}

/// Periodically probes every remote and reports up/down transitions.
pub struct HealthMonitor {
    probe: HealthProbe,
    registry: RemoteRegistry,
    interval: Duration,
}

impl HealthMonitor {
    /// Shortest polling interval; shorter ones, zero included, are raised to it.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    pub fn new(probe: HealthProbe, registry: RemoteRegistry, interval: Duration) -> Self {
        Self {
            probe,
            registry,
            interval: interval.max(Self::MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. `on_change` runs for the first result of every remote
    /// and whenever a remote flips between up and down.
    pub fn spawn<F>(self, on_change: F) -> MonitorHandle
    where
        F: Fn(&RemoteHealth) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut last: BTreeMap<String, bool> = BTreeMap::new();
            let mut ticker = tokio::time::interval(self.interval);
            info!(
                remotes = self.registry.len(),
                interval_ms = self.interval.as_millis() as u64,
                "health monitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                for health in self.probe.probe_all(&self.registry).await {
                    let up = health.status.is_up();
                    if last.insert(health.name.clone(), up) != Some(up) {
                        if !up {
                            warn!(remote = %health.name, status = ?health.status, "remote is down");
                        }
                        on_change(&health);
                    }
                }
            }
            debug!("health monitor stopped");
        });

        MonitorHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Stops its monitor when [`stop`](MonitorHandle::stop)ped or dropped.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop polling and wait for the current round to finish.
    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        let _ = (&mut self.task).await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}
