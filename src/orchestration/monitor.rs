//! Cooperative resource monitor.
//!
//! Workers report their usage; the monitor compares samples against
//! configured ceilings and emits throttle signals over a broadcast
//! channel. Breaching a hard ceiling, or exceeding the configured maximum
//! runtime, triggers the controller's emergency shutdown so every
//! subsequent operation fails fast with a safety violation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use super::controller::OrchestrationController;

/// Hard and soft resource ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorLimits {
    /// Hard CPU ceiling (percent); breach triggers emergency shutdown
    pub max_cpu_percent: f64,
    /// Hard memory ceiling (MB); breach triggers emergency shutdown
    pub max_memory_mb: u64,
    /// CPU level that activates throttling
    pub cpu_throttle_threshold: f64,
    /// Memory level that activates throttling
    pub memory_throttle_threshold_mb: u64,
    /// Maximum total runtime before forced shutdown
    pub max_runtime: Option<Duration>,
}

impl Default for MonitorLimits {
    fn default() -> Self {
        Self {
            max_cpu_percent: 80.0,
            max_memory_mb: 4096,
            cpu_throttle_threshold: 70.0,
            memory_throttle_threshold_mb: 3072,
            max_runtime: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// A usage sample reported by a worker or the provisioner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageSample {
    pub cpu_percent: f64,
    pub memory_mb: u64,
}

/// Evaluated resource status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub within_limits: bool,
    pub should_throttle: bool,
    pub timestamp: DateTime<Utc>,
}

/// Monitor events broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResourceEvent {
    StatusUpdate(ResourceStatus),
    LimitsExceeded { cpu_percent: f64, memory_mb: u64 },
    ThrottlingActivated { reason: String },
    ThrottlingDeactivated,
    Shutdown,
}

/// Cooperative safety monitor bound to one controller.
pub struct ResourceMonitor {
    limits: MonitorLimits,
    controller: Arc<OrchestrationController>,
    started_at: DateTime<Utc>,
    current_status: Arc<RwLock<Option<ResourceStatus>>>,
    event_tx: broadcast::Sender<ResourceEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ResourceMonitor {
    pub fn new(limits: MonitorLimits, controller: Arc<OrchestrationController>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            limits,
            controller,
            started_at: Utc::now(),
            current_status: Arc::new(RwLock::new(None)),
            event_tx,
            shutdown_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.event_tx.subscribe()
    }

    /// Evaluate a reported sample. Breaching a hard ceiling trips the
    /// controller's emergency shutdown.
    pub async fn record_usage(&self, sample: UsageSample) -> ResourceStatus {
        let within_limits = sample.cpu_percent <= self.limits.max_cpu_percent
            && sample.memory_mb <= self.limits.max_memory_mb;
        let should_throttle = sample.cpu_percent >= self.limits.cpu_throttle_threshold
            || sample.memory_mb >= self.limits.memory_throttle_threshold_mb;

        let status = ResourceStatus {
            cpu_percent: sample.cpu_percent,
            memory_mb: sample.memory_mb,
            within_limits,
            should_throttle,
            timestamp: Utc::now(),
        };

        let previous_throttle = {
            let mut current = self.current_status.write().await;
            let previous = current
                .as_ref()
                .map(|s| s.should_throttle)
                .unwrap_or(false);
            *current = Some(status.clone());
            previous
        };

        let _ = self.event_tx.send(ResourceEvent::StatusUpdate(status.clone()));

        if should_throttle && !previous_throttle {
            let _ = self.event_tx.send(ResourceEvent::ThrottlingActivated {
                reason: format!(
                    "cpu {:.1}% / memory {}MB over throttle thresholds",
                    sample.cpu_percent, sample.memory_mb
                ),
            });
        } else if !should_throttle && previous_throttle {
            let _ = self.event_tx.send(ResourceEvent::ThrottlingDeactivated);
        }

        if !within_limits {
            warn!(
                cpu_percent = sample.cpu_percent,
                memory_mb = sample.memory_mb,
                "Hard resource ceiling breached"
            );
            let _ = self.event_tx.send(ResourceEvent::LimitsExceeded {
                cpu_percent: sample.cpu_percent,
                memory_mb: sample.memory_mb,
            });
            self.controller
                .emergency_shutdown(&format!(
                    "resource ceiling breached: cpu {:.1}%, memory {}MB",
                    sample.cpu_percent, sample.memory_mb
                ))
                .await;
        }

        status
    }

    /// Whether the most recent sample asked for throttling.
    pub async fn should_throttle(&self) -> bool {
        self.current_status
            .read()
            .await
            .as_ref()
            .map(|s| s.should_throttle)
            .unwrap_or(false)
    }

    /// Start the background watch loop enforcing the runtime ceiling.
    pub fn start(&self, check_interval: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        let event_tx = self.event_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let started_at = self.started_at;
        let max_runtime = self.limits.max_runtime;

        tokio::spawn(async move {
            let mut tick = interval(check_interval);
            info!(
                interval_secs = check_interval.as_secs_f64(),
                "Resource monitor started"
            );
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Some(max_runtime) = max_runtime {
                            let elapsed = Utc::now()
                                .signed_duration_since(started_at)
                                .to_std()
                                .unwrap_or_default();
                            if elapsed > max_runtime {
                                warn!(
                                    elapsed_secs = elapsed.as_secs(),
                                    "Runtime ceiling exceeded"
                                );
                                controller
                                    .emergency_shutdown("maximum runtime exceeded")
                                    .await;
                                let _ = event_tx.send(ResourceEvent::Shutdown);
                                break;
                            }
                        }
                        if controller.is_shut_down() {
                            let _ = event_tx.send(ResourceEvent::Shutdown);
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = event_tx.send(ResourceEvent::Shutdown);
                        break;
                    }
                }
            }
            info!("Resource monitor stopped");
        })
    }

    /// Stop the background watch loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
