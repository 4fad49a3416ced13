//! Swarm state and metrics.
//!
//! A swarm is a set of worker instances orchestrated as one logical unit.
//! The orchestration controller exclusively owns the `swarm_id → SwarmState`
//! mapping and is the only mutator.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::SwarmConfig;
use super::instance::Instance;
use super::task::TaskStatus;

/// Swarm lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStatus {
    Initializing,
    Active,
    Scaling,
    Stopping,
    Stopped,
    Error,
}

impl SwarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Scaling => "scaling",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Valid transitions. `Error` is reachable from any state; emergency
    /// shutdown additionally forces `Stopped` from anywhere.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if next == Self::Error {
            return true;
        }
        match self {
            Self::Initializing => matches!(next, Self::Active | Self::Stopping),
            Self::Active => matches!(next, Self::Scaling | Self::Stopping),
            Self::Scaling => matches!(next, Self::Active | Self::Stopping),
            Self::Stopping => matches!(next, Self::Stopped),
            Self::Stopped => false,
            Self::Error => matches!(next, Self::Stopping | Self::Stopped),
        }
    }
}

/// Aggregate performance metrics for one swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmMetrics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub active_instances: usize,
    pub average_task_duration: f64,
    pub total_execution_time: f64,
    pub throughput_tasks_per_hour: f64,
    /// failed / (completed + failed); 0 when nothing finished yet
    pub error_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl Default for SwarmMetrics {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            active_instances: 0,
            average_task_duration: 0.0,
            total_execution_time: 0.0,
            throughput_tasks_per_hour: 0.0,
            error_rate: 0.0,
            last_updated: Utc::now(),
        }
    }
}

/// Status of work integration for one swarm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub pending_integrations: usize,
    pub successful_integrations: usize,
    pub failed_integrations: usize,
    pub conflicts_detected: usize,
    pub last_integration: Option<DateTime<Utc>>,
    pub integration_queue: Vec<String>,
}

/// Report produced by one integration pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub report_id: Uuid,
    pub integration_batch: Vec<String>,
    pub successful_integrations: Vec<String>,
    pub failed_integrations: Vec<String>,
    pub conflicts_resolved: Vec<String>,
    pub conflicts_remaining: Vec<String>,
    pub quality_gate_results: BTreeMap<String, bool>,
    pub integration_time: Duration,
    pub created_at: DateTime<Utc>,
    pub summary: String,
}

impl IntegrationReport {
    pub fn empty(integration_time: Duration, summary: impl Into<String>) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            integration_batch: Vec::new(),
            successful_integrations: Vec::new(),
            failed_integrations: Vec::new(),
            conflicts_resolved: Vec::new(),
            conflicts_remaining: Vec::new(),
            quality_gate_results: BTreeMap::new(),
            integration_time,
            created_at: Utc::now(),
            summary: summary.into(),
        }
    }
}

/// Current state of one distributed swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmState {
    pub swarm_id: String,
    pub instances: BTreeMap<String, Instance>,
    /// instance_id → assigned task ids
    pub task_assignments: BTreeMap<String, Vec<String>>,
    /// task_id → execution status
    pub execution_status: BTreeMap<String, TaskStatus>,
    pub performance_metrics: SwarmMetrics,
    pub integration_status: IntegrationStatus,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub config: SwarmConfig,
    pub status: SwarmStatus,
}

impl SwarmState {
    pub fn new(config: SwarmConfig) -> Self {
        let now = Utc::now();
        Self {
            swarm_id: format!("swarm-{}", &Uuid::new_v4().simple().to_string()[..8]),
            instances: BTreeMap::new(),
            task_assignments: BTreeMap::new(),
            execution_status: BTreeMap::new(),
            performance_metrics: SwarmMetrics::default(),
            integration_status: IntegrationStatus::default(),
            start_time: now,
            last_updated: now,
            config,
            status: SwarmStatus::Initializing,
        }
    }

    /// Advance `last_updated`, never letting it move backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    /// Task ids whose execution status is `Completed`.
    pub fn completed_task_ids(&self) -> Vec<String> {
        self.execution_status
            .iter()
            .filter(|(_, status)| **status == TaskStatus::Completed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every assigned task must have an execution-status entry.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (instance_id, task_ids) in &self.task_assignments {
            for task_id in task_ids {
                if !self.execution_status.contains_key(task_id) {
                    return Err(format!(
                        "Task {task_id} assigned to {instance_id} has no execution status"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_swarm_defaults() {
        let swarm = SwarmState::new(SwarmConfig::default());
        assert!(swarm.swarm_id.starts_with("swarm-"));
        assert_eq!(swarm.status, SwarmStatus::Initializing);
        assert!(swarm.check_invariants().is_ok());
    }

    #[test]
    fn test_status_transitions() {
        use SwarmStatus::*;
        assert!(Initializing.can_transition_to(Active));
        assert!(Active.can_transition_to(Scaling));
        assert!(Scaling.can_transition_to(Active));
        assert!(Active.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        assert!(!Stopped.can_transition_to(Active));
        // Error reachable from anywhere
        assert!(Active.can_transition_to(Error));
        assert!(Stopping.can_transition_to(Error));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut swarm = SwarmState::new(SwarmConfig::default());
        let before = swarm.last_updated;
        swarm.touch();
        assert!(swarm.last_updated >= before);
    }

    #[test]
    fn test_invariant_detects_missing_status() {
        let mut swarm = SwarmState::new(SwarmConfig::default());
        swarm
            .task_assignments
            .insert("instance-0".to_string(), vec!["t1".to_string()]);
        assert!(swarm.check_invariants().is_err());

        swarm
            .execution_status
            .insert("t1".to_string(), TaskStatus::Pending);
        assert!(swarm.check_invariants().is_ok());
    }

    #[test]
    fn test_completed_task_ids() {
        let mut swarm = SwarmState::new(SwarmConfig::default());
        swarm
            .execution_status
            .insert("t1".to_string(), TaskStatus::Completed);
        swarm
            .execution_status
            .insert("t2".to_string(), TaskStatus::Running);
        assert_eq!(swarm.completed_task_ids(), vec!["t1".to_string()]);
    }
}
