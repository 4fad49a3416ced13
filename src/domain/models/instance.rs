//! Worker instance model.
//!
//! An instance occupies one slot of a swarm: it owns a branch and a
//! workspace, and is reachable through a communication endpoint. The
//! controller never owns the worker process itself; external processes are
//! referenced by endpoint and pid only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instance lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Starting,
    Active,
    Busy,
    Idle,
    Stopping,
    Stopped,
    Error,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Busy => "busy",
            Self::Idle => "idle",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Whether the instance can take work.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Active | Self::Idle)
    }
}

/// Isolation level an instance runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    Basic,
    Workspace,
    Container,
    Vm,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        Self::Workspace
    }
}

/// Resource limits applied to an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_cpu_percent: f64,
    pub max_memory_mb: u64,
    pub max_disk_mb: u64,
    pub max_network_mbps: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_cpu_percent: 80.0,
            max_memory_mb: 4096,
            max_disk_mb: 10240,
            max_network_mbps: 100.0,
        }
    }
}

/// Where instances are deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub name: String,
    /// Target kind: "local", "docker", "k8s", "cloud".
    pub kind: String,
    pub endpoint: Option<String>,
    pub resource_limits: ResourceLimits,
}

impl DeploymentTarget {
    pub fn local() -> Self {
        Self {
            name: "local".to_string(),
            kind: "local".to_string(),
            endpoint: None,
            resource_limits: ResourceLimits::default(),
        }
    }
}

/// A single worker instance occupying one swarm slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub branch_name: String,
    pub workspace_path: PathBuf,
    pub source_repository: String,
    pub resource_allocation: ResourceLimits,
    /// Ids of tasks assigned to this instance
    pub task_assignments: Vec<String>,
    pub communication_endpoint: String,
    pub isolation_level: IsolationLevel,
    /// Short label used to tell instances apart in UIs
    pub visual_identifier: Option<String>,
    pub status: InstanceStatus,
    pub start_time: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub process_id: Option<u32>,
    pub performance_metrics: BTreeMap<String, Value>,
}

impl Instance {
    pub fn new(
        instance_id: impl Into<String>,
        branch_name: impl Into<String>,
        workspace_path: impl Into<PathBuf>,
        communication_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            branch_name: branch_name.into(),
            workspace_path: workspace_path.into(),
            source_repository: ".".to_string(),
            resource_allocation: ResourceLimits::default(),
            task_assignments: Vec::new(),
            communication_endpoint: communication_endpoint.into(),
            isolation_level: IsolationLevel::default(),
            visual_identifier: None,
            status: InstanceStatus::default(),
            start_time: Utc::now(),
            last_heartbeat: None,
            process_id: None,
            performance_metrics: BTreeMap::new(),
        }
    }

    pub fn with_tasks(mut self, task_ids: Vec<String>) -> Self {
        self.task_assignments = task_ids;
        self
    }

    pub fn with_visual_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.visual_identifier = Some(identifier.into());
        self
    }

    /// Seconds since the last heartbeat, if any was ever received.
    pub fn heartbeat_age_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_heartbeat
            .map(|hb| now.signed_duration_since(hb).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_defaults() {
        let inst = Instance::new("instance-0", "feature/instance-0", "/tmp/ws", "tcp://localhost:5000");
        assert_eq!(inst.status, InstanceStatus::Starting);
        assert_eq!(inst.isolation_level, IsolationLevel::Workspace);
        assert!(inst.last_heartbeat.is_none());
        assert!(inst.heartbeat_age_seconds(Utc::now()).is_none());
    }

    #[test]
    fn test_heartbeat_age() {
        let mut inst = Instance::new("instance-0", "b", "/tmp/ws", "tcp://localhost:5000");
        let now = Utc::now();
        inst.last_heartbeat = Some(now - chrono::Duration::seconds(90));
        let age = inst.heartbeat_age_seconds(now).unwrap();
        assert!((89..=91).contains(&age));
    }

    #[test]
    fn test_availability() {
        assert!(InstanceStatus::Active.is_available());
        assert!(InstanceStatus::Idle.is_available());
        assert!(!InstanceStatus::Error.is_available());
        assert!(!InstanceStatus::Stopped.is_available());
    }
}
