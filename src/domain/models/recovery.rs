//! Instance failure and recovery models.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Classification of an instance failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Crash,
    Timeout,
    Resource,
    Communication,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::Timeout => "timeout",
            Self::Resource => "resource",
            Self::Communication => "communication",
        }
    }

    /// Crashes and resource exhaustion are treated as high severity.
    pub fn is_high_severity(&self) -> bool {
        matches!(self, Self::Crash | Self::Resource)
    }
}

/// Recovery strategy selected for a failed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Restart,
    Reassign,
    ScaleUp,
    Manual,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Reassign => "reassign",
            Self::ScaleUp => "scale_up",
            Self::Manual => "manual",
        }
    }
}

/// A reported instance failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceFailure {
    pub instance_id: String,
    pub failure_type: FailureType,
    pub failure_time: DateTime<Utc>,
    pub error_message: String,
    pub affected_tasks: Vec<String>,
    pub recovery_attempts: u32,
    pub is_recoverable: bool,
    pub context: BTreeMap<String, Value>,
}

impl InstanceFailure {
    pub fn new(
        instance_id: impl Into<String>,
        failure_type: FailureType,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            failure_type,
            failure_time: Utc::now(),
            error_message: error_message.into(),
            affected_tasks: Vec::new(),
            recovery_attempts: 0,
            is_recoverable: true,
            context: BTreeMap::new(),
        }
    }

    pub fn with_affected_tasks(mut self, task_ids: Vec<String>) -> Self {
        self.affected_tasks = task_ids;
        self
    }

    pub fn with_recovery_attempts(mut self, attempts: u32) -> Self {
        self.recovery_attempts = attempts;
        self
    }

    pub fn unrecoverable(mut self) -> Self {
        self.is_recoverable = false;
        self
    }
}

/// Recovery plan for a failed instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub plan_id: Uuid,
    pub failed_instance: String,
    pub recovery_strategy: RecoveryStrategy,
    /// task id → new instance id
    pub task_reassignments: BTreeMap<String, String>,
    pub estimated_recovery_time: Duration,
    pub required_actions: Vec<String>,
    pub rollback_plan: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl RecoveryPlan {
    pub fn new(
        failed_instance: impl Into<String>,
        recovery_strategy: RecoveryStrategy,
        estimated_recovery_time: Duration,
    ) -> Self {
        let failed_instance = failed_instance.into();
        let required_actions = vec![format!(
            "Execute {} recovery for {failed_instance}",
            recovery_strategy.as_str()
        )];
        Self {
            plan_id: Uuid::new_v4(),
            failed_instance,
            recovery_strategy,
            task_reassignments: BTreeMap::new(),
            estimated_recovery_time,
            required_actions,
            rollback_plan: None,
            created_at: Utc::now(),
        }
    }
}
