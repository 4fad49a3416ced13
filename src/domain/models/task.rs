//! Task domain model.
//!
//! Tasks are discrete units of work distributed across worker instances.
//! Dependencies between tasks form a graph the planner groups into
//! parallel execution waves.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::OrchestrationError;
use crate::protocol::command::ParamValue;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but not yet assigned to an instance
    Pending,
    /// Task is assigned to an instance slot
    Assigned,
    /// Task is currently being executed
    Running,
    /// Task completed successfully
    Completed,
    /// Task failed during execution
    Failed,
    /// Task was cancelled
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Cancelled],
            Self::Assigned => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// A discrete unit of work submitted for distributed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-supplied unique identifier
    pub id: String,
    /// Detailed description of the work
    pub description: String,
    /// Free-form requirement statements
    pub requirements: Vec<String>,
    /// Ids of tasks that must complete before this one starts
    pub dependencies: Vec<String>,
    /// Estimated wall-clock duration in seconds
    pub estimated_duration_seconds: u64,
    /// Complexity score, 0.1 to 10.0
    pub complexity_score: f64,
    /// Capabilities an instance must offer to take this task
    pub required_capabilities: Vec<String>,
    /// Criteria the result must satisfy
    pub acceptance_criteria: Vec<String>,
    /// Additional typed parameters
    pub parameters: HashMap<String, ParamValue>,
    /// Current status
    pub status: TaskStatus,
    /// Instance slot currently responsible for the task
    pub assigned_instance: Option<String>,
    /// When execution started
    pub start_time: Option<DateTime<Utc>>,
    /// When execution finished
    pub completion_time: Option<DateTime<Utc>>,
    /// Free-form result payload
    pub result: Option<serde_json::Value>,
    /// Error message when failed
    pub error_message: Option<String>,
}

impl Task {
    /// Default estimated duration: 30 minutes.
    pub const DEFAULT_DURATION_SECS: u64 = 30 * 60;

    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            requirements: Vec::new(),
            dependencies: Vec::new(),
            estimated_duration_seconds: Self::DEFAULT_DURATION_SECS,
            complexity_score: 1.0,
            required_capabilities: Vec::new(),
            acceptance_criteria: Vec::new(),
            parameters: HashMap::new(),
            status: TaskStatus::default(),
            assigned_instance: None,
            start_time: None,
            completion_time: None,
            result: None,
            error_message: None,
        }
    }

    /// Add a dependency. Self-dependencies and duplicates are ignored.
    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if task_id != self.id && !self.dependencies.contains(&task_id) {
            self.dependencies.push(task_id);
        }
        self
    }

    pub fn with_duration_seconds(mut self, seconds: u64) -> Self {
        self.estimated_duration_seconds = seconds;
        self
    }

    pub fn with_complexity(mut self, score: f64) -> Self {
        self.complexity_score = score.clamp(0.1, 10.0);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.push(capability.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Check if this task can move to the given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, updating timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), OrchestrationError> {
        if !self.can_transition_to(new_status) {
            return Err(OrchestrationError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.status = new_status;
        match new_status {
            TaskStatus::Running => self.start_time = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completion_time = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Task id cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if !(0.1..=10.0).contains(&self.complexity_score) {
            return Err(format!(
                "Complexity score {} outside 0.1-10.0",
                self.complexity_score
            ));
        }
        if self.dependencies.contains(&self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation_defaults() {
        let task = Task::new("t1", "Implement the login feature");
        assert_eq!(task.id, "t1");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.estimated_duration_seconds, Task::DEFAULT_DURATION_SECS);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = Task::new("t1", "work");
        task.transition_to(TaskStatus::Assigned).unwrap();
        task.transition_to(TaskStatus::Running).unwrap();
        assert!(task.start_time.is_some());
        task.transition_to(TaskStatus::Completed).unwrap();
        assert!(task.completion_time.is_some());
        assert!(task.is_terminal());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        // Pending -> Running skips Assigned
        let mut task = Task::new("t1", "work");
        assert!(task.transition_to(TaskStatus::Running).is_err());

        // Pending -> Completed
        let mut task = Task::new("t1", "work");
        assert!(task.transition_to(TaskStatus::Completed).is_err());

        // Terminal states are final
        let mut task = Task::new("t1", "work");
        task.transition_to(TaskStatus::Cancelled).unwrap();
        assert!(task.transition_to(TaskStatus::Assigned).is_err());
    }

    #[test]
    fn test_failure_path() {
        let mut task = Task::new("t1", "work");
        task.transition_to(TaskStatus::Assigned).unwrap();
        task.transition_to(TaskStatus::Running).unwrap();
        task.transition_to(TaskStatus::Failed).unwrap();
        assert!(task.is_terminal());
        assert!(task.completion_time.is_some());
    }

    #[test]
    fn test_self_dependency_ignored_by_builder() {
        let task = Task::new("t1", "work").with_dependency("t1").with_dependency("t2");
        assert_eq!(task.dependencies, vec!["t2".to_string()]);
    }

    #[test]
    fn test_complexity_clamped() {
        let task = Task::new("t1", "work").with_complexity(42.0);
        assert!((task.complexity_score - 10.0).abs() < f64::EPSILON);

        let task = Task::new("t1", "work").with_complexity(0.0);
        assert!((task.complexity_score - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_empty_description() {
        let task = Task::new("t1", "   ");
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("bogus"), None);
    }
}
