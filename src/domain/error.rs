//! Domain error types for the hivemind orchestration system.
//!
//! Each enum covers one surface: the text protocol, configuration loading,
//! and the orchestration controller. Recoverable conditions (validation
//! failures, missing handlers, single-instance failures) are expressed as
//! structured result values elsewhere; these errors are the exceptional
//! outcomes that bubble to callers.

use thiserror::Error;

/// Errors produced while parsing command text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Verb token is not in the allowed verb set
    #[error("Verb '{0}' not in allowed verbs")]
    UnknownVerb(String),

    /// Noun token is not in the allowed noun set
    #[error("Noun '{0}' not in allowed nouns")]
    UnknownNoun(String),

    /// Command text could not be parsed at all
    #[error("Failed to parse command '{text}': {reason}")]
    Parse { text: String, reason: String },
}

impl ProtocolError {
    pub fn parse(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// Errors related to swarm configuration validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// min_instances must not exceed max_instances
    #[error("min_instances ({min}) must be <= max_instances ({max})")]
    InstanceBounds { min: usize, max: usize },

    /// A configuration field is outside its allowed range
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

/// Errors surfaced by the orchestration controller.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// launch() was called with no tasks
    #[error("Cannot launch swarm with empty task list")]
    EmptyBatch,

    /// Configuration failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No swarm registered under the given id
    #[error("Swarm {0} not found")]
    SwarmNotFound(String),

    /// No instance registered under the given id within the swarm
    #[error("Instance {instance_id} not found in swarm {swarm_id}")]
    InstanceNotFound {
        swarm_id: String,
        instance_id: String,
    },

    /// No task registered under the given id within the swarm
    #[error("Task {task_id} not found in swarm {swarm_id}")]
    TaskNotFound { swarm_id: String, task_id: String },

    /// A status transition violated the task state machine
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The distribution planner failed
    #[error("Distribution planning failed: {0}")]
    Plan(String),

    /// Emergency shutdown is active or a resource ceiling was breached
    #[error("Safety violation: {0}")]
    SafetyViolation(String),
}

impl OrchestrationError {
    /// Returns true if the condition can be recovered without operator
    /// intervention. Safety and configuration errors are terminal.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SwarmNotFound(_)
                | Self::InstanceNotFound { .. }
                | Self::TaskNotFound { .. }
                | Self::InvalidTransition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_display() {
        let err = OrchestrationError::EmptyBatch;
        assert_eq!(err.to_string(), "Cannot launch swarm with empty task list");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InstanceBounds { min: 5, max: 2 };
        assert_eq!(
            err.to_string(),
            "min_instances (5) must be <= max_instances (2)"
        );

        let err = ConfigError::invalid("health_check_interval", 2);
        assert_eq!(
            err.to_string(),
            "Invalid value for health_check_interval: 2"
        );
    }

    #[test]
    fn test_config_error_bubbles_through_orchestration() {
        let err: OrchestrationError = ConfigError::InstanceBounds { min: 3, max: 1 }.into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("min_instances"));
    }

    #[test]
    fn test_recoverability() {
        assert!(OrchestrationError::SwarmNotFound("swarm-x".into()).is_recoverable());
        assert!(!OrchestrationError::SafetyViolation("shutdown".into()).is_recoverable());
        assert!(!OrchestrationError::EmptyBatch.is_recoverable());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnknownVerb("fly".into());
        assert_eq!(err.to_string(), "Verb 'fly' not in allowed verbs");

        let err = ProtocolError::parse("gibberish", "could not identify verb");
        assert!(err.to_string().contains("gibberish"));
    }
}
