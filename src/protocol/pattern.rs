//! Command patterns and validation.
//!
//! A pattern declares the shape of one `(verb, noun)` command: which
//! modifiers are allowed and which parameters are required or optional.
//! Patterns are registered at startup and are effectively static.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::command::{Command, Noun, Verb};

/// Result of validating a command against a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    /// Human-readable rendering:
    ///
    /// ```text
    /// VALID
    /// VALID (warnings: ...)
    /// INVALID: ...
    /// Suggestions: ...
    /// ```
    pub fn to_display_string(&self) -> String {
        let mut out = if self.is_valid {
            if self.warnings.is_empty() {
                "VALID".to_string()
            } else {
                format!("VALID (warnings: {})", self.warnings.join(", "))
            }
        } else {
            format!("INVALID: {}", self.errors.join(", "))
        };
        if !self.suggestions.is_empty() {
            out.push_str(&format!("\nSuggestions: {}", self.suggestions.join(", ")));
        }
        out
    }
}

/// Declarative shape of one `(verb, noun)` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPattern {
    pub verb: Verb,
    pub noun: Noun,
    pub allowed_modifiers: BTreeSet<String>,
    pub required_parameters: BTreeSet<String>,
    pub optional_parameters: BTreeSet<String>,
    pub description: String,
    pub examples: Vec<String>,
}

impl CommandPattern {
    pub fn new(verb: Verb, noun: Noun, description: impl Into<String>) -> Self {
        Self {
            verb,
            noun,
            allowed_modifiers: BTreeSet::new(),
            required_parameters: BTreeSet::new(),
            optional_parameters: BTreeSet::new(),
            description: description.into(),
            examples: Vec::new(),
        }
    }

    pub fn with_modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_modifiers = modifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_optional<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    /// Registry key for this pattern.
    pub fn key(&self) -> (Verb, Noun) {
        (self.verb, self.noun)
    }

    pub fn matches(&self, command: &Command) -> bool {
        command.verb == self.verb && command.noun == self.noun
    }

    /// Validate a command against this pattern.
    ///
    /// Missing required parameters are errors; unknown modifiers are
    /// warnings with a suggestion listing the allowed set; unknown optional
    /// parameters are accepted for forward compatibility.
    pub fn validate(&self, command: &Command) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();

        for param in &self.required_parameters {
            if !command.parameters.contains_key(param) {
                errors.push(format!("Missing required parameter: {param}"));
            }
        }

        for modifier in &command.modifiers {
            if !self.allowed_modifiers.contains(modifier) {
                warnings.push(format!("Unknown modifier: {modifier}"));
                if !self.allowed_modifiers.is_empty() {
                    let available = self
                        .allowed_modifiers
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ");
                    let suggestion = format!("Available modifiers: {available}");
                    if !suggestions.contains(&suggestion) {
                        suggestions.push(suggestion);
                    }
                }
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }
}

/// The default patterns pre-registered by the protocol handler.
pub fn default_patterns() -> Vec<CommandPattern> {
    vec![
        CommandPattern::new(Verb::Run, Noun::Task, "Execute a task with specified mode")
            .with_modifiers(["beast-mode", "parallel", "sequential", "debug"])
            .with_required(["task_id"])
            .with_optional(["timeout", "priority", "workspace"])
            .with_examples([
                "run task abc beast-mode",
                "run task xyz parallel timeout=300",
            ]),
        CommandPattern::new(Verb::Stop, Noun::Instance, "Stop a running instance")
            .with_modifiers(["graceful", "immediate", "force"])
            .with_required(["instance_id"])
            .with_optional(["timeout", "preserve_state"])
            .with_examples([
                "stop instance kiro-3 graceful",
                "stop instance kiro-1 immediate",
            ]),
        CommandPattern::new(Verb::Sync, Noun::Branch, "Synchronize git branch")
            .with_modifiers(["upstream", "downstream", "bidirectional"])
            .with_required(["branch_name"])
            .with_optional(["conflict_strategy", "merge_strategy"])
            .with_examples([
                "sync branch feature/task-1 upstream",
                "sync branch main bidirectional",
            ]),
        CommandPattern::new(Verb::Status, Noun::Swarm, "Get swarm status information")
            .with_modifiers(["detailed", "summary", "health", "performance"])
            .with_optional(["format", "filter"])
            .with_examples(["status swarm detailed", "status swarm health"]),
        CommandPattern::new(Verb::Scale, Noun::Instances, "Scale instance count")
            .with_modifiers(["up", "down", "auto"])
            .with_required(["count"])
            .with_optional(["resource_type", "deployment_target"])
            .with_examples(["scale instances up count=5", "scale instances auto count=3"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_task_pattern() -> CommandPattern {
        default_patterns()
            .into_iter()
            .find(|p| p.key() == (Verb::Run, Noun::Task))
            .unwrap()
    }

    #[test]
    fn test_default_patterns_complete() {
        let patterns = default_patterns();
        assert_eq!(patterns.len(), 5);
        let keys: Vec<_> = patterns.iter().map(CommandPattern::key).collect();
        assert!(keys.contains(&(Verb::Run, Noun::Task)));
        assert!(keys.contains(&(Verb::Stop, Noun::Instance)));
        assert!(keys.contains(&(Verb::Sync, Noun::Branch)));
        assert!(keys.contains(&(Verb::Status, Noun::Swarm)));
        assert!(keys.contains(&(Verb::Scale, Noun::Instances)));
    }

    #[test]
    fn test_missing_required_parameter_is_error() {
        let pattern = run_task_pattern();
        let cmd = Command::new(Verb::Run, Noun::Task, "src");
        let result = pattern.validate(&cmd);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .contains(&"Missing required parameter: task_id".to_string()));
    }

    #[test]
    fn test_required_present_is_valid() {
        let pattern = run_task_pattern();
        let cmd = Command::new(Verb::Run, Noun::Task, "src").with_parameter("task_id", "abc");
        let result = pattern.validate(&cmd);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_unknown_modifier_is_warning_with_suggestion() {
        let pattern = run_task_pattern();
        let cmd = Command::new(Verb::Run, Noun::Task, "src")
            .with_parameter("task_id", "abc")
            .with_modifier("turbo");
        let result = pattern.validate(&cmd);
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Unknown modifier: turbo".to_string()]);
        assert_eq!(result.suggestions.len(), 1);
        assert!(result.suggestions[0].starts_with("Available modifiers: "));
        assert!(result.suggestions[0].contains("beast-mode"));
    }

    #[test]
    fn test_unknown_optional_parameter_accepted() {
        let pattern = run_task_pattern();
        let cmd = Command::new(Verb::Run, Noun::Task, "src")
            .with_parameter("task_id", "abc")
            .with_parameter("surprise", "value");
        let result = pattern.validate(&cmd);
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validation_display_forms() {
        assert_eq!(ValidationResult::valid().to_display_string(), "VALID");

        let with_warnings = ValidationResult {
            is_valid: true,
            warnings: vec!["Unknown modifier: turbo".into()],
            ..ValidationResult::default()
        };
        assert_eq!(
            with_warnings.to_display_string(),
            "VALID (warnings: Unknown modifier: turbo)"
        );

        let invalid = ValidationResult {
            is_valid: false,
            errors: vec!["Missing required parameter: task_id".into()],
            suggestions: vec!["Available modifiers: debug".into()],
            ..ValidationResult::default()
        };
        let rendered = invalid.to_display_string();
        assert!(rendered.starts_with("INVALID: Missing required parameter: task_id"));
        assert!(rendered.contains("\nSuggestions: Available modifiers: debug"));
    }
}
