//! Text protocol handler.
//!
//! Front door for the command channel: parses human-readable text into
//! structured commands, validates them against registered patterns,
//! dispatches to pluggable handlers, and keeps execution accounting plus a
//! bounded command history. Implements the reflective module contract so
//! monitoring callers can watch the protocol surface like any other
//! component.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map};
use tracing::{debug, warn};

use crate::domain::error::ProtocolError;
use crate::domain::reflective::{
    HealthIndicator, HealthTracker, IndicatorStatus, ModuleStatus, ReflectiveModule, RingBuffer,
    INDICATOR_CAPACITY,
};

use super::command::{Command, Noun, Verb};
use super::natural::parse_natural_language;
use super::pattern::{default_patterns, CommandPattern, ValidationResult};
use super::result::ActionResult;

/// An action handler bound to one `(verb, noun)` pair.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult>;
}

/// Adapter turning a plain synchronous closure into an [`ActionHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&Command) -> anyhow::Result<ActionResult> + Send + Sync,
{
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult> {
        (self.0)(command)
    }
}

/// Execution accounting for the handler.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionStats {
    pub total_commands: u64,
    pub successful_commands: u64,
    pub failed_commands: u64,
    /// Running average of handler wall-clock time, in seconds.
    pub average_execution_time: f64,
}

impl ExecutionStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_commands == 0 {
            0.0
        } else {
            self.successful_commands as f64 / self.total_commands as f64
        }
    }

    fn record(&mut self, success: bool, elapsed_seconds: f64) {
        self.total_commands += 1;
        if success {
            self.successful_commands += 1;
        } else {
            self.failed_commands += 1;
        }
        self.average_execution_time = (self.average_execution_time
            * (self.total_commands - 1) as f64
            + elapsed_seconds)
            / self.total_commands as f64;
    }
}

/// Handler for the text-based command channel.
///
/// Shared-safe: callers invoke it through an `Arc` from independent tasks;
/// internal maps and counters sit behind short lock sections that are never
/// held across an await.
pub struct TextProtocolHandler {
    instance_id: String,
    patterns: RwLock<HashMap<(Verb, Noun), CommandPattern>>,
    handlers: RwLock<HashMap<(Verb, Noun), Arc<dyn ActionHandler>>>,
    history: Mutex<RingBuffer<Command>>,
    stats: Mutex<ExecutionStats>,
    health: HealthTracker,
}

impl TextProtocolHandler {
    pub fn new(instance_id: impl Into<String>) -> Self {
        let handler = Self {
            instance_id: instance_id.into(),
            patterns: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(RingBuffer::new(INDICATOR_CAPACITY)),
            stats: Mutex::new(ExecutionStats::default()),
            health: HealthTracker::new("TextProtocolHandler", "1.0.0"),
        };
        for pattern in default_patterns() {
            handler.register_pattern(pattern);
        }
        handler
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Register a pattern. Replaces any prior pattern for the same key.
    pub fn register_pattern(&self, pattern: CommandPattern) {
        let key = pattern.key();
        self.patterns
            .write()
            .expect("pattern registry poisoned")
            .insert(key, pattern);
        self.health.note_activity();
    }

    /// Register a handler for a `(verb, noun)` pair. Replaces any prior
    /// handler for the same key.
    pub fn register_handler(&self, verb: Verb, noun: Noun, handler: Arc<dyn ActionHandler>) {
        self.handlers
            .write()
            .expect("handler registry poisoned")
            .insert((verb, noun), handler);
        self.health.note_activity();
    }

    /// Register a plain closure as a handler.
    pub fn register_fn<F>(&self, verb: Verb, noun: Noun, f: F)
    where
        F: Fn(&Command) -> anyhow::Result<ActionResult> + Send + Sync + 'static,
    {
        self.register_handler(verb, noun, Arc::new(FnHandler(f)));
    }

    pub fn registered_patterns(&self) -> Vec<CommandPattern> {
        let mut patterns: Vec<_> = self
            .patterns
            .read()
            .expect("pattern registry poisoned")
            .values()
            .cloned()
            .collect();
        patterns.sort_by_key(CommandPattern::key);
        patterns
    }

    /// Parse raw text into a command.
    ///
    /// The strict verb-noun stage runs first; free-form text falls back to
    /// the natural-language parser. Successful parses are appended to the
    /// bounded command history.
    pub fn parse(&self, text: &str) -> Result<Command, ProtocolError> {
        let parsed = Command::from_command_string(text, self.instance_id.as_str())
            .or_else(|_| parse_natural_language(text, &self.instance_id));

        match parsed {
            Ok(command) => {
                debug!(command = %command.to_command_string(), "Parsed command");
                self.history
                    .lock()
                    .expect("command history poisoned")
                    .push(command.clone());
                self.health.note_activity();
                Ok(command)
            }
            Err(err) => {
                warn!(text, error = %err, "Failed to parse command");
                self.health.record(
                    HealthIndicator::new(
                        "command_parsing",
                        IndicatorStatus::Warning,
                        format!("Failed to parse command: {text}"),
                    )
                    .with_detail("error", json!(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Validate a command against its registered pattern.
    pub fn validate(&self, command: &Command) -> ValidationResult {
        let patterns = self.patterns.read().expect("pattern registry poisoned");
        match patterns.get(&(command.verb, command.noun)) {
            Some(pattern) => pattern.validate(command),
            None => {
                let mut available: Vec<String> = patterns
                    .values()
                    .map(|p| format!("{} {}", p.verb, p.noun))
                    .collect();
                available.sort();
                ValidationResult {
                    is_valid: false,
                    errors: vec![format!(
                        "Unknown command pattern: {} {}",
                        command.verb, command.noun
                    )],
                    warnings: Vec::new(),
                    suggestions: vec![format!("Available patterns: {}", available.join(", "))],
                }
            }
        }
    }

    /// Execute a command end to end: validate, dispatch, account.
    pub async fn execute(&self, command: &Command) -> ActionResult {
        let started = Instant::now();

        let validation = self.validate(command);
        if !validation.is_valid {
            return ActionResult::failed(
                format!("Invalid command: {}", validation.errors.join(", ")),
                started.elapsed(),
                command.correlation_id,
            );
        }

        let handler = {
            let handlers = self.handlers.read().expect("handler registry poisoned");
            handlers.get(&(command.verb, command.noun)).cloned()
        };
        let Some(handler) = handler else {
            return ActionResult::failed(
                format!(
                    "No handler registered for: {} {}",
                    command.verb, command.noun
                ),
                started.elapsed(),
                command.correlation_id,
            );
        };

        let outcome = handler.handle(command).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.health.record(
                    HealthIndicator::new(
                        "action_execution",
                        IndicatorStatus::Critical,
                        format!("Failed to execute action: {}", command.to_command_string()),
                    )
                    .with_detail("error", json!(err.to_string())),
                );
                ActionResult::failed(
                    format!("Execution failed: {err}"),
                    elapsed,
                    command.correlation_id,
                )
            }
        };

        self.stats
            .lock()
            .expect("execution stats poisoned")
            .record(result.success, elapsed.as_secs_f64());
        self.health.note_activity();
        result
    }

    /// Current execution statistics.
    pub fn stats(&self) -> ExecutionStats {
        self.stats.lock().expect("execution stats poisoned").clone()
    }

    /// Commands parsed so far, oldest first, bounded to the history cap.
    pub fn history(&self) -> Vec<Command> {
        self.history
            .lock()
            .expect("command history poisoned")
            .snapshot()
    }

    /// Help text for a specific pattern, or a one-line listing of every
    /// registered pattern.
    pub fn help(&self, verb: Option<Verb>, noun: Option<Noun>) -> String {
        let patterns = self.patterns.read().expect("pattern registry poisoned");
        if let (Some(verb), Some(noun)) = (verb, noun) {
            let Some(pattern) = patterns.get(&(verb, noun)) else {
                return format!("No help available for: {verb} {noun}");
            };
            let mut text = format!("{} {} - {}\n", pattern.verb, pattern.noun, pattern.description);
            if !pattern.allowed_modifiers.is_empty() {
                let modifiers: Vec<_> = pattern.allowed_modifiers.iter().cloned().collect();
                text.push_str(&format!("Modifiers: {}\n", modifiers.join(", ")));
            }
            if !pattern.required_parameters.is_empty() {
                let required: Vec<_> = pattern.required_parameters.iter().cloned().collect();
                text.push_str(&format!("Required: {}\n", required.join(", ")));
            }
            if !pattern.optional_parameters.is_empty() {
                let optional: Vec<_> = pattern.optional_parameters.iter().cloned().collect();
                text.push_str(&format!("Optional: {}\n", optional.join(", ")));
            }
            if !pattern.examples.is_empty() {
                text.push_str("Examples:\n");
                for example in &pattern.examples {
                    text.push_str(&format!("  {example}\n"));
                }
            }
            text
        } else {
            let mut lines: Vec<String> = patterns
                .values()
                .map(|p| format!("  {} {} - {}", p.verb, p.noun, p.description))
                .collect();
            lines.sort();
            format!("Available commands:\n{}\n", lines.join("\n"))
        }
    }

    fn performance_indicator(&self) -> HealthIndicator {
        let stats = self.stats();
        let rate = stats.success_rate();
        let status = if rate >= 0.9 || stats.total_commands == 0 {
            IndicatorStatus::Healthy
        } else if rate >= 0.7 {
            IndicatorStatus::Warning
        } else {
            IndicatorStatus::Critical
        };
        HealthIndicator::new(
            "performance",
            status,
            format!("Command success rate: {:.1}%", rate * 100.0),
        )
        .with_detail("success_rate", json!(rate))
        .with_detail("total_commands", json!(stats.total_commands))
        .with_detail(
            "average_execution_time",
            json!(stats.average_execution_time),
        )
    }
}

impl ReflectiveModule for TextProtocolHandler {
    fn module_status(&self) -> ModuleStatus {
        let mut metrics = Map::new();
        metrics.insert(
            "execution_stats".to_string(),
            serde_json::to_value(self.stats()).unwrap_or_default(),
        );
        metrics.insert(
            "command_history_size".to_string(),
            json!(self.history.lock().expect("command history poisoned").len()),
        );
        metrics.insert(
            "registered_patterns".to_string(),
            json!(self.patterns.read().expect("pattern registry poisoned").len()),
        );
        metrics.insert(
            "registered_handlers".to_string(),
            json!(self.handlers.read().expect("handler registry poisoned").len()),
        );
        self.health.status(self.health_indicators(), metrics)
    }

    fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    fn health_indicators(&self) -> Vec<HealthIndicator> {
        let mut indicators = self.health.indicators();
        indicators.insert(0, self.performance_indicator());
        indicators
    }

    fn note_activity(&self) {
        self.health.note_activity();
    }
}
