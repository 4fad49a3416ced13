//! Built-in action handlers.
//!
//! Wires the default command patterns to orchestration controller
//! operations. Expected operational failures (unknown swarm, invalid
//! transition) come back as failed action results rather than handler
//! errors, so they degrade statistics without tripping critical health
//! indicators.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::models::task::TaskStatus;
use crate::protocol::command::{Command, Noun, ParamValue, Verb};
use crate::protocol::handler::{ActionHandler, TextProtocolHandler};
use crate::protocol::result::ActionResult;

use super::controller::OrchestrationController;

fn string_param(command: &Command, key: &str) -> Option<String> {
    command.parameter(key).map(|v| match v {
        ParamValue::Str(s) => s.clone(),
        other => other.to_string(),
    })
}

/// `run task`: drives a pending task through assignment into execution.
struct RunTaskHandler {
    controller: Arc<OrchestrationController>,
}

#[async_trait]
impl ActionHandler for RunTaskHandler {
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult> {
        let started = Instant::now();
        let task_id = string_param(command, "task_id")
            .ok_or_else(|| anyhow::anyhow!("task_id parameter missing"))?;

        for status in [TaskStatus::Assigned, TaskStatus::Running] {
            if let Err(err) = self
                .controller
                .update_task_status(None, &task_id, status)
                .await
            {
                return Ok(ActionResult::failed(
                    format!("Cannot run task {task_id}: {err}"),
                    started.elapsed(),
                    command.correlation_id,
                ));
            }
        }

        Ok(ActionResult::ok(
            format!("Task {task_id} is running"),
            started.elapsed(),
            command.correlation_id,
        )
        .with_data("task_id", json!(task_id))
        .with_side_effect(format!("task {task_id} marked running")))
    }
}

/// `stop instance`: stops a single worker instance.
struct StopInstanceHandler {
    controller: Arc<OrchestrationController>,
}

#[async_trait]
impl ActionHandler for StopInstanceHandler {
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult> {
        let started = Instant::now();
        let instance_id = string_param(command, "instance_id")
            .ok_or_else(|| anyhow::anyhow!("instance_id parameter missing"))?;
        let mode = if command.has_modifier("immediate") || command.has_modifier("force") {
            "immediate"
        } else {
            "graceful"
        };

        match self.controller.stop_instance(None, &instance_id).await {
            Ok(()) => Ok(ActionResult::ok(
                format!("Instance {instance_id} stopped ({mode})"),
                started.elapsed(),
                command.correlation_id,
            )
            .with_side_effect(format!("instance {instance_id} stopped"))),
            Err(err) => Ok(ActionResult::failed(
                format!("Cannot stop instance {instance_id}: {err}"),
                started.elapsed(),
                command.correlation_id,
            )),
        }
    }
}

/// `status swarm`: snapshot of the default swarm.
struct StatusSwarmHandler {
    controller: Arc<OrchestrationController>,
}

#[async_trait]
impl ActionHandler for StatusSwarmHandler {
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult> {
        let started = Instant::now();
        match self.controller.monitor(None).await {
            Ok(swarm) => {
                let mut result = ActionResult::ok(
                    format!("Swarm {} is {}", swarm.swarm_id, swarm.status.as_str()),
                    started.elapsed(),
                    command.correlation_id,
                )
                .with_data("swarm_id", json!(swarm.swarm_id))
                .with_data("status", json!(swarm.status.as_str()))
                .with_data("instance_count", json!(swarm.instances.len()))
                .with_data(
                    "completed_tasks",
                    json!(swarm.performance_metrics.completed_tasks),
                )
                .with_data("failed_tasks", json!(swarm.performance_metrics.failed_tasks))
                .with_data("error_rate", json!(swarm.performance_metrics.error_rate));

                if command.has_modifier("detailed") {
                    let instances: serde_json::Map<String, serde_json::Value> = swarm
                        .instances
                        .values()
                        .map(|i| {
                            (
                                i.instance_id.clone(),
                                json!({
                                    "status": i.status.as_str(),
                                    "tasks": i.task_assignments,
                                    "endpoint": i.communication_endpoint,
                                }),
                            )
                        })
                        .collect();
                    result = result.with_data("instances", json!(instances));
                }
                Ok(result)
            }
            Err(err) => Ok(ActionResult::failed(
                format!("Cannot read swarm status: {err}"),
                started.elapsed(),
                command.correlation_id,
            )),
        }
    }
}

/// `scale instances`: resizes the default swarm.
struct ScaleInstancesHandler {
    controller: Arc<OrchestrationController>,
}

#[async_trait]
impl ActionHandler for ScaleInstancesHandler {
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult> {
        let started = Instant::now();
        let count = command
            .parameter("count")
            .and_then(ParamValue::as_int)
            .ok_or_else(|| anyhow::anyhow!("count parameter missing or not an integer"))?;
        if count < 0 {
            return Ok(ActionResult::failed(
                format!("Cannot scale to negative count {count}"),
                started.elapsed(),
                command.correlation_id,
            ));
        }

        match self.controller.scale_swarm(None, count as usize).await {
            Ok(swarm) => Ok(ActionResult::ok(
                format!(
                    "Swarm {} scaled to {} instances",
                    swarm.swarm_id,
                    swarm.instances.len()
                ),
                started.elapsed(),
                command.correlation_id,
            )
            .with_data("instance_count", json!(swarm.instances.len()))
            .with_side_effect(format!("swarm scaled to {} instances", swarm.instances.len()))),
            Err(err) => Ok(ActionResult::failed(
                format!("Cannot scale instances: {err}"),
                started.elapsed(),
                command.correlation_id,
            )),
        }
    }
}

/// `sync branch`: acknowledged at the worker-provisioner boundary; the
/// actual git plumbing lives outside the core.
struct SyncBranchHandler;

#[async_trait]
impl ActionHandler for SyncBranchHandler {
    async fn handle(&self, command: &Command) -> anyhow::Result<ActionResult> {
        let started = Instant::now();
        let branch = string_param(command, "branch_name")
            .ok_or_else(|| anyhow::anyhow!("branch_name parameter missing"))?;
        let direction = ["upstream", "downstream", "bidirectional"]
            .into_iter()
            .find(|d| command.has_modifier(d))
            .unwrap_or("upstream");

        Ok(ActionResult::ok(
            format!("Sync of branch {branch} requested"),
            started.elapsed(),
            command.correlation_id,
        )
        .with_data("branch_name", json!(branch))
        .with_data("direction", json!(direction))
        .with_side_effect(format!("branch {branch} sync requested ({direction})")))
    }
}

/// Register all built-in handlers for the default patterns.
pub fn register_builtin_handlers(
    protocol: &TextProtocolHandler,
    controller: Arc<OrchestrationController>,
) {
    protocol.register_handler(
        Verb::Run,
        Noun::Task,
        Arc::new(RunTaskHandler {
            controller: Arc::clone(&controller),
        }),
    );
    protocol.register_handler(
        Verb::Stop,
        Noun::Instance,
        Arc::new(StopInstanceHandler {
            controller: Arc::clone(&controller),
        }),
    );
    protocol.register_handler(
        Verb::Status,
        Noun::Swarm,
        Arc::new(StatusSwarmHandler {
            controller: Arc::clone(&controller),
        }),
    );
    protocol.register_handler(
        Verb::Scale,
        Noun::Instances,
        Arc::new(ScaleInstancesHandler { controller }),
    );
    protocol.register_handler(Verb::Sync, Noun::Branch, Arc::new(SyncBranchHandler));
}
