//! Orchestration controller.
//!
//! Central coordination hub for distributed swarm operations: launches
//! swarms, plans task distribution, monitors instance health, generates
//! recovery plans for failed instances, and integrates completed work.
//!
//! The controller exclusively owns the `swarm_id → SwarmState` mapping.
//! A single coarse lock serializes mutation; no lock is ever held across
//! an await point. Emergency shutdown is global and terminal: once
//! triggered, every subsequent operation fails fast with a safety
//! violation.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map};
use tracing::{error, info, warn};

use crate::domain::error::OrchestrationError;
use crate::domain::models::config::SwarmConfig;
use crate::domain::models::instance::{DeploymentTarget, Instance, InstanceStatus};
use crate::domain::models::plan::DistributionPlan;
use crate::domain::models::recovery::{
    FailureType, InstanceFailure, RecoveryPlan, RecoveryStrategy,
};
use crate::domain::models::swarm::{IntegrationReport, SwarmState, SwarmStatus};
use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::reflective::{
    HealthIndicator, HealthTracker, IndicatorStatus, ModuleStatus, ReflectiveModule,
};

use super::planner::DistributionPlanner;

/// Base port for instance communication endpoints.
const ENDPOINT_BASE_PORT: u16 = 5000;

/// Outcome of an integration pass, produced by a pluggable strategy.
#[derive(Debug, Clone, Default)]
pub struct IntegrationOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub conflicts_resolved: Vec<String>,
    pub conflicts_remaining: Vec<String>,
    pub quality_gate_results: BTreeMap<String, bool>,
    pub summary: String,
}

/// Pluggable integration policy boundary.
///
/// The controller hands the completed-task batch to the strategy; policies
/// such as quality gating live behind this trait and are selected by the
/// collaborator wiring the controller.
#[async_trait]
pub trait IntegrationStrategy: Send + Sync {
    async fn integrate(&self, swarm_id: &str, completed_tasks: &[String]) -> IntegrationOutcome;
}

/// Baseline policy: every completed task integrates successfully.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateIntegration;

#[async_trait]
impl IntegrationStrategy for ImmediateIntegration {
    async fn integrate(&self, _swarm_id: &str, completed_tasks: &[String]) -> IntegrationOutcome {
        IntegrationOutcome {
            successful: completed_tasks.to_vec(),
            summary: format!("Successfully integrated {} tasks", completed_tasks.len()),
            ..IntegrationOutcome::default()
        }
    }
}

/// Controller-level performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerMetrics {
    pub swarms_launched: u64,
    pub tasks_distributed: u64,
    pub successful_integrations: u64,
    pub failed_recoveries: u64,
    pub average_swarm_startup_time: f64,
    pub average_task_completion_time: f64,
    #[serde(skip)]
    startup_samples: u64,
}

impl ControllerMetrics {
    fn record_startup(&mut self, seconds: f64) {
        self.average_swarm_startup_time = (self.average_swarm_startup_time
            * self.startup_samples as f64
            + seconds)
            / (self.startup_samples + 1) as f64;
        self.startup_samples += 1;
    }
}

/// Central coordination hub for distributed swarm operations.
pub struct OrchestrationController {
    config: SwarmConfig,
    planner: DistributionPlanner,
    swarms: RwLock<HashMap<String, SwarmState>>,
    current_swarm_id: Mutex<Option<String>>,
    distribution_history: Mutex<Vec<DistributionPlan>>,
    recovery_history: Mutex<Vec<RecoveryPlan>>,
    metrics: Mutex<ControllerMetrics>,
    shutdown: AtomicBool,
    shutdown_reason: Mutex<Option<String>>,
    integration: Box<dyn IntegrationStrategy>,
    health: HealthTracker,
}

impl OrchestrationController {
    /// Create a controller. The configuration is validated up front so
    /// everything downstream can rely on its bounds.
    pub fn new(config: SwarmConfig) -> Result<Self, OrchestrationError> {
        config.validate()?;
        info!(
            instance_count = config.instance_count,
            strategy = config.task_distribution_strategy.as_str(),
            "Orchestration controller initialized"
        );
        Ok(Self {
            config,
            planner: DistributionPlanner::new(),
            swarms: RwLock::new(HashMap::new()),
            current_swarm_id: Mutex::new(None),
            distribution_history: Mutex::new(Vec::new()),
            recovery_history: Mutex::new(Vec::new()),
            metrics: Mutex::new(ControllerMetrics::default()),
            shutdown: AtomicBool::new(false),
            shutdown_reason: Mutex::new(None),
            integration: Box::new(ImmediateIntegration),
            health: HealthTracker::new("OrchestrationController", "1.0.0"),
        })
    }

    /// Replace the integration strategy (policy boundary).
    pub fn with_integration_strategy(mut self, strategy: Box<dyn IntegrationStrategy>) -> Self {
        self.integration = strategy;
        self
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn metrics(&self) -> ControllerMetrics {
        self.metrics.lock().expect("metrics poisoned").clone()
    }

    pub fn recovery_history(&self) -> Vec<RecoveryPlan> {
        self.recovery_history
            .lock()
            .expect("recovery history poisoned")
            .clone()
    }

    fn ensure_operational(&self) -> Result<(), OrchestrationError> {
        if self.shutdown.load(Ordering::SeqCst) {
            let reason = self
                .shutdown_reason
                .lock()
                .expect("shutdown reason poisoned")
                .clone()
                .unwrap_or_else(|| "emergency shutdown active".to_string());
            return Err(OrchestrationError::SafetyViolation(reason));
        }
        Ok(())
    }

    fn resolve_swarm_id(&self, swarm_id: Option<&str>) -> Result<String, OrchestrationError> {
        match swarm_id {
            Some(id) => Ok(id.to_string()),
            None => self
                .current_swarm_id
                .lock()
                .expect("current swarm poisoned")
                .clone()
                .ok_or_else(|| OrchestrationError::SwarmNotFound("<none>".to_string())),
        }
    }

    /// Launch a swarm for the given task batch.
    pub async fn launch(&self, tasks: Vec<Task>) -> Result<SwarmState, OrchestrationError> {
        self.ensure_operational()?;
        let started = Instant::now();

        match self.launch_inner(&tasks, started) {
            Ok(swarm) => {
                self.health.record(
                    HealthIndicator::new(
                        "swarm_launch",
                        IndicatorStatus::Healthy,
                        format!(
                            "Successfully launched swarm {} with {} instances",
                            swarm.swarm_id,
                            swarm.instances.len()
                        ),
                    )
                    .with_detail("swarm_id", json!(swarm.swarm_id))
                    .with_detail("instance_count", json!(swarm.instances.len()))
                    .with_detail("task_count", json!(tasks.len())),
                );
                self.health.note_activity();
                info!(
                    swarm_id = %swarm.swarm_id,
                    instances = swarm.instances.len(),
                    tasks = tasks.len(),
                    "Swarm launched"
                );
                Ok(swarm)
            }
            Err(err) => {
                self.health.record(
                    HealthIndicator::new(
                        "swarm_launch",
                        IndicatorStatus::Critical,
                        format!("Failed to launch swarm: {err}"),
                    )
                    .with_detail("task_count", json!(tasks.len())),
                );
                error!(error = %err, "Swarm launch failed");
                Err(err)
            }
        }
    }

    fn launch_inner(
        &self,
        tasks: &[Task],
        started: Instant,
    ) -> Result<SwarmState, OrchestrationError> {
        if tasks.is_empty() {
            return Err(OrchestrationError::EmptyBatch);
        }

        let mut config = self.config.clone();
        config.validate()?;
        if config.deployment_targets.is_empty() && config.instance_count > 1 {
            config.deployment_targets.push(DeploymentTarget::local());
        }

        let mut swarm = SwarmState::new(config.clone());
        for task in tasks {
            swarm
                .execution_status
                .insert(task.id.clone(), TaskStatus::Pending);
        }

        let plan = self.plan_distribution(tasks, &config)?;

        let mut created = 0usize;
        for (slot, task_ids) in &plan.instance_assignments {
            if task_ids.is_empty() {
                continue;
            }
            let endpoint = format!(
                "tcp://localhost:{}",
                ENDPOINT_BASE_PORT as usize + created
            );
            let workspace = PathBuf::from(&config.workspace_root).join(slot);
            let mut instance =
                Instance::new(slot.clone(), format!("feature/{slot}"), workspace, endpoint)
                    .with_tasks(task_ids.clone());
            instance.resource_allocation = config.resource_limits.clone();
            if config.enable_visual_identification {
                instance = instance.with_visual_identifier(format!("color-{}", created + 1));
            }
            created += 1;
            swarm.instances.insert(slot.clone(), instance);
        }

        swarm.task_assignments = plan.instance_assignments.clone();
        swarm.performance_metrics.total_tasks = tasks.len();
        swarm.status = SwarmStatus::Active;
        swarm.touch();
        debug_assert!(swarm.check_invariants().is_ok());

        {
            let mut swarms = self.swarms.write().expect("swarm map poisoned");
            swarms.insert(swarm.swarm_id.clone(), swarm.clone());
        }
        *self.current_swarm_id.lock().expect("current swarm poisoned") =
            Some(swarm.swarm_id.clone());

        let mut metrics = self.metrics.lock().expect("metrics poisoned");
        metrics.swarms_launched += 1;
        metrics.record_startup(started.elapsed().as_secs_f64());

        Ok(swarm)
    }

    /// Create a distribution plan for a task batch.
    pub async fn distribute(&self, tasks: &[Task]) -> Result<DistributionPlan, OrchestrationError> {
        self.ensure_operational()?;
        match self.plan_distribution(tasks, &self.config) {
            Ok(plan) => {
                self.health.record(
                    HealthIndicator::new(
                        "task_distribution",
                        IndicatorStatus::Healthy,
                        format!(
                            "Created distribution plan for {} tasks across {} instances",
                            plan.total_tasks,
                            plan.instance_assignments.len()
                        ),
                    )
                    .with_detail("parallel_groups", json!(plan.parallel_execution_groups.len()))
                    .with_detail("strategy", json!(plan.strategy_used.as_str())),
                );
                self.health.note_activity();
                Ok(plan)
            }
            Err(err) => {
                self.health.record(HealthIndicator::new(
                    "task_distribution",
                    IndicatorStatus::Critical,
                    format!("Failed to create distribution plan: {err}"),
                ));
                error!(error = %err, "Task distribution failed");
                Err(err)
            }
        }
    }

    fn plan_distribution(
        &self,
        tasks: &[Task],
        config: &SwarmConfig,
    ) -> Result<DistributionPlan, OrchestrationError> {
        let plan = self.planner.plan(tasks, config);
        plan.check_invariants().map_err(OrchestrationError::Plan)?;

        self.distribution_history
            .lock()
            .expect("distribution history poisoned")
            .push(plan.clone());
        self.metrics.lock().expect("metrics poisoned").tasks_distributed += tasks.len() as u64;
        Ok(plan)
    }

    /// Refresh health and metrics for a swarm and return its state.
    ///
    /// Defaults to the most recently launched swarm. Instances whose last
    /// heartbeat is older than twice the health-check interval are forced
    /// to `Error`; instances that never sent a heartbeat are left alone.
    pub async fn monitor(&self, swarm_id: Option<&str>) -> Result<SwarmState, OrchestrationError> {
        self.ensure_operational()?;
        let id = self.resolve_swarm_id(swarm_id)?;
        let now = Utc::now();
        let stale_after = 2 * self.config.health_check_interval as i64;

        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .get_mut(&id)
            .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;

        for instance in swarm.instances.values_mut() {
            if let Some(age) = instance.heartbeat_age_seconds(now) {
                if age > stale_after && instance.status != InstanceStatus::Error {
                    warn!(
                        instance_id = %instance.instance_id,
                        age_seconds = age,
                        "Instance heartbeat stale, marking as error"
                    );
                    instance.status = InstanceStatus::Error;
                }
            }
            instance
                .performance_metrics
                .insert("last_health_check".to_string(), json!(now.to_rfc3339()));
        }

        let completed = swarm
            .execution_status
            .values()
            .filter(|s| **s == TaskStatus::Completed)
            .count();
        let failed = swarm
            .execution_status
            .values()
            .filter(|s| **s == TaskStatus::Failed)
            .count();
        let metrics = &mut swarm.performance_metrics;
        metrics.total_tasks = swarm.execution_status.len();
        metrics.completed_tasks = completed;
        metrics.failed_tasks = failed;
        metrics.active_instances = swarm
            .instances
            .values()
            .filter(|i| i.status == InstanceStatus::Active)
            .count();
        let finished = completed + failed;
        metrics.error_rate = if finished > 0 {
            failed as f64 / finished as f64
        } else {
            0.0
        };
        metrics.last_updated = now;

        swarm.touch();
        self.health.note_activity();
        Ok(swarm.clone())
    }

    /// Record a heartbeat pushed by the heartbeat transport.
    pub async fn record_heartbeat(
        &self,
        swarm_id: Option<&str>,
        instance_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), OrchestrationError> {
        self.ensure_operational()?;
        let id = self.resolve_swarm_id(swarm_id)?;
        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .get_mut(&id)
            .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;
        let instance = swarm.instances.get_mut(instance_id).ok_or_else(|| {
            OrchestrationError::InstanceNotFound {
                swarm_id: id.clone(),
                instance_id: instance_id.to_string(),
            }
        })?;
        instance.last_heartbeat = Some(at);
        if instance.status == InstanceStatus::Starting {
            instance.status = InstanceStatus::Active;
        }
        swarm.touch();
        Ok(())
    }

    /// Generate a recovery plan for a failed instance and, when the
    /// strategy allows, attempt the recovery automatically.
    pub async fn handle_failure(
        &self,
        failure: &InstanceFailure,
    ) -> Result<RecoveryPlan, OrchestrationError> {
        self.ensure_operational()?;

        let complex = failure.recovery_attempts > 0;
        let strategy = if !failure.is_recoverable || complex {
            RecoveryStrategy::Manual
        } else {
            match failure.failure_type {
                FailureType::Timeout => RecoveryStrategy::Restart,
                FailureType::Resource => RecoveryStrategy::ScaleUp,
                FailureType::Crash | FailureType::Communication => RecoveryStrategy::Reassign,
            }
        };
        let estimated = if strategy == RecoveryStrategy::Restart {
            Duration::from_secs(5 * 60)
        } else {
            Duration::from_secs(15 * 60)
        };

        let mut plan = RecoveryPlan::new(&failure.instance_id, strategy, estimated);

        if strategy != RecoveryStrategy::Manual {
            match self.attempt_recovery(failure, strategy) {
                Ok(reassignments) => plan.task_reassignments = reassignments,
                Err(err) => {
                    warn!(
                        instance_id = %failure.instance_id,
                        error = %err,
                        "Automatic recovery attempt failed"
                    );
                    self.metrics.lock().expect("metrics poisoned").failed_recoveries += 1;
                }
            }
        }

        self.recovery_history
            .lock()
            .expect("recovery history poisoned")
            .push(plan.clone());

        let severity = if strategy == RecoveryStrategy::Manual {
            IndicatorStatus::Critical
        } else {
            IndicatorStatus::Warning
        };
        self.health.record(
            HealthIndicator::new(
                "failure_recovery",
                severity,
                format!("Generated recovery plan for instance {}", failure.instance_id),
            )
            .with_detail("failure_type", json!(failure.failure_type.as_str()))
            .with_detail("recovery_strategy", json!(strategy.as_str()))
            .with_detail("affected_tasks", json!(failure.affected_tasks.len())),
        );
        self.health.note_activity();
        info!(
            instance_id = %failure.instance_id,
            strategy = strategy.as_str(),
            "Recovery plan generated"
        );
        Ok(plan)
    }

    /// Apply a recovery strategy against the swarm owning the failed
    /// instance. Returns the task reassignments performed.
    fn attempt_recovery(
        &self,
        failure: &InstanceFailure,
        strategy: RecoveryStrategy,
    ) -> Result<BTreeMap<String, String>, String> {
        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .values_mut()
            .find(|s| s.instances.contains_key(&failure.instance_id))
            .ok_or_else(|| format!("no swarm owns instance {}", failure.instance_id))?;

        let mut reassignments = BTreeMap::new();
        match strategy {
            RecoveryStrategy::Restart => {
                let instance = swarm
                    .instances
                    .get_mut(&failure.instance_id)
                    .expect("instance checked above");
                instance.status = InstanceStatus::Starting;
                instance.last_heartbeat = None;
            }
            RecoveryStrategy::Reassign => {
                let target = swarm
                    .instances
                    .values()
                    .filter(|i| i.instance_id != failure.instance_id && i.status != InstanceStatus::Error)
                    .min_by_key(|i| i.task_assignments.len())
                    .map(|i| i.instance_id.clone())
                    .ok_or_else(|| "no healthy instance available for reassignment".to_string())?;

                for task_id in &failure.affected_tasks {
                    if let Some(assigned) = swarm.task_assignments.get_mut(&failure.instance_id) {
                        assigned.retain(|t| t != task_id);
                    }
                    swarm
                        .task_assignments
                        .entry(target.clone())
                        .or_default()
                        .push(task_id.clone());
                    reassignments.insert(task_id.clone(), target.clone());
                }
                if let Some(instance) = swarm.instances.get_mut(&target) {
                    for task_id in &failure.affected_tasks {
                        if !instance.task_assignments.contains(task_id) {
                            instance.task_assignments.push(task_id.clone());
                        }
                    }
                }
                if let Some(instance) = swarm.instances.get_mut(&failure.instance_id) {
                    instance
                        .task_assignments
                        .retain(|t| !failure.affected_tasks.contains(t));
                }
            }
            RecoveryStrategy::ScaleUp => {
                if swarm.status.can_transition_to(SwarmStatus::Scaling) {
                    swarm.status = SwarmStatus::Scaling;
                }
            }
            RecoveryStrategy::Manual => {}
        }
        swarm.touch();
        Ok(reassignments)
    }

    /// Integrate completed work for a swarm.
    pub async fn integrate(
        &self,
        swarm_id: Option<&str>,
    ) -> Result<IntegrationReport, OrchestrationError> {
        self.ensure_operational()?;
        let started = Instant::now();
        let id = self.resolve_swarm_id(swarm_id)?;

        let completed = {
            let swarms = self.swarms.read().expect("swarm map poisoned");
            let swarm = swarms
                .get(&id)
                .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;
            swarm.completed_task_ids()
        };

        if completed.is_empty() {
            let elapsed = started.elapsed().max(Duration::from_micros(1));
            self.health.note_activity();
            return Ok(IntegrationReport::empty(
                elapsed,
                "No completed tasks ready for integration",
            ));
        }

        let outcome = self.integration.integrate(&id, &completed).await;
        let elapsed = started.elapsed().max(Duration::from_micros(1));

        let report = IntegrationReport {
            report_id: uuid::Uuid::new_v4(),
            integration_batch: completed,
            successful_integrations: outcome.successful.clone(),
            failed_integrations: outcome.failed.clone(),
            conflicts_resolved: outcome.conflicts_resolved,
            conflicts_remaining: outcome.conflicts_remaining,
            quality_gate_results: outcome.quality_gate_results,
            integration_time: elapsed,
            created_at: Utc::now(),
            summary: outcome.summary,
        };

        {
            let mut swarms = self.swarms.write().expect("swarm map poisoned");
            if let Some(swarm) = swarms.get_mut(&id) {
                let status = &mut swarm.integration_status;
                status.successful_integrations += report.successful_integrations.len();
                status.failed_integrations += report.failed_integrations.len();
                status.last_integration = Some(report.created_at);
                swarm.touch();
            }
        }
        self.metrics.lock().expect("metrics poisoned").successful_integrations +=
            report.successful_integrations.len() as u64;

        let severity = if report.failed_integrations.is_empty() {
            IndicatorStatus::Healthy
        } else {
            IndicatorStatus::Warning
        };
        self.health.record(
            HealthIndicator::new(
                "integration",
                severity,
                format!(
                    "Integrated {} tasks, {} failed",
                    report.successful_integrations.len(),
                    report.failed_integrations.len()
                ),
            )
            .with_detail("swarm_id", json!(id)),
        );
        self.health.note_activity();
        info!(swarm_id = %id, summary = %report.summary, "Integration completed");
        Ok(report)
    }

    /// Advance a task through its execution-status machine. This is the
    /// surface worker callbacks use to report progress.
    pub async fn update_task_status(
        &self,
        swarm_id: Option<&str>,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), OrchestrationError> {
        self.ensure_operational()?;
        let id = self.resolve_swarm_id(swarm_id)?;
        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .get_mut(&id)
            .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;
        let current = swarm.execution_status.get_mut(task_id).ok_or_else(|| {
            OrchestrationError::TaskNotFound {
                swarm_id: id.clone(),
                task_id: task_id.to_string(),
            }
        })?;
        if !current.can_transition_to(status) {
            return Err(OrchestrationError::InvalidTransition {
                from: current.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }
        *current = status;
        swarm.touch();
        Ok(())
    }

    /// Stop a single instance. Its assigned tasks stay in place until a
    /// failure report or a rescale moves them.
    pub async fn stop_instance(
        &self,
        swarm_id: Option<&str>,
        instance_id: &str,
    ) -> Result<(), OrchestrationError> {
        self.ensure_operational()?;
        let id = self.resolve_swarm_id(swarm_id)?;
        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .get_mut(&id)
            .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;
        let instance = swarm.instances.get_mut(instance_id).ok_or_else(|| {
            OrchestrationError::InstanceNotFound {
                swarm_id: id.clone(),
                instance_id: instance_id.to_string(),
            }
        })?;
        instance.status = InstanceStatus::Stopped;
        swarm.touch();
        info!(swarm_id = %id, instance_id, "Instance stopped");
        self.health.note_activity();
        Ok(())
    }

    /// Gracefully stop a swarm: instances wind down and the swarm ends in
    /// `Stopped`.
    pub async fn stop_swarm(
        &self,
        swarm_id: Option<&str>,
    ) -> Result<SwarmState, OrchestrationError> {
        self.ensure_operational()?;
        let id = self.resolve_swarm_id(swarm_id)?;
        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .get_mut(&id)
            .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;

        swarm.status = SwarmStatus::Stopping;
        for instance in swarm.instances.values_mut() {
            instance.status = InstanceStatus::Stopped;
        }
        swarm.status = SwarmStatus::Stopped;
        swarm.touch();
        info!(swarm_id = %id, "Swarm stopped");
        self.health.note_activity();
        Ok(swarm.clone())
    }

    /// Scale a swarm to the requested instance count, bounded by the
    /// configuration. New slots start empty; surplus slots are only
    /// retired while they hold no task assignments.
    pub async fn scale_swarm(
        &self,
        swarm_id: Option<&str>,
        count: usize,
    ) -> Result<SwarmState, OrchestrationError> {
        self.ensure_operational()?;
        if count < 1 || count > self.config.max_instances {
            return Err(crate::domain::error::ConfigError::invalid("instance_count", count).into());
        }
        let id = self.resolve_swarm_id(swarm_id)?;
        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        let swarm = swarms
            .get_mut(&id)
            .ok_or_else(|| OrchestrationError::SwarmNotFound(id.clone()))?;

        if swarm.status.can_transition_to(SwarmStatus::Scaling) {
            swarm.status = SwarmStatus::Scaling;
        }

        let current = swarm.instances.len();
        if count > current {
            let mut next_index = current;
            while swarm.instances.len() < count {
                let slot = format!("instance-{next_index}");
                next_index += 1;
                if swarm.instances.contains_key(&slot) {
                    continue;
                }
                let endpoint = format!(
                    "tcp://localhost:{}",
                    ENDPOINT_BASE_PORT as usize + next_index - 1
                );
                let workspace = PathBuf::from(&swarm.config.workspace_root).join(&slot);
                let instance =
                    Instance::new(slot.clone(), format!("feature/{slot}"), workspace, endpoint);
                swarm.instances.insert(slot, instance);
            }
        } else if count < current {
            let removable: Vec<String> = swarm
                .instances
                .values()
                .filter(|i| i.task_assignments.is_empty())
                .map(|i| i.instance_id.clone())
                .collect();
            for slot in removable {
                if swarm.instances.len() <= count {
                    break;
                }
                swarm.instances.remove(&slot);
                swarm.task_assignments.remove(&slot);
            }
        }

        if swarm.status.can_transition_to(SwarmStatus::Active) {
            swarm.status = SwarmStatus::Active;
        }
        swarm.touch();
        info!(swarm_id = %id, instances = swarm.instances.len(), "Swarm scaled");
        self.health.note_activity();
        Ok(swarm.clone())
    }

    /// Globally and terminally shut down the controller. Every swarm is
    /// forced to `Stopped` and all subsequent operations fail with a
    /// safety violation. Idempotent.
    pub async fn emergency_shutdown(&self, reason: &str) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shutdown_reason.lock().expect("shutdown reason poisoned") =
            Some(format!("emergency shutdown: {reason}"));

        let mut swarms = self.swarms.write().expect("swarm map poisoned");
        for swarm in swarms.values_mut() {
            swarm.status = SwarmStatus::Stopped;
            for instance in swarm.instances.values_mut() {
                instance.status = InstanceStatus::Stopped;
            }
            swarm.touch();
        }

        self.health.record(HealthIndicator::new(
            "emergency_shutdown",
            IndicatorStatus::Critical,
            format!("Emergency shutdown initiated: {reason}"),
        ));
        warn!(reason, "EMERGENCY SHUTDOWN: all swarms stopped, controller is terminal");
    }

    /// Whether emergency shutdown has been triggered.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn swarm_performance_indicator(&self) -> HealthIndicator {
        let swarms = self.swarms.read().expect("swarm map poisoned");
        let error_rates: Vec<f64> = swarms
            .values()
            .map(|s| s.performance_metrics.error_rate)
            .collect();
        let avg_error_rate = if error_rates.is_empty() {
            0.0
        } else {
            error_rates.iter().sum::<f64>() / error_rates.len() as f64
        };
        let status = if avg_error_rate > 0.3 {
            IndicatorStatus::Critical
        } else if avg_error_rate > 0.1 {
            IndicatorStatus::Warning
        } else {
            IndicatorStatus::Healthy
        };
        HealthIndicator::new(
            "swarm_performance",
            status,
            format!("Managing {} active swarms", swarms.len()),
        )
        .with_detail("active_swarms", json!(swarms.len()))
        .with_detail("average_error_rate", json!(avg_error_rate))
    }
}

impl ReflectiveModule for OrchestrationController {
    fn module_status(&self) -> ModuleStatus {
        let mut metrics = Map::new();
        metrics.insert(
            "counters".to_string(),
            serde_json::to_value(self.metrics()).unwrap_or_default(),
        );
        metrics.insert(
            "active_swarms".to_string(),
            json!(self.swarms.read().expect("swarm map poisoned").len()),
        );
        metrics.insert(
            "distribution_history_size".to_string(),
            json!(self
                .distribution_history
                .lock()
                .expect("distribution history poisoned")
                .len()),
        );
        metrics.insert(
            "recovery_history_size".to_string(),
            json!(self
                .recovery_history
                .lock()
                .expect("recovery history poisoned")
                .len()),
        );
        self.health.status(self.health_indicators(), metrics)
    }

    fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    fn health_indicators(&self) -> Vec<HealthIndicator> {
        let mut indicators = self.health.indicators();
        indicators.insert(0, self.swarm_performance_indicator());
        indicators
    }

    fn note_activity(&self) {
        self.health.note_activity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tasks() -> Vec<Task> {
        vec![
            Task::new("t1", "first"),
            Task::new("t2", "second").with_dependency("t1"),
            Task::new("t3", "third").with_dependency("t2"),
            Task::new("t4", "independent"),
        ]
    }

    fn controller() -> OrchestrationController {
        OrchestrationController::new(SwarmConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_launch_rejects_empty_batch() {
        let ctl = controller();
        let err = ctl.launch(vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot launch swarm with empty task list");
        // Failure recorded as critical indicator.
        assert!(ctl
            .health_indicators()
            .iter()
            .any(|i| i.name == "swarm_launch" && i.status == IndicatorStatus::Critical));
    }

    #[tokio::test]
    async fn test_launch_creates_active_swarm() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();

        assert_eq!(swarm.status, SwarmStatus::Active);
        assert!(!swarm.instances.is_empty());
        assert_eq!(swarm.execution_status.len(), 4);
        assert!(swarm
            .execution_status
            .values()
            .all(|s| *s == TaskStatus::Pending));
        assert!(swarm.check_invariants().is_ok());

        for instance in swarm.instances.values() {
            assert!(instance.branch_name.starts_with("feature/"));
            assert!(instance.communication_endpoint.starts_with("tcp://localhost:"));
            assert!(instance.visual_identifier.is_some());
        }

        assert_eq!(ctl.metrics().swarms_launched, 1);
    }

    #[tokio::test]
    async fn test_launch_synthesizes_local_deployment_target() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        assert_eq!(swarm.config.deployment_targets.len(), 1);
        assert_eq!(swarm.config.deployment_targets[0].kind, "local");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let config = SwarmConfig {
            min_instances: 5,
            max_instances: 2,
            ..SwarmConfig::default()
        };
        assert!(OrchestrationController::new(config).is_err());
    }

    #[tokio::test]
    async fn test_monitor_unknown_swarm() {
        let ctl = controller();
        let err = ctl.monitor(Some("swarm-nope")).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::SwarmNotFound(_)));
    }

    #[tokio::test]
    async fn test_monitor_defaults_to_latest_swarm() {
        let ctl = controller();
        let launched = ctl.launch(sample_tasks()).await.unwrap();
        let monitored = ctl.monitor(None).await.unwrap();
        assert_eq!(monitored.swarm_id, launched.swarm_id);
    }

    #[tokio::test]
    async fn test_monitor_ages_out_stale_heartbeats() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        let instance_id = swarm.instances.keys().next().unwrap().clone();

        // Stale heartbeat: older than 2 x health_check_interval (30s).
        let stale = Utc::now() - chrono::Duration::seconds(120);
        ctl.record_heartbeat(None, &instance_id, stale).await.unwrap();

        let monitored = ctl.monitor(None).await.unwrap();
        assert_eq!(
            monitored.instances[&instance_id].status,
            InstanceStatus::Error
        );
    }

    #[tokio::test]
    async fn test_fresh_heartbeat_activates_instance() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        let instance_id = swarm.instances.keys().next().unwrap().clone();

        ctl.record_heartbeat(None, &instance_id, Utc::now()).await.unwrap();
        let monitored = ctl.monitor(None).await.unwrap();
        assert_eq!(
            monitored.instances[&instance_id].status,
            InstanceStatus::Active
        );
        assert_eq!(monitored.performance_metrics.active_instances, 1);
    }

    #[tokio::test]
    async fn test_absent_heartbeat_is_no_signal() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        let monitored = ctl.monitor(None).await.unwrap();
        for (id, instance) in &monitored.instances {
            assert_ne!(
                instance.status,
                InstanceStatus::Error,
                "instance {id} degraded without any heartbeat"
            );
        }
        let _ = swarm;
    }

    #[tokio::test]
    async fn test_monitor_last_updated_monotonic() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();
        let first = ctl.monitor(None).await.unwrap().last_updated;
        let second = ctl.monitor(None).await.unwrap().last_updated;
        assert!(second >= first);
    }

    #[tokio::test]
    async fn test_task_status_updates_enforce_machine() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();

        // Pending -> Running is invalid.
        let err = ctl
            .update_task_status(None, "t1", TaskStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidTransition { .. }));

        ctl.update_task_status(None, "t1", TaskStatus::Assigned).await.unwrap();
        ctl.update_task_status(None, "t1", TaskStatus::Running).await.unwrap();
        ctl.update_task_status(None, "t1", TaskStatus::Completed).await.unwrap();

        let err = ctl
            .update_task_status(None, "missing", TaskStatus::Assigned)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn test_recovery_strategy_table() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();

        let timeout = InstanceFailure::new("instance-0", FailureType::Timeout, "no heartbeat");
        let plan = ctl.handle_failure(&timeout).await.unwrap();
        assert_eq!(plan.recovery_strategy, RecoveryStrategy::Restart);
        assert_eq!(plan.estimated_recovery_time, Duration::from_secs(300));

        let resource = InstanceFailure::new("instance-0", FailureType::Resource, "oom");
        let plan = ctl.handle_failure(&resource).await.unwrap();
        assert_eq!(plan.recovery_strategy, RecoveryStrategy::ScaleUp);
        assert_eq!(plan.estimated_recovery_time, Duration::from_secs(900));

        let unrecoverable =
            InstanceFailure::new("instance-0", FailureType::Crash, "segfault").unrecoverable();
        let plan = ctl.handle_failure(&unrecoverable).await.unwrap();
        assert_eq!(plan.recovery_strategy, RecoveryStrategy::Manual);

        let repeat = InstanceFailure::new("instance-0", FailureType::Crash, "again")
            .with_recovery_attempts(1);
        let plan = ctl.handle_failure(&repeat).await.unwrap();
        assert_eq!(plan.recovery_strategy, RecoveryStrategy::Manual);

        assert_eq!(ctl.recovery_history().len(), 4);
    }

    #[tokio::test]
    async fn test_restart_recovery_resets_instance() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        let instance_id = swarm.instances.keys().next().unwrap().clone();
        ctl.record_heartbeat(None, &instance_id, Utc::now()).await.unwrap();

        let failure = InstanceFailure::new(&instance_id, FailureType::Timeout, "stuck");
        ctl.handle_failure(&failure).await.unwrap();

        let monitored = ctl.monitor(None).await.unwrap();
        let instance = &monitored.instances[&instance_id];
        assert_eq!(instance.status, InstanceStatus::Starting);
        assert!(instance.last_heartbeat.is_none());
    }

    #[tokio::test]
    async fn test_reassign_recovery_moves_tasks() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        let mut ids = swarm.instances.keys().cloned();
        let failed = ids.next().unwrap();
        let affected = swarm.task_assignments[&failed].clone();
        assert!(!affected.is_empty());

        let failure = InstanceFailure::new(&failed, FailureType::Crash, "gone")
            .with_affected_tasks(affected.clone());
        let plan = ctl.handle_failure(&failure).await.unwrap();
        assert_eq!(plan.recovery_strategy, RecoveryStrategy::Reassign);
        assert_eq!(plan.task_reassignments.len(), affected.len());

        let monitored = ctl.monitor(None).await.unwrap();
        for (task, target) in &plan.task_reassignments {
            assert!(monitored.task_assignments[target].contains(task));
            assert!(!monitored.task_assignments[&failed].contains(task));
        }
    }

    #[tokio::test]
    async fn test_failed_recovery_increments_counter() {
        let ctl = controller();
        // No swarm launched: automatic recovery cannot find the instance.
        let failure = InstanceFailure::new("instance-9", FailureType::Timeout, "lost");
        ctl.handle_failure(&failure).await.unwrap();
        assert_eq!(ctl.metrics().failed_recoveries, 1);
    }

    #[tokio::test]
    async fn test_integrate_with_no_completed_tasks() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();
        let report = ctl.integrate(None).await.unwrap();
        assert!(report.successful_integrations.is_empty());
        assert_eq!(report.summary, "No completed tasks ready for integration");
        assert!(report.integration_time > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_integrate_completed_tasks() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();
        for step in [TaskStatus::Assigned, TaskStatus::Running, TaskStatus::Completed] {
            ctl.update_task_status(None, "t4", step).await.unwrap();
        }

        let report = ctl.integrate(None).await.unwrap();
        assert_eq!(report.successful_integrations, vec!["t4".to_string()]);
        assert_eq!(report.summary, "Successfully integrated 1 tasks");
        assert_eq!(ctl.metrics().successful_integrations, 1);

        let monitored = ctl.monitor(None).await.unwrap();
        assert_eq!(monitored.integration_status.successful_integrations, 1);
        assert!(monitored.integration_status.last_integration.is_some());
    }

    #[tokio::test]
    async fn test_stop_swarm() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();
        let stopped = ctl.stop_swarm(None).await.unwrap();
        assert_eq!(stopped.status, SwarmStatus::Stopped);
        assert!(stopped
            .instances
            .values()
            .all(|i| i.status == InstanceStatus::Stopped));
    }

    #[tokio::test]
    async fn test_scale_swarm_up_and_bounds() {
        let ctl = controller();
        let swarm = ctl.launch(sample_tasks()).await.unwrap();
        let before = swarm.instances.len();

        let scaled = ctl.scale_swarm(None, before + 2).await.unwrap();
        assert_eq!(scaled.instances.len(), before + 2);
        assert_eq!(scaled.status, SwarmStatus::Active);

        let err = ctl.scale_swarm(None, 0).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
        let err = ctl
            .scale_swarm(None, ctl.config().max_instances + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
    }

    #[tokio::test]
    async fn test_emergency_shutdown_is_terminal() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();
        ctl.emergency_shutdown("resource ceiling breached").await;
        assert!(ctl.is_shut_down());

        for result in [
            ctl.launch(sample_tasks()).await.err(),
            ctl.monitor(None).await.err(),
            ctl.integrate(None).await.err(),
            ctl.distribute(&sample_tasks()).await.err(),
        ] {
            assert!(matches!(
                result,
                Some(OrchestrationError::SafetyViolation(_))
            ));
        }

        // Idempotent.
        ctl.emergency_shutdown("again").await;
        assert!(ctl.is_shut_down());
    }

    #[tokio::test]
    async fn test_module_status_counts() {
        let ctl = controller();
        ctl.launch(sample_tasks()).await.unwrap();
        let status = ctl.module_status();
        assert_eq!(status.name, "OrchestrationController");
        assert_eq!(status.performance_metrics["active_swarms"], json!(1));
        assert_eq!(
            status.performance_metrics["distribution_history_size"],
            json!(1)
        );
    }
}
