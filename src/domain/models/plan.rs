//! Distribution plan model.
//!
//! The planner's pure output: tasks mapped to instance slots plus the
//! parallel-group ordering that constrains when each task may start.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::DistributionStrategy;

/// Task distribution plan for swarm execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub plan_id: Uuid,
    pub total_tasks: usize,
    /// instance slot → assigned task ids
    pub instance_assignments: BTreeMap<String, Vec<String>>,
    /// Raw dependency groups as extracted from the graph
    pub dependency_groups: Vec<Vec<String>>,
    pub estimated_completion_time: Duration,
    /// Ordered waves; tasks within one wave may start in any order, tasks
    /// in later waves never start before all predecessors complete
    pub parallel_execution_groups: Vec<Vec<String>>,
    /// Longest dependency chain through the batch
    pub critical_path: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub strategy_used: DistributionStrategy,
}

impl DistributionPlan {
    /// Number of tasks assigned across all slots.
    pub fn assigned_task_count(&self) -> usize {
        self.instance_assignments.values().map(Vec::len).sum()
    }

    /// Sum of assignments must equal `total_tasks`.
    pub fn check_invariants(&self) -> Result<(), String> {
        let assigned = self.assigned_task_count();
        if assigned != self.total_tasks {
            return Err(format!(
                "Plan assigns {assigned} tasks but total_tasks is {}",
                self.total_tasks
            ));
        }
        Ok(())
    }
}
