//! Distribution planner.
//!
//! Pure planning: dependency analysis, parallel grouping, instance-count
//! selection, and slot assignment. The planner never touches swarm state;
//! the controller owns all mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::config::SwarmConfig;
use crate::domain::models::plan::DistributionPlan;
use crate::domain::models::task::Task;

/// Plans task distribution across instance slots.
#[derive(Debug, Default, Clone, Copy)]
pub struct DistributionPlanner;

impl DistributionPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Produce a distribution plan for the given task batch.
    pub fn plan(&self, tasks: &[Task], config: &SwarmConfig) -> DistributionPlan {
        let graph = Self::build_dependency_graph(tasks);
        let parallel_groups = Self::parallel_groups(&graph);
        let instance_count = Self::optimal_instance_count(tasks, &parallel_groups, config);
        let instance_assignments = Self::assign_round_robin(tasks, instance_count);
        let estimated_completion_time =
            Self::estimate_completion_time(tasks, &instance_assignments);
        let critical_path = Self::critical_path(&graph, &parallel_groups);

        debug!(
            task_count = tasks.len(),
            instance_count,
            groups = parallel_groups.len(),
            strategy = config.task_distribution_strategy.as_str(),
            "Created distribution plan"
        );

        DistributionPlan {
            plan_id: Uuid::new_v4(),
            total_tasks: tasks.len(),
            instance_assignments,
            dependency_groups: parallel_groups.clone(),
            estimated_completion_time,
            parallel_execution_groups: parallel_groups,
            critical_path,
            created_at: Utc::now(),
            strategy_used: config.task_distribution_strategy,
        }
    }

    /// Map each task id to its dependencies. Dependencies pointing outside
    /// the batch are kept; the grouping step treats them as already
    /// satisfied.
    fn build_dependency_graph(tasks: &[Task]) -> BTreeMap<String, Vec<String>> {
        tasks
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect()
    }

    /// Iteratively extract the set of tasks whose dependencies lie outside
    /// the remaining set. When a cycle starves the extraction, one
    /// arbitrary remaining task is emitted alone to guarantee progress.
    fn parallel_groups(graph: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
        let mut groups = Vec::new();
        let mut remaining: BTreeSet<&str> = graph.keys().map(String::as_str).collect();

        while !remaining.is_empty() {
            let mut ready: Vec<String> = remaining
                .iter()
                .filter(|id| {
                    graph[**id]
                        .iter()
                        .all(|dep| !remaining.contains(dep.as_str()))
                })
                .map(|id| (*id).to_string())
                .collect();

            if ready.is_empty() {
                let stuck = remaining
                    .iter()
                    .next()
                    .map(|id| (*id).to_string())
                    .expect("remaining is nonempty");
                warn!(task_id = %stuck, "Dependency cycle detected, breaking it to make progress");
                ready.push(stuck);
            }

            for id in &ready {
                remaining.remove(id.as_str());
            }
            groups.push(ready);
        }

        groups
    }

    /// `min(widest group, configured count, max bound, task count)` raised
    /// to at least `min_instances`.
    fn optimal_instance_count(
        tasks: &[Task],
        parallel_groups: &[Vec<String>],
        config: &SwarmConfig,
    ) -> usize {
        let max_parallel = parallel_groups.iter().map(Vec::len).max().unwrap_or(1);
        let optimal = max_parallel
            .min(config.instance_count)
            .min(config.max_instances)
            .min(tasks.len().max(1));
        optimal.max(config.min_instances)
    }

    /// Round-robin slot assignment: task `i` goes to slot `i mod n`. Every
    /// task is assigned exactly once, and tasks adjacent in the batch (and
    /// therefore in the same parallel group for independent batches) land
    /// on distinct slots.
    fn assign_round_robin(tasks: &[Task], instance_count: usize) -> BTreeMap<String, Vec<String>> {
        let mut assignments: BTreeMap<String, Vec<String>> = (0..instance_count)
            .map(|i| (format!("instance-{i}"), Vec::new()))
            .collect();
        for (i, task) in tasks.iter().enumerate() {
            let slot = format!("instance-{}", i % instance_count);
            assignments
                .get_mut(&slot)
                .expect("slot exists by construction")
                .push(task.id.clone());
        }
        assignments
    }

    /// `max_tasks_per_instance × mean(estimated_duration)`.
    fn estimate_completion_time(
        tasks: &[Task],
        assignments: &BTreeMap<String, Vec<String>>,
    ) -> Duration {
        if tasks.is_empty() {
            return Duration::ZERO;
        }
        let max_per_instance = assignments.values().map(Vec::len).max().unwrap_or(0);
        let mean_duration = tasks
            .iter()
            .map(|t| t.estimated_duration_seconds as f64)
            .sum::<f64>()
            / tasks.len() as f64;
        Duration::from_secs_f64(max_per_instance as f64 * mean_duration)
    }

    /// Longest dependency chain, walked over the group ordering so that a
    /// broken cycle cannot recurse forever.
    fn critical_path(
        graph: &BTreeMap<String, Vec<String>>,
        parallel_groups: &[Vec<String>],
    ) -> Vec<String> {
        let mut depth: BTreeMap<&str, usize> = BTreeMap::new();
        let mut predecessor: BTreeMap<&str, &str> = BTreeMap::new();

        for group in parallel_groups {
            for id in group {
                let best = graph[id]
                    .iter()
                    .filter_map(|dep| depth.get(dep.as_str()).map(|d| (dep.as_str(), *d)))
                    .max_by_key(|(_, d)| *d);
                match best {
                    Some((dep, d)) => {
                        depth.insert(id.as_str(), d + 1);
                        predecessor.insert(id.as_str(), dep);
                    }
                    None => {
                        depth.insert(id.as_str(), 0);
                    }
                }
            }
        }

        let Some((end, _)) = depth.iter().max_by_key(|(_, d)| **d) else {
            return Vec::new();
        };
        let mut path = vec![(*end).to_string()];
        let mut current = *end;
        while let Some(pred) = predecessor.get(current) {
            path.push((*pred).to_string());
            current = *pred;
        }
        path.reverse();
        path
    }
}
