//! Swarm configuration.
//!
//! All bounds are enforced at load time by [`SwarmConfig::validate`];
//! a configuration that passes validation is safe to use everywhere else
//! without re-checking ranges.

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

use super::instance::{DeploymentTarget, ResourceLimits};

/// Task distribution strategy.
///
/// All four strategies currently share the round-robin slot assignment;
/// the enum is carried on configuration and stamped on every plan so
/// refinements can land without an API change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    RoundRobin,
    LoadBalanced,
    DependencyAware,
    CapabilityBased,
}

impl Default for DistributionStrategy {
    fn default() -> Self {
        Self::DependencyAware
    }
}

impl DistributionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LoadBalanced => "load_balanced",
            Self::DependencyAware => "dependency_aware",
            Self::CapabilityBased => "capability_based",
        }
    }
}

/// Integration policy for completed work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationPolicy {
    Immediate,
    Batch,
    Manual,
    QualityGated,
}

impl Default for IntegrationPolicy {
    fn default() -> Self {
        Self::QualityGated
    }
}

/// Communication protocol settings for the command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub protocol_type: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub batch_size: usize,
    pub compression_enabled: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            protocol_type: "text".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
            batch_size: 10,
            compression_enabled: false,
        }
    }
}

/// Configuration for a distributed swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Requested instance count, 1 to 50
    pub instance_count: usize,
    pub min_instances: usize,
    pub max_instances: usize,
    pub resource_limits: ResourceLimits,
    pub deployment_targets: Vec<DeploymentTarget>,
    pub task_distribution_strategy: DistributionStrategy,
    pub communication_protocol: ProtocolConfig,
    pub integration_policy: IntegrationPolicy,
    pub auto_scaling_enabled: bool,
    /// CPU percentage that triggers scaling, 10 to 95
    pub scaling_threshold_cpu: f64,
    /// Memory percentage that triggers scaling, 10 to 95
    pub scaling_threshold_memory: f64,
    /// Heartbeat check interval in seconds, 5 to 300
    pub health_check_interval: u64,
    /// Per-task timeout in seconds, at least 60
    pub task_timeout: u64,
    pub enable_visual_identification: bool,
    /// Root directory under which instance workspaces are created
    pub workspace_root: String,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            instance_count: 3,
            min_instances: 1,
            max_instances: 10,
            resource_limits: ResourceLimits::default(),
            deployment_targets: Vec::new(),
            task_distribution_strategy: DistributionStrategy::default(),
            communication_protocol: ProtocolConfig::default(),
            integration_policy: IntegrationPolicy::default(),
            auto_scaling_enabled: true,
            scaling_threshold_cpu: 70.0,
            scaling_threshold_memory: 80.0,
            health_check_interval: 30,
            task_timeout: 3600,
            enable_visual_identification: true,
            workspace_root: "/tmp/hivemind-workspaces".to_string(),
        }
    }
}

impl SwarmConfig {
    /// Validate every bounded field. Called at configuration load and again
    /// before each swarm launch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=50).contains(&self.instance_count) {
            return Err(ConfigError::invalid("instance_count", self.instance_count));
        }
        if self.min_instances < 1 {
            return Err(ConfigError::invalid("min_instances", self.min_instances));
        }
        if self.max_instances > 100 {
            return Err(ConfigError::invalid("max_instances", self.max_instances));
        }
        if self.min_instances > self.max_instances {
            return Err(ConfigError::InstanceBounds {
                min: self.min_instances,
                max: self.max_instances,
            });
        }
        if !(10.0..=95.0).contains(&self.scaling_threshold_cpu) {
            return Err(ConfigError::invalid(
                "scaling_threshold_cpu",
                self.scaling_threshold_cpu,
            ));
        }
        if !(10.0..=95.0).contains(&self.scaling_threshold_memory) {
            return Err(ConfigError::invalid(
                "scaling_threshold_memory",
                self.scaling_threshold_memory,
            ));
        }
        if !(5..=300).contains(&self.health_check_interval) {
            return Err(ConfigError::invalid(
                "health_check_interval",
                self.health_check_interval,
            ));
        }
        if self.task_timeout < 60 {
            return Err(ConfigError::invalid("task_timeout", self.task_timeout));
        }
        Ok(())
    }
}
