//! Domain models for the orchestration system.

pub mod config;
pub mod instance;
pub mod plan;
pub mod recovery;
pub mod swarm;
pub mod task;

pub use config::{DistributionStrategy, IntegrationPolicy, ProtocolConfig, SwarmConfig};
pub use instance::{DeploymentTarget, Instance, InstanceStatus, IsolationLevel, ResourceLimits};
pub use plan::DistributionPlan;
pub use recovery::{FailureType, InstanceFailure, RecoveryPlan, RecoveryStrategy};
pub use swarm::{
    IntegrationReport, IntegrationStatus, SwarmMetrics, SwarmState, SwarmStatus,
};
pub use task::{Task, TaskStatus};
