//! Orchestration layer: distribution planning, the controller, built-in
//! protocol handlers, and the cooperative resource monitor.

pub mod controller;
pub mod handlers;
pub mod monitor;
pub mod planner;

pub use controller::{
    ControllerMetrics, ImmediateIntegration, IntegrationOutcome, IntegrationStrategy,
    OrchestrationController,
};
pub use handlers::register_builtin_handlers;
pub use monitor::{MonitorLimits, ResourceEvent, ResourceMonitor, ResourceStatus, UsageSample};
pub use planner::DistributionPlanner;
