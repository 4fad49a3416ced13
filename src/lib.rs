//! Hivemind - distributed multi-instance orchestration controller.
//!
//! A controller for fan-out execution of software-engineering tasks across
//! a swarm of worker instances:
//! - Task distribution planning over dependency graphs
//! - Swarm lifecycle, health monitoring, and failure recovery
//! - A human-readable verb-noun-modifier text command protocol
//! - A uniform reflective-module status/health contract

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod orchestration;
pub mod protocol;

// Re-export key types for convenience
pub use domain::models::{SwarmConfig, SwarmState, Task};
pub use domain::reflective::ReflectiveModule;
pub use orchestration::OrchestrationController;
pub use protocol::TextProtocolHandler;
