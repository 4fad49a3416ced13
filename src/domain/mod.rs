//! Domain layer: core models, errors, and the reflective module contract.

pub mod error;
pub mod models;
pub mod reflective;

pub use error::{ConfigError, OrchestrationError, ProtocolError};
