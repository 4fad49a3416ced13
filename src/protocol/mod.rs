//! Text command protocol: verb-noun-modifier commands, pattern
//! validation, natural-language fallback parsing, and dispatch.

pub mod command;
pub mod handler;
pub mod natural;
pub mod pattern;
pub mod result;

pub use command::{Command, Noun, ParamValue, Verb};
pub use handler::{ActionHandler, ExecutionStats, FnHandler, TextProtocolHandler};
pub use pattern::{default_patterns, CommandPattern, ValidationResult};
pub use result::ActionResult;
