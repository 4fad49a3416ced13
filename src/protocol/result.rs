//! Action results.
//!
//! Every executed command produces an [`ActionResult`] carrying the
//! outcome, timing, free-form data, and any side effects, correlated back
//! to the originating command.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The post-execution record of a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub data: Map<String, Value>,
    pub execution_time: Duration,
    pub side_effects: Vec<String>,
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>, execution_time: Duration, correlation_id: Uuid) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Map::new(),
            execution_time,
            side_effects: Vec::new(),
            correlation_id,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        message: impl Into<String>,
        execution_time: Duration,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            success: false,
            ..Self::ok(message, execution_time, correlation_id)
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_side_effect(mut self, effect: impl Into<String>) -> Self {
        self.side_effects.push(effect.into());
        self
    }

    /// Human-readable response form:
    ///
    /// ```text
    /// [SUCCESS] <message> (took <seconds.xx>s)
    /// Data: <json>
    /// Side effects: <csv>
    /// ```
    pub fn to_response_string(&self) -> String {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        let mut response = format!(
            "[{status}] {} (took {:.2}s)",
            self.message,
            self.execution_time.as_secs_f64()
        );
        if !self.data.is_empty() {
            response.push_str(&format!(
                "\nData: {}",
                Value::Object(self.data.clone())
            ));
        }
        if !self.side_effects.is_empty() {
            response.push_str(&format!("\nSide effects: {}", self.side_effects.join(", ")));
        }
        response
    }
}
