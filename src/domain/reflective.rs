//! Reflective module contract.
//!
//! Every long-lived component exposes the same small status/health surface
//! so monitoring callers can treat the protocol handler, the orchestration
//! controller, and any future subsystem uniformly.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum retained health indicators per module.
pub const INDICATOR_CAPACITY: usize = 100;

/// Window, in seconds, within which a critical indicator marks the module
/// unhealthy.
const CRITICAL_WINDOW_SECS: i64 = 300;

/// Severity of a health indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStatus {
    Healthy,
    Warning,
    Critical,
}

impl IndicatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// A single health observation recorded by a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIndicator {
    pub name: String,
    pub status: IndicatorStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub details: Map<String, Value>,
}

impl HealthIndicator {
    pub fn new(
        name: impl Into<String>,
        status: IndicatorStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            details: Map::new(),
        }
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Overall module state as reported by [`ModuleStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Active,
    Error,
}

/// Snapshot of a module's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub name: String,
    pub version: String,
    pub state: ModuleState,
    /// Uptime in seconds since module construction.
    pub uptime_seconds: f64,
    pub last_activity: DateTime<Utc>,
    pub health_indicators: Vec<HealthIndicator>,
    pub performance_metrics: Map<String, Value>,
}

/// Uniform status/health contract for long-lived components.
pub trait ReflectiveModule {
    /// Current status snapshot. Must be cheap and never block.
    fn module_status(&self) -> ModuleStatus;

    /// True iff no critical indicator was recorded within the last 5 minutes.
    fn is_healthy(&self) -> bool;

    /// Recorded indicators, most recent first, bounded to
    /// [`INDICATOR_CAPACITY`] entries.
    fn health_indicators(&self) -> Vec<HealthIndicator>;

    /// Update the last-activity timestamp to now.
    fn note_activity(&self);
}

/// Fixed-capacity ring buffer. Insertion past the capacity drops the oldest
/// entry.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Contents in insertion order (oldest first).
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[derive(Debug)]
struct TrackerInner {
    last_activity: DateTime<Utc>,
    indicators: RingBuffer<HealthIndicator>,
}

/// Shared bookkeeping behind every [`ReflectiveModule`] implementation.
///
/// Components embed a tracker and delegate the trait methods to it, adding
/// their own synthetic indicators and performance metrics on top. All
/// sections are short and lock-only, so the trait contract of never
/// blocking holds.
#[derive(Debug)]
pub struct HealthTracker {
    name: String,
    version: String,
    start_time: DateTime<Utc>,
    inner: Mutex<TrackerInner>,
}

impl HealthTracker {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            version: version.into(),
            start_time: now,
            inner: Mutex::new(TrackerInner {
                last_activity: now,
                indicators: RingBuffer::new(INDICATOR_CAPACITY),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn note_activity(&self) {
        let mut inner = self.inner.lock().expect("health tracker poisoned");
        inner.last_activity = Utc::now();
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.inner.lock().expect("health tracker poisoned").last_activity
    }

    pub fn uptime_seconds(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.start_time);
        elapsed.num_milliseconds() as f64 / 1000.0
    }

    /// Record an indicator, dropping the oldest past the capacity.
    pub fn record(&self, indicator: HealthIndicator) {
        let mut inner = self.inner.lock().expect("health tracker poisoned");
        inner.indicators.push(indicator);
    }

    /// Recorded indicators, most recent first.
    pub fn indicators(&self) -> Vec<HealthIndicator> {
        let inner = self.inner.lock().expect("health tracker poisoned");
        let mut items = inner.indicators.snapshot();
        items.reverse();
        items
    }

    /// No critical indicator within the last [`CRITICAL_WINDOW_SECS`].
    pub fn is_healthy(&self) -> bool {
        let now = Utc::now();
        let inner = self.inner.lock().expect("health tracker poisoned");
        let has_recent_critical = inner.indicators.iter().any(|ind| {
            ind.status == IndicatorStatus::Critical
                && now.signed_duration_since(ind.timestamp).num_seconds() < CRITICAL_WINDOW_SECS
        });
        !has_recent_critical
    }

    /// Assemble a [`ModuleStatus`] from the tracker plus caller-supplied
    /// indicators and metrics.
    pub fn status(
        &self,
        indicators: Vec<HealthIndicator>,
        performance_metrics: Map<String, Value>,
    ) -> ModuleStatus {
        let state = if self.is_healthy() {
            ModuleState::Active
        } else {
            ModuleState::Error
        };
        ModuleStatus {
            name: self.name.clone(),
            version: self.version.clone(),
            state,
            uptime_seconds: self.uptime_seconds(),
            last_activity: self.last_activity(),
            health_indicators: indicators,
            performance_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_ring_buffer_drops_oldest_past_capacity() {
        let mut ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.snapshot(), vec![2, 3, 4]);
    }

    #[test]
    fn test_ring_buffer_under_capacity() {
        let mut ring = RingBuffer::new(10);
        ring.push("a");
        ring.push("b");
        assert!(!ring.is_empty());
        assert_eq!(ring.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_indicator_buffer_bounded() {
        let tracker = HealthTracker::new("test", "1.0.0");
        for i in 0..(INDICATOR_CAPACITY + 20) {
            tracker.record(HealthIndicator::new(
                format!("ind-{i}"),
                IndicatorStatus::Healthy,
                "ok",
            ));
        }
        let indicators = tracker.indicators();
        assert_eq!(indicators.len(), INDICATOR_CAPACITY);
        // Most recent first.
        assert_eq!(
            indicators[0].name,
            format!("ind-{}", INDICATOR_CAPACITY + 19)
        );
    }

    #[test]
    fn test_healthy_without_critical() {
        let tracker = HealthTracker::new("test", "1.0.0");
        tracker.record(HealthIndicator::new("a", IndicatorStatus::Warning, "meh"));
        assert!(tracker.is_healthy());
    }

    #[test]
    fn test_recent_critical_marks_unhealthy() {
        let tracker = HealthTracker::new("test", "1.0.0");
        tracker.record(HealthIndicator::new("boom", IndicatorStatus::Critical, "bad"));
        assert!(!tracker.is_healthy());
    }

    #[test]
    fn test_old_critical_ages_out() {
        let tracker = HealthTracker::new("test", "1.0.0");
        let mut stale = HealthIndicator::new("boom", IndicatorStatus::Critical, "bad");
        stale.timestamp = Utc::now() - Duration::seconds(CRITICAL_WINDOW_SECS + 10);
        tracker.record(stale);
        assert!(tracker.is_healthy());
    }

    #[test]
    fn test_note_activity_advances() {
        let tracker = HealthTracker::new("test", "1.0.0");
        let before = tracker.last_activity();
        tracker.note_activity();
        assert!(tracker.last_activity() >= before);
    }

    #[test]
    fn test_indicator_details() {
        let ind = HealthIndicator::new("x", IndicatorStatus::Warning, "msg")
            .with_detail("error", serde_json::json!("timeout"));
        assert_eq!(ind.details["error"], serde_json::json!("timeout"));
        assert_eq!(ind.status.as_str(), "warning");
    }

    #[test]
    fn test_status_reflects_health() {
        let tracker = HealthTracker::new("mod", "2.0.0");
        let status = tracker.status(tracker.indicators(), Map::new());
        assert_eq!(status.name, "mod");
        assert_eq!(status.version, "2.0.0");
        assert_eq!(status.state, ModuleState::Active);
        assert!(status.uptime_seconds >= 0.0);

        tracker.record(HealthIndicator::new("x", IndicatorStatus::Critical, "bad"));
        let status = tracker.status(tracker.indicators(), Map::new());
        assert_eq!(status.state, ModuleState::Error);
    }
}
