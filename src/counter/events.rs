//! Notification events and telemetry hooks

use serde::Serialize;
use std::fmt;

/// Fired after every successful activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterUpdated {
    pub count: u64,
    pub page_path: String,
}

/// Activation step that went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Count,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Count => f.write_str("count"),
            Stage::Render => f.write_str("render"),
        }
    }
}

/// Receives counter lifecycle notifications
///
/// Every method has a no-op default, so hooks implement only what they need.
pub trait CounterHook: Send + Sync {
    fn on_updated(&self, _event: &CounterUpdated) {}

    /// A result was dropped because a newer activation started
    fn on_stale(&self, _page_path: &str, _generation: u64) {}

    fn on_failure(&self, _stage: Stage, _page_path: &str, _message: &str) {}
}

/// Default hook: structured debug logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl CounterHook for TracingHook {
    fn on_updated(&self, event: &CounterUpdated) {
        tracing::debug!(page = %event.page_path, count = event.count, "Page counter updated");
    }

    fn on_stale(&self, page_path: &str, generation: u64) {
        tracing::debug!(page = %page_path, generation, "Discarded stale counter result");
    }

    fn on_failure(&self, stage: Stage, page_path: &str, message: &str) {
        tracing::debug!(page = %page_path, stage = %stage, error = %message, "Failed to initialize page counter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_camel_case() {
        let event = CounterUpdated {
            count: 4,
            page_path: "/docs".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"count": 4, "pagePath": "/docs"}));
    }
}
