//! Counter storage types

use serde::Serialize;

/// Result of recording a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisitOutcome {
    /// Page count after the visit
    pub count: u64,
    /// False when the visit fell inside the debounce window
    pub incremented: bool,
}

/// One entry of the most-viewed list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPage {
    pub page: String,
    pub views: u64,
}

/// Aggregate numbers for one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    pub site: String,
    pub total_pages: u64,
    pub total_views: u64,
    pub top_pages: Vec<TopPage>,
}

/// Counting rules applied by the database
#[derive(Debug, Clone)]
pub struct CounterPolicy {
    /// A client is not counted twice for a page within this window
    pub debounce_ms: i64,
    /// Visit records older than this are purged
    pub retention_ms: i64,
    /// Purge when the new count is a multiple of this (0 disables)
    pub cleanup_every: u64,
}

impl Default for CounterPolicy {
    fn default() -> Self {
        Self {
            debounce_ms: 5 * 60 * 1000,
            retention_ms: 24 * 60 * 60 * 1000,
            cleanup_every: 100,
        }
    }
}

impl CounterPolicy {
    pub fn from_config(config: &crate::config::ServerConfig) -> Self {
        Self {
            debounce_ms: (config.debounce_minutes * 60 * 1000) as i64,
            retention_ms: (config.visit_retention_hours * 60 * 60 * 1000) as i64,
            cleanup_every: config.cleanup_every,
        }
    }
}
