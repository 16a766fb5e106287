//! Data Transfer Objects
//!
//! Request and response types for the counter API.

use serde::{Deserialize, Serialize};

/// POST /count body
///
/// Both fields default to empty so a missing field is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct IncrementRequest {
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub site: String,
}

/// POST /count response
#[derive(Debug, Serialize, Deserialize)]
pub struct IncrementResponse {
    pub count: u64,
    pub incremented: bool,
}

/// GET /count/{page} response
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// `?site=` query parameter
#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    #[serde(default)]
    pub site: String,
}

/// GET /health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    /// Hashed visit records currently kept for debouncing
    pub visit_records: Option<u64>,
    pub uptime_seconds: u64,
    pub version: String,
}
