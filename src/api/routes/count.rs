//! Count Routes
//!
//! - POST /count - Record a visit and return the page count
//! - GET /count/{page} - Read a page count without recording a visit

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;

use super::with_db;
use crate::api::client::{client_ip, hash_ip};
use crate::api::dto::{CountResponse, IncrementRequest, IncrementResponse, SiteQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// Longest page path accepted
const MAX_PAGE_LEN: usize = 2048;

/// POST /count
///
/// Record a visit. Repeat visits from the same client inside the debounce
/// window return the current count with `incremented: false`.
pub async fn increment_counter(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<IncrementRequest>, JsonRejection>,
) -> ApiResult<Json<IncrementResponse>> {
    let Json(req) = payload?;

    let site = req.site.trim().to_string();
    let page = req.page.trim().to_string();
    if site.is_empty() || page.is_empty() {
        return Err(ApiError::Validation("Missing site or page".to_string()));
    }
    if page.len() > MAX_PAGE_LEN {
        return Err(ApiError::Validation(format!(
            "Page path exceeds maximum length of {} characters",
            MAX_PAGE_LEN
        )));
    }

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let ip_hash = hash_ip(&ip, &state.config.ip_salt);
    let now = Utc::now().timestamp_millis();

    let outcome = {
        let (site, page) = (site.clone(), page.clone());
        with_db(&state, move |db| db.record_visit(&site, &page, &ip_hash, now)).await?
    };

    tracing::debug!(
        site = %site,
        page = %page,
        count = outcome.count,
        incremented = outcome.incremented,
        "Visit recorded"
    );

    Ok(Json(IncrementResponse {
        count: outcome.count,
        incremented: outcome.incremented,
    }))
}

/// GET /count/{page}?site=<host>
pub async fn get_counter(
    State(state): State<Arc<AppState>>,
    Path(page_path): Path<String>,
    Query(query): Query<SiteQuery>,
) -> ApiResult<Json<CountResponse>> {
    let site = query.site.trim().to_string();
    if site.is_empty() {
        return Err(ApiError::Validation("Missing site parameter".to_string()));
    }

    let page = if page_path.starts_with('/') {
        page_path
    } else {
        format!("/{}", page_path)
    };

    let count = with_db(&state, move |db| db.get_count(&site, &page)).await?;
    Ok(Json(CountResponse { count }))
}
