//! Stats Routes
//!
//! - GET /stats?site=<host> - Totals and most viewed pages

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use super::with_db;
use crate::api::dto::SiteQuery;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::SiteStats;

/// Number of pages listed in `top_pages`
const TOP_PAGES: usize = 10;

/// GET /stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SiteQuery>,
) -> ApiResult<Json<SiteStats>> {
    let site = query.site.trim().to_string();
    if site.is_empty() {
        return Err(ApiError::Validation("Missing site parameter".to_string()));
    }

    let stats = with_db(&state, move |db| db.stats(&site, TOP_PAGES)).await?;
    Ok(Json(stats))
}
