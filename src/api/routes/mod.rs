//! API Routes
//!
//! Route handlers organized by functionality.

pub mod count;
pub mod health;
pub mod stats;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::storage::{CounterDb, StorageError, StorageResult};
use std::sync::Arc;

/// Run a database call on the blocking pool
pub(crate) async fn with_db<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&CounterDb) -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    let result = tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(StorageError::from)?;
    Ok(result?)
}
