//! # Pagecount
//!
//! Privacy-friendly page view counter for documentation sites.
//!
//! ## Features
//!
//! - **Local counting**: debounced per-page counts in an origin-scoped store
//! - **Remote counting**: counter API client with automatic local fallback
//! - **Rendering**: "1,234 views" badge placed under the page heading
//! - **Navigation aware**: re-counts on single-page-app navigation
//! - **Counter service**: SQLite-backed HTTP API without cookies or
//!   personal data
//!
//! ## Modules
//!
//! - [`counter`]: Client-side counter engine
//! - [`api`]: Counter REST API with Axum
//! - [`storage`]: SQLite persistence for the API
//! - [`config`]: TOML / environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagecount::config::CounterConfig;
//! use pagecount::counter::*;
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CounterConfig::default();
//!     let store = Arc::new(FileStore::open("./local_storage.json")?);
//!     let local = Arc::new(LocalCounter::new(store, Arc::new(SystemClock), config.debounce_ms));
//!
//!     let page = Arc::new(Mutex::new(PageModel::documentation_page()));
//!     let controller = CounterController::new(
//!         config.clone(),
//!         backend_from_config(&config, local),
//!         page,
//!         Arc::new(SharedLocation::new("/docs/intro/")),
//!     );
//!
//!     if let Some(update) = controller.activate().await {
//!         println!("{} has {} views", update.page_path, update.count);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod counter;
pub mod storage;

// Re-export top-level types for convenience
pub use counter::{
    normalize_page_path, CountBackend, CounterController, CounterHook, CounterUpdated,
    FileStore, KeyValueStore, LocalCounter, MemoryStore, NavigationSignal, PageId, PageModel,
    PageSurface, RemoteCounter, RemoteError, StoreError,
};

pub use storage::{CounterDb, CounterPolicy, SiteStats, StorageError, StorageResult};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, CounterConfig, LoggingConfig, ServerConfig, StorageConfig};
