//! Counter Storage
//!
//! SQLite persistence for the counter API:
//!
//! - **db**: page counts, debounce records and statistics
//! - **types**: visit outcomes, statistics, counting policy
//! - **error**: Error types
//!
//! Only page paths, counts and salted hashes of client addresses are
//! stored. Hashes are purged once they leave the retention window.

pub mod db;
pub mod error;
pub mod types;

pub use db::CounterDb;
pub use error::{StorageError, StorageResult};
pub use types::{CounterPolicy, SiteStats, TopPage, VisitOutcome};
