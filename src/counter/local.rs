//! Local counting
//!
//! Counts visits in a [`KeyValueStore`] with a per-page debounce window.
//! Storage failures never reach the caller: the counter switches to an
//! in-memory store that starts from zero and keeps counting there.

use super::clock::Clock;
use super::path::PageId;
use super::store::{KeyValueStore, MemoryStore, StoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Debounced visit counter over a key-value store
pub struct LocalCounter {
    store: Arc<dyn KeyValueStore>,
    fallback: MemoryStore,
    degraded: AtomicBool,
    clock: Arc<dyn Clock>,
    debounce_ms: u64,
}

impl LocalCounter {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, debounce_ms: u64) -> Self {
        Self {
            store,
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(false),
            clock,
            debounce_ms,
        }
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    /// Whether a storage failure has switched counting to memory
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Count a visit unless one was accepted within the debounce window.
    ///
    /// Returns the count after the visit; a debounced visit returns the
    /// stored count unchanged and leaves the last-visit time alone.
    pub fn increment(&self, page: &PageId) -> u64 {
        let now = self.clock.now_millis();

        if !self.is_degraded() {
            match increment_in(self.store.as_ref(), page, now, self.debounce_ms) {
                Ok(count) => return count,
                Err(e) => {
                    tracing::debug!(page = %page, error = %e, "Local storage failed, counting in memory");
                    self.degraded.store(true, Ordering::Relaxed);
                }
            }
        }

        // MemoryStore without quota cannot fail
        increment_in(&self.fallback, page, now, self.debounce_ms).unwrap_or(0)
    }

    /// Stored count for a page, 0 if absent. Never writes.
    pub fn get(&self, page: &PageId) -> u64 {
        if !self.is_degraded() {
            match read_count(self.store.as_ref(), page) {
                Ok(count) => return count,
                Err(e) => {
                    tracing::debug!(page = %page, error = %e, "Local storage read failed");
                }
            }
        }
        read_count(&self.fallback, page).unwrap_or(0)
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(value: Option<String>) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

fn read_count(store: &dyn KeyValueStore, page: &PageId) -> StoreResult<u64> {
    Ok(parse_or_zero(store.get(&page.count_key())?))
}

fn increment_in(
    store: &dyn KeyValueStore,
    page: &PageId,
    now: i64,
    debounce_ms: u64,
) -> StoreResult<u64> {
    let last_visit: Option<i64> = store
        .get(&page.last_visit_key())?
        .and_then(|v| v.trim().parse().ok());

    let accepted = match last_visit {
        None => true,
        Some(last) => now.saturating_sub(last) > debounce_ms as i64,
    };

    let previous = store.get(&page.count_key())?;
    let current: u64 = parse_or_zero(previous.clone());
    if !accepted {
        tracing::trace!(page = %page, count = current, "Visit debounced");
        return Ok(current);
    }

    let count = current + 1;
    store.set(&page.count_key(), &count.to_string())?;
    if let Err(e) = store.set(&page.last_visit_key(), &now.to_string()) {
        // A count without its visit time would escape the debounce later
        let restored = match &previous {
            Some(value) => store.set(&page.count_key(), value),
            None => store.remove(&page.count_key()).map(|_| ()),
        };
        if let Err(rollback) = restored {
            tracing::debug!(page = %page, error = %rollback, "Failed to roll back count");
        }
        return Err(e);
    }
    Ok(count)
}
