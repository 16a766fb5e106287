//! Count backends
//!
//! A [`CountBackend`] turns a page identifier into a view count. Both
//! implementations are best-effort: they always produce a number.

use super::local::LocalCounter;
use super::path::PageId;
use super::remote::{RemoteConfig, RemoteCounter};
use crate::config::CounterConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of page view counts
#[async_trait]
pub trait CountBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Record a visit and return the resulting count
    async fn increment(&self, page: &PageId) -> u64;

    /// Current count without recording a visit
    async fn current(&self, page: &PageId) -> u64;
}

/// Pick the backend the configuration asks for
pub fn from_config(config: &CounterConfig, local: Arc<LocalCounter>) -> Arc<dyn CountBackend> {
    if config.use_local_counter {
        return Arc::new(LocalBackend::new(local));
    }

    let remote = config.api_endpoint.as_ref().and_then(|endpoint| {
        RemoteCounter::new(RemoteConfig {
            endpoint: endpoint.clone(),
            site: config.site.clone(),
            request_timeout_ms: config.request_timeout_ms,
        })
        .map_err(|e| tracing::debug!(error = %e, "Remote counter disabled"))
        .ok()
    });

    let backend = RemoteBackend::new(remote, local);
    if !backend.has_remote() {
        tracing::debug!("No usable counter API endpoint, counting locally");
    }
    Arc::new(backend)
}

/// Counts in the local key-value store only
pub struct LocalBackend {
    local: Arc<LocalCounter>,
}

impl LocalBackend {
    pub fn new(local: Arc<LocalCounter>) -> Self {
        Self { local }
    }
}

#[async_trait]
impl CountBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn increment(&self, page: &PageId) -> u64 {
        self.local.increment(page)
    }

    async fn current(&self, page: &PageId) -> u64 {
        self.local.get(page)
    }
}

/// Counts through the remote API, falling back to local counting
///
/// Without a remote client this behaves exactly like [`LocalBackend`].
pub struct RemoteBackend {
    remote: Option<RemoteCounter>,
    local: Arc<LocalCounter>,
}

impl RemoteBackend {
    pub fn new(remote: Option<RemoteCounter>, local: Arc<LocalCounter>) -> Self {
        Self { remote, local }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

#[async_trait]
impl CountBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn increment(&self, page: &PageId) -> u64 {
        if let Some(remote) = &self.remote {
            match remote.increment(page).await {
                Ok(count) => return count,
                Err(e) => {
                    tracing::debug!(
                        page = %page,
                        error = %e,
                        "Counter API not available, falling back to local counter"
                    );
                }
            }
        }
        self.local.increment(page)
    }

    async fn current(&self, page: &PageId) -> u64 {
        if let Some(remote) = &self.remote {
            match remote.fetch(page).await {
                Ok(count) => return count,
                Err(e) => {
                    tracing::debug!(
                        page = %page,
                        error = %e,
                        "Counter API not available, using local counter"
                    );
                }
            }
        }
        self.local.get(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::clock::ManualClock;
    use crate::counter::remote::RemoteConfig;
    use crate::counter::store::{KeyValueStore, MemoryStore};

    fn local(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> Arc<LocalCounter> {
        Arc::new(LocalCounter::new(store, clock, 3000))
    }

    fn unreachable_remote() -> RemoteCounter {
        RemoteCounter::new(RemoteConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            site: "localhost".to_string(),
            request_timeout_ms: 1000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_remote_matches_local_increment() {
        let clock = Arc::new(ManualClock::new(50_000));
        let page = PageId::from("/x");

        // Reference: plain local counting at the same time
        let reference_store = Arc::new(MemoryStore::new());
        let expected = local(reference_store.clone(), clock.clone()).increment(&page);

        let store = Arc::new(MemoryStore::new());
        let backend = RemoteBackend::new(Some(unreachable_remote()), local(store.clone(), clock));

        assert_eq!(backend.increment(&page).await, expected);
        assert_eq!(store.get(&page.count_key()).unwrap().as_deref(), Some("1"));
        assert_eq!(
            store.get(&page.last_visit_key()).unwrap(),
            reference_store.get(&page.last_visit_key()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_unreachable_remote_lookup_reads_local() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::new());
        let counter = local(store.clone(), clock);
        counter.increment(&PageId::from("/y"));

        let backend = RemoteBackend::new(Some(unreachable_remote()), counter);
        assert_eq!(backend.current(&PageId::from("/y")).await, 1);
        assert_eq!(backend.current(&PageId::from("/z")).await, 0);
    }

    #[tokio::test]
    async fn test_missing_endpoint_behaves_like_local() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = RemoteBackend::new(None, local(Arc::new(MemoryStore::new()), clock.clone()));
        let page = PageId::from("/docs");

        assert!(!backend.has_remote());
        assert_eq!(backend.increment(&page).await, 1);
        clock.advance(10);
        assert_eq!(backend.increment(&page).await, 1);
        assert_eq!(backend.current(&page).await, 1);
    }

    #[test]
    fn test_from_config_selects_backend() {
        let clock = Arc::new(ManualClock::new(0));
        let counter = local(Arc::new(MemoryStore::new()), clock);

        let backend = from_config(&CounterConfig::default(), counter.clone());
        assert_eq!(backend.name(), "local");

        let remote_config = CounterConfig {
            use_local_counter: false,
            api_endpoint: Some("http://127.0.0.1:1".to_string()),
            ..CounterConfig::default()
        };
        assert_eq!(from_config(&remote_config, counter).name(), "remote");
    }

    #[tokio::test]
    async fn test_local_backend() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = LocalBackend::new(local(Arc::new(MemoryStore::new()), clock));
        let page = PageId::from("/");

        assert_eq!(backend.name(), "local");
        assert_eq!(backend.current(&page).await, 0);
        assert_eq!(backend.increment(&page).await, 1);
        assert_eq!(backend.current(&page).await, 1);
    }
}
