//! Initialization / re-trigger controller
//!
//! Runs the activation sequence (resolve page, count, render, notify) on
//! page load and whenever navigation moves to a different page. Each
//! activation takes a new generation number; a count that arrives after a
//! newer activation started is dropped instead of rendered.

use super::backend::CountBackend;
use super::events::{CounterHook, CounterUpdated, Stage, TracingHook};
use super::location::LocationSource;
use super::path::{normalize_page_path, PageId};
use super::render::{render_counter, CounterFragment, PageSurface, COUNTER_ELEMENT_ID};
use crate::config::CounterConfig;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// What prompted a path-change check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSignal {
    /// Browser history navigation (back/forward)
    HistoryPop,
    /// App-level "location changed" notification
    LocationChanged,
    /// Periodic poll
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Active,
}

enum Rendered {
    Current,
    Stale,
}

/// Capacity of the update broadcast channel
const EVENT_CAPACITY: usize = 64;

/// Drives the counter for one page context
pub struct CounterController {
    config: CounterConfig,
    backend: Arc<dyn CountBackend>,
    surface: Arc<Mutex<dyn PageSurface>>,
    location: Arc<dyn LocationSource>,
    hook: Arc<dyn CounterHook>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    last_seen_path: Mutex<String>,
    events: broadcast::Sender<CounterUpdated>,
}

/// Marks the controller active for as long as it lives
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CounterController {
    pub fn new(
        config: CounterConfig,
        backend: Arc<dyn CountBackend>,
        surface: Arc<Mutex<dyn PageSurface>>,
        location: Arc<dyn LocationSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let last_seen_path = Mutex::new(normalize_page_path(&location.pathname()));

        Self {
            config,
            backend,
            surface,
            location,
            hook: Arc::new(TracingHook),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            last_seen_path,
            events,
        }
    }

    /// Replace the default tracing hook
    pub fn with_hook(mut self, hook: Arc<dyn CounterHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            ControllerState::Active
        } else {
            ControllerState::Idle
        }
    }

    /// Generation of the most recent activation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Subscribe to [`CounterUpdated`] notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CounterUpdated> {
        self.events.subscribe()
    }

    pub fn current_page(&self) -> PageId {
        PageId::from_location(&self.location.pathname())
    }

    /// Run one full activation cycle.
    ///
    /// Returns the emitted notification, or `None` when the cycle failed or
    /// its result went stale. Never panics the caller and never errors.
    pub async fn activate(&self) -> Option<CounterUpdated> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveGuard::enter(&self.in_flight);

        let page = self.current_page();
        *self.lock_last_seen() = page.as_str().to_string();

        // Run the backend in its own task so a panic there stays contained
        let backend = Arc::clone(&self.backend);
        let task_page = page.clone();
        let count = match tokio::spawn(async move { backend.increment(&task_page).await }).await {
            Ok(count) => count,
            Err(e) => {
                self.hook.on_failure(Stage::Count, page.as_str(), &e.to_string());
                return None;
            }
        };

        match self.render(count, generation) {
            Ok(Rendered::Current) => {}
            Ok(Rendered::Stale) => {
                self.hook.on_stale(page.as_str(), generation);
                return None;
            }
            Err(message) => {
                self.hook.on_failure(Stage::Render, page.as_str(), &message);
                return None;
            }
        }

        let event = CounterUpdated {
            count,
            page_path: page.to_string(),
        };
        self.hook.on_updated(&event);
        // No subscribers is fine
        let _ = self.events.send(event.clone());

        Some(event)
    }

    /// Force a full re-initialization cycle
    pub async fn refresh_counter(&self) -> Option<CounterUpdated> {
        self.activate().await
    }

    /// Current count for `page_path` (or the current page) without counting
    pub async fn current_count(&self, page_path: Option<&str>) -> u64 {
        let page = match page_path {
            Some(path) => PageId::from_location(path),
            None => self.current_page(),
        };
        self.backend.current(&page).await
    }

    /// React to a navigation signal.
    ///
    /// Re-activates only when the normalized path differs from the last one
    /// seen; returns whether it did.
    pub async fn handle_navigation(&self, signal: NavigationSignal) -> bool {
        let current = normalize_page_path(&self.location.pathname());
        let previous = {
            let mut last_seen = self.lock_last_seen();
            if *last_seen == current {
                return false;
            }
            std::mem::replace(&mut *last_seen, current.clone())
        };

        tracing::debug!(?signal, from = %previous, to = %current, "Page path changed");

        // Results still in flight for the previous page are stale from here on
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.remove_counter();

        if self.config.navigation_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.navigation_delay_ms)).await;
        }

        self.activate().await;
        true
    }

    /// Remove every rendered counter element
    pub fn remove_counter(&self) -> usize {
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        while surface.remove_element(COUNTER_ELEMENT_ID) {
            removed += 1;
        }
        removed
    }

    /// Start the controller: activate for the current page, then follow
    /// navigation signals and the fallback poll until `signals` closes.
    pub fn spawn(self: Arc<Self>, mut signals: mpsc::Receiver<NavigationSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.activate().await;

            let mut ticker = poll_ticker(self.config.poll_interval_ms);

            loop {
                tokio::select! {
                    signal = signals.recv() => match signal {
                        Some(signal) => self.dispatch(signal),
                        None => break,
                    },
                    _ = next_tick(&mut ticker) => self.dispatch(NavigationSignal::Poll),
                }
            }

            tracing::debug!("Page counter navigation loop stopped");
        })
    }

    /// Handle a signal without blocking the loop on in-flight counts
    fn dispatch(self: &Arc<Self>, signal: NavigationSignal) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.handle_navigation(signal).await;
        });
    }

    /// Draw the counter unless `generation` has been superseded.
    ///
    /// The generation is checked while holding the surface lock, so a
    /// navigation that removes the counter cannot interleave with a render.
    fn render(&self, count: u64, generation: u64) -> Result<Rendered, String> {
        let mut surface = self
            .surface
            .lock()
            .map_err(|_| "page surface lock poisoned".to_string())?;
        if self.generation() != generation {
            return Ok(Rendered::Stale);
        }
        let fragment = CounterFragment::new(count);
        let anchor = render_counter(&mut *surface, &fragment, self.config.show_counter);
        tracing::trace!(count, ?anchor, "Counter rendered");
        Ok(Rendered::Current)
    }

    fn lock_last_seen(&self) -> std::sync::MutexGuard<'_, String> {
        self.last_seen_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn poll_ticker(interval_ms: u64) -> Option<Interval> {
    if interval_ms == 0 {
        return None;
    }
    let period = Duration::from_millis(interval_ms);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::backend::LocalBackend;
    use crate::counter::clock::ManualClock;
    use crate::counter::local::LocalCounter;
    use crate::counter::location::SharedLocation;
    use crate::counter::render::PageModel;
    use crate::counter::store::{KeyValueStore, MemoryStore};
    use async_trait::async_trait;

    fn config() -> CounterConfig {
        CounterConfig {
            navigation_delay_ms: 0,
            poll_interval_ms: 0,
            ..CounterConfig::default()
        }
    }

    struct Fixture {
        controller: Arc<CounterController>,
        page: Arc<Mutex<PageModel>>,
        location: SharedLocation,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(config: CounterConfig, start: &str) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let local = Arc::new(LocalCounter::new(store.clone(), clock.clone(), config.debounce_ms));
        let page = Arc::new(Mutex::new(PageModel::documentation_page()));
        let location = SharedLocation::new(start);

        let controller = Arc::new(CounterController::new(
            config,
            Arc::new(LocalBackend::new(local)),
            page.clone(),
            Arc::new(location.clone()),
        ));

        Fixture {
            controller,
            page,
            location,
            store,
            clock,
        }
    }

    fn shown(page: &Arc<Mutex<PageModel>>) -> Vec<u64> {
        page.lock()
            .unwrap()
            .fragments()
            .iter()
            .map(|(_, f)| f.count)
            .collect()
    }

    #[tokio::test]
    async fn test_activation_renders_and_notifies() {
        let f = fixture(config(), "/docs/intro/");
        let mut events = f.controller.subscribe();

        let event = f.controller.activate().await.unwrap();
        assert_eq!(event.count, 1);
        assert_eq!(event.page_path, "/docs/intro");
        assert_eq!(events.recv().await.unwrap(), event);
        assert_eq!(shown(&f.page), vec![1]);
        assert_eq!(f.controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_reload_within_debounce_keeps_count() {
        let f = fixture(config(), "/docs/intro/");

        assert_eq!(f.controller.activate().await.unwrap().count, 1);
        f.clock.advance(500);
        assert_eq!(f.controller.refresh_counter().await.unwrap().count, 1);
        f.clock.advance(3500);
        assert_eq!(f.controller.refresh_counter().await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_path_change_replaces_counter() {
        let f = fixture(config(), "/a");
        f.store.set("pageCounter_/b", "7").unwrap();

        f.controller.activate().await;
        assert_eq!(shown(&f.page), vec![1]);

        f.location.set("/b/");
        assert!(f.controller.handle_navigation(NavigationSignal::LocationChanged).await);

        // Old element gone, new one reflects /b
        assert_eq!(shown(&f.page), vec![8]);
        assert_eq!(f.controller.current_count(Some("/b")).await, 8);
        assert_eq!(f.controller.current_count(Some("/a")).await, 1);
    }

    #[tokio::test]
    async fn test_same_path_navigation_is_ignored() {
        let f = fixture(config(), "/a/");
        f.controller.activate().await;

        f.location.set("/a");
        assert!(!f.controller.handle_navigation(NavigationSignal::HistoryPop).await);
        assert_eq!(shown(&f.page), vec![1]);
    }

    #[tokio::test]
    async fn test_hidden_counter_still_notifies() {
        let f = fixture(
            CounterConfig {
                show_counter: false,
                ..config()
            },
            "/quiet",
        );

        let event = f.controller.activate().await.unwrap();
        assert_eq!(event.count, 1);
        assert!(shown(&f.page).is_empty());
    }

    #[tokio::test]
    async fn test_current_count_does_not_increment() {
        let f = fixture(config(), "/");
        assert_eq!(f.controller.current_count(None).await, 0);
        f.controller.activate().await;
        assert_eq!(f.controller.current_count(None).await, 1);
        assert_eq!(f.controller.current_count(None).await, 1);
    }

    /// Backend whose answer for `/slow` arrives late
    struct SlowBackend;

    #[async_trait]
    impl CountBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn increment(&self, page: &PageId) -> u64 {
            if page.as_str() == "/slow" {
                tokio::time::sleep(Duration::from_millis(200)).await;
                100
            } else {
                1
            }
        }

        async fn current(&self, _page: &PageId) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let page = Arc::new(Mutex::new(PageModel::documentation_page()));
        let location = SharedLocation::new("/slow");
        let controller = Arc::new(CounterController::new(
            config(),
            Arc::new(SlowBackend),
            page.clone(),
            Arc::new(location.clone()),
        ));

        let slow = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.activate().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.state(), ControllerState::Active);

        location.set("/fast");
        let fast = controller.activate().await.unwrap();
        assert_eq!(fast.page_path, "/fast");

        assert!(slow.await.unwrap().is_none());
        assert_eq!(shown(&page), vec![1]);
        assert_eq!(controller.generation(), 2);
    }

    #[tokio::test]
    async fn test_result_arriving_during_navigation_delay_is_discarded() {
        let page = Arc::new(Mutex::new(PageModel::documentation_page()));
        let location = SharedLocation::new("/slow");
        let controller = Arc::new(CounterController::new(
            CounterConfig {
                navigation_delay_ms: 400,
                ..config()
            },
            Arc::new(SlowBackend),
            page.clone(),
            Arc::new(location.clone()),
        ));
        let mut events = controller.subscribe();

        let slow = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.activate().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The slow count lands while navigation is still settling
        location.set("/fast");
        assert!(controller.handle_navigation(NavigationSignal::LocationChanged).await);

        assert!(slow.await.unwrap().is_none());
        assert_eq!(shown(&page), vec![1]);
        assert_eq!(events.recv().await.unwrap().page_path, "/fast");
        assert!(events.try_recv().is_err());
    }

    struct PanickingBackend;

    #[async_trait]
    impl CountBackend for PanickingBackend {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn increment(&self, _page: &PageId) -> u64 {
            panic!("backend exploded")
        }

        async fn current(&self, _page: &PageId) -> u64 {
            0
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        failures: Mutex<Vec<Stage>>,
    }

    impl CounterHook for RecordingHook {
        fn on_failure(&self, stage: Stage, _page_path: &str, _message: &str) {
            self.failures.lock().unwrap().push(stage);
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_contained() {
        let hook = Arc::new(RecordingHook::default());
        let page = Arc::new(Mutex::new(PageModel::documentation_page()));
        let controller = CounterController::new(
            config(),
            Arc::new(PanickingBackend),
            page.clone(),
            Arc::new(SharedLocation::new("/boom")),
        )
        .with_hook(hook.clone());

        assert!(controller.activate().await.is_none());
        assert_eq!(*hook.failures.lock().unwrap(), vec![Stage::Count]);
        assert!(shown(&page).is_empty());
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_navigation_loop_with_signals_and_polling() {
        let f = fixture(
            CounterConfig {
                poll_interval_ms: 20,
                ..config()
            },
            "/a",
        );
        let mut events = f.controller.subscribe();
        let (tx, rx) = mpsc::channel(8);
        let handle = Arc::clone(&f.controller).spawn(rx);

        let first = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.page_path, "/a");

        // Picked up by the poll, no signal sent
        f.location.set("/b");
        let second = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.page_path, "/b");

        // Explicit signal
        f.location.set("/c");
        tx.send(NavigationSignal::LocationChanged).await.unwrap();
        let third = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(third.page_path, "/c");

        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shown(&f.page), vec![1]);
    }
}
