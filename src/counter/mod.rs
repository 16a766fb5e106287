//! Page View Counter Engine
//!
//! Client-side counting logic for documentation pages.
//!
//! ## Architecture
//!
//! - **path**: page identifier resolution
//! - **store / local**: debounced counting in an origin-scoped key-value store
//! - **remote / backend**: counter API client with fallback to local counting
//! - **render**: draws the counter into a [`PageSurface`]
//! - **controller**: activation cycle, navigation handling, notifications
//!
//! ## Flow
//!
//! 1. Page activation resolves the normalized path
//! 2. The configured backend records the visit and returns the count
//! 3. The count is rendered and a [`CounterUpdated`] event is emitted
//! 4. Navigation to a different path removes the counter and repeats
//!
//! Everything here is best-effort: failures are reported to the
//! [`CounterHook`] and never surface as errors to the caller.

mod backend;
mod clock;
mod controller;
mod events;
mod local;
mod location;
mod path;
mod remote;
mod render;
mod store;

pub use backend::{from_config as backend_from_config, CountBackend, LocalBackend, RemoteBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{ControllerState, CounterController, NavigationSignal};
pub use events::{CounterHook, CounterUpdated, Stage, TracingHook};
pub use local::LocalCounter;
pub use location::{LocationSource, SharedLocation};
pub use path::{normalize_page_path, PageId, KEY_PREFIX};
pub use remote::{RemoteConfig, RemoteCounter, RemoteError};
pub use render::{
    format_count, render_counter, Anchor, CounterFragment, PageModel, PageSurface,
    COUNTER_ELEMENT_ID, COUNTER_STYLES, COUNTER_STYLE_ID,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreResult};
