//! Current page location

use std::sync::{Arc, PoisonError, RwLock};

/// Source of the current location path (what `location.pathname` reports)
pub trait LocationSource: Send + Sync {
    fn pathname(&self) -> String;
}

/// Location shared between the navigator and the controller
#[derive(Debug, Clone)]
pub struct SharedLocation {
    path: Arc<RwLock<String>>,
}

impl SharedLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Arc::new(RwLock::new(path.into())),
        }
    }

    /// Navigate to `path`
    pub fn set(&self, path: impl Into<String>) {
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = path.into();
    }
}

impl Default for SharedLocation {
    fn default() -> Self {
        Self::new("/")
    }
}

impl LocationSource for SharedLocation {
    fn pathname(&self) -> String {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
