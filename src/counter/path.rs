//! Page identifier resolution
//!
//! Turns a browser location path into the key every count is stored under.

use std::fmt;

/// Prefix shared by every local storage key
pub const KEY_PREFIX: &str = "pageCounter_";

/// Normalize a location path for consistent counting.
///
/// The root path `/` is kept as-is; any other path loses its trailing
/// slashes. An empty path is the root.
pub fn normalize_page_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalized page path used as the storage and remote lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(String);

impl PageId {
    /// Build a page identifier from the current location path
    pub fn from_location(path: &str) -> Self {
        Self(normalize_page_path(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key holding the visit count, e.g. `pageCounter_/docs/intro`
    pub fn count_key(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.0)
    }

    /// Key holding the last accepted visit time in epoch milliseconds
    pub fn last_visit_key(&self) -> String {
        format!("{}{}_lastVisit", KEY_PREFIX, self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(path: &str) -> Self {
        Self::from_location(path)
    }
}

impl AsRef<str> for PageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
