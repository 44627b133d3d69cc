//! Callback plumbing for cache progress and failure reporting.
//!
//! Callbacks are invoked from whichever thread detected the event (a consumer
//! read or the fetch worker) and must not block.

use std::fmt;
use std::sync::Arc;

use crate::error::ProxyCacheError;

/// Callback invoked when the cached percentage of the resource changes.
pub type OnPercentChanged = Arc<dyn Fn(u8) + Send + Sync>;

/// Callback invoked when a fetch or shutdown error is detected.
pub type OnCacheError = Arc<dyn Fn(&ProxyCacheError) + Send + Sync>;

/// Optional listener bundle for a [`ProxyCache`](crate::ProxyCache).
///
/// Every callback defaults to a no-op.
#[derive(Clone, Default)]
pub struct CacheCallbacks {
    pub on_percent_changed: Option<OnPercentChanged>,
    pub on_error: Option<OnCacheError>,
}

impl fmt::Debug for CacheCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCallbacks")
            .field("on_percent_changed", &self.on_percent_changed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl CacheCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the percent-changed callback.
    pub fn with_percent_changed(mut self, f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_percent_changed = Some(Arc::new(f));
        self
    }

    /// Set the error callback.
    pub fn with_error(mut self, f: impl Fn(&ProxyCacheError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn percent_changed(&self, percent: u8) {
        if let Some(f) = &self.on_percent_changed {
            f(percent);
        }
    }

    pub(crate) fn error(&self, err: &ProxyCacheError) {
        if let Some(f) = &self.on_error {
            f(err);
        }
    }
}
