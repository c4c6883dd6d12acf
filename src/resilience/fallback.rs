//! Fallback values for rejected or failed calls.

use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;

/// What to return instead of an error when a protected call cannot complete.
pub enum Fallback<T> {
    /// Propagate the rejection or failure.
    None,
    /// Return a fixed value.
    Static(T),
    /// Compute a value lazily, e.g. from a cache of last known results.
    Computed(Box<dyn FnOnce() -> BoxFuture<'static, T> + Send>),
}

impl<T> Fallback<T> {
    /// Build a computed fallback from an async closure.
    pub fn computed<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Fallback::Computed(Box::new(move || Box::pin(f())))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Fallback::None)
    }

    /// Produce the fallback value, if any.
    pub async fn resolve(self) -> Option<T> {
        match self {
            Fallback::None => None,
            Fallback::Static(value) => Some(value),
            Fallback::Computed(f) => Some(f().await),
        }
    }
}

impl<T> Default for Fallback<T> {
    fn default() -> Self {
        Fallback::None
    }
}

impl<T> fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::None => f.write_str("Fallback::None"),
            Fallback::Static(_) => f.write_str("Fallback::Static(..)"),
            Fallback::Computed(_) => f.write_str("Fallback::Computed(..)"),
        }
    }
}
