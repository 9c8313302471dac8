use std::fmt;
use std::sync::Arc;

/// Maps a call's arguments to the partition key its admission is counted under.
///
/// Extractors are plain functions of the arguments; they run before the store's lock is taken.
/// Keys compare by value, so structurally equal keys share one window.
pub struct KeyExtractor<A, K> {
    extract: Arc<dyn Fn(&A) -> K + Send + Sync>,
}

impl<A: 'static> KeyExtractor<A, ()> {
    /// Every call maps to the unit key: one limit shared by all callers.
    pub fn global() -> Self {
        Self::new(|_: &A| ())
    }
}

impl<A, K> KeyExtractor<A, K> {
    /// Wrap an extraction function.
    ///
    /// Different kinds of keys can share one limiter through an enum key type; there is no
    /// implicit conversion between key representations.
    pub fn new<F>(extract: F) -> Self
    where
        F: Fn(&A) -> K + Send + Sync + 'static,
    {
        Self { extract: Arc::new(extract) }
    }

    pub fn extract(&self, args: &A) -> K {
        (self.extract)(args)
    }
}

impl<A, K> Clone for KeyExtractor<A, K> {
    fn clone(&self) -> Self {
        Self { extract: self.extract.clone() }
    }
}

impl<A, K> fmt::Debug for KeyExtractor<A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExtractor").field("extract", &"<fn>").finish()
    }
}
