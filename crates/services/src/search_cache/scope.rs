//! Binding of one [`ResultCache`] to one in-flight query
//!
//! The binding is a tokio task-local attached to the query's future, so it
//! survives every `.await` inside that future and is invisible to other
//! requests. Work handed to `tokio::spawn` does not inherit it.

use super::{CachedItem, ResultCache};
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

tokio::task_local! {
    static ACTIVE_CACHE: Arc<ResultCache>;
}

/// Run `future` with `cache` bound as the request cache
///
/// If a cache is already bound the outer one stays active and `cache` is
/// never used.
pub async fn run_scoped<F: Future>(cache: Arc<ResultCache>, future: F) -> F::Output {
    match current() {
        Some(outer) => {
            if !Arc::ptr_eq(&outer, &cache) {
                tracing::warn!(
                    outer_sets = outer.size(),
                    discarded_sets = cache.size(),
                    "Nested request scope, keeping the outer result cache"
                );
            }
            future.await
        }
        None => ACTIVE_CACHE.scope(cache, future).await,
    }
}

/// Cache bound to the current request, if any
pub fn current() -> Option<Arc<ResultCache>> {
    ACTIVE_CACHE.try_with(Arc::clone).ok()
}

/// Append one search invocation's items to the current request's cache
///
/// Returns false when called outside any request scope; the items are dropped.
pub fn record_search_results(items: Vec<CachedItem>) -> bool {
    match current() {
        Some(cache) => {
            cache.append(items);
            true
        }
        None => {
            tracing::warn!(
                items = items.len(),
                "Search results recorded outside a request scope were dropped"
            );
            false
        }
    }
}

/// Where a cache lookup ended up
#[derive(Debug, Clone)]
pub enum ActiveCache {
    /// Bound by the enclosing request
    Request(Arc<ResultCache>),
    /// No request in scope; the injected standalone cache
    Fallback(Arc<ResultCache>),
}

impl ActiveCache {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_inner(self) -> Arc<ResultCache> {
        match self {
            Self::Request(cache) | Self::Fallback(cache) => cache,
        }
    }
}

impl Deref for ActiveCache {
    type Target = ResultCache;

    fn deref(&self) -> &ResultCache {
        match self {
            Self::Request(cache) | Self::Fallback(cache) => cache,
        }
    }
}

/// Cache resolution for code that may run with or without a request
///
/// Search tools hold one of these. Inside a request they always reach the
/// request cache; the fallback only serves standalone invocations such as
/// scripts and tests.
#[derive(Debug, Clone, Default)]
pub struct CacheScope {
    fallback: Arc<ResultCache>,
}

impl CacheScope {
    pub fn new(fallback: Arc<ResultCache>) -> Self {
        Self { fallback }
    }

    pub fn active(&self) -> ActiveCache {
        match current() {
            Some(cache) => ActiveCache::Request(cache),
            None => {
                tracing::debug!("No request scope bound, using fallback result cache");
                ActiveCache::Fallback(self.fallback.clone())
            }
        }
    }

    pub fn fallback(&self) -> &Arc<ResultCache> {
        &self.fallback
    }
}
