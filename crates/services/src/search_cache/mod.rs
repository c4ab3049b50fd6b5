//! Per-request store of search results used to resolve citation tokens
//!
//! Every search-capable tool appends the ordered items of one invocation as a
//! new [`CachedResultSet`]. Citation tokens refer to positions in the most
//! recently appended set only.

pub mod scope;

pub use scope::{current, record_search_results, run_scoped, ActiveCache, CacheScope};

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// One citable item produced by a search tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedItem {
    pub title: String,
    pub record_id: String,
    pub permalink: Option<String>,
    /// Resolvable link substituted for the citation token
    pub link: Option<String>,
}

impl CachedItem {
    pub fn new(title: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            record_id: record_id.into(),
            permalink: None,
            link: None,
        }
    }

    pub fn with_permalink(mut self, permalink: impl Into<String>) -> Self {
        self.permalink = Some(permalink.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Ordered, immutable output of one search invocation
#[derive(Debug, Clone)]
pub struct CachedResultSet {
    created_at: Instant,
    items: Vec<CachedItem>,
}

impl CachedResultSet {
    /// Items are stored as given
    pub fn new(items: Vec<CachedItem>) -> Self {
        Self {
            created_at: Instant::now(),
            items,
        }
    }

    /// Items without a link resolve to `[Catalog link <n>](<permalink>)`,
    /// `n` being the 1-based position in the set
    pub fn from_items(items: Vec<CachedItem>) -> Self {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(position, mut item)| {
                if item.link.is_none() {
                    item.link = item
                        .permalink
                        .as_ref()
                        .map(|permalink| format!("[Catalog link {}]({})", position + 1, permalink));
                }
                item
            })
            .collect();
        Self::new(items)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn items(&self) -> &[CachedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Link of the item at `index`, if it exists and has been resolved
    pub fn link(&self, index: usize) -> Option<&str> {
        self.items.get(index)?.link.as_deref()
    }
}

/// Append-only sequence of result sets for one request
///
/// All operations are synchronous; the lock is never held across an await.
#[derive(Debug, Default)]
pub struct ResultCache {
    // Oldest first; retrieval indexes from the back
    sets: RwLock<Vec<Arc<CachedResultSet>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the ordered items of one search invocation
    pub fn append(&self, items: Vec<CachedItem>) {
        self.append_set(CachedResultSet::from_items(items));
    }

    pub fn append_set(&self, set: CachedResultSet) {
        let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(
            items = set.len(),
            sets = sets.len() + 1,
            "Recorded search results for citation"
        );
        sets.push(Arc::new(set));
    }

    /// Link of item `index` in the most recently appended set
    pub fn resolve(&self, index: i64) -> Option<String> {
        let index = usize::try_from(index).ok()?;
        self.latest()?.link(index).map(str::to_string)
    }

    /// Most recently appended set
    pub fn latest(&self) -> Option<Arc<CachedResultSet>> {
        self.search(0)
    }

    /// The `n`-th most recent set (0 = latest)
    pub fn search(&self, n: usize) -> Option<Arc<CachedResultSet>> {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        let position = sets.len().checked_sub(n + 1)?;
        sets.get(position).cloned()
    }

    /// Number of result sets recorded
    pub fn size(&self) -> usize {
        self.sets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear(&self) {
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
