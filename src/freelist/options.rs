use std::sync::Arc;

use super::cache::CacheLimit;
use crate::types::{GroupId, PageFlag, INDEX_PARTITION};

/// Construction options for a free list.
#[derive(Clone, Debug)]
pub struct FreeListOptions {
    /// Name used in logs and statistics.
    pub name: String,
    /// Page group the list manages.
    pub group: GroupId,
    /// Flag for pages the list allocates itself.
    pub default_page_flag: PageFlag,
    /// Partition pages are allocated from when no page can be reused.
    pub partition: u16,
    /// Upper bound on stripes per bucket.
    pub max_stripes_per_bucket: usize,
    /// Failed head CAS attempts within one call before a stripe is added.
    pub stripe_contention_threshold: usize,
    /// Cache capacity per bucket. Zero disables the cache.
    pub cache_pages_per_bucket: usize,
    /// Optional budget shared with other lists.
    pub cache_limit: Option<Arc<CacheLimit>>,
}

impl Default for FreeListOptions {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            name: "free-list".to_string(),
            group: GroupId(0),
            default_page_flag: PageFlag::Index,
            partition: INDEX_PARTITION,
            max_stripes_per_bucket: parallelism.clamp(1, 8),
            stripe_contention_threshold: 4,
            cache_pages_per_bucket: 64,
            cache_limit: None,
        }
    }
}

impl FreeListOptions {
    /// Options for a list named `name` over `group`.
    pub fn named(name: impl Into<String>, group: GroupId) -> Self {
        Self {
            name: name.into(),
            group,
            ..Self::default()
        }
    }
}
