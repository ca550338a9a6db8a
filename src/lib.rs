//! Concurrent free-page tracking for a page-based storage engine.
//!
//! Freed pages are threaded into on-disk chains through their own headers,
//! grouped into buckets, and handed back out before the store has to grow.
//! [`freelist::PagesList`] is the general engine; [`reuse`] specializes it to
//! a single bucket for recycling whole index pages.

#![warn(missing_docs)]

pub mod freelist;
pub mod primitives;
pub mod reuse;
pub mod types;

pub use freelist::{
    BucketPolicy, CacheLimit, FreeList, FreeListOptions, FreeListStats, PagesList, ReuseBag,
    SingleBucket, SizeClassPolicy,
};
pub use primitives::pager::{PageStore, Pager, PagerOptions};
pub use reuse::{reuse_list, ReuseList, ReuseListImpl};
pub use types::{GroupId, PageFlag, PageId, PageListError, Result, INDEX_PARTITION};
