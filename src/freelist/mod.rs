//! Bucketed, striped free list of pages.
//!
//! Free pages are threaded into on-disk chains through their own headers.
//! Chain heads live in per-bucket stripe arrays and move by compare-and-swap;
//! a small on-heap cache per bucket absorbs hot put/take traffic. The list's
//! own state is persisted in a chain of metadata pages.

#![forbid(unsafe_code)]

mod bag;
mod cache;
mod list;
pub mod meta;
pub mod node;
mod options;
mod policy;
mod stats;
mod stripe;

pub use bag::ReuseBag;
pub use cache::{CacheLimit, PagesCache};
pub use list::PagesList;
pub use options::FreeListOptions;
pub use policy::{BucketPolicy, SingleBucket, SizeClassPolicy};
pub use stats::{BucketStats, FreeListStats};

/// Free list with size-class data buckets and a reuse bucket.
pub type FreeList<S> = PagesList<S, SizeClassPolicy>;
