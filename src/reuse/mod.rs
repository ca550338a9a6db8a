//! Recycling of whole pages.
//!
//! Index and metadata pages freed by tree merges are parked in a single-bucket
//! list and handed back out before the store has to grow.

#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::freelist::{node, BucketPolicy, FreeListOptions, PagesList, ReuseBag, SingleBucket};
use crate::primitives::pager::PageStore;
use crate::types::page::PageIo;
use crate::types::{PageFlag, PageId, PageListError, Result};

/// Single-bucket list recycling whole pages.
pub type ReuseListImpl<S> = PagesList<S, SingleBucket>;

/// Operations on the whole-page bucket of a list.
pub trait ReuseList {
    /// Parks every page of `bag` in the reuse bucket, draining the bag.
    fn add_for_recycle(&self, bag: &mut ReuseBag) -> Result<()>;

    /// Takes a recycled page. Never allocates.
    fn take_recycled_page(&self) -> Result<Option<PageId>>;

    /// Re-stamps a page taken from the list for a new role.
    ///
    /// Returns the page id carrying `flag` and a bumped rotation. Fails with
    /// [`PageListError::InvariantViolation`] if the page is still listed.
    fn init_recycled_page(&self, page_id: PageId, flag: PageFlag, io: PageIo) -> Result<PageId>;

    /// Pages parked in the reuse bucket, cached ones included.
    fn recycled_pages_count(&self) -> u64;
}

/// Opens or creates a reuse list rooted at `meta_page_id`.
pub fn reuse_list<S: PageStore + ?Sized>(
    store: Arc<S>,
    options: FreeListOptions,
    meta_page_id: PageId,
    init_new: bool,
) -> Result<ReuseListImpl<S>> {
    PagesList::new(store, SingleBucket, options, meta_page_id, init_new)
}

fn reuse_bucket<P: BucketPolicy>(policy: &P) -> Result<usize> {
    policy
        .reuse_bucket()
        .ok_or(PageListError::Invalid("list has no reuse bucket"))
}

impl<S: PageStore + ?Sized, P: BucketPolicy> ReuseList for PagesList<S, P> {
    fn add_for_recycle(&self, bag: &mut ReuseBag) -> Result<()> {
        self.put(bag, reuse_bucket(self.policy())?)
    }

    fn take_recycled_page(&self) -> Result<Option<PageId>> {
        self.take(reuse_bucket(self.policy())?)
    }

    fn init_recycled_page(&self, page_id: PageId, flag: PageFlag, io: PageIo) -> Result<PageId> {
        self.check_live()?;
        let bucket = reuse_bucket(self.policy())?;
        if self.is_cached(page_id, bucket)? {
            return Err(PageListError::InvariantViolation(
                "recycled page is still cached",
            ));
        }
        let store = self.store();
        let _op = store.checkpoint_lock().operation();
        let handle = store.acquire_page(self.options().group, page_id)?;
        let mut guard = handle.write();
        if node::list_tag(guard.data()).is_some() {
            return Err(PageListError::InvariantViolation(
                "recycled page is still listed",
            ));
        }
        let new_id = page_id.with_flag(flag).rotate();
        io.init_new_page(guard.data_mut(), new_id, store.page_size())?;
        Ok(new_id)
    }

    fn recycled_pages_count(&self) -> u64 {
        self.reuse_bucket_size()
    }
}
