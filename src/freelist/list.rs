use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info, warn};

use super::bag::ReuseBag;
use super::cache::PagesCache;
use super::meta::{self, MetaEntry};
use super::node;
use super::options::FreeListOptions;
use super::policy::BucketPolicy;
use super::stats::{BucketStats, FreeListStats};
use super::stripe::{BucketArray, Stripe};
use crate::primitives::pager::{CheckpointListener, PageHandle, PageStore};
use crate::types::page::{self, header, PAGE_HDR_LEN, UNLISTED};
use crate::types::{PageId, PageListError, Result};

struct BucketState {
    stripes: BucketArray,
    cache: PagesCache,
    /// Pages in the chains plus pages in the cache. Raised before a page is
    /// published and lowered after it is unlinked, so it never undercounts.
    size: AtomicU64,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_puts: AtomicU64,
    cas_retries: AtomicU64,
    stripes_added: AtomicU64,
    allocated_no_reuse: AtomicU64,
    metadata_writes: AtomicU64,
}

/// Concurrent free list over a [`PageStore`].
///
/// Pages are grouped into buckets chosen by the [`BucketPolicy`]. Each bucket
/// owns one or more stripes, each the head of a singly linked chain threaded
/// through the free pages themselves, plus a bounded on-heap cache. Chain
/// heads move only by compare-and-swap; a page header is only modified while
/// holding that one page's lock.
///
/// Mutating calls hold the shared side of the store's checkpoint lock. The
/// list persists itself when the store checkpoints (see
/// [`PagesList::register_with_checkpointer`]) or on [`PagesList::save_metadata`].
pub struct PagesList<S: PageStore + ?Sized, P: BucketPolicy> {
    store: Arc<S>,
    policy: P,
    options: FreeListOptions,
    meta_page_id: PageId,
    buckets: Box<[BucketState]>,
    /// Metadata pages, root first. Also serializes metadata writes.
    meta_chain: Mutex<Vec<PageId>>,
    destroyed: AtomicBool,
    counters: Counters,
}

impl<S: PageStore + ?Sized, P: BucketPolicy> PagesList<S, P> {
    /// Creates a list rooted at `meta_page_id`.
    ///
    /// With `init_new` the metadata page is formatted and the list starts
    /// empty. Otherwise the list is rebuilt from the metadata chain and every
    /// chain is walked to restore the page counts.
    pub fn new(
        store: Arc<S>,
        policy: P,
        options: FreeListOptions,
        meta_page_id: PageId,
        init_new: bool,
    ) -> Result<Self> {
        let bucket_count = policy.buckets();
        if bucket_count == 0 || bucket_count >= UNLISTED as usize {
            return Err(PageListError::Invalid("bucket count out of range"));
        }
        if meta::entries_per_page(store.page_size()) == 0 {
            return Err(PageListError::Invalid("page too small for free-list metadata"));
        }
        if meta_page_id.is_none() {
            return Err(PageListError::Invalid("metadata page id is none"));
        }
        let cache_stripes = options.max_stripes_per_bucket.max(1);
        let buckets = (0..bucket_count)
            .map(|_| BucketState {
                stripes: BucketArray::with_empty_stripe(),
                cache: PagesCache::new(
                    options.cache_pages_per_bucket,
                    cache_stripes,
                    options.cache_limit.clone(),
                ),
                size: AtomicU64::new(0),
            })
            .collect();
        let list = Self {
            store,
            policy,
            options,
            meta_page_id,
            buckets,
            meta_chain: Mutex::new(vec![meta_page_id]),
            destroyed: AtomicBool::new(false),
            counters: Counters::default(),
        };
        if init_new {
            list.init_metadata()?;
            info!(
                list = %list.options.name,
                meta = %meta_page_id,
                buckets = bucket_count,
                "freelist.create"
            );
        } else {
            list.recover()?;
            info!(
                list = %list.options.name,
                meta = %meta_page_id,
                pages = list.total_pages_count(),
                "freelist.recover"
            );
        }
        Ok(list)
    }

    /// Registers the list so the store's checkpoints persist it.
    pub fn register_with_checkpointer(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.store.register_checkpoint_listener(weak);
    }

    /// List name.
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Root metadata page.
    pub fn meta_page_id(&self) -> PageId {
        self.meta_page_id
    }

    /// Bucket policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Construction options.
    pub fn options(&self) -> &FreeListOptions {
        &self.options
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn check_live(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(PageListError::Invalid("free list destroyed"));
        }
        Ok(())
    }

    fn bucket(&self, bucket: usize) -> Result<&BucketState> {
        self.buckets
            .get(bucket)
            .ok_or(PageListError::InvariantViolation("bucket out of range"))
    }

    fn acquire(&self, page: PageId) -> Result<PageHandle> {
        self.store.acquire_page(self.options.group, page)
    }

    /// Adds every page of `bag` to `bucket`, draining the bag.
    ///
    /// Pages are offered to the bucket cache first; the rest are linked as one
    /// sub-chain in front of a stripe head. A page this list already holds,
    /// cached or chained, fails the whole put and leaves the bag untouched.
    /// On any later error the pages that were not placed are returned to the
    /// bag.
    pub fn put(&self, bag: &mut ReuseBag, bucket: usize) -> Result<()> {
        self.check_live()?;
        let state = self.bucket(bucket)?;
        if bag.is_empty() {
            return Ok(());
        }
        let mut seen = HashSet::with_capacity(bag.len());
        for page in bag.iter() {
            if page.is_none() {
                return Err(PageListError::Invalid("cannot recycle the none page id"));
            }
            if !seen.insert(page.effective()) {
                return Err(PageListError::Invalid("duplicate page in reuse bag"));
            }
        }
        let _op = self.store.checkpoint_lock().operation();
        for page in bag.iter() {
            self.check_unlisted(*page)?;
        }
        let pages = bag.drain_all();
        state.size.fetch_add(pages.len() as u64, Ordering::AcqRel);

        let mut to_link = Vec::with_capacity(pages.len());
        for page in pages {
            if state.cache.offer(page) {
                self.counters.cache_puts.fetch_add(1, Ordering::Relaxed);
            } else {
                to_link.push(page);
            }
        }
        if to_link.is_empty() {
            return Ok(());
        }
        if let Err(err) = self.link_chain(state, bucket, &to_link) {
            state.size.fetch_sub(to_link.len() as u64, Ordering::AcqRel);
            bag.extend(to_link);
            return Err(err);
        }
        Ok(())
    }

    /// Adds one page to `bucket`.
    pub fn put_page(&self, page: PageId, bucket: usize) -> Result<()> {
        let mut bag = ReuseBag::with_pages([page]);
        self.put(&mut bag, bucket)
    }

    /// Adds a data page with `free_space` bytes available, recording the
    /// free space in its header. Returns the bucket used.
    pub fn put_data_page(&self, page: PageId, free_space: usize) -> Result<usize> {
        self.check_live()?;
        let bucket = self.policy.bucket_index(free_space);
        let recorded = u32::try_from(free_space)
            .map_err(|_| PageListError::Invalid("free space exceeds page size"))?;
        {
            let _op = self.store.checkpoint_lock().operation();
            let handle = self.acquire(page)?;
            let mut guard = handle.write();
            if page::has_header(guard.data()) {
                guard.data_mut()[header::FREE_SPACE].copy_from_slice(&recorded.to_be_bytes());
            }
        }
        self.put_page(page, bucket)?;
        Ok(bucket)
    }

    /// Refuses a page that is already cached or chained by this list.
    fn check_unlisted(&self, page: PageId) -> Result<()> {
        if self.buckets.iter().any(|state| state.cache.contains(page)) {
            return Err(PageListError::InvariantViolation("page is already listed"));
        }
        let handle = self.acquire(page)?;
        let guard = handle.read();
        if node::list_tag(guard.data()).is_some() {
            return Err(PageListError::InvariantViolation("page is already listed"));
        }
        Ok(())
    }

    fn stamp_one(&self, page: PageId, next: Option<PageId>, bucket: usize) -> Result<()> {
        let handle = self.acquire(page)?;
        let mut guard = handle.write();
        if node::list_tag(guard.data()).is_some() {
            return Err(PageListError::InvariantViolation("page is already listed"));
        }
        node::stamp_free(
            guard.data_mut(),
            page,
            self.store.page_size(),
            bucket as u16,
            self.policy.is_reuse_bucket(bucket),
            None,
        )?;
        if let Some(next) = next {
            node::set_next(guard.data_mut(), next);
        }
        Ok(())
    }

    /// Stamps `pages` as a chain and publishes it in front of a stripe head.
    ///
    /// On error no page of `pages` is published and none is left stamped.
    fn link_chain(&self, state: &BucketState, bucket: usize, pages: &[PageId]) -> Result<()> {
        let (first, tail) = match (pages.first(), pages.last()) {
            (Some(first), Some(tail)) => (*first, *tail),
            _ => return Ok(()),
        };
        for (i, &page) in pages.iter().enumerate() {
            if let Err(err) = self.stamp_one(page, pages.get(i + 1).copied(), bucket) {
                self.unstamp(&pages[..i]);
                return Err(err);
            }
        }

        let handle = match self.acquire(tail) {
            Ok(handle) => handle,
            Err(err) => {
                self.unstamp(pages);
                return Err(err);
            }
        };
        let mut guard = handle.write();
        let mut failures = 0usize;
        let mut grown = false;
        loop {
            let stripes = state.stripes.load();
            let stripe = &stripes[rand::thread_rng().gen_range(0..stripes.len())];
            let head = stripe.head();
            node::set_next(guard.data_mut(), head);
            if stripe.cas_head(head, first) {
                stripe.mark_non_empty();
                break;
            }
            failures += 1;
            self.counters.cas_retries.fetch_add(1, Ordering::Relaxed);
            if failures % self.options.stripe_contention_threshold.max(1) == 0
                && self.try_add_stripe(state, bucket, &stripes)
            {
                grown = true;
            }
        }
        drop(guard);
        drop(handle);
        if grown {
            self.record_stripe_growth();
        }
        Ok(())
    }

    /// Persists a grown stripe array. The chain is already published when
    /// this runs, so a failed write is logged and left for the next persist,
    /// which rewrites the metadata from the in-memory stripes.
    fn record_stripe_growth(&self) {
        if let Err(err) = self.write_metadata() {
            warn!(
                list = %self.options.name,
                error = %err,
                "freelist.metadata_write_deferred"
            );
        }
    }

    fn try_add_stripe(
        &self,
        state: &BucketState,
        bucket: usize,
        observed: &Arc<Vec<Arc<Stripe>>>,
    ) -> bool {
        if observed.len() >= self.options.max_stripes_per_bucket {
            return false;
        }
        if !state.stripes.try_push(observed, Arc::new(Stripe::empty())) {
            return false;
        }
        self.counters.stripes_added.fetch_add(1, Ordering::Relaxed);
        debug!(
            list = %self.options.name,
            bucket,
            stripes = observed.len() + 1,
            "freelist.stripe_added"
        );
        true
    }

    fn unstamp(&self, pages: &[PageId]) {
        for &page in pages {
            if let Ok(handle) = self.acquire(page) {
                let mut guard = handle.write();
                node::clear_link(guard.data_mut());
            }
        }
    }

    /// Removes a page from `bucket`. `None` means the bucket is empty.
    pub fn take(&self, bucket: usize) -> Result<Option<PageId>> {
        self.check_live()?;
        let state = self.bucket(bucket)?;
        let _op = self.store.checkpoint_lock().operation();
        self.take_from_bucket(state, bucket)
    }

    fn take_from_bucket(&self, state: &BucketState, bucket: usize) -> Result<Option<PageId>> {
        if let Some(page) = state.cache.poll() {
            state.size.fetch_sub(1, Ordering::AcqRel);
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(page));
        }
        if state.size.load(Ordering::Acquire) == 0 {
            return Ok(None);
        }
        let stripes = state.stripes.load();
        let n = stripes.len();
        let start = rand::thread_rng().gen_range(0..n);
        for trust_empty_hint in [false, true] {
            for i in 0..n {
                let stripe = &stripes[(start + i) % n];
                if stripe.is_empty_hint() != trust_empty_hint {
                    continue;
                }
                if let Some(page) = self.take_from_stripe(stripe, bucket)? {
                    state.size.fetch_sub(1, Ordering::AcqRel);
                    return Ok(Some(page));
                }
            }
        }
        Ok(None)
    }

    fn take_from_stripe(&self, stripe: &Stripe, bucket: usize) -> Result<Option<PageId>> {
        let tag = bucket as u16;
        loop {
            let head = stripe.head();
            if head.is_none() {
                stripe.mark_empty();
                return Ok(None);
            }
            let handle = self.acquire(head)?;
            let guard = handle.upgradable();
            if stripe.head() != head {
                continue;
            }
            let next = node::read_link(guard.data(), tag)?;
            let mut guard = guard.upgrade();
            if !stripe.cas_head(head, next) {
                self.counters.cas_retries.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if next.is_none() {
                stripe.mark_empty();
            }
            node::clear_link(guard.data_mut());
            return Ok(Some(head));
        }
    }

    /// Takes a page with at least `required` free bytes, searching data
    /// buckets from the smallest sufficient size class up, then the reuse
    /// bucket. Returns the page and the bucket it came from.
    pub fn take_at_least(&self, required: usize) -> Result<Option<(PageId, usize)>> {
        self.check_live()?;
        let payload = (self.store.page_size() as usize).saturating_sub(PAGE_HDR_LEN);
        if required > payload {
            return Err(PageListError::Invalid("requested space exceeds page payload"));
        }
        let _op = self.store.checkpoint_lock().operation();
        for (bucket, state) in self.buckets.iter().enumerate() {
            if self.policy.is_reuse_bucket(bucket) || self.policy.bucket_floor(bucket) < required {
                continue;
            }
            if let Some(page) = self.take_from_bucket(state, bucket)? {
                return Ok(Some((page, bucket)));
            }
        }
        if let Some(bucket) = self.policy.reuse_bucket() {
            let state = self.bucket(bucket)?;
            if let Some(page) = self.take_from_bucket(state, bucket)? {
                return Ok(Some((page, bucket)));
            }
        }
        Ok(None)
    }

    /// Takes a page from `bucket`, allocating a fresh one when it is empty.
    pub fn take_or_allocate(&self, bucket: usize) -> Result<PageId> {
        match self.take(bucket)? {
            Some(page) => Ok(page),
            None => self.allocate_page_no_reuse(),
        }
    }

    /// Allocates a fresh page from the store without consulting the list.
    pub fn allocate_page_no_reuse(&self) -> Result<PageId> {
        self.check_live()?;
        self.allocate_raw()
    }

    fn allocate_raw(&self) -> Result<PageId> {
        let page = self.store.allocate_page(
            self.options.group,
            self.options.partition,
            self.options.default_page_flag,
        )?;
        self.counters
            .allocated_no_reuse
            .fetch_add(1, Ordering::Relaxed);
        Ok(page)
    }

    /// Pages tracked by `bucket`, cached ones included.
    pub fn stored_pages_count(&self, bucket: usize) -> Result<u64> {
        Ok(self.bucket(bucket)?.size.load(Ordering::Acquire))
    }

    /// Pages tracked by the reuse bucket; zero when the policy has none.
    pub(crate) fn reuse_bucket_size(&self) -> u64 {
        self.policy
            .reuse_bucket()
            .and_then(|bucket| self.buckets.get(bucket))
            .map_or(0, |state| state.size.load(Ordering::Acquire))
    }

    /// Pages tracked across all buckets.
    pub fn total_pages_count(&self) -> u64 {
        self.buckets
            .iter()
            .map(|state| state.size.load(Ordering::Acquire))
            .sum()
    }

    /// Persists the list while blocking concurrent mutations.
    ///
    /// Must not be called from inside a list operation on the same thread.
    pub fn save_metadata(&self) -> Result<()> {
        self.check_live()?;
        let _guard = self.store.checkpoint_lock().checkpoint();
        self.persist_exclusive()
    }

    /// Flushes caches into chains, drops empty surplus stripes and writes the
    /// metadata chain. Caller holds the exclusive side of the checkpoint lock.
    fn persist_exclusive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Ok(());
        }
        for (bucket, state) in self.buckets.iter().enumerate() {
            let cached = state.cache.drain();
            if !cached.is_empty() {
                debug!(
                    list = %self.options.name,
                    bucket,
                    pages = cached.len(),
                    "freelist.cache_flush"
                );
                if let Err(err) = self.link_chain(state, bucket, &cached) {
                    for page in cached {
                        if !state.cache.offer(page) {
                            warn!(
                                list = %self.options.name,
                                page = %page,
                                "freelist.cache_flush.lost_page"
                            );
                            state.size.fetch_sub(1, Ordering::AcqRel);
                        }
                    }
                    return Err(err);
                }
            }
            let stripes = state.stripes.load();
            if stripes.len() > 1 {
                let mut keep: Vec<Arc<Stripe>> = stripes
                    .iter()
                    .filter(|stripe| !stripe.head().is_none())
                    .cloned()
                    .collect();
                if keep.is_empty() {
                    keep.push(Arc::clone(&stripes[0]));
                }
                if keep.len() < stripes.len() {
                    debug!(
                        list = %self.options.name,
                        bucket,
                        removed = stripes.len() - keep.len(),
                        "freelist.stripes_removed"
                    );
                    state.stripes.store(keep);
                }
            }
        }
        self.write_metadata()
    }

    fn init_metadata(&self) -> Result<()> {
        {
            let handle = self.acquire(self.meta_page_id)?;
            let mut guard = handle.write();
            meta::init_meta_page(
                guard.data_mut(),
                self.meta_page_id,
                self.store.page_size(),
                self.buckets.len() as u16,
            )?;
        }
        self.write_metadata()
    }

    fn write_metadata(&self) -> Result<()> {
        let mut chain = self.meta_chain.lock();
        let entries: Vec<MetaEntry> = self
            .buckets
            .iter()
            .enumerate()
            .flat_map(|(bucket, state)| {
                state
                    .stripes
                    .load()
                    .iter()
                    .map(|stripe| MetaEntry {
                        bucket: bucket as u16,
                        head: stripe.head(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        let page_size = self.store.page_size();
        let bucket_count = self.buckets.len() as u16;
        let per_page = meta::entries_per_page(page_size);
        let needed = entries.len().div_ceil(per_page).max(1);
        while chain.len() < needed {
            let page = self.allocate_raw()?;
            let handle = self.acquire(page)?;
            let mut guard = handle.write();
            meta::init_meta_page(guard.data_mut(), page, page_size, bucket_count)?;
            chain.push(page);
        }
        for (i, &page) in chain.iter().enumerate() {
            let next = chain.get(i + 1).copied().unwrap_or(PageId::NONE);
            let start = (i * per_page).min(entries.len());
            let end = ((i + 1) * per_page).min(entries.len());
            let handle = self.acquire(page)?;
            let mut guard = handle.write();
            meta::write_meta_page(guard.data_mut(), next, bucket_count, &entries[start..end])?;
        }
        self.counters.metadata_writes.fetch_add(1, Ordering::Relaxed);
        debug!(
            list = %self.options.name,
            entries = entries.len(),
            pages = chain.len(),
            "freelist.metadata_written"
        );
        Ok(())
    }

    fn recover(&self) -> Result<()> {
        let bucket_count = self.buckets.len();
        let mut heads: Vec<Vec<PageId>> = vec![Vec::new(); bucket_count];
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.meta_page_id;
        while !cursor.is_none() {
            if !seen.insert(cursor.effective()) {
                return Err(PageListError::Corruption("metadata chain has a cycle"));
            }
            let page = {
                let handle = self.acquire(cursor)?;
                let guard = handle.read();
                meta::read_meta_page(guard.data())?
            };
            if page.bucket_count as usize != bucket_count {
                warn!(
                    list = %self.options.name,
                    stored = page.bucket_count,
                    expected = bucket_count,
                    "freelist.recover.bucket_count_mismatch"
                );
                return Err(PageListError::Corruption("metadata bucket count mismatch"));
            }
            for entry in page.entries {
                let slot = heads
                    .get_mut(entry.bucket as usize)
                    .ok_or(PageListError::Corruption("metadata entry bucket out of range"))?;
                slot.push(entry.head);
            }
            chain.push(cursor);
            cursor = page.next;
        }

        for (bucket, (state, bucket_heads)) in self.buckets.iter().zip(heads).enumerate() {
            let mut count = 0u64;
            for &head in &bucket_heads {
                let mut cursor = head;
                while !cursor.is_none() {
                    if !seen.insert(cursor.effective()) {
                        return Err(PageListError::Corruption("page linked twice"));
                    }
                    let next = {
                        let handle = self.acquire(cursor)?;
                        let guard = handle.read();
                        node::read_link(guard.data(), bucket as u16)?
                    };
                    count += 1;
                    cursor = next;
                }
            }
            if bucket_heads.len() > self.options.max_stripes_per_bucket {
                warn!(
                    list = %self.options.name,
                    bucket,
                    stripes = bucket_heads.len(),
                    max = self.options.max_stripes_per_bucket,
                    "freelist.recover.stripes_over_limit"
                );
            }
            let stripes: Vec<Arc<Stripe>> = if bucket_heads.is_empty() {
                vec![Arc::new(Stripe::empty())]
            } else {
                bucket_heads
                    .into_iter()
                    .map(|head| Arc::new(Stripe::new(head)))
                    .collect()
            };
            state.stripes.store(stripes);
            state.size.store(count, Ordering::Release);
        }
        *self.meta_chain.lock() = chain;
        Ok(())
    }

    /// Releases every tracked page and the metadata pages to the store.
    ///
    /// Returns the number of pages released. The list is unusable afterwards.
    /// Callers must quiesce all other users of the list first.
    pub fn destroy(&self) -> Result<u64> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(PageListError::Invalid("free list destroyed"));
        }
        let _op = self.store.checkpoint_lock().operation();
        let group = self.options.group;
        let mut released = 0u64;
        for (bucket, state) in self.buckets.iter().enumerate() {
            for page in state.cache.drain() {
                self.store.free_page(group, page)?;
                released += 1;
            }
            for stripe in state.stripes.load().iter() {
                let mut cursor = stripe.head();
                while !cursor.is_none() {
                    let next = {
                        let handle = self.acquire(cursor)?;
                        let guard = handle.read();
                        node::read_link(guard.data(), bucket as u16)?
                    };
                    self.store.free_page(group, cursor)?;
                    released += 1;
                    cursor = next;
                }
            }
            state.stripes.store(vec![Arc::new(Stripe::empty())]);
            state.size.store(0, Ordering::Release);
        }
        let chain = std::mem::take(&mut *self.meta_chain.lock());
        for page in chain {
            self.store.free_page(group, page)?;
            released += 1;
        }
        info!(list = %self.options.name, released, "freelist.destroy");
        Ok(released)
    }

    /// True if `page` is in the cache of `bucket`.
    pub fn is_cached(&self, page: PageId, bucket: usize) -> Result<bool> {
        Ok(self.bucket(bucket)?.cache.contains(page))
    }

    /// Snapshot of counters and per-bucket figures.
    pub fn stats(&self) -> FreeListStats {
        FreeListStats {
            name: self.options.name.clone(),
            buckets: self
                .buckets
                .iter()
                .enumerate()
                .map(|(bucket, state)| BucketStats {
                    bucket,
                    stripes: state.stripes.len(),
                    stored_pages: state.size.load(Ordering::Acquire),
                    cached_pages: state.cache.len(),
                })
                .collect(),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_puts: self.counters.cache_puts.load(Ordering::Relaxed),
            cas_retries: self.counters.cas_retries.load(Ordering::Relaxed),
            stripes_added: self.counters.stripes_added.load(Ordering::Relaxed),
            allocated_no_reuse: self.counters.allocated_no_reuse.load(Ordering::Relaxed),
            metadata_writes: self.counters.metadata_writes.load(Ordering::Relaxed),
        }
    }
}

impl<S: PageStore + ?Sized, P: BucketPolicy> CheckpointListener for PagesList<S, P> {
    fn on_checkpoint_begin(&self) -> Result<()> {
        self.persist_exclusive()
    }
}

impl<S: PageStore + ?Sized, P: BucketPolicy> std::fmt::Debug for PagesList<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagesList")
            .field("name", &self.options.name)
            .field("meta_page_id", &self.meta_page_id)
            .field("buckets", &self.buckets.len())
            .field("pages", &self.total_pages_count())
            .finish()
    }
}
