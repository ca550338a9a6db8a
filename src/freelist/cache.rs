//! Bounded on-heap cache of free page ids.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::PageId;

static NEXT_THREAD_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT: usize = NEXT_THREAD_SLOT.fetch_add(1, Ordering::Relaxed);
}

fn thread_slot() -> usize {
    THREAD_SLOT.with(|slot| *slot)
}

/// Global page budget shared by the caches of several lists.
#[derive(Debug)]
pub struct CacheLimit {
    max: usize,
    used: AtomicUsize,
}

impl CacheLimit {
    /// Budget of `max` cached pages.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            used: AtomicUsize::new(0),
        }
    }

    /// Takes one permit.
    pub fn try_acquire(&self) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.max).then_some(used + 1)
            })
            .is_ok()
    }

    /// Returns `n` permits.
    pub fn release(&self, n: usize) {
        if n > 0 {
            self.used.fetch_sub(n, Ordering::AcqRel);
        }
    }

    /// Permits still available.
    pub fn available(&self) -> usize {
        self.max.saturating_sub(self.used.load(Ordering::Acquire))
    }
}

/// Striped cache of page ids for one bucket.
///
/// Offering never blocks: a full cache, an exhausted global budget or a
/// contended stripe all refuse the page and the caller links it on disk
/// instead. Polling prefers the calling thread's stripe and only waits on a
/// stripe mutex once every stripe turned out to be contended.
pub struct PagesCache {
    stripes: Box<[Mutex<Vec<PageId>>]>,
    capacity: usize,
    len: AtomicUsize,
    limit: Option<Arc<CacheLimit>>,
}

impl PagesCache {
    /// Cache holding at most `capacity` ids across `stripes` stripes.
    pub fn new(capacity: usize, stripes: usize, limit: Option<Arc<CacheLimit>>) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(Vec::new())).collect(),
            capacity,
            len: AtomicUsize::new(0),
            limit,
        }
    }

    /// Maximum number of cached ids.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached ids.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reserve(&self) -> bool {
        let reserved = self
            .len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |len| {
                (len < self.capacity).then_some(len + 1)
            })
            .is_ok();
        if !reserved {
            return false;
        }
        if let Some(limit) = &self.limit {
            if !limit.try_acquire() {
                self.len.fetch_sub(1, Ordering::AcqRel);
                return false;
            }
        }
        true
    }

    fn unreserve(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.len.fetch_sub(n, Ordering::AcqRel);
        if let Some(limit) = &self.limit {
            limit.release(n);
        }
    }

    /// Tries to cache `page`. Returns false if the page was not taken.
    pub fn offer(&self, page: PageId) -> bool {
        if self.capacity == 0 || !self.reserve() {
            return false;
        }
        let start = thread_slot();
        let n = self.stripes.len();
        for i in 0..n {
            if let Some(mut stripe) = self.stripes[(start + i) % n].try_lock() {
                stripe.push(page);
                return true;
            }
        }
        self.unreserve(1);
        false
    }

    /// Removes a cached id, most recently offered first within a stripe.
    pub fn poll(&self) -> Option<PageId> {
        if self.is_empty() {
            return None;
        }
        let start = thread_slot();
        let n = self.stripes.len();
        let mut contended = false;
        for i in 0..n {
            match self.stripes[(start + i) % n].try_lock() {
                Some(mut stripe) => {
                    if let Some(page) = stripe.pop() {
                        drop(stripe);
                        self.unreserve(1);
                        return Some(page);
                    }
                }
                None => contended = true,
            }
        }
        if !contended {
            return None;
        }
        for i in 0..n {
            let page = self.stripes[(start + i) % n].lock().pop();
            if let Some(page) = page {
                self.unreserve(1);
                return Some(page);
            }
        }
        None
    }

    /// True if `page` is currently cached.
    pub fn contains(&self, page: PageId) -> bool {
        self.stripes
            .iter()
            .any(|stripe| stripe.lock().iter().any(|p| p.effective() == page.effective()))
    }

    /// Empties the cache.
    pub fn drain(&self) -> Vec<PageId> {
        let mut out = Vec::new();
        for stripe in self.stripes.iter() {
            out.append(&mut stripe.lock());
        }
        self.unreserve(out.len());
        out
    }
}

impl Drop for PagesCache {
    fn drop(&mut self) {
        if let Some(limit) = &self.limit {
            limit.release(*self.len.get_mut());
        }
    }
}

impl std::fmt::Debug for PagesCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagesCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
