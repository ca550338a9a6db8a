//! Stripes and the per-bucket stripe array.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::types::PageId;

/// One independent chain head inside a bucket.
///
/// `head` is the authoritative entry point of an on-disk chain and only moves
/// by compare-and-swap. `empty` is a hint: readers must verify it against
/// `head` before trusting it.
#[derive(Debug)]
pub struct Stripe {
    head: AtomicU64,
    empty: AtomicBool,
}

impl Stripe {
    /// Stripe whose chain starts at `head`.
    pub fn new(head: PageId) -> Self {
        Self {
            head: AtomicU64::new(head.0),
            empty: AtomicBool::new(head.is_none()),
        }
    }

    /// Stripe with no chain.
    pub fn empty() -> Self {
        Self::new(PageId::NONE)
    }

    /// Current chain head, [`PageId::NONE`] when the chain is empty.
    pub fn head(&self) -> PageId {
        PageId(self.head.load(Ordering::Acquire))
    }

    /// Moves the head from `expected` to `new`. Fails if another thread moved
    /// it first.
    pub fn cas_head(&self, expected: PageId, new: PageId) -> bool {
        self.head
            .compare_exchange(expected.0, new.0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Empty hint.
    pub fn is_empty_hint(&self) -> bool {
        self.empty.load(Ordering::Acquire)
    }

    /// Sets the empty hint.
    pub fn mark_empty(&self) {
        self.empty.store(true, Ordering::Release);
    }

    /// Clears the empty hint.
    pub fn mark_non_empty(&self) {
        self.empty.store(false, Ordering::Release);
    }
}

/// Copy-on-write array of stripes for one bucket.
///
/// Readers take a snapshot and never block. Adding or removing a stripe
/// publishes a new array by compare-and-swap against the snapshot the change
/// was computed from.
pub struct BucketArray {
    stripes: ArcSwap<Vec<Arc<Stripe>>>,
}

impl BucketArray {
    /// Array holding `stripes`.
    pub fn new(stripes: Vec<Arc<Stripe>>) -> Self {
        Self {
            stripes: ArcSwap::from_pointee(stripes),
        }
    }

    /// Array with a single empty stripe.
    pub fn with_empty_stripe() -> Self {
        Self::new(vec![Arc::new(Stripe::empty())])
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<Vec<Arc<Stripe>>> {
        self.stripes.load_full()
    }

    /// Number of stripes in the current snapshot.
    pub fn len(&self) -> usize {
        self.stripes.load().len()
    }

    /// Publishes `next` if the array still equals `observed`.
    pub fn replace(&self, observed: &Arc<Vec<Arc<Stripe>>>, next: Vec<Arc<Stripe>>) -> bool {
        let prev = self.stripes.compare_and_swap(observed, Arc::new(next));
        Arc::ptr_eq(&*prev, observed)
    }

    /// Appends `stripe` if the array still equals `observed`.
    pub fn try_push(&self, observed: &Arc<Vec<Arc<Stripe>>>, stripe: Arc<Stripe>) -> bool {
        let mut next = Vec::with_capacity(observed.len() + 1);
        next.extend(observed.iter().cloned());
        next.push(stripe);
        self.replace(observed, next)
    }

    /// Unconditionally publishes `next`. Only for exclusive phases.
    pub fn store(&self, next: Vec<Arc<Stripe>>) {
        self.stripes.store(Arc::new(next));
    }
}

impl std::fmt::Debug for BucketArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketArray")
            .field("stripes", &self.len())
            .finish()
    }
}
