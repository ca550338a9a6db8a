use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::types::{GroupId, PageId};

/// Resident copy of one page.
pub(crate) struct Frame {
    pub(crate) group: GroupId,
    /// Id the frame was loaded or allocated under. Only `effective()` is stable.
    pub(crate) id: PageId,
    pub(crate) buf: RwLock<Box<[u8]>>,
    dirty: AtomicBool,
    pins: AtomicU32,
}

impl Frame {
    pub(crate) fn new(group: GroupId, id: PageId, buf: Box<[u8]>, dirty: bool) -> Self {
        Self {
            group,
            id,
            buf: RwLock::new(buf),
            dirty: AtomicBool::new(dirty),
            pins: AtomicU32::new(0),
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unpin(&self) {
        self.pins.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }
}
