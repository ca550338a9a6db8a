use std::sync::{Arc, Weak};

use parking_lot::{RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};

use super::frame::Frame;
use crate::primitives::concurrency::CheckpointLock;
use crate::types::{GroupId, PageFlag, PageId, Result};

/// Callback run by a checkpointer while it holds the exclusive side of the
/// [`CheckpointLock`].
///
/// Implementations must not enter the shared side of the same lock.
pub trait CheckpointListener: Send + Sync + 'static {
    /// Persists in-memory state that must be part of the checkpoint.
    fn on_checkpoint_begin(&self) -> Result<()>;
}

/// Page storage consumed by the free-list engine.
pub trait PageStore: Send + Sync + 'static {
    /// Returns the page size in bytes.
    fn page_size(&self) -> u32;
    /// Pins a page. The pin is released when the handle drops.
    fn acquire_page(&self, group: GroupId, id: PageId) -> Result<PageHandle>;
    /// Allocates a fresh, zeroed page at the end of the partition.
    fn allocate_page(&self, group: GroupId, partition: u16, flag: PageFlag) -> Result<PageId>;
    /// Returns a page to the store. Fails if the page is pinned.
    fn free_page(&self, group: GroupId, id: PageId) -> Result<()>;
    /// Lock shared between mutators and the checkpointer.
    fn checkpoint_lock(&self) -> &CheckpointLock;
    /// Registers a checkpoint callback.
    fn register_checkpoint_listener(&self, _listener: Weak<dyn CheckpointListener>) {}
}

/// A pinned page.
pub struct PageHandle {
    id: PageId,
    frame: Arc<Frame>,
}

impl PageHandle {
    pub(crate) fn new(id: PageId, frame: Arc<Frame>) -> Self {
        frame.pin();
        Self { id, frame }
    }

    /// Id the page was acquired under.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Takes the shared page lock.
    pub fn read(&self) -> PageReadGuard<'_> {
        PageReadGuard {
            guard: self.frame.buf.read(),
        }
    }

    /// Takes the exclusive page lock.
    pub fn write(&self) -> PageWriteGuard<'_> {
        PageWriteGuard {
            frame: &self.frame,
            guard: self.frame.buf.write(),
        }
    }

    /// Takes a shared lock that can later be upgraded without releasing it.
    ///
    /// Only one upgradable guard exists per page at a time, so two threads
    /// cannot both decide to mutate based on the same read.
    pub fn upgradable(&self) -> PageUpgradableGuard<'_> {
        PageUpgradableGuard {
            frame: &self.frame,
            guard: self.frame.buf.upgradable_read(),
        }
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("group", &self.frame.group)
            .field("id", &self.id)
            .finish()
    }
}

/// Shared page lock.
pub struct PageReadGuard<'a> {
    guard: RwLockReadGuard<'a, Box<[u8]>>,
}

impl PageReadGuard<'_> {
    /// Page image.
    pub fn data(&self) -> &[u8] {
        &self.guard
    }
}

/// Exclusive page lock.
pub struct PageWriteGuard<'a> {
    frame: &'a Frame,
    guard: RwLockWriteGuard<'a, Box<[u8]>>,
}

impl PageWriteGuard<'_> {
    /// Page image.
    pub fn data(&self) -> &[u8] {
        &self.guard
    }

    /// Mutable page image. Marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.frame.mark_dirty();
        &mut self.guard
    }
}

/// Upgradable page lock.
pub struct PageUpgradableGuard<'a> {
    frame: &'a Frame,
    guard: RwLockUpgradableReadGuard<'a, Box<[u8]>>,
}

impl<'a> PageUpgradableGuard<'a> {
    /// Page image.
    pub fn data(&self) -> &[u8] {
        &self.guard
    }

    /// Atomically converts into an exclusive lock.
    pub fn upgrade(self) -> PageWriteGuard<'a> {
        PageWriteGuard {
            frame: self.frame,
            guard: RwLockUpgradableReadGuard::upgrade(self.guard),
        }
    }
}
