#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Coordinates page mutations with checkpoints.
///
/// Mutators hold the shared side for the duration of one operation. A
/// checkpoint holds the exclusive side while free-list state is persisted and
/// dirty pages are flushed, so a checkpoint never observes a half-applied
/// operation. Shared acquisition is recursive: an operation that re-enters the
/// lock on the same thread cannot deadlock behind a waiting checkpoint.
#[derive(Clone, Default)]
pub struct CheckpointLock {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    lock: RwLock<()>,
    readers: AtomicU32,
    checkpoint: AtomicBool,
}

/// Snapshot of lock state for observability.
#[derive(Default, Debug, Clone, Copy)]
pub struct LockSnapshot {
    /// Operations currently holding the shared side.
    pub readers: u32,
    /// Whether a checkpoint holds the exclusive side.
    pub checkpoint: bool,
}

/// Shared side of a [`CheckpointLock`].
pub struct OperationGuard<'a> {
    inner: &'a Inner,
    _guard: RwLockReadGuard<'a, ()>,
}

/// Exclusive side of a [`CheckpointLock`].
pub struct CheckpointGuard<'a> {
    inner: &'a Inner,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl CheckpointLock {
    /// Creates an unlocked coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters one mutating operation.
    pub fn operation(&self) -> OperationGuard<'_> {
        let guard = self.inner.lock.read_recursive();
        self.inner.readers.fetch_add(1, Ordering::AcqRel);
        OperationGuard {
            inner: &self.inner,
            _guard: guard,
        }
    }

    /// Waits for in-flight operations and blocks new ones.
    pub fn checkpoint(&self) -> CheckpointGuard<'_> {
        let guard = self.inner.lock.write();
        self.inner.checkpoint.store(true, Ordering::Release);
        CheckpointGuard {
            inner: &self.inner,
            _guard: guard,
        }
    }

    /// Returns a snapshot of the current lock state.
    pub fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            readers: self.inner.readers.load(Ordering::Acquire),
            checkpoint: self.inner.checkpoint.load(Ordering::Acquire),
        }
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.inner.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for CheckpointGuard<'_> {
    fn drop(&mut self) {
        self.inner.checkpoint.store(false, Ordering::Release);
    }
}
