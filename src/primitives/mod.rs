//! Low-level primitives the free lists are built on.
//!
//! Includes positioned file I/O, the checkpoint lock and the page store.

/// Coordination between page mutators and checkpoints.
pub mod concurrency;

/// Positioned file I/O.
pub mod io;

/// Page store interface and the file-backed reference store.
///
/// Pins pages, hands out page locks and persists dirty pages on checkpoint.
pub mod pager;
