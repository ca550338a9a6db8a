//! Identifiers, page header codec and the crate error type.

#![forbid(unsafe_code)]

use std::fmt;

use serde::Serialize;

/// CRC32 helpers for page images.
pub mod checksum;
pub mod page;

pub use checksum::page_image_crc32;

/// Partition used for index and metadata pages of a group.
pub const INDEX_PARTITION: u16 = 0xFFFF;

const INDEX_BITS: u32 = 32;
const PARTITION_SHIFT: u32 = 32;
const FLAG_SHIFT: u32 = 48;
const ROTATION_SHIFT: u32 = 56;
const EFFECTIVE_MASK: u64 = (1 << FLAG_SHIFT) - 1;

/// Identifier of a page group (a table, an index tree, a partition set).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct GroupId(pub u32);

/// Page identifier.
///
/// Bits `0..32` hold the page index, `32..48` the partition, `48..56` the
/// [`PageFlag`] and `56..64` a rotation counter bumped whenever a recycled
/// page is re-stamped for a new role. Only the partition and index address
/// storage; see [`PageId::effective`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct PageId(pub u64);

/// Type flag carried by every page id.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum PageFlag {
    /// Row / data pages.
    Data = 1,
    /// Index and metadata pages.
    Index = 2,
    /// Auxiliary pages.
    Aux = 4,
}

impl PageFlag {
    /// Raw flag byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a raw flag byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PageFlag::Data),
            2 => Some(PageFlag::Index),
            4 => Some(PageFlag::Aux),
            _ => None,
        }
    }
}

impl PageId {
    /// Chain sentinel. Never a real page because real ids carry a flag.
    pub const NONE: PageId = PageId(0);

    /// Builds a page id with rotation 0.
    pub const fn new(partition: u16, flag: PageFlag, index: u32) -> Self {
        PageId(
            (index as u64)
                | ((partition as u64) << PARTITION_SHIFT)
                | ((flag as u64) << FLAG_SHIFT),
        )
    }

    /// Returns true for the chain sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Page index within its partition.
    pub const fn index(self) -> u32 {
        (self.0 & ((1 << INDEX_BITS) - 1)) as u32
    }

    /// Partition number.
    pub const fn partition(self) -> u16 {
        ((self.0 >> PARTITION_SHIFT) & 0xFFFF) as u16
    }

    /// Type flag, if the flag byte is a known value.
    pub fn flag(self) -> Option<PageFlag> {
        PageFlag::from_u8(((self.0 >> FLAG_SHIFT) & 0xFF) as u8)
    }

    /// Rotation counter.
    pub const fn rotation(self) -> u8 {
        (self.0 >> ROTATION_SHIFT) as u8
    }

    /// Storage key: partition and index only.
    pub const fn effective(self) -> u64 {
        self.0 & EFFECTIVE_MASK
    }

    /// Same page with a different type flag.
    pub const fn with_flag(self, flag: PageFlag) -> Self {
        PageId((self.0 & !(0xFF << FLAG_SHIFT)) | ((flag as u64) << FLAG_SHIFT))
    }

    /// Same page with the rotation counter advanced, skipping zero on wrap.
    pub const fn rotate(self) -> Self {
        let next = match self.rotation().wrapping_add(1) {
            0 => 1,
            r => r,
        };
        PageId((self.0 & !(0xFF << ROTATION_SHIFT)) | ((next as u64) << ROTATION_SHIFT))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised by the page store and the free-list engine.
#[derive(thiserror::Error, Debug)]
pub enum PageListError {
    /// I/O failure in the page store.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// The partition ran out of page indexes.
    #[error("out of space: {0}")]
    OutOfSpace(&'static str),
    /// Page was never allocated or has been freed.
    #[error("not found")]
    NotFound,
    /// Invalid argument or use of an invalidated structure.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// On-disk structure is corrupted.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A structural invariant was broken by a caller.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

impl PageListError {
    /// True when the structure itself is broken and retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PageListError::Corruption(_) | PageListError::InvariantViolation(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PageListError>;
