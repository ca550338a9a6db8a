//! Shared on-disk page header used by the page store and the free lists.

use core::convert::TryFrom;

use super::{PageId, PageListError, Result};

/// Magic bytes at the start of every initialized page.
pub const PAGE_MAGIC: [u8; 4] = *b"PGLS";
/// Newest page codec version understood by this build.
pub const PAGE_IO_LATEST_VERSION: u16 = 1;
/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: u32 = 8192;
/// Length of the fixed page header.
pub const PAGE_HDR_LEN: usize = 40;
/// List tag of a page that is not linked into any free list.
pub const UNLISTED: u16 = 0xFFFF;

pub mod header {
    //! Byte offsets for fixed header fields.
    use core::ops::Range;

    /// Magic bytes.
    pub const MAGIC: Range<usize> = 0..4;
    /// Page codec version.
    pub const IO_VERSION: Range<usize> = 4..6;
    /// [`super::PageKind`] byte.
    pub const PAGE_KIND: usize = 6;
    /// Reserved, always zero.
    pub const RESERVED: usize = 7;
    /// Page size in bytes.
    pub const PAGE_SIZE: Range<usize> = 8..12;
    /// Full page id.
    pub const PAGE_ID: Range<usize> = 12..20;
    /// Next page in the free-list chain.
    pub const NEXT_FREE: Range<usize> = 20..28;
    /// Free-space counter.
    pub const FREE_SPACE: Range<usize> = 28..32;
    /// Bucket the page is linked into, or [`super::UNLISTED`].
    pub const LIST_TAG: Range<usize> = 32..34;
    /// Reserved, always zero.
    pub const RESERVED_2: Range<usize> = 34..36;
    /// CRC32 of the page image with this field zeroed.
    pub const CRC32: Range<usize> = 36..40;
}

/// Logical type of a page.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PageKind {
    /// Free-list metadata page.
    FreeListMeta = 1,
    /// Whole page parked in a reuse bucket.
    Free = 2,
    /// Row data page.
    Data = 3,
    /// B+tree inner node.
    BTreeInner = 4,
    /// B+tree leaf node.
    BTreeLeaf = 5,
    /// Overflow row fragment.
    Overflow = 6,
}

impl PageKind {
    /// Raw kind byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PageKind {
    type Error = PageListError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(PageKind::FreeListMeta),
            2 => Ok(PageKind::Free),
            3 => Ok(PageKind::Data),
            4 => Ok(PageKind::BTreeInner),
            5 => Ok(PageKind::BTreeLeaf),
            6 => Ok(PageKind::Overflow),
            _ => Err(PageListError::Corruption("unknown page kind")),
        }
    }
}

/// Decoded page header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageHeader {
    /// Page codec version.
    pub io_version: u16,
    /// Logical page type.
    pub kind: PageKind,
    /// Page size in bytes.
    pub page_size: u32,
    /// Full page id, including flag and rotation.
    pub page_id: PageId,
    /// Next page in the free-list chain.
    pub next_free: PageId,
    /// Free bytes remaining on the page.
    pub free_space: u32,
    /// Bucket the page is linked into, or [`UNLISTED`].
    pub list_tag: u16,
    /// Stored checksum.
    pub crc32: u32,
}

impl PageHeader {
    /// Creates an unlisted header with the whole payload free.
    pub fn new(page_id: PageId, kind: PageKind, page_size: u32, io_version: u16) -> Result<Self> {
        if (page_size as usize) < PAGE_HDR_LEN {
            return Err(PageListError::Invalid("page size smaller than header"));
        }
        Ok(Self {
            io_version,
            kind,
            page_size,
            page_id,
            next_free: PageId::NONE,
            free_space: page_size - PAGE_HDR_LEN as u32,
            list_tag: UNLISTED,
            crc32: 0,
        })
    }

    /// Returns true when the page is linked into a free list.
    pub fn is_listed(&self) -> bool {
        self.list_tag != UNLISTED
    }

    /// Writes the header into `dst`.
    pub fn encode(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() < PAGE_HDR_LEN {
            return Err(PageListError::Invalid("page header buffer too small"));
        }
        let hdr = &mut dst[..PAGE_HDR_LEN];
        hdr[header::MAGIC].copy_from_slice(&PAGE_MAGIC);
        hdr[header::IO_VERSION].copy_from_slice(&self.io_version.to_be_bytes());
        hdr[header::PAGE_KIND] = self.kind.as_u8();
        hdr[header::RESERVED] = 0;
        hdr[header::PAGE_SIZE].copy_from_slice(&self.page_size.to_be_bytes());
        hdr[header::PAGE_ID].copy_from_slice(&self.page_id.0.to_be_bytes());
        hdr[header::NEXT_FREE].copy_from_slice(&self.next_free.0.to_be_bytes());
        hdr[header::FREE_SPACE].copy_from_slice(&self.free_space.to_be_bytes());
        hdr[header::LIST_TAG].copy_from_slice(&self.list_tag.to_be_bytes());
        hdr[header::RESERVED_2].fill(0);
        hdr[header::CRC32].copy_from_slice(&self.crc32.to_be_bytes());
        Ok(())
    }

    /// Parses and validates a header.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < PAGE_HDR_LEN {
            return Err(PageListError::Corruption("page header truncated"));
        }
        let hdr = &src[..PAGE_HDR_LEN];
        if hdr[header::MAGIC] != PAGE_MAGIC {
            return Err(PageListError::Corruption("invalid page magic"));
        }
        let io_version = read_u16(hdr, header::IO_VERSION.start);
        if io_version == 0 || io_version > PAGE_IO_LATEST_VERSION {
            return Err(PageListError::Corruption("unsupported page io version"));
        }
        if hdr[header::RESERVED] != 0 || hdr[header::RESERVED_2] != [0, 0] {
            return Err(PageListError::Corruption("page header reserved bytes not zero"));
        }
        let kind = PageKind::try_from(hdr[header::PAGE_KIND])?;
        let page_size = read_u32(hdr, header::PAGE_SIZE.start);
        if (page_size as usize) < PAGE_HDR_LEN {
            return Err(PageListError::Corruption("page size smaller than header"));
        }
        Ok(Self {
            io_version,
            kind,
            page_size,
            page_id: PageId(read_u64(hdr, header::PAGE_ID.start)),
            next_free: PageId(read_u64(hdr, header::NEXT_FREE.start)),
            free_space: read_u32(hdr, header::FREE_SPACE.start),
            list_tag: read_u16(hdr, header::LIST_TAG.start),
            crc32: read_u32(hdr, header::CRC32.start),
        })
    }
}

/// Returns true when `buf` starts with an initialized header.
pub fn has_header(buf: &[u8]) -> bool {
    buf.len() >= PAGE_HDR_LEN && buf[header::MAGIC] == PAGE_MAGIC
}

pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[off..off + 2]);
    u16::from_be_bytes(raw)
}

pub(crate) fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_be_bytes(raw)
}

pub(crate) fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_be_bytes(raw)
}

/// Versioned page codec for one page kind.
///
/// Used to stamp freshly allocated pages and to re-stamp recycled pages for a
/// new role.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageIo {
    kind: PageKind,
    version: u16,
}

impl PageIo {
    /// Returns the codec for `kind` at `version`.
    pub fn new(kind: PageKind, version: u16) -> Result<Self> {
        if version == 0 || version > PAGE_IO_LATEST_VERSION {
            return Err(PageListError::Invalid("unsupported page io version"));
        }
        Ok(Self { kind, version })
    }

    /// Returns the newest codec for `kind`.
    pub fn latest(kind: PageKind) -> Self {
        Self {
            kind,
            version: PAGE_IO_LATEST_VERSION,
        }
    }

    /// Page kind written by this codec.
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Codec version.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Zeroes the page and writes a fresh unlisted header.
    pub fn init_new_page(&self, buf: &mut [u8], page_id: PageId, page_size: u32) -> Result<()> {
        let len = page_size as usize;
        if buf.len() < len {
            return Err(PageListError::Invalid("page buffer shorter than page size"));
        }
        buf[..len].fill(0);
        PageHeader::new(page_id, self.kind, page_size, self.version)?.encode(&mut buf[..len])
    }
}
