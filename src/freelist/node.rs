//! Link fields of pages parked in a free list.
//!
//! A listed page carries the bucket it belongs to in the header list tag and
//! the next page of its chain in the next-free field. Pages in a reuse bucket
//! are re-stamped as [`PageKind::Free`]; data pages keep their kind.

use crate::types::page::{
    self, header, PageHeader, PageKind, PAGE_IO_LATEST_VERSION, UNLISTED,
};
use crate::types::{PageId, PageListError, Result};

/// Prepares `buf` to be linked into `bucket`.
///
/// The page is left as the tail of a one-page chain.
pub fn stamp_free(
    buf: &mut [u8],
    page_id: PageId,
    page_size: u32,
    bucket: u16,
    reuse: bool,
    free_space: Option<u32>,
) -> Result<()> {
    let mut hdr = if reuse {
        PageHeader::new(page_id, PageKind::Free, page_size, PAGE_IO_LATEST_VERSION)?
    } else {
        if !page::has_header(buf) {
            return Err(PageListError::Invalid("data page has no header"));
        }
        PageHeader::decode(buf)?
    };
    if let Some(free_space) = free_space {
        hdr.free_space = free_space;
    }
    hdr.next_free = PageId::NONE;
    hdr.list_tag = bucket;
    hdr.encode(buf)
}

/// Points the page at `next`.
pub fn set_next(buf: &mut [u8], next: PageId) {
    buf[header::NEXT_FREE].copy_from_slice(&next.0.to_be_bytes());
}

/// Reads the next pointer of a page that must be listed in `bucket`.
pub fn read_link(buf: &[u8], bucket: u16) -> Result<PageId> {
    if !page::has_header(buf) {
        return Err(PageListError::Corruption("free-list page has no header"));
    }
    let tag = page::read_u16(buf, header::LIST_TAG.start);
    if tag != bucket {
        return Err(PageListError::Corruption(
            "free-list page carries a foreign bucket tag",
        ));
    }
    Ok(PageId(page::read_u64(buf, header::NEXT_FREE.start)))
}

/// Bucket the page is listed in, if any.
pub fn list_tag(buf: &[u8]) -> Option<u16> {
    if !page::has_header(buf) {
        return None;
    }
    match page::read_u16(buf, header::LIST_TAG.start) {
        UNLISTED => None,
        tag => Some(tag),
    }
}

/// Marks the page as no longer listed.
pub fn clear_link(buf: &mut [u8]) {
    if !page::has_header(buf) {
        return;
    }
    buf[header::NEXT_FREE].copy_from_slice(&PageId::NONE.0.to_be_bytes());
    buf[header::LIST_TAG].copy_from_slice(&UNLISTED.to_be_bytes());
}
