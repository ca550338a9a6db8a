//! Codec for free-list metadata pages.
//!
//! Metadata pages form a chain starting at the list's root metadata page.
//! Each page stores a slice of `(bucket, stripe head)` entries, one per stripe.

use std::ops::Range;

use crate::types::page::{self, PageHeader, PageIo, PageKind, PAGE_HDR_LEN};
use crate::types::{PageId, PageListError, Result};

const META_NEXT: Range<usize> = PAGE_HDR_LEN..PAGE_HDR_LEN + 8;
const META_COUNT: Range<usize> = PAGE_HDR_LEN + 8..PAGE_HDR_LEN + 10;
const META_BUCKETS: Range<usize> = PAGE_HDR_LEN + 10..PAGE_HDR_LEN + 12;
const META_RESERVED: Range<usize> = PAGE_HDR_LEN + 12..PAGE_HDR_LEN + 16;
const META_ENTRIES: usize = PAGE_HDR_LEN + 16;

const ENTRY_LEN: usize = 16;
const ENTRY_BUCKET: Range<usize> = 0..2;
const ENTRY_RESERVED: Range<usize> = 2..8;
const ENTRY_HEAD: Range<usize> = 8..16;

/// Persisted head of one stripe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MetaEntry {
    /// Bucket owning the stripe.
    pub bucket: u16,
    /// Stripe head at persist time.
    pub head: PageId,
}

/// Decoded metadata page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetaPage {
    /// Next page of the metadata chain.
    pub next: PageId,
    /// Bucket count of the list that wrote the page.
    pub bucket_count: u16,
    /// Stripe entries stored on this page.
    pub entries: Vec<MetaEntry>,
}

/// Number of stripe entries one metadata page holds.
pub fn entries_per_page(page_size: u32) -> usize {
    (page_size as usize).saturating_sub(META_ENTRIES) / ENTRY_LEN
}

/// Formats `buf` as an empty metadata page.
pub fn init_meta_page(
    buf: &mut [u8],
    page_id: PageId,
    page_size: u32,
    bucket_count: u16,
) -> Result<()> {
    PageIo::latest(PageKind::FreeListMeta).init_new_page(buf, page_id, page_size)?;
    write_meta_page(buf, PageId::NONE, bucket_count, &[])
}

/// Rewrites the body of a metadata page. The header must already exist.
pub fn write_meta_page(
    buf: &mut [u8],
    next: PageId,
    bucket_count: u16,
    entries: &[MetaEntry],
) -> Result<()> {
    let hdr = PageHeader::decode(buf)?;
    if hdr.kind != PageKind::FreeListMeta {
        return Err(PageListError::Invalid("not a free-list metadata page"));
    }
    let capacity = entries_per_page(hdr.page_size);
    if entries.len() > capacity || buf.len() < hdr.page_size as usize {
        return Err(PageListError::Invalid("metadata entries do not fit the page"));
    }
    buf[META_NEXT].copy_from_slice(&next.0.to_be_bytes());
    buf[META_COUNT].copy_from_slice(&(entries.len() as u16).to_be_bytes());
    buf[META_BUCKETS].copy_from_slice(&bucket_count.to_be_bytes());
    buf[META_RESERVED].fill(0);
    for (i, entry) in entries.iter().enumerate() {
        let off = META_ENTRIES + i * ENTRY_LEN;
        let slot = &mut buf[off..off + ENTRY_LEN];
        slot[ENTRY_BUCKET].copy_from_slice(&entry.bucket.to_be_bytes());
        slot[ENTRY_RESERVED].fill(0);
        slot[ENTRY_HEAD].copy_from_slice(&entry.head.0.to_be_bytes());
    }
    let used_end = META_ENTRIES + entries.len() * ENTRY_LEN;
    buf[used_end..hdr.page_size as usize].fill(0);
    Ok(())
}

/// Decodes a metadata page.
pub fn read_meta_page(buf: &[u8]) -> Result<MetaPage> {
    let hdr = PageHeader::decode(buf)?;
    if hdr.kind != PageKind::FreeListMeta {
        return Err(PageListError::Corruption("expected free-list metadata page"));
    }
    if buf[META_RESERVED].iter().any(|&b| b != 0) {
        return Err(PageListError::Corruption("metadata reserved bytes not zero"));
    }
    let count = page::read_u16(buf, META_COUNT.start) as usize;
    if count > entries_per_page(hdr.page_size) {
        return Err(PageListError::Corruption("metadata entry count out of range"));
    }
    let entries = (0..count)
        .map(|i| {
            let off = META_ENTRIES + i * ENTRY_LEN;
            MetaEntry {
                bucket: page::read_u16(buf, off + ENTRY_BUCKET.start),
                head: PageId(page::read_u64(buf, off + ENTRY_HEAD.start)),
            }
        })
        .collect();
    Ok(MetaPage {
        next: PageId(page::read_u64(buf, META_NEXT.start)),
        bucket_count: page::read_u16(buf, META_BUCKETS.start),
        entries,
    })
}
