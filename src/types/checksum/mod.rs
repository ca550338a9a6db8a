#![forbid(unsafe_code)]

use super::page::{header, PAGE_HDR_LEN};

/// Computes the page CRC with the header CRC field treated as zero.
pub fn page_image_crc32(effective_page: u64, image: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&effective_page.to_be_bytes());
    if image.len() < PAGE_HDR_LEN {
        hasher.update(image);
        return hasher.finalize();
    }
    hasher.update(&image[..header::CRC32.start]);
    hasher.update(&[0u8; 4]);
    hasher.update(&image[header::CRC32.end..]);
    hasher.finalize()
}
