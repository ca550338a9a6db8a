use std::fmt;

use serde::Serialize;

/// Per-bucket figures.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BucketStats {
    /// Bucket index.
    pub bucket: usize,
    /// Stripes in the bucket.
    pub stripes: usize,
    /// Pages tracked by the bucket, cached ones included.
    pub stored_pages: u64,
    /// Pages currently in the bucket cache.
    pub cached_pages: usize,
}

/// Snapshot returned by `PagesList::stats`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FreeListStats {
    /// List name.
    pub name: String,
    /// Per-bucket figures, in bucket order.
    pub buckets: Vec<BucketStats>,
    /// Takes served by a cache.
    pub cache_hits: u64,
    /// Pages accepted by a cache on put.
    pub cache_puts: u64,
    /// Failed stripe head CAS attempts.
    pub cas_retries: u64,
    /// Stripes added under contention.
    pub stripes_added: u64,
    /// Pages allocated because nothing could be reused.
    pub allocated_no_reuse: u64,
    /// Metadata persists.
    pub metadata_writes: u64,
}

impl FreeListStats {
    /// Pages tracked across all buckets.
    pub fn total_pages(&self) -> u64 {
        self.buckets.iter().map(|b| b.stored_pages).sum()
    }
}

impl fmt::Display for FreeListStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} pages={} cache_hits={} cache_puts={} cas_retries={} stripes_added={} allocated_no_reuse={} metadata_writes={}",
            self.name,
            self.total_pages(),
            self.cache_hits,
            self.cache_puts,
            self.cas_retries,
            self.stripes_added,
            self.allocated_no_reuse,
            self.metadata_writes
        )?;
        for bucket in &self.buckets {
            if bucket.stored_pages == 0 && bucket.stripes <= 1 {
                continue;
            }
            writeln!(
                f,
                "  bucket {:>3}: stripes={} pages={} cached={}",
                bucket.bucket, bucket.stripes, bucket.stored_pages, bucket.cached_pages
            )?;
        }
        Ok(())
    }
}
