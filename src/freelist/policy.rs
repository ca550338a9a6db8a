//! Mapping from free space to bucket index.

use crate::types::page::{PAGE_HDR_LEN, UNLISTED};
use crate::types::{PageListError, Result};

/// Decides how many buckets a list has and which bucket a page belongs to.
///
/// The bucket count and the mapping are fixed for the lifetime of a list.
pub trait BucketPolicy: Send + Sync + 'static {
    /// Number of buckets.
    fn buckets(&self) -> usize;

    /// Bucket for a data page with `free_space` bytes available.
    fn bucket_index(&self, free_space: usize) -> usize;

    /// True if pages in `bucket` are whole free pages rather than partially
    /// filled data pages.
    fn is_reuse_bucket(&self, bucket: usize) -> bool;

    /// The bucket holding whole free pages, if the list has one.
    fn reuse_bucket(&self) -> Option<usize>;

    /// Free space every page of data bucket `bucket` is guaranteed to have.
    fn bucket_floor(&self, bucket: usize) -> usize;
}

/// Size-class buckets for data pages plus one trailing reuse bucket.
///
/// Data bucket `b` holds pages with free space in `[b << shift, (b + 1) << shift)`,
/// the last data bucket is open ended. Pages whose whole payload is free go to
/// the reuse bucket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SizeClassPolicy {
    buckets: usize,
    shift: u32,
    payload: usize,
}

impl SizeClassPolicy {
    /// Builds a policy for pages of `page_size` bytes split into `buckets`
    /// buckets (the last one being the reuse bucket).
    pub fn new(page_size: u32, buckets: usize) -> Result<Self> {
        if buckets < 2 {
            return Err(PageListError::Invalid(
                "size-class policy needs at least two buckets",
            ));
        }
        if buckets >= UNLISTED as usize {
            return Err(PageListError::Invalid("too many buckets"));
        }
        let page_size = page_size as usize;
        if page_size <= PAGE_HDR_LEN {
            return Err(PageListError::Invalid("page size smaller than header"));
        }
        let data_buckets = buckets - 1;
        let width = page_size.div_ceil(data_buckets).max(1);
        let shift = width.next_power_of_two().trailing_zeros();
        Ok(Self {
            buckets,
            shift,
            payload: page_size - PAGE_HDR_LEN,
        })
    }

    /// Width of one size class as a power of two.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Usable bytes of a page.
    pub fn payload(&self) -> usize {
        self.payload
    }

    /// First data bucket whose pages all have at least `required` free bytes.
    pub fn first_bucket_for(&self, required: usize) -> usize {
        let mut bucket = required >> self.shift;
        if self.bucket_floor(bucket) < required {
            bucket += 1;
        }
        bucket
    }
}

impl BucketPolicy for SizeClassPolicy {
    fn buckets(&self) -> usize {
        self.buckets
    }

    fn bucket_index(&self, free_space: usize) -> usize {
        if free_space >= self.payload {
            return self.buckets - 1;
        }
        (free_space >> self.shift).min(self.buckets - 2)
    }

    fn is_reuse_bucket(&self, bucket: usize) -> bool {
        bucket == self.buckets - 1
    }

    fn reuse_bucket(&self) -> Option<usize> {
        Some(self.buckets - 1)
    }

    fn bucket_floor(&self, bucket: usize) -> usize {
        bucket << self.shift
    }
}

/// One bucket, always the reuse bucket. Used to recycle index pages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SingleBucket;

impl BucketPolicy for SingleBucket {
    fn buckets(&self) -> usize {
        1
    }

    fn bucket_index(&self, _free_space: usize) -> usize {
        0
    }

    // Callers check `bucket < buckets()` before asking, so only 0 reaches here.
    fn is_reuse_bucket(&self, bucket: usize) -> bool {
        debug_assert_eq!(bucket, 0, "single-bucket list has only bucket 0");
        true
    }

    fn reuse_bucket(&self) -> Option<usize> {
        Some(0)
    }

    fn bucket_floor(&self, _bucket: usize) -> usize {
        0
    }
}
