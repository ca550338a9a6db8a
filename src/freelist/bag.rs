use smallvec::SmallVec;

use crate::types::PageId;

/// Batch of page ids handed to a list in one call.
///
/// The list drains the bag; on success it is empty afterwards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReuseBag {
    pages: SmallVec<[PageId; 8]>,
}

impl ReuseBag {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag holding `pages` in order.
    pub fn with_pages(pages: impl IntoIterator<Item = PageId>) -> Self {
        pages.into_iter().collect()
    }

    /// Adds a page.
    pub fn add_free_page(&mut self, page: PageId) {
        self.pages.push(page);
    }

    /// Removes and returns the most recently added page.
    pub fn poll_free_page(&mut self) -> Option<PageId> {
        self.pages.pop()
    }

    /// Number of pages in the bag.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True if the bag holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PageId> + '_ {
        self.pages.iter()
    }

    pub(crate) fn drain_all(&mut self) -> SmallVec<[PageId; 8]> {
        std::mem::take(&mut self.pages)
    }
}

impl FromIterator<PageId> for ReuseBag {
    fn from_iter<I: IntoIterator<Item = PageId>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().collect(),
        }
    }
}

impl Extend<PageId> for ReuseBag {
    fn extend<I: IntoIterator<Item = PageId>>(&mut self, iter: I) {
        self.pages.extend(iter);
    }
}
