use super::allocator::PageId;

/// Pages owned by one admitted job.
///
/// Not `Clone`. A block goes back to the allocator by value, at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryBlock {
    pages: Vec<PageId>,
    page_size: usize,
    requested: usize,
}

impl MemoryBlock {
    pub(crate) fn new(pages: Vec<PageId>, page_size: usize, requested: usize) -> Self {
        Self {
            pages,
            page_size,
            requested,
        }
    }

    pub fn pages(&self) -> &[PageId] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Bytes of page capacity backing this block
    pub fn capacity(&self) -> usize {
        self.pages.len() * self.page_size
    }

    /// Capacity left unused by the request
    pub fn fragmentation(&self) -> usize {
        self.capacity() - self.requested
    }

    pub(crate) fn into_pages(self) -> Vec<PageId> {
        self.pages
    }
}
