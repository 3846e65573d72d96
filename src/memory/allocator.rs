use std::collections::VecDeque;

use super::block::MemoryBlock;
use crate::config::MemoryConfig;
use crate::error::{Result, SchedError};

/// Index of a page in the allocator's arena
pub type PageId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Byte offset of the page within the pool
    pub start: usize,
}

/// Round `n` up to the next power of two. `None` for zero or on overflow.
pub fn round_up_power_of_two(n: usize) -> Option<usize> {
    if n < 1 {
        return None;
    }
    n.checked_next_power_of_two()
}

/// Owns every page of the pool and hands out blocks of them.
#[derive(Debug)]
pub struct PageAllocator {
    page_size: usize,
    total_pages: usize,
    free: VecDeque<PageId>,
}

impl PageAllocator {
    /// Build the pool from a validated configuration.
    ///
    /// Both sizes are rounded up to a power of two, then the pool is split into
    /// `total / page` pages addressed sequentially from zero, all initially free.
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;

        let total = round_up_power_of_two(config.total_memory).ok_or_else(|| {
            SchedError::Config(format!("total memory {} too large", config.total_memory))
        })?;
        let page_size = round_up_power_of_two(config.page_size).ok_or_else(|| {
            SchedError::Config(format!("page size {} too large", config.page_size))
        })?;

        let total_pages = total / page_size;
        let free = (0..total_pages).collect();

        tracing::debug!(total, page_size, pages = total_pages, "Page pool initialized");

        Ok(Self {
            page_size,
            total_pages,
            free,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn free_pages(&self) -> usize {
        self.free.len()
    }

    pub fn total_memory(&self) -> usize {
        self.total_pages * self.page_size
    }

    /// Page `id`, addressed sequentially from offset zero
    pub fn page(&self, id: PageId) -> Option<Page> {
        (id < self.total_pages).then(|| Page {
            start: id * self.page_size,
        })
    }

    /// Pages needed to hold `requested` bytes
    pub fn pages_for(&self, requested: usize) -> usize {
        requested.div_ceil(self.page_size)
    }

    /// Take enough pages from the head of the free list to cover `requested`.
    ///
    /// Either the whole block is granted or nothing changes.
    pub fn allocate(&mut self, requested: usize) -> Result<MemoryBlock> {
        let needed = self.pages_for(requested);
        if needed > self.free.len() {
            return Err(SchedError::AdmissionRejected {
                requested,
                needed,
                available: self.free.len(),
            });
        }

        let pages: Vec<PageId> = self.free.drain(..needed).collect();
        Ok(MemoryBlock::new(pages, self.page_size, requested))
    }

    /// Return every page of `block` to the tail of the free list, in block order.
    pub fn free(&mut self, block: MemoryBlock) {
        self.free.extend(block.into_pages());
        debug_assert!(self.free.len() <= self.total_pages, "page freed twice");
    }

    /// Start offsets of the pages in `block`
    pub fn addresses(&self, block: &MemoryBlock) -> Vec<usize> {
        block
            .pages()
            .iter()
            .filter_map(|&id| self.page(id).map(|p| p.start))
            .collect()
    }

    /// Free list contents from head to tail
    pub fn free_list(&self) -> impl Iterator<Item = PageId> + '_ {
        self.free.iter().copied()
    }
}
