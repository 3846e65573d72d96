//! Fixed-capacity paged memory for admitted jobs.
//!
//! The pool is an arena of equally sized pages addressed by index. Free pages
//! sit in a FIFO free list; an allocation takes pages from its head and a
//! release appends them to its tail in block order. Nothing is ever compacted,
//! so the only waste tracked is the per-block gap between requested bytes and
//! page capacity.

pub mod allocator;
pub mod block;

pub use allocator::{round_up_power_of_two, Page, PageAllocator, PageId};
pub use block::MemoryBlock;
