use core::ops::Range;

use types::mem::MemoryRegion;

pub const PAGE_SIZE: u64 = 0x1000;

/// Source of physical memory for buffers the kernel picks up after boot.
pub trait KernelAllocator {
    /// Reserve `size` bytes and return the physical address of the reservation, or `None` if the
    /// request cannot be satisfied.
    fn allocate(&mut self, size: u64) -> Option<u64>;
}

/// Allocates by incrementing the start address in page-sized steps. This allocator cannot
/// deallocate.
#[derive(Debug, Clone)]
pub struct BumpAllocator {
    range: Range<u64>,
}

impl BumpAllocator {
    pub fn new(range: Range<u64>) -> Self {
        Self {
            range: align_up(range.start)..range.end,
        }
    }

    /// Allocate from the part of `region` that lies above `image_end`, i.e. right behind the
    /// loaded kernel.
    pub fn above(region: MemoryRegion, image_end: u64) -> Self {
        match region.crop_start(image_end) {
            Some(free) => Self::new(free.base_addr..free.end_addr()),
            None => Self::new(region.end_addr()..region.end_addr()),
        }
    }

    /// Address of the next allocation.
    pub fn next_addr(&self) -> u64 {
        self.range.start
    }
}

impl KernelAllocator for BumpAllocator {
    fn allocate(&mut self, size: u64) -> Option<u64> {
        let size = align_up(size.max(1));
        let addr = self.range.start;
        let end = addr.checked_add(size).filter(|&end| end <= self.range.end)?;
        self.range.start = end;
        Some(addr)
    }
}

fn align_up(addr: u64) -> u64 {
    addr.saturating_add(PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}
