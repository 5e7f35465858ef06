//! Memory management
//!
//! The loader writes to physical memory directly, at addresses taken from the kernel image. This
//! module provides the seams between the loader and the memory it writes to:
//!
//! * [`PhysicalMemory`] for copying segments into place and patching them afterwards
//! * [`KernelAllocator`] for auxiliary buffers (e.g. the relocated symbol table)
//! * [`MemoryRangeRegistry`] for recording those buffers so that later boot stages find them

mod alloc;
mod map;

pub use alloc::{BumpAllocator, KernelAllocator, PAGE_SIZE};
pub use map::{BootMemoryMap, MemoryRangeRegistry, NamedRange};

/// Write access to physical memory. Callers only pass ranges they have already validated against
/// the reserved regions.
pub trait PhysicalMemory {
    /// Returns the `length` bytes of physical memory starting at `addr`.
    fn bytes_mut(&mut self, addr: u64, length: usize) -> &mut [u8];

    /// Copy `src` to physical address `addr`.
    fn copy_to(&mut self, addr: u64, src: &[u8]) {
        self.bytes_mut(addr, src.len()).copy_from_slice(src);
    }

    /// Fill `length` bytes starting at physical address `addr` with zeroes.
    fn zero(&mut self, addr: u64, length: usize) {
        self.bytes_mut(addr, length).fill(0);
    }
}

/// Physical memory as seen by the boot loader, which runs with paging disabled: every physical
/// address is also a valid pointer.
pub struct IdentityMapped {
    _private: (),
}

impl IdentityMapped {
    /// ### Safety
    ///
    /// Physical memory must be identity mapped, and no other code may access the reserved regions
    /// while the loader runs.
    ///
    /// The image buffer itself may overlap the destination of a segment.
    /// [`PhysicalMemory::copy_to()`] moves with `memmove` semantics, so a segment is still copied
    /// correctly over its own file range.
    /// The `&[u8]` the loader holds on the image is then written to through this object: image
    /// bytes covered by a placed segment read back as placed data. Callers that allow overlap must
    /// make sure no load command, segment or symbol table the loader reads later lies in such a
    /// range.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PhysicalMemory for IdentityMapped {
    fn bytes_mut(&mut self, addr: u64, length: usize) -> &mut [u8] {
        unsafe {
            // SAFETY: Guaranteed by the contract of `IdentityMapped::new()`.
            core::slice::from_raw_parts_mut(addr as usize as *mut u8, length)
        }
    }

    fn copy_to(&mut self, addr: u64, src: &[u8]) {
        // `src` may overlap the destination, see `IdentityMapped::new()`.
        unsafe {
            core::ptr::copy(src.as_ptr(), addr as usize as *mut u8, src.len());
        }
    }

    fn zero(&mut self, addr: u64, length: usize) {
        unsafe {
            core::ptr::write_bytes(addr as usize as *mut u8, 0, length);
        }
    }
}
