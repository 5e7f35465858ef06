use core::cmp::max;
use core::fmt::{Display, Formatter, Result};

use crate::fmt::Fmt;

/// A contiguous range of physical memory.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base_addr: u64,
    pub length: u64,
    pub class: MemoryRegionType,
}

impl MemoryRegion {
    pub const fn new(base_addr: u64, length: u64, class: MemoryRegionType) -> Self {
        Self {
            base_addr,
            length,
            class,
        }
    }

    pub fn crop_start(self, min_addr: u64) -> Option<Self> {
        if min_addr < self.end_addr() {
            let base_addr = max(self.base_addr, min_addr);
            Some(Self {
                base_addr,
                length: self.end_addr() - base_addr,
                ..self
            })
        } else {
            None
        }
    }

    pub const fn end_addr(&self) -> u64 {
        self.base_addr + self.length
    }

    /// Whether `[start, start + length)` lies entirely within this region. A range whose end
    /// overflows the address space is never contained.
    pub const fn contains(&self, start: u64, length: u64) -> bool {
        match start.checked_add(length) {
            Some(end) => start >= self.base_addr && end <= self.end_addr(),
            None => false,
        }
    }
}

impl core::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "(@ 0x{:x}, len: {} KiB, {})",
            self.base_addr,
            self.length / 1024,
            self.class,
        )
    }
}

impl Display for MemoryRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "@ 0x{:x}: {} ({})",
            self.base_addr,
            Fmt::<u64>::from(self.length),
            self.class
        )
    }
}

/// What a [`MemoryRegion`] is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegionType {
    /// Destination of the kernel image segments.
    Kernel,
    /// Special area for the hibernation image restore code.
    Hibernation,
    /// Memory handed out by the loader for data the kernel picks up later.
    Auxiliary,
}

impl Display for MemoryRegionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(match self {
            Self::Kernel => "kernel",
            Self::Hibernation => "hibernation",
            Self::Auxiliary => "auxiliary",
        })
    }
}
