use core::fmt::{Display, Formatter, Result};

use types::fmt::Fmt;
use types::mem::MemoryRegion;

use crate::Error;

/// Records named memory ranges for later boot stages (e.g. kernel extension loading).
pub trait MemoryRangeRegistry {
    fn register(&mut self, name: &'static str, region: MemoryRegion) -> core::result::Result<(), Error>;
}

/// An entry of the [`BootMemoryMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedRange {
    pub name: &'static str,
    pub region: MemoryRegion,
}

/// Fixed-capacity table of named memory ranges. It lives in static memory, so registering a range
/// never allocates.
#[derive(Debug, Default)]
pub struct BootMemoryMap<const N: usize = 16> {
    ranges: heapless::Vec<NamedRange, N>,
}

impl<const N: usize> BootMemoryMap<N> {
    pub const fn new() -> Self {
        Self {
            ranges: heapless::Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.ranges.iter()
    }

    pub fn find(&self, name: &str) -> Option<&NamedRange> {
        self.ranges.iter().find(|range| range.name == name)
    }
}

impl<const N: usize> MemoryRangeRegistry for BootMemoryMap<N> {
    fn register(&mut self, name: &'static str, region: MemoryRegion) -> core::result::Result<(), Error> {
        log::debug!("Memory range {name}: {region}");
        self.ranges
            .push(NamedRange { name, region })
            .map_err(|_| Error::OutOfMemory)
    }
}

impl<const N: usize> Display for BootMemoryMap<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let total = self
            .ranges
            .iter()
            .map(|range| -> core::result::Result<u64, core::fmt::Error> {
                writeln!(f, "├─ {}: {}", range.name, range.region)?;
                Ok(range.region.length)
            })
            .sum::<core::result::Result<u64, _>>()?;

        writeln!(f, "└─ total memory recorded: {}", Fmt::<u64>::from(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;
    use types::mem::MemoryRegionType;

    fn region(base_addr: u64, length: u64) -> MemoryRegion {
        MemoryRegion::new(base_addr, length, MemoryRegionType::Auxiliary)
    }

    #[test]
    fn register_and_find() {
        let mut map = BootMemoryMap::<4>::new();
        map.register("Kernel-__SYMTAB", region(0x20_0000, 0x3000)).unwrap();
        map.register("RAMDisk", region(0x30_0000, 0x1000)).unwrap();

        assert_eq!(map.iter().count(), 2);
        assert_eq!(map.find("Kernel-__SYMTAB").map(|r| r.region.base_addr), Some(0x20_0000));
        assert!(map.find("Driver-0").is_none());
        assert_eq!(
            format!("{map}"),
            "├─ Kernel-__SYMTAB: @ 0x200000: 12 KiB (auxiliary)\n\
             ├─ RAMDisk: @ 0x300000: 4096 B (auxiliary)\n\
             └─ total memory recorded: 16 KiB\n"
        );
    }

    #[test]
    fn full_map() {
        let mut map = BootMemoryMap::<1>::new();
        map.register("a", region(0, 1)).unwrap();
        assert_eq!(map.register("b", region(1, 1)), Err(Error::OutOfMemory));
        assert_eq!(map.iter().count(), 1);
    }
}
