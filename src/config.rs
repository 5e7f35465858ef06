//! Platform constants and the per-boot loader configuration.
//!
//! The configuration is assembled once by the boot stage before loading begins:
//!
//! ```
//! use loader::{Arch, LoaderConfig};
//!
//! const CONFIG: LoaderConfig = LoaderConfig::new(Arch::X86_64)
//!     .with_kernel_region(0x0010_0000, 0x0800_0000)
//!     .relocate_symbols(true);
//! ```

use macho::Arch;
use types::mem::{MemoryRegion, MemoryRegionType};

use crate::patch::PatchScope;
use crate::Error;

/// Physical base address of the memory reserved for the kernel image.
pub const KERNEL_ADDR: u64 = 0x0010_0000;

/// Size of the memory reserved for the kernel image (128 MiB).
pub const KERNEL_LEN: u64 = 0x0800_0000;

/// Physical base address of the special area used by hibernation image restore code.
pub const HIB_ADDR: u64 = 0x0000_4000;

/// Size of the hibernation area.
pub const HIB_LEN: u64 = 0x0006_0000;

/// Segment addresses and the entry point are reduced to their low 30 bits. The kernel is linked
/// at a high virtual address but gets loaded at the corresponding low physical address.
pub const ADDRESS_MASK: u64 = 0x3fff_ffff;

/// Segments of a prelinked kernel (kernel and extensions in one image) use names starting with
/// this prefix, e.g. `__PRELINK_TEXT` or `__PRELINK_INFO`.
pub const PRELINK_PREFIX: &str = "__PRELINK";

/// Name under which the relocated symbol table is recorded in the boot memory map.
pub const SYMTAB_RANGE_NAME: &str = "Kernel-__SYMTAB";

/// Everything the loader needs to know about the platform and the build.
#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    /// Architecture of the kernel to load.
    pub arch: Arch,

    /// Every segment must fit entirely into this region or into [`Self::hibernate_region`].
    pub kernel_region: MemoryRegion,

    pub hibernate_region: MemoryRegion,

    /// Signature patches to run on freshly placed segments.
    pub patches: &'static [PatchScope],

    /// Whether to copy the symbol table into its own memory range after loading.
    pub relocate_symbols: bool,
}

impl LoaderConfig {
    /// Configuration with the built-in platform regions, no patches and no symbol table
    /// relocation. Use the builder methods to change it.
    pub const fn new(arch: Arch) -> Self {
        Self {
            arch,
            kernel_region: MemoryRegion::new(KERNEL_ADDR, KERNEL_LEN, MemoryRegionType::Kernel),
            hibernate_region: MemoryRegion::new(HIB_ADDR, HIB_LEN, MemoryRegionType::Hibernation),
            patches: &[],
            relocate_symbols: false,
        }
    }

    /// Configuration as selected by the enabled cargo features.
    pub fn default_for(arch: Arch) -> Self {
        Self::new(arch)
            .with_patches(crate::patch::builtin_scopes())
            .relocate_symbols(cfg!(feature = "symtab"))
    }

    /// Like [`Self::default_for()`], for the raw CPU type handed over by the boot stage.
    pub fn from_cpu_type(cpu_type: u32) -> Result<Self, Error> {
        Ok(Self::default_for(Arch::from_cpu_type(cpu_type)?))
    }

    pub const fn with_kernel_region(self, base_addr: u64, length: u64) -> Self {
        Self {
            kernel_region: MemoryRegion::new(base_addr, length, MemoryRegionType::Kernel),
            ..self
        }
    }

    pub const fn with_hibernate_region(self, base_addr: u64, length: u64) -> Self {
        Self {
            hibernate_region: MemoryRegion::new(base_addr, length, MemoryRegionType::Hibernation),
            ..self
        }
    }

    pub const fn with_patches(self, patches: &'static [PatchScope]) -> Self {
        Self { patches, ..self }
    }

    pub const fn relocate_symbols(self, relocate_symbols: bool) -> Self {
        Self {
            relocate_symbols,
            ..self
        }
    }

    /// The reserved region that fully contains `[addr, addr + length)`, if any.
    pub fn region_for(&self, addr: u64, length: u64) -> Option<&MemoryRegion> {
        [&self.kernel_region, &self.hibernate_region]
            .into_iter()
            .find(|region| region.contains(addr, length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        const CONFIG: LoaderConfig = LoaderConfig::new(Arch::I386)
            .with_kernel_region(0x20_0000, 0x1000)
            .with_hibernate_region(0x8000, 0x100)
            .relocate_symbols(true);

        assert_eq!(CONFIG.arch, Arch::I386);
        assert_eq!(CONFIG.kernel_region.base_addr, 0x20_0000);
        assert_eq!(CONFIG.kernel_region.class, MemoryRegionType::Kernel);
        assert_eq!(CONFIG.hibernate_region.end_addr(), 0x8100);
        assert!(CONFIG.relocate_symbols);
        assert!(CONFIG.patches.is_empty());
    }

    #[test]
    fn region_lookup() {
        let config = LoaderConfig::new(Arch::X86_64);
        assert_eq!(
            config.region_for(KERNEL_ADDR, 0x1000).map(|r| r.class),
            Some(MemoryRegionType::Kernel)
        );
        assert_eq!(
            config.region_for(HIB_ADDR + 0x100, 0x100).map(|r| r.class),
            Some(MemoryRegionType::Hibernation)
        );
        // Straddles the end of the hibernation area.
        assert_eq!(config.region_for(HIB_ADDR + HIB_LEN - 0x10, 0x20), None);
        assert_eq!(config.region_for(KERNEL_ADDR + KERNEL_LEN, 1), None);
    }

    #[test]
    fn raw_cpu_types() {
        assert_eq!(
            LoaderConfig::from_cpu_type(0x0100_0007).map(|c| c.arch),
            Ok(Arch::X86_64)
        );
        assert_eq!(
            LoaderConfig::from_cpu_type(0).map(|c| c.arch),
            Err(Error::UnsupportedArchitecture)
        );
        assert_eq!(
            LoaderConfig::default_for(Arch::I386).relocate_symbols,
            cfg!(feature = "symtab")
        );
    }
}
