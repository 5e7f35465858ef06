//! Segment placement
//!
//! Every segment is copied to the physical address derived from its `vmaddr`. The destination
//! must lie entirely within one of the two reserved regions; anything else would overwrite the
//! boot loader itself or firmware data, so it halts the boot instead of returning an error.

use macho::Segment;
use types::fmt::Fmt;

use crate::config::{ADDRESS_MASK, PRELINK_PREFIX};
use crate::mem::PhysicalMemory;
use crate::{patch, Error, LoaderConfig};

/// Destination address reported for empty segments.
pub const UNSET: u64 = u64::MAX;

/// Where a segment went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Physical address, or [`UNSET`] for an empty segment.
    pub addr: u64,
    /// Size in memory, 0 for an empty segment.
    pub size: u64,
    /// The segment belongs to a prelinked kernel that already contains its extensions.
    pub prelinked: bool,
}

impl Placement {
    const EMPTY: Self = Self {
        addr: UNSET,
        size: 0,
        prelinked: false,
    };

    pub const fn end_addr(&self) -> u64 {
        self.addr.saturating_add(self.size)
    }
}

/// Copy `segment` from `image` to its physical address, zero-fill the rest of its memory size
/// and run the configured patches on it.
///
/// Segments with a zero memory or file size are not touched at all. If the destination is not
/// fully contained in the kernel or hibernation region, this function does not return.
pub fn place(
    segment: &Segment,
    image: &[u8],
    config: &LoaderConfig,
    memory: &mut dyn PhysicalMemory,
) -> Result<Placement, Error> {
    if segment.vmsize == 0 || segment.filesize == 0 {
        log::debug!("{}: empty, not placed", segment.name());
        return Ok(Placement::EMPTY);
    }

    let addr = segment.vmaddr & ADDRESS_MASK;
    let size = segment.vmsize;

    let Some(region) = config.region_for(addr, size) else {
        kernel_overflow(segment, addr, size, config);
    };

    let copied = segment.filesize.min(size);
    let source = usize::try_from(segment.fileoff)
        .ok()
        .zip(usize::try_from(copied).ok())
        .and_then(|(start, len)| image.get(start..start.checked_add(len)?))
        .ok_or(Error::BadMagic)?;

    log::debug!(
        "{}: {:#x}..{:#x} ({}) in {} region",
        segment.name(),
        addr,
        addr + size,
        Fmt::<u64>::from(size),
        region.class
    );

    memory.copy_to(addr, source);
    if size > copied {
        // Bounded by the region length, fits into usize.
        memory.zero(addr + copied, (size - copied) as usize);
    }

    if !config.patches.is_empty() {
        let placed = memory.bytes_mut(addr, source.len());
        patch::patch_segment(config.patches, segment, placed);
    }

    Ok(Placement {
        addr,
        size,
        prelinked: segment.name_starts_with(PRELINK_PREFIX),
    })
}

/// Logs the offending segment and panics. The boot binary's `#[panic_handler]` must halt the
/// core instead of returning to the loader.
#[cold]
fn kernel_overflow(segment: &Segment, addr: u64, size: u64, config: &LoaderConfig) -> ! {
    log::error!(
        "{}: {:#x}..{:#x} is neither in the {} nor in the {}",
        segment.name(),
        addr,
        addr.saturating_add(size),
        config.kernel_region,
        config.hibernate_region
    );
    panic!("Kernel overflows available space");
}
