//! Loading a Mach-O kernel image
//!
//! [`decode_kernel()`] takes the file as the boot stage read it and runs the whole pipeline.
//! [`decode_macho()`] does the actual work on a thin image: it walks the load command table once,
//! places every segment and recovers the entry point, then optionally walks it a second time to
//! relocate the symbol table.

use macho::{CommandKind, LoadCommands, MachHeader};
use types::fmt::Fmt;

use crate::config::ADDRESS_MASK;
use crate::mem::{KernelAllocator, MemoryRangeRegistry, PhysicalMemory};
use crate::{kernelcache, Error, LoaderConfig};

pub mod segment;
pub mod symtab;

pub use segment::{Placement, UNSET};
pub use symtab::RelocatedSymbols;

/// The collaborators the loader writes through.
pub struct BootServices<'a> {
    pub memory: &'a mut dyn PhysicalMemory,
    pub allocator: &'a mut dyn KernelAllocator,
    pub registry: &'a mut dyn MemoryRangeRegistry,
}

/// Where the kernel ended up and how to start it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Physical address of the first instruction.
    pub entry: u64,
    /// Lowest address of any segment placed in or above the kernel region, or [`UNSET`].
    pub base: u64,
    /// Distance from `base` to the end of the highest such segment.
    pub size: u64,
    /// The kernel is prelinked: extensions must not be loaded separately.
    pub suppress_extensions: bool,
    /// The relocated symbol table, if relocation was enabled and succeeded.
    pub symbols: Option<RelocatedSymbols>,
}

/// State accumulated while walking the load commands of one image.
struct LoadContext {
    /// Segments below this address are placed but do not count towards the image size.
    threshold: u64,
    bounds: Option<(u64, u64)>,
    entry: Option<u64>,
    main_offset: Option<u64>,
    text_vmaddr: Option<u64>,
    suppress_extensions: bool,
}

impl LoadContext {
    fn new(config: &LoaderConfig) -> Self {
        Self {
            threshold: config.kernel_region.base_addr,
            bounds: None,
            entry: None,
            main_offset: None,
            text_vmaddr: None,
            suppress_extensions: false,
        }
    }

    fn add_segment(&mut self, segment: &macho::Segment, placement: &Placement) {
        if macho::name_eq(&segment.name, "__TEXT") {
            self.text_vmaddr = Some(segment.vmaddr & ADDRESS_MASK);
        }

        self.suppress_extensions |= placement.prelinked;

        if placement.size == 0 || placement.addr < self.threshold {
            return;
        }

        let (start, end) = self
            .bounds
            .get_or_insert((placement.addr, placement.end_addr()));
        *start = (*start).min(placement.addr);
        *end = (*end).max(placement.end_addr());
    }

    /// The entry point, from a thread command or else from `LC_MAIN`.
    fn entry(&self) -> u64 {
        if let Some(entry) = self.entry {
            return entry & ADDRESS_MASK;
        }

        match (self.main_offset, self.text_vmaddr) {
            (Some(offset), Some(text)) => text.wrapping_add(offset) & ADDRESS_MASK,
            (Some(_), None) => {
                log::warn!("LC_MAIN without a __TEXT segment");
                0
            }
            (None, _) => {
                log::warn!("Kernel has no entry point");
                0
            }
        }
    }

    fn finish(self, symbols: Option<RelocatedSymbols>) -> ImageLayout {
        let (base, size) = match self.bounds {
            Some((start, end)) => (start, end - start),
            None => (UNSET, 0),
        };

        ImageLayout {
            entry: self.entry(),
            base,
            size,
            suppress_extensions: self.suppress_extensions,
            symbols,
        }
    }
}

/// Load the thin Mach-O `image`: place all segments and find the entry point.
///
/// Fails without writing anything if the header does not match `config.arch`. Any other failure
/// aborts the walk at the offending command. A failing symbol table relocation only results in
/// `symbols` being `None`.
pub fn decode_macho(
    image: &[u8],
    config: &LoaderConfig,
    mut services: BootServices<'_>,
) -> Result<ImageLayout, Error> {
    let header = MachHeader::parse(image, config.arch)?;
    log::debug!(
        "{} image: {} load commands, {} bytes",
        header.arch,
        header.ncmds,
        header.sizeofcmds
    );

    let mut context = LoadContext::new(config);

    for command in LoadCommands::new(image, &header) {
        let command = command?;

        match command.kind {
            CommandKind::Segment(segment) => {
                let placement = segment::place(&segment, image, config, services.memory)?;
                context.add_segment(&segment, &placement);
            }
            CommandKind::Thread(thread) => {
                context.entry = Some(thread.instruction_pointer(config.arch)?);
            }
            CommandKind::Main { entry_offset } => context.main_offset = Some(entry_offset),
            CommandKind::Symtab(_) => {}
            CommandKind::Other => {
                log::trace!("Skipping load command {:#x} at {:#x}", command.cmd, command.offset);
            }
        }
    }

    let symbols = if config.relocate_symbols {
        relocate_symbols(image, &header, &mut services)
    } else {
        None
    };

    Ok(context.finish(symbols))
}

fn relocate_symbols(
    image: &[u8],
    header: &MachHeader,
    services: &mut BootServices<'_>,
) -> Option<RelocatedSymbols> {
    // The first walk has validated every command.
    let symtab = LoadCommands::new(image, header)
        .filter_map(Result::ok)
        .find_map(|command| match command.kind {
            CommandKind::Symtab(symtab) => Some(symtab),
            _ => None,
        })?;

    symtab::relocate(&symtab, image, services)
        .map_err(|error| log::warn!("Symbol table not relocated: {error}"))
        .ok()
}

/// Load a kernel as read from disk: decompress it into `scratch` if it is a kernel cache, select
/// the slice for `config.arch` if it is a fat binary, then [`decode_macho()`] it.
pub fn decode_kernel(
    raw: &[u8],
    scratch: &mut [u8],
    config: &LoaderConfig,
    services: BootServices<'_>,
) -> Result<ImageLayout, Error> {
    let mut image = kernelcache::unpack(raw, scratch)?;

    if macho::fat::is_fat(image) {
        let slice = macho::fat::thin(image, config.arch)?;
        if slice.is_empty() {
            log::error!("No {} slice in fat kernel", config.arch);
            return Err(Error::NoMatchingSlice);
        }
        image = &image[slice];
    }

    let layout = decode_macho(image, config, services)?;

    log::info!(
        "Kernel loaded at {:#x} ({}), entry {:#x}",
        layout.base,
        Fmt::<u64>::from(layout.size),
        layout.entry
    );
    if layout.suppress_extensions {
        log::info!("Prelinked kernel, not loading extensions");
    }

    Ok(layout)
}
