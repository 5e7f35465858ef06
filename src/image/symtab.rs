//! Symbol table relocation
//!
//! The symbol and string tables sit somewhere in `__LINKEDIT`, which is not kept after boot. They
//! are copied into a range of their own, behind a fresh `symtab_command` whose offsets are
//! relative to the start of that range:
//!
//! ```text
//!         +-------------------+
//! 0       | symtab_command    |  symoff = 24, stroff = 24 + (stroff - symoff)
//!         +-------------------+
//! 24      | symbols ...       |
//!         | (gap, if any)     |
//!         | strings ...       |
//!         +-------------------+
//! ```

use macho::SymtabCommand;
use types::fmt::Fmt;
use types::mem::{MemoryRegion, MemoryRegionType};

use crate::config::SYMTAB_RANGE_NAME;
use crate::image::BootServices;
use crate::Error;

/// The relocated symbol table, as recorded in the memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocatedSymbols {
    pub addr: u64,
    pub size: u64,
    pub nsyms: u32,
}

/// Copy the tables described by `symtab` out of `image` into freshly allocated memory and record
/// the new range as `Kernel-__SYMTAB`. Nothing is recorded if this fails.
pub fn relocate(
    symtab: &SymtabCommand,
    image: &[u8],
    services: &mut BootServices<'_>,
) -> Result<RelocatedSymbols, Error> {
    let symbols_len = symtab.stroff.checked_sub(symtab.symoff).ok_or(Error::BadMagic)?;
    let end = (symtab.stroff as usize)
        .checked_add(symtab.strsize as usize)
        .ok_or(Error::BadMagic)?;
    let tables = image
        .get(symtab.symoff as usize..end)
        .ok_or(Error::BadMagic)?;

    let header_len = SymtabCommand::SIZE as u32;
    let stroff = header_len.checked_add(symbols_len).ok_or(Error::BadMagic)?;
    let size = (SymtabCommand::SIZE + tables.len()) as u64;
    let addr = services.allocator.allocate(size).ok_or(Error::OutOfMemory)?;

    let header = SymtabCommand {
        symoff: header_len,
        nsyms: symtab.nsyms,
        stroff,
        strsize: symtab.strsize,
    };
    services.memory.copy_to(addr, &header.to_bytes());
    services.memory.copy_to(addr + u64::from(header_len), tables);

    services.registry.register(
        SYMTAB_RANGE_NAME,
        MemoryRegion::new(addr, size, MemoryRegionType::Auxiliary),
    )?;

    log::debug!(
        "{} symbols relocated to {:#x} ({})",
        symtab.nsyms,
        addr,
        Fmt::<u64>::from(size)
    );

    Ok(RelocatedSymbols {
        addr,
        size,
        nsyms: symtab.nsyms,
    })
}
