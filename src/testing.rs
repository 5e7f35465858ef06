//! Synthetic Mach-O images and simulated physical memory for unit tests.

use std::vec;
use std::vec::Vec;

use macho::{
    Arch, LC_MAIN, LC_SEGMENT, LC_SEGMENT_64, LC_SYMTAB, LC_UNIXTHREAD, MH_MAGIC, MH_MAGIC_64,
};
use types::mem::MemoryRegion;

use crate::image::BootServices;
use crate::mem::{BootMemoryMap, BumpAllocator, PhysicalMemory};
use crate::LoaderConfig;

/// Kernel region used by the tests: 1 MiB at 1 MiB. The hibernation region keeps its default.
pub const K: u64 = 0x10_0000;
pub const KERNEL_LEN: u64 = 0x10_0000;

/// Where the symbol table allocator hands out memory, inside the kernel region.
pub const ALLOCATOR_BASE: u64 = 0x1c_0000;

pub fn config(arch: Arch) -> LoaderConfig {
    LoaderConfig::new(arch).with_kernel_region(K, KERNEL_LEN)
}

fn push_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn push_word(buffer: &mut Vec<u8>, value: u64, is_64: bool) {
    if is_64 {
        buffer.extend_from_slice(&value.to_le_bytes());
    } else {
        push_u32(buffer, value as u32);
    }
}

fn push_name(buffer: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; 16];
    field[..name.len()].copy_from_slice(name.as_bytes());
    buffer.extend_from_slice(&field);
}

enum Command {
    Segment {
        name: &'static str,
        vmaddr: u64,
        vmsize: u64,
        data: Vec<u8>,
        sections: Vec<(&'static str, u64)>,
    },
    Symtab {
        symbols: Vec<u8>,
        nsyms: u32,
        strings: Vec<u8>,
    },
    Raw(Vec<u8>),
}

impl Command {
    fn size(&self, is_64: bool) -> usize {
        match self {
            Self::Segment { sections, .. } if is_64 => 72 + 80 * sections.len(),
            Self::Segment { sections, .. } => 56 + 68 * sections.len(),
            Self::Symtab { .. } => 24,
            Self::Raw(bytes) => bytes.len(),
        }
    }
}

/// Builds a thin Mach-O image. File data of segments and the symbol table is laid out behind the
/// load command table in the order the commands were added.
pub struct ImageBuilder {
    arch: Arch,
    commands: Vec<Command>,
}

impl ImageBuilder {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            commands: Vec::new(),
        }
    }

    /// A segment whose file contents are `data`, i.e. `filesize == data.len()`.
    pub fn segment(self, name: &'static str, vmaddr: u64, vmsize: u64, data: &[u8]) -> Self {
        self.segment_with_sections(name, vmaddr, vmsize, data, &[])
    }

    /// Like [`Self::segment()`], followed by section records with the given names and sizes.
    pub fn segment_with_sections(
        mut self,
        name: &'static str,
        vmaddr: u64,
        vmsize: u64,
        data: &[u8],
        sections: &[(&'static str, u64)],
    ) -> Self {
        self.commands.push(Command::Segment {
            name,
            vmaddr,
            vmsize,
            data: data.to_vec(),
            sections: sections.to_vec(),
        });
        self
    }

    /// An `LC_UNIXTHREAD` command whose register state has `ip` as instruction pointer and
    /// garbage everywhere else.
    pub fn thread(mut self, ip: u64) -> Self {
        let mut command = Vec::new();
        let (flavor, mut state) = match self.arch {
            Arch::I386 => (1, vec![0xa5u8; 16 * 4]),
            Arch::X86_64 => (4, vec![0xa5u8; 21 * 8]),
        };
        match self.arch {
            Arch::I386 => state[40..44].copy_from_slice(&(ip as u32).to_le_bytes()),
            Arch::X86_64 => state[128..136].copy_from_slice(&ip.to_le_bytes()),
        }

        push_u32(&mut command, LC_UNIXTHREAD);
        push_u32(&mut command, 16 + state.len() as u32);
        push_u32(&mut command, flavor);
        push_u32(&mut command, state.len() as u32 / 4);
        command.extend_from_slice(&state);

        self.commands.push(Command::Raw(command));
        self
    }

    /// An `LC_MAIN` command with the given entry offset into `__TEXT`.
    pub fn main(mut self, entry_offset: u64) -> Self {
        let mut command = Vec::new();
        push_u32(&mut command, LC_MAIN);
        push_u32(&mut command, 24);
        command.extend_from_slice(&entry_offset.to_le_bytes());
        command.extend_from_slice(&0u64.to_le_bytes());
        self.commands.push(Command::Raw(command));
        self
    }

    /// An `LC_SYMTAB` command. The symbol table is followed directly by the string table.
    pub fn symtab(mut self, symbols: &[u8], nsyms: u32, strings: &[u8]) -> Self {
        self.commands.push(Command::Symtab {
            symbols: symbols.to_vec(),
            nsyms,
            strings: strings.to_vec(),
        });
        self
    }

    /// A command the loader knows nothing about.
    pub fn raw_command(mut self, cmd: u32, payload: &[u8]) -> Self {
        let mut command = Vec::new();
        push_u32(&mut command, cmd);
        push_u32(&mut command, 8 + payload.len() as u32);
        command.extend_from_slice(payload);
        self.commands.push(Command::Raw(command));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let is_64 = self.arch.is_64bit();
        let header_size = if is_64 { 32 } else { 28 };
        let sizeofcmds: usize = self.commands.iter().map(|c| c.size(is_64)).sum();

        let mut image = Vec::new();
        push_u32(&mut image, if is_64 { MH_MAGIC_64 } else { MH_MAGIC });
        push_u32(&mut image, self.arch.cpu_type());
        push_u32(&mut image, 3);
        push_u32(&mut image, 2);
        push_u32(&mut image, self.commands.len() as u32);
        push_u32(&mut image, sizeofcmds as u32);
        push_u32(&mut image, 1);
        if is_64 {
            push_u32(&mut image, 0);
        }

        let mut data = Vec::new();
        let data_start = (header_size + sizeofcmds).next_multiple_of(16);

        for command in &self.commands {
            match command {
                Command::Segment {
                    name,
                    vmaddr,
                    vmsize,
                    data: contents,
                    sections,
                } => {
                    let fileoff = (data_start + data.len()) as u64;
                    data.extend_from_slice(contents);

                    push_u32(&mut image, if is_64 { LC_SEGMENT_64 } else { LC_SEGMENT });
                    push_u32(&mut image, command.size(is_64) as u32);
                    push_name(&mut image, name);
                    push_word(&mut image, *vmaddr, is_64);
                    push_word(&mut image, *vmsize, is_64);
                    push_word(&mut image, fileoff, is_64);
                    push_word(&mut image, contents.len() as u64, is_64);
                    push_u32(&mut image, 7);
                    push_u32(&mut image, 5);
                    push_u32(&mut image, sections.len() as u32);
                    push_u32(&mut image, 0);

                    let mut offset = 0;
                    for (sectname, size) in sections {
                        push_name(&mut image, sectname);
                        push_name(&mut image, name);
                        push_word(&mut image, vmaddr + offset, is_64);
                        push_word(&mut image, *size, is_64);
                        push_u32(&mut image, (fileoff + offset) as u32);
                        // align, reloff, nreloc, flags, reserved1, reserved2
                        for _ in 0..6 {
                            push_u32(&mut image, 0);
                        }
                        if is_64 {
                            push_u32(&mut image, 0);
                        }
                        offset += size;
                    }
                }
                Command::Symtab {
                    symbols,
                    nsyms,
                    strings,
                } => {
                    let symoff = (data_start + data.len()) as u32;
                    data.extend_from_slice(symbols);
                    let stroff = (data_start + data.len()) as u32;
                    data.extend_from_slice(strings);

                    push_u32(&mut image, LC_SYMTAB);
                    push_u32(&mut image, 24);
                    push_u32(&mut image, symoff);
                    push_u32(&mut image, *nsyms);
                    push_u32(&mut image, stroff);
                    push_u32(&mut image, strings.len() as u32);
                }
                Command::Raw(bytes) => image.extend_from_slice(bytes),
            }
        }

        image.resize(data_start, 0);
        image.extend_from_slice(&data);
        image
    }
}

/// Wrap thin images into a fat image. The fat header is big-endian, as on disk.
pub fn fat_image(slices: &[(Arch, &[u8])]) -> Vec<u8> {
    const ALIGN: usize = 0x1000;

    let mut image = Vec::new();
    image.extend_from_slice(&macho::FAT_MAGIC.to_be_bytes());
    image.extend_from_slice(&(slices.len() as u32).to_be_bytes());

    let mut offset = ALIGN;
    for (arch, slice) in slices {
        for word in [arch.cpu_type(), 3, offset as u32, slice.len() as u32, 12] {
            image.extend_from_slice(&word.to_be_bytes());
        }
        offset = (offset + slice.len()).next_multiple_of(ALIGN);
    }

    for (_, slice) in slices {
        image.resize(image.len().next_multiple_of(ALIGN), 0);
        image.extend_from_slice(slice);
    }
    image
}

/// Byte pattern that is easy to recognize and never zero.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed) | 1).collect()
}

/// Value of memory that has not been written to.
pub const UNTOUCHED: u8 = 0xcc;

/// Physical memory backed by one buffer per region. Accesses outside of the regions panic.
pub struct SimulatedMemory {
    windows: Vec<(u64, Vec<u8>)>,
    writes: usize,
}

impl SimulatedMemory {
    pub fn new(regions: &[MemoryRegion]) -> Self {
        Self {
            windows: regions
                .iter()
                .map(|region| (region.base_addr, vec![UNTOUCHED; region.length as usize]))
                .collect(),
            writes: 0,
        }
    }

    pub fn for_config(config: &LoaderConfig) -> Self {
        Self::new(&[config.kernel_region, config.hibernate_region])
    }

    /// Number of write accesses so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn window(&mut self, addr: u64, length: usize) -> &mut [u8] {
        for (base, buffer) in &mut self.windows {
            let end = *base + buffer.len() as u64;
            if addr >= *base && addr + length as u64 <= end {
                let start = (addr - *base) as usize;
                return &mut buffer[start..start + length];
            }
        }
        panic!("access outside of simulated memory: {addr:#x} + {length:#x}");
    }

    pub fn read(&mut self, addr: u64, length: usize) -> Vec<u8> {
        self.window(addr, length).to_vec()
    }
}

impl PhysicalMemory for SimulatedMemory {
    fn bytes_mut(&mut self, addr: u64, length: usize) -> &mut [u8] {
        self.writes += 1;
        self.window(addr, length)
    }
}

/// Owns the collaborators of a load.
pub struct TestServices {
    pub memory: SimulatedMemory,
    pub allocator: BumpAllocator,
    pub registry: BootMemoryMap,
}

impl TestServices {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            memory: SimulatedMemory::for_config(config),
            allocator: BumpAllocator::new(ALLOCATOR_BASE..config.kernel_region.end_addr()),
            registry: BootMemoryMap::new(),
        }
    }

    pub fn services(&mut self) -> BootServices<'_> {
        BootServices {
            memory: &mut self.memory,
            allocator: &mut self.allocator,
            registry: &mut self.registry,
        }
    }
}
