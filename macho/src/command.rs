//! Iterator and structs to traverse and decode the load command table of a Mach-O image.
//!
//! Every load command starts with the same two words, which is all that is needed to skip to the
//! next one:
//!
//! ```text
//!         +-------------------+
//! 0       | cmd               |  command type
//! 4       | cmdsize           |  size of the whole command, including this header
//!         +-------------------+
//! 8       | ...               |  command specific payload
//! ```
//!
//! Commands this crate does not know about are still yielded (as [`CommandKind::Other`]) so that
//! the caller can skip them.

use crate::bytes::{array_at, le_u32, le_u64};
use crate::{
    Error, MachHeader, ThreadCommand, LC_MAIN, LC_SEGMENT, LC_SEGMENT_64, LC_SYMTAB, LC_THREAD,
    LC_UNIXTHREAD,
};

const LOAD_COMMAND_SIZE: usize = 8;

/// One entry of the load command table.
#[derive(Debug, Clone, Copy)]
pub struct LoadCommand<'a> {
    /// Offset of the command from the start of the image.
    pub offset: usize,
    pub cmd: u32,
    pub size: u32,
    pub kind: CommandKind<'a>,
}

/// The decoded payload of a load command.
#[derive(Debug, Clone, Copy)]
pub enum CommandKind<'a> {
    /// `LC_SEGMENT` or `LC_SEGMENT_64`.
    Segment(Segment<'a>),
    /// `LC_UNIXTHREAD` or `LC_THREAD`.
    Thread(ThreadCommand<'a>),
    /// `LC_MAIN`: entry point given as an offset into the `__TEXT` segment.
    Main { entry_offset: u64 },
    /// `LC_SYMTAB`.
    Symtab(SymtabCommand),
    /// Anything else. Skipped by the loader.
    Other,
}

/// Walks `ncmds` load commands starting right after the mach header. Each step checks that the
/// command header and the whole command lie inside the image before handing it out.
#[derive(Clone)]
pub struct LoadCommands<'a> {
    image: &'a [u8],
    offset: usize,
    remaining: u32,
}

impl<'a> LoadCommands<'a> {
    pub fn new(image: &'a [u8], header: &MachHeader) -> Self {
        Self {
            image,
            offset: header.size(),
            remaining: header.ncmds,
        }
    }

    fn decode(&self, offset: usize) -> Result<LoadCommand<'a>, Error> {
        let cmd = le_u32(self.image, offset).ok_or(Error::BadMagic)?;
        let size = le_u32(self.image, offset + 4).ok_or(Error::BadMagic)?;
        if (size as usize) < LOAD_COMMAND_SIZE {
            return Err(Error::BadMagic);
        }

        let end = offset
            .checked_add(size as usize)
            .filter(|&end| end <= self.image.len())
            .ok_or(Error::BadMagic)?;
        let data = &self.image[offset..end];

        let kind = match cmd {
            LC_SEGMENT => CommandKind::Segment(Segment::parse(data, false)?),
            LC_SEGMENT_64 => CommandKind::Segment(Segment::parse(data, true)?),
            LC_UNIXTHREAD | LC_THREAD => CommandKind::Thread(ThreadCommand::parse(data)?),
            LC_MAIN => CommandKind::Main {
                entry_offset: le_u64(data, 8).ok_or(Error::BadMagic)?,
            },
            LC_SYMTAB => CommandKind::Symtab(SymtabCommand::parse(data)?),
            _ => CommandKind::Other,
        };

        Ok(LoadCommand {
            offset,
            cmd,
            size,
            kind,
        })
    }
}

impl<'a> Iterator for LoadCommands<'a> {
    type Item = Result<LoadCommand<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match self.decode(self.offset) {
            Ok(command) => {
                self.remaining -= 1;
                self.offset += command.size as usize;
                Some(Ok(command))
            }
            Err(error) => {
                // No way to find the next command after a malformed one.
                self.remaining = 0;
                Some(Err(error))
            }
        }
    }
}

/// A segment command, i.e. a contiguous part of the file that is mapped to `vmaddr`. The in-memory
/// size `vmsize` may exceed the on-file size `filesize`, in which case the rest is zero-filled.
#[derive(Clone, Copy)]
pub struct Segment<'a> {
    /// Fixed-length name, not necessarily NUL terminated.
    pub name: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub nsects: u32,
    pub is_64: bool,
    /// Raw bytes of the whole command, section records included.
    data: &'a [u8],
}

impl<'a> Segment<'a> {
    pub const SIZE_32: usize = 56;
    pub const SIZE_64: usize = 72;

    fn parse(data: &'a [u8], is_64: bool) -> Result<Self, Error> {
        let name = array_at::<16>(data, 8).ok_or(Error::BadMagic)?;
        let segment = if is_64 {
            let field = |offset| le_u64(data, offset).ok_or(Error::BadMagic);
            Self {
                name,
                vmaddr: field(24)?,
                vmsize: field(32)?,
                fileoff: field(40)?,
                filesize: field(48)?,
                nsects: le_u32(data, 64).ok_or(Error::BadMagic)?,
                is_64,
                data,
            }
        } else {
            let field = |offset| {
                le_u32(data, offset)
                    .map(u64::from)
                    .ok_or(Error::BadMagic)
            };
            Self {
                name,
                vmaddr: field(24)?,
                vmsize: field(28)?,
                fileoff: field(32)?,
                filesize: field(36)?,
                nsects: le_u32(data, 48).ok_or(Error::BadMagic)?,
                is_64,
                data,
            }
        };

        Ok(segment)
    }

    pub fn name(&self) -> &str {
        crate::name_str(&self.name)
    }

    /// Whether the segment name starts with `prefix`.
    pub fn name_starts_with(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix.as_bytes())
    }

    /// Iterate the section records following the segment command. Records that would extend past
    /// the end of the command are not yielded.
    pub fn sections(&self) -> Sections<'a> {
        Sections {
            data: self.data,
            offset: if self.is_64 { Self::SIZE_64 } else { Self::SIZE_32 },
            remaining: self.nsects,
            is_64: self.is_64,
        }
    }
}

impl core::fmt::Debug for Segment<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name())
            .field("vmaddr", &(self.vmaddr as *const u8))
            .field("vmsize", &self.vmsize)
            .field("fileoff", &self.fileoff)
            .field("filesize", &self.filesize)
            .field("nsects", &self.nsects)
            .finish()
    }
}

/// A section record nested in a segment command.
#[derive(Clone, Copy)]
pub struct Section {
    pub name: [u8; 16],
    pub segname: [u8; 16],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
}

impl Section {
    pub const SIZE_32: usize = 68;
    pub const SIZE_64: usize = 80;

    pub fn name(&self) -> &str {
        crate::name_str(&self.name)
    }
}

impl core::fmt::Debug for Section {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{},{} @ {:#x} ({} bytes)",
            crate::name_str(&self.segname),
            self.name(),
            self.addr,
            self.size
        )
    }
}

#[derive(Clone)]
pub struct Sections<'a> {
    data: &'a [u8],
    offset: usize,
    remaining: u32,
    is_64: bool,
}

impl Iterator for Sections<'_> {
    type Item = Section;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.offset;
        let section = if self.is_64 {
            self.offset += Section::SIZE_64;
            Section {
                name: array_at::<16>(self.data, base)?,
                segname: array_at::<16>(self.data, base + 16)?,
                addr: le_u64(self.data, base + 32)?,
                size: le_u64(self.data, base + 40)?,
                offset: le_u32(self.data, base + 48)?,
            }
        } else {
            self.offset += Section::SIZE_32;
            Section {
                name: array_at::<16>(self.data, base)?,
                segname: array_at::<16>(self.data, base + 16)?,
                addr: le_u32(self.data, base + 32)?.into(),
                size: le_u32(self.data, base + 36)?.into(),
                offset: le_u32(self.data, base + 40)?,
            }
        };

        Some(section)
    }
}

/// The `LC_SYMTAB` command. All offsets are relative to the start of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymtabCommand {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

impl SymtabCommand {
    pub const SIZE: usize = 24;

    fn parse(data: &[u8]) -> Result<Self, Error> {
        let field = |offset| le_u32(data, offset).ok_or(Error::BadMagic);
        Ok(Self {
            symoff: field(8)?,
            nsyms: field(12)?,
            stroff: field(16)?,
            strsize: field(20)?,
        })
    }

    /// Serialize this command as a complete `symtab_command` record.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let words = [
            LC_SYMTAB,
            Self::SIZE as u32,
            self.symoff,
            self.nsyms,
            self.stroff,
            self.strsize,
        ];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}
