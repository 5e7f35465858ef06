//! This crate contains the structures of the Mach-O container format that the boot loader needs
//! in order to place a kernel image into memory, as defined by `<mach-o/loader.h>` and
//! `<mach-o/fat.h>`.
//!
//! Only the parts relevant to loading an x86 kernel are covered: the fat (universal) header used
//! to select an architecture slice, the mach header, and the load commands that describe
//! segments, the initial thread state and the symbol table. Everything here is read-only parsing
//! over a byte buffer. Every field is extracted at an explicit, bounds-checked offset.

#![no_std]

#[cfg(test)]
extern crate std;

mod bytes;
pub mod command;
pub mod fat;
mod header;
mod thread;

pub use command::{CommandKind, LoadCommand, LoadCommands, Section, Segment, SymtabCommand};
pub use header::MachHeader;
pub use thread::ThreadCommand;

/// Magic value of a 32-bit Mach-O image in host (little-endian) byte order.
pub const MH_MAGIC: u32 = 0xfeed_face;

/// Magic value of a 64-bit Mach-O image in host (little-endian) byte order.
pub const MH_MAGIC_64: u32 = 0xfeed_facf;

/// Magic value of a fat (universal) binary. The fat header is always stored big-endian, so on x86
/// the value read from memory is [`FAT_CIGAM`].
pub const FAT_MAGIC: u32 = 0xcafe_babe;

/// Byte-swapped [`FAT_MAGIC`].
pub const FAT_CIGAM: u32 = 0xbeba_feca;

// Load command types
pub const LC_REQ_DYLD: u32 = 0x8000_0000;
pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_THREAD: u32 = 0x4;
pub const LC_UNIXTHREAD: u32 = 0x5;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD;

const CPU_ARCH_ABI64: u32 = 0x0100_0000;

/// `CPU_TYPE_X86` as found in the `cputype` fields of the mach and fat headers.
pub const CPU_TYPE_I386: u32 = 7;

/// `CPU_TYPE_X86 | CPU_ARCH_ABI64`.
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_I386 | CPU_ARCH_ABI64;

/// The two CPU architectures a kernel image can be loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    I386,
    X86_64,
}

impl Arch {
    /// Map the raw `cputype` value chosen by the boot stage to one of the supported architectures.
    pub const fn from_cpu_type(cpu_type: u32) -> Result<Self, Error> {
        match cpu_type {
            CPU_TYPE_I386 => Ok(Self::I386),
            CPU_TYPE_X86_64 => Ok(Self::X86_64),
            _ => Err(Error::UnsupportedArchitecture),
        }
    }

    /// The `cputype` value used for this architecture in fat slice tables and mach headers.
    pub const fn cpu_type(self) -> u32 {
        match self {
            Self::I386 => CPU_TYPE_I386,
            Self::X86_64 => CPU_TYPE_X86_64,
        }
    }

    /// The mach header magic an image for this architecture must carry.
    pub const fn magic(self) -> u32 {
        match self {
            Self::I386 => MH_MAGIC,
            Self::X86_64 => MH_MAGIC_64,
        }
    }

    pub const fn is_64bit(self) -> bool {
        matches!(self, Self::X86_64)
    }
}

impl core::fmt::Display for Arch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::I386 => "i386",
            Self::X86_64 => "x86_64",
        })
    }
}

/// Reasons why an image cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The fat header magic is unknown, or the fat header or its slice table is truncated.
    UnrecognizedContainer,
    /// The mach header magic does not match the selected architecture, or the header, the load
    /// command table or a segment's file range does not fit into the image.
    BadMagic,
    /// The requested CPU type is not one of the two supported architectures.
    UnsupportedArchitecture,
    /// A fat image does not contain a slice for the selected architecture.
    NoMatchingSlice,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::UnrecognizedContainer => "unrecognized fat container",
            Self::BadMagic => "Mach-O file has bad magic number",
            Self::UnsupportedArchitecture => "unknown CPU type",
            Self::NoMatchingSlice => "no slice for the selected architecture",
        })
    }
}

/// Compare a fixed-length, possibly non-terminated name field (segment or section name) with
/// `name`.
pub fn name_eq(field: &[u8; 16], name: &str) -> bool {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..len] == name.as_bytes()
}

/// Printable view of a fixed-length name field.
pub fn name_str(field: &[u8; 16]) -> &str {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..len]).unwrap_or("<invalid>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_types() {
        assert_eq!(Arch::from_cpu_type(7), Ok(Arch::I386));
        assert_eq!(Arch::from_cpu_type(0x0100_0007), Ok(Arch::X86_64));
        assert_eq!(Arch::from_cpu_type(0), Err(Error::UnsupportedArchitecture));
        assert_eq!(Arch::from_cpu_type(12), Err(Error::UnsupportedArchitecture));
        assert_eq!(Arch::X86_64.cpu_type(), 0x0100_0007);
    }

    #[test]
    fn fixed_length_names() {
        let mut field = [0u8; 16];
        field[..6].copy_from_slice(b"__TEXT");
        assert!(name_eq(&field, "__TEXT"));
        assert!(!name_eq(&field, "__TEX"));
        assert_eq!(name_str(&field), "__TEXT");

        // Names using all 16 bytes are not NUL terminated.
        let full = *b"__PRELINK_STATE_";
        assert!(name_eq(&full, "__PRELINK_STATE_"));
        assert_eq!(name_str(&full), "__PRELINK_STATE_");
    }
}
