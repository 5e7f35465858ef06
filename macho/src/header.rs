use crate::bytes::le_u32;
use crate::{Arch, Error};

/// The mach header at the start of every single-architecture image. The 64-bit variant carries an
/// additional reserved word, which moves the load command table back by four bytes.
///
/// ```text
///         +-------------------+
/// 0       | magic             |
/// 4       | cputype           |
/// 8       | cpusubtype        |
/// 12      | filetype          |
/// 16      | ncmds             |
/// 20      | sizeofcmds        |
/// 24      | flags             |
/// 28      | reserved          |  64-bit only
///         +-------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader {
    pub magic: u32,
    pub cpu_type: u32,
    pub cpu_subtype: u32,
    pub file_type: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    /// Architecture this header was validated against.
    pub arch: Arch,
}

impl MachHeader {
    pub const SIZE_32: usize = 28;
    pub const SIZE_64: usize = 32;

    /// Read the mach header and check that its magic is exactly the one expected for `arch`.
    pub fn parse(image: &[u8], arch: Arch) -> Result<Self, Error> {
        let field = |n: usize| le_u32(image, 4 * n).ok_or(Error::BadMagic);

        let magic = field(0)?;
        if magic != arch.magic() {
            return Err(Error::BadMagic);
        }

        let header = Self {
            magic,
            cpu_type: field(1)?,
            cpu_subtype: field(2)?,
            file_type: field(3)?,
            ncmds: field(4)?,
            sizeofcmds: field(5)?,
            flags: field(6)?,
            arch,
        };

        if image.len() < header.size() {
            return Err(Error::BadMagic);
        }

        Ok(header)
    }

    /// Size of the header in bytes. The first load command starts right after it.
    pub const fn size(&self) -> usize {
        if self.arch.is_64bit() {
            Self::SIZE_64
        } else {
            Self::SIZE_32
        }
    }
}
