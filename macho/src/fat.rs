//! A fat (universal) binary bundles several single-architecture images, called slices, behind a
//! small header:
//!
//! ```text
//!         +-------------------+
//! 0       | magic             |  0xcafebabe, stored big-endian
//! 4       | nfat_arch         |
//!         +-------------------+  <-- `nfat_arch` entries of 20 bytes follow
//! 8       | cputype           |
//! 12      | cpusubtype        |
//! 16      | offset            |  file offset of the slice
//! 20      | size              |  size of the slice in bytes
//! 24      | align             |
//!         +-------------------+
//! ```
//!
//! Thinning a fat image means narrowing the working buffer down to the slice for the active
//! architecture. No bytes are copied.

use core::ops::Range;

use crate::bytes::{u32_at, Endian};
use crate::{Arch, Error, FAT_CIGAM, FAT_MAGIC};

const FAT_HEADER_SIZE: usize = 8;
const FAT_ARCH_SIZE: usize = 20;

/// Returns `true` if the image starts with a fat header in either byte order.
pub fn is_fat(image: &[u8]) -> bool {
    matches!(
        u32_at(image, 0, Endian::Little),
        Some(FAT_MAGIC) | Some(FAT_CIGAM)
    )
}

/// One entry of the fat slice table, with its fields already in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatArch {
    pub cpu_type: u32,
    pub cpu_subtype: u32,
    pub offset: u32,
    pub size: u32,
    pub align: u32,
}

impl FatArch {
    /// Byte range of this slice within the fat image.
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start.saturating_add(self.size as usize)
    }
}

/// Iterator over the slice table of a fat image.
#[derive(Clone)]
pub struct FatArchIter<'a> {
    image: &'a [u8],
    endian: Endian,
    index: u32,
    count: u32,
}

impl<'a> FatArchIter<'a> {
    /// Check the fat magic and return an iterator over the slice table. The fields are stored in
    /// the byte order indicated by the magic.
    pub fn new(image: &'a [u8]) -> Result<Self, Error> {
        let endian = match u32_at(image, 0, Endian::Little) {
            Some(FAT_MAGIC) => Endian::Little,
            Some(FAT_CIGAM) => Endian::Big,
            _ => return Err(Error::UnrecognizedContainer),
        };
        let count = u32_at(image, 4, endian).ok_or(Error::UnrecognizedContainer)?;

        Ok(Self {
            image,
            endian,
            index: 0,
            count,
        })
    }
}

impl Iterator for FatArchIter<'_> {
    type Item = Result<FatArch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }

        let base = FAT_HEADER_SIZE + self.index as usize * FAT_ARCH_SIZE;
        self.index += 1;

        let field = |n: usize| u32_at(self.image, base + 4 * n, self.endian);
        let entry = (|| {
            Some(FatArch {
                cpu_type: field(0)?,
                cpu_subtype: field(1)?,
                offset: field(2)?,
                size: field(3)?,
                align: field(4)?,
            })
        })();

        match entry {
            Some(entry) => Some(Ok(entry)),
            None => {
                // A truncated table ends the iteration.
                self.index = self.count;
                Some(Err(Error::UnrecognizedContainer))
            }
        }
    }
}

/// Locate the slice for `arch` in a fat image. The first slice with a matching CPU type wins.
///
/// Returns the byte range of that slice within `image`, or an empty range if the table contains
/// no slice for `arch`. Whether an empty result is acceptable is up to the caller.
pub fn thin(image: &[u8], arch: Arch) -> Result<Range<usize>, Error> {
    for entry in FatArchIter::new(image)? {
        let entry = entry?;
        if entry.cpu_type == arch.cpu_type() {
            let range = entry.range();
            if range.end > image.len() {
                return Err(Error::UnrecognizedContainer);
            }
            return Ok(range);
        }
    }

    Ok(0..0)
}
