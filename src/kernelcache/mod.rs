//! Compressed kernel caches
//!
//! A kernel cache is a prelinked kernel wrapped in a small header:
//!
//! ```text
//!         +---------------------+
//! 0       | signature           |  "comp"
//! 4       | compress_type       |  "lzss" or "lzvn"
//! 8       | adler32             |  checksum of the uncompressed data
//! 12      | uncompressed_size   |
//! 16      | compressed_size     |
//! 20      | reserved[11]        |
//! 64      | platform_name[64]   |
//! 128     | root_path[256]      |
//!         +---------------------+
//! 384     | compressed data ... |
//! ```
//!
//! All header words are big-endian.

mod adler32;
mod lzss;

pub use adler32::adler32;

use types::fmt::Fmt;

use crate::Error;

pub const SIGNATURE: u32 = u32::from_be_bytes(*b"comp");
pub const COMPRESS_LZSS: u32 = u32::from_be_bytes(*b"lzss");
pub const COMPRESS_LZVN: u32 = u32::from_be_bytes(*b"lzvn");

pub const HEADER_SIZE: usize = 384;

const PLATFORM_NAME: core::ops::Range<usize> = 64..128;
const ROOT_PATH: core::ops::Range<usize> = 128..384;

/// A parsed kernel cache header together with its compressed payload.
#[derive(Debug, Clone, Copy)]
pub struct KernelCache<'a> {
    pub compress_type: u32,
    pub adler32: u32,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    header: &'a [u8],
    payload: &'a [u8],
}

fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

fn c_str(bytes: &[u8]) -> &str {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    core::str::from_utf8(&bytes[..len]).unwrap_or("<invalid>")
}

impl<'a> KernelCache<'a> {
    /// Returns `None` if `image` does not start with a kernel cache signature, and an error if
    /// it does but the header or payload is truncated.
    pub fn parse(image: &'a [u8]) -> Option<Result<Self, Error>> {
        if be_u32(image, 0)? != SIGNATURE {
            return None;
        }

        Some(Self::parse_header(image))
    }

    fn parse_header(image: &'a [u8]) -> Result<Self, Error> {
        let header = image.get(..HEADER_SIZE).ok_or(Error::CorruptKernelCache)?;
        let field = |offset| be_u32(header, offset).ok_or(Error::CorruptKernelCache);

        let compressed_size = field(16)?;
        let payload = image
            .get(HEADER_SIZE..HEADER_SIZE.saturating_add(compressed_size as usize))
            .ok_or(Error::CorruptKernelCache)?;

        Ok(Self {
            compress_type: field(4)?,
            adler32: field(8)?,
            uncompressed_size: field(12)?,
            compressed_size,
            header,
            payload,
        })
    }

    pub fn platform_name(&self) -> &'a str {
        c_str(&self.header[PLATFORM_NAME])
    }

    pub fn root_path(&self) -> &'a str {
        c_str(&self.header[ROOT_PATH])
    }

    /// Decompress the payload into `scratch` and verify it. Returns the uncompressed image.
    pub fn decompress<'s>(&self, scratch: &'s mut [u8]) -> Result<&'s [u8], Error> {
        let size = self.uncompressed_size as usize;
        if scratch.len() < size {
            log::error!(
                "Kernel cache needs {} but only {} are available",
                Fmt::<u64>::from(size as u64),
                Fmt::<u64>::from(scratch.len() as u64)
            );
            return Err(Error::OutOfMemory);
        }

        let written = match self.compress_type {
            COMPRESS_LZSS => lzss::decompress(&mut scratch[..size], self.payload),
            COMPRESS_LZVN => {
                log::error!("lzvn compressed kernel caches are not supported");
                return Err(Error::UnsupportedCompression);
            }
            other => {
                log::error!("Unknown kernel cache compression {other:#010x}");
                return Err(Error::UnsupportedCompression);
            }
        };

        let image = &scratch[..written];
        if written != size {
            log::error!("Kernel cache size mismatch: {written:#x} != {size:#x}");
            return Err(Error::CorruptKernelCache);
        }

        let checksum = adler32(image);
        if checksum != self.adler32 {
            log::error!(
                "Kernel cache checksum mismatch: {checksum:#010x} != {:#010x}",
                self.adler32
            );
            return Err(Error::CorruptKernelCache);
        }

        Ok(image)
    }
}

/// Return `image` itself, or the decompressed contents if it is a kernel cache.
pub fn unpack<'a>(image: &'a [u8], scratch: &'a mut [u8]) -> Result<&'a [u8], Error> {
    let Some(cache) = KernelCache::parse(image) else {
        return Ok(image);
    };
    let cache = cache?;

    log::info!(
        "Kernel cache for {} ({}), {} compressed",
        cache.platform_name(),
        cache.root_path(),
        Fmt::<u64>::from(u64::from(cache.compressed_size))
    );

    cache.decompress(scratch)
}
