use core::fmt::{Display, Formatter, Result};

/// Reasons why loading the kernel image failed.
///
/// Note that a segment that does not fit into the reserved memory regions is not reported through
/// this type. That condition halts the boot process (see [`crate::image::segment`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The fat header magic is unknown or its slice table is malformed.
    UnrecognizedContainer,
    /// The mach header does not match the selected architecture, or the image is truncated.
    BadMagic,
    /// The CPU type is not one of the two supported architectures.
    UnsupportedArchitecture,
    /// The fat image does not contain a slice for the selected architecture.
    NoMatchingSlice,
    /// An auxiliary allocation or memory map registration failed.
    OutOfMemory,
    /// The kernel cache uses a compression scheme the loader cannot decode.
    UnsupportedCompression,
    /// The kernel cache header, size or checksum is inconsistent.
    CorruptKernelCache,
}

impl From<macho::Error> for Error {
    fn from(value: macho::Error) -> Self {
        match value {
            macho::Error::UnrecognizedContainer => Self::UnrecognizedContainer,
            macho::Error::BadMagic => Self::BadMagic,
            macho::Error::UnsupportedArchitecture => Self::UnsupportedArchitecture,
            macho::Error::NoMatchingSlice => Self::NoMatchingSlice,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::UnrecognizedContainer => macho::Error::UnrecognizedContainer.fmt(f),
            Self::BadMagic => macho::Error::BadMagic.fmt(f),
            Self::UnsupportedArchitecture => macho::Error::UnsupportedArchitecture.fmt(f),
            Self::NoMatchingSlice => macho::Error::NoMatchingSlice.fmt(f),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::UnsupportedCompression => f.write_str("unsupported kernel cache compression"),
            Self::CorruptKernelCache => f.write_str("kernel cache is corrupt"),
        }
    }
}
