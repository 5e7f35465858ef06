//! Kernel image loader stage of the boot loader.
//!
//! An earlier boot stage reads the kernel file into memory and hands the raw bytes to this crate.
//! From there the image goes through the following steps:
//!
//! 1. If it is a compressed kernel cache, it is decompressed and verified ([`kernelcache`]).
//! 2. If it is a fat binary, the slice for the active architecture is selected ([`macho::fat`]).
//! 3. The load command table is walked once to copy every segment to its physical address,
//!    running the signature patches on freshly placed segments ([`image`], [`patch`]), and to
//!    recover the entry point.
//! 4. Optionally, a second walk copies the symbol table to its own memory range.
//!
//! The result is an [`ImageLayout`] describing where the kernel was placed and where to jump to.
//! Jumping there is left to the boot stage.

#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
mod arch;

pub mod config;
mod error;
pub mod image;
pub mod kernelcache;
pub mod logging;
pub mod mem;
pub mod patch;

#[cfg(test)]
mod testing;

pub use config::LoaderConfig;
pub use error::Error;
pub use image::{decode_kernel, decode_macho, BootServices, ImageLayout};
pub use macho::Arch;
