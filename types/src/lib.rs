//! Types shared between the loader crates.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod fmt;
pub mod mem;
