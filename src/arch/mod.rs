//! Bare-metal x86 support. Only compiled when the loader runs without an operating system.

pub mod io;
