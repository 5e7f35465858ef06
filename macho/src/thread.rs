use crate::bytes::{le_u32, le_u64};
use crate::{Arch, Error};

/// An `LC_UNIXTHREAD`/`LC_THREAD` command carrying the initial register state of the image.
///
/// ```text
///         +-------------------+
/// 0       | cmd               |
/// 4       | cmdsize           |
/// 8       | flavor            |
/// 12      | count             |  size of the state in 32-bit words
///         +-------------------+
/// 16      | state ...         |  i386_thread_state or x86_thread_state64
///         +-------------------+
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ThreadCommand<'a> {
    pub flavor: u32,
    pub count: u32,
    /// Raw bytes of the whole command.
    data: &'a [u8],
}

impl<'a> ThreadCommand<'a> {
    const STATE_OFFSET: usize = 16;

    /// Byte offset of `eip` in `i386_thread_state`: `eax ebx ecx edx edi esi ebp esp ss eflags`
    /// precede it.
    const I386_EIP: usize = 10 * 4;

    /// Byte offset of `rip` in `x86_thread_state64`: `rax`..`rsp` and `r8`..`r15` precede it.
    const X86_64_RIP: usize = 16 * 8;

    pub(crate) fn parse(data: &'a [u8]) -> Result<Self, Error> {
        Ok(Self {
            flavor: le_u32(data, 8).ok_or(Error::BadMagic)?,
            count: le_u32(data, 12).ok_or(Error::BadMagic)?,
            data,
        })
    }

    /// Read the instruction pointer from the register state of `arch`. Other fields of the state
    /// are not looked at.
    pub fn instruction_pointer(&self, arch: Arch) -> Result<u64, Error> {
        match arch {
            Arch::I386 => le_u32(self.data, Self::STATE_OFFSET + Self::I386_EIP).map(u64::from),
            Arch::X86_64 => le_u64(self.data, Self::STATE_OFFSET + Self::X86_64_RIP),
        }
        .ok_or(Error::BadMagic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LC_UNIXTHREAD;
    use std::vec::Vec;

    fn thread_command(flavor: u32, state: &[u8]) -> Vec<u8> {
        let mut cmd = Vec::new();
        let size = 16 + state.len() as u32;
        for word in [LC_UNIXTHREAD, size, flavor, state.len() as u32 / 4] {
            cmd.extend_from_slice(&word.to_le_bytes());
        }
        cmd.extend_from_slice(state);
        cmd
    }

    #[test]
    fn i386_eip() {
        // 16 registers, each set to a distinct value; eip is the 11th
        let state: Vec<u8> = (0u32..16)
            .flat_map(|n| (0x1000 + n).to_le_bytes())
            .collect();
        let cmd = thread_command(1, &state);
        let thread = ThreadCommand::parse(&cmd).unwrap();
        assert_eq!(thread.flavor, 1);
        assert_eq!(thread.count, 16);
        assert_eq!(thread.instruction_pointer(Arch::I386), Ok(0x100a));
    }

    #[test]
    fn x86_64_rip() {
        // 21 registers; rip is the 17th
        let state: Vec<u8> = (0u64..21)
            .flat_map(|n| (0xffff_ff80_0000_0000 + n).to_le_bytes())
            .collect();
        let cmd = thread_command(4, &state);
        let thread = ThreadCommand::parse(&cmd).unwrap();
        assert_eq!(
            thread.instruction_pointer(Arch::X86_64),
            Ok(0xffff_ff80_0000_0010)
        );
    }

    #[test]
    fn truncated_state() {
        let cmd = thread_command(4, &[0u8; 64]);
        let thread = ThreadCommand::parse(&cmd).unwrap();
        assert_eq!(thread.instruction_pointer(Arch::X86_64), Err(Error::BadMagic));
        assert_eq!(thread.instruction_pointer(Arch::I386), Ok(0));
    }
}
