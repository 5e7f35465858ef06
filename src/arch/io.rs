/// An x86 I/O port.
pub struct Port(pub u16);

impl Port {
    /// The Bochs/QEMU debug console. Every byte written to it shows up on the emulator's console.
    pub const DEBUG_CONSOLE: Self = Self(0xe9);

    pub fn write_u8(&self, value: u8) {
        unsafe {
            core::arch::asm!(
                "outb %al, %dx",
                in("al") value,
                in("dx") self.0,
                options(att_syntax, nomem, nostack, preserves_flags)
            );
        }
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_u8(byte);
        }
    }
}
