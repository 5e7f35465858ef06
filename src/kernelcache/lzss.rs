//! LZSS decompression as used by compressed kernel caches.
//!
//! The input is a sequence of flag bytes, each followed by eight items. A set flag bit is a
//! literal byte, a cleared one a two byte back reference into a 4 KiB ring buffer:
//!
//! ```text
//!  byte 0: iiiiiiii    byte 1: iiiijjjj
//!  position = i (12 bits), length = j + THRESHOLD + 1
//! ```

/// Size of the ring buffer.
const N: usize = 4096;

/// Upper limit for match length.
const F: usize = 18;

/// A match is only encoded if it is longer than this.
const THRESHOLD: usize = 2;

/// Output side of the decoder: everything emitted goes to `dst` and into the ring buffer.
struct Window<'a> {
    ring: [u8; N],
    r: usize,
    dst: &'a mut [u8],
    written: usize,
}

impl Window<'_> {
    /// Emit one byte. Returns `false` once `dst` is full.
    fn push(&mut self, byte: u8) -> bool {
        let Some(slot) = self.dst.get_mut(self.written) else {
            return false;
        };
        *slot = byte;
        self.written += 1;
        self.ring[self.r] = byte;
        self.r = (self.r + 1) & (N - 1);
        true
    }

    fn ring_at(&self, position: usize) -> u8 {
        self.ring[position & (N - 1)]
    }
}

/// Decompress `src` into `dst` and return the number of bytes written. Output that does not fit
/// into `dst` is dropped.
pub fn decompress(dst: &mut [u8], src: &[u8]) -> usize {
    let mut window = Window {
        ring: [b' '; N],
        r: N - F,
        dst,
        written: 0,
    };

    let mut input = src.iter().copied();
    let mut flags: u32 = 0;

    'decode: loop {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let Some(byte) = input.next() else { break };
            flags = u32::from(byte) | 0xff00;
        }

        if flags & 1 != 0 {
            let Some(byte) = input.next() else { break };
            if !window.push(byte) {
                break;
            }
        } else {
            let (Some(lo), Some(hi)) = (input.next(), input.next()) else { break };
            let position = usize::from(lo) | (usize::from(hi & 0xf0) << 4);
            let length = usize::from(hi & 0x0f) + THRESHOLD + 1;

            for k in 0..length {
                let byte = window.ring_at(position + k);
                if !window.push(byte) {
                    break 'decode;
                }
            }
        }
    }

    window.written
}
