/// Largest prime smaller than 2^16.
const MOD_ADLER: u32 = 65521;

/// Number of bytes that can be summed before `b` may overflow a `u32`.
const NMAX: usize = 5552;

/// Adler-32 checksum of `data`, as stored in the kernel cache header.
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }

    (b << 16) | a
}
