//! Bounds-checked field extraction. Mach-O images for x86 are little-endian; only the fat header
//! may be stored in the opposite byte order.

/// Byte order of the fields of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endian {
    Little,
    Big,
}

/// Returns the `N` bytes at `offset`, or `None` if they are not all inside `data`.
pub(crate) fn array_at<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    data.get(offset..end)?.try_into().ok()
}

pub(crate) fn u32_at(data: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let raw = array_at::<4>(data, offset)?;
    Some(match endian {
        Endian::Little => u32::from_le_bytes(raw),
        Endian::Big => u32::from_be_bytes(raw),
    })
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    u32_at(data, offset, Endian::Little)
}

pub(crate) fn le_u64(data: &[u8], offset: usize) -> Option<u64> {
    array_at::<8>(data, offset).map(u64::from_le_bytes)
}
