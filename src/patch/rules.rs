//! Built-in patch scopes, selected with cargo features.

use super::{PatchAction, PatchRule, PatchScope, ScanStrategy};

/// `"4D1EDE05"`, the start of the NVRAM variable GUID string in the kernel.
const NVRAM_GUID_PREFIX: [u8; 8] = 0x3530_4544_4531_4434u64.to_le_bytes();

/// Length of the GUID string `4D1EDE05-38C7-4A6A-9CC6-4BCCA8B38C14`.
const GUID_STRING_LEN: usize = 36;

/// Hides the NVRAM GUID in the `__KLD` string table and renames the `/options` node the kernel
/// looks up right after it.
pub const NVRAM_GUID: PatchScope = PatchScope {
    segment: "__KLD",
    section: "__cstring",
    strategy: ScanStrategy::Chained,
    rules: &[
        PatchRule {
            search: &NVRAM_GUID_PREFIX,
            action: PatchAction::ClearAndWrite {
                clear: GUID_STRING_LEN,
                bytes: b"NVRAM",
            },
            skip: GUID_STRING_LEN,
        },
        PatchRule {
            search: b"/options",
            action: PatchAction::Replace(b"/bootopt"),
            skip: 0,
        },
    ],
};

const HDA_CODEC_ID: [u8; 8] = 0x11D4_1984_3D39_7410u64.to_le_bytes();
const HDA_CODEC_TARGET_ID: [u8; 8] = 0x10EC_0892_3D39_7410u64.to_le_bytes();
const HDA_CONTROLLER_ID: [u8; 8] = 0x30EB_6175_0000_0C0Cu64.to_le_bytes();
const HDA_CONTROLLER_TARGET_ID: [u8; 8] = 0x0EEB_6175_0000_0C0Cu64.to_le_bytes();

/// Swaps the audio codec and controller identifiers compiled into the prelinked HDA driver.
pub const HDA_IDS: PatchScope = PatchScope {
    segment: "__PRELINK_TEXT",
    section: "__text",
    strategy: ScanStrategy::Exhaustive,
    rules: &[
        PatchRule {
            search: &HDA_CODEC_ID,
            action: PatchAction::Replace(&HDA_CODEC_TARGET_ID),
            skip: 0,
        },
        PatchRule {
            search: &HDA_CONTROLLER_ID,
            action: PatchAction::Replace(&HDA_CONTROLLER_TARGET_ID),
            skip: 0,
        },
    ],
};

static NVRAM_AND_HDA: [PatchScope; 2] = [NVRAM_GUID, HDA_IDS];

/// The scopes enabled by the `nvram-patch` and `hda-patch` features.
pub fn builtin_scopes() -> &'static [PatchScope] {
    match (cfg!(feature = "nvram-patch"), cfg!(feature = "hda-patch")) {
        (true, true) => &NVRAM_AND_HDA,
        (true, false) => &NVRAM_AND_HDA[..1],
        (false, true) => &NVRAM_AND_HDA[1..],
        (false, false) => &[],
    }
}
