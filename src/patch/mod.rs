//! Signature patch engine
//!
//! Rewrites byte runs inside freshly placed segments. What to look for, what to write and how to
//! continue after a match is static data ([`PatchScope`]); the engine itself is a single scanner
//! that never allocates and never writes outside the section it was given.
//!
//! Sections are located structurally: the section records of the segment command are walked in
//! order and the declared sizes of the sections before the wanted one are summed up to find its
//! offset within the segment.

use core::ops::Range;

use macho::Segment;

mod rules;

pub use rules::{builtin_scopes, HDA_IDS, NVRAM_GUID};

/// A set of patch rules restricted to one section of one segment.
#[derive(Debug, Clone, Copy)]
pub struct PatchScope {
    /// Exact segment name, e.g. `__KLD`.
    pub segment: &'static str,
    /// Exact section name within `segment`, e.g. `__cstring`.
    pub section: &'static str,
    pub strategy: ScanStrategy,
    pub rules: &'static [PatchRule],
}

/// How the rules of a scope are applied to the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Every byte offset of the section is tried against the rules in order. The first matching
    /// rule is applied and scanning continues at the next byte. `skip` is ignored.
    Exhaustive,
    /// The rules are consecutive steps. Each step searches forward from the cursor, applies its
    /// action to the first match and moves the cursor `skip` bytes past the start of the match.
    /// The scan ends after the last step or at the first step that finds nothing.
    Chained,
}

#[derive(Debug, Clone, Copy)]
pub struct PatchRule {
    pub search: &'static [u8],
    pub action: PatchAction,
    /// Distance from the start of a match to where the next step of a [`ScanStrategy::Chained`]
    /// scan begins.
    pub skip: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    /// Overwrite the match with the given bytes.
    Replace(&'static [u8]),
    /// Zero `clear` bytes starting at the match, then write `bytes` at the start of the match.
    ClearAndWrite {
        clear: usize,
        bytes: &'static [u8],
    },
}

impl PatchAction {
    /// Apply the action to `target`, which starts at the match and ends at the end of the
    /// section. Writes past the end of `target` are dropped.
    fn apply(&self, target: &mut [u8]) {
        match *self {
            Self::Replace(bytes) => overwrite(target, bytes),
            Self::ClearAndWrite { clear, bytes } => {
                let clear = clear.min(target.len());
                target[..clear].fill(0);
                overwrite(target, bytes);
            }
        }
    }
}

fn overwrite(target: &mut [u8], bytes: &[u8]) {
    let len = bytes.len().min(target.len());
    target[..len].copy_from_slice(&bytes[..len]);
}

fn matches_at(section: &[u8], offset: usize, search: &[u8]) -> bool {
    !search.is_empty() && section[offset..].starts_with(search)
}

/// Run the rules of `scope` over `section` and return the number of rewritten matches.
pub fn apply(scope: &PatchScope, section: &mut [u8]) -> usize {
    let mut applied = 0;

    match scope.strategy {
        ScanStrategy::Exhaustive => {
            for offset in 0..section.len() {
                let rule = scope
                    .rules
                    .iter()
                    .find(|rule| matches_at(section, offset, rule.search));

                if let Some(rule) = rule {
                    log::trace!("{},{}: match at {offset:#x}", scope.segment, scope.section);
                    rule.action.apply(&mut section[offset..]);
                    applied += 1;
                }
            }
        }
        ScanStrategy::Chained => {
            let mut cursor = 0;
            for (step, rule) in scope.rules.iter().enumerate() {
                let found = (cursor..section.len())
                    .find(|&offset| matches_at(section, offset, rule.search));

                let Some(offset) = found else {
                    log::trace!("{},{}: step {step} found nothing", scope.segment, scope.section);
                    break;
                };

                log::trace!("{},{}: step {step} matched at {offset:#x}", scope.segment, scope.section);
                rule.action.apply(&mut section[offset..]);
                applied += 1;
                cursor = offset.saturating_add(rule.skip);
            }
        }
    }

    applied
}

/// Byte range of the section `name` within the placed `segment`, clipped to the `copied` bytes
/// that came from the file.
pub fn section_span(segment: &Segment, name: &str, copied: usize) -> Option<Range<usize>> {
    let mut offset = 0u64;

    for section in segment.sections() {
        if macho::name_eq(&section.name, name) {
            let start = usize::try_from(offset).ok()?.min(copied);
            let end = usize::try_from(offset.saturating_add(section.size))
                .unwrap_or(usize::MAX)
                .min(copied);
            return Some(start..end);
        }
        offset = offset.saturating_add(section.size);
    }

    None
}

/// Run every scope in `scopes` that targets `segment` over the placed bytes of the segment.
/// Returns the number of rewritten matches.
pub fn patch_segment(scopes: &[PatchScope], segment: &Segment, placed: &mut [u8]) -> usize {
    let mut applied = 0;

    for scope in scopes.iter().filter(|scope| macho::name_eq(&segment.name, scope.segment)) {
        let Some(span) = section_span(segment, scope.section, placed.len()) else {
            log::debug!("{}: no section {}", scope.segment, scope.section);
            continue;
        };

        let count = apply(scope, &mut placed[span]);
        if count > 0 {
            log::debug!("{},{}: {count} patch(es) applied", scope.segment, scope.section);
        }
        applied += count;
    }

    applied
}
