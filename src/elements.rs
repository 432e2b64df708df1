//! The 64-bit collation element (CE) and the 32-bit compact per-character
//! encoding (CE32).
//!
//! A CE packs primary (high 32 bits), secondary (next 16), and case+tertiary
//! (low 16) weights. A CE32 is *simple* when its low byte is below
//! `SPECIAL_CE32_LOW_BYTE` and converts directly to a CE; otherwise it is
//! *special*, carrying a 5-bit tag in the low byte and a payload in the
//! upper 24 bits.

//
// CE constants
//

/// Primary weight of the end-of-text sentinel. Never assigned to a character.
pub const NO_CE_PRIMARY: u32 = 1;

pub const NO_CE_WEIGHT16: u32 = 0x0100;

/// End-of-text sentinel CE.
pub const NO_CE: u64 = ((NO_CE_PRIMARY as u64) << 32)
    | ((NO_CE_WEIGHT16 as u64) << 16)
    | (NO_CE_WEIGHT16 as u64);

/// Primary weight of the merge separator (U+FFFE). Demarcates
/// independently-compared substrings; below every real primary.
pub const MERGE_SEPARATOR_PRIMARY: u32 = 0x0200_0000;

pub const MERGE_SEPARATOR_WEIGHT16: u32 = 0x0200;

pub const MERGE_SEPARATOR_CE: u64 = ((MERGE_SEPARATOR_PRIMARY as u64) << 32)
    | ((MERGE_SEPARATOR_WEIGHT16 as u64) << 16)
    | (MERGE_SEPARATOR_WEIGHT16 as u64);

pub const MERGE_SEPARATOR_CP: u32 = 0xFFFE;

pub const LEVEL_SEPARATOR_BYTE: u8 = 0x01;
pub const MERGE_SEPARATOR_BYTE: u8 = 0x02;

/// Common secondary/tertiary weight, 16-bit form.
pub const COMMON_WEIGHT16: u32 = 0x0500;

/// Common secondary and tertiary, packed as the low 32 bits of a CE.
pub const COMMON_SEC_AND_TER: u64 = 0x0500_0500;

/// Case bits inside the low 16 bits of a CE.
pub const CASE_MASK: u32 = 0xC000;

pub const ONLY_TERTIARY_MASK: u32 = 0x3FFF;

/// Lead byte reserved for implicit (unassigned-codepoint) primaries.
pub const UNASSIGNED_IMPLICIT_BYTE: u32 = 0xFE;

//
// CE32 tags
//

/// A CE32 is special iff its low byte is at least this value. Case bits in a
/// simple CE32's low byte can reach 0x85 at most, so no collision.
pub const SPECIAL_CE32_LOW_BYTE: u32 = 0xC0;

pub const TAG_FALLBACK: u32 = 0;
pub const TAG_LATIN_EXPANSION: u32 = 1;
pub const TAG_EXPANSION32: u32 = 2;
pub const TAG_EXPANSION: u32 = 3;
pub const TAG_PREFIX: u32 = 4;
pub const TAG_CONTRACTION: u32 = 5;
pub const TAG_DIGIT: u32 = 6;
pub const TAG_HANGUL: u32 = 7;
pub const TAG_OFFSET: u32 = 8;
pub const TAG_IMPLICIT: u32 = 9;
pub const TAG_HIRAGANA: u32 = 10;
pub const TAG_BUILDER_CONTEXT: u32 = 11;

/// Tailoring-miss marker: resolve the codepoint in the base table instead.
pub const FALLBACK_CE32: u32 = SPECIAL_CE32_LOW_BYTE | TAG_FALLBACK;

//
// CE accessors
//

#[must_use]
pub fn primary(ce: u64) -> u32 {
    (ce >> 32) as u32
}

#[must_use]
pub fn secondary(ce: u64) -> u32 {
    ((ce >> 16) & 0xFFFF) as u32
}

#[must_use]
pub fn tertiary(ce: u64) -> u32 {
    (ce & 0xFFFF) as u32
}

#[must_use]
pub fn ce_from_parts(p: u32, s: u32, t: u32) -> u64 {
    ((p as u64) << 32) | ((s as u64) << 16) | (t as u64)
}

//
// CE32 decoding
//

#[must_use]
pub fn is_special(ce32: u32) -> bool {
    (ce32 & 0xFF) >= SPECIAL_CE32_LOW_BYTE
}

#[must_use]
pub fn tag_of(ce32: u32) -> u32 {
    ce32 & 0x1F
}

/// Simple CE32 layout: `pppp pppp pppp pppp ssss ssss cctt tttt`, i.e. a
/// 16-bit primary, a secondary byte, and a case+tertiary byte.
#[must_use]
pub fn ce_from_simple_ce32(ce32: u32) -> u64 {
    (((ce32 & 0xFFFF_0000) as u64) << 32)
        | (((ce32 & 0xFF00) as u64) << 16)
        | (((ce32 & 0xFF) as u64) << 8)
}

/// One variant per tag; produced by [`classify`]. Tag dispatch loops on this
/// until a terminal (non-special) value has been turned into CEs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ce32Kind {
    /// Not special at all; carries the ready-made CE.
    Simple(u64),
    /// Tailoring miss; retry the lookup in the base table.
    Fallback,
    /// Two CEs packed into the CE32 itself (common single-letter-plus-accent
    /// case): primary + inline tertiary first, secondary-only second.
    LatinExpansion(u64, u64),
    /// `length` simple CE32s starting at `index` in the CE32 list.
    Expansion32 { index: usize, length: usize },
    /// `length` full CEs starting at `index` in the CE list.
    Expansion { index: usize, length: usize },
    /// Preceding-context override; `index` into the prefix table.
    Prefix { index: usize },
    /// Forward suffix match; `index` into the contraction table.
    Contraction {
        index: usize,
        maybe_discontiguous: bool,
    },
    /// Numeric-collation placeholder; `index` of the plain CE32 used when
    /// numeric mode is off.
    Digit { digit: u8, index: usize },
    /// Algorithmic Hangul syllable expansion from the Jamo table.
    Hangul,
    /// Delta-encoded range; `index` of the range data CE in the CE list.
    Offset { index: usize },
    /// Synthesize a codepoint-ordered fallback CE.
    Implicit,
    /// Sets the tri-state Hiragana flag; `index` of the real CE32.
    Hiragana { index: usize },
    /// Only resolvable while a table is being built; invalid at runtime.
    BuilderContext,
}

#[must_use]
pub fn classify(ce32: u32) -> Ce32Kind {
    if !is_special(ce32) {
        return Ce32Kind::Simple(ce_from_simple_ce32(ce32));
    }

    match tag_of(ce32) {
        TAG_FALLBACK => Ce32Kind::Fallback,
        TAG_LATIN_EXPANSION => {
            let p = (ce32 >> 24) & 0xFF;
            let s = (ce32 >> 16) & 0xFF;
            let t = (ce32 >> 8) & 0xFF;
            let ce0 = ce_from_parts(p << 24, COMMON_WEIGHT16, t << 8);
            let ce1 = ce_from_parts(0, s << 8, COMMON_WEIGHT16);
            Ce32Kind::LatinExpansion(ce0, ce1)
        }
        TAG_EXPANSION32 => Ce32Kind::Expansion32 {
            index: (ce32 >> 13) as usize,
            length: ((ce32 >> 8) & 0x1F) as usize,
        },
        TAG_EXPANSION => Ce32Kind::Expansion {
            index: (ce32 >> 13) as usize,
            length: ((ce32 >> 8) & 0x1F) as usize,
        },
        TAG_PREFIX => Ce32Kind::Prefix {
            index: (ce32 >> 13) as usize,
        },
        TAG_CONTRACTION => Ce32Kind::Contraction {
            index: (ce32 >> 13) as usize,
            maybe_discontiguous: (ce32 & 0x100) != 0,
        },
        TAG_DIGIT => Ce32Kind::Digit {
            digit: ((ce32 >> 8) & 0xF) as u8,
            index: (ce32 >> 13) as usize,
        },
        TAG_HANGUL => Ce32Kind::Hangul,
        TAG_OFFSET => Ce32Kind::Offset {
            index: (ce32 >> 13) as usize,
        },
        TAG_IMPLICIT => Ce32Kind::Implicit,
        TAG_HIRAGANA => Ce32Kind::Hiragana {
            index: (ce32 >> 13) as usize,
        },
        _ => Ce32Kind::BuilderContext,
    }
}

//
// CE32 encoding (loader/builder side; also used by baked tables and tests)
//

#[must_use]
pub fn simple_ce32(p16: u32, s8: u32, t8: u32) -> u32 {
    debug_assert!(t8 < SPECIAL_CE32_LOW_BYTE);
    (p16 << 16) | (s8 << 8) | t8
}

fn special(tag: u32, payload: u32) -> u32 {
    (payload << 8) | SPECIAL_CE32_LOW_BYTE | tag
}

#[must_use]
pub fn latin_expansion_ce32(p8: u32, s8: u32, t8: u32) -> u32 {
    special(TAG_LATIN_EXPANSION, (p8 << 16) | (s8 << 8) | t8)
}

#[must_use]
pub fn expansion32_ce32(index: usize, length: usize) -> u32 {
    debug_assert!(length <= 0x1F);
    special(TAG_EXPANSION32, ((index as u32) << 5) | length as u32)
}

#[must_use]
pub fn expansion_ce32(index: usize, length: usize) -> u32 {
    debug_assert!(length <= 0x1F);
    special(TAG_EXPANSION, ((index as u32) << 5) | length as u32)
}

#[must_use]
pub fn prefix_ce32(index: usize) -> u32 {
    special(TAG_PREFIX, (index as u32) << 5)
}

#[must_use]
pub fn contraction_ce32(index: usize, maybe_discontiguous: bool) -> u32 {
    let flag = u32::from(maybe_discontiguous);
    special(TAG_CONTRACTION, ((index as u32) << 5) | flag)
}

#[must_use]
pub fn digit_ce32(index: usize, digit: u8) -> u32 {
    debug_assert!(digit < 10);
    special(TAG_DIGIT, ((index as u32) << 5) | digit as u32)
}

#[must_use]
pub fn hangul_ce32() -> u32 {
    special(TAG_HANGUL, 0)
}

#[must_use]
pub fn offset_ce32(index: usize) -> u32 {
    special(TAG_OFFSET, (index as u32) << 5)
}

#[must_use]
pub fn implicit_ce32() -> u32 {
    special(TAG_IMPLICIT, 0)
}

#[must_use]
pub fn hiragana_ce32(index: usize) -> u32 {
    special(TAG_HIRAGANA, (index as u32) << 5)
}

#[must_use]
pub fn builder_context_ce32() -> u32 {
    special(TAG_BUILDER_CONTEXT, 0)
}

//
// Synthesized weights
//

/// CE for an unassigned codepoint: lead byte 0xFE plus three payload bytes
/// monotone in the codepoint, each kept in 0x04..=0xFC so they never collide
/// with separator or compression bytes.
#[must_use]
pub fn implicit_ce(cp: u32) -> u64 {
    let b2 = 0x04 + cp / (253 * 253);
    let b3 = 0x04 + (cp / 253) % 253;
    let b4 = 0x04 + cp % 253;
    let p = (UNASSIGNED_IMPLICIT_BYTE << 24) | (b2 << 16) | (b3 << 8) | b4;
    ((p as u64) << 32) | COMMON_SEC_AND_TER
}

/// Advance a three-byte primary by `delta` steps, counting in base 251 over
/// the two trailing bytes (values 0x04..=0xFE). Range sizing is the table
/// builder's responsibility; the lead byte never changes.
#[must_use]
pub fn primary_plus_offset(base: u32, delta: u32) -> u32 {
    let hi = (base >> 16) & 0xFF;
    let mid = (base >> 8) & 0xFF;
    let v = (hi - 4) * 251 + (mid - 4) + delta;
    let hi2 = 4 + v / 251;
    let mid2 = 4 + v % 251;
    (base & 0xFF00_0000) | (hi2 << 16) | (mid2 << 8)
}
