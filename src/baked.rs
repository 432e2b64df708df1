//! Baked root collation fragment.
//!
//! A hand-assigned slice of the root order, wide enough to exercise every
//! CE32 tag: variable punctuation, digits, Latin with case and marks, Greek,
//! kana with the voicing mark, conjoining Jamos plus the Hangul syllable
//! range, a CJK offset range, and the merge separator. Weight bytes follow
//! the usual conventions (lead bytes ordered by script, trailing bytes
//! starting at 0x04, odd gaps left for tailorings).

use crate::data::{CollationData, CollationSettings};
use crate::elements::{
    digit_ce32, expansion32_ce32, hangul_ce32, hiragana_ce32, implicit_ce32,
    latin_expansion_ce32, offset_ce32, simple_ce32,
};
use crate::trie::Ce32TrieBuilder;

fn letter(cp: u32) -> u32 {
    if (0x61..=0x7A).contains(&cp) {
        simple_ce32(0x2904 + 2 * (cp - 0x61), 0x05, 0x05)
    } else {
        simple_ce32(0x2904 + 2 * (cp - 0x41), 0x05, 0x85)
    }
}

fn mark(s8: u32) -> u32 {
    simple_ce32(0, s8, 0x05)
}

#[must_use]
pub fn root_fragment() -> CollationData {
    let mut trie = Ce32TrieBuilder::new(implicit_ce32());
    let mut ce32s: Vec<u32> = Vec::new();
    let mut ces: Vec<u64> = Vec::new();

    // variable punctuation, below the variable top
    trie.set(0x20, simple_ce32(0x0500, 0x05, 0x05));
    trie.set(0x2D, simple_ce32(0x0600, 0x05, 0x05));
    trie.set(0x21, simple_ce32(0x0700, 0x05, 0x05));
    trie.set(0x2E, simple_ce32(0x0800, 0x05, 0x05));
    trie.set(0x27, simple_ce32(0x0900, 0x05, 0x05));

    for d in 0..10u32 {
        let plain = simple_ce32(0x2704 + 2 * d, 0x05, 0x05);
        let index = ce32s.len();
        ce32s.push(plain);
        trie.set(0x30 + d, digit_ce32(index, d as u8));
    }

    for i in 0..26u32 {
        let p = 0x2904 + 2 * i;
        trie.set(0x61 + i, simple_ce32(p, 0x05, 0x05));
        trie.set(0x41 + i, simple_ce32(p, 0x05, 0x85));
    }
    trie.set(0xE6, latin_expansion_ce32(0x2A, 0x86, 0x05));

    // secondary-only combining marks
    let marks = [
        (0x300, 0x88),
        (0x301, 0x86),
        (0x308, 0x8A),
        (0x30A, 0x92),
        (0x323, 0x8C),
        (0x327, 0x90),
        (0x3099, 0x94),
    ];
    for (cp, s8) in marks {
        trie.set(cp, mark(s8));
    }

    // precomposed letters expand to base plus mark
    let pairs = [
        (0xC1, letter(0x41), mark(0x86)),
        (0xE0, letter(0x61), mark(0x88)),
        (0xE1, letter(0x61), mark(0x86)),
        (0xE4, letter(0x61), mark(0x8A)),
        (0xE5, letter(0x61), mark(0x92)),
        (0xE7, letter(0x63), mark(0x90)),
        (0xE9, letter(0x65), mark(0x86)),
        (0x1EA1, letter(0x61), mark(0x8C)),
    ];
    for (cp, first, second) in pairs {
        let index = ce32s.len();
        ce32s.push(first);
        ce32s.push(second);
        trie.set(cp, expansion32_ce32(index, 2));
    }

    // Greek lowercase
    for i in 0..25u32 {
        trie.set(0x3B1 + i, simple_ce32(0x6004 + 2 * i, 0x05, 0x05));
    }

    // kana: katakana carries the plain CE32, hiragana the flagging tag
    for (i, (hira, kata)) in [(0x304B, 0x30AB), (0x304D, 0x30AD), (0x304F, 0x30AF)]
        .into_iter()
        .enumerate()
    {
        let plain = simple_ce32(0x7004 + 2 * i as u32, 0x05, 0x05);
        trie.set(kata, plain);
        let index = ce32s.len();
        ce32s.push(plain);
        trie.set(hira, hiragana_ce32(index));
    }
    // voiced ka: base syllable plus the voicing mark
    let ga_index = ce32s.len();
    ce32s.push(simple_ce32(0x7004, 0x05, 0x05));
    ce32s.push(mark(0x94));
    trie.set(0x30AC, expansion32_ce32(ga_index, 2));
    let ga_wrapper = ce32s.len();
    ce32s.push(expansion32_ce32(ga_index, 2));
    trie.set(0x304C, hiragana_ce32(ga_wrapper));

    // conjoining Jamos, and the syllable range that decomposes into them
    let mut jamo_ce32s = Vec::with_capacity(67);
    for i in 0..19u32 {
        let ce32 = simple_ce32(0x6804 + 2 * i, 0x05, 0x05);
        jamo_ce32s.push(ce32);
        trie.set(0x1100 + i, ce32);
    }
    for i in 0..21u32 {
        let ce32 = simple_ce32(0x6A04 + 2 * i, 0x05, 0x05);
        jamo_ce32s.push(ce32);
        trie.set(0x1161 + i, ce32);
    }
    for i in 0..27u32 {
        let ce32 = simple_ce32(0x6C04 + 2 * i, 0x05, 0x05);
        jamo_ce32s.push(ce32);
        trie.set(0x11A8 + i, ce32);
    }
    trie.set_range(0xAC00, 0xD7A3, hangul_ce32());

    // unified CJK as one delta range
    let cjk_index = ces.len();
    ces.push((0x4E00_u64 << 32) | 0x7504_0401);
    trie.set_range(0x4E00, 0x9FFF, offset_ce32(cjk_index));

    trie.set(0xFFFE, simple_ce32(0x0200, 0x02, 0x02));

    let mut compressible = vec![false; 256];
    compressible[0x1E] = true;
    compressible[0x27] = true;
    compressible[0x29] = true;

    let mut settings = CollationSettings::default();
    settings.set_check_fcd(true);
    settings.set_variable_top(0x0C00_0000);

    CollationData {
        trie: trie.build(),
        ce32s,
        ces,
        contractions: Vec::new(),
        prefixes: Vec::new(),
        jamo_ce32s,
        numeric_primary: 0x1E00_0000,
        compressible,
        reorder_table: None,
        unsafe_backward: vec![0x300, 0x301, 0x308, 0x30A, 0x323, 0x327, 0x3099],
        settings,
        base: None,
    }
}

/// Small tailoring over the root: Slavic-style "ch" between c and d, an
/// a-acute contraction that may match discontiguously, and an "x after c"
/// prefix rule.
#[cfg(test)]
#[must_use]
pub fn tailored_fragment(base: std::sync::Arc<CollationData>) -> CollationData {
    use crate::data::{ContractionSet, PrefixSet};
    use crate::elements::{contraction_ce32, prefix_ce32, FALLBACK_CE32};

    let mut trie = Ce32TrieBuilder::new(FALLBACK_CE32);
    let mut contractions = Vec::new();
    let mut prefixes = Vec::new();

    let ch_index = contractions.len();
    contractions.push(ContractionSet {
        default_ce32: FALLBACK_CE32,
        lowest_first: 0x68,
        suffixes: vec![(vec![0x68], simple_ce32(0x2909, 0x05, 0x05))],
    });
    trie.set(0x63, contraction_ce32(ch_index, false));

    let a_index = contractions.len();
    contractions.push(ContractionSet {
        default_ce32: FALLBACK_CE32,
        lowest_first: 0x301,
        suffixes: vec![(vec![0x301], simple_ce32(0x2905, 0x05, 0x05))],
    });
    trie.set(0x61, contraction_ce32(a_index, true));

    let x_index = prefixes.len();
    prefixes.push(PrefixSet {
        default_ce32: FALLBACK_CE32,
        prefixes: vec![(vec![0x63], simple_ce32(0x2B04, 0x05, 0x05))],
    });
    trie.set(0x78, prefix_ce32(x_index));

    let mut settings = CollationSettings::default();
    settings.set_check_fcd(true);
    settings.set_variable_top(0x0C00_0000);

    CollationData {
        trie: trie.build(),
        ce32s: Vec::new(),
        ces: Vec::new(),
        contractions,
        prefixes,
        jamo_ce32s: Vec::new(),
        numeric_primary: 0,
        compressible: base.compressible.clone(),
        reorder_table: None,
        unsafe_backward: vec![0x61, 0x63, 0x68, 0x301, 0x323],
        settings,
        base: Some(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{classify, Ce32Kind};

    #[test]
    fn tag_coverage() {
        let root = root_fragment();
        assert!(matches!(classify(root.trie.get(0x31)), Ce32Kind::Digit { .. }));
        assert!(matches!(classify(root.trie.get(0xE6)), Ce32Kind::LatinExpansion(..)));
        assert!(matches!(classify(root.trie.get(0xE1)), Ce32Kind::Expansion32 { .. }));
        assert!(matches!(classify(root.trie.get(0xAC00)), Ce32Kind::Hangul));
        assert!(matches!(classify(root.trie.get(0x4E2D)), Ce32Kind::Offset { .. }));
        assert!(matches!(classify(root.trie.get(0x304B)), Ce32Kind::Hiragana { .. }));
        assert!(matches!(classify(root.trie.get(0x10_0000)), Ce32Kind::Implicit));
        assert_eq!(root.jamo_ce32s.len(), 67);
    }

    #[test]
    fn letter_primaries_are_ordered() {
        let root = root_fragment();
        let mut prev = 0;
        for cp in 0x61..=0x7A {
            let ce32 = root.trie.get(cp);
            assert!(ce32 > prev);
            prev = ce32;
        }
        // case differs below the primary and secondary
        assert_eq!(root.trie.get(0x41) >> 16, root.trie.get(0x61) >> 16);
    }
}
