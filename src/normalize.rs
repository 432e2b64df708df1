//! Thin wrappers around the normalization crate.
//!
//! The iterator pipeline only needs combining classes, full canonical
//! decomposition of single code points, and canonical reordering of short
//! spans; everything else stays in `unicode-normalization`.

use unicode_normalization::char::{canonical_combining_class, decompose_canonical};

pub(crate) fn ccc(cp: u32) -> u8 {
    match char::from_u32(cp) {
        Some(c) => canonical_combining_class(c),
        None => 0,
    }
}

/// Combining class of the first code point of the full decomposition.
pub(crate) fn lead_ccc(cp: u32) -> u8 {
    let mut lead = 0;
    let mut first = true;
    if let Some(c) = char::from_u32(cp) {
        decompose_canonical(c, |d| {
            if first {
                lead = canonical_combining_class(d);
                first = false;
            }
        });
    }
    lead
}

/// Combining class of the last code point of the full decomposition.
pub(crate) fn trail_ccc(cp: u32) -> u8 {
    let mut trail = 0;
    if let Some(c) = char::from_u32(cp) {
        decompose_canonical(c, |d| trail = canonical_combining_class(d));
    }
    trail
}

/// Full canonical decomposition of one code point, Hangul included.
pub(crate) fn decompose_cp(cp: u32, out: &mut Vec<u32>) {
    match char::from_u32(cp) {
        Some(c) => decompose_canonical(c, |d| out.push(d as u32)),
        None => out.push(cp),
    }
}

/// Canonical reordering: stable sort of nonstarter runs by combining class.
pub(crate) fn canonical_order(span: &mut [u32]) {
    let mut i = 1;
    while i < span.len() {
        let cc = ccc(span[i]);
        if cc != 0 {
            let mut j = i;
            while j > 0 && ccc(span[j - 1]) > cc {
                span.swap(j - 1, j);
                j -= 1;
            }
        }
        i += 1;
    }
}

/// NFD of a span: decompose every code point, then reorder.
pub(crate) fn decompose_span(span: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(span.len() + 2);
    for &cp in span {
        decompose_cp(cp, &mut out);
    }
    canonical_order(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_classes() {
        assert_eq!(ccc(0x61), 0); // a
        assert_eq!(ccc(0x301), 230); // acute
        assert_eq!(ccc(0x323), 220); // dot below
        assert_eq!(ccc(0x10FFFF), 0);
    }

    #[test]
    fn lead_and_trail_of_precomposed() {
        // é → e + acute
        assert_eq!(lead_ccc(0xE9), 0);
        assert_eq!(trail_ccc(0xE9), 230);
        // plain mark decomposes to itself
        assert_eq!(lead_ccc(0x301), 230);
        assert_eq!(trail_ccc(0x301), 230);
    }

    #[test]
    fn hangul_decomposes_algorithmically() {
        let mut out = Vec::new();
        decompose_cp(0xAC01, &mut out); // 각
        assert_eq!(out, vec![0x1100, 0x1161, 0x11A8]);
    }

    #[test]
    fn reordering_is_stable_by_class() {
        // a + acute(230) + dot below(220) reorders dot before acute
        let nfd = decompose_span(&[0x61, 0x301, 0x323]);
        assert_eq!(nfd, vec![0x61, 0x323, 0x301]);
        // equal classes keep their order
        let nfd = decompose_span(&[0x61, 0x301, 0x300]);
        assert_eq!(nfd, vec![0x61, 0x301, 0x300]);
    }

    #[test]
    fn precomposed_span_matches_manual_nfd() {
        // ệ = e + circumflex(230) preceded by dot below(220) in NFD
        let nfd = decompose_span(&[0x1EC7]);
        assert_eq!(nfd, vec![0x65, 0x323, 0x302]);
    }
}
