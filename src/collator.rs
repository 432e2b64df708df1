//! The user-facing collator: string comparison, sort keys, CE streams.
//!
//! `compare` avoids sort keys entirely. It first trims the common code point
//! prefix (backing off over characters that cannot start cleanly), then
//! compares primaries while the CE streams are being fetched, and only
//! evaluates the weaker levels from the buffered CEs when every primary
//! ties. The level rules mirror the sort key writer exactly, so
//! `compare(a, b)` always agrees with `sort_key(a).cmp(&sort_key(b))`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::data::{CollationData, CollationSettings};
use crate::elements::{
    primary, secondary, tertiary, CASE_MASK, MERGE_SEPARATOR_CE,
    MERGE_SEPARATOR_CP, MERGE_SEPARATOR_PRIMARY, NO_CE, NO_CE_PRIMARY, ONLY_TERTIARY_MASK,
};
use crate::fcd::{FcdMode, FcdSource};
use crate::iter::{is_numeric_digit, CeSource, CollationIterator};
use crate::keys::{
    levels_for, write_sort_key_up_to_quaternary, LEVEL_CASE, LEVEL_IDENTICAL, LEVEL_QUATERNARY,
    LEVEL_SECONDARY, LEVEL_TERTIARY,
};
use crate::normalize::decompose_span;
use crate::root::CollationRoot;
use crate::source::PlainSource;
use crate::{AlternateHandling, CaseFirst, CollationError, Strength};

const FLAG_HIRAGANA: u8 = 0x01;
const FLAG_VARIABLE: u8 = 0x02;
const FLAG_DROPPED: u8 = 0x04;

/// A collator bound to one collation table, carrying its own copy of the
/// settings so per-instance changes never affect other users of the table.
#[derive(Clone)]
pub struct Collator {
    data: Arc<CollationData>,
    settings: CollationSettings,
}

enum AnyIter<'a> {
    Plain(CollationIterator<'a, PlainSource>),
    Fcd(CollationIterator<'a, FcdSource>),
}

impl CeSource for AnyIter<'_> {
    fn next_ce(&mut self) -> Result<u64, CollationError> {
        match self {
            AnyIter::Plain(iter) => iter.next_ce(),
            AnyIter::Fcd(iter) => iter.next_ce(),
        }
    }

    fn hiragana(&self) -> i8 {
        match self {
            AnyIter::Plain(iter) => iter.hiragana(),
            AnyIter::Fcd(iter) => iter.hiragana(),
        }
    }
}

/// Per-string state while primaries are compared: every fetched CE is kept,
/// with flags recording how the shifting pass classified it, so the weaker
/// levels can be evaluated from the buffer afterwards.
struct Side<'a> {
    iter: AnyIter<'a>,
    ces: Vec<u64>,
    flags: Vec<u8>,
    after_variable: bool,
}

impl Side<'_> {
    /// Fetches CEs until one participates at the primary level; returns its
    /// primary, or NO_CE_PRIMARY at end of text.
    fn next_relevant_primary(
        &mut self,
        settings: &CollationSettings,
    ) -> Result<u32, CollationError> {
        loop {
            let ce = self.iter.next_ce()?;
            if ce == NO_CE {
                return Ok(NO_CE_PRIMARY);
            }
            let mut flags = if self.iter.hiragana() == 1 {
                FLAG_HIRAGANA
            } else {
                0
            };
            let p = primary(ce);
            if ce == MERGE_SEPARATOR_CE {
                self.after_variable = false;
            } else if settings.shifted() {
                if p == 0 {
                    if self.after_variable {
                        flags |= FLAG_DROPPED;
                    }
                } else if p > MERGE_SEPARATOR_PRIMARY && p < settings.variable_top() {
                    flags |= FLAG_VARIABLE;
                    self.after_variable = true;
                } else {
                    self.after_variable = false;
                }
            }
            self.ces.push(ce);
            self.flags.push(flags);
            if flags & (FLAG_VARIABLE | FLAG_DROPPED) == 0 && p != 0 {
                return Ok(p);
            }
        }
    }

    fn secondaries(&self, french: bool) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.ces.len());
        let mut segment: Vec<u32> = Vec::new();
        for (&ce, &flags) in self.ces.iter().zip(&self.flags) {
            if flags & (FLAG_VARIABLE | FLAG_DROPPED) != 0 {
                continue;
            }
            if french && ce == MERGE_SEPARATOR_CE {
                segment.reverse();
                out.append(&mut segment);
                out.push(secondary(ce));
                continue;
            }
            let s = secondary(ce);
            if s == 0 {
                continue;
            }
            if french {
                segment.push(s);
            } else {
                out.push(s);
            }
        }
        if french {
            segment.reverse();
            out.append(&mut segment);
        }
        out
    }

    fn case_ranks(&self, upper_first: bool) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.ces.len());
        for (&ce, &flags) in self.ces.iter().zip(&self.flags) {
            if flags & (FLAG_VARIABLE | FLAG_DROPPED) != 0 {
                continue;
            }
            if ce == MERGE_SEPARATOR_CE {
                out.push(-1);
                continue;
            }
            let t = tertiary(ce);
            if t == 0 {
                continue;
            }
            let rank = ((t & CASE_MASK) >> 14) as i32;
            out.push(if upper_first { 2 - rank } else { rank });
        }
        out
    }

    fn tertiaries(&self, fold_mask: u32, fold_xor: u32) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.ces.len());
        for (&ce, &flags) in self.ces.iter().zip(&self.flags) {
            if flags & (FLAG_VARIABLE | FLAG_DROPPED) != 0 {
                continue;
            }
            if ce == MERGE_SEPARATOR_CE {
                out.push(tertiary(ce));
                continue;
            }
            let t = (tertiary(ce) & fold_mask) ^ fold_xor;
            if t != 0 {
                out.push(t);
            }
        }
        out
    }

    fn quaternaries(&self, data: &CollationData) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.ces.len());
        for (&ce, &flags) in self.ces.iter().zip(&self.flags) {
            if flags & FLAG_DROPPED != 0 {
                continue;
            }
            if ce == MERGE_SEPARATOR_CE {
                out.push(MERGE_SEPARATOR_PRIMARY);
                continue;
            }
            let p = primary(ce);
            if flags & FLAG_VARIABLE != 0 {
                out.push(data.reorder_primary(p));
            } else if p == 0 {
                continue;
            } else if flags & FLAG_HIRAGANA != 0 {
                out.push(u32::from(crate::keys::QUAT_HIRAGANA_BYTE) << 24);
            } else {
                out.push(u32::MAX);
            }
        }
        out
    }
}

fn compare_weights(a: &[u32], b: &[u32]) -> Ordering {
    for i in 0..a.len().max(b.len()) {
        let wa = a.get(i).copied().unwrap_or(0);
        let wb = b.get(i).copied().unwrap_or(0);
        match wa.cmp(&wb) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

impl Collator {
    #[must_use]
    pub fn new(data: Arc<CollationData>) -> Self {
        let settings = data.settings;
        Self { data, settings }
    }

    /// A collator over the process-wide root table.
    pub fn root() -> Result<Self, CollationError> {
        Ok(Self::new(CollationRoot::get()?))
    }

    #[must_use]
    pub fn settings(&self) -> &CollationSettings {
        &self.settings
    }

    pub fn set_strength(&mut self, strength: Strength) {
        self.settings.set_strength(strength);
    }

    pub fn set_alternate_handling(&mut self, alternate: AlternateHandling) {
        self.settings
            .set_shifted(alternate == AlternateHandling::Shifted);
    }

    pub fn set_case_first(&mut self, case_first: CaseFirst) {
        self.settings.set_case_first(case_first);
    }

    pub fn set_case_level(&mut self, on: bool) {
        self.settings.set_case_level(on);
    }

    pub fn set_numeric(&mut self, on: bool) {
        self.settings.set_numeric(on);
    }

    pub fn set_backward_secondary(&mut self, on: bool) {
        self.settings.set_backward_secondary(on);
    }

    pub fn set_variable_top(&mut self, primary: u32) {
        self.settings.set_variable_top(primary);
    }

    fn make_iter(&self, text: Vec<u32>, start: usize, small_steps: bool) -> AnyIter<'_> {
        let numeric = self.settings.numeric();
        if self.settings.check_fcd() {
            let source = FcdSource::new(text, start, FcdMode::CheckFcd { small_steps });
            AnyIter::Fcd(CollationIterator::new(&self.data, source, numeric))
        } else {
            let source = PlainSource::new(text, start);
            AnyIter::Plain(CollationIterator::new(&self.data, source, numeric))
        }
    }

    pub fn compare(&self, a: &str, b: &str) -> Result<Ordering, CollationError> {
        let ta: Vec<u32> = a.chars().map(|c| c as u32).collect();
        let tb: Vec<u32> = b.chars().map(|c| c as u32).collect();
        if ta == tb {
            return Ok(Ordering::Equal);
        }

        // skip the common prefix, then back off to a position where both
        // sides can start cleanly
        let mut eq = ta
            .iter()
            .zip(&tb)
            .take_while(|(x, y)| x == y)
            .count();
        while eq > 0
            && ((eq < ta.len() && self.data.is_unsafe_backward(ta[eq]))
                || (eq < tb.len() && self.data.is_unsafe_backward(tb[eq])))
        {
            eq -= 1;
        }
        if self.settings.numeric() {
            // never split a digit run
            while eq > 0 && is_numeric_digit(&self.data, ta[eq - 1]) {
                eq -= 1;
            }
        }

        let mut sa = Side {
            iter: self.make_iter(ta.clone(), eq, true),
            ces: Vec::new(),
            flags: Vec::new(),
            after_variable: false,
        };
        let mut sb = Side {
            iter: self.make_iter(tb.clone(), eq, true),
            ces: Vec::new(),
            flags: Vec::new(),
            after_variable: false,
        };

        loop {
            let pa = sa.next_relevant_primary(&self.settings)?;
            let pb = sb.next_relevant_primary(&self.settings)?;
            if pa != pb {
                return Ok(self
                    .data
                    .reorder_primary(pa)
                    .cmp(&self.data.reorder_primary(pb)));
            }
            if pa == NO_CE_PRIMARY {
                break;
            }
        }

        let levels = levels_for(&self.settings);
        if levels & LEVEL_SECONDARY != 0 {
            let french = self.settings.backward_secondary();
            match compare_weights(&sa.secondaries(french), &sb.secondaries(french)) {
                Ordering::Equal => {}
                other => return Ok(other),
            }
        }
        if levels & LEVEL_CASE != 0 {
            let upper_first = self.settings.case_first() == CaseFirst::Upper;
            let ra = sa.case_ranks(upper_first);
            let rb = sb.case_ranks(upper_first);
            for i in 0..ra.len().max(rb.len()) {
                let wa = ra.get(i).copied().unwrap_or(-2);
                let wb = rb.get(i).copied().unwrap_or(-2);
                match wa.cmp(&wb) {
                    Ordering::Equal => {}
                    other => return Ok(other),
                }
            }
        }
        if levels & LEVEL_TERTIARY != 0 {
            let (fold_mask, fold_xor) = self.tertiary_fold();
            match compare_weights(
                &sa.tertiaries(fold_mask, fold_xor),
                &sb.tertiaries(fold_mask, fold_xor),
            ) {
                Ordering::Equal => {}
                other => return Ok(other),
            }
        }
        if levels & LEVEL_QUATERNARY != 0 {
            match compare_weights(&sa.quaternaries(&self.data), &sb.quaternaries(&self.data)) {
                Ordering::Equal => {}
                other => return Ok(other),
            }
        }
        if levels & LEVEL_IDENTICAL != 0 {
            let na = identical_weights(&ta);
            let nb = identical_weights(&tb);
            return Ok(na.cmp(&nb));
        }
        Ok(Ordering::Equal)
    }

    pub fn sort_key(&self, s: &str) -> Result<Vec<u8>, CollationError> {
        let text: Vec<u32> = s.chars().map(|c| c as u32).collect();
        let levels = levels_for(&self.settings);
        let mut key = Vec::new();
        let mut iter = self.make_iter(text.clone(), 0, false);
        write_sort_key_up_to_quaternary(&mut iter, &self.data, &self.settings, levels, &mut key)?;
        if levels & LEVEL_IDENTICAL != 0 {
            let weights = identical_weights(&text);
            key.try_reserve(1 + 3 * weights.len())
                .map_err(|_| CollationError::Memory)?;
            key.push(crate::elements::LEVEL_SEPARATOR_BYTE);
            for w in weights {
                key.extend_from_slice(&[(w >> 16) as u8, (w >> 8) as u8, w as u8]);
            }
        }
        Ok(key)
    }

    /// The CE stream for `s`, mostly for diagnostics and tests.
    pub fn ces<'a>(&'a self, s: &str) -> Ces<'a> {
        let text: Vec<u32> = s.chars().map(|c| c as u32).collect();
        Ces {
            iter: self.make_iter(text, 0, false),
            done: false,
        }
    }

    fn tertiary_fold(&self) -> (u32, u32) {
        if self.settings.case_level() {
            (ONLY_TERTIARY_MASK, 0)
        } else if self.settings.case_first() == CaseFirst::Upper {
            (0xFFFF, CASE_MASK)
        } else {
            (0xFFFF, 0)
        }
    }
}

/// NFD code points shifted so the merge separator sorts below everything.
fn identical_weights(text: &[u32]) -> Vec<u32> {
    decompose_span(text)
        .into_iter()
        .map(|cp| if cp == MERGE_SEPARATOR_CP { 0 } else { cp + 1 })
        .collect()
}

pub struct Ces<'a> {
    iter: AnyIter<'a>,
    done: bool,
}

impl Iterator for Ces<'_> {
    type Item = Result<u64, CollationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.iter.next_ce() {
            Ok(NO_CE) => {
                self.done = true;
                None
            }
            Ok(ce) => Some(Ok(ce)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baked;

    fn root_collator() -> Collator {
        Collator::new(Arc::new(baked::root_fragment()))
    }

    fn tailored_collator() -> Collator {
        let root = Arc::new(baked::root_fragment());
        Collator::new(Arc::new(baked::tailored_fragment(root)))
    }

    /// compare must agree with sort key byte order, and be antisymmetric.
    fn assert_consistent(collator: &Collator, words: &[&str]) {
        for a in words {
            let ka = collator.sort_key(a).unwrap();
            for b in words {
                let kb = collator.sort_key(b).unwrap();
                let cmp = collator.compare(a, b).unwrap();
                assert_eq!(cmp, ka.cmp(&kb), "compare vs keys for {a:?} / {b:?}");
                assert_eq!(cmp.reverse(), collator.compare(b, a).unwrap());
            }
        }
    }

    fn assert_sorted(collator: &Collator, expected: &[&str]) {
        let mut scrambled: Vec<&str> = expected.to_vec();
        scrambled.reverse();
        scrambled.sort_by(|a, b| collator.compare(a, b).unwrap());
        assert_eq!(scrambled, expected);
        assert_consistent(collator, expected);
    }

    #[test]
    fn deluge_shifted() {
        let mut collator = root_collator();
        collator.set_strength(Strength::Quaternary);
        collator.set_alternate_handling(AlternateHandling::Shifted);
        assert_sorted(
            &collator,
            &["death", "de luge", "de-luge", "de-luge!", "deluge", "demark"],
        );
    }

    #[test]
    fn punctuation_non_ignorable() {
        let collator = root_collator();
        // without shifting, punctuation weighs in at the primary level
        assert_sorted(&collator, &["de luge", "de-luge", "death", "deluge"]);
    }

    #[test]
    fn multi_script() {
        let collator = root_collator();
        assert_sorted(
            &collator,
            &["zebra", "\u{3B1}", "\u{AC00}", "\u{304B}", "\u{4E00}", "\u{378}"],
        );
    }

    #[test]
    fn accents_decide_after_letters() {
        let collator = root_collator();
        // an earlier accent beats a later one, but never a letter difference
        assert_sorted(&collator, &["ae", "a\u{E9}", "\u{E1}e", "af"]);
    }

    #[test]
    fn numeric_ordering() {
        let mut collator = root_collator();
        assert_eq!(collator.compare("10", "9").unwrap(), Ordering::Less);
        collator.set_numeric(true);
        assert_eq!(collator.compare("9", "10").unwrap(), Ordering::Less);
        assert_eq!(collator.compare("99", "100").unwrap(), Ordering::Less);
        assert_eq!(collator.compare("101", "1001").unwrap(), Ordering::Less);
        assert_eq!(collator.compare("02", "2").unwrap(), Ordering::Equal);
        assert_sorted(&collator, &["a2b", "a10b", "a100b", "b1"]);
    }

    #[test]
    fn tailored_ch_sorts_as_a_letter() {
        let collator = tailored_collator();
        assert_sorted(&collator, &["c", "ci", "cz", "ch", "d"]);
        assert_eq!(collator.compare("cz", "ch").unwrap(), Ordering::Less);
        // shared prefix backs off so the contraction is still seen
        assert_eq!(collator.compare("ca", "ch").unwrap(), Ordering::Less);
    }

    #[test]
    fn tailored_contraction_with_marks() {
        let collator = tailored_collator();
        // a < a-acute (contraction) < b, and the discontiguous form matches
        assert_sorted(&collator, &["a", "a\u{301}", "a\u{323}\u{301}", "b"]);
        assert_eq!(
            collator
                .compare("a\u{323}\u{301}", "a\u{301}\u{323}")
                .unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn fcd_violations_normalize_away() {
        let mut collator = root_collator();
        collator.set_strength(Strength::Identical);
        assert_eq!(
            collator
                .compare("a\u{301}\u{323}", "a\u{323}\u{301}")
                .unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            collator.sort_key("a\u{301}\u{323}").unwrap(),
            collator.sort_key("a\u{323}\u{301}").unwrap()
        );
        assert_eq!(collator.compare("\u{E1}", "a\u{301}").unwrap(), Ordering::Equal);
    }

    #[test]
    fn case_first_settings() {
        let mut collator = root_collator();
        assert_sorted(&collator, &["ab", "aB", "Ab", "AB"]);
        collator.set_case_first(CaseFirst::Upper);
        assert_sorted(&collator, &["AB", "Ab", "aB", "ab"]);
        collator.set_case_first(CaseFirst::Off);
        collator.set_case_level(true);
        assert_sorted(&collator, &["ab", "aB", "Ab", "AB"]);
    }

    #[test]
    fn french_secondary_compares_from_the_end() {
        let mut collator = root_collator();
        let s1 = "e\u{301}e";
        let s2 = "ee\u{301}";
        assert_eq!(collator.compare(s1, s2).unwrap(), Ordering::Greater);
        assert_consistent(&collator, &[s1, s2]);
        collator.set_backward_secondary(true);
        assert_eq!(collator.compare(s1, s2).unwrap(), Ordering::Less);
        assert_consistent(&collator, &[s1, s2]);
    }

    #[test]
    fn merge_separator_sorts_lowest() {
        let collator = root_collator();
        assert_sorted(&collator, &["a\u{FFFE}b", "a\u{FFFE}z", "aa", "ab"]);
    }

    #[test]
    fn hiragana_breaks_quaternary_ties() {
        let mut collator = root_collator();
        assert_eq!(
            collator.compare("\u{304B}", "\u{30AB}").unwrap(),
            Ordering::Equal
        );
        collator.set_strength(Strength::Quaternary);
        assert_eq!(
            collator.compare("\u{304B}", "\u{30AB}").unwrap(),
            Ordering::Less
        );
        assert_consistent(&collator, &["\u{304B}", "\u{30AB}", "\u{304C}", "\u{30AC}"]);
    }

    #[test]
    fn strength_prefix_keys() {
        let mut collator = root_collator();
        collator.set_strength(Strength::Primary);
        let primary = collator.sort_key("Ab").unwrap();
        collator.set_strength(Strength::Secondary);
        let secondary = collator.sort_key("Ab").unwrap();
        collator.set_strength(Strength::Tertiary);
        let tertiary = collator.sort_key("Ab").unwrap();
        assert!(secondary.starts_with(&primary));
        assert!(tertiary.starts_with(&secondary));
        assert!(primary.len() < secondary.len() && secondary.len() < tertiary.len());
    }

    #[test]
    fn ce_stream_ends_cleanly() {
        let collator = root_collator();
        let ces: Vec<u64> = collator.ces("ab").map(Result::unwrap).collect();
        assert_eq!(ces.len(), 2);
        assert!(ces.iter().all(|&ce| ce != NO_CE));
    }
}
