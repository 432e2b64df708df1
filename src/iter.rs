//! Forward collation iterator: code points in, 64-bit CEs out.
//!
//! One code point can produce several CEs (expansions, Hangul syllables,
//! numeric runs), so resolved CEs are buffered and served before the next
//! character is read. Special CE32s are resolved in a dispatch loop until a
//! terminal form has pushed its CEs.

use crate::data::{CollationData, PrefixSet};
use crate::elements::{
    ce_from_simple_ce32, classify, implicit_ce, primary_plus_offset, Ce32Kind, COMMON_SEC_AND_TER,
    NO_CE,
};
use crate::normalize::ccc;
use crate::source::TextSource;
use crate::CollationError;

const HANGUL_BASE: u32 = 0xAC00;
const JAMO_L_COUNT: u32 = 19;
const JAMO_V_COUNT: u32 = 21;
const JAMO_T_COUNT: u32 = 28;

/// Anything that yields a CE stream. `hiragana` reports the tri-state flag
/// for the most recently started character: -1 before any character, else
/// 0 or 1.
pub trait CeSource {
    fn next_ce(&mut self) -> Result<u64, CollationError>;
    fn hiragana(&self) -> i8;
}

/// How much surrounding context a lookup may consult. Context-sensitive
/// tags resolve to their defaults when the surrounding text has already
/// been consumed on their behalf.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Full,
    PrefixOnly,
    NoContext,
}

pub struct CollationIterator<'a, S: TextSource> {
    data: &'a CollationData,
    source: S,
    ces: Vec<u64>,
    ce_index: usize,
    numeric: bool,
    hiragana: i8,
}

impl<'a, S: TextSource> CollationIterator<'a, S> {
    #[must_use]
    pub fn new(data: &'a CollationData, source: S, numeric: bool) -> Self {
        Self {
            data,
            source,
            ces: Vec::new(),
            ce_index: 0,
            numeric,
            hiragana: -1,
        }
    }

    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub(crate) fn data(&self) -> &'a CollationData {
        self.data
    }

    /// Resolves `c` in this table, chasing FALLBACK tags into the base.
    fn lookup_from(
        mut d: &'a CollationData,
        c: u32,
    ) -> Result<(&'a CollationData, u32), CollationError> {
        let mut ce32 = d.trie.get(c);
        while let Ce32Kind::Fallback = classify(ce32) {
            match &d.base {
                Some(base) => {
                    d = base;
                    ce32 = d.trie.get(c);
                }
                None => return Err(CollationError::MalformedTable("fallback in root table")),
            }
        }
        Ok((d, ce32))
    }

    /// All CEs of the next character, or None at end of text. Leaves the
    /// internal buffer empty; callers own the group.
    pub(crate) fn next_ce_group(&mut self) -> Result<Option<Vec<u64>>, CollationError> {
        self.ces.clear();
        self.ce_index = 0;
        let Some(c) = self.source.next() else {
            return Ok(None);
        };
        self.hiragana = 0;
        let (d, ce32) = Self::lookup_from(self.data, c)?;
        self.append_ces(d, c, ce32, Context::Full)?;
        if self.ces.is_empty() {
            return Err(CollationError::MalformedTable("character expanded to no CEs"));
        }
        Ok(Some(std::mem::take(&mut self.ces)))
    }

    /// CEs of the single code point just stepped over backward. The cursor
    /// sits right before `c` on entry and on exit. Only prefix context can
    /// be honored here; the caller guarantees `c` is safe backward, so no
    /// contraction can reach across it.
    pub(crate) fn ces_for_code_point_backward(
        &mut self,
        c: u32,
    ) -> Result<Vec<u64>, CollationError> {
        self.source.move_forward(1);
        self.ces.clear();
        self.ce_index = 0;
        let (d, ce32) = Self::lookup_from(self.data, c)?;
        let result = self.append_ces(d, c, ce32, Context::PrefixOnly);
        self.source.move_backward(1);
        result?;
        if self.ces.is_empty() {
            return Err(CollationError::MalformedTable("character expanded to no CEs"));
        }
        Ok(std::mem::take(&mut self.ces))
    }

    /// Dispatch loop: resolve `ce32` (for character `c`) until its CEs have
    /// been appended to the buffer.
    fn append_ces(
        &mut self,
        d: &'a CollationData,
        c: u32,
        ce32: u32,
        ctx: Context,
    ) -> Result<(), CollationError> {
        let mut d = d;
        let mut ce32 = ce32;
        loop {
            match classify(ce32) {
                Ce32Kind::Simple(ce) => {
                    self.ces.push(ce);
                    return Ok(());
                }
                Ce32Kind::Fallback => {
                    // a contextual default can itself defer to the base
                    match &d.base {
                        Some(base) => {
                            let (nd, nce32) = Self::lookup_from(base, c)?;
                            d = nd;
                            ce32 = nce32;
                        }
                        None => {
                            return Err(CollationError::MalformedTable("fallback in root table"))
                        }
                    }
                }
                Ce32Kind::LatinExpansion(ce0, ce1) => {
                    self.ces.push(ce0);
                    self.ces.push(ce1);
                    return Ok(());
                }
                Ce32Kind::Expansion32 { index, length } => {
                    if length == 0 {
                        return Err(CollationError::MalformedTable("empty expansion"));
                    }
                    for i in 0..length {
                        let x = d.ce32_at(index + i)?;
                        self.ces.push(ce_from_simple_ce32(x));
                    }
                    return Ok(());
                }
                Ce32Kind::Expansion { index, length } => {
                    if length == 0 {
                        return Err(CollationError::MalformedTable("empty expansion"));
                    }
                    for i in 0..length {
                        self.ces.push(d.ce_at(index + i)?);
                    }
                    return Ok(());
                }
                Ce32Kind::Prefix { index } => {
                    let set = d.prefix_at(index)?;
                    ce32 = if ctx == Context::NoContext {
                        set.default_ce32
                    } else {
                        self.match_prefix(set)
                    };
                }
                Ce32Kind::Contraction {
                    index,
                    maybe_discontiguous,
                } => {
                    if ctx == Context::Full {
                        match self.match_contraction(d, index, maybe_discontiguous)? {
                            Some(next) => ce32 = next,
                            // discontiguous match already emitted its CEs
                            None => return Ok(()),
                        }
                    } else {
                        ce32 = d.contraction_at(index)?.default_ce32;
                    }
                }
                Ce32Kind::Digit { digit, index } => {
                    if self.numeric && ctx == Context::Full {
                        return self.append_numeric_run(digit);
                    }
                    ce32 = d.ce32_at(index)?;
                }
                Ce32Kind::Hangul => return self.append_hangul(d, c),
                Ce32Kind::Offset { index } => {
                    let dce = d.ce_at(index)?;
                    let start = (dce >> 32) as u32;
                    let base_primary = (dce as u32) & 0xFFFF_FF00;
                    let step = (dce & 0xFF) as u32;
                    let p = primary_plus_offset(base_primary, (c - start) * step);
                    self.ces.push(((p as u64) << 32) | COMMON_SEC_AND_TER);
                    return Ok(());
                }
                Ce32Kind::Implicit => {
                    self.ces.push(implicit_ce(c));
                    return Ok(());
                }
                Ce32Kind::Hiragana { index } => {
                    self.hiragana = 1;
                    ce32 = d.ce32_at(index)?;
                }
                Ce32Kind::BuilderContext => {
                    return Err(CollationError::MalformedTable("builder-only tag at runtime"))
                }
            }
        }
    }

    /// The cursor sits right after the tagged character; each candidate
    /// context is compared walking backward, longest first.
    fn match_prefix(&mut self, set: &PrefixSet) -> u32 {
        for (context, ce32) in &set.prefixes {
            let mut steps = 1;
            let _ = self.source.previous(); // the tagged character itself
            let mut matched = true;
            for &pc in context {
                match self.source.previous() {
                    Some(x) => {
                        steps += 1;
                        if x != pc {
                            matched = false;
                            break;
                        }
                    }
                    None => {
                        matched = false;
                        break;
                    }
                }
            }
            self.source.move_forward(steps);
            if matched {
                return *ce32;
            }
        }
        set.default_ce32
    }

    /// Greedy contiguous suffix match, then the discontiguous pass over
    /// skipped combining marks (strictly increasing combining classes).
    ///
    /// Returns the CE32 still to be resolved, or None when the
    /// discontiguous path has already emitted everything (the contraction's
    /// CEs followed by those of the marks it reached across).
    fn match_contraction(
        &mut self,
        d: &'a CollationData,
        index: usize,
        maybe_discontiguous: bool,
    ) -> Result<Option<u32>, CollationError> {
        let set = d.contraction_at(index)?;
        let Some(first) = self.source.next() else {
            return Ok(Some(set.default_ce32));
        };
        if first < set.lowest_first && ccc(first) == 0 {
            self.source.move_backward(1);
            return Ok(Some(set.default_ce32));
        }

        let mut candidate = vec![first];
        let mut pending = 1; // consumed beyond the best match so far
        let mut best: Option<u32> = None;
        let mut best_len = 0;
        loop {
            let (exact, extendable) = set.lookup(&candidate);
            if let Some(ce32) = exact {
                best = Some(ce32);
                best_len = candidate.len();
                pending = 0;
            }
            if !extendable {
                break;
            }
            match self.source.next() {
                Some(nc) => {
                    candidate.push(nc);
                    pending += 1;
                }
                None => break,
            }
        }
        self.source.move_backward(pending);
        candidate.truncate(best_len);

        if maybe_discontiguous && set.lookup(&candidate).1 {
            let mut skipped: Vec<u32> = Vec::new();
            let mut committed = 0;
            let mut disc_best: Option<u32> = None;
            let mut max_ccc = 0u8;
            loop {
                let Some(nc) = self.source.next() else { break };
                let cc = ccc(nc);
                if cc == 0 || cc <= max_ccc {
                    self.source.move_backward(1);
                    break;
                }
                candidate.push(nc);
                let (exact, extendable) = set.lookup(&candidate);
                if let Some(ce32) = exact {
                    disc_best = Some(ce32);
                    committed = skipped.len();
                    if !extendable {
                        break;
                    }
                } else {
                    candidate.pop();
                    skipped.push(nc);
                    max_ccc = cc;
                }
            }
            if let Some(ce32) = disc_best {
                // marks skipped after the final matched character go back
                self.source.move_backward(skipped.len() - committed);
                self.append_ces(d, 0, ce32, Context::NoContext)?;
                // the reached-across marks sort right after the contraction
                for &mark in &skipped[..committed] {
                    let (md, mce32) = Self::lookup_from(self.data, mark)?;
                    self.append_ces(md, mark, mce32, Context::NoContext)?;
                }
                return Ok(None);
            }
            self.source.move_backward(skipped.len());
        }

        Ok(Some(best.unwrap_or(set.default_ce32)))
    }

    /// Consumes the digit run and appends its numeric CEs.
    fn append_numeric_run(&mut self, first_digit: u8) -> Result<(), CollationError> {
        let mut digits = vec![first_digit];
        loop {
            let Some(nc) = self.source.next() else { break };
            let (_, ce32) = Self::lookup_from(self.data, nc)?;
            match classify(ce32) {
                Ce32Kind::Digit { digit, .. } => digits.push(digit),
                _ => {
                    self.source.move_backward(1);
                    break;
                }
            }
        }
        let numeric_primary = self.data.effective_numeric_primary();
        if numeric_primary == 0 {
            return Err(CollationError::MalformedTable("missing numeric primary"));
        }
        append_numeric_ces(numeric_primary, &digits, &mut self.ces);
        Ok(())
    }

    fn append_hangul(&mut self, d: &'a CollationData, c: u32) -> Result<(), CollationError> {
        let table = jamo_table(d)?;
        let s = c - HANGUL_BASE;
        let l = s / (JAMO_V_COUNT * JAMO_T_COUNT);
        let v = (s / JAMO_T_COUNT) % JAMO_V_COUNT;
        let t = s % JAMO_T_COUNT;
        self.push_jamo(table, l)?;
        self.push_jamo(table, JAMO_L_COUNT + v)?;
        if t > 0 {
            self.push_jamo(table, JAMO_L_COUNT + JAMO_V_COUNT + t - 1)?;
        }
        Ok(())
    }

    fn push_jamo(&mut self, table: &[u32], index: u32) -> Result<(), CollationError> {
        let ce32 = table
            .get(index as usize)
            .copied()
            .ok_or(CollationError::MalformedTable("Jamo table too short"))?;
        if crate::elements::is_special(ce32) {
            // conjoining Jamos must carry direct weights
            return Err(CollationError::MalformedTable("special Jamo CE32"));
        }
        self.ces.push(ce_from_simple_ce32(ce32));
        Ok(())
    }
}

/// Whether `c` carries a DIGIT tag in `data` or any of its bases.
pub(crate) fn is_numeric_digit(data: &CollationData, c: u32) -> bool {
    let mut d = data;
    loop {
        match classify(d.trie.get(c)) {
            Ce32Kind::Fallback => match &d.base {
                Some(base) => d = base,
                None => return false,
            },
            Ce32Kind::Digit { .. } => return true,
            _ => return false,
        }
    }
}

fn jamo_table(d: &CollationData) -> Result<&[u32], CollationError> {
    let mut d = d;
    loop {
        if !d.jamo_ce32s.is_empty() {
            return Ok(&d.jamo_ce32s);
        }
        match &d.base {
            Some(base) => d = base,
            None => return Err(CollationError::MalformedTable("missing Jamo table")),
        }
    }
}

impl<S: TextSource> CeSource for CollationIterator<'_, S> {
    fn next_ce(&mut self) -> Result<u64, CollationError> {
        if self.ce_index < self.ces.len() {
            let ce = self.ces[self.ce_index];
            self.ce_index += 1;
            return Ok(ce);
        }
        match self.next_ce_group()? {
            Some(group) => {
                let ce = group[0];
                self.ces = group;
                self.ce_index = 1;
                Ok(ce)
            }
            None => Ok(NO_CE),
        }
    }

    fn hiragana(&self) -> i8 {
        self.hiragana
    }
}

//
// Numeric (CODAN) primaries
//

/// Encodes a digit sequence as one or more CEs under `numeric_primary`'s
/// lead byte, ordered by numeric value. Values up to five digits pack into
/// one to three trailing bytes; longer values get an exponent byte followed
/// by base-100 digit pairs, two pairs per continuation CE.
pub(crate) fn append_numeric_ces(numeric_primary: u32, digits: &[u8], out: &mut Vec<u64>) {
    let lead = numeric_primary & 0xFF00_0000;
    let significant = {
        let mut i = 0;
        while i + 1 < digits.len() && digits[i] == 0 {
            i += 1;
        }
        &digits[i..]
    };

    if significant.len() <= 5 {
        let mut value: u32 = 0;
        for &d in significant {
            value = value * 10 + u32::from(d);
        }
        let primary = if value < 74 {
            lead | ((0x04 + value) << 16)
        } else if value < 10234 {
            let v = value - 74;
            lead | ((0x4E + v / 254) << 16) | ((0x02 + v % 254) << 8)
        } else {
            let v = value - 10234;
            lead | ((0x76 + v / 64516) << 16) | ((0x02 + (v / 254) % 254) << 8) | (0x02 + v % 254)
        };
        out.push(((primary as u64) << 32) | COMMON_SEC_AND_TER);
        return;
    }

    // base-100 pairs, front-padded to an even digit count
    let pair_count = (significant.len() + 1) / 2;
    if pair_count > 130 {
        // value beyond the exponent range; everything this long ties
        out.push((((lead | (0xFF << 16)) as u64) << 32) | COMMON_SEC_AND_TER);
        return;
    }
    let mut pairs = Vec::with_capacity(pair_count);
    let mut iter = significant.iter();
    if significant.len() % 2 == 1 {
        if let Some(&d) = iter.next() {
            pairs.push(u32::from(d));
        }
    }
    while let (Some(&hi), Some(&lo)) = (iter.next(), iter.next()) {
        pairs.push(u32::from(hi) * 10 + u32::from(lo));
    }

    let exponent = 0x78 + (pair_count as u32 - 3);
    let byte = |p: u32| 0x04 + p;
    let first = lead | (exponent << 16) | (byte(pairs[0]) << 8) | byte(pairs[1]);
    out.push(((first as u64) << 32) | COMMON_SEC_AND_TER);
    let mut rest = &pairs[2..];
    while !rest.is_empty() {
        let primary = match rest {
            [a] => lead | (byte(*a) << 16),
            [a, b, ..] => lead | (byte(*a) << 16) | (byte(*b) << 8),
            [] => unreachable!(),
        };
        out.push(((primary as u64) << 32) | COMMON_SEC_AND_TER);
        rest = &rest[2.min(rest.len())..];
    }
}
