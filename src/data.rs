//! Collation data: the trie plus the side tables its CE32s point into.
//!
//! A tailoring holds only its own mappings; anything it does not override
//! falls back (via the FALLBACK tag) to the `base` table, normally the root.
//! The whole structure round-trips through bincode, except the base link,
//! which is re-attached after deserialization.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::elements::MERGE_SEPARATOR_CP;
use crate::trie::Ce32Trie;
use crate::{CaseFirst, CollationError, Strength};

const STRENGTH_MASK: u32 = 0x7;
const CASE_LEVEL: u32 = 1 << 3;
const CASE_FIRST_SHIFT: u32 = 4;
const CASE_FIRST_MASK: u32 = 0x3 << CASE_FIRST_SHIFT;
const SHIFTED: u32 = 1 << 6;
const BACKWARD_SECONDARY: u32 = 1 << 7;
const NUMERIC: u32 = 1 << 8;
const CHECK_FCD: u32 = 1 << 9;

/// Option word plus the variable cutoff. Copied into each collator, so
/// per-instance changes never touch the shared table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CollationSettings {
    options: u32,
    variable_top: u32,
}

impl Default for CollationSettings {
    fn default() -> Self {
        Self {
            options: Strength::Tertiary as u32,
            variable_top: 0,
        }
    }
}

impl CollationSettings {
    #[must_use]
    pub fn strength(&self) -> Strength {
        match self.options & STRENGTH_MASK {
            0 => Strength::Primary,
            1 => Strength::Secondary,
            3 => Strength::Quaternary,
            4 => Strength::Identical,
            _ => Strength::Tertiary,
        }
    }

    pub fn set_strength(&mut self, strength: Strength) {
        self.options = (self.options & !STRENGTH_MASK) | strength as u32;
    }

    #[must_use]
    pub fn case_level(&self) -> bool {
        self.options & CASE_LEVEL != 0
    }

    pub fn set_case_level(&mut self, on: bool) {
        if on {
            self.options |= CASE_LEVEL;
        } else {
            self.options &= !CASE_LEVEL;
        }
    }

    #[must_use]
    pub fn case_first(&self) -> CaseFirst {
        match (self.options & CASE_FIRST_MASK) >> CASE_FIRST_SHIFT {
            1 => CaseFirst::Lower,
            2 => CaseFirst::Upper,
            _ => CaseFirst::Off,
        }
    }

    pub fn set_case_first(&mut self, case_first: CaseFirst) {
        self.options =
            (self.options & !CASE_FIRST_MASK) | ((case_first as u32) << CASE_FIRST_SHIFT);
    }

    #[must_use]
    pub fn shifted(&self) -> bool {
        self.options & SHIFTED != 0
    }

    pub fn set_shifted(&mut self, on: bool) {
        if on {
            self.options |= SHIFTED;
        } else {
            self.options &= !SHIFTED;
        }
    }

    #[must_use]
    pub fn backward_secondary(&self) -> bool {
        self.options & BACKWARD_SECONDARY != 0
    }

    pub fn set_backward_secondary(&mut self, on: bool) {
        if on {
            self.options |= BACKWARD_SECONDARY;
        } else {
            self.options &= !BACKWARD_SECONDARY;
        }
    }

    #[must_use]
    pub fn numeric(&self) -> bool {
        self.options & NUMERIC != 0
    }

    pub fn set_numeric(&mut self, on: bool) {
        if on {
            self.options |= NUMERIC;
        } else {
            self.options &= !NUMERIC;
        }
    }

    #[must_use]
    pub fn check_fcd(&self) -> bool {
        self.options & CHECK_FCD != 0
    }

    pub fn set_check_fcd(&mut self, on: bool) {
        if on {
            self.options |= CHECK_FCD;
        } else {
            self.options &= !CHECK_FCD;
        }
    }

    #[must_use]
    pub fn variable_top(&self) -> u32 {
        self.variable_top
    }

    pub fn set_variable_top(&mut self, primary: u32) {
        self.variable_top = primary;
    }
}

/// One contraction table: the CE32 for the bare character plus its sorted
/// suffix list (in code points following the character).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractionSet {
    pub default_ce32: u32,
    /// Lowest first code point of any suffix; lets the iterator skip the
    /// whole match when the next character cannot possibly start one.
    pub lowest_first: u32,
    /// Lexicographically sorted by suffix.
    pub suffixes: Vec<(Vec<u32>, u32)>,
}

impl ContractionSet {
    /// Returns (exact-match CE32, whether a longer suffix could still match).
    #[must_use]
    pub fn lookup(&self, candidate: &[u32]) -> (Option<u32>, bool) {
        let idx = self
            .suffixes
            .partition_point(|(s, _)| s.as_slice() < candidate);
        let exact = self
            .suffixes
            .get(idx)
            .filter(|(s, _)| s.as_slice() == candidate)
            .map(|&(_, ce32)| ce32);
        let next = idx + usize::from(exact.is_some());
        let extendable = self
            .suffixes
            .get(next)
            .is_some_and(|(s, _)| s.len() > candidate.len() && s.starts_with(candidate));
        (exact, extendable)
    }
}

/// One prefix table: entries hold the *preceding* context reversed
/// (nearest character first), longest context first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrefixSet {
    pub default_ce32: u32,
    pub prefixes: Vec<(Vec<u32>, u32)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollationData {
    pub trie: Ce32Trie,
    /// CE32 expansion pool (EXPANSION32 payloads index here).
    pub ce32s: Vec<u32>,
    /// 64-bit CE pool (EXPANSION and OFFSET payloads index here).
    pub ces: Vec<u64>,
    pub contractions: Vec<ContractionSet>,
    pub prefixes: Vec<PrefixSet>,
    /// 19 leads + 21 vowels + 27 trails, in that order.
    pub jamo_ce32s: Vec<u32>,
    /// Primary weight (lead byte only significant) for numeric runs;
    /// zero means "inherit from the base".
    pub numeric_primary: u32,
    /// Indexed by primary lead byte.
    pub compressible: Vec<bool>,
    /// Script reordering permutation of primary lead bytes, if any.
    pub reorder_table: Option<Vec<u8>>,
    /// Sorted code points that cannot start a backward iteration safely.
    pub unsafe_backward: Vec<u32>,
    pub settings: CollationSettings,
    #[serde(skip)]
    pub base: Option<Arc<CollationData>>,
}

impl CollationData {
    pub fn ce32_at(&self, index: usize) -> Result<u32, CollationError> {
        self.ce32s
            .get(index)
            .copied()
            .ok_or(CollationError::MalformedTable("ce32 index out of range"))
    }

    pub fn ce_at(&self, index: usize) -> Result<u64, CollationError> {
        self.ces
            .get(index)
            .copied()
            .ok_or(CollationError::MalformedTable("ce index out of range"))
    }

    pub fn contraction_at(&self, index: usize) -> Result<&ContractionSet, CollationError> {
        self.contractions
            .get(index)
            .ok_or(CollationError::MalformedTable("contraction index out of range"))
    }

    pub fn prefix_at(&self, index: usize) -> Result<&PrefixSet, CollationError> {
        self.prefixes
            .get(index)
            .ok_or(CollationError::MalformedTable("prefix index out of range"))
    }

    #[must_use]
    pub fn is_compressible(&self, lead: u8) -> bool {
        self.compressible.get(lead as usize).copied().unwrap_or(false)
    }

    /// Applies the script reordering permutation to a primary weight.
    #[must_use]
    pub fn reorder_primary(&self, p: u32) -> u32 {
        match &self.reorder_table {
            Some(table) => {
                let lead = (p >> 24) as usize;
                let new_lead = table.get(lead).copied().unwrap_or(lead as u8);
                (u32::from(new_lead) << 24) | (p & 0x00FF_FFFF)
            }
            None => p,
        }
    }

    /// Whether backward iteration may start right before `cp`.
    #[must_use]
    pub fn is_unsafe_backward(&self, cp: u32) -> bool {
        if cp == MERGE_SEPARATOR_CP {
            return false;
        }
        if self.unsafe_backward.binary_search(&cp).is_ok() {
            return true;
        }
        self.base
            .as_ref()
            .is_some_and(|base| base.is_unsafe_backward(cp))
    }

    /// Numeric primary, walking the base chain when this table inherits it.
    #[must_use]
    pub fn effective_numeric_primary(&self) -> u32 {
        let mut data = self;
        loop {
            if data.numeric_primary != 0 {
                return data.numeric_primary;
            }
            match &data.base {
                Some(base) => data = base,
                None => return 0,
            }
        }
    }

    pub fn set_base(&mut self, base: Arc<CollationData>) {
        self.base = Some(base);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CollationError> {
        bincode::serialize(self)
            .map_err(|_| CollationError::MalformedTable("serialization failed"))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CollationError> {
        if bytes.is_empty() {
            return Err(CollationError::IllegalArgument("empty collation data"));
        }
        bincode::deserialize(bytes)
            .map_err(|_| CollationError::MalformedTable("undecodable collation data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baked;

    #[test]
    fn settings_round_trip() {
        let mut s = CollationSettings::default();
        assert_eq!(s.strength(), Strength::Tertiary);
        s.set_strength(Strength::Quaternary);
        s.set_case_first(CaseFirst::Upper);
        s.set_shifted(true);
        s.set_numeric(true);
        s.set_variable_top(0x0C00_0000);
        assert_eq!(s.strength(), Strength::Quaternary);
        assert_eq!(s.case_first(), CaseFirst::Upper);
        assert!(s.shifted());
        assert!(s.numeric());
        assert!(!s.case_level());
        assert!(!s.backward_secondary());
        assert_eq!(s.variable_top(), 0x0C00_0000);
        s.set_shifted(false);
        assert!(!s.shifted());
    }

    #[test]
    fn contraction_lookup_prefix_logic() {
        let set = ContractionSet {
            default_ce32: 1,
            lowest_first: 0x68,
            suffixes: vec![
                (vec![0x68], 10),
                (vec![0x68, 0x68], 11),
                (vec![0x77], 12),
            ],
        };
        assert_eq!(set.lookup(&[0x68]), (Some(10), true));
        assert_eq!(set.lookup(&[0x68, 0x68]), (Some(11), false));
        assert_eq!(set.lookup(&[0x68, 0x69]), (None, false));
        assert_eq!(set.lookup(&[0x77]), (Some(12), false));
        assert_eq!(set.lookup(&[0x61]), (None, false));
    }

    #[test]
    fn bincode_round_trip_drops_base() {
        let root = std::sync::Arc::new(baked::root_fragment());
        let mut data = baked::root_fragment();
        data.set_base(std::sync::Arc::clone(&root));
        let bytes = data.to_bytes().unwrap();
        let back = CollationData::from_bytes(&bytes).unwrap();
        assert!(back.base.is_none());
        assert_eq!(back.trie.get(0x61), data.trie.get(0x61));
        assert_eq!(back.ces, data.ces);
    }

    #[test]
    fn rejects_bad_bytes() {
        assert!(matches!(
            CollationData::from_bytes(&[]),
            Err(CollationError::IllegalArgument(_))
        ));
        assert!(matches!(
            CollationData::from_bytes(&[0xFF; 7]),
            Err(CollationError::MalformedTable(_))
        ));
    }

    #[test]
    fn unsafe_backward_consults_base() {
        let root = std::sync::Arc::new(baked::root_fragment());
        let tailoring = baked::tailored_fragment(std::sync::Arc::clone(&root));
        // combining acute is unsafe in the root
        assert!(tailoring.is_unsafe_backward(0x301));
        assert!(!tailoring.is_unsafe_backward(0x7A));
        assert!(!tailoring.is_unsafe_backward(MERGE_SEPARATOR_CP));
    }
}
