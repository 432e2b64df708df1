//! FCD-checking text source.
//!
//! Text that is already in "fast C or D" form passes through untouched; a
//! span that fails the check (a code point whose lead combining class is
//! lower than the previous trail class) is decomposed and canonically
//! reordered into a replacement segment, and the cursor serves from that
//! segment until it steps past either end.

use crate::normalize::{decompose_cp, decompose_span, lead_ccc, trail_ccc};
use crate::source::TextSource;

const HANGUL_BASE: u32 = 0xAC00;
const HANGUL_END: u32 = 0xD7A3;

/// How many code points a batched forward check may verify per scan.
const BATCH: usize = 32;

#[derive(Clone, Copy, Debug)]
pub enum FcdMode {
    /// Verify FCD span by span; `small_steps` checks one span per scan
    /// instead of batching, for callers that rarely read far ahead.
    CheckFcd { small_steps: bool },
    /// Pass text through but decompose Hangul syllables into Jamos.
    DecompHangul,
}

pub struct FcdSource {
    text: Vec<u32>,
    pos: usize,
    // raw text in [checked_start, checked_limit) may be served directly
    checked_start: usize,
    checked_limit: usize,
    // replacement segment for text[seg_start..seg_limit]
    seg: Vec<u32>,
    seg_pos: usize,
    seg_start: usize,
    seg_limit: usize,
    in_seg: bool,
    mode: FcdMode,
}

impl FcdSource {
    #[must_use]
    pub fn new(text: Vec<u32>, start: usize, mode: FcdMode) -> Self {
        Self {
            text,
            pos: start,
            checked_start: start,
            checked_limit: start,
            seg: Vec::new(),
            seg_pos: 0,
            seg_start: 0,
            seg_limit: 0,
            in_seg: false,
            mode,
        }
    }

    /// True if text[i..j] (one combining sequence) satisfies the FCD test.
    fn span_is_fcd(&self, i: usize, j: usize) -> bool {
        let mut prev_trail = trail_ccc(self.text[i]);
        for k in i + 1..j {
            let lead = lead_ccc(self.text[k]);
            if prev_trail > lead {
                return false;
            }
            prev_trail = trail_ccc(self.text[k]);
        }
        true
    }

    fn enter_seg(&mut self, seg: Vec<u32>, start: usize, limit: usize, from_back: bool) {
        self.seg_pos = if from_back { seg.len() } else { 0 };
        self.seg = seg;
        self.seg_start = start;
        self.seg_limit = limit;
        self.in_seg = true;
    }

    /// Extends the checked window past `pos`, or enters a replacement
    /// segment when the span starting at `pos` is defective.
    fn advance_check(&mut self) {
        match self.mode {
            FcdMode::DecompHangul => {
                let cp = self.text[self.pos];
                if (HANGUL_BASE..=HANGUL_END).contains(&cp) {
                    let mut seg = Vec::with_capacity(3);
                    decompose_cp(cp, &mut seg);
                    self.enter_seg(seg, self.pos, self.pos + 1, false);
                } else {
                    self.checked_limit = self.pos + 1;
                }
            }
            FcdMode::CheckFcd { small_steps } => {
                let start = self.pos;
                let mut i = start;
                while i < self.text.len() {
                    let mut j = i + 1;
                    while j < self.text.len() && lead_ccc(self.text[j]) != 0 {
                        j += 1;
                    }
                    if self.span_is_fcd(i, j) {
                        i = j;
                        self.checked_limit = i;
                        if small_steps || i - start >= BATCH {
                            return;
                        }
                    } else {
                        if i == start {
                            let seg = decompose_span(&self.text[i..j]);
                            self.enter_seg(seg, i, j, false);
                        }
                        // otherwise checked_limit already stops at i
                        return;
                    }
                }
            }
        }
    }

    /// Backward counterpart of `advance_check`; `pos` sits on a boundary.
    fn retreat_check(&mut self) {
        match self.mode {
            FcdMode::DecompHangul => {
                let cp = self.text[self.pos - 1];
                if (HANGUL_BASE..=HANGUL_END).contains(&cp) {
                    let mut seg = Vec::with_capacity(3);
                    decompose_cp(cp, &mut seg);
                    self.enter_seg(seg, self.pos - 1, self.pos, true);
                } else {
                    self.checked_start = self.pos - 1;
                }
            }
            FcdMode::CheckFcd { .. } => {
                let mut i = self.pos - 1;
                while i > 0 && lead_ccc(self.text[i]) != 0 {
                    i -= 1;
                }
                if self.span_is_fcd(i, self.pos) {
                    self.checked_start = i;
                } else {
                    let seg = decompose_span(&self.text[i..self.pos]);
                    self.enter_seg(seg, i, self.pos, true);
                }
            }
        }
    }
}

impl TextSource for FcdSource {
    fn next(&mut self) -> Option<u32> {
        loop {
            if self.in_seg {
                if self.seg_pos < self.seg.len() {
                    let cp = self.seg[self.seg_pos];
                    self.seg_pos += 1;
                    return Some(cp);
                }
                self.in_seg = false;
                self.pos = self.seg_limit;
                // raw windows must not cover the replaced span
                self.checked_start = self.seg_limit;
                self.checked_limit = self.checked_limit.max(self.seg_limit);
            }
            if self.pos < self.checked_limit {
                let cp = self.text[self.pos];
                self.pos += 1;
                return Some(cp);
            }
            if self.pos >= self.text.len() {
                return None;
            }
            self.advance_check();
        }
    }

    fn previous(&mut self) -> Option<u32> {
        loop {
            if self.in_seg {
                if self.seg_pos > 0 {
                    self.seg_pos -= 1;
                    return Some(self.seg[self.seg_pos]);
                }
                self.in_seg = false;
                self.pos = self.seg_start;
                self.checked_limit = self.seg_start;
                self.checked_start = self.checked_start.min(self.seg_start);
            }
            if self.pos > self.checked_start {
                self.pos -= 1;
                return Some(self.text[self.pos]);
            }
            if self.pos == 0 {
                return None;
            }
            self.retreat_check();
        }
    }

    fn move_forward(&mut self, n: usize) {
        for _ in 0..n {
            if self.next().is_none() {
                break;
            }
        }
    }

    fn move_backward(&mut self, n: usize) {
        for _ in 0..n {
            if self.previous().is_none() {
                break;
            }
        }
    }

    fn index(&self) -> (usize, usize) {
        if self.in_seg {
            (self.seg_start, self.seg_pos)
        } else {
            (self.pos, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_forward(s: &mut FcdSource) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(cp) = s.next() {
            out.push(cp);
        }
        out
    }

    fn drain_backward(s: &mut FcdSource) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(cp) = s.previous() {
            out.push(cp);
        }
        out
    }

    #[test]
    fn fcd_text_passes_through() {
        let text = vec![0x61, 0x301, 0x62, 0xE9, 0x63];
        let mut s = FcdSource::new(text.clone(), 0, FcdMode::CheckFcd { small_steps: false });
        assert_eq!(drain_forward(&mut s), text);
    }

    #[test]
    fn defective_span_is_normalized() {
        // acute (230) before dot below (220) violates FCD
        let mut s = FcdSource::new(
            vec![0x61, 0x301, 0x323, 0x62],
            0,
            FcdMode::CheckFcd { small_steps: false },
        );
        assert_eq!(drain_forward(&mut s), vec![0x61, 0x323, 0x301, 0x62]);
    }

    #[test]
    fn precomposed_trail_violation() {
        // ệ-like case: é (trail 230) followed by dot below (lead 220)
        let mut s = FcdSource::new(
            vec![0xE9, 0x323],
            0,
            FcdMode::CheckFcd { small_steps: true },
        );
        assert_eq!(drain_forward(&mut s), vec![0x65, 0x323, 0x301]);
    }

    #[test]
    fn backward_matches_forward() {
        let text = vec![0x61, 0x301, 0x323, 0x62, 0xAC01];
        let mut fwd = FcdSource::new(text.clone(), 0, FcdMode::CheckFcd { small_steps: false });
        let forward = drain_forward(&mut fwd);

        let mut bwd = FcdSource::new(text.clone(), text.len(), FcdMode::CheckFcd { small_steps: false });
        let mut backward = drain_backward(&mut bwd);
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn backtracking_over_a_segment_is_consistent() {
        let mut s = FcdSource::new(
            vec![0x61, 0x301, 0x323],
            0,
            FcdMode::CheckFcd { small_steps: false },
        );
        assert_eq!(s.next(), Some(0x61));
        assert_eq!(s.next(), Some(0x323));
        assert_eq!(s.previous(), Some(0x323));
        assert_eq!(s.next(), Some(0x323));
        assert_eq!(s.next(), Some(0x301));
        assert_eq!(s.next(), None);
        // walking all the way back re-derives the same segment
        assert_eq!(s.previous(), Some(0x301));
        assert_eq!(s.previous(), Some(0x323));
        assert_eq!(s.previous(), Some(0x61));
        assert_eq!(s.previous(), None);
    }

    #[test]
    fn hangul_mode_decomposes_syllables() {
        let mut s = FcdSource::new(vec![0x61, 0xAC01, 0x62], 0, FcdMode::DecompHangul);
        assert_eq!(
            drain_forward(&mut s),
            vec![0x61, 0x1100, 0x1161, 0x11A8, 0x62]
        );
        let mut b = FcdSource::new(vec![0x61, 0xAC01, 0x62], 3, FcdMode::DecompHangul);
        assert_eq!(
            drain_backward(&mut b),
            vec![0x62, 0x11A8, 0x1161, 0x1100, 0x61]
        );
    }
}
