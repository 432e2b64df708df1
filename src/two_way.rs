//! Backward CE iteration without a backward tag-dispatch engine.
//!
//! Stepping back over a character that is safe backward resolves it directly
//! (prefix context still works; nothing after it can matter). An unsafe
//! character means some multi-character mapping may span it, so the cursor
//! retreats to the nearest safe character and replays forward from there,
//! buffering whole CE groups and serving them back to front.

use crate::data::CollationData;
use crate::elements::NO_CE;
use crate::iter::{is_numeric_digit, CeSource, CollationIterator};
use crate::source::TextSource;
use crate::CollationError;

pub struct TwoWayCollationIterator<'a, S: TextSource> {
    forward: CollationIterator<'a, S>,
    backward: Vec<u64>,
    numeric: bool,
}

impl<'a, S: TextSource> TwoWayCollationIterator<'a, S> {
    #[must_use]
    pub fn new(data: &'a CollationData, source: S, numeric: bool) -> Self {
        Self {
            forward: CollationIterator::new(data, source, numeric),
            backward: Vec::new(),
            numeric,
        }
    }

    pub fn next_ce(&mut self) -> Result<u64, CollationError> {
        self.forward.next_ce()
    }

    // digits join under numeric mode, so a run must be replayed whole
    fn unsafe_to_resolve(&self, c: u32) -> bool {
        self.forward.data().is_unsafe_backward(c)
            || (self.numeric && is_numeric_digit(self.forward.data(), c))
    }

    pub fn previous_ce(&mut self) -> Result<u64, CollationError> {
        if let Some(ce) = self.backward.pop() {
            return Ok(ce);
        }
        let target = self.forward.source_mut().index();
        let Some(c) = self.forward.source_mut().previous() else {
            return Ok(NO_CE);
        };
        if !self.unsafe_to_resolve(c) {
            let mut group = self.forward.ces_for_code_point_backward(c)?;
            let last = group
                .pop()
                .ok_or(CollationError::MalformedTable("character expanded to no CEs"))?;
            self.backward = group;
            return Ok(last);
        }

        // retreat until the character just stepped over is safe to start at
        loop {
            let Some(pc) = self.forward.source_mut().previous() else {
                break;
            };
            if !self.unsafe_to_resolve(pc) {
                break;
            }
        }
        let safe = self.forward.source_mut().index();
        let mut buffered = Vec::new();
        while self.forward.source_mut().index() < target {
            match self.forward.next_ce_group()? {
                Some(group) => buffered.extend(group),
                None => break,
            }
        }
        // the replay consumed up to `target`; step back to the safe point so
        // the next call continues with the text before the replayed region
        while self.forward.source_mut().index() > safe {
            if self.forward.source_mut().previous().is_none() {
                break;
            }
        }
        self.backward = buffered;
        match self.backward.pop() {
            Some(ce) => Ok(ce),
            None => Err(CollationError::MalformedTable(
                "backward replay produced no CEs",
            )),
        }
    }
}
