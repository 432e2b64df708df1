//! Text cursors feeding the collation iterators.

/// Bidirectional cursor over code points.
///
/// `index` reports (outer position, position within any pending replacement
/// segment) so callers can compare progress across differently buffered
/// sources.
pub trait TextSource {
    fn next(&mut self) -> Option<u32>;
    fn previous(&mut self) -> Option<u32>;
    fn move_forward(&mut self, n: usize);
    fn move_backward(&mut self, n: usize);
    fn index(&self) -> (usize, usize);
}

/// Cursor over already-normalized (or trusted) text.
pub struct PlainSource {
    text: Vec<u32>,
    pos: usize,
}

impl PlainSource {
    #[must_use]
    pub fn new(text: Vec<u32>, start: usize) -> Self {
        Self { text, pos: start }
    }
}

impl TextSource for PlainSource {
    fn next(&mut self) -> Option<u32> {
        let cp = *self.text.get(self.pos)?;
        self.pos += 1;
        Some(cp)
    }

    fn previous(&mut self) -> Option<u32> {
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        Some(self.text[self.pos])
    }

    fn move_forward(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.text.len());
    }

    fn move_backward(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    fn index(&self) -> (usize, usize) {
        (self.pos, 0)
    }
}
