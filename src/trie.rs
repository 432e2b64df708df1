//! Compact two-stage codepoint→CE32 trie.
//!
//! The index array maps 32-codepoint blocks to positions in a deduplicated
//! data array; codepoints at or above `high_start` resolve to the default
//! CE32 without touching either array. The builder is loader-side glue: the
//! runtime engine only ever calls [`Ce32Trie::get`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const BLOCK_SHIFT: u32 = 5;
const BLOCK_SIZE: usize = 1 << BLOCK_SHIFT;
const BLOCK_MASK: u32 = (BLOCK_SIZE as u32) - 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ce32Trie {
    index: Vec<u16>,
    data: Vec<u32>,
    high_start: u32,
    default_ce32: u32,
}

impl Ce32Trie {
    /// Never fails; codepoints outside the table get the default CE32.
    #[must_use]
    pub fn get(&self, cp: u32) -> u32 {
        if cp >= self.high_start {
            return self.default_ce32;
        }
        let block = self.index[(cp >> BLOCK_SHIFT) as usize] as usize;
        self.data[(block << BLOCK_SHIFT) | (cp & BLOCK_MASK) as usize]
    }

    #[must_use]
    pub fn default_ce32(&self) -> u32 {
        self.default_ce32
    }
}

pub struct Ce32TrieBuilder {
    values: HashMap<u32, u32>,
    ranges: Vec<(u32, u32, u32)>,
    default_ce32: u32,
}

impl Ce32TrieBuilder {
    #[must_use]
    pub fn new(default_ce32: u32) -> Self {
        Self {
            values: HashMap::new(),
            ranges: Vec::new(),
            default_ce32,
        }
    }

    pub fn set(&mut self, cp: u32, ce32: u32) {
        self.values.insert(cp, ce32);
    }

    /// Inclusive on both ends. Later `set` calls win over ranges.
    pub fn set_range(&mut self, start: u32, end: u32, ce32: u32) {
        self.ranges.push((start, end, ce32));
    }

    fn value_at(&self, cp: u32) -> u32 {
        if let Some(&v) = self.values.get(&cp) {
            return v;
        }
        for &(start, end, v) in &self.ranges {
            if (start..=end).contains(&cp) {
                return v;
            }
        }
        self.default_ce32
    }

    #[must_use]
    pub fn build(self) -> Ce32Trie {
        let max_cp = self
            .values
            .keys()
            .copied()
            .chain(self.ranges.iter().map(|&(_, end, _)| end))
            .max()
            .unwrap_or(0);
        let high_start = (max_cp + 1 + BLOCK_MASK) & !BLOCK_MASK;

        let mut index = Vec::with_capacity((high_start as usize) >> BLOCK_SHIFT);
        let mut data: Vec<u32> = Vec::new();
        let mut seen: HashMap<Vec<u32>, u16> = HashMap::new();

        let mut start = 0;
        while start < high_start {
            let block: Vec<u32> = (start..start + BLOCK_SIZE as u32)
                .map(|cp| self.value_at(cp))
                .collect();
            let position = *seen.entry(block.clone()).or_insert_with(|| {
                let pos = (data.len() >> BLOCK_SHIFT) as u16;
                data.extend_from_slice(&block);
                pos
            });
            index.push(position);
            start += BLOCK_SIZE as u32;
        }

        Ce32Trie {
            index,
            data,
            high_start,
            default_ce32: self.default_ce32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_default() {
        let mut b = Ce32TrieBuilder::new(0xDEAD);
        b.set(0x61, 1);
        b.set(0x62, 2);
        b.set_range(0xAC00, 0xD7A3, 3);
        let trie = b.build();

        assert_eq!(trie.get(0x61), 1);
        assert_eq!(trie.get(0x62), 2);
        assert_eq!(trie.get(0x63), 0xDEAD);
        assert_eq!(trie.get(0xAC00), 3);
        assert_eq!(trie.get(0xD7A3), 3);
        assert_eq!(trie.get(0xD7A4), 0xDEAD);
        // far beyond high_start
        assert_eq!(trie.get(0x10FFFF), 0xDEAD);
    }

    #[test]
    fn set_overrides_range() {
        let mut b = Ce32TrieBuilder::new(0);
        b.set_range(0x100, 0x1FF, 7);
        b.set(0x180, 9);
        let trie = b.build();
        assert_eq!(trie.get(0x17F), 7);
        assert_eq!(trie.get(0x180), 9);
    }

    #[test]
    fn identical_blocks_are_shared() {
        let mut b = Ce32TrieBuilder::new(0);
        b.set_range(0x1000, 0x2FFF, 5);
        let trie = b.build();
        // all-5 blocks and all-default blocks each deduplicate to one block
        assert!(trie.data.len() <= 3 * BLOCK_SIZE);
    }
}
