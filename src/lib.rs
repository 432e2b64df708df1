//! A Unicode collation engine: table-driven string comparison and sort key
//! generation with tailoring support.
//!
//! The runtime model follows the usual two-tier encoding. Every code point
//! maps through a trie to a 32-bit CE32, which either converts directly to a
//! 64-bit collation element or carries a tag pointing at side tables
//! (expansions, contractions, prefixes, digits, Hangul, offset ranges). A
//! tailoring holds only its own mappings and falls back to a base table for
//! the rest.
//!
//! Entry points: [`Collator`] for comparisons against a specific table, the
//! [`compare`] / [`sort_key`] functions for the shared root, and
//! [`CollationRoot`] to install or tear down that shared table.

use std::cmp::Ordering;

use thiserror::Error;

pub mod baked;
mod collator;
pub mod data;
pub mod elements;
pub mod fcd;
pub mod iter;
pub mod keys;
mod normalize;
mod root;
pub mod source;
pub mod trie;
pub mod two_way;

pub use collator::{Ces, Collator};
pub use root::CollationRoot;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CollationError {
    #[error("illegal argument: {0}")]
    IllegalArgument(&'static str),
    #[error("malformed collation data: {0}")]
    MalformedTable(&'static str),
    #[error("memory allocation failed")]
    Memory,
}

/// How many levels participate in a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Primary = 0,
    Secondary = 1,
    Tertiary = 2,
    Quaternary = 3,
    Identical = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseFirst {
    Off = 0,
    Lower = 1,
    Upper = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlternateHandling {
    /// Variable characters (punctuation, by default) weigh in normally.
    NonIgnorable,
    /// Variable characters shift to the quaternary level.
    Shifted,
}

/// Compares two strings with the shared root table and its settings.
pub fn compare(a: &str, b: &str) -> Result<Ordering, CollationError> {
    Collator::root()?.compare(a, b)
}

/// Sort key for `s` under the shared root table.
pub fn sort_key(s: &str) -> Result<Vec<u8>, CollationError> {
    Collator::root()?.sort_key(s)
}
