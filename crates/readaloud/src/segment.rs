//! Segment boundary analysis over a text buffer.
//!
//! Wraps UAX #29 segmentation and answers "what is the next/previous unit
//! boundary from offset X". All offsets are byte offsets into the buffer;
//! every boundary the segmenter produces falls on a `char` boundary, so
//! slicing a unit out of the buffer is always valid.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Unit granularity used when deriving segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Granularity {
    /// Sentence rules — the default reading unit.
    #[default]
    Sentence,

    /// Word rules — the simpler fallback unit.
    Word,
}

/// Iterator over the unit boundaries of a text buffer.
///
/// Boundary queries are defensive: offsets outside the buffer degrade to
/// "no boundary" instead of panicking, since caller cursor positions may be
/// stale relative to a just-replaced text.
#[derive(Debug, Clone)]
pub struct SegmentIterator {
    granularity: Granularity,
    boundaries: Vec<usize>,
    len: usize,
}

impl SegmentIterator {
    /// Create an iterator with no text loaded.
    #[must_use]
    pub const fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            boundaries: Vec::new(),
            len: 0,
        }
    }

    /// Rebuild the boundary set over `text`.
    ///
    /// An empty text yields an empty boundary set; otherwise the set
    /// contains `0`, the start of every unit, and `text.len()`.
    pub fn set_text(&mut self, text: &str) {
        self.len = text.len();
        self.boundaries.clear();

        if text.is_empty() {
            return;
        }

        self.boundaries.push(0);
        match self.granularity {
            Granularity::Sentence => {
                for (start, _) in text.split_sentence_bound_indices() {
                    self.push_boundary(start);
                }
            }
            Granularity::Word => {
                for (start, _) in text.split_word_bound_indices() {
                    self.push_boundary(start);
                }
            }
        }
        self.push_boundary(text.len());
    }

    fn push_boundary(&mut self, offset: usize) {
        if self.boundaries.last() != Some(&offset) {
            self.boundaries.push(offset);
        }
    }

    /// Whether `offset` falls exactly on a unit boundary.
    ///
    /// Out-of-range offsets are not boundaries.
    #[must_use]
    pub fn is_boundary(&self, offset: usize) -> bool {
        self.boundaries.binary_search(&offset).is_ok()
    }

    /// The first boundary strictly after `offset`, or `None` when `offset`
    /// is at or past the end of the text.
    #[must_use]
    pub fn following(&self, offset: usize) -> Option<usize> {
        if offset >= self.len {
            return None;
        }

        let idx = self.boundaries.partition_point(|&b| b <= offset);
        self.boundaries.get(idx).copied()
    }

    /// The last boundary strictly before `offset`, or `None` when `offset`
    /// is at the start or outside the text.
    #[must_use]
    pub fn preceding(&self, offset: usize) -> Option<usize> {
        if offset == 0 || offset > self.len {
            return None;
        }

        let idx = self.boundaries.partition_point(|&b| b < offset);
        idx.checked_sub(1).map(|i| self.boundaries[i])
    }

    /// Byte length of the text the boundaries were derived from.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no text (or an empty text) is loaded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The granularity the boundaries are derived with.
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }
}
