//! # Keyspan - range tombstones and range keys as spans
//!
//! Range deletions and range keys cover `[start, end)` intervals of the user
//! key space. Before they can be written (or used to decide whether a point
//! key is deleted) overlapping intervals are cut into non-overlapping
//! **fragments**, each carrying every original record that covers it:
//!
//! ```text
//! input          fragments
//!
//! #2:     c-------g          #2:     c---e---g
//! #1: a-------e              #1: a---c---e
//! ```
//!
//! The compaction iterator talks to a fragmenter through the [`Fragmenter`]
//! trait. The protocol is explicitly two-phase: `add` hands over a span and
//! returns the fragments that became final as a result; nothing calls back
//! into the caller.

mod fragmenter;

pub use fragmenter::SpanFragmenter;

use std::fmt;

use base::{trailer_kind_byte, trailer_seq_num, InternalKeyKind, InternalKeyRef, SeqNum};

/// One record inside a span: its trailer plus range-key payload.
#[derive(Clone, PartialEq, Eq)]
pub struct SpanKey {
    pub trailer: u64,
    /// Range-key suffix. Empty for range deletions.
    pub suffix: Vec<u8>,
    /// Range-key value. Empty for range deletions.
    pub value: Vec<u8>,
}

impl SpanKey {
    pub fn new(trailer: u64) -> Self {
        Self {
            trailer,
            suffix: Vec::new(),
            value: Vec::new(),
        }
    }

    pub fn with_payload(trailer: u64, suffix: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            trailer,
            suffix,
            value,
        }
    }

    #[inline]
    pub fn seq_num(&self) -> SeqNum {
        trailer_seq_num(self.trailer)
    }

    #[inline]
    pub fn kind(&self) -> InternalKeyKind {
        InternalKeyKind::from_u8(trailer_kind_byte(self.trailer))
    }

    /// Whether a reader at `snapshot` sees this record.
    #[inline]
    pub fn visible_at(&self, snapshot: SeqNum) -> bool {
        self.seq_num() < snapshot
    }
}

impl fmt::Debug for SpanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{},{}", self.seq_num(), self.kind())?;
        if !self.suffix.is_empty() || !self.value.is_empty() {
            write!(
                f,
                "({}:{})",
                String::from_utf8_lossy(&self.suffix),
                String::from_utf8_lossy(&self.value)
            )?;
        }
        Ok(())
    }
}

/// A `[start, end)` interval and the records covering it, sorted by trailer
/// descending (newest first).
#[derive(Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    pub keys: Vec<SpanKey>,
}

impl Span {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>, keys: Vec<SpanKey>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sorts `keys` newest first.
    pub fn sort_keys(&mut self) {
        self.keys.sort_by(|a, b| b.trailer.cmp(&a.trailer));
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:{:?}",
            String::from_utf8_lossy(&self.start),
            String::from_utf8_lossy(&self.end),
            self.keys
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How pending range deletions relate to a point key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// No pending tombstone deletes the key.
    None,
    /// A tombstone in the key's own snapshot stripe deletes it.
    Visibly,
    /// A newer tombstone deletes it, but an open snapshot still sees the key.
    Invisibly,
}

/// Cuts ordered spans into non-overlapping fragments.
///
/// Spans must be added in ascending `start` order. All fragments that end at
/// or before the start of the newest added span are final and returned by
/// `add`.
pub trait Fragmenter {
    /// Adds a span. Empty intervals (`start >= end`) are ignored.
    ///
    /// # Panics
    ///
    /// Implementations panic if `span.start` precedes a previously added
    /// start, or after [`Fragmenter::finish`].
    fn add(&mut self, span: Span) -> Vec<Span>;

    /// Reports whether a pending span deletes `key`, given the ceiling of
    /// the key's snapshot stripe. A span never deletes a key with an equal
    /// or greater sequence number.
    fn covers(&self, key: InternalKeyRef<'_>, snapshot: SeqNum) -> Coverage;

    /// Emits every fragment before `key`, truncating pending spans at `key`.
    fn truncate_and_flush_to(&mut self, key: &[u8]) -> Vec<Span>;

    /// Emits everything pending. No further spans may be added.
    fn finish(&mut self) -> Vec<Span>;

    /// Start key shared by all pending spans.
    fn start(&self) -> Option<&[u8]>;

    fn is_empty(&self) -> bool;
}

#[cfg(test)]
mod tests;
