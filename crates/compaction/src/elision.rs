//! When a tombstone can be dropped.
//!
//! A tombstone in the oldest stripe only matters if something below the
//! output level may still hold the keys it deletes. The compaction iterator
//! asks a [`TombstoneElision`] before dropping one.

use std::cmp::Ordering;

use base::Comparer;

/// Decides whether tombstones may be elided from the output.
pub trait TombstoneElision {
    /// Whether a point tombstone for `key` may be dropped. Successive calls
    /// pass keys in ascending order.
    fn elide_tombstone(&mut self, key: &[u8]) -> bool;

    /// Whether a range tombstone over `[start, end)` may be dropped.
    fn elide_range_tombstone(&mut self, start: &[u8], end: &[u8]) -> bool;
}

/// Keeps every tombstone. Used when data may exist below the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElideNothing;

impl TombstoneElision for ElideNothing {
    fn elide_tombstone(&mut self, _key: &[u8]) -> bool {
        false
    }

    fn elide_range_tombstone(&mut self, _start: &[u8], _end: &[u8]) -> bool {
        false
    }
}

/// Drops every tombstone. Correct only for output at the bottom of the tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElideAll;

impl TombstoneElision for ElideAll {
    fn elide_tombstone(&mut self, _key: &[u8]) -> bool {
        true
    }

    fn elide_range_tombstone(&mut self, _start: &[u8], _end: &[u8]) -> bool {
        true
    }
}

/// Wraps another policy and never elides range tombstones.
pub struct KeepRangeTombstones {
    inner: Box<dyn TombstoneElision>,
}

impl KeepRangeTombstones {
    pub fn new(inner: Box<dyn TombstoneElision>) -> Self {
        Self { inner }
    }
}

impl TombstoneElision for KeepRangeTombstones {
    fn elide_tombstone(&mut self, key: &[u8]) -> bool {
        self.inner.elide_tombstone(key)
    }

    fn elide_range_tombstone(&mut self, _start: &[u8], _end: &[u8]) -> bool {
        false
    }
}

/// An inclusive user-key range `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Elides tombstones that overlap none of the key ranges still in use by
/// levels below the output.
///
/// Point queries walk a forward cursor, so they must arrive in ascending key
/// order. Range queries binary-search the whole list.
#[derive(Debug, Clone)]
pub struct InUseKeyRanges {
    cmp: Comparer,
    ranges: Vec<KeyRange>,
    cursor: usize,
    disable_span_elision: bool,
}

impl InUseKeyRanges {
    /// `ranges` must be sorted by start and non-overlapping.
    pub fn new(cmp: Comparer, ranges: Vec<KeyRange>) -> Self {
        debug_assert!(
            ranges
                .windows(2)
                .all(|w| cmp.cmp(&w[0].end, &w[1].start) == Ordering::Less),
            "in-use key ranges must be sorted and disjoint"
        );
        Self {
            cmp,
            ranges,
            cursor: 0,
            disable_span_elision: false,
        }
    }

    /// Never elide range tombstones. Also turns off seqnum zeroing through
    /// [`allows_zero_seqnum`](Self::allows_zero_seqnum).
    pub fn with_span_elision_disabled(mut self, disabled: bool) -> Self {
        self.disable_span_elision = disabled;
        self
    }

    /// Sequence numbers may be zeroed only when nothing below overlaps the
    /// compaction's whole key range.
    pub fn allows_zero_seqnum(&mut self, smallest: &[u8], largest: &[u8]) -> bool {
        self.elide_range_tombstone(smallest, largest)
    }
}

impl TombstoneElision for InUseKeyRanges {
    fn elide_tombstone(&mut self, key: &[u8]) -> bool {
        while let Some(r) = self.ranges.get(self.cursor) {
            if self.cmp.cmp(key, &r.end) != Ordering::Greater {
                return self.cmp.cmp(key, &r.start) == Ordering::Less;
            }
            self.cursor += 1;
        }
        true
    }

    fn elide_range_tombstone(&mut self, start: &[u8], end: &[u8]) -> bool {
        if self.disable_span_elision {
            return false;
        }
        let cmp = self.cmp;
        let lower = self
            .ranges
            .partition_point(|r| cmp.cmp(&r.end, start) == Ordering::Less);
        let upper = self
            .ranges
            .partition_point(|r| cmp.cmp(&r.start, end) != Ordering::Greater);
        lower >= upper
    }
}
