//! Snapshot stripes.
//!
//! Open snapshots cut the sequence-number space into stripes. A snapshot at
//! `S` observes every sequence number below `S`, so with snapshots
//! `[10, 20]`:
//!
//! ```text
//! seq:   0 ........ 9 | 10 ....... 19 | 20 ........ MAX
//! stripe:     0       |       1       |       2
//! ```
//!
//! Stripe 0 sits below every snapshot: only the newest reader can see it,
//! so it may be collapsed to a single record, its tombstones elided and its
//! sequence numbers zeroed. Every other stripe is pinned by the snapshot that
//! closes it.

use base::{SeqNum, SEQ_NUM_MAX};

/// Finds the first snapshot strictly greater than `seq` and returns its
/// index and value, or `(snapshots.len(), SEQ_NUM_MAX)` when there is none.
///
/// `snapshots` must be sorted ascending.
pub fn snapshot_index(seq: SeqNum, snapshots: &[SeqNum]) -> (usize, SeqNum) {
    let index = snapshots.partition_point(|&s| s <= seq);
    match snapshots.get(index) {
        Some(&ceiling) => (index, ceiling),
        None => (index, SEQ_NUM_MAX),
    }
}

/// The stripe a sequence number falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stripe {
    pub index: usize,
    /// The snapshot that closes the stripe, or `SEQ_NUM_MAX` for the newest.
    pub ceiling: SeqNum,
}

/// A sorted, de-duplicated list of open snapshot sequence numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshots(Vec<SeqNum>);

impl Snapshots {
    pub fn new(mut seqs: Vec<SeqNum>) -> Self {
        seqs.sort_unstable();
        seqs.dedup();
        Self(seqs)
    }

    pub fn classify(&self, seq: SeqNum) -> Stripe {
        let (index, ceiling) = snapshot_index(seq, &self.0);
        Stripe { index, ceiling }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[SeqNum] {
        &self.0
    }
}

impl From<Vec<SeqNum>> for Snapshots {
    fn from(seqs: Vec<SeqNum>) -> Self {
        Self::new(seqs)
    }
}

impl<const N: usize> From<[SeqNum; N]> for Snapshots {
    fn from(seqs: [SeqNum; N]) -> Self {
        Self::new(seqs.to_vec())
    }
}
