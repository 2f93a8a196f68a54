/// Output runner: drives a full compaction pass into in-memory runs.
///
/// Each run collects the point records, range deletion fragments and range
/// key fragments between two split points, the way an output table would.
/// A frontier watches the split points; once the iterator crosses one, the
/// current run is closed before the next record is added, and fragments
/// are cut at the split point so no run overlaps the next.
///
/// ```text
/// split_points = ["m"]
///
/// a#5,SET  [c-q)#4  k#8,SET | m#7,SET  p#6,SET
/// └──────── run 0 ─────────┘ └──── run 1 ────┘
///   tombstones: [c-m)#4         tombstones: [m-q)#4
/// ```
use std::cell::RefCell;
use std::rc::Rc;

use base::{InternalIterator, InternalKeyKind};
use keyspan::Span;
use tracing::info;

use crate::error::CompactionError;
use crate::iter::{CompactionIter, OwnedKv};

/// One output run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompactionOutput {
    pub points: Vec<OwnedKv>,
    pub tombstones: Vec<Span>,
    pub range_keys: Vec<Span>,
    /// Point records kept only because an open snapshot can see them.
    pub pinned: u64,
}

impl CompactionOutput {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.tombstones.is_empty() && self.range_keys.is_empty()
    }
}

/// Runs `iter` to completion, splitting the output at `split_points`.
///
/// Runs that end up empty are not returned. The iterator is closed before
/// returning, also on error.
///
/// # Errors
///
/// Returns the first error of the pass or of closing the iterator.
pub fn run_compaction<I: InternalIterator>(
    iter: &mut CompactionIter<I>,
    split_points: &[Vec<u8>],
) -> Result<Vec<CompactionOutput>, CompactionError> {
    let result = drive(iter, split_points);
    let closed = iter.close();
    let outputs = result?;
    closed?;
    Ok(outputs)
}

fn drive<I: InternalIterator>(
    iter: &mut CompactionIter<I>,
    split_points: &[Vec<u8>],
) -> Result<Vec<CompactionOutput>, CompactionError> {
    let cmp = iter.comparer();
    let mut splits = split_points.to_vec();
    splits.sort_by(|a, b| cmp.cmp(a, b));
    splits.dedup();

    // Set to the split point the iterator most recently crossed.
    let split_due: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
    let mut remaining = splits.into_iter();
    if let Some(first_split) = remaining.next() {
        let due = Rc::clone(&split_due);
        let mut watched = first_split.clone();
        iter.frontiers_mut().register(Some(first_split), move |_reached| {
            let next = remaining.next();
            let crossed = std::mem::replace(&mut watched, next.clone().unwrap_or_default());
            *due.borrow_mut() = Some(crossed);
            next
        });
    }

    let mut outputs = Vec::new();
    let mut current = CompactionOutput::default();
    // Range records only reach `current` once drained, so track whether the
    // run has seen anything at all.
    let mut run_started = false;
    let mut next = iter.first()?.map(|kv| kv.into_owned());
    while let Some(kv) = next {
        let crossed = split_due.borrow_mut().take();
        if let Some(boundary) = crossed.filter(|_| run_started) {
            current.tombstones.extend(iter.tombstones(Some(boundary.as_slice())));
            current.range_keys.extend(iter.range_keys(Some(boundary.as_slice())));
            finish_output(&mut outputs, std::mem::take(&mut current));
        }
        run_started = true;

        let kind = kv.key.kind();
        if kind != InternalKeyKind::RangeDelete && !kind.is_range_key() {
            if iter.snapshot_pinned() {
                current.pinned += 1;
            }
            current.points.push(kv);
        }
        next = iter.next()?.map(|kv| kv.into_owned());
    }

    current.tombstones.extend(iter.tombstones(None));
    current.range_keys.extend(iter.range_keys(None));
    finish_output(&mut outputs, current);
    Ok(outputs)
}

fn finish_output(outputs: &mut Vec<CompactionOutput>, output: CompactionOutput) {
    if output.is_empty() {
        return;
    }
    info!(
        run = outputs.len(),
        points = output.points.len(),
        tombstones = output.tombstones.len(),
        range_keys = output.range_keys.len(),
        pinned = output.pinned,
        "compaction output finished"
    );
    outputs.push(output);
}
