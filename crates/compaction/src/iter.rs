//! The collapsing core.
//!
//! [`CompactionIter`] reads one ordered stream of internal keys and yields
//! the smallest set of records that keeps every open snapshot's view intact.
//!
//! ## Stripes and skipping
//!
//! Within one user key, records are grouped by snapshot stripe. Only the
//! newest record of a stripe can be observed, so once it has been returned
//! the rest of the stripe is dead and is skipped:
//!
//! ```text
//! snapshots = [8]
//!
//! a#9,SET   ── stripe 1 ──►  returned
//! a#7,SET   ── stripe 0 ──►  returned (pinned: only kept for the snapshot)
//! a#3,SET   ── stripe 0 ──►  skipped
//! ```
//!
//! Range deletions and range keys are never skipped. They are returned to
//! the caller, fed to their fragmenter, and come back out, cut into
//! non-overlapping fragments, through [`CompactionIter::tombstones`] and
//! [`CompactionIter::range_keys`].
//!
//! ## Cursor
//!
//! The upstream record is copied into reusable buffers on every step, so the
//! iterator never holds a borrow of its input. [`Position`] records whether
//! that copy is the record last returned or already the next candidate.

use std::sync::Arc;

use base::rangekey::decode_range_key_value;
use base::varint::decode_uvarint;
use base::{
    Comparer, InternalIterator, InternalKey, InternalKeyKind, InternalKv, Merger, ValueCloser,
    ValueMerger, ZERO_SEQNUM_MAX_TRAILER,
};
use config::{CompactionConfig, FormatMajorVersion};
use keyspan::{Coverage, Fragmenter, Span, SpanFragmenter, SpanKey};
use tracing::{debug, trace, warn};

use crate::elision::{ElideNothing, KeepRangeTombstones, TombstoneElision};
use crate::error::CompactionError;
use crate::frontier::Frontiers;
use crate::snapshot::{Snapshots, Stripe};

/// Everything a [`CompactionIter`] needs besides its input.
pub struct CompactionIterOptions {
    pub comparer: Comparer,
    pub merger: Arc<dyn Merger>,
    pub snapshots: Snapshots,
    /// Zero sequence numbers of records in the oldest stripe.
    pub allow_zero_seqnum: bool,
    pub format_version: FormatMajorVersion,
    pub elision: Box<dyn TombstoneElision>,
}

impl CompactionIterOptions {
    /// Bytewise order, no snapshots, newest format, tombstones always kept.
    pub fn new(merger: Arc<dyn Merger>) -> Self {
        Self {
            comparer: Comparer::default(),
            merger,
            snapshots: Snapshots::default(),
            allow_zero_seqnum: false,
            format_version: FormatMajorVersion::NEWEST,
            elision: Box::new(ElideNothing),
        }
    }

    /// Builds options from loaded settings. Disabling span elision also
    /// disables sequence number zeroing.
    pub fn from_config(
        cfg: &CompactionConfig,
        snapshots: Snapshots,
        merger: Arc<dyn Merger>,
        elision: Box<dyn TombstoneElision>,
    ) -> Self {
        let elision: Box<dyn TombstoneElision> = if cfg.disable_span_elision {
            Box::new(KeepRangeTombstones::new(elision))
        } else {
            elision
        };
        Self {
            comparer: Comparer::default(),
            merger,
            snapshots,
            allow_zero_seqnum: cfg.allow_zero_seqnum && !cfg.disable_span_elision,
            format_version: cfg.format_version,
            elision,
        }
    }
}

/// A record returned by [`CompactionIter`], borrowed until the next call.
#[derive(Debug, Clone, Copy)]
pub struct CompactionKv<'a> {
    pub key: &'a InternalKey,
    pub value: &'a [u8],
}

impl CompactionKv<'_> {
    pub fn into_owned(self) -> OwnedKv {
        OwnedKv {
            key: self.key.clone(),
            value: self.value.to_vec(),
        }
    }
}

/// An owned copy of a [`CompactionKv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedKv {
    pub key: InternalKey,
    pub value: Vec<u8>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactionIterStats {
    /// DELSIZED tombstones whose recorded size did not match what they
    /// deleted.
    pub count_missized_dels: u64,
}

/// How the upstream position moved relative to the saved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StripeChange {
    NewStripeNewKey,
    NewStripeSameKey,
    SameStripeSkippable,
    /// A range deletion, range key or invalid record in the same stripe.
    SameStripeNonSkippable,
}

/// Where the upstream copy sits at the top of `next`.
///
/// `skip` asks for the rest of the current stripe to be skipped once the
/// iterator moves off the returned record. It is carried across calls: a
/// range deletion returned in the middle of a stripe leaves it set so the
/// point keys after it are still dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// The copy is the record last returned.
    AtReturned { skip: bool },
    /// The copy is already the next candidate.
    Ahead { skip: bool },
}

impl Position {
    fn skip(self) -> bool {
        match self {
            Position::AtReturned { skip } | Position::Ahead { skip } => skip,
        }
    }

    fn set_skip(&mut self, value: bool) {
        match self {
            Position::AtReturned { skip } | Position::Ahead { skip } => *skip = value,
        }
    }

    fn park_ahead(&mut self) {
        *self = Position::Ahead { skip: self.skip() };
    }

    fn park_at_returned(&mut self) {
        *self = Position::AtReturned { skip: self.skip() };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanTarget {
    RangeDel,
    RangeKey,
}

/// Collapses a stream of internal keys for compaction output.
pub struct CompactionIter<I: InternalIterator> {
    cmp: Comparer,
    merger: Arc<dyn Merger>,
    iter: I,
    snapshots: Snapshots,
    allow_zero_seqnum: bool,
    format_version: FormatMajorVersion,
    elision: Box<dyn TombstoneElision>,

    // Copy of the upstream record. `iter_value` is stale after it has been
    // handed to `value` and until the next upstream step.
    iter_key: InternalKey,
    iter_value: Vec<u8>,
    iter_valid: bool,
    iter_stripe_change: StripeChange,

    // The record returned to the caller, and the original trailer of
    // `key` before any kind change or seqnum zeroing.
    key: InternalKey,
    key_trailer: u64,
    value: Vec<u8>,
    value_closer: Option<Box<dyn ValueCloser>>,
    valid: bool,
    pos: Position,
    snapshot_pinned: bool,
    force_obsolete_due_to_range_del: bool,
    cur_stripe: Stripe,
    err: Option<CompactionError>,
    closed: bool,

    frontiers: Frontiers,
    range_del_frag: Box<dyn Fragmenter>,
    range_key_frag: Box<dyn Fragmenter>,
    // A span returned by the last call, fed to its fragmenter before the
    // iterator moves on.
    pending_span: Option<(SpanTarget, Span)>,
    tombstones: Vec<Span>,
    range_keys: Vec<Span>,
    stats: CompactionIterStats,
}

impl<I: InternalIterator> CompactionIter<I> {
    pub fn new(upstream: I, opts: CompactionIterOptions) -> Self {
        let cmp = opts.comparer;
        Self::with_fragmenters(
            upstream,
            opts,
            Box::new(SpanFragmenter::new(cmp)),
            Box::new(SpanFragmenter::new(cmp)),
        )
    }

    /// Like [`new`](Self::new) with caller-supplied fragmenters.
    pub fn with_fragmenters(
        upstream: I,
        opts: CompactionIterOptions,
        range_del_frag: Box<dyn Fragmenter>,
        range_key_frag: Box<dyn Fragmenter>,
    ) -> Self {
        Self {
            cmp: opts.comparer,
            merger: opts.merger,
            iter: upstream,
            snapshots: opts.snapshots,
            allow_zero_seqnum: opts.allow_zero_seqnum,
            format_version: opts.format_version,
            elision: opts.elision,
            iter_key: InternalKey::default(),
            iter_value: Vec::new(),
            iter_valid: false,
            iter_stripe_change: StripeChange::NewStripeNewKey,
            key: InternalKey::default(),
            key_trailer: 0,
            value: Vec::new(),
            value_closer: None,
            valid: false,
            pos: Position::Ahead { skip: false },
            snapshot_pinned: false,
            force_obsolete_due_to_range_del: false,
            cur_stripe: Stripe {
                index: 0,
                ceiling: base::SEQ_NUM_MAX,
            },
            err: None,
            closed: false,
            frontiers: Frontiers::new(opts.comparer),
            range_del_frag,
            range_key_frag,
            pending_span: None,
            tombstones: Vec::new(),
            range_keys: Vec::new(),
            stats: CompactionIterStats::default(),
        }
    }

    /// Positions on the first output record.
    pub fn first(&mut self) -> Result<Option<CompactionKv<'_>>, CompactionError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        debug!(
            snapshots = self.snapshots.len(),
            allow_zero_seqnum = self.allow_zero_seqnum,
            format = %self.format_version,
            "compaction pass starting"
        );
        let kv = self.iter.first();
        let loaded = load_upstream(kv, &mut self.iter_key, &mut self.iter_value);
        if self.finish_step(loaded) {
            self.cur_stripe = self.snapshots.classify(self.iter_key.seq_num());
        }
        self.pos.park_ahead();
        self.iter_stripe_change = StripeChange::NewStripeNewKey;
        self.next()
    }

    /// Advances to the next output record. `Ok(None)` at the end of input.
    ///
    /// # Errors
    ///
    /// Returns the first error hit by the pass, on this and every later call.
    pub fn next(&mut self) -> Result<Option<CompactionKv<'_>>, CompactionError> {
        self.step();
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        Ok(self.valid.then_some(CompactionKv {
            key: &self.key,
            value: &self.value,
        }))
    }

    pub fn key(&self) -> &InternalKey {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn error(&self) -> Option<&CompactionError> {
        self.err.as_ref()
    }

    /// Whether the last point record was kept only because an open snapshot
    /// can see it.
    pub fn snapshot_pinned(&self) -> bool {
        self.snapshot_pinned
    }

    /// Whether the last point record is deleted by a range deletion that an
    /// open snapshot cannot see yet.
    pub fn force_obsolete_due_to_range_del(&self) -> bool {
        self.force_obsolete_due_to_range_del
    }

    pub fn frontiers_mut(&mut self) -> &mut Frontiers {
        &mut self.frontiers
    }

    pub fn comparer(&self) -> Comparer {
        self.cmp
    }

    pub fn stats(&self) -> CompactionIterStats {
        self.stats
    }

    /// Drains range deletion fragments that end at or before `boundary`, or
    /// all of them when `boundary` is `None`. After a `None` drain no more
    /// records may be read.
    pub fn tombstones(&mut self, boundary: Option<&[u8]>) -> Vec<Span> {
        self.flush_pending_span_before(SpanTarget::RangeDel, boundary);
        let fragments = match boundary {
            None => self.range_del_frag.finish(),
            Some(key) => self.range_del_frag.truncate_and_flush_to(key),
        };
        for fragment in fragments {
            self.emit_range_del_chunk(fragment);
        }
        std::mem::take(&mut self.tombstones)
    }

    /// Drains range key fragments, like [`tombstones`](Self::tombstones).
    pub fn range_keys(&mut self, boundary: Option<&[u8]>) -> Vec<Span> {
        self.flush_pending_span_before(SpanTarget::RangeKey, boundary);
        let fragments = match boundary {
            None => self.range_key_frag.finish(),
            Some(key) => self.range_key_frag.truncate_and_flush_to(key),
        };
        self.emit_range_key_chunks(fragments);
        std::mem::take(&mut self.range_keys)
    }

    /// Releases the upstream iterator and any open value closer. Safe to
    /// call more than once.
    ///
    /// # Errors
    ///
    /// Returns the pass error if there was one, else the first release
    /// failure.
    pub fn close(&mut self) -> Result<(), CompactionError> {
        if !self.closed {
            self.closed = true;
            self.valid = false;
            if let Err(e) = self.iter.close() {
                self.err.get_or_insert(CompactionError::Input(Arc::new(e)));
            }
            if let Some(closer) = self.value_closer.take() {
                if let Err(e) = closer.close() {
                    self.err
                        .get_or_insert(CompactionError::ValueCloser(Arc::new(e)));
                }
            }
            debug!(
                missized_dels = self.stats.count_missized_dels,
                failed = self.err.is_some(),
                "compaction iterator closed"
            );
        }
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn step(&mut self) {
        if self.err.is_some() || !self.close_value_closer() {
            return;
        }
        self.flush_pending_span();

        if let Position::AtReturned { skip } = self.pos {
            if skip {
                self.skip_in_stripe();
            } else {
                self.next_in_stripe();
            }
        }
        self.pos.park_at_returned();
        self.valid = false;

        while self.iter_valid && self.err.is_none() {
            // A new stripe of the same key is only returned because a
            // snapshot prevents collapsing it into the previous one.
            self.snapshot_pinned = self.iter_stripe_change == StripeChange::NewStripeSameKey;

            let kind = self.iter_key.kind();
            if kind == InternalKeyKind::RangeDelete || kind.is_range_key() {
                // Returned without setting `skip`: a point key with the same
                // user key and seqnum may follow and is not deleted by it.
                self.save_key();
                self.snapshot_pinned = false;
                if let Err(e) = self.queue_span() {
                    self.fail(e);
                    return;
                }
                self.take_iter_value();
                self.valid = true;
                return;
            }

            match self
                .range_del_frag
                .covers(self.iter_key.as_ref(), self.cur_stripe.ceiling)
            {
                Coverage::Visibly => {
                    trace!(key = %self.iter_key, "point key deleted by range tombstone");
                    self.save_key();
                    self.skip_in_stripe();
                    continue;
                }
                Coverage::Invisibly => {
                    self.snapshot_pinned = true;
                    self.force_obsolete_due_to_range_del = true;
                }
                Coverage::None => self.force_obsolete_due_to_range_del = false,
            }

            match kind {
                InternalKeyKind::Delete
                | InternalKeyKind::SingleDelete
                | InternalKeyKind::DeleteSized => {
                    if self.elision.elide_tombstone(&self.iter_key.user_key) {
                        if self.cur_stripe.index == 0 {
                            trace!(key = %self.iter_key, "eliding tombstone");
                            self.save_key();
                            self.skip_in_stripe();
                            continue;
                        }
                        self.snapshot_pinned = true;
                    }
                    match kind {
                        InternalKeyKind::Delete => {
                            self.save_key();
                            self.take_iter_value();
                            self.valid = true;
                            self.pos.set_skip(true);
                            return;
                        }
                        InternalKeyKind::DeleteSized => {
                            self.delete_sized_next();
                            return;
                        }
                        _ => {
                            if self.single_delete_next() {
                                return;
                            }
                            continue;
                        }
                    }
                }

                InternalKeyKind::Set | InternalKeyKind::SetWithDelete => {
                    self.set_next();
                    return;
                }

                InternalKeyKind::Merge => {
                    // merge_next moves the stripe; zeroing uses the original.
                    let orig_stripe = self.cur_stripe.index;
                    let mut merger = match self.merger.merge(&self.iter_key.user_key, &self.iter_value)
                    {
                        Ok(m) => m,
                        Err(e) => {
                            let key = self.iter_key.to_string();
                            self.fail(CompactionError::merge(key, e));
                            return;
                        }
                    };
                    let change = self.merge_next(merger.as_mut());
                    if self.err.is_some() {
                        return;
                    }
                    let includes_base = self.key.kind() == InternalKeyKind::Set;
                    let merged = match merger.finish(includes_base) {
                        Ok(merged) => merged,
                        Err(e) => {
                            let key = self.key.to_string();
                            self.fail(CompactionError::merge(key, e));
                            return;
                        }
                    };
                    self.value = merged.value;
                    self.value_closer = merged.closer;
                    if merged.delete {
                        self.valid = false;
                        if !self.close_value_closer() {
                            return;
                        }
                        // The fold stopped on a base or tombstone it consumed;
                        // neither may outlive the deleted result.
                        if change == StripeChange::SameStripeSkippable {
                            self.skip_in_stripe();
                        }
                        continue;
                    }
                    // A RANGEDEL that interrupted the chain does not delete
                    // the operands after it, which form their own result
                    // with the same zeroed seqnum if this one were zeroed.
                    if change != StripeChange::SameStripeNonSkippable {
                        self.maybe_zero_seqnum(orig_stripe);
                    }
                    return;
                }

                _ => {
                    self.fail(CompactionError::InvalidKind(self.iter_key.kind_byte()));
                    return;
                }
            }
        }
    }

    fn set_next(&mut self) {
        self.save_key();
        self.take_iter_value();
        self.valid = true;
        self.maybe_zero_seqnum(self.cur_stripe.index);

        if !self.format_version.supports_set_with_delete()
            || self.iter_key.kind() == InternalKeyKind::SetWithDelete
        {
            self.pos.set_skip(true);
            return;
        }

        // Look for a tombstone under the SET in this stripe.
        loop {
            match self.next_in_stripe() {
                StripeChange::NewStripeNewKey | StripeChange::NewStripeSameKey => {
                    self.pos.park_ahead();
                    return;
                }
                StripeChange::SameStripeNonSkippable => {
                    // A tombstone may still hide behind the range deletion.
                    self.pos = Position::Ahead { skip: true };
                    self.key.set_kind(InternalKeyKind::SetWithDelete);
                    return;
                }
                StripeChange::SameStripeSkippable => {
                    if self.iter_key.kind().is_point_tombstone() {
                        self.key.set_kind(InternalKeyKind::SetWithDelete);
                        self.pos.set_skip(true);
                        return;
                    }
                }
            }
        }
    }

    fn merge_next(&mut self, merger: &mut dyn ValueMerger) -> StripeChange {
        self.save_key();
        self.valid = true;

        loop {
            if self.next_in_stripe() != StripeChange::SameStripeSkippable {
                self.pos.park_ahead();
                return self.iter_stripe_change;
            }
            match self.iter_key.kind() {
                // MERGE + tombstone becomes a SET shadowing everything older.
                InternalKeyKind::Delete
                | InternalKeyKind::SingleDelete
                | InternalKeyKind::DeleteSized => {
                    self.key.set_kind(InternalKeyKind::Set);
                    self.pos.set_skip(true);
                    return StripeChange::SameStripeSkippable;
                }
                InternalKeyKind::Set | InternalKeyKind::SetWithDelete => {
                    if self.covered_visibly() {
                        self.key.set_kind(InternalKeyKind::Set);
                        self.pos.set_skip(true);
                        return StripeChange::SameStripeSkippable;
                    }
                    if let Err(e) = merger.merge_older(&self.iter_value) {
                        let key = self.key.to_string();
                        self.fail(CompactionError::merge(key, e));
                        return StripeChange::SameStripeSkippable;
                    }
                    self.key.set_kind(InternalKeyKind::Set);
                    self.pos.set_skip(true);
                    return StripeChange::SameStripeSkippable;
                }
                InternalKeyKind::Merge => {
                    if self.covered_visibly() {
                        self.key.set_kind(InternalKeyKind::Set);
                        self.pos.set_skip(true);
                        return StripeChange::SameStripeSkippable;
                    }
                    if let Err(e) = merger.merge_older(&self.iter_value) {
                        let key = self.key.to_string();
                        self.fail(CompactionError::merge(key, e));
                        return StripeChange::SameStripeSkippable;
                    }
                }
                _ => {
                    self.fail(CompactionError::InvalidKind(self.iter_key.kind_byte()));
                    return StripeChange::SameStripeSkippable;
                }
            }
        }
    }

    /// Returns `false` when the SINGLEDEL and the SET under it cancel out.
    fn single_delete_next(&mut self) -> bool {
        self.save_key();
        self.take_iter_value();
        self.valid = true;

        loop {
            if self.next_in_stripe() != StripeChange::SameStripeSkippable {
                self.pos.park_ahead();
                return true;
            }
            match self.iter_key.kind() {
                InternalKeyKind::Delete
                | InternalKeyKind::Merge
                | InternalKeyKind::SetWithDelete
                | InternalKeyKind::DeleteSized => {
                    self.key.set_kind(InternalKeyKind::Delete);
                    self.pos.set_skip(true);
                    return true;
                }
                InternalKeyKind::Set => {
                    self.next_in_stripe();
                    self.valid = false;
                    return false;
                }
                InternalKeyKind::SingleDelete => continue,
                _ => {
                    self.fail(CompactionError::InvalidKind(self.iter_key.kind_byte()));
                    return false;
                }
            }
        }
    }

    /// Scans the stripe under a DELSIZED to see what it actually deletes.
    /// The recorded size is consumed by the first record it deletes.
    fn delete_sized_next(&mut self) {
        self.save_key();
        self.valid = true;
        self.pos.set_skip(true);
        self.take_iter_value();

        self.pos.park_ahead();
        while self.next_in_stripe() == StripeChange::SameStripeSkippable {
            match self.iter_key.kind() {
                InternalKeyKind::Delete | InternalKeyKind::DeleteSized => {
                    // An older tombstone already covers whatever lies below.
                    self.key.set_kind(InternalKeyKind::Delete);
                    self.value.clear();
                    self.skip_in_stripe();
                    return;
                }
                _ => {
                    if self.value.is_empty() {
                        self.key.set_kind(InternalKeyKind::Delete);
                        self.skip_in_stripe();
                        return;
                    }
                    let expected = match decode_uvarint(&self.value) {
                        Some((size, n)) if n == self.value.len() => size,
                        _ => {
                            let hex = self.value.iter().map(|b| format!("{b:02x}")).collect();
                            self.fail(CompactionError::InvalidDeleteSized(hex));
                            return;
                        }
                    };
                    let elided = (self.iter_key.user_key.len() + self.iter_value.len()) as u64;
                    if elided != expected {
                        trace!(key = %self.key, expected, elided, "missized DELSIZED");
                        self.key.set_kind(InternalKeyKind::Delete);
                        self.stats.count_missized_dels += 1;
                    }
                    self.value.clear();
                }
            }
        }
        if matches!(
            self.iter_stripe_change,
            StripeChange::NewStripeNewKey | StripeChange::NewStripeSameKey
        ) {
            self.pos.set_skip(false);
        }
    }

    fn skip_in_stripe(&mut self) {
        self.pos.set_skip(true);
        while self.next_in_stripe() == StripeChange::SameStripeSkippable {}
        // Landing on a non-skippable record keeps `skip` for the rest of
        // the stripe.
        if matches!(
            self.iter_stripe_change,
            StripeChange::NewStripeNewKey | StripeChange::NewStripeSameKey
        ) {
            self.pos.set_skip(false);
        }
    }

    fn next_in_stripe(&mut self) -> StripeChange {
        self.iter_stripe_change = self.next_in_stripe_helper();
        self.iter_stripe_change
    }

    fn next_in_stripe_helper(&mut self) -> StripeChange {
        if !self.iter_next() {
            return StripeChange::NewStripeNewKey;
        }

        // Versions of one user key have strictly descending trailers, and
        // nothing sorts under a zero seqnum, so either of these means a new
        // user key without comparing.
        let fast_new_key = self.key_trailer <= ZERO_SEQNUM_MAX_TRAILER
            || self.iter_key.trailer >= self.key_trailer;
        debug_assert!(
            !fast_new_key || !self.cmp.equal(&self.key.user_key, &self.iter_key.user_key),
            "{} and {} out of order",
            self.iter_key,
            InternalKey {
                user_key: self.key.user_key.clone(),
                trailer: self.key_trailer
            }
        );
        let orig_index = self.cur_stripe.index;
        self.cur_stripe = self.snapshots.classify(self.iter_key.seq_num());
        if fast_new_key || !self.cmp.equal(&self.key.user_key, &self.iter_key.user_key) {
            return StripeChange::NewStripeNewKey;
        }

        let same_stripe = self.cur_stripe.index == orig_index;
        let kind = self.iter_key.kind();
        let non_skippable = kind == InternalKeyKind::RangeDelete
            || kind.is_range_key()
            || kind == InternalKeyKind::Invalid;
        match (same_stripe, non_skippable) {
            (false, _) => StripeChange::NewStripeSameKey,
            (true, true) => StripeChange::SameStripeNonSkippable,
            (true, false) => StripeChange::SameStripeSkippable,
        }
    }

    fn iter_next(&mut self) -> bool {
        let kv = self.iter.next();
        let loaded = load_upstream(kv, &mut self.iter_key, &mut self.iter_value);
        self.finish_step(loaded)
    }

    fn finish_step(&mut self, loaded: Result<bool, CompactionError>) -> bool {
        match loaded {
            Ok(true) => {
                self.iter_valid = true;
            }
            Ok(false) => {
                self.iter_valid = false;
                if let Some(e) = self.iter.take_error() {
                    self.fail(CompactionError::Input(Arc::new(e)));
                }
            }
            Err(e) => {
                self.iter_valid = false;
                self.fail(e);
            }
        }
        self.iter_valid
    }

    fn covered_visibly(&self) -> bool {
        self.range_del_frag
            .covers(self.iter_key.as_ref(), self.cur_stripe.ceiling)
            == Coverage::Visibly
    }

    fn save_key(&mut self) {
        self.key.copy_from(self.iter_key.as_ref());
        self.key_trailer = self.iter_key.trailer;
        self.frontiers.advance(&self.key.user_key);
    }

    fn take_iter_value(&mut self) {
        std::mem::swap(&mut self.value, &mut self.iter_value);
    }

    fn maybe_zero_seqnum(&mut self, stripe_index: usize) {
        if self.allow_zero_seqnum && stripe_index == 0 {
            self.key.set_seq_num(base::SEQ_NUM_ZERO);
        }
    }

    fn close_value_closer(&mut self) -> bool {
        if let Some(closer) = self.value_closer.take() {
            if let Err(e) = closer.close() {
                self.fail(CompactionError::ValueCloser(Arc::new(e)));
                return false;
            }
        }
        true
    }

    fn fail(&mut self, err: CompactionError) {
        if self.err.is_none() {
            if err.is_corruption() {
                warn!(error = %err, key = %self.iter_key, "corrupt compaction input");
            } else {
                warn!(error = %err, "compaction pass failed");
            }
            self.err = Some(err);
        }
        self.valid = false;
    }

    /// Records the span of the range deletion or range key under the cursor.
    fn queue_span(&mut self) -> Result<(), CompactionError> {
        let key = &self.iter_key;
        let queued = if key.kind() == InternalKeyKind::RangeDelete {
            (
                SpanTarget::RangeDel,
                Span::new(
                    key.user_key.clone(),
                    self.iter_value.clone(),
                    vec![SpanKey::new(key.trailer)],
                ),
            )
        } else {
            let body = decode_range_key_value(&self.iter_value)
                .map_err(|e| CompactionError::Corruption(format!("range key {key}: {e:#}")))?;
            (
                SpanTarget::RangeKey,
                Span::new(
                    key.user_key.clone(),
                    body.end,
                    vec![SpanKey::with_payload(
                        key.trailer,
                        body.suffix.to_vec(),
                        body.value.to_vec(),
                    )],
                ),
            )
        };
        self.pending_span = Some(queued);
        Ok(())
    }

    fn flush_pending_span(&mut self) {
        if let Some((target, span)) = self.pending_span.take() {
            self.add_span(target, span);
        }
    }

    /// Feeds the pending span of `target` to its fragmenter when a drain up
    /// to `boundary` must include it.
    fn flush_pending_span_before(&mut self, target: SpanTarget, boundary: Option<&[u8]>) {
        let due = match (&self.pending_span, boundary) {
            (Some((t, _)), _) if *t != target => false,
            (Some(_), None) => true,
            (Some((_, span)), Some(b)) => self.cmp.cmp(&span.start, b).is_lt(),
            (None, _) => false,
        };
        if due {
            self.flush_pending_span();
        }
    }

    fn add_span(&mut self, target: SpanTarget, span: Span) {
        match target {
            SpanTarget::RangeDel => {
                for fragment in self.range_del_frag.add(span) {
                    self.emit_range_del_chunk(fragment);
                }
            }
            SpanTarget::RangeKey => {
                let fragments = self.range_key_frag.add(span);
                self.emit_range_key_chunks(fragments);
            }
        }
    }

    /// Keeps the newest key of each stripe, down to the oldest stripe.
    fn emit_range_del_chunk(&mut self, fragment: Span) {
        let Span { start, end, keys } = fragment;
        let mut kept = Vec::with_capacity(keys.len());
        let mut current: Option<usize> = None;
        for k in keys {
            let index = self.snapshots.classify(k.seq_num()).index;
            if current == Some(index) {
                continue;
            }
            if index == 0 && self.elision.elide_range_tombstone(&start, &end) {
                trace!(
                    start = %self.cmp.format(&start),
                    end = %self.cmp.format(&end),
                    "eliding range tombstone"
                );
                break;
            }
            kept.push(k);
            if index == 0 {
                break;
            }
            current = Some(index);
        }
        if !kept.is_empty() {
            self.tombstones.push(Span { start, end, keys: kept });
        }
    }

    fn emit_range_key_chunks(&mut self, fragments: Vec<Span>) {
        self.range_keys
            .extend(fragments.into_iter().filter(|f| !f.is_empty()));
    }
}

/// Copies an upstream record into the cursor buffers.
fn load_upstream(
    kv: Option<InternalKv<'_>>,
    key: &mut InternalKey,
    value: &mut Vec<u8>,
) -> Result<bool, CompactionError> {
    let Some(kv) = kv else {
        return Ok(false);
    };
    key.copy_from(kv.key);
    kv.value
        .fetch_into(value)
        .map_err(|e| CompactionError::LazyValue(Arc::new(e)))?;
    Ok(true)
}
