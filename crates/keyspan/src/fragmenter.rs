//! Sweep-line fragmenter.
//!
//! Pending spans always share one start key: whenever a span with a larger
//! start arrives, everything before that start is cut off and emitted.
//!
//! ```text
//! pending: [a,e)#1            add [c,g)#2
//!          ─────────►  emit [a,c){#1}
//!                      pending: [c,e)#1, [c,g)#2
//! ```
//!
//! Emitting a batch of spans that share a start walks their end keys in
//! ascending order; each step yields one fragment holding the keys of every
//! span that reaches at least that far.

use std::cmp::Ordering;

use base::{Comparer, InternalKeyRef, SeqNum};

use crate::{Coverage, Fragmenter, Span};

/// The default [`Fragmenter`].
#[derive(Debug)]
pub struct SpanFragmenter {
    cmp: Comparer,
    in_progress: Vec<Span>,
    finished: bool,
}

impl SpanFragmenter {
    pub fn new(cmp: Comparer) -> Self {
        Self {
            cmp,
            in_progress: Vec::new(),
            finished: false,
        }
    }

    /// Splits every pending span at `key`. Parts before `key` are emitted;
    /// parts after it stay pending with `key` as their start.
    fn truncate_and_flush(&mut self, key: &[u8]) -> Vec<Span> {
        let mut done = Vec::with_capacity(self.in_progress.len());
        let mut kept = Vec::with_capacity(self.in_progress.len());
        for span in self.in_progress.drain(..) {
            if self.cmp.cmp(key, &span.end) == Ordering::Less {
                done.push(Span {
                    start: span.start,
                    end: key.to_vec(),
                    keys: span.keys.clone(),
                });
                kept.push(Span {
                    start: key.to_vec(),
                    end: span.end,
                    keys: span.keys,
                });
            } else {
                done.push(span);
            }
        }
        self.in_progress = kept;
        self.flush(done)
    }

    /// Fragments spans sharing one start key.
    fn flush(&self, mut buf: Vec<Span>) -> Vec<Span> {
        if buf.is_empty() {
            return Vec::new();
        }
        let cmp = self.cmp;
        buf.sort_by(|a, b| cmp.cmp(&a.end, &b.end));

        let mut out = Vec::new();
        let mut start = buf[0].start.clone();
        let mut i = 0;
        while i < buf.len() {
            let end = buf[i].end.clone();
            let mut fragment = Span {
                start: std::mem::replace(&mut start, end.clone()),
                end: end.clone(),
                keys: buf[i..].iter().flat_map(|s| s.keys.iter().cloned()).collect(),
            };
            fragment.sort_keys();
            out.push(fragment);
            while i < buf.len() && cmp.cmp(&buf[i].end, &end) != Ordering::Greater {
                i += 1;
            }
        }
        tracing::trace!(fragments = out.len(), "flushed span fragments");
        out
    }
}

impl Fragmenter for SpanFragmenter {
    fn add(&mut self, mut span: Span) -> Vec<Span> {
        assert!(!self.finished, "fragmenter: add called after finish");
        if self.cmp.cmp(&span.start, &span.end) != Ordering::Less {
            return Vec::new();
        }
        span.sort_keys();

        let order = self
            .in_progress
            .first()
            .map(|pending| self.cmp.cmp(&pending.start, &span.start));
        let flushed = match order {
            Some(Ordering::Greater) => panic!(
                "fragmenter: span start {} precedes pending start {}",
                self.cmp.format(&span.start),
                self.start().map(|s| self.cmp.format(s)).unwrap_or_default()
            ),
            Some(Ordering::Less) => self.truncate_and_flush(&span.start),
            Some(Ordering::Equal) | None => Vec::new(),
        };
        self.in_progress.push(span);
        flushed
    }

    fn covers(&self, key: InternalKeyRef<'_>, snapshot: SeqNum) -> Coverage {
        let seq = key.seq_num();
        let mut coverage = Coverage::None;
        for span in &self.in_progress {
            if self.cmp.cmp(key.user_key, &span.end) != Ordering::Less {
                continue;
            }
            debug_assert!(
                self.cmp.cmp(&span.start, key.user_key) != Ordering::Greater,
                "covers queried for a key before the pending start"
            );
            for k in &span.keys {
                // Keys are newest first; nothing further down is newer than `key`.
                if k.seq_num() <= seq {
                    break;
                }
                if k.visible_at(snapshot) {
                    return Coverage::Visibly;
                }
                coverage = Coverage::Invisibly;
            }
        }
        coverage
    }

    fn truncate_and_flush_to(&mut self, key: &[u8]) -> Vec<Span> {
        match self.in_progress.first() {
            Some(pending) if self.cmp.cmp(&pending.start, key) == Ordering::Less => {
                self.truncate_and_flush(key)
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<Span> {
        self.finished = true;
        let pending = std::mem::take(&mut self.in_progress);
        self.flush(pending)
    }

    fn start(&self) -> Option<&[u8]> {
        self.in_progress.first().map(|s| s.start.as_slice())
    }

    fn is_empty(&self) -> bool {
        self.in_progress.is_empty()
    }
}
