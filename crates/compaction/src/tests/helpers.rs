use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{bail, Result};
use base::rangekey::encode_range_key_value;
use base::{
    ConcatMerger, InternalIterator, InternalKey, InternalKv, LazyValue, Merger, ValueFetcher,
};
use config::FormatMajorVersion;

use crate::{
    CompactionError, CompactionIter, CompactionIterOptions, CompactionKv, ElideAll, ElideNothing,
    Snapshots,
};

/// An upstream over a fixed list of records, with knobs for failures.
pub struct VecIter {
    records: Vec<(InternalKey, Vec<u8>)>,
    pos: usize,
    /// Handed out by `take_error` once the records run out.
    pub error_at_end: Option<String>,
    /// The record at this index has a deferred value that fails to load.
    pub failing_value_at: Option<usize>,
    pub close_error: Option<String>,
    pub closes: Rc<Cell<u32>>,
}

impl VecIter {
    pub fn new(records: Vec<(InternalKey, Vec<u8>)>) -> Self {
        Self {
            records,
            pos: 0,
            error_at_end: None,
            failing_value_at: None,
            close_error: None,
            closes: Rc::new(Cell::new(0)),
        }
    }

    fn current(&self) -> Option<InternalKv<'_>> {
        let (key, value) = self.records.get(self.pos)?;
        let value = if self.failing_value_at == Some(self.pos) {
            LazyValue::Deferred(&MissingBlob)
        } else {
            LazyValue::Inline(value)
        };
        Some(InternalKv {
            key: key.as_ref(),
            value,
        })
    }
}

impl InternalIterator for VecIter {
    fn first(&mut self) -> Option<InternalKv<'_>> {
        self.pos = 0;
        self.current()
    }

    fn next(&mut self) -> Option<InternalKv<'_>> {
        self.pos += 1;
        self.current()
    }

    fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error_at_end.take().map(anyhow::Error::msg)
    }

    fn close(&mut self) -> Result<()> {
        self.closes.set(self.closes.get() + 1);
        match &self.close_error {
            Some(msg) => bail!("{}", msg),
            None => Ok(()),
        }
    }
}

struct MissingBlob;

impl ValueFetcher for MissingBlob {
    fn fetch(&self, _buf: &mut Vec<u8>) -> Result<()> {
        bail!("blob file 000042 missing")
    }
}

/// Parses `("a#9,SET", "v1")` pairs into records.
pub fn records(pairs: &[(&str, &str)]) -> Result<Vec<(InternalKey, Vec<u8>)>> {
    pairs
        .iter()
        .map(|(k, v)| Ok((k.parse()?, v.as_bytes().to_vec())))
        .collect()
}

pub fn upstream(pairs: &[(&str, &str)]) -> Result<VecIter> {
    Ok(VecIter::new(records(pairs)?))
}

/// Encoded body of a range-key record, as a string so it fits [`records`].
/// Short ASCII parts keep the length prefixes valid UTF-8.
pub fn range_key_body(end: &str, suffix: &str, value: &str) -> String {
    String::from_utf8(encode_range_key_value(
        end.as_bytes(),
        suffix.as_bytes(),
        value.as_bytes(),
    ))
    .expect("short ascii range key parts")
}

pub fn options(snapshots: &[u64]) -> CompactionIterOptions {
    let mut opts = CompactionIterOptions::new(Arc::new(ConcatMerger));
    opts.snapshots = Snapshots::new(snapshots.to_vec());
    opts
}

/// Options for output at the bottom of the tree: tombstones elided and
/// seqnums zeroed in the oldest stripe.
pub fn bottommost(snapshots: &[u64]) -> CompactionIterOptions {
    let mut opts = options(snapshots);
    opts.allow_zero_seqnum = true;
    opts.elision = Box::new(ElideAll);
    opts
}

pub fn with_format(mut opts: CompactionIterOptions, v: FormatMajorVersion) -> CompactionIterOptions {
    opts.format_version = v;
    opts
}

pub fn with_merger(mut opts: CompactionIterOptions, m: impl Merger + 'static) -> CompactionIterOptions {
    opts.merger = Arc::new(m);
    opts.elision = Box::new(ElideNothing);
    opts
}

/// `key=value`, or just `key` for an empty value.
pub fn render(kv: CompactionKv<'_>) -> String {
    if kv.value.is_empty() {
        kv.key.to_string()
    } else {
        format!("{}={}", kv.key, String::from_utf8_lossy(kv.value))
    }
}

/// Runs the iterator to the end, rendering every record.
pub fn drain<I: InternalIterator>(
    iter: &mut CompactionIter<I>,
) -> std::result::Result<Vec<String>, CompactionError> {
    let mut out = Vec::new();
    let mut next = iter.first()?.map(render);
    while let Some(line) = next {
        out.push(line);
        next = iter.next()?.map(render);
    }
    Ok(out)
}

/// Like [`drain`], also recording the pinned flag of each record.
pub fn drain_pinned<I: InternalIterator>(
    iter: &mut CompactionIter<I>,
) -> std::result::Result<Vec<(String, bool)>, CompactionError> {
    let mut out = Vec::new();
    let mut next = iter.first()?.map(render);
    while let Some(line) = next {
        out.push((line, iter.snapshot_pinned()));
        next = iter.next()?.map(render);
    }
    Ok(out)
}

pub fn collapse(pairs: &[(&str, &str)], opts: CompactionIterOptions) -> Result<Vec<String>> {
    let mut iter = CompactionIter::new(upstream(pairs)?, opts);
    let out = drain(&mut iter)?;
    iter.close()?;
    Ok(out)
}
