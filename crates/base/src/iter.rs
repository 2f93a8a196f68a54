//! The upstream iterator contract.
//!
//! The compaction iterator consumes exactly one ordered stream of internal
//! keys. Merging several memtables and tables into that stream happens
//! before this point.

use anyhow::Result;

use crate::InternalKeyRef;

/// Produces a value on demand (e.g. a value stored out of line).
pub trait ValueFetcher {
    /// Writes the value into `buf`, which is empty on entry.
    fn fetch(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// A value that may not be materialized yet.
#[derive(Clone, Copy)]
pub enum LazyValue<'a> {
    Inline(&'a [u8]),
    Deferred(&'a dyn ValueFetcher),
}

impl LazyValue<'_> {
    /// Replaces the contents of `buf` with the value.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's error for deferred values.
    pub fn fetch_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.clear();
        match self {
            LazyValue::Inline(v) => {
                buf.extend_from_slice(v);
                Ok(())
            }
            LazyValue::Deferred(fetcher) => fetcher.fetch(buf),
        }
    }
}

impl std::fmt::Debug for LazyValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LazyValue::Inline(v) => write!(f, "Inline({})", String::from_utf8_lossy(v)),
            LazyValue::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// One record of the upstream stream. Borrowed until the next positioning
/// call.
#[derive(Debug, Clone, Copy)]
pub struct InternalKv<'a> {
    pub key: InternalKeyRef<'a>,
    pub value: LazyValue<'a>,
}

/// A forward iterator over internal keys in internal-key order.
pub trait InternalIterator {
    /// Positions at the first record.
    fn first(&mut self) -> Option<InternalKv<'_>>;

    /// Advances to the next record. `None` at exhaustion or on error.
    fn next(&mut self) -> Option<InternalKv<'_>>;

    /// Hands over the error that ended iteration early, if any.
    fn take_error(&mut self) -> Option<anyhow::Error> {
        None
    }

    /// Releases the iterator's resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
