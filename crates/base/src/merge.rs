//! Associative merge operators.
//!
//! A `MERGE` record holds an operand rather than a full value. The logical
//! value of a key is obtained by folding its operands from newest to oldest
//! until a SET (the base value) or a tombstone is reached.
//!
//! ```text
//! a#9,MERGE "c"   ──┐
//! a#8,MERGE "b"   ──┼── fold: merge("c") ← merge_older("b") ← merge_older("a")
//! a#7,SET   "a"   ──┘          = "abc" with ConcatMerger
//! ```

use anyhow::Result;

/// Releases resources pinned by a merged value (for example a buffer
/// borrowed from a block cache).
pub trait ValueCloser {
    fn close(self: Box<Self>) -> Result<()>;
}

/// The outcome of folding a merge chain.
pub struct MergedValue {
    pub value: Vec<u8>,
    /// When set, the key should be dropped instead of written.
    pub delete: bool,
    /// Released by the consumer once `value` is no longer referenced.
    pub closer: Option<Box<dyn ValueCloser>>,
}

impl MergedValue {
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            delete: false,
            closer: None,
        }
    }
}

impl std::fmt::Debug for MergedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedValue")
            .field("value", &String::from_utf8_lossy(&self.value))
            .field("delete", &self.delete)
            .field("closer", &self.closer.is_some())
            .finish()
    }
}

/// Accumulates operands of a single merge chain.
pub trait ValueMerger {
    /// Folds in an operand that is older than everything seen so far.
    fn merge_older(&mut self, value: &[u8]) -> Result<()>;

    /// Produces the folded value. `includes_base` is `true` when the chain
    /// reached a SET or a tombstone, i.e. the result is a complete value.
    fn finish(self: Box<Self>, includes_base: bool) -> Result<MergedValue>;
}

/// Creates a [`ValueMerger`] seeded with the newest operand of a chain.
pub trait Merger: Send + Sync {
    fn name(&self) -> &str;

    fn merge(&self, key: &[u8], value: &[u8]) -> Result<Box<dyn ValueMerger>>;
}

/// Concatenates operands, oldest first.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatMerger;

impl Merger for ConcatMerger {
    fn name(&self) -> &str {
        "riptide.concatenate"
    }

    fn merge(&self, _key: &[u8], value: &[u8]) -> Result<Box<dyn ValueMerger>> {
        Ok(Box::new(ConcatValueMerger {
            buf: value.to_vec(),
        }))
    }
}

struct ConcatValueMerger {
    buf: Vec<u8>,
}

impl ValueMerger for ConcatValueMerger {
    fn merge_older(&mut self, value: &[u8]) -> Result<()> {
        let mut merged = Vec::with_capacity(value.len() + self.buf.len());
        merged.extend_from_slice(value);
        merged.extend_from_slice(&self.buf);
        self.buf = merged;
        Ok(())
    }

    fn finish(self: Box<Self>, _includes_base: bool) -> Result<MergedValue> {
        Ok(MergedValue::new(self.buf))
    }
}
