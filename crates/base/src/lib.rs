//! # Base - shared vocabulary of the RiptideKV compaction path
//!
//! Everything that the memtable, the span fragmenter and the compaction
//! iterator need to agree on lives here:
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`key`]      | `InternalKey`, kinds, trailers, sequence-number constants |
//! | [`compare`]  | `Comparer` (user-key order + key formatting)              |
//! | [`merge`]    | `Merger` / `ValueMerger` operators, `ConcatMerger`        |
//! | [`iter`]     | `InternalIterator`, `InternalKv`, `LazyValue`             |
//! | [`rangekey`] | Value layout of range-key records                         |
//! | [`varint`]   | uvarint helpers (DELSIZED payloads)                       |
//!
//! ## Example
//!
//! ```rust
//! use base::{InternalKey, InternalKeyKind};
//!
//! let newer = InternalKey::new(b"k".to_vec(), 9, InternalKeyKind::Set);
//! let older = InternalKey::new(b"k".to_vec(), 3, InternalKeyKind::Delete);
//! assert!(newer < older, "newest version sorts first");
//! ```

pub mod compare;
pub mod iter;
pub mod key;
pub mod merge;
pub mod rangekey;
pub mod varint;

pub use compare::Comparer;
pub use iter::{InternalIterator, InternalKv, LazyValue, ValueFetcher};
pub use key::{
    make_trailer, trailer_kind_byte, trailer_seq_num, InternalKey, InternalKeyKind,
    InternalKeyRef, SeqNum, SEQ_NUM_MAX, SEQ_NUM_ZERO, ZERO_SEQNUM_MAX_TRAILER,
};
pub use merge::{ConcatMerger, MergedValue, Merger, ValueCloser, ValueMerger};

#[cfg(test)]
mod tests;
