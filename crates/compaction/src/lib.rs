//! # Compaction - collapsing multi-version records
//!
//! Turns one ordered stream of internal keys (memtables and tables already
//! merged) into the smallest set of records a compaction must write, without
//! changing what any open snapshot can read.
//!
//! ## Architecture
//!
//! ```text
//!   upstream InternalIterator
//!            │ one record at a time
//!            v
//! ┌──────────────────────────────────────────────────┐
//! │                 CompactionIter                   │
//! │                                                  │
//! │ snapshot.rs  → which stripe a seqnum falls in    │
//! │ elision.rs   → may a tombstone be dropped?       │
//! │ frontier.rs  → callbacks as user keys go by      │
//! │                                                  │
//! │ RANGEDEL / range key ──► keyspan::Fragmenter     │
//! │                              │ fragments         │
//! │                              v                   │
//! │                  per-stripe filtering            │
//! └───────┬───────────────────────────┬──────────────┘
//!         │ first / next              │ tombstones / range_keys
//!         v                           v
//!      point records           fragmented spans
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | [`iter`]       | `CompactionIter`: the collapsing state machine        |
//! | [`snapshot`]   | `Snapshots`, `snapshot_index`, stripe classification  |
//! | [`frontier`]   | `Frontiers` heap of key-reached callbacks             |
//! | [`elision`]    | `TombstoneElision` policies                           |
//! | [`runner`]     | `run_compaction` into in-memory output runs           |
//! | [`error`]      | `CompactionError`                                     |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use base::ConcatMerger;
//! use compaction::{CompactionIter, CompactionIterOptions};
//! use memtable::Memtable;
//!
//! let mut mem = Memtable::new();
//! mem.set(b"a", 9, b"new");
//! mem.set(b"a", 4, b"old");
//!
//! let opts = CompactionIterOptions::new(Arc::new(ConcatMerger));
//! let mut iter = CompactionIter::new(mem.iter(), opts);
//! let kv = iter.first().unwrap().unwrap().into_owned();
//! assert_eq!(kv.key.to_string(), "a#9,SET");
//! assert_eq!(kv.value, b"new");
//! assert!(iter.next().unwrap().is_none());
//! ```

pub mod elision;
pub mod error;
pub mod frontier;
pub mod iter;
pub mod runner;
pub mod snapshot;

pub use elision::{
    ElideAll, ElideNothing, InUseKeyRanges, KeepRangeTombstones, KeyRange, TombstoneElision,
};
pub use error::CompactionError;
pub use frontier::{FrontierId, Frontiers};
pub use iter::{CompactionIter, CompactionIterOptions, CompactionIterStats, CompactionKv, OwnedKv};
pub use runner::{run_compaction, CompactionOutput};
pub use snapshot::{snapshot_index, Snapshots, Stripe};

#[cfg(test)]
mod tests;
