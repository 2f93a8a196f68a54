//! # Memtable - multi-version in-memory table
//!
//! Every write is kept as its own internal key (`user_key#seq,KIND`), so a
//! single user key can carry a whole history of SETs, MERGEs and
//! tombstones. Iteration yields that history in internal-key order and
//! implements [`InternalIterator`], which makes a memtable a ready-made
//! upstream for the compaction iterator.
//!
//! Range deletions store their exclusive end key as the value; range keys
//! store the encoded `end / suffix / value` body.

use std::collections::btree_map;
use std::collections::BTreeMap;

use base::rangekey::encode_range_key_value;
use base::varint::encode_uvarint;
use base::{InternalIterator, InternalKey, InternalKeyKind, InternalKv, LazyValue, SeqNum};

#[derive(Debug, Default)]
pub struct Memtable {
    map: BTreeMap<InternalKey, Vec<u8>>,
    approx_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record. Returns `false` and keeps the existing value if
    /// the exact internal key is already present (first write wins).
    pub fn add(&mut self, key: InternalKey, value: Vec<u8>) -> bool {
        if self.map.contains_key(&key) {
            return false;
        }
        self.approx_size += key.user_key.len() + value.len();
        self.map.insert(key, value);
        true
    }

    pub fn set(&mut self, key: &[u8], seq: SeqNum, value: &[u8]) -> bool {
        self.add(InternalKey::new(key, seq, InternalKeyKind::Set), value.to_vec())
    }

    pub fn merge(&mut self, key: &[u8], seq: SeqNum, operand: &[u8]) -> bool {
        self.add(InternalKey::new(key, seq, InternalKeyKind::Merge), operand.to_vec())
    }

    pub fn delete(&mut self, key: &[u8], seq: SeqNum) -> bool {
        self.add(InternalKey::new(key, seq, InternalKeyKind::Delete), Vec::new())
    }

    pub fn single_delete(&mut self, key: &[u8], seq: SeqNum) -> bool {
        self.add(
            InternalKey::new(key, seq, InternalKeyKind::SingleDelete),
            Vec::new(),
        )
    }

    /// A delete that records the size (`len(key) + len(value)`) of the
    /// entry it expects to remove. `None` writes an empty payload.
    pub fn delete_sized(&mut self, key: &[u8], seq: SeqNum, size: Option<u64>) -> bool {
        let mut value = Vec::new();
        if let Some(size) = size {
            encode_uvarint(&mut value, size);
        }
        self.add(InternalKey::new(key, seq, InternalKeyKind::DeleteSized), value)
    }

    /// Deletes `[start, end)` for every sequence number below `seq`.
    pub fn range_delete(&mut self, start: &[u8], end: &[u8], seq: SeqNum) -> bool {
        self.add(
            InternalKey::new(start, seq, InternalKeyKind::RangeDelete),
            end.to_vec(),
        )
    }

    pub fn range_key_set(
        &mut self,
        start: &[u8],
        end: &[u8],
        seq: SeqNum,
        suffix: &[u8],
        value: &[u8],
    ) -> bool {
        self.add(
            InternalKey::new(start, seq, InternalKeyKind::RangeKeySet),
            encode_range_key_value(end, suffix, value),
        )
    }

    pub fn range_key_unset(&mut self, start: &[u8], end: &[u8], seq: SeqNum, suffix: &[u8]) -> bool {
        self.add(
            InternalKey::new(start, seq, InternalKeyKind::RangeKeyUnset),
            encode_range_key_value(end, suffix, b""),
        )
    }

    pub fn range_key_delete(&mut self, start: &[u8], end: &[u8], seq: SeqNum) -> bool {
        self.add(
            InternalKey::new(start, seq, InternalKeyKind::RangeKeyDelete),
            encode_range_key_value(end, b"", b""),
        )
    }

    /// Whether any version of `user_key` is present, tombstones included.
    pub fn contains_key(&self, user_key: &[u8]) -> bool {
        let lower = InternalKey::exclusive_sentinel(user_key);
        self.map
            .range(lower..)
            .next()
            .is_some_and(|(k, _)| k.user_key == user_key)
    }

    /// Ordered view of every record.
    pub fn entries(&self) -> impl Iterator<Item = (&InternalKey, &[u8])> {
        self.map.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// An [`InternalIterator`] over the table.
    pub fn iter(&self) -> MemtableIter<'_> {
        MemtableIter {
            map: &self.map,
            iter: self.map.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sum of user key and value bytes.
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }
}

/// Forward cursor over a [`Memtable`].
pub struct MemtableIter<'a> {
    map: &'a BTreeMap<InternalKey, Vec<u8>>,
    iter: btree_map::Iter<'a, InternalKey, Vec<u8>>,
}

impl<'a> MemtableIter<'a> {
    fn step(&mut self) -> Option<InternalKv<'a>> {
        self.iter.next().map(|(k, v)| InternalKv {
            key: k.as_ref(),
            value: LazyValue::Inline(v),
        })
    }
}

impl InternalIterator for MemtableIter<'_> {
    fn first(&mut self) -> Option<InternalKv<'_>> {
        self.iter = self.map.iter();
        self.step()
    }

    fn next(&mut self) -> Option<InternalKv<'_>> {
        self.step()
    }
}
