//! Internal keys: a user key tagged with a sequence number and a kind.
//!
//! ## Trailer layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┬──────────┐
//! │ sequence number (56 bits)                    │ kind (8) │
//! └──────────────────────────────────────────────┴──────────┘
//! ```
//!
//! Keys order by user key ascending, then trailer **descending**, so the
//! newest version of a user key comes first. For equal sequence numbers the
//! kind with the larger code sorts first; a `RANGEDEL` therefore precedes a
//! point key written at the same sequence number.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};

/// A write ordinal. Only the low 56 bits are usable.
pub type SeqNum = u64;

/// Sequence number given to keys that sit below every open snapshot at the
/// bottom of the tree.
pub const SEQ_NUM_ZERO: SeqNum = 0;

/// Largest representable sequence number.
pub const SEQ_NUM_MAX: SeqNum = (1 << 56) - 1;

/// Any trailer at or below this value carries a zero sequence number.
pub const ZERO_SEQNUM_MAX_TRAILER: u64 = 0xff;

/// The kind of operation an internal key records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InternalKeyKind {
    Delete = 0,
    Set = 1,
    Merge = 2,
    SingleDelete = 7,
    RangeDelete = 15,
    /// A SET that may shadow an older DEL somewhere below it.
    SetWithDelete = 18,
    RangeKeyDelete = 19,
    RangeKeyUnset = 20,
    RangeKeySet = 21,
    /// A DEL carrying the expected size of the entry it deletes.
    DeleteSized = 23,
    Invalid = 255,
}

impl InternalKeyKind {
    /// Decodes a kind byte. Unknown codes map to [`InternalKeyKind::Invalid`].
    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => Self::Delete,
            1 => Self::Set,
            2 => Self::Merge,
            7 => Self::SingleDelete,
            15 => Self::RangeDelete,
            18 => Self::SetWithDelete,
            19 => Self::RangeKeyDelete,
            20 => Self::RangeKeyUnset,
            21 => Self::RangeKeySet,
            23 => Self::DeleteSized,
            _ => Self::Invalid,
        }
    }

    /// Returns `true` for the three range-key kinds.
    pub fn is_range_key(self) -> bool {
        matches!(
            self,
            Self::RangeKeySet | Self::RangeKeyUnset | Self::RangeKeyDelete
        )
    }

    /// Returns `true` for point tombstones (DEL, SINGLEDEL, DELSIZED).
    pub fn is_point_tombstone(self) -> bool {
        matches!(self, Self::Delete | Self::SingleDelete | Self::DeleteSized)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Delete => "DEL",
            Self::Set => "SET",
            Self::Merge => "MERGE",
            Self::SingleDelete => "SINGLEDEL",
            Self::RangeDelete => "RANGEDEL",
            Self::SetWithDelete => "SETWITHDEL",
            Self::RangeKeyDelete => "RANGEKEYDEL",
            Self::RangeKeyUnset => "RANGEKEYUNSET",
            Self::RangeKeySet => "RANGEKEYSET",
            Self::DeleteSized => "DELSIZED",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for InternalKeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InternalKeyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let kind = match s {
            "DEL" => Self::Delete,
            "SET" => Self::Set,
            "MERGE" => Self::Merge,
            "SINGLEDEL" => Self::SingleDelete,
            "RANGEDEL" => Self::RangeDelete,
            "SETWITHDEL" => Self::SetWithDelete,
            "RANGEKEYDEL" => Self::RangeKeyDelete,
            "RANGEKEYUNSET" => Self::RangeKeyUnset,
            "RANGEKEYSET" => Self::RangeKeySet,
            "DELSIZED" => Self::DeleteSized,
            "INVALID" => Self::Invalid,
            other => bail!("unknown key kind {other:?}"),
        };
        Ok(kind)
    }
}

/// Packs a sequence number and kind into a trailer.
#[inline]
pub fn make_trailer(seq: SeqNum, kind: InternalKeyKind) -> u64 {
    (seq << 8) | kind as u64
}

/// Sequence number stored in `trailer`.
#[inline]
pub fn trailer_seq_num(trailer: u64) -> SeqNum {
    trailer >> 8
}

/// Raw kind byte stored in `trailer`.
#[inline]
pub fn trailer_kind_byte(trailer: u64) -> u8 {
    (trailer & 0xff) as u8
}

/// Compares two trailers in internal-key order (descending).
#[inline]
fn cmp_trailers(a: u64, b: u64) -> Ordering {
    b.cmp(&a)
}

/// An owned internal key.
///
/// The compaction iterator keeps one of these as a reusable buffer: the user
/// key vector is cleared and refilled in place rather than reallocated.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct InternalKey {
    pub user_key: Vec<u8>,
    pub trailer: u64,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Vec<u8>>, seq: SeqNum, kind: InternalKeyKind) -> Self {
        Self {
            user_key: user_key.into(),
            trailer: make_trailer(seq, kind),
        }
    }

    /// An artificial key that sorts immediately before every real key with
    /// the same user key. Used as the exclusive upper bound of spans.
    pub fn exclusive_sentinel(user_key: impl Into<Vec<u8>>) -> Self {
        Self::new(user_key, SEQ_NUM_MAX, InternalKeyKind::RangeDelete)
    }

    pub fn is_exclusive_sentinel(&self) -> bool {
        self.seq_num() == SEQ_NUM_MAX
            && (self.kind() == InternalKeyKind::RangeDelete || self.kind().is_range_key())
    }

    #[inline]
    pub fn seq_num(&self) -> SeqNum {
        trailer_seq_num(self.trailer)
    }

    #[inline]
    pub fn kind(&self) -> InternalKeyKind {
        InternalKeyKind::from_u8(self.kind_byte())
    }

    #[inline]
    pub fn kind_byte(&self) -> u8 {
        trailer_kind_byte(self.trailer)
    }

    pub fn set_kind(&mut self, kind: InternalKeyKind) {
        self.trailer = make_trailer(self.seq_num(), kind);
    }

    pub fn set_seq_num(&mut self, seq: SeqNum) {
        self.trailer = (seq << 8) | (self.trailer & 0xff);
    }

    /// Overwrites `self` with `other`, reusing the user key allocation.
    pub fn copy_from(&mut self, other: InternalKeyRef<'_>) {
        self.user_key.clear();
        self.user_key.extend_from_slice(other.user_key);
        self.trailer = other.trailer;
    }

    pub fn as_ref(&self) -> InternalKeyRef<'_> {
        InternalKeyRef {
            user_key: &self.user_key,
            trailer: self.trailer,
        }
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ref().cmp(&other.as_ref())
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

/// Parses the `user_key#seq,KIND` form produced by `Display`.
///
/// ```
/// use base::{InternalKey, InternalKeyKind};
///
/// let k: InternalKey = "apple#12,SET".parse().unwrap();
/// assert_eq!(k.user_key, b"apple");
/// assert_eq!(k.seq_num(), 12);
/// assert_eq!(k.kind(), InternalKeyKind::Set);
/// ```
impl FromStr for InternalKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (user_key, rest) = s
            .rsplit_once('#')
            .ok_or_else(|| anyhow!("missing '#' in internal key {s:?}"))?;
        let (seq, kind) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("missing ',' in internal key {s:?}"))?;
        let seq: SeqNum = if seq == "inf" {
            SEQ_NUM_MAX
        } else {
            seq.parse()
                .with_context(|| format!("bad sequence number in {s:?}"))?
        };
        Ok(Self::new(user_key.as_bytes(), seq, kind.parse()?))
    }
}

/// A borrowed internal key, as handed out by upstream iterators.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InternalKeyRef<'a> {
    pub user_key: &'a [u8],
    pub trailer: u64,
}

impl<'a> InternalKeyRef<'a> {
    pub fn new(user_key: &'a [u8], trailer: u64) -> Self {
        Self { user_key, trailer }
    }

    #[inline]
    pub fn seq_num(&self) -> SeqNum {
        trailer_seq_num(self.trailer)
    }

    #[inline]
    pub fn kind(&self) -> InternalKeyKind {
        InternalKeyKind::from_u8(trailer_kind_byte(self.trailer))
    }

    pub fn to_owned_key(&self) -> InternalKey {
        InternalKey {
            user_key: self.user_key.to_vec(),
            trailer: self.trailer,
        }
    }
}

impl Ord for InternalKeyRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(other.user_key)
            .then_with(|| cmp_trailers(self.trailer, other.trailer))
    }
}

impl PartialOrd for InternalKeyRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for InternalKeyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        write!(f, "{}#", String::from_utf8_lossy(self.user_key))?;
        if self.seq_num() == SEQ_NUM_MAX {
            f.write_str("inf")?;
        } else {
            write!(f, "{}", self.seq_num())?;
        }
        if kind == InternalKeyKind::Invalid {
            write!(f, ",INVALID({})", trailer_kind_byte(self.trailer))
        } else {
            write!(f, ",{kind}")
        }
    }
}

impl fmt::Debug for InternalKeyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
