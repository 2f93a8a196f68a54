//! User-key comparison.

use std::cmp::Ordering;
use std::fmt;

/// Orders user keys and renders them for diagnostics.
///
/// Every component that compares user keys (fragmenters, frontiers, the
/// compaction iterator) takes a copy of the same `Comparer`.
#[derive(Clone, Copy)]
pub struct Comparer {
    pub name: &'static str,
    pub compare: fn(&[u8], &[u8]) -> Ordering,
    pub format_key: fn(&[u8]) -> String,
}

impl Comparer {
    /// Lexicographic byte order, keys printed as lossy UTF-8.
    pub const BYTEWISE: Comparer = Comparer {
        name: "riptide.BytewiseComparator",
        compare: bytewise_compare,
        format_key: lossy_format,
    };

    #[inline]
    pub fn cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        (self.compare)(a, b)
    }

    #[inline]
    pub fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.cmp(a, b) == Ordering::Equal
    }

    pub fn format(&self, key: &[u8]) -> String {
        (self.format_key)(key)
    }
}

impl Default for Comparer {
    fn default() -> Self {
        Self::BYTEWISE
    }
}

impl fmt::Debug for Comparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparer").field("name", &self.name).finish()
    }
}

fn bytewise_compare(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn lossy_format(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
