//! Frontiers: callbacks fired as a compaction crosses user keys.
//!
//! Each frontier watches one user key. Whenever the compaction iterator is
//! about to return a key `k`, it calls [`Frontiers::advance`]`(k)`, and every
//! frontier watching a key `<= k` has its `reached` callback invoked with `k`.
//! The callback returns the next key to watch, or `None` to go dormant.
//!
//! A frontier that returns a key still `<= k` is invoked again straight away,
//! which lets one frontier walk through a sorted list of boundaries that a
//! single large step of the iterator jumped over.
//!
//! ## Layout
//!
//! ```text
//!   slots (arena, indexed by FrontierId)      heap (min by watched key)
//!   ┌────┬───────────┬─────────┐              ┌───┐
//!   │ 0  │ key: "m"  │ reached │◄─────────────│ 2 │  root = smallest key
//!   │ 1  │ key: None │ reached │   dormant    │ 0 │
//!   │ 2  │ key: "c"  │ reached │◄─────────────└───┘
//!   └────┴───────────┴─────────┘
//! ```
//!
//! Only armed slots are in the heap. Slots are never freed, so a
//! `FrontierId` stays valid for the life of the `Frontiers`.

use std::cmp::Ordering;
use std::fmt;

use base::Comparer;

/// Invoked with the key that reached the frontier; returns the next key to
/// watch.
pub type ReachedFn = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>>>;

/// Handle to a registered frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrontierId(usize);

struct Slot {
    key: Option<Vec<u8>>,
    reached: ReachedFn,
}

/// A min-heap of frontiers ordered by watched key.
pub struct Frontiers {
    cmp: Comparer,
    slots: Vec<Slot>,
    heap: Vec<usize>,
}

impl Frontiers {
    pub fn new(cmp: Comparer) -> Self {
        Self {
            cmp,
            slots: Vec::new(),
            heap: Vec::new(),
        }
    }

    /// Registers a frontier. With `initial_key == None` it starts dormant
    /// until armed through [`update`](Self::update).
    pub fn register<F>(&mut self, initial_key: Option<Vec<u8>>, reached: F) -> FrontierId
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + 'static,
    {
        let id = self.slots.len();
        let armed = initial_key.is_some();
        self.slots.push(Slot {
            key: initial_key,
            reached: Box::new(reached),
        });
        if armed {
            self.push(id);
        }
        FrontierId(id)
    }

    /// Notifies every frontier watching a key `<= k`.
    pub fn advance(&mut self, k: &[u8]) {
        while let Some(&top) = self.heap.first() {
            let slot = &mut self.slots[top];
            let watched = slot.key.as_deref().unwrap_or_default();
            if self.cmp.cmp(k, watched) == Ordering::Less {
                break;
            }
            slot.key = (slot.reached)(k);
            if slot.key.is_none() {
                self.pop();
            } else {
                self.fix(0);
            }
        }
    }

    /// Replaces the key a frontier watches. `None` makes it dormant.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not returned by this `Frontiers`.
    pub fn update(&mut self, id: FrontierId, key: Option<Vec<u8>>) {
        let slot = &mut self.slots[id.0];
        let was_armed = slot.key.is_some();
        let now_armed = key.is_some();
        slot.key = key;

        if !was_armed {
            if now_armed {
                self.push(id.0);
            }
            return;
        }

        let pos = match self.heap.iter().position(|&s| s == id.0) {
            Some(pos) => pos,
            None => panic!("frontier {} armed but missing from heap", id.0),
        };
        if now_armed {
            self.fix(pos);
        } else {
            let last = self.heap.len() - 1;
            self.heap.swap(pos, last);
            self.heap.truncate(last);
            if pos < last {
                self.fix(pos);
            }
        }
    }

    /// The key a frontier currently watches.
    pub fn key(&self, id: FrontierId) -> Option<&[u8]> {
        self.slots.get(id.0).and_then(|s| s.key.as_deref())
    }

    /// Number of armed frontiers.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn heap_key(&self, i: usize) -> &[u8] {
        self.slots[self.heap[i]].key.as_deref().unwrap_or_default()
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.cmp.cmp(self.heap_key(i), self.heap_key(j)) == Ordering::Less
    }

    fn push(&mut self, slot: usize) {
        self.heap.push(slot);
        self.up(self.heap.len() - 1);
    }

    fn pop(&mut self) {
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        self.down(0, last);
        self.heap.truncate(last);
    }

    fn fix(&mut self, i: usize) {
        if !self.down(i, self.heap.len()) {
            self.up(i);
        }
    }

    fn up(&mut self, mut j: usize) {
        while j > 0 {
            let parent = (j - 1) / 2;
            if !self.less(j, parent) {
                break;
            }
            self.heap.swap(parent, j);
            j = parent;
        }
    }

    fn down(&mut self, i0: usize, n: usize) -> bool {
        let mut i = i0;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut j = left;
            if left + 1 < n && self.less(left + 1, left) {
                j = left + 1;
            }
            if !self.less(j, i) {
                break;
            }
            self.heap.swap(i, j);
            i = j;
        }
        i > i0
    }
}

impl fmt::Display for Frontiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, &slot) in self.heap.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", slot, self.cmp.format(self.heap_key(n)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Frontiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frontiers")
            .field("registered", &self.slots.len())
            .field("armed", &format_args!("[{}]", self))
            .finish()
    }
}
