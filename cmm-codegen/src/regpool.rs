//! Register Pool
//!
//! Fixed-capacity allocator over one register file. Allocation is a cyclic
//! scan starting just after a "last allocated" cursor; when every slot is
//! taken the cursor advances one position and that slot is evicted no matter
//! how recently it was used. This round-robin eviction is deliberately not
//! least-recently-used: downstream output depends on the exact policy, so it
//! must not be "improved".
//!
//! The pool is pure bookkeeping. Emitting the spill store and rewriting the
//! evicted owner's location descriptor is the caller's job, which keeps the
//! pool unit-testable without a syntax tree.

use cmm_common::NodeId;
use log::{debug, trace};

/// The two independent register files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegFile {
    Int,
    Float,
}

impl std::fmt::Display for RegFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegFile::Int => write!(f, "int"),
            RegFile::Float => write!(f, "float"),
        }
    }
}

/// Outcome of an `acquire` request
///
/// `index` is the slot number within the pool's file. On eviction the slot
/// stays occupied (it now belongs to the requester); `owner` is the node
/// whose value must be spilled before the register is reused, if any node
/// was bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Free(u8),
    Evicted { index: u8, owner: Option<NodeId> },
}

impl Acquired {
    pub fn index(&self) -> u8 {
        match *self {
            Acquired::Free(index) => index,
            Acquired::Evicted { index, .. } => index,
        }
    }
}

/// Round-robin register allocator for one register file
#[derive(Debug)]
pub struct RegisterPool {
    file: RegFile,
    occupied: Vec<bool>,
    owner: Vec<Option<NodeId>>,
    /// The "last allocated" cursor; scans start just after it
    cursor: usize,
}

impl RegisterPool {
    pub fn new(file: RegFile, capacity: usize) -> Self {
        assert!(capacity >= 2, "register pool needs at least two slots");
        Self {
            file,
            occupied: vec![false; capacity],
            owner: vec![None; capacity],
            cursor: 0,
        }
    }

    pub fn file(&self) -> RegFile {
        self.file
    }

    pub fn capacity(&self) -> usize {
        self.occupied.len()
    }

    /// Request a slot. Always succeeds: if every slot is occupied the slot
    /// just past the cursor is evicted and handed to the requester.
    pub fn acquire(&mut self) -> Acquired {
        if let Some(index) = self.find_free() {
            self.occupied[index] = true;
            trace!("{} pool: acquired free slot {}", self.file, index);
            return Acquired::Free(index as u8);
        }

        // Full: advance the cursor one position and evict that slot.
        self.cursor = (self.cursor + 1) % self.capacity();
        let index = self.cursor;
        let owner = self.owner[index].take();
        debug!(
            "{} pool: full, evicting slot {} (owner: {:?})",
            self.file, index, owner
        );
        Acquired::Evicted {
            index: index as u8,
            owner,
        }
    }

    /// Record the node whose value currently lives in the slot
    pub fn bind(&mut self, index: u8, node: NodeId) {
        let index = self.check_range(index);
        self.owner[index] = Some(node);
    }

    /// Free a slot unconditionally, breaking the owner link
    pub fn release(&mut self, index: u8) {
        let index = self.check_range(index);
        self.occupied[index] = false;
        self.owner[index] = None;
    }

    pub fn owner(&self, index: u8) -> Option<NodeId> {
        self.owner[self.check_range(index)]
    }

    pub fn is_occupied(&self, index: u8) -> bool {
        self.occupied[self.check_range(index)]
    }

    pub fn live_count(&self) -> usize {
        self.occupied.iter().filter(|o| **o).count()
    }

    /// Occupied slots that have a bound owner, in slot order
    pub fn owned_slots(&self) -> Vec<(u8, NodeId)> {
        self.owner
            .iter()
            .enumerate()
            .filter(|(i, _)| self.occupied[*i])
            .filter_map(|(i, owner)| owner.map(|node| (i as u8, node)))
            .collect()
    }

    /// Cyclic scan for a free slot, starting just past the cursor and
    /// visiting the cursor's own slot last. A hit moves the cursor, so the
    /// slot handed out is always protected from the next eviction.
    fn find_free(&mut self) -> Option<usize> {
        let capacity = self.capacity();
        for step in 1..=capacity {
            let index = (self.cursor + step) % capacity;
            if !self.occupied[index] {
                self.cursor = index;
                return Some(index);
            }
        }
        None
    }

    fn check_range(&self, index: u8) -> usize {
        let index = index as usize;
        assert!(
            index < self.capacity(),
            "register index {} out of range for the {} file ({} slots)",
            index,
            self.file,
            self.capacity()
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_acquire_takes_slot_after_cursor() {
        let mut pool = RegisterPool::new(RegFile::Int, 8);
        // The scan starts just past the initial cursor position 0.
        assert_eq!(pool.acquire(), Acquired::Free(1));
        assert_eq!(pool.acquire(), Acquired::Free(2));
    }

    #[test]
    fn test_release_makes_slot_immediately_reusable() {
        let mut pool = RegisterPool::new(RegFile::Int, 4);
        for _ in 0..4 {
            pool.acquire();
        }
        assert_eq!(pool.live_count(), 4);
        pool.release(2);
        assert!(!pool.is_occupied(2));
        // The freed slot is found by the scan instead of forcing an eviction.
        assert_eq!(pool.acquire(), Acquired::Free(2));
        assert_eq!(pool.live_count(), 4);
    }

    #[test]
    fn test_eviction_is_round_robin() {
        let mut pool = RegisterPool::new(RegFile::Int, 4);
        for node in 0..4u32 {
            let acq = pool.acquire();
            let index = match acq {
                Acquired::Free(i) => i,
                Acquired::Evicted { .. } => unreachable!("pool not full yet"),
            };
            pool.bind(index, node);
        }
        // Pool is now full; evictions walk the ring one slot at a time.
        let first = pool.acquire();
        assert!(matches!(first, Acquired::Evicted { .. }));
        let second = pool.acquire();
        let third = pool.acquire();
        let i1 = first.index();
        assert_eq!(second.index(), (i1 + 1) % 4);
        assert_eq!(third.index(), (i1 + 2) % 4);
    }

    #[test]
    fn test_eviction_reports_owner() {
        let mut pool = RegisterPool::new(RegFile::Float, 2);
        let a = pool.acquire().index();
        pool.bind(a, 7);
        let b = pool.acquire().index();
        pool.bind(b, 8);
        match pool.acquire() {
            Acquired::Evicted { owner, .. } => assert!(owner == Some(7) || owner == Some(8)),
            Acquired::Free(_) => unreachable!("pool is full"),
        }
    }

    #[test]
    fn test_no_two_owners_share_a_slot() {
        let mut pool = RegisterPool::new(RegFile::Int, 4);
        let mut seen = Vec::new();
        for node in 0..3u32 {
            let index = match pool.acquire() {
                Acquired::Free(i) => i,
                Acquired::Evicted { .. } => unreachable!(),
            };
            assert!(!seen.contains(&index));
            seen.push(index);
            pool.bind(index, node);
        }
    }

    #[test]
    fn test_owned_slots_skips_free_and_unowned() {
        let mut pool = RegisterPool::new(RegFile::Float, 4);
        let a = pool.acquire().index();
        pool.bind(a, 3);
        let _bare = pool.acquire().index();
        let c = pool.acquire().index();
        pool.bind(c, 9);
        pool.release(a);
        assert_eq!(pool.owned_slots(), vec![(c, 9)]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_release_out_of_range_panics() {
        let mut pool = RegisterPool::new(RegFile::Int, 4);
        pool.release(4);
    }
}
