//! Location descriptors
//!
//! A descriptor records where a node's value currently lives. It is the sole
//! authoritative location at any instant: materializing a memory-resident
//! value into a register rewrites the descriptor to `Reg`, and a spill
//! rewrites the evicted owner's descriptor back to a `Stack` slot.

use cmm_codegen::Reg;
use cmm_common::NodeId;

/// How an array element offset is applied to the base location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Offset fully resolved at compile time
    Static,
    /// A runtime byte offset was accumulated into a register; the register
    /// is reached through its owning node (the first subscript expression),
    /// so a spill between address computation and use is survivable.
    Dynamic(NodeId),
}

/// Where a value currently resides
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// In an allocatable register of either file
    Reg(Reg),
    /// Frame slot; `offset` is the byte depth below the frame pointer, so
    /// the address is `$fp - offset` (parameters have negative depths)
    Stack { offset: i32, index: IndexMode },
    /// Data-segment label plus compile-time byte offset
    Global {
        label: String,
        offset: i32,
        index: IndexMode,
    },
    /// Frame slot at `$fp + pointer_offset` holds a pointer; `offset` is
    /// added after dereferencing (array parameters)
    Indirect {
        pointer_offset: i32,
        offset: i32,
        index: IndexMode,
    },
}

impl Location {
    pub fn register(&self) -> Option<Reg> {
        match self {
            Location::Reg(reg) => Some(*reg),
            _ => None,
        }
    }
}
