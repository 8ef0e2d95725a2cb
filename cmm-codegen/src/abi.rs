//! Calling convention and frame layout
//!
//! Stack frame, from high addresses down:
//!
//! ```text
//!   caller-pushed arguments      $fp+8, $fp+12, ... (declaration order)
//!   saved return address         $fp+4
//!   saved frame pointer          $fp+0
//!   callee-saved $s0-$s7, $gp    $fp-36 .. $fp-4   (fixed 36-byte region)
//!   locals and spill slots       below $fp-36, growing downward
//! ```
//!
//! The frame size is only known after the whole body (including spills) has
//! been generated, so the prologue loads it from a per-function data word
//! emitted afterwards.

use crate::asm::Reg;

/// Size in bytes of every scalar stack slot
pub const WORD_BYTES: i32 = 4;

/// Bytes of the fixed callee-saved region below the frame pointer
/// ($s0-$s7 plus $gp, one word each)
pub const SAVED_REGS_BYTES: i32 = 36;

/// Offset from $fp of the first parameter; later parameters follow at
/// `FIRST_PARAM_OFFSET + 4 * k`
pub const FIRST_PARAM_OFFSET: i32 = 8;

/// Allocatable integer registers: `$s0`-`$s7`
pub const INT_POOL_SIZE: usize = 8;

/// Allocatable float registers: `$f4`-`$f11`
pub const FLOAT_POOL_SIZE: usize = 8;
const FIRST_FLOAT_REG: u8 = 4;

/// Integer return value register
pub const INT_RETURN: Reg = Reg::V0;

/// Float return value register
pub const FLOAT_RETURN: Reg = Reg::F(0);

/// Float argument register used by the print-float syscall
pub const FLOAT_SYSCALL_ARG: Reg = Reg::F(12);

/// Map an integer pool slot to its register
pub fn int_reg(index: u8) -> Reg {
    assert!((index as usize) < INT_POOL_SIZE);
    Reg::S(index)
}

/// Map a float pool slot to its register
pub fn float_reg(index: u8) -> Reg {
    assert!((index as usize) < FLOAT_POOL_SIZE);
    Reg::F(FIRST_FLOAT_REG + index)
}

/// Pool slot of an allocatable register, or None for fixed-role registers
pub fn pool_index(reg: Reg) -> Option<u8> {
    match reg {
        Reg::S(n) if (n as usize) < INT_POOL_SIZE => Some(n),
        Reg::F(n) if n >= FIRST_FLOAT_REG && ((n - FIRST_FLOAT_REG) as usize) < FLOAT_POOL_SIZE => {
            Some(n - FIRST_FLOAT_REG)
        }
        _ => None,
    }
}

/// Label of the data word holding a function's final frame size
pub fn frame_size_label(name: &str) -> String {
    format!("_framesize_{}", name)
}

/// Label of a function's epilogue; `return` jumps here
pub fn end_label(name: &str) -> String {
    format!("_end_{}", name)
}
