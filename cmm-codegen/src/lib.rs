//! C-- Compiler - Target Definitions
//!
//! This crate defines the MIPS target model used by the backend: the
//! register set and instruction/directive enum, the ABI frame layout
//! constants, and the round-robin register pool.

pub mod abi;
pub mod asm;
pub mod regpool;

pub use asm::{AsmInst, Reg};
pub use regpool::{Acquired, RegFile, RegisterPool};
