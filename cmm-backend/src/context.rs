//! Code-generation context
//!
//! One mutable context is threaded through every lowering call for a
//! compilation run: the append-only instruction buffer, the frame high-water
//! mark, the label counter, the two register pools and the constant-string
//! table. Nothing here is process-global, which keeps the single-threaded
//! traversal assumption explicit.

use crate::location::{IndexMode, Location};
use cmm_codegen::{abi, Acquired, AsmInst, Reg, RegFile, RegisterPool};
use cmm_common::{LabelId, NodeId, PrimitiveType};
use log::{debug, trace};

pub struct CodegenContext {
    out: Vec<AsmInst>,
    /// Byte depth below the frame pointer in use by locals and spill slots;
    /// monotonically non-decreasing within a function
    frame_top: i32,
    /// Globally unique label counter
    next_label: LabelId,
    int_pool: RegisterPool,
    float_pool: RegisterPool,
    /// Location descriptor per arena node, written only by the backend
    node_locs: Vec<Option<Location>>,
    /// (label, literal) pairs flushed once at the end of compilation
    const_strings: Vec<(String, String)>,
    /// Name and return type of the function being lowered
    current_fn: Option<(String, PrimitiveType)>,
}

impl CodegenContext {
    pub fn new(node_count: usize) -> Self {
        Self::with_pool_capacity(node_count, abi::INT_POOL_SIZE, abi::FLOAT_POOL_SIZE)
    }

    /// Context with shrunken register pools; used by tests to force spills
    pub fn with_pool_capacity(node_count: usize, int_slots: usize, float_slots: usize) -> Self {
        assert!(int_slots <= abi::INT_POOL_SIZE && float_slots <= abi::FLOAT_POOL_SIZE);
        Self {
            out: Vec::new(),
            frame_top: abi::SAVED_REGS_BYTES,
            next_label: 0,
            int_pool: RegisterPool::new(RegFile::Int, int_slots),
            float_pool: RegisterPool::new(RegFile::Float, float_slots),
            node_locs: vec![None; node_count],
            const_strings: Vec::new(),
            current_fn: None,
        }
    }

    pub fn enter_function(&mut self, name: &str, return_type: PrimitiveType) {
        self.current_fn = Some((name.to_string(), return_type));
        self.reset_frame();
    }

    pub fn current_function(&self) -> Option<(&str, PrimitiveType)> {
        self.current_fn.as_ref().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn emit(&mut self, inst: AsmInst) {
        self.out.push(inst);
    }

    /// A fresh branch label, unique across the whole compiled unit
    pub fn new_label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    pub fn frame_top(&self) -> i32 {
        self.frame_top
    }

    /// Reserve `bytes` below the frame pointer; returns the new depth, which
    /// is the offset of the freshly allocated slot
    pub fn push_frame(&mut self, bytes: i32) -> i32 {
        self.frame_top += bytes;
        self.frame_top
    }

    /// Reset the high-water mark to the saved-register region at a function
    /// boundary
    pub fn reset_frame(&mut self) {
        self.frame_top = abi::SAVED_REGS_BYTES;
    }

    /// Acquire a register of the given file, spilling an evicted owner to a
    /// fresh stack slot when the pool is full
    pub fn acquire(&mut self, file: RegFile) -> Reg {
        let acquired = match file {
            RegFile::Int => self.int_pool.acquire(),
            RegFile::Float => self.float_pool.acquire(),
        };
        let reg = Self::reg_of(file, acquired.index());
        if let Acquired::Evicted { owner, .. } = acquired {
            if let Some(node) = owner {
                let offset = self.push_frame(abi::WORD_BYTES);
                match file {
                    RegFile::Int => self.emit(AsmInst::Sw(reg, -offset, Reg::Fp)),
                    RegFile::Float => self.emit(AsmInst::Ss(reg, -offset, Reg::Fp)),
                }
                self.node_locs[node as usize] = Some(Location::Stack {
                    offset,
                    index: IndexMode::Static,
                });
                debug!("spilled node {} from {} to $fp-{}", node, reg, offset);
            }
        }
        trace!("acquired {}", reg);
        reg
    }

    /// Shorthand: the register file matching a primitive type
    pub fn acquire_for(&mut self, ty: PrimitiveType) -> Reg {
        self.acquire(Self::file_of(ty))
    }

    /// Store every cached float value to a fresh stack slot and free its
    /// register. Float registers are not callee-saved, so nothing may stay
    /// cached in them across a call.
    pub fn flush_float_values(&mut self) {
        for (index, node) in self.float_pool.owned_slots() {
            let reg = abi::float_reg(index);
            let offset = self.push_frame(abi::WORD_BYTES);
            self.emit(AsmInst::Ss(reg, -offset, Reg::Fp));
            self.node_locs[node as usize] = Some(Location::Stack {
                offset,
                index: IndexMode::Static,
            });
            self.float_pool.release(index);
            debug!("flushed node {} from {} to $fp-{}", node, reg, offset);
        }
    }

    /// Record `node` as the owner of `reg` and point its descriptor at it
    pub fn bind(&mut self, reg: Reg, node: NodeId) {
        let (file, index) = Self::split(reg);
        match file {
            RegFile::Int => self.int_pool.bind(index, node),
            RegFile::Float => self.float_pool.bind(index, node),
        }
        self.node_locs[node as usize] = Some(Location::Reg(reg));
    }

    /// Free a register once its value has been consumed
    pub fn release(&mut self, reg: Reg) {
        let (file, index) = Self::split(reg);
        match file {
            RegFile::Int => self.int_pool.release(index),
            RegFile::Float => self.float_pool.release(index),
        }
        trace!("released {}", reg);
    }

    pub fn loc(&self, node: NodeId) -> Option<&Location> {
        self.node_locs[node as usize].as_ref()
    }

    pub fn set_loc(&mut self, node: NodeId, loc: Location) {
        self.node_locs[node as usize] = Some(loc);
    }

    /// Intern a string literal; returns its data label
    pub fn add_const_string(&mut self, literal: &str) -> String {
        let label = self.new_label();
        self.const_strings.push((label.clone(), literal.to_string()));
        label
    }

    pub fn live_registers(&self) -> usize {
        self.int_pool.live_count() + self.float_pool.live_count()
    }

    /// Finish the run: flush the constant-string table and hand the buffer over
    pub fn into_output(mut self) -> Vec<AsmInst> {
        if !self.const_strings.is_empty() {
            self.out.push(AsmInst::Data);
            for (label, literal) in std::mem::take(&mut self.const_strings) {
                self.out.push(AsmInst::Asciiz(label, literal));
            }
        }
        self.out
    }

    #[cfg(test)]
    pub fn output(&self) -> &[AsmInst] {
        &self.out
    }

    pub fn file_of(ty: PrimitiveType) -> RegFile {
        match ty {
            PrimitiveType::Int => RegFile::Int,
            PrimitiveType::Float => RegFile::Float,
        }
    }

    fn reg_of(file: RegFile, index: u8) -> Reg {
        match file {
            RegFile::Int => abi::int_reg(index),
            RegFile::Float => abi::float_reg(index),
        }
    }

    fn split(reg: Reg) -> (RegFile, u8) {
        let index = abi::pool_index(reg)
            .unwrap_or_else(|| panic!("{} is not an allocatable register", reg));
        let file = if reg.is_float() {
            RegFile::Float
        } else {
            RegFile::Int
        };
        (file, index)
    }
}
