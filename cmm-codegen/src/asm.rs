//! MIPS Assembly Instruction Definitions
//!
//! This module defines the register model and the instruction/directive set
//! emitted by the code generator. Instructions are kept in an in-memory
//! buffer and serialized once at the end of a compilation run.

use std::fmt;

/// MIPS register model
///
/// Two independent register files are visible to the allocator:
/// - integer: `$s0`-`$s7` (callee-saved, the allocatable pool)
/// - float: `$f4`-`$f11` (the allocatable pool); `$f0` holds float return
///   values and `$f12` is the float syscall argument
///
/// The remaining variants are the fixed-role registers the generated code
/// relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    /// Hardwired zero
    Zero,
    /// Integer return value / syscall selector
    V0,
    /// First syscall argument
    A0,
    /// Global pointer (saved alongside `$s0`-`$s7`)
    Gp,
    /// Stack pointer
    Sp,
    /// Frame pointer
    Fp,
    /// Return address
    Ra,
    /// Saved integer register `$s0`-`$s7`
    S(u8),
    /// Float register `$f0`-`$f31`
    F(u8),
}

impl Reg {
    pub fn is_float(&self) -> bool {
        matches!(self, Reg::F(_))
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::Zero => write!(f, "$0"),
            Reg::V0 => write!(f, "$v0"),
            Reg::A0 => write!(f, "$a0"),
            Reg::Gp => write!(f, "$gp"),
            Reg::Sp => write!(f, "$sp"),
            Reg::Fp => write!(f, "$fp"),
            Reg::Ra => write!(f, "$ra"),
            Reg::S(n) => write!(f, "$s{}", n),
            Reg::F(n) => write!(f, "$f{}", n),
        }
    }
}

/// MIPS instructions and assembler directives
///
/// This enum covers exactly the subset of MIPS the backend emits. Memory
/// operands are `(register, byte offset, base register)`; label-addressed
/// operands carry the symbol plus a compile-time byte offset.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmInst {
    // Immediate and address loads
    Li(Reg, i32),            // li rd, imm
    LiS(Reg, f32),           // li.s fd, imm
    La(Reg, String, i32),    // la rd, label+off

    // Memory (integer)
    Lw(Reg, i32, Reg),       // lw rd, off(base)
    Sw(Reg, i32, Reg),       // sw rs, off(base)
    LwSym(Reg, String, i32), // lw rd, label+off
    SwSym(Reg, String, i32), // sw rs, label+off

    // Memory (float)
    Ls(Reg, i32, Reg),       // l.s fd, off(base)
    Ss(Reg, i32, Reg),       // s.s fs, off(base)
    LsSym(Reg, String, i32), // l.s fd, label+off
    SsSym(Reg, String, i32), // s.s fs, label+off

    // Integer arithmetic
    Add(Reg, Reg, Reg),      // add rd, rs, rt
    Addi(Reg, Reg, i32),     // addi rd, rs, imm
    AddiSym(Reg, Reg, String), // addi rd, rs, label (address arithmetic)
    Sub(Reg, Reg, Reg),      // sub rd, rs, rt
    Mult(Reg, Reg),          // mult rs, rt (result in lo)
    Div(Reg, Reg),           // div rs, rt (quotient in lo)
    Mflo(Reg),               // rd = lo
    Move(Reg, Reg),          // rd = rs

    // Integer relational (0/1 result)
    Seq(Reg, Reg, Reg),
    Sne(Reg, Reg, Reg),
    Slt(Reg, Reg, Reg),
    Sle(Reg, Reg, Reg),
    Sgt(Reg, Reg, Reg),
    Sge(Reg, Reg, Reg),

    // Float arithmetic
    AddS(Reg, Reg, Reg),
    SubS(Reg, Reg, Reg),
    MulS(Reg, Reg, Reg),
    DivS(Reg, Reg, Reg),
    MovS(Reg, Reg),
    NegS(Reg, Reg),

    // Float compare + branch on the float condition flag
    CEqS(Reg, Reg),          // c.eq.s fs, ft
    CLtS(Reg, Reg),          // c.lt.s fs, ft
    CLeS(Reg, Reg),          // c.le.s fs, ft
    Bc1f(String),            // branch if the condition flag is false

    // Conversions / register-file moves
    Mtc1(Reg, Reg),          // mtc1 rs, fd (raw bits)
    Mfc1(Reg, Reg),          // mfc1 rd, fs (raw bits)
    CvtSW(Reg, Reg),         // cvt.s.w fd, fs (int bits -> float)
    CvtWS(Reg, Reg),         // cvt.w.s fd, fs (float -> int bits)

    // Control flow
    Beqz(Reg, String),       // branch if zero
    Bnez(Reg, String),       // branch if nonzero
    J(String),               // unconditional jump
    Jal(String),             // call
    Jr(Reg),                 // indirect jump (return)
    Syscall,

    // Assembler directives and pseudo-instructions
    Label(String),
    Comment(String),
    Text,                    // .text
    Data,                    // .data
    Word(String, i32),       // label: .word value
    FloatWord(String, f32),  // label: .float value
    Space(String, u32),      // label: .space bytes
    Asciiz(String, String),  // label: .asciiz "literal"
}

impl fmt::Display for AsmInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmInst::Li(rd, imm) => write!(f, "li {}, {}", rd, imm),
            AsmInst::LiS(fd, imm) => write!(f, "li.s {}, {:?}", fd, imm),
            AsmInst::La(rd, label, off) => write!(f, "la {}, {}+{}", rd, label, off),

            AsmInst::Lw(rd, off, base) => write!(f, "lw {}, {}({})", rd, off, base),
            AsmInst::Sw(rs, off, base) => write!(f, "sw {}, {}({})", rs, off, base),
            AsmInst::LwSym(rd, label, off) => write!(f, "lw {}, {}+{}", rd, label, off),
            AsmInst::SwSym(rs, label, off) => write!(f, "sw {}, {}+{}", rs, label, off),

            AsmInst::Ls(fd, off, base) => write!(f, "l.s {}, {}({})", fd, off, base),
            AsmInst::Ss(fs, off, base) => write!(f, "s.s {}, {}({})", fs, off, base),
            AsmInst::LsSym(fd, label, off) => write!(f, "l.s {}, {}+{}", fd, label, off),
            AsmInst::SsSym(fs, label, off) => write!(f, "s.s {}, {}+{}", fs, label, off),

            AsmInst::Add(rd, rs, rt) => write!(f, "add {}, {}, {}", rd, rs, rt),
            AsmInst::Addi(rd, rs, imm) => write!(f, "addi {}, {}, {}", rd, rs, imm),
            AsmInst::AddiSym(rd, rs, label) => write!(f, "addi {}, {}, {}", rd, rs, label),
            AsmInst::Sub(rd, rs, rt) => write!(f, "sub {}, {}, {}", rd, rs, rt),
            AsmInst::Mult(rs, rt) => write!(f, "mult {}, {}", rs, rt),
            AsmInst::Div(rs, rt) => write!(f, "div {}, {}", rs, rt),
            AsmInst::Mflo(rd) => write!(f, "mflo {}", rd),
            AsmInst::Move(rd, rs) => write!(f, "move {}, {}", rd, rs),

            AsmInst::Seq(rd, rs, rt) => write!(f, "seq {}, {}, {}", rd, rs, rt),
            AsmInst::Sne(rd, rs, rt) => write!(f, "sne {}, {}, {}", rd, rs, rt),
            AsmInst::Slt(rd, rs, rt) => write!(f, "slt {}, {}, {}", rd, rs, rt),
            AsmInst::Sle(rd, rs, rt) => write!(f, "sle {}, {}, {}", rd, rs, rt),
            AsmInst::Sgt(rd, rs, rt) => write!(f, "sgt {}, {}, {}", rd, rs, rt),
            AsmInst::Sge(rd, rs, rt) => write!(f, "sge {}, {}, {}", rd, rs, rt),

            AsmInst::AddS(fd, fs, ft) => write!(f, "add.s {}, {}, {}", fd, fs, ft),
            AsmInst::SubS(fd, fs, ft) => write!(f, "sub.s {}, {}, {}", fd, fs, ft),
            AsmInst::MulS(fd, fs, ft) => write!(f, "mul.s {}, {}, {}", fd, fs, ft),
            AsmInst::DivS(fd, fs, ft) => write!(f, "div.s {}, {}, {}", fd, fs, ft),
            AsmInst::MovS(fd, fs) => write!(f, "mov.s {}, {}", fd, fs),
            AsmInst::NegS(fd, fs) => write!(f, "neg.s {}, {}", fd, fs),

            AsmInst::CEqS(fs, ft) => write!(f, "c.eq.s {}, {}", fs, ft),
            AsmInst::CLtS(fs, ft) => write!(f, "c.lt.s {}, {}", fs, ft),
            AsmInst::CLeS(fs, ft) => write!(f, "c.le.s {}, {}", fs, ft),
            AsmInst::Bc1f(label) => write!(f, "bc1f {}", label),

            AsmInst::Mtc1(rs, fd) => write!(f, "mtc1 {}, {}", rs, fd),
            AsmInst::Mfc1(rd, fs) => write!(f, "mfc1 {}, {}", rd, fs),
            AsmInst::CvtSW(fd, fs) => write!(f, "cvt.s.w {}, {}", fd, fs),
            AsmInst::CvtWS(fd, fs) => write!(f, "cvt.w.s {}, {}", fd, fs),

            AsmInst::Beqz(rs, label) => write!(f, "beqz {}, {}", rs, label),
            AsmInst::Bnez(rs, label) => write!(f, "bnez {}, {}", rs, label),
            AsmInst::J(label) => write!(f, "j {}", label),
            AsmInst::Jal(label) => write!(f, "jal {}", label),
            AsmInst::Jr(rs) => write!(f, "jr {}", rs),
            AsmInst::Syscall => write!(f, "syscall"),

            AsmInst::Label(label) => write!(f, "{}:", label),
            AsmInst::Comment(text) => write!(f, "# {}", text),
            AsmInst::Text => write!(f, ".text"),
            AsmInst::Data => write!(f, ".data"),
            AsmInst::Word(label, value) => write!(f, "{}: .word {}", label, value),
            AsmInst::FloatWord(label, value) => write!(f, "{}: .float {:?}", label, value),
            AsmInst::Space(label, bytes) => write!(f, "{}: .space {}", label, bytes),
            AsmInst::Asciiz(label, text) => {
                write!(f, "{}: .asciiz \"{}\"", label, text.escape_default())
            }
        }
    }
}
