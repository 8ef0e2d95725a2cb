//! A small MIPS-subset interpreter for end-to-end tests
//!
//! Executes the instruction buffer the backend produces, without going
//! through assembly text. Covers exactly the instructions the generator
//! emits plus the syscalls the runtime provides (print int/float/string,
//! read int/float). The `build` module holds shorthand constructors for
//! the type-annotated trees the backend consumes.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use cmm_codegen::{AsmInst, Reg};

const HALT: i32 = -1;
const STACK_TOP: i32 = 0x7fff_f000;
const DATA_BASE: i32 = 0x1000_0000;
const STEP_LIMIT: usize = 2_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Int(i32),
    Float(f32),
    Str(String),
}

pub struct Machine<'a> {
    code: &'a [AsmInst],
    labels: HashMap<String, usize>,
    data: HashMap<String, i32>,
    strings: HashMap<i32, String>,
    regs: HashMap<Reg, i32>,
    fregs: HashMap<u8, f32>,
    mem: HashMap<i32, i32>,
    lo: i32,
    flag: bool,
    input: VecDeque<f64>,
    pub output: Vec<Output>,
}

impl<'a> Machine<'a> {
    pub fn load(code: &'a [AsmInst]) -> Self {
        let mut labels = HashMap::new();
        let mut data = HashMap::new();
        let mut strings = HashMap::new();
        let mut mem = HashMap::new();
        let mut next_addr = DATA_BASE;

        for (pc, inst) in code.iter().enumerate() {
            match inst {
                AsmInst::Label(name) => {
                    labels.insert(name.clone(), pc);
                }
                AsmInst::Word(name, value) => {
                    data.insert(name.clone(), next_addr);
                    mem.insert(next_addr, *value);
                    next_addr += 4;
                }
                AsmInst::FloatWord(name, value) => {
                    data.insert(name.clone(), next_addr);
                    mem.insert(next_addr, value.to_bits() as i32);
                    next_addr += 4;
                }
                AsmInst::Space(name, bytes) => {
                    data.insert(name.clone(), next_addr);
                    next_addr += *bytes as i32;
                }
                AsmInst::Asciiz(name, text) => {
                    data.insert(name.clone(), next_addr);
                    strings.insert(next_addr, text.clone());
                    next_addr += 4;
                }
                _ => {}
            }
        }

        Self {
            code,
            labels,
            data,
            strings,
            regs: HashMap::new(),
            fregs: HashMap::new(),
            mem,
            lo: 0,
            flag: false,
            input: VecDeque::new(),
            output: Vec::new(),
        }
    }

    pub fn with_input(mut self, values: &[f64]) -> Self {
        self.input = values.iter().copied().collect();
        self
    }

    fn get(&self, reg: Reg) -> i32 {
        match reg {
            Reg::Zero => 0,
            Reg::F(n) => self.fregs.get(&n).copied().unwrap_or(0.0).to_bits() as i32,
            _ => self.regs.get(&reg).copied().unwrap_or(0),
        }
    }

    fn set(&mut self, reg: Reg, value: i32) {
        match reg {
            Reg::Zero => {}
            Reg::F(n) => {
                self.fregs.insert(n, f32::from_bits(value as u32));
            }
            _ => {
                self.regs.insert(reg, value);
            }
        }
    }

    fn getf(&self, reg: Reg) -> f32 {
        match reg {
            Reg::F(n) => self.fregs.get(&n).copied().unwrap_or(0.0),
            other => panic!("{} is not a float register", other),
        }
    }

    fn setf(&mut self, reg: Reg, value: f32) {
        match reg {
            Reg::F(n) => {
                self.fregs.insert(n, value);
            }
            other => panic!("{} is not a float register", other),
        }
    }

    fn load_word(&self, addr: i32) -> i32 {
        assert_eq!(addr % 4, 0, "unaligned load at {:#x}", addr);
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    fn store_word(&mut self, addr: i32, value: i32) {
        assert_eq!(addr % 4, 0, "unaligned store at {:#x}", addr);
        self.mem.insert(addr, value);
    }

    fn addr_of(&self, label: &str) -> i32 {
        *self
            .data
            .get(label)
            .unwrap_or_else(|| panic!("undefined data label '{}'", label))
    }

    fn target(&self, label: &str) -> usize {
        *self
            .labels
            .get(label)
            .unwrap_or_else(|| panic!("undefined code label '{}'", label))
    }

    fn syscall(&mut self) {
        match self.get(Reg::V0) {
            1 => self.output.push(Output::Int(self.get(Reg::A0))),
            2 => self.output.push(Output::Float(self.getf(Reg::F(12)))),
            4 => {
                let addr = self.get(Reg::A0);
                let text = self
                    .strings
                    .get(&addr)
                    .unwrap_or_else(|| panic!("no string at {:#x}", addr))
                    .clone();
                self.output.push(Output::Str(text));
            }
            5 => {
                let value = self.input.pop_front().expect("input exhausted") as i32;
                self.set(Reg::V0, value);
            }
            6 => {
                let value = self.input.pop_front().expect("input exhausted") as f32;
                self.setf(Reg::F(0), value);
            }
            other => panic!("unsupported syscall {}", other),
        }
    }

    /// Run from `main` until it returns to the harness
    pub fn run(&mut self) {
        self.set(Reg::Sp, STACK_TOP);
        self.set(Reg::Fp, 0);
        self.set(Reg::Ra, HALT);
        let mut pc = self.target("main");
        let mut steps = 0usize;
        let code = self.code;

        loop {
            steps += 1;
            assert!(steps < STEP_LIMIT, "step limit exceeded, runaway program");
            let inst = &code[pc];
            pc += 1;
            match inst {
                AsmInst::Li(rd, imm) => self.set(*rd, *imm),
                AsmInst::LiS(fd, imm) => self.setf(*fd, *imm),
                AsmInst::La(rd, label, off) => {
                    let addr = self.addr_of(label) + off;
                    self.set(*rd, addr);
                }
                AsmInst::Lw(rd, off, base) => {
                    let addr = self.get(*base) + off;
                    let word = self.load_word(addr);
                    self.set(*rd, word);
                }
                AsmInst::Sw(rs, off, base) => {
                    let addr = self.get(*base) + off;
                    self.store_word(addr, self.get(*rs));
                }
                AsmInst::LwSym(rd, label, off) => {
                    let word = self.load_word(self.addr_of(label) + off);
                    self.set(*rd, word);
                }
                AsmInst::SwSym(rs, label, off) => {
                    let addr = self.addr_of(label) + off;
                    self.store_word(addr, self.get(*rs));
                }
                AsmInst::Ls(fd, off, base) => {
                    let addr = self.get(*base) + off;
                    let bits = self.load_word(addr);
                    self.setf(*fd, f32::from_bits(bits as u32));
                }
                AsmInst::Ss(fs, off, base) => {
                    let addr = self.get(*base) + off;
                    self.store_word(addr, self.getf(*fs).to_bits() as i32);
                }
                AsmInst::LsSym(fd, label, off) => {
                    let bits = self.load_word(self.addr_of(label) + off);
                    self.setf(*fd, f32::from_bits(bits as u32));
                }
                AsmInst::SsSym(fs, label, off) => {
                    let addr = self.addr_of(label) + off;
                    self.store_word(addr, self.getf(*fs).to_bits() as i32);
                }
                AsmInst::Add(rd, rs, rt) => {
                    self.set(*rd, self.get(*rs).wrapping_add(self.get(*rt)))
                }
                AsmInst::Addi(rd, rs, imm) => self.set(*rd, self.get(*rs).wrapping_add(*imm)),
                AsmInst::AddiSym(rd, rs, label) => {
                    let addr = self.addr_of(label);
                    self.set(*rd, self.get(*rs).wrapping_add(addr));
                }
                AsmInst::Sub(rd, rs, rt) => {
                    self.set(*rd, self.get(*rs).wrapping_sub(self.get(*rt)))
                }
                AsmInst::Mult(rs, rt) => self.lo = self.get(*rs).wrapping_mul(self.get(*rt)),
                AsmInst::Div(rs, rt) => self.lo = self.get(*rs) / self.get(*rt),
                AsmInst::Mflo(rd) => self.set(*rd, self.lo),
                AsmInst::Move(rd, rs) => self.set(*rd, self.get(*rs)),
                AsmInst::Seq(rd, rs, rt) => {
                    self.set(*rd, (self.get(*rs) == self.get(*rt)) as i32)
                }
                AsmInst::Sne(rd, rs, rt) => {
                    self.set(*rd, (self.get(*rs) != self.get(*rt)) as i32)
                }
                AsmInst::Slt(rd, rs, rt) => self.set(*rd, (self.get(*rs) < self.get(*rt)) as i32),
                AsmInst::Sle(rd, rs, rt) => {
                    self.set(*rd, (self.get(*rs) <= self.get(*rt)) as i32)
                }
                AsmInst::Sgt(rd, rs, rt) => self.set(*rd, (self.get(*rs) > self.get(*rt)) as i32),
                AsmInst::Sge(rd, rs, rt) => {
                    self.set(*rd, (self.get(*rs) >= self.get(*rt)) as i32)
                }
                AsmInst::AddS(fd, fs, ft) => self.setf(*fd, self.getf(*fs) + self.getf(*ft)),
                AsmInst::SubS(fd, fs, ft) => self.setf(*fd, self.getf(*fs) - self.getf(*ft)),
                AsmInst::MulS(fd, fs, ft) => self.setf(*fd, self.getf(*fs) * self.getf(*ft)),
                AsmInst::DivS(fd, fs, ft) => self.setf(*fd, self.getf(*fs) / self.getf(*ft)),
                AsmInst::MovS(fd, fs) => self.setf(*fd, self.getf(*fs)),
                AsmInst::NegS(fd, fs) => self.setf(*fd, -self.getf(*fs)),
                AsmInst::CEqS(fs, ft) => self.flag = self.getf(*fs) == self.getf(*ft),
                AsmInst::CLtS(fs, ft) => self.flag = self.getf(*fs) < self.getf(*ft),
                AsmInst::CLeS(fs, ft) => self.flag = self.getf(*fs) <= self.getf(*ft),
                AsmInst::Bc1f(label) => {
                    if !self.flag {
                        pc = self.target(label);
                    }
                }
                AsmInst::Mtc1(rs, fd) => {
                    let bits = self.get(*rs);
                    self.setf(*fd, f32::from_bits(bits as u32));
                }
                AsmInst::Mfc1(rd, fs) => {
                    let bits = self.getf(*fs).to_bits() as i32;
                    self.set(*rd, bits);
                }
                AsmInst::CvtSW(fd, fs) => {
                    let int_bits = self.getf(*fs).to_bits() as i32;
                    self.setf(*fd, int_bits as f32);
                }
                AsmInst::CvtWS(fd, fs) => {
                    let truncated = self.getf(*fs) as i32;
                    self.setf(*fd, f32::from_bits(truncated as u32));
                }
                AsmInst::Beqz(rs, label) => {
                    if self.get(*rs) == 0 {
                        pc = self.target(label);
                    }
                }
                AsmInst::Bnez(rs, label) => {
                    if self.get(*rs) != 0 {
                        pc = self.target(label);
                    }
                }
                AsmInst::J(label) => pc = self.target(label),
                AsmInst::Jal(label) => {
                    self.set(Reg::Ra, pc as i32);
                    pc = self.target(label);
                }
                AsmInst::Jr(rs) => {
                    let ret = self.get(*rs);
                    if ret == HALT {
                        return;
                    }
                    pc = ret as usize;
                }
                AsmInst::Syscall => self.syscall(),
                AsmInst::Label(_)
                | AsmInst::Comment(_)
                | AsmInst::Text
                | AsmInst::Data
                | AsmInst::Word(_, _)
                | AsmInst::FloatWord(_, _)
                | AsmInst::Space(_, _)
                | AsmInst::Asciiz(_, _) => {}
            }
        }
    }

    /// Word value of a global after the run
    pub fn global_word(&self, label: &str) -> i32 {
        self.load_word(self.addr_of(label))
    }

    pub fn ints(&self) -> Vec<i32> {
        self.output
            .iter()
            .filter_map(|o| match o {
                Output::Int(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn floats(&self) -> Vec<f32> {
        self.output
            .iter()
            .filter_map(|o| match o {
                Output::Float(v) => Some(*v),
                _ => None,
            })
            .collect()
    }
}

pub fn run_with_input<'a>(code: &'a [AsmInst], input: &[f64]) -> Machine<'a> {
    let mut machine = Machine::load(code).with_input(input);
    machine.run();
    machine
}

pub fn run(code: &[AsmInst]) -> Machine<'_> {
    run_with_input(code, &[])
}

pub fn compile(ast: &cmm_frontend::Ast) -> Vec<AsmInst> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut symtab = cmm_frontend::SymbolTable::new();
    cmm_backend::lower_program(ast, &mut symtab).expect("lowering failed")
}

/// Compile with shrunken register pools to force spills
pub fn compile_with_pools(
    ast: &cmm_frontend::Ast,
    int_slots: usize,
    float_slots: usize,
) -> Vec<AsmInst> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut symtab = cmm_frontend::SymbolTable::new();
    let ctx = cmm_backend::CodegenContext::with_pool_capacity(ast.len(), int_slots, float_slots);
    cmm_backend::lower_program_with(ctx, ast, &mut symtab).expect("lowering failed")
}

/// Shorthand constructors for type-annotated trees
pub mod build {
    use cmm_common::{FunctionSignature, NodeId, PrimitiveType, TypeDescriptor};
    use cmm_frontend::ast::{Ast, BinaryOp, Constant, NodeKind, UnaryOp};

    pub fn int(ast: &mut Ast, value: i32) -> NodeId {
        ast.int_const(value)
    }

    pub fn float(ast: &mut Ast, value: f32) -> NodeId {
        ast.float_const(value)
    }

    /// Scalar int variable reference
    pub fn var(ast: &mut Ast, name: &str) -> NodeId {
        ast.ident(name, PrimitiveType::Int)
    }

    pub fn fvar(ast: &mut Ast, name: &str) -> NodeId {
        ast.ident(name, PrimitiveType::Float)
    }

    /// Array element reference with subscript expressions
    pub fn index(ast: &mut Ast, name: &str, ty: PrimitiveType, subs: &[NodeId]) -> NodeId {
        let node = ast.ident(name, ty);
        ast.set_children(node, subs);
        node
    }

    pub fn bin(
        ast: &mut Ast,
        op: BinaryOp,
        ty: PrimitiveType,
        lhs: NodeId,
        rhs: NodeId,
    ) -> NodeId {
        let node = ast.add_typed(NodeKind::Binary(op), ty);
        ast.set_children(node, &[lhs, rhs]);
        node
    }

    pub fn unary(ast: &mut Ast, op: UnaryOp, ty: PrimitiveType, operand: NodeId) -> NodeId {
        let node = ast.add_typed(NodeKind::Unary(op), ty);
        ast.set_children(node, &[operand]);
        node
    }

    pub fn assign(ast: &mut Ast, lhs: NodeId, rhs: NodeId) -> NodeId {
        let ty = ast.type_of(lhs);
        let node = ast.add_typed(NodeKind::Assign, ty);
        ast.set_children(node, &[lhs, rhs]);
        node
    }

    pub fn call(ast: &mut Ast, name: &str, ret: PrimitiveType, args: &[NodeId]) -> NodeId {
        let callee = ast.ident(name, ret);
        let arg_list = ast.add(NodeKind::ArgList);
        ast.set_children(arg_list, args);
        let node = ast.add_typed(NodeKind::Call, ret);
        ast.set_children(node, &[callee, arg_list]);
        node
    }

    pub fn write_expr(ast: &mut Ast, arg: NodeId) -> NodeId {
        let callee = ast.ident("write", PrimitiveType::Int);
        let arg_list = ast.add(NodeKind::ArgList);
        ast.set_children(arg_list, &[arg]);
        let node = ast.add(NodeKind::Call);
        ast.set_children(node, &[callee, arg_list]);
        node
    }

    pub fn write_str(ast: &mut Ast, text: &str) -> NodeId {
        let arg = ast.add(NodeKind::Const(Constant::Str(text.to_string())));
        write_expr(ast, arg)
    }

    pub fn ret(ast: &mut Ast, value: Option<NodeId>) -> NodeId {
        let node = ast.add(NodeKind::Return);
        if let Some(value) = value {
            ast.set_children(node, &[value]);
        }
        node
    }

    pub fn if_stmt(ast: &mut Ast, cond: NodeId, then: NodeId, els: Option<NodeId>) -> NodeId {
        let els = els.unwrap_or_else(|| ast.add(NodeKind::Empty));
        let node = ast.add(NodeKind::If);
        ast.set_children(node, &[cond, then, els]);
        node
    }

    pub fn while_stmt(ast: &mut Ast, cond: NodeId, body: NodeId) -> NodeId {
        let node = ast.add(NodeKind::While);
        ast.set_children(node, &[cond, body]);
        node
    }

    pub fn for_stmt(
        ast: &mut Ast,
        init: &[NodeId],
        cond: &[NodeId],
        step: &[NodeId],
        body: NodeId,
    ) -> NodeId {
        let init_list = ast.add(NodeKind::ExprList);
        ast.set_children(init_list, init);
        let cond_list = ast.add(NodeKind::ExprList);
        ast.set_children(cond_list, cond);
        let step_list = ast.add(NodeKind::ExprList);
        ast.set_children(step_list, step);
        let node = ast.add(NodeKind::For);
        ast.set_children(node, &[init_list, cond_list, step_list, body]);
        node
    }

    pub fn decl(ast: &mut Ast, name: &str, ty: TypeDescriptor, init: Option<NodeId>) -> NodeId {
        let node = ast.add(NodeKind::VarDecl {
            name: name.to_string(),
            ty,
        });
        if let Some(init) = init {
            ast.set_children(node, &[init]);
        }
        node
    }

    pub fn int_scalar() -> TypeDescriptor {
        TypeDescriptor::scalar(PrimitiveType::Int)
    }

    pub fn float_scalar() -> TypeDescriptor {
        TypeDescriptor::scalar(PrimitiveType::Float)
    }

    pub fn block(ast: &mut Ast, decls: &[NodeId], stmts: &[NodeId]) -> NodeId {
        let node = ast.add(NodeKind::Block);
        let mut sections = Vec::new();
        if !decls.is_empty() {
            let decl_list = ast.add(NodeKind::VarDeclList);
            ast.set_children(decl_list, decls);
            sections.push(decl_list);
        }
        let stmt_list = ast.add(NodeKind::StmtList);
        ast.set_children(stmt_list, stmts);
        sections.push(stmt_list);
        ast.set_children(node, &sections);
        node
    }

    pub fn func(
        ast: &mut Ast,
        name: &str,
        ret: PrimitiveType,
        params: &[(&str, TypeDescriptor)],
        body: NodeId,
    ) -> NodeId {
        let signature = FunctionSignature::new(
            ret,
            params.iter().map(|(_, ty)| ty.clone()).collect(),
        );
        let node = ast.add(NodeKind::FuncDecl {
            name: name.to_string(),
            signature,
        });
        let param_list = ast.add(NodeKind::ParamList);
        let param_nodes: Vec<NodeId> = params
            .iter()
            .map(|(pname, ty)| {
                ast.add(NodeKind::Param {
                    name: pname.to_string(),
                    ty: ty.clone(),
                })
            })
            .collect();
        ast.set_children(param_list, &param_nodes);
        ast.set_children(node, &[param_list, body]);
        node
    }

    /// Wrap top-level items into the program root
    pub fn program(ast: &mut Ast, items: &[NodeId]) {
        let root = ast.add(NodeKind::Program);
        ast.set_children(root, items);
        ast.set_root(root);
    }

    /// Global declaration list
    pub fn globals(ast: &mut Ast, decls: &[NodeId]) -> NodeId {
        let list = ast.add(NodeKind::VarDeclList);
        ast.set_children(list, decls);
        list
    }
}
