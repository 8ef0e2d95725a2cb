//! Expression lowering
//!
//! `lower_expr` walks an expression subtree, emits instructions and leaves a
//! location descriptor on every node it visits. Identifiers resolve to
//! memory locations without loading; `value_of` materializes a value into a
//! register at the point of use and rewrites the descriptor accordingly.
//! Exactly one register stays live per sub-result not yet consumed by its
//! parent.

use crate::addr::{self, ArrayIndex};
use crate::context::CodegenContext;
use crate::function;
use crate::location::{IndexMode, Location};
use cmm_codegen::{AsmInst, Reg, RegFile};
use cmm_common::{CompilerError, NodeId, PrimitiveType};
use cmm_frontend::ast::{Ast, BinaryOp, Constant, NodeKind, UnaryOp};
use cmm_frontend::{Storage, SymbolTable};

/// Emit the load matching the value's register file
fn load(ctx: &mut CodegenContext, ty: PrimitiveType, dest: Reg, offset: i32, base: Reg) {
    match ty {
        PrimitiveType::Int => ctx.emit(AsmInst::Lw(dest, offset, base)),
        PrimitiveType::Float => ctx.emit(AsmInst::Ls(dest, offset, base)),
    }
}

/// Emit the store matching the value's register file
fn store(ctx: &mut CodegenContext, ty: PrimitiveType, src: Reg, offset: i32, base: Reg) {
    match ty {
        PrimitiveType::Int => ctx.emit(AsmInst::Sw(src, offset, base)),
        PrimitiveType::Float => ctx.emit(AsmInst::Ss(src, offset, base)),
    }
}

/// Free an operand register after its consumer has been bound. When the
/// pool was full the consumer may have been handed the operand's own slot;
/// releasing it then would free the result, so that case is skipped.
fn release_operand(ctx: &mut CodegenContext, operand: Reg, dest: Reg) {
    if operand != dest {
        ctx.release(operand);
    }
}

pub(crate) fn lower_expr(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    match ast.node(node).kind.clone() {
        NodeKind::Const(Constant::Int(value)) => {
            let reg = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::Li(reg, value));
            ctx.bind(reg, node);
            Ok(())
        }
        NodeKind::Const(Constant::Float(value)) => {
            let reg = ctx.acquire(RegFile::Float);
            ctx.emit(AsmInst::LiS(reg, value));
            ctx.bind(reg, node);
            Ok(())
        }
        NodeKind::Const(Constant::Str(_)) => Err(CompilerError::Internal(
            "string literal outside a write() argument".to_string(),
        )),
        NodeKind::Ident(name) => lower_ident(ctx, ast, symtab, node, &name),
        NodeKind::Unary(op) => lower_unary(ctx, ast, symtab, node, op),
        NodeKind::Binary(op) => lower_binary(ctx, ast, symtab, node, op),
        NodeKind::Assign => lower_assign(ctx, ast, symtab, node),
        NodeKind::Call => function::lower_call_expr(ctx, ast, symtab, node),
        other => Err(CompilerError::Internal(format!(
            "node kind {:?} is not an expression",
            other
        ))),
    }
}

/// Resolve an identifier to its memory location; never loads eagerly
fn lower_ident(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
    name: &str,
) -> Result<(), CompilerError> {
    let symbol = symtab
        .lookup(name)
        .ok_or_else(|| CompilerError::UnresolvedSymbol(name.to_string()))?;
    let ty = symbol
        .var_type()
        .ok_or_else(|| CompilerError::Internal(format!("'{}' is not a variable", name)))?
        .clone();
    let storage = symbol.storage.clone().ok_or_else(|| {
        CompilerError::Internal(format!("variable '{}' has no assigned storage", name))
    })?;

    let index = addr::resolve_subscripts(ctx, ast, symtab, node, &ty)?;
    let loc = match (storage, index) {
        (Storage::Frame { offset }, ArrayIndex::Static(off)) => Location::Stack {
            // Element addresses grow upward from the slot's depth.
            offset: offset - off,
            index: IndexMode::Static,
        },
        (Storage::Frame { offset }, ArrayIndex::Dynamic(acc)) => Location::Stack {
            offset,
            index: IndexMode::Dynamic(acc),
        },
        (Storage::Global { label }, ArrayIndex::Static(off)) => Location::Global {
            label,
            offset: off,
            index: IndexMode::Static,
        },
        (Storage::Global { label }, ArrayIndex::Dynamic(acc)) => Location::Global {
            label,
            offset: 0,
            index: IndexMode::Dynamic(acc),
        },
        (Storage::Indirect { pointer_offset }, ArrayIndex::Static(off)) => Location::Indirect {
            pointer_offset,
            offset: off,
            index: IndexMode::Static,
        },
        (Storage::Indirect { pointer_offset }, ArrayIndex::Dynamic(acc)) => Location::Indirect {
            pointer_offset,
            offset: 0,
            index: IndexMode::Dynamic(acc),
        },
    };
    ctx.set_loc(node, loc);
    Ok(())
}

/// Materialize a node's value into a register, loading from memory on
/// demand. The descriptor is rebound to the register; a dynamic-offset
/// accumulator is consumed and released here.
pub(crate) fn value_of(
    ctx: &mut CodegenContext,
    ast: &Ast,
    node: NodeId,
) -> Result<Reg, CompilerError> {
    let loc = ctx
        .loc(node)
        .cloned()
        .ok_or(CompilerError::MissingLocation(node))?;
    let ty = ast.type_of(node);

    match loc {
        Location::Reg(reg) => Ok(reg),
        Location::Stack { offset, index } => {
            let dest = ctx.acquire_for(ty);
            match index {
                IndexMode::Static => load(ctx, ty, dest, -offset, Reg::Fp),
                IndexMode::Dynamic(acc_node) => {
                    let acc = value_of(ctx, ast, acc_node)?;
                    ctx.emit(AsmInst::Add(acc, acc, Reg::Fp));
                    load(ctx, ty, dest, -offset, acc);
                    ctx.release(acc);
                }
            }
            ctx.bind(dest, node);
            Ok(dest)
        }
        Location::Global {
            label,
            offset,
            index,
        } => {
            let dest = ctx.acquire_for(ty);
            match index {
                IndexMode::Static => match ty {
                    PrimitiveType::Int => ctx.emit(AsmInst::LwSym(dest, label, offset)),
                    PrimitiveType::Float => ctx.emit(AsmInst::LsSym(dest, label, offset)),
                },
                IndexMode::Dynamic(acc_node) => {
                    let acc = value_of(ctx, ast, acc_node)?;
                    ctx.emit(AsmInst::AddiSym(acc, acc, label));
                    load(ctx, ty, dest, 0, acc);
                    ctx.release(acc);
                }
            }
            ctx.bind(dest, node);
            Ok(dest)
        }
        Location::Indirect {
            pointer_offset,
            offset,
            index,
        } => {
            let ptr = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::Lw(ptr, pointer_offset, Reg::Fp));
            let dest = ctx.acquire_for(ty);
            match index {
                IndexMode::Static => load(ctx, ty, dest, offset, ptr),
                IndexMode::Dynamic(acc_node) => {
                    let acc = value_of(ctx, ast, acc_node)?;
                    ctx.emit(AsmInst::Add(ptr, ptr, acc));
                    ctx.release(acc);
                    load(ctx, ty, dest, 0, ptr);
                }
            }
            ctx.release(ptr);
            ctx.bind(dest, node);
            Ok(dest)
        }
    }
}

/// Convert an integer value to float, rebinding `node` to the new register
pub(crate) fn int_to_float(ctx: &mut CodegenContext, node: NodeId, src: Reg) -> Reg {
    let dest = ctx.acquire(RegFile::Float);
    ctx.emit(AsmInst::Mtc1(src, dest));
    ctx.emit(AsmInst::CvtSW(dest, dest));
    ctx.release(src);
    ctx.bind(dest, node);
    dest
}

/// Convert a float value to int (truncating), rebinding `node`
pub(crate) fn float_to_int(ctx: &mut CodegenContext, node: NodeId, src: Reg) -> Reg {
    let dest = ctx.acquire(RegFile::Int);
    ctx.emit(AsmInst::CvtWS(src, src));
    ctx.emit(AsmInst::Mfc1(dest, src));
    ctx.release(src);
    ctx.bind(dest, node);
    dest
}

/// Coerce a materialized value to `target`, a no-op when the types match
pub(crate) fn coerce(
    ctx: &mut CodegenContext,
    node: NodeId,
    reg: Reg,
    from: PrimitiveType,
    target: PrimitiveType,
) -> Reg {
    match (from, target) {
        (PrimitiveType::Int, PrimitiveType::Float) => int_to_float(ctx, node, reg),
        (PrimitiveType::Float, PrimitiveType::Int) => float_to_int(ctx, node, reg),
        _ => reg,
    }
}

fn lower_unary(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
    op: UnaryOp,
) -> Result<(), CompilerError> {
    let child = ast
        .first_child(node)
        .ok_or_else(|| CompilerError::Internal("unary operator without operand".to_string()))?;
    lower_expr(ctx, ast, symtab, child)?;
    let src = value_of(ctx, ast, child)?;

    match ast.type_of(child) {
        PrimitiveType::Int => {
            let dest = ctx.acquire(RegFile::Int);
            match op {
                UnaryOp::Plus => ctx.emit(AsmInst::Add(dest, src, Reg::Zero)),
                UnaryOp::Minus => ctx.emit(AsmInst::Sub(dest, Reg::Zero, src)),
                UnaryOp::Not => ctx.emit(AsmInst::Seq(dest, src, Reg::Zero)),
            }
            ctx.bind(dest, node);
            release_operand(ctx, src, dest);
        }
        PrimitiveType::Float => {
            if op == UnaryOp::Not {
                return Err(CompilerError::LogicalNotOnFloat);
            }
            let dest = ctx.acquire(RegFile::Float);
            match op {
                UnaryOp::Plus => ctx.emit(AsmInst::MovS(dest, src)),
                UnaryOp::Minus => ctx.emit(AsmInst::NegS(dest, src)),
                UnaryOp::Not => unreachable!(),
            }
            ctx.bind(dest, node);
            release_operand(ctx, src, dest);
        }
    }
    Ok(())
}

fn lower_binary(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
    op: BinaryOp,
) -> Result<(), CompilerError> {
    if op.is_logical() {
        // && and || must reach the branch lowering path instead.
        return Err(CompilerError::ShortCircuitOperatorInValueContext);
    }

    let lhs = ast
        .child(node, 0)
        .ok_or_else(|| CompilerError::Internal("binary operator without operands".to_string()))?;
    let rhs = ast
        .child(node, 1)
        .ok_or_else(|| CompilerError::Internal("binary operator without operands".to_string()))?;
    lower_expr(ctx, ast, symtab, lhs)?;
    lower_expr(ctx, ast, symtab, rhs)?;

    let lhs_ty = ast.type_of(lhs);
    let rhs_ty = ast.type_of(rhs);

    // Materializing one operand can evict the other from its register, so
    // each descriptor is re-read once its peer has settled. A value still
    // in a register comes back unchanged, and the pool never evicts the
    // slot it handed out last, so the re-reads cannot displace each other.
    //
    // Mixed operands: the integer side is widened to float, never the reverse.
    let (lreg, rreg, ty) = if lhs_ty != rhs_ty {
        if lhs_ty == PrimitiveType::Int {
            value_of(ctx, ast, lhs)?;
            value_of(ctx, ast, rhs)?;
            let old = value_of(ctx, ast, lhs)?;
            // The widening takes a float register and may evict rhs.
            let lreg = int_to_float(ctx, lhs, old);
            let rreg = value_of(ctx, ast, rhs)?;
            (lreg, rreg, PrimitiveType::Float)
        } else {
            value_of(ctx, ast, lhs)?;
            let old = value_of(ctx, ast, rhs)?;
            let rreg = int_to_float(ctx, rhs, old);
            let lreg = value_of(ctx, ast, lhs)?;
            (lreg, rreg, PrimitiveType::Float)
        }
    } else {
        value_of(ctx, ast, lhs)?;
        value_of(ctx, ast, rhs)?;
        let lreg = value_of(ctx, ast, lhs)?;
        let rreg = value_of(ctx, ast, rhs)?;
        (lreg, rreg, lhs_ty)
    };

    let dest = match ty {
        PrimitiveType::Int => {
            let dest = ctx.acquire(RegFile::Int);
            match op {
                BinaryOp::Add => ctx.emit(AsmInst::Add(dest, lreg, rreg)),
                BinaryOp::Sub => ctx.emit(AsmInst::Sub(dest, lreg, rreg)),
                BinaryOp::Mul => {
                    ctx.emit(AsmInst::Mult(lreg, rreg));
                    ctx.emit(AsmInst::Mflo(dest));
                }
                BinaryOp::Div => {
                    // Integer division truncates toward zero.
                    ctx.emit(AsmInst::Div(lreg, rreg));
                    ctx.emit(AsmInst::Mflo(dest));
                }
                BinaryOp::Eq => ctx.emit(AsmInst::Seq(dest, lreg, rreg)),
                BinaryOp::Ne => ctx.emit(AsmInst::Sne(dest, lreg, rreg)),
                BinaryOp::Lt => ctx.emit(AsmInst::Slt(dest, lreg, rreg)),
                BinaryOp::Le => ctx.emit(AsmInst::Sle(dest, lreg, rreg)),
                BinaryOp::Gt => ctx.emit(AsmInst::Sgt(dest, lreg, rreg)),
                BinaryOp::Ge => ctx.emit(AsmInst::Sge(dest, lreg, rreg)),
                BinaryOp::And | BinaryOp::Or => unreachable!(),
            }
            ctx.bind(dest, node);
            dest
        }
        PrimitiveType::Float => {
            if op.is_relational() {
                // The target has no float predicate instruction; synthesize
                // the 0/1 result with a compare and a branch pair.
                let dest = ctx.acquire(RegFile::Int);
                float_relational(ctx, op, dest, lreg, rreg);
                ctx.bind(dest, node);
                dest
            } else {
                let dest = ctx.acquire(RegFile::Float);
                match op {
                    BinaryOp::Add => ctx.emit(AsmInst::AddS(dest, lreg, rreg)),
                    BinaryOp::Sub => ctx.emit(AsmInst::SubS(dest, lreg, rreg)),
                    BinaryOp::Mul => ctx.emit(AsmInst::MulS(dest, lreg, rreg)),
                    BinaryOp::Div => ctx.emit(AsmInst::DivS(dest, lreg, rreg)),
                    _ => unreachable!(),
                }
                ctx.bind(dest, node);
                dest
            }
        }
    };
    release_operand(ctx, lreg, dest);
    release_operand(ctx, rreg, dest);
    Ok(())
}

/// 0/1 result of a float comparison via the condition flag: compare, branch
/// if the flag is false, and load the matching immediate on each path
pub(crate) fn float_relational(
    ctx: &mut CodegenContext,
    op: BinaryOp,
    dest: Reg,
    lhs: Reg,
    rhs: Reg,
) {
    let (on_set, on_clear) = match op {
        BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Le => (1, 0),
        BinaryOp::Ne | BinaryOp::Ge | BinaryOp::Gt => (0, 1),
        _ => unreachable!("not a relational operator"),
    };
    match op {
        BinaryOp::Eq | BinaryOp::Ne => ctx.emit(AsmInst::CEqS(lhs, rhs)),
        BinaryOp::Lt | BinaryOp::Ge => ctx.emit(AsmInst::CLtS(lhs, rhs)),
        BinaryOp::Le | BinaryOp::Gt => ctx.emit(AsmInst::CLeS(lhs, rhs)),
        _ => unreachable!(),
    }
    let flag_clear = ctx.new_label();
    let exit = ctx.new_label();
    ctx.emit(AsmInst::Bc1f(flag_clear.clone()));
    ctx.emit(AsmInst::Li(dest, on_set));
    ctx.emit(AsmInst::J(exit.clone()));
    ctx.emit(AsmInst::Label(flag_clear));
    ctx.emit(AsmInst::Li(dest, on_clear));
    ctx.emit(AsmInst::Label(exit));
}

/// Lower an assignment; the stored value stays bound to the assignment node
/// so expression positions (for-clauses) can consume it
pub(crate) fn lower_assign(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let lvalue = ast
        .child(node, 0)
        .ok_or_else(|| CompilerError::Internal("assignment without lvalue".to_string()))?;
    let rvalue = ast
        .child(node, 1)
        .ok_or_else(|| CompilerError::Internal("assignment without rvalue".to_string()))?;

    lower_expr(ctx, ast, symtab, lvalue)?;
    lower_expr(ctx, ast, symtab, rvalue)?;

    let lvalue_ty = ast.type_of(lvalue);
    let rvalue_ty = ast.type_of(rvalue);
    let mut rv = value_of(ctx, ast, rvalue)?;
    rv = coerce(ctx, rvalue, rv, rvalue_ty, lvalue_ty);

    let target = ctx
        .loc(lvalue)
        .cloned()
        .ok_or(CompilerError::MissingLocation(lvalue))?;
    match target {
        Location::Stack { offset, index } => match index {
            IndexMode::Static => store(ctx, lvalue_ty, rv, -offset, Reg::Fp),
            IndexMode::Dynamic(acc_node) => {
                let acc = value_of(ctx, ast, acc_node)?;
                ctx.emit(AsmInst::Add(acc, acc, Reg::Fp));
                store(ctx, lvalue_ty, rv, -offset, acc);
                ctx.release(acc);
            }
        },
        Location::Global {
            label,
            offset,
            index,
        } => match index {
            IndexMode::Static => match lvalue_ty {
                PrimitiveType::Int => ctx.emit(AsmInst::SwSym(rv, label, offset)),
                PrimitiveType::Float => ctx.emit(AsmInst::SsSym(rv, label, offset)),
            },
            IndexMode::Dynamic(acc_node) => {
                let acc = value_of(ctx, ast, acc_node)?;
                ctx.emit(AsmInst::AddiSym(acc, acc, label));
                store(ctx, lvalue_ty, rv, 0, acc);
                ctx.release(acc);
            }
        },
        Location::Indirect {
            pointer_offset,
            offset,
            index,
        } => {
            let ptr = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::Lw(ptr, pointer_offset, Reg::Fp));
            match index {
                IndexMode::Static => store(ctx, lvalue_ty, rv, offset, ptr),
                IndexMode::Dynamic(acc_node) => {
                    let acc = value_of(ctx, ast, acc_node)?;
                    ctx.emit(AsmInst::Add(acc, acc, ptr));
                    store(ctx, lvalue_ty, rv, 0, acc);
                    ctx.release(acc);
                }
            }
            ctx.release(ptr);
        }
        Location::Reg(_) => {
            return Err(CompilerError::Internal(
                "assignment target is not a memory location".to_string(),
            ))
        }
    }

    // The assignment's own value is the stored register.
    ctx.bind(rv, node);
    Ok(())
}
