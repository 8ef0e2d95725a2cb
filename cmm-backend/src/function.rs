//! Function lowering and the calling convention
//!
//! Frame layout at entry (caller already pushed arguments):
//!
//! ```text
//!   fp + 8+4k   argument k
//!   fp + 4      return address
//!   fp + 0      caller's frame pointer
//!   fp - 4..36  saved $s0..$s7 and $gp
//!   fp - 40...  locals and spill slots
//! ```
//!
//! The frame size is not known until the body has been lowered, so the
//! prologue loads it from a data word emitted after the epilogue.

use crate::addr::{self, ArrayIndex};
use crate::context::CodegenContext;
use crate::control;
use crate::expr;
use cmm_codegen::{abi, AsmInst, Reg, RegFile};
use cmm_common::{CompilerError, NodeId, PrimitiveType, TypeDescriptor};
use cmm_frontend::ast::{Ast, Constant, NodeKind};
use cmm_frontend::{Storage, SymbolTable, SymbolType};

pub(crate) fn lower_function(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let (name, signature) = match &ast.node(node).kind {
        NodeKind::FuncDecl { name, signature } => (name.clone(), signature.clone()),
        other => {
            return Err(CompilerError::Internal(format!(
                "expected a function declaration, got {:?}",
                other
            )))
        }
    };
    let param_list = ast.child(node, 0).ok_or_else(|| {
        CompilerError::Internal(format!("function '{}' has no parameter list", name))
    })?;
    let body = ast
        .child(node, 1)
        .ok_or_else(|| CompilerError::Internal(format!("function '{}' has no body", name)))?;

    log::debug!("lowering function '{}'", name);
    ctx.enter_function(&name, signature.return_type);
    ctx.emit(AsmInst::Text);
    ctx.emit(AsmInst::Label(name.clone()));
    prologue(ctx, &name);

    symtab.open_scope();
    let result = (|| {
        for (k, param) in ast.children(param_list).enumerate() {
            declare_param(symtab, ast, param, k as i32)?;
        }
        control::lower_block(ctx, ast, symtab, body)
    })();
    symtab.close_scope();
    result?;

    ctx.emit(AsmInst::Label(abi::end_label(&name)));
    epilogue(ctx);

    // Now the body's locals and spill slots are all accounted for.
    ctx.emit(AsmInst::Data);
    ctx.emit(AsmInst::Word(abi::frame_size_label(&name), ctx.frame_top()));
    Ok(())
}

fn declare_param(
    symtab: &mut SymbolTable,
    ast: &Ast,
    param: NodeId,
    position: i32,
) -> Result<(), CompilerError> {
    let (pname, ty) = match &ast.node(param).kind {
        NodeKind::Param { name, ty } => (name.clone(), ty.clone()),
        other => {
            return Err(CompilerError::Internal(format!(
                "expected a parameter, got {:?}",
                other
            )))
        }
    };
    let offset = abi::FIRST_PARAM_OFFSET + abi::WORD_BYTES * position;
    let storage = if ty.is_array() {
        // Arrays arrive as an address; element loads go through the pointer.
        Storage::Indirect {
            pointer_offset: offset,
        }
    } else {
        // Scalar slots live above fp, encoded as a negative depth.
        Storage::Frame { offset: -offset }
    };
    symtab.declare(&pname, SymbolType::Variable(ty));
    symtab.set_storage(&pname, storage)
}

fn prologue(ctx: &mut CodegenContext, name: &str) {
    ctx.emit(AsmInst::Sw(Reg::Ra, 0, Reg::Sp));
    ctx.emit(AsmInst::Sw(Reg::Fp, -4, Reg::Sp));
    ctx.emit(AsmInst::Addi(Reg::Fp, Reg::Sp, -4));
    ctx.emit(AsmInst::Addi(Reg::Sp, Reg::Sp, -8));
    ctx.emit(AsmInst::LwSym(Reg::V0, abi::frame_size_label(name), 0));
    ctx.emit(AsmInst::Sub(Reg::Sp, Reg::Sp, Reg::V0));
    for i in 0..8u8 {
        ctx.emit(AsmInst::Sw(Reg::S(i), -4 * (i as i32 + 1), Reg::Fp));
    }
    ctx.emit(AsmInst::Sw(Reg::Gp, -abi::SAVED_REGS_BYTES, Reg::Fp));
}

fn epilogue(ctx: &mut CodegenContext) {
    ctx.emit(AsmInst::Lw(Reg::Gp, -abi::SAVED_REGS_BYTES, Reg::Fp));
    for i in (0..8u8).rev() {
        ctx.emit(AsmInst::Lw(Reg::S(i), -4 * (i as i32 + 1), Reg::Fp));
    }
    ctx.emit(AsmInst::Lw(Reg::Ra, 4, Reg::Fp));
    ctx.emit(AsmInst::Addi(Reg::Sp, Reg::Fp, 4));
    ctx.emit(AsmInst::Lw(Reg::Fp, 0, Reg::Fp));
    ctx.emit(AsmInst::Jr(Reg::Ra));
}

/// Lower a call expression; binds the captured return value to `node`
/// unless the callee is `write`
pub(crate) fn lower_call_expr(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let callee = ast
        .child(node, 0)
        .ok_or_else(|| CompilerError::Internal("call without callee".to_string()))?;
    let arg_list = ast
        .child(node, 1)
        .ok_or_else(|| CompilerError::Internal("call without argument list".to_string()))?;
    let name = match &ast.node(callee).kind {
        NodeKind::Ident(name) => name.clone(),
        other => {
            return Err(CompilerError::Internal(format!(
                "callee is not an identifier: {:?}",
                other
            )))
        }
    };

    // Builtins are recognized by name prefix, matching the runtime's
    // conventions; anything else is a user call.
    if name.starts_with("write") {
        lower_write(ctx, ast, symtab, arg_list)
    } else if name.starts_with("fread") {
        ctx.emit(AsmInst::Li(Reg::V0, 6));
        ctx.emit(AsmInst::Syscall);
        capture_return(ctx, node, PrimitiveType::Float);
        Ok(())
    } else if name.starts_with("read") {
        ctx.emit(AsmInst::Li(Reg::V0, 5));
        ctx.emit(AsmInst::Syscall);
        capture_return(ctx, node, PrimitiveType::Int);
        Ok(())
    } else {
        lower_user_call(ctx, ast, symtab, node, &name, arg_list)
    }
}

/// write() maps straight onto the print syscalls: 1 for int, 2 for float,
/// 4 for a string constant
fn lower_write(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    arg_list: NodeId,
) -> Result<(), CompilerError> {
    let arg = ast
        .first_child(arg_list)
        .ok_or_else(|| CompilerError::Internal("write() without an argument".to_string()))?;

    if let NodeKind::Const(Constant::Str(literal)) = &ast.node(arg).kind {
        let label = ctx.add_const_string(literal);
        ctx.emit(AsmInst::La(Reg::A0, label, 0));
        ctx.emit(AsmInst::Li(Reg::V0, 4));
        ctx.emit(AsmInst::Syscall);
        return Ok(());
    }

    expr::lower_expr(ctx, ast, symtab, arg)?;
    let value = expr::value_of(ctx, ast, arg)?;
    match ast.type_of(arg) {
        PrimitiveType::Int => {
            ctx.emit(AsmInst::Move(Reg::A0, value));
            ctx.emit(AsmInst::Li(Reg::V0, 1));
        }
        PrimitiveType::Float => {
            ctx.emit(AsmInst::MovS(abi::FLOAT_SYSCALL_ARG, value));
            ctx.emit(AsmInst::Li(Reg::V0, 2));
        }
    }
    ctx.emit(AsmInst::Syscall);
    ctx.release(value);
    Ok(())
}

fn lower_user_call(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
    name: &str,
    arg_list: NodeId,
) -> Result<(), CompilerError> {
    let signature = {
        let symbol = symtab
            .lookup(name)
            .ok_or_else(|| CompilerError::UnresolvedSymbol(name.to_string()))?;
        symbol
            .signature()
            .ok_or_else(|| CompilerError::Internal(format!("'{}' is not a function", name)))?
            .clone()
    };
    let args: Vec<NodeId> = ast.children(arg_list).collect();
    if args.len() != signature.params.len() {
        return Err(CompilerError::Internal(format!(
            "'{}' expects {} arguments, got {}",
            name,
            signature.params.len(),
            args.len()
        )));
    }

    // Push last-to-first so the first argument lands closest to the new fp.
    for (&arg, param_ty) in args.iter().zip(signature.params.iter()).rev() {
        let reg = if param_ty.is_array() {
            array_address(ctx, ast, symtab, arg)?
        } else {
            expr::lower_expr(ctx, ast, symtab, arg)?;
            let value = expr::value_of(ctx, ast, arg)?;
            expr::coerce(ctx, arg, value, ast.type_of(arg), param_ty.primitive)
        };
        if reg.is_float() {
            ctx.emit(AsmInst::Ss(reg, 0, Reg::Sp));
        } else {
            ctx.emit(AsmInst::Sw(reg, 0, Reg::Sp));
        }
        ctx.emit(AsmInst::Addi(Reg::Sp, Reg::Sp, -abi::WORD_BYTES));
        ctx.release(reg);
    }

    // The callee restores $s0-$s7 and $gp but clobbers the float file.
    ctx.flush_float_values();
    ctx.emit(AsmInst::Jal(name.to_string()));
    if !args.is_empty() {
        ctx.emit(AsmInst::Addi(
            Reg::Sp,
            Reg::Sp,
            abi::WORD_BYTES * args.len() as i32,
        ));
    }
    capture_return(ctx, node, signature.return_type);
    Ok(())
}

/// Copy the volatile return register into a pool register right away;
/// any later call would clobber it
fn capture_return(ctx: &mut CodegenContext, node: NodeId, ty: PrimitiveType) {
    let dest = ctx.acquire_for(ty);
    match ty {
        PrimitiveType::Int => ctx.emit(AsmInst::Move(dest, abi::INT_RETURN)),
        PrimitiveType::Float => ctx.emit(AsmInst::MovS(dest, abi::FLOAT_RETURN)),
    }
    ctx.bind(dest, node);
}

/// Compute the address of an array (or array slice) argument
fn array_address(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<Reg, CompilerError> {
    let name = match &ast.node(node).kind {
        NodeKind::Ident(name) => name.clone(),
        other => {
            return Err(CompilerError::Internal(format!(
                "array argument is not an identifier: {:?}",
                other
            )))
        }
    };
    let (ty, storage): (TypeDescriptor, Storage) = {
        let symbol = symtab
            .lookup(&name)
            .ok_or_else(|| CompilerError::UnresolvedSymbol(name.clone()))?;
        let ty = symbol
            .var_type()
            .ok_or_else(|| CompilerError::Internal(format!("'{}' is not a variable", name)))?
            .clone();
        let storage = symbol.storage.clone().ok_or_else(|| {
            CompilerError::Internal(format!("variable '{}' has no assigned storage", name))
        })?;
        (ty, storage)
    };

    let index = addr::resolve_subscripts(ctx, ast, symtab, node, &ty)?;
    let reg = match (storage, index) {
        (Storage::Frame { offset }, ArrayIndex::Static(off)) => {
            let reg = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::Addi(reg, Reg::Fp, off - offset));
            reg
        }
        (Storage::Frame { offset }, ArrayIndex::Dynamic(acc_node)) => {
            let acc = expr::value_of(ctx, ast, acc_node)?;
            ctx.emit(AsmInst::Add(acc, acc, Reg::Fp));
            ctx.emit(AsmInst::Addi(acc, acc, -offset));
            acc
        }
        (Storage::Global { label }, ArrayIndex::Static(off)) => {
            let reg = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::La(reg, label, off));
            reg
        }
        (Storage::Global { label }, ArrayIndex::Dynamic(acc_node)) => {
            let acc = expr::value_of(ctx, ast, acc_node)?;
            ctx.emit(AsmInst::AddiSym(acc, acc, label));
            acc
        }
        (Storage::Indirect { pointer_offset }, ArrayIndex::Static(off)) => {
            let reg = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::Lw(reg, pointer_offset, Reg::Fp));
            if off != 0 {
                ctx.emit(AsmInst::Addi(reg, reg, off));
            }
            reg
        }
        (Storage::Indirect { pointer_offset }, ArrayIndex::Dynamic(acc_node)) => {
            let reg = ctx.acquire(RegFile::Int);
            ctx.emit(AsmInst::Lw(reg, pointer_offset, Reg::Fp));
            let acc = expr::value_of(ctx, ast, acc_node)?;
            ctx.emit(AsmInst::Add(reg, reg, acc));
            ctx.release(acc);
            reg
        }
    };
    Ok(reg)
}

pub(crate) fn lower_return(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let (name, return_type) = {
        let (name, ty) = ctx
            .current_function()
            .ok_or_else(|| CompilerError::Internal("return outside a function".to_string()))?;
        (name.to_string(), ty)
    };

    if let Some(value_node) = ast.first_child(node) {
        if ast.node(value_node).kind != NodeKind::Empty {
            expr::lower_expr(ctx, ast, symtab, value_node)?;
            let mut value = expr::value_of(ctx, ast, value_node)?;
            value = expr::coerce(ctx, value_node, value, ast.type_of(value_node), return_type);
            match return_type {
                PrimitiveType::Int => ctx.emit(AsmInst::Move(abi::INT_RETURN, value)),
                PrimitiveType::Float => ctx.emit(AsmInst::MovS(abi::FLOAT_RETURN, value)),
            }
            ctx.release(value);
        }
    }
    ctx.emit(AsmInst::J(abi::end_label(&name)));
    Ok(())
}
