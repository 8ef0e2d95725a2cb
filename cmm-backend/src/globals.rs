//! Variable declarations
//!
//! Globals become labeled words in the data segment; locals grow the
//! current frame. Initializers for globals must fold to a constant since
//! no code runs before main; local initializers lower to ordinary stores.

use crate::context::CodegenContext;
use crate::expr;
use cmm_codegen::{AsmInst, Reg};
use cmm_common::{CompilerError, NodeId, PrimitiveType, TypeDescriptor};
use cmm_frontend::ast::{Ast, Constant, NodeKind, UnaryOp};
use cmm_frontend::{Storage, SymbolTable, SymbolType};

pub(crate) fn lower_global_decls(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    decl_list: NodeId,
) -> Result<(), CompilerError> {
    let decls: Vec<NodeId> = ast.children(decl_list).collect();
    if decls.is_empty() {
        return Ok(());
    }
    ctx.emit(AsmInst::Data);
    for decl in decls {
        let (name, ty) = decl_parts(ast, decl)?;
        let init = ast.first_child(decl);
        if ty.is_array() {
            if init.is_some() {
                return Err(CompilerError::Internal(format!(
                    "array '{}' cannot take an initializer",
                    name
                )));
            }
            ctx.emit(AsmInst::Space(name.clone(), ty.size_in_bytes()));
        } else {
            match ty.primitive {
                PrimitiveType::Int => {
                    let value = match init {
                        Some(node) => fold_constant(ast, node)? as i32,
                        None => 0,
                    };
                    ctx.emit(AsmInst::Word(name.clone(), value));
                }
                PrimitiveType::Float => {
                    let value = match init {
                        Some(node) => fold_constant(ast, node)? as f32,
                        None => 0.0,
                    };
                    ctx.emit(AsmInst::FloatWord(name.clone(), value));
                }
            }
        }
        symtab.declare(&name, SymbolType::Variable(ty));
        symtab.set_storage(&name, Storage::Global { label: name.clone() })?;
    }
    Ok(())
}

pub(crate) fn lower_local_decls(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    decl_list: NodeId,
) -> Result<(), CompilerError> {
    for decl in ast.children(decl_list) {
        let (name, ty) = decl_parts(ast, decl)?;
        let offset = ctx.push_frame(ty.size_in_bytes() as i32);
        let primitive = ty.primitive;
        symtab.declare(&name, SymbolType::Variable(ty));
        symtab.set_storage(&name, Storage::Frame { offset })?;

        if let Some(init) = ast.first_child(decl) {
            expr::lower_expr(ctx, ast, symtab, init)?;
            let mut value = expr::value_of(ctx, ast, init)?;
            value = expr::coerce(ctx, init, value, ast.type_of(init), primitive);
            match primitive {
                PrimitiveType::Int => ctx.emit(AsmInst::Sw(value, -offset, Reg::Fp)),
                PrimitiveType::Float => ctx.emit(AsmInst::Ss(value, -offset, Reg::Fp)),
            }
            ctx.release(value);
        }
    }
    Ok(())
}

fn decl_parts(ast: &Ast, decl: NodeId) -> Result<(String, TypeDescriptor), CompilerError> {
    match &ast.node(decl).kind {
        NodeKind::VarDecl { name, ty } => Ok((name.clone(), ty.clone())),
        other => Err(CompilerError::Internal(format!(
            "expected a variable declaration, got {:?}",
            other
        ))),
    }
}

/// Fold a signed numeric literal; globals accept nothing richer
fn fold_constant(ast: &Ast, node: NodeId) -> Result<f64, CompilerError> {
    match &ast.node(node).kind {
        NodeKind::Const(Constant::Int(v)) => Ok(*v as f64),
        NodeKind::Const(Constant::Float(v)) => Ok(*v as f64),
        NodeKind::Unary(UnaryOp::Minus) => {
            let child = ast.first_child(node).ok_or_else(|| {
                CompilerError::Internal("unary operator without operand".to_string())
            })?;
            Ok(-fold_constant(ast, child)?)
        }
        NodeKind::Unary(UnaryOp::Plus) => {
            let child = ast.first_child(node).ok_or_else(|| {
                CompilerError::Internal("unary operator without operand".to_string())
            })?;
            fold_constant(ast, child)
        }
        other => Err(CompilerError::Internal(format!(
            "global initializer must be a numeric constant, got {:?}",
            other
        ))),
    }
}
