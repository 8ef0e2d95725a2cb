//! Statement and control-flow lowering
//!
//! `&&` and `||` never produce a value here; they lower to branch chains
//! that skip the right operand entirely when the left one decides the
//! outcome. Loop bodies follow a test/inc/body/exit label layout so the
//! increment clause sits between the test and the body.

use crate::context::CodegenContext;
use crate::expr;
use crate::function;
use crate::globals;
use crate::location::Location;
use cmm_codegen::{AsmInst, Reg, RegFile};
use cmm_common::{CompilerError, NodeId, PrimitiveType};
use cmm_frontend::ast::{Ast, BinaryOp, NodeKind};
use cmm_frontend::SymbolTable;

pub(crate) fn lower_stmt(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    match &ast.node(node).kind {
        NodeKind::Empty => Ok(()),
        NodeKind::Block => lower_block(ctx, ast, symtab, node),
        NodeKind::StmtList => {
            for stmt in ast.children(node) {
                lower_stmt(ctx, ast, symtab, stmt)?;
            }
            Ok(())
        }
        NodeKind::If => lower_if(ctx, ast, symtab, node),
        NodeKind::While => lower_while(ctx, ast, symtab, node),
        NodeKind::For => lower_for(ctx, ast, symtab, node),
        NodeKind::Return => function::lower_return(ctx, ast, symtab, node),
        // Assignments and calls in statement position discard their value.
        _ => lower_expr_statement(ctx, ast, symtab, node),
    }
}

pub(crate) fn lower_block(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    symtab.open_scope();
    let result = (|| {
        for section in ast.children(node) {
            match &ast.node(section).kind {
                NodeKind::VarDeclList => globals::lower_local_decls(ctx, ast, symtab, section)?,
                _ => lower_stmt(ctx, ast, symtab, section)?,
            }
        }
        Ok(())
    })();
    symtab.close_scope();
    result
}

/// Lower an expression for its side effects and free its result register
fn lower_expr_statement(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    expr::lower_expr(ctx, ast, symtab, node)?;
    release_value(ctx, node);
    Ok(())
}

/// Free a node's result register if it still holds one
pub(crate) fn release_value(ctx: &mut CodegenContext, node: NodeId) {
    if let Some(Location::Reg(reg)) = ctx.loc(node) {
        let reg = *reg;
        ctx.release(reg);
    }
}

/// Materialize a condition as an integer truth value. Float conditions
/// compare against 0.0 since beqz only reads the integer file.
fn condition_register(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<Reg, CompilerError> {
    expr::lower_expr(ctx, ast, symtab, node)?;
    let value = expr::value_of(ctx, ast, node)?;
    match ast.type_of(node) {
        PrimitiveType::Int => Ok(value),
        PrimitiveType::Float => {
            let dest = ctx.acquire(RegFile::Int);
            let zero = ctx.acquire(RegFile::Float);
            ctx.emit(AsmInst::LiS(zero, 0.0));
            expr::float_relational(ctx, BinaryOp::Ne, dest, value, zero);
            ctx.release(zero);
            ctx.release(value);
            ctx.bind(dest, node);
            Ok(dest)
        }
    }
}

/// Branch to `false_label` when the condition is false; fall through on true
pub(crate) fn branch_if_false(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
    false_label: &str,
) -> Result<(), CompilerError> {
    match &ast.node(node).kind {
        NodeKind::Binary(BinaryOp::And) => {
            let lhs = child(ast, node, 0)?;
            let rhs = child(ast, node, 1)?;
            branch_if_false(ctx, ast, symtab, lhs, false_label)?;
            branch_if_false(ctx, ast, symtab, rhs, false_label)
        }
        NodeKind::Binary(BinaryOp::Or) => {
            let lhs = child(ast, node, 0)?;
            let rhs = child(ast, node, 1)?;
            let true_label = ctx.new_label();
            branch_if_true(ctx, ast, symtab, lhs, &true_label)?;
            branch_if_false(ctx, ast, symtab, rhs, false_label)?;
            ctx.emit(AsmInst::Label(true_label));
            Ok(())
        }
        _ => {
            let reg = condition_register(ctx, ast, symtab, node)?;
            ctx.emit(AsmInst::Beqz(reg, false_label.to_string()));
            ctx.release(reg);
            Ok(())
        }
    }
}

/// Branch to `true_label` when the condition is true; fall through on false
pub(crate) fn branch_if_true(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
    true_label: &str,
) -> Result<(), CompilerError> {
    match &ast.node(node).kind {
        NodeKind::Binary(BinaryOp::Or) => {
            let lhs = child(ast, node, 0)?;
            let rhs = child(ast, node, 1)?;
            branch_if_true(ctx, ast, symtab, lhs, true_label)?;
            branch_if_true(ctx, ast, symtab, rhs, true_label)
        }
        NodeKind::Binary(BinaryOp::And) => {
            let lhs = child(ast, node, 0)?;
            let rhs = child(ast, node, 1)?;
            let false_label = ctx.new_label();
            branch_if_false(ctx, ast, symtab, lhs, &false_label)?;
            branch_if_true(ctx, ast, symtab, rhs, true_label)?;
            ctx.emit(AsmInst::Label(false_label));
            Ok(())
        }
        _ => {
            let reg = condition_register(ctx, ast, symtab, node)?;
            ctx.emit(AsmInst::Bnez(reg, true_label.to_string()));
            ctx.release(reg);
            Ok(())
        }
    }
}

fn lower_if(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let cond = child(ast, node, 0)?;
    let then_stmt = child(ast, node, 1)?;
    let else_stmt = ast.child(node, 2);

    match else_stmt {
        Some(else_stmt) if ast.node(else_stmt).kind != NodeKind::Empty => {
            let else_label = ctx.new_label();
            let exit_label = ctx.new_label();
            branch_if_false(ctx, ast, symtab, cond, &else_label)?;
            lower_stmt(ctx, ast, symtab, then_stmt)?;
            ctx.emit(AsmInst::J(exit_label.clone()));
            ctx.emit(AsmInst::Label(else_label));
            lower_stmt(ctx, ast, symtab, else_stmt)?;
            ctx.emit(AsmInst::Label(exit_label));
        }
        _ => {
            // The else arm is empty but keeps the symmetric label layout.
            let else_label = ctx.new_label();
            let exit_label = ctx.new_label();
            branch_if_false(ctx, ast, symtab, cond, &else_label)?;
            lower_stmt(ctx, ast, symtab, then_stmt)?;
            ctx.emit(AsmInst::J(exit_label.clone()));
            ctx.emit(AsmInst::Label(else_label));
            ctx.emit(AsmInst::Label(exit_label));
        }
    }
    Ok(())
}

fn lower_while(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let cond = child(ast, node, 0)?;
    let body = child(ast, node, 1)?;
    let test_label = ctx.new_label();
    let exit_label = ctx.new_label();

    ctx.emit(AsmInst::Label(test_label.clone()));
    branch_if_false(ctx, ast, symtab, cond, &exit_label)?;
    lower_stmt(ctx, ast, symtab, body)?;
    ctx.emit(AsmInst::J(test_label));
    ctx.emit(AsmInst::Label(exit_label));
    Ok(())
}

/// Layout: init, test, inc, body, exit. The test jumps over the increment
/// block into the body, and the body jumps back to the increment, so the
/// step clauses run between iterations only. An empty condition list jumps
/// straight to the body.
fn lower_for(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    node: NodeId,
) -> Result<(), CompilerError> {
    let init = child(ast, node, 0)?;
    let cond = child(ast, node, 1)?;
    let step = child(ast, node, 2)?;
    let body = child(ast, node, 3)?;

    for e in ast.children(init) {
        lower_expr_statement(ctx, ast, symtab, e)?;
    }

    let test_label = ctx.new_label();
    let inc_label = ctx.new_label();
    let body_label = ctx.new_label();
    let exit_label = ctx.new_label();

    ctx.emit(AsmInst::Label(test_label.clone()));
    let conds: Vec<NodeId> = ast.children(cond).collect();
    match conds.split_last() {
        Some((last, rest)) => {
            for e in rest {
                lower_expr_statement(ctx, ast, symtab, *e)?;
            }
            branch_if_false(ctx, ast, symtab, *last, &exit_label)?;
            ctx.emit(AsmInst::J(body_label.clone()));
        }
        None => ctx.emit(AsmInst::J(body_label.clone())),
    }

    ctx.emit(AsmInst::Label(inc_label.clone()));
    for e in ast.children(step) {
        lower_expr_statement(ctx, ast, symtab, e)?;
    }
    ctx.emit(AsmInst::J(test_label));

    ctx.emit(AsmInst::Label(body_label));
    lower_stmt(ctx, ast, symtab, body)?;
    ctx.emit(AsmInst::J(inc_label));
    ctx.emit(AsmInst::Label(exit_label));
    Ok(())
}

fn child(ast: &Ast, node: NodeId, n: usize) -> Result<NodeId, CompilerError> {
    ast.child(node, n).ok_or_else(|| {
        CompilerError::Internal(format!("node {} is missing operand {}", node, n))
    })
}
