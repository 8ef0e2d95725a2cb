//! Array address and offset resolution
//!
//! Row-major layout with 4-byte elements: the innermost dimension has
//! stride 4 and each outer stride is the inner stride times the inner
//! extent. When every subscript is a constant the whole offset folds at
//! compile time and no code is emitted; otherwise the byte offset is
//! accumulated into a register, one dimension at a time.
//!
//! Using fewer subscripts than the declared dimensionality is allowed: the
//! result is then the offset of a sub-array, and the caller treats the
//! location as an address rather than a value (array arguments).

use crate::context::CodegenContext;
use crate::expr;
use cmm_codegen::{AsmInst, RegFile};
use cmm_common::{CompilerError, NodeId, TypeDescriptor};
use cmm_frontend::ast::{Ast, Constant, NodeKind};
use cmm_frontend::SymbolTable;

/// Resolved subscript offset of one array usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayIndex {
    /// Compile-time byte offset
    Static(i32),
    /// Runtime byte offset accumulated in a register owned by the named
    /// node (the first subscript expression)
    Dynamic(NodeId),
}

/// Byte stride of each declared dimension
fn strides(ty: &TypeDescriptor) -> Vec<i32> {
    let n = ty.dimension();
    let mut strides = vec![0i32; n];
    if n > 0 {
        strides[n - 1] = 4;
        for i in (0..n - 1).rev() {
            strides[i] = strides[i + 1] * ty.dims[i + 1] as i32;
        }
    }
    strides
}

/// True when every subscript of the usage is an integer constant
fn all_const(ast: &Ast, subscripts: &[NodeId]) -> bool {
    subscripts
        .iter()
        .all(|&id| matches!(ast.node(id).kind, NodeKind::Const(Constant::Int(_))))
}

/// Resolve the subscripts of `used_node` against the declared type
pub(crate) fn resolve_subscripts(
    ctx: &mut CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
    used_node: NodeId,
    ty: &TypeDescriptor,
) -> Result<ArrayIndex, CompilerError> {
    let subscripts: Vec<NodeId> = ast.children(used_node).collect();
    if subscripts.len() > ty.dimension() {
        return Err(CompilerError::SubscriptOutOfRange {
            declared: ty.dimension(),
            used: subscripts.len(),
        });
    }
    let strides = strides(ty);

    if all_const(ast, &subscripts) {
        let mut offset = 0;
        for (i, &sub) in subscripts.iter().enumerate() {
            if let NodeKind::Const(Constant::Int(value)) = ast.node(sub).kind {
                offset += value * strides[i];
            }
        }
        return Ok(ArrayIndex::Static(offset));
    }

    // Runtime offset: acc = sum(subscript_i * stride_i). The accumulator is
    // bound to the first subscript node so it survives eviction; later
    // iterations re-read it through that node.
    let first = subscripts[0];
    for (i, &sub) in subscripts.iter().enumerate() {
        expr::lower_expr(ctx, ast, symtab, sub)?;

        let stride_reg = ctx.acquire(RegFile::Int);
        ctx.emit(AsmInst::Li(stride_reg, strides[i]));
        let sub_reg = expr::value_of(ctx, ast, sub)?;
        ctx.emit(AsmInst::Mult(sub_reg, stride_reg));
        ctx.emit(AsmInst::Mflo(sub_reg));
        ctx.release(stride_reg);

        if i == 0 {
            // The first scaled subscript doubles as the accumulator, so no
            // zero-initialized running register appears in the output. The
            // resulting offset is identical; only the instruction stream
            // differs from a dedicated-accumulator rendition, and acquiring
            // one here could evict sub_reg while it is still unbound.
            ctx.bind(sub_reg, first);
        } else {
            let acc = expr::value_of(ctx, ast, first)?;
            ctx.emit(AsmInst::Add(acc, acc, sub_reg));
            if sub_reg != acc {
                ctx.release(sub_reg);
            }
            ctx.bind(acc, first);
        }
    }

    Ok(ArrayIndex::Dynamic(first))
}
