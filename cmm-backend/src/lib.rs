//! MIPS code generation for the cmm compiler
//!
//! Walks a type-annotated AST and produces assembly for a MIPS-like
//! target. Values live in a round-robin pool of `$s`/`$f` registers and
//! spill to the frame when the pool runs dry; every expression node carries
//! a location descriptor that tracks where its value currently is.
//!
//! Entry points: [`lower_program`] produces the instruction buffer,
//! [`generate_assembly`] renders it as text.

mod addr;
mod context;
mod control;
pub mod emit;
mod expr;
mod function;
mod globals;
mod location;

pub use context::CodegenContext;
pub use location::{IndexMode, Location};

use cmm_codegen::AsmInst;
use cmm_common::CompilerError;
use cmm_frontend::ast::{Ast, NodeKind};
use cmm_frontend::{SymbolTable, SymbolType};

/// Lower a whole translation unit with a caller-supplied context; tests
/// use this to shrink the register pools
pub fn lower_program_with(
    mut ctx: CodegenContext,
    ast: &Ast,
    symtab: &mut SymbolTable,
) -> Result<Vec<AsmInst>, CompilerError> {
    let root = ast
        .root()
        .ok_or_else(|| CompilerError::Internal("program has no root node".to_string()))?;
    for item in ast.children(root) {
        match &ast.node(item).kind {
            NodeKind::VarDeclList => globals::lower_global_decls(&mut ctx, ast, symtab, item)?,
            NodeKind::FuncDecl { name, signature } => {
                // Declared before the body lowers so recursion resolves.
                symtab.declare(name, SymbolType::Function(signature.clone()));
                function::lower_function(&mut ctx, ast, symtab, item)?;
            }
            other => {
                return Err(CompilerError::Internal(format!(
                    "unexpected top-level node {:?}",
                    other
                )))
            }
        }
    }
    Ok(ctx.into_output())
}

pub fn lower_program(ast: &Ast, symtab: &mut SymbolTable) -> Result<Vec<AsmInst>, CompilerError> {
    lower_program_with(CodegenContext::new(ast.len()), ast, symtab)
}

pub fn generate_assembly(ast: &Ast, symtab: &mut SymbolTable) -> Result<String, CompilerError> {
    let instructions = lower_program(ast, symtab)?;
    Ok(emit::to_text(&instructions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmm_codegen::Reg;
    use cmm_common::{FunctionSignature, PrimitiveType, TypeDescriptor};
    use pretty_assertions::assert_eq;

    fn empty_main(ast: &mut Ast) {
        let func = ast.add(NodeKind::FuncDecl {
            name: "main".to_string(),
            signature: FunctionSignature::new(PrimitiveType::Int, Vec::new()),
        });
        let params = ast.add(NodeKind::ParamList);
        let body = ast.add(NodeKind::Block);
        ast.set_children(func, &[params, body]);
        let root = ast.add(NodeKind::Program);
        ast.set_children(root, &[func]);
        ast.set_root(root);
    }

    #[test]
    fn test_program_with_globals_and_main() {
        let mut ast = Ast::new();
        let decls = ast.add(NodeKind::VarDeclList);
        let g = ast.add(NodeKind::VarDecl {
            name: "total".to_string(),
            ty: TypeDescriptor::scalar(PrimitiveType::Int),
        });
        ast.set_children(decls, &[g]);
        let func = ast.add(NodeKind::FuncDecl {
            name: "main".to_string(),
            signature: FunctionSignature::new(PrimitiveType::Int, Vec::new()),
        });
        let params = ast.add(NodeKind::ParamList);
        let body = ast.add(NodeKind::Block);
        ast.set_children(func, &[params, body]);
        let root = ast.add(NodeKind::Program);
        ast.set_children(root, &[decls, func]);
        ast.set_root(root);

        let mut symtab = SymbolTable::new();
        let out = lower_program(&ast, &mut symtab).unwrap();
        assert!(out
            .iter()
            .any(|i| matches!(i, AsmInst::Word(l, 0) if l == "total")));
        assert!(out
            .iter()
            .any(|i| matches!(i, AsmInst::Label(l) if l == "main")));
        assert!(out.iter().any(|i| matches!(i, AsmInst::Jr(Reg::Ra))));
    }

    #[test]
    fn test_assembly_text_has_sections() {
        let mut ast = Ast::new();
        empty_main(&mut ast);
        let mut symtab = SymbolTable::new();
        let text = generate_assembly(&ast, &mut symtab).unwrap();
        assert!(text.starts_with(".text\nmain:\n"));
        assert!(text.contains("_framesize_main: .word 36"));
        assert_eq!(text.matches("jr $ra").count(), 1);
    }
}
