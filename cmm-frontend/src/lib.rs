//! C-- Compiler - Front End Data Model
//!
//! The syntax tree and symbol table consumed by the code generation
//! backend. Lexing, parsing and semantic analysis are out of scope; trees
//! arrive type-annotated (every value-producing node carries its resolved
//! primitive type) and are built programmatically through [`ast::Ast`].

pub mod ast;
pub mod symtab;

pub use ast::{Ast, BinaryOp, Constant, Node, NodeKind, UnaryOp};
pub use symtab::{Storage, Symbol, SymbolTable, SymbolType};
