//! Scoped symbol table
//!
//! Name resolution itself happens in semantic analysis; the backend uses the
//! table to find type descriptors and to record the storage location it
//! assigns when a variable is first declared. Scope 0 is the program scope
//! (globals and functions); a new scope opens for every function body and
//! nested block, and closing a scope reclaims its entries.

use cmm_common::{CompilerError, FunctionSignature, TypeDescriptor};
use std::collections::HashMap;

/// Storage location of a variable, assigned by the code generator
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    /// Data-segment label (globals)
    Global { label: String },
    /// Frame slot; `offset` is the byte depth below the frame pointer
    /// (negative depths address the caller-pushed parameter area above it)
    Frame { offset: i32 },
    /// Frame slot at `$fp + pointer_offset` holding the address of the first
    /// element (array parameters, passed by reference)
    Indirect { pointer_offset: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolType {
    Variable(TypeDescriptor),
    Function(FunctionSignature),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: SymbolType,
    pub storage: Option<Storage>,
}

impl Symbol {
    /// The variable type descriptor; functions have no storage shape
    pub fn var_type(&self) -> Option<&TypeDescriptor> {
        match &self.ty {
            SymbolType::Variable(td) => Some(td),
            SymbolType::Function(_) => None,
        }
    }

    pub fn signature(&self) -> Option<&FunctionSignature> {
        match &self.ty {
            SymbolType::Function(sig) => Some(sig),
            SymbolType::Variable(_) => None,
        }
    }
}

/// Symbol table with nested scopes
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    /// Nesting depth of the innermost scope; 0 is the program scope
    pub fn current_level(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn close_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot close the program scope");
        self.scopes.pop();
    }

    /// Insert a symbol into the innermost scope, shadowing outer bindings
    pub fn declare(&mut self, name: &str, ty: SymbolType) {
        let symbol = Symbol {
            name: name.to_string(),
            ty,
            storage: None,
        };
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), symbol);
    }

    /// Innermost binding for `name`
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Innermost binding plus the scope level it was declared at
    pub fn lookup_with_level(&self, name: &str) -> Option<(&Symbol, usize)> {
        for (level, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(symbol) = scope.get(name) {
                return Some((symbol, level));
            }
        }
        None
    }

    /// Record the storage location for the innermost binding of `name`
    pub fn set_storage(&mut self, name: &str, storage: Storage) -> Result<(), CompilerError> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(symbol) = scope.get_mut(name) {
                symbol.storage = Some(storage);
                return Ok(());
            }
        }
        Err(CompilerError::UnresolvedSymbol(name.to_string()))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
