//! Common types used throughout the compiler
//!
//! This module defines data types that are shared across multiple
//! compiler phases: primitive types, type descriptors and id aliases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a syntax-tree node inside the arena
pub type NodeId = u32;

/// Label identifier for code generation
pub type LabelId = u32;

/// Size in bytes of every scalar value on the target (int and float)
pub const WORD_BYTES: u32 = 4;

/// Primitive value types of the language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Int,
    Float,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Int => write!(f, "int"),
            PrimitiveType::Float => write!(f, "float"),
        }
    }
}

/// Resolved type of a variable: a primitive type plus the extent of each
/// array dimension. An empty `dims` means a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub primitive: PrimitiveType,
    pub dims: Vec<u32>,
}

impl TypeDescriptor {
    pub fn scalar(primitive: PrimitiveType) -> Self {
        Self {
            primitive,
            dims: Vec::new(),
        }
    }

    pub fn array(primitive: PrimitiveType, dims: Vec<u32>) -> Self {
        Self { primitive, dims }
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dims.len()
    }

    /// Total storage size in bytes (row-major, 4-byte elements)
    pub fn size_in_bytes(&self) -> u32 {
        self.dims.iter().product::<u32>().max(1) * WORD_BYTES
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primitive)?;
        for extent in &self.dims {
            write!(f, "[{}]", extent)?;
        }
        Ok(())
    }
}

/// Declared signature of a function: parameter types in declaration order
/// plus the return type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub return_type: PrimitiveType,
    pub params: Vec<TypeDescriptor>,
}

impl FunctionSignature {
    pub fn new(return_type: PrimitiveType, params: Vec<TypeDescriptor>) -> Self {
        Self {
            return_type,
            params,
        }
    }
}
