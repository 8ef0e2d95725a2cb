//! C-- Compiler - Common Types
//!
//! Shared type definitions and error types used by the front end and the
//! code generation backend.

pub mod error;
pub mod types;

pub use error::CompilerError;
pub use types::{FunctionSignature, LabelId, NodeId, PrimitiveType, TypeDescriptor};
