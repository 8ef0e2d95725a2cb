//! Error handling for the C-- compiler
//!
//! The code generator assumes a well-typed tree; every error defined here is
//! an internal-consistency failure that aborts the compilation run. None of
//! these are user-facing diagnostics and none are recoverable.

use crate::types::NodeId;
use thiserror::Error;

/// Fatal internal failures raised during code generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// A short-circuit combinator (`&&`/`||`) reached value lowering; boolean
    /// contexts must go through branch lowering.
    #[error("internal: boolean operator reached value lowering outside a short-circuit context")]
    ShortCircuitOperatorInValueContext,

    /// The front end must reject `!` on float operands before codegen runs.
    #[error("internal: logical negation applied to a float operand")]
    LogicalNotOnFloat,

    #[error("internal: {used} subscripts given for an array of {declared} dimensions")]
    SubscriptOutOfRange { declared: usize, used: usize },

    #[error("internal: undefined symbol '{0}' reached code generation")]
    UnresolvedSymbol(String),

    #[error("internal: node {0} has no value location")]
    MissingLocation(NodeId),

    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// Convert from String (for simple error cases)
impl From<String> for CompilerError {
    fn from(message: String) -> Self {
        CompilerError::Internal(message)
    }
}
