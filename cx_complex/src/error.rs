//! Error type for the complex layer.

use thiserror::Error;

use crate::dispatch::ComplexOp;

pub type Result<T> = std::result::Result<T, ComplexError>;

/// Failures raised synchronously by construction and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComplexError {
    /// Bad packed buffer, mismatched parts, or incompatible operand shapes.
    #[error("shape error: {0}")]
    Shape(String),

    /// The operand kinds are not covered by the dispatch table for `op`.
    #[error("`{op}` does not support operands ({operands})")]
    UnsupportedOperand { op: ComplexOp, operands: String },

    /// The operation is mathematically undefined for the operand.
    #[error("`{op}` is undefined here: {reason}")]
    Domain { op: ComplexOp, reason: String },

    /// Deep copies are only available for graph leaves.
    #[error("only arrays created directly (graph leaves) can be deep-copied")]
    NonLeafCopy,
}

impl ComplexError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        ComplexError::Shape(message.into())
    }
}
