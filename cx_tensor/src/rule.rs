//! Externally registered backward rules.
//!
//! Layers built on top of the graph (for example a complex-number overlay)
//! can add their own fused operations without extending [`TensorOp`]. The
//! caller computes the forward value itself and hands the graph a
//! [`BackwardRule`] that maps the upstream gradient to one gradient per
//! input.
//!
//! [`TensorOp`]: crate::node::TensorOp

use crate::backend::Backend;
use crate::node::Tensor;

/// Gradient function for a custom graph node.
pub trait BackwardRule<B: Backend>: Send + Sync + 'static {
    /// Compute the gradient for each input.
    ///
    /// * `inputs` - the node's children, in registration order
    /// * `output` - the node's forward value
    /// * `upstream` - dL/d(output), same shape as `output`
    ///
    /// Must return exactly `inputs.len()` entries; `None` means the input
    /// receives no gradient from this node. Each `Some` gradient must have
    /// the shape of the corresponding input.
    fn backward(
        &self,
        inputs: &[Tensor<B>],
        output: &B::Tensor,
        upstream: &B::Tensor,
    ) -> Vec<Option<B::Tensor>>;
}
