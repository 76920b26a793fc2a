//! Gradient lookup for complex values.

use cx_tensor::prelude::*;

use crate::array::ComplexArray;
use crate::layout;
use crate::scalar::ComplexScalar;

/// Result of a backward pass started from a [`ComplexScalar`].
///
/// Gradients of complex values are with respect to their packed real
/// buffers: an (n, m) array gets a (2n, m) gradient whose top half is
/// `dL/d(re)` and bottom half `dL/d(im)`.
pub struct ComplexGradients<B: Backend> {
    inner: Gradients<B>,
}

impl<B: Backend> ComplexGradients<B> {
    pub(crate) fn new(inner: Gradients<B>) -> Self {
        Self { inner }
    }

    /// Packed gradient of `array`, or `None` if it is not on the path to
    /// the output.
    pub fn wrt(&self, array: &ComplexArray<B>) -> Option<&B::Tensor> {
        self.inner.wrt(array.buffer())
    }

    /// Gradient of `array` split into its (real, imaginary) halves.
    pub fn wrt_parts(&self, array: &ComplexArray<B>) -> Option<(&[f32], &[f32])> {
        let grad = self.wrt(array)?.as_slice();
        let logical = array.logical_shape();
        Some((
            &grad[layout::real_range(&logical)],
            &grad[layout::imag_range(&logical)],
        ))
    }

    pub fn wrt_scalar(&self, scalar: &ComplexScalar<B>) -> Option<(f32, f32)> {
        self.inner
            .wrt(scalar.buffer())
            .map(|grad| (grad.as_slice()[0], grad.as_slice()[1]))
    }

    /// Gradient of a real operand.
    pub fn wrt_real(&self, tensor: &Tensor<B>) -> Option<&B::Tensor> {
        self.inner.wrt(tensor)
    }

    /// Gradient of the variable created with `requires_grad(name)`.
    pub fn by_name(&self, name: &str) -> Option<&B::Tensor> {
        self.inner.by_name(name)
    }
}
