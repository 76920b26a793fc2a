//! Single complex values.

use std::fmt;

use cx_tensor::prelude::*;

use crate::dispatch::{self, ComplexOp, Value};
use crate::error::{ComplexError, Result};
use crate::gradients::ComplexGradients;
use crate::kind::Operand;

/// One complex value, kept on the tape as a packed (2, 1) buffer
/// `[re, im]` so reductions stay differentiable.
#[derive(Clone)]
pub struct ComplexScalar<B: Backend> {
    buffer: Tensor<B>,
}

impl<B: Backend> ComplexScalar<B> {
    pub fn new(re: f32, im: f32) -> Self {
        Self::from_node(Tensor::from_vec(vec![re, im], Shape::matrix(2, 1)))
    }

    /// Wrap a packed `[re, im]` buffer of shape (2, 1).
    pub fn from_packed(buffer: Tensor<B>) -> Result<Self> {
        if buffer.shape() != &Shape::matrix(2, 1) {
            return Err(ComplexError::shape(format!(
                "a complex scalar is packed as (2, 1), got {}",
                buffer.shape()
            )));
        }
        Ok(Self { buffer })
    }

    /// Track gradients under `name`. The result is a fresh leaf, detached
    /// from whatever graph produced `self`.
    pub fn requires_grad(self, name: &str) -> Self {
        Self {
            buffer: Tensor::var(name, B::clone_tensor(self.buffer.data())),
        }
    }

    pub(crate) fn from_node(buffer: Tensor<B>) -> Self {
        debug_assert_eq!(buffer.shape(), &Shape::matrix(2, 1));
        Self { buffer }
    }

    pub fn buffer(&self) -> &Tensor<B> {
        &self.buffer
    }

    pub fn real(&self) -> f32 {
        self.buffer.as_slice()[0]
    }

    pub fn imag(&self) -> f32 {
        self.buffer.as_slice()[1]
    }

    pub fn to_pair(&self) -> (f32, f32) {
        (self.real(), self.imag())
    }

    // === Arithmetic ===
    //
    // Scalar with scalar stays a scalar; scalar with a tensor broadcasts
    // into an array.

    pub fn add<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Value<B>> {
        self.binary(ComplexOp::Add, rhs.into())
    }

    pub fn sub<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Value<B>> {
        self.binary(ComplexOp::Sub, rhs.into())
    }

    pub fn mul<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Value<B>> {
        self.binary(ComplexOp::Mul, rhs.into())
    }

    fn binary(&self, op: ComplexOp, rhs: Operand<'_, B>) -> Result<Value<B>> {
        let (node, kind) = dispatch::binary_node(op, Operand::ComplexScalar(self), rhs)?;
        Ok(dispatch::wrap(node, kind))
    }

    /// Magnitude as a shape `()` real tensor.
    pub fn abs(&self) -> Tensor<B> {
        dispatch::magnitude(self.buffer.clone()).reshape(&Shape::scalar())
    }

    /// Run the backward pass with both components seeded with 1.
    pub fn backward(&self) -> ComplexGradients<B> {
        self.backward_with(1.0, 1.0)
    }

    /// Run the backward pass from an explicit upstream `(re, im)` gradient.
    pub fn backward_with(&self, re: f32, im: f32) -> ComplexGradients<B> {
        tracing::debug!(re, im, "seeding backward from complex scalar");
        let seed = B::from_vec(vec![re, im], self.buffer.shape().clone());
        ComplexGradients::new(self.buffer.backward_with(seed))
    }
}

impl<B: Backend> fmt::Debug for ComplexScalar<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexScalar")
            .field("re", &self.real())
            .field("im", &self.imag())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::OperandKind;
    use cx_backend_cpu::CpuBackend;

    type S = ComplexScalar<CpuBackend>;

    #[test]
    fn test_scalar_products_stay_scalar() {
        let a = S::new(1.0, 2.0);
        let b = S::new(3.0, -1.0);

        let product = a.mul(&b).unwrap();
        assert_eq!(product.kind(), OperandKind::ComplexScalar);
        let product = product.into_scalar().unwrap();
        // (1+2j)(3-j) = 5+5j
        assert_eq!(product.to_pair(), (5.0, 5.0));

        let shifted = a.sub(2.0_f32).unwrap().into_scalar().unwrap();
        assert_eq!(shifted.to_pair(), (-1.0, 2.0));
    }

    #[test]
    fn test_abs_is_zero_dim() {
        let z = S::new(3.0, 4.0);
        let magnitude = z.abs();
        assert!(magnitude.shape().is_scalar());
        assert_eq!(magnitude.item(), 5.0);
    }

    #[test]
    fn test_backward_through_product() {
        let a = S::new(1.0, 2.0).requires_grad("a");
        let b = S::new(3.0, -1.0);
        let product = a.mul(&b).unwrap().into_scalar().unwrap();

        let grads = product.backward_with(1.0, 0.0);
        // d(re)/dar = br, d(re)/dai = -bi
        assert_eq!(grads.wrt_scalar(&a), Some((3.0, 1.0)));
    }
}
