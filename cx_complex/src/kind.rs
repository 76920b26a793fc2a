//! Operand classification.
//!
//! Every operation starts by tagging each argument with an [`OperandKind`];
//! the dispatcher picks its formula from the ordered pair of kinds alone.

use std::fmt;

use cx_tensor::prelude::*;

use crate::array::ComplexArray;
use crate::scalar::ComplexScalar;

/// The four kinds of argument a complex operation can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    ComplexTensor,
    RealTensor,
    ComplexScalar,
    RealScalar,
}

impl OperandKind {
    pub const ALL: [OperandKind; 4] = [
        OperandKind::ComplexTensor,
        OperandKind::RealTensor,
        OperandKind::ComplexScalar,
        OperandKind::RealScalar,
    ];

    /// Whether the operand carries an imaginary part.
    pub fn is_complex(self) -> bool {
        matches!(self, OperandKind::ComplexTensor | OperandKind::ComplexScalar)
    }

    /// Whether the operand is a single value rather than a 2-D array.
    pub fn is_scalar(self) -> bool {
        matches!(self, OperandKind::ComplexScalar | OperandKind::RealScalar)
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A borrowed argument to a complex operation.
pub enum Operand<'a, B: Backend> {
    Complex(&'a ComplexArray<B>),
    Real(&'a Tensor<B>),
    ComplexScalar(&'a ComplexScalar<B>),
    RealScalar(f32),
}

impl<B: Backend> Clone for Operand<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for Operand<'_, B> {}

impl<'a, B: Backend> Operand<'a, B> {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Complex(_) => OperandKind::ComplexTensor,
            Operand::Real(_) => OperandKind::RealTensor,
            Operand::ComplexScalar(_) => OperandKind::ComplexScalar,
            Operand::RealScalar(_) => OperandKind::RealScalar,
        }
    }

    /// Shape as the user sees it: (n, m) for a complex array, (1, 1) for a
    /// complex scalar, the tensor's own shape for real operands.
    pub fn logical_shape(&self) -> Shape {
        match self {
            Operand::Complex(array) => array.logical_shape(),
            Operand::Real(tensor) => tensor.shape().clone(),
            Operand::ComplexScalar(_) => Shape::matrix(1, 1),
            Operand::RealScalar(_) => Shape::scalar(),
        }
    }

    /// Graph node holding the operand's values: the packed buffer for
    /// complex kinds, the tensor itself for real ones. A real scalar becomes
    /// a fresh constant.
    pub(crate) fn node(&self) -> Tensor<B> {
        match self {
            Operand::Complex(array) => array.buffer().clone(),
            Operand::Real(tensor) => (*tensor).clone(),
            Operand::ComplexScalar(scalar) => scalar.buffer().clone(),
            Operand::RealScalar(value) => Tensor::scalar(*value),
        }
    }
}

impl<'a, B: Backend> From<&'a ComplexArray<B>> for Operand<'a, B> {
    fn from(array: &'a ComplexArray<B>) -> Self {
        Operand::Complex(array)
    }
}

impl<'a, B: Backend> From<&'a Tensor<B>> for Operand<'a, B> {
    fn from(tensor: &'a Tensor<B>) -> Self {
        Operand::Real(tensor)
    }
}

impl<'a, B: Backend> From<&'a ComplexScalar<B>> for Operand<'a, B> {
    fn from(scalar: &'a ComplexScalar<B>) -> Self {
        Operand::ComplexScalar(scalar)
    }
}

impl<B: Backend> From<f32> for Operand<'_, B> {
    fn from(value: f32) -> Self {
        Operand::RealScalar(value)
    }
}
