//! Operation dispatch.
//!
//! Each operation classifies its operands, looks the kind pair up in a
//! table, validates logical shapes, runs the complex formula as real
//! sub-operations on the host backend and registers the result on the tape
//! with the matching backward rule from [`crate::rules`].
//!
//! | Op | Real part | Imag part |
//! |---|---|---|
//! | add | `ar + br` | `ai + bi` |
//! | sub | `ar - br` | `ai - bi` |
//! | mul | `ar*br - ai*bi` | `ar*bi + ai*br` |
//! | matmul | `ar@br - ai@bi` | `ar@bi + ai@br` |
//!
//! A real operand has `bi = 0`; the formulas skip the zero terms instead of
//! materializing them.

use std::fmt;

use cx_tensor::prelude::*;

use crate::array::ComplexArray;
use crate::error::{ComplexError, Result};
use crate::kind::{Operand, OperandKind};
use crate::layout::{self, Parts};
use crate::rules::{AbsRule, BinaryFormula, BinaryRule, SumRule, TransposeRule};
use crate::scalar::ComplexScalar;

/// Operations understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComplexOp {
    Add,
    Sub,
    Mul,
    MatMul,
    Abs,
    Transpose,
    Sum,
}

impl ComplexOp {
    pub const ALL: [ComplexOp; 7] = [
        ComplexOp::Add,
        ComplexOp::Sub,
        ComplexOp::Mul,
        ComplexOp::MatMul,
        ComplexOp::Abs,
        ComplexOp::Transpose,
        ComplexOp::Sum,
    ];

    /// Name of the tape node registered for this op.
    pub fn node_name(self) -> &'static str {
        match self {
            ComplexOp::Add => "complex_add",
            ComplexOp::Sub => "complex_sub",
            ComplexOp::Mul => "complex_mul",
            ComplexOp::MatMul => "complex_matmul",
            ComplexOp::Abs => "complex_abs",
            ComplexOp::Transpose => "complex_transpose",
            ComplexOp::Sum => "complex_sum",
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            ComplexOp::Add | ComplexOp::Sub | ComplexOp::Mul | ComplexOp::MatMul
        )
    }

    fn formula(self) -> Option<BinaryFormula> {
        match self {
            ComplexOp::Add => Some(BinaryFormula::Add),
            ComplexOp::Sub => Some(BinaryFormula::Sub),
            ComplexOp::Mul => Some(BinaryFormula::Mul),
            ComplexOp::MatMul => Some(BinaryFormula::MatMul),
            _ => None,
        }
    }
}

impl fmt::Display for ComplexOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComplexOp::Add => "add",
            ComplexOp::Sub => "sub",
            ComplexOp::Mul => "mul",
            ComplexOp::MatMul => "matmul",
            ComplexOp::Abs => "abs",
            ComplexOp::Transpose => "transpose",
            ComplexOp::Sum => "sum",
        };
        f.write_str(name)
    }
}

/// Kind of value an operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    ComplexTensor,
    ComplexScalar,
    /// Plain host tensor (magnitudes).
    RealTensor,
}

/// Dispatch table for binary ops. `None` means the pair is unsupported.
pub fn binary_output(op: ComplexOp, lhs: OperandKind, rhs: OperandKind) -> Option<OutputKind> {
    use OperandKind::*;

    match op {
        ComplexOp::Add | ComplexOp::Sub | ComplexOp::Mul => match (lhs, rhs) {
            (ComplexScalar, ComplexScalar | RealScalar) | (RealScalar, ComplexScalar) => {
                Some(OutputKind::ComplexScalar)
            }
            (ComplexTensor, _) | (_, ComplexTensor) => Some(OutputKind::ComplexTensor),
            (RealTensor, ComplexScalar) | (ComplexScalar, RealTensor) => {
                Some(OutputKind::ComplexTensor)
            }
            (RealTensor | RealScalar, RealTensor | RealScalar) => None,
        },
        ComplexOp::MatMul => match (lhs, rhs) {
            (ComplexTensor, ComplexTensor | RealTensor) | (RealTensor, ComplexTensor) => {
                Some(OutputKind::ComplexTensor)
            }
            _ => None,
        },
        ComplexOp::Abs | ComplexOp::Transpose | ComplexOp::Sum => None,
    }
}

/// Dispatch table for unary ops. `None` means the kind is unsupported.
pub fn unary_output(op: ComplexOp, kind: OperandKind) -> Option<OutputKind> {
    match (op, kind) {
        (ComplexOp::Abs, OperandKind::ComplexTensor | OperandKind::ComplexScalar) => {
            Some(OutputKind::RealTensor)
        }
        (ComplexOp::Transpose, OperandKind::ComplexTensor) => Some(OutputKind::ComplexTensor),
        (ComplexOp::Sum, OperandKind::ComplexTensor | OperandKind::ComplexScalar) => {
            Some(OutputKind::ComplexScalar)
        }
        _ => None,
    }
}

/// Result of a binary op whose output kind depends on the operands.
pub enum Value<B: Backend> {
    Array(ComplexArray<B>),
    Scalar(ComplexScalar<B>),
}

impl<B: Backend> Value<B> {
    pub fn kind(&self) -> OperandKind {
        match self {
            Value::Array(_) => OperandKind::ComplexTensor,
            Value::Scalar(_) => OperandKind::ComplexScalar,
        }
    }

    pub fn into_array(self) -> Option<ComplexArray<B>> {
        match self {
            Value::Array(array) => Some(array),
            Value::Scalar(_) => None,
        }
    }

    pub fn into_scalar(self) -> Option<ComplexScalar<B>> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            Value::Array(_) => None,
        }
    }

    /// Packed graph node of the value.
    pub fn buffer(&self) -> &Tensor<B> {
        match self {
            Value::Array(array) => array.buffer(),
            Value::Scalar(scalar) => scalar.buffer(),
        }
    }
}

impl<B: Backend> fmt::Debug for Value<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Array(array) => f.debug_tuple("Array").field(array).finish(),
            Value::Scalar(scalar) => f.debug_tuple("Scalar").field(scalar).finish(),
        }
    }
}

/// Apply a binary op to any supported pair of operands.
pub fn binary<'l, 'r, B: Backend>(
    op: ComplexOp,
    lhs: impl Into<Operand<'l, B>>,
    rhs: impl Into<Operand<'r, B>>,
) -> Result<Value<B>> {
    let (node, kind) = binary_node(op, lhs.into(), rhs.into())?;
    Ok(wrap(node, kind))
}

pub(crate) fn wrap<B: Backend>(node: Tensor<B>, kind: OutputKind) -> Value<B> {
    match kind {
        OutputKind::ComplexScalar => Value::Scalar(ComplexScalar::from_node(node)),
        _ => Value::Array(ComplexArray::from_node(node)),
    }
}

/// Validate, compute and register a binary op. Returns the packed result
/// node and what it represents.
pub(crate) fn binary_node<B: Backend>(
    op: ComplexOp,
    lhs: Operand<'_, B>,
    rhs: Operand<'_, B>,
) -> Result<(Tensor<B>, OutputKind)> {
    let (lhs_kind, rhs_kind) = (lhs.kind(), rhs.kind());
    let (lhs_shape, rhs_shape) = (lhs.logical_shape(), rhs.logical_shape());
    tracing::trace!(
        %op,
        lhs = %lhs_kind,
        rhs = %rhs_kind,
        lhs_shape = %lhs_shape,
        rhs_shape = %rhs_shape,
        "dispatching complex op"
    );

    let (Some(formula), Some(kind)) = (op.formula(), binary_output(op, lhs_kind, rhs_kind)) else {
        return Err(ComplexError::UnsupportedOperand {
            op,
            operands: format!("{lhs_kind}, {rhs_kind}"),
        });
    };

    let out_shape = match formula {
        BinaryFormula::MatMul => matmul_shape(&lhs_shape, &rhs_shape)?,
        _ => elementwise_shape(op, &lhs_shape, &rhs_shape)?,
    };

    let lhs_node = lhs.node();
    let rhs_node = rhs.node();
    let a = layout::unpack::<B>(lhs_node.data(), lhs_kind.is_complex());
    let b = layout::unpack::<B>(rhs_node.data(), rhs_kind.is_complex());

    let (re, im) = match formula {
        BinaryFormula::Add => (B::add(&a.re, &b.re), add_imag::<B>(&a, &b, false, &out_shape)),
        BinaryFormula::Sub => (B::sub(&a.re, &b.re), add_imag::<B>(&a, &b, true, &out_shape)),
        BinaryFormula::Mul => mul_parts::<B>(&a, &b, &out_shape),
        BinaryFormula::MatMul => matmul_parts::<B>(&a, &b, &out_shape),
    };
    let packed = layout::pack::<B>(&B::broadcast_to(&re, &out_shape), &im);

    let rule = BinaryRule {
        formula,
        lhs: lhs_kind,
        rhs: rhs_kind,
    };
    let node = Tensor::custom(op.node_name(), packed, vec![lhs_node, rhs_node], rule);
    Ok((node, kind))
}

/// Broadcast result of two logical shapes, which must come out 2-D.
fn elementwise_shape(op: ComplexOp, lhs: &Shape, rhs: &Shape) -> Result<Shape> {
    let out = lhs.broadcast_with(rhs).ok_or_else(|| {
        ComplexError::shape(format!(
            "cannot {op} operands of logical shapes {lhs} and {rhs}"
        ))
    })?;
    if !out.is_matrix() {
        return Err(ComplexError::shape(format!(
            "{op} of logical shapes {lhs} and {rhs} gives {out}; complex results must be 2-D"
        )));
    }
    Ok(out)
}

fn matmul_shape(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
    if !lhs.is_matrix() || !rhs.is_matrix() || lhs.dim(1) != rhs.dim(0) {
        return Err(ComplexError::shape(format!(
            "cannot matmul operands of logical shapes {lhs} and {rhs}"
        )));
    }
    Ok(Shape::matrix(lhs.dim(0), rhs.dim(1)))
}

/// `ai ± bi`, where a missing part is zero.
fn add_imag<B: Backend>(
    a: &Parts<B::Tensor>,
    b: &Parts<B::Tensor>,
    negate_rhs: bool,
    out: &Shape,
) -> B::Tensor {
    match (&a.im, &b.im) {
        (Some(ai), Some(bi)) if negate_rhs => B::sub(ai, bi),
        (Some(ai), Some(bi)) => B::add(ai, bi),
        (Some(ai), None) => B::broadcast_to(ai, out),
        (None, Some(bi)) => {
            let bi = B::broadcast_to(bi, out);
            if negate_rhs {
                B::neg(&bi)
            } else {
                bi
            }
        }
        (None, None) => B::zeros(out),
    }
}

fn mul_parts<B: Backend>(
    a: &Parts<B::Tensor>,
    b: &Parts<B::Tensor>,
    out: &Shape,
) -> (B::Tensor, B::Tensor) {
    let rr = B::mul(&a.re, &b.re);
    match (&a.im, &b.im) {
        (Some(ai), Some(bi)) => (
            B::sub(&rr, &B::mul(ai, bi)),
            B::add(&B::mul(&a.re, bi), &B::mul(ai, &b.re)),
        ),
        (Some(ai), None) => (rr, B::broadcast_to(&B::mul(ai, &b.re), out)),
        (None, Some(bi)) => (rr, B::broadcast_to(&B::mul(&a.re, bi), out)),
        (None, None) => (rr, B::zeros(out)),
    }
}

fn matmul_parts<B: Backend>(
    a: &Parts<B::Tensor>,
    b: &Parts<B::Tensor>,
    out: &Shape,
) -> (B::Tensor, B::Tensor) {
    let rr = B::matmul(&a.re, &b.re);
    match (&a.im, &b.im) {
        (Some(ai), Some(bi)) => (
            B::sub(&rr, &B::matmul(ai, bi)),
            B::add(&B::matmul(&a.re, bi), &B::matmul(ai, &b.re)),
        ),
        (Some(ai), None) => (rr, B::matmul(ai, &b.re)),
        (None, Some(bi)) => (rr, B::matmul(&a.re, bi)),
        (None, None) => (rr, B::zeros(out)),
    }
}

/// Elementwise magnitude `sqrt(ar^2 + ai^2)` as a real host tensor.
///
/// Complex arrays give a tensor of the logical shape, complex scalars a
/// shape `()` scalar. Real operands are a [`ComplexError::Domain`] error.
pub fn abs<'a, B: Backend>(operand: impl Into<Operand<'a, B>>) -> Result<Tensor<B>> {
    let operand = operand.into();
    let kind = operand.kind();
    tracing::trace!(op = %ComplexOp::Abs, operand = %kind, "dispatching complex op");

    if unary_output(ComplexOp::Abs, kind).is_none() {
        return Err(ComplexError::Domain {
            op: ComplexOp::Abs,
            reason: format!("magnitude needs a complex operand, got {kind}"),
        });
    }

    let node = magnitude(operand.node());
    Ok(match kind {
        OperandKind::ComplexScalar => node.reshape(&Shape::scalar()),
        _ => node,
    })
}

pub(crate) fn magnitude<B: Backend>(packed: Tensor<B>) -> Tensor<B> {
    let (re, im) = layout::split::<B>(packed.data());
    let data = B::sqrt(&B::add(&B::mul(&re, &re), &B::mul(&im, &im)));
    Tensor::custom(ComplexOp::Abs.node_name(), data, vec![packed], AbsRule)
}

/// Transpose of a complex array; logical (n, m) becomes (m, n).
pub fn transpose<'a, B: Backend>(operand: impl Into<Operand<'a, B>>) -> Result<ComplexArray<B>> {
    let operand = operand.into();
    let kind = operand.kind();
    tracing::trace!(op = %ComplexOp::Transpose, operand = %kind, "dispatching complex op");

    let Operand::Complex(array) = operand else {
        return Err(ComplexError::UnsupportedOperand {
            op: ComplexOp::Transpose,
            operands: kind.to_string(),
        });
    };
    Ok(transpose_array(array))
}

pub(crate) fn transpose_array<B: Backend>(array: &ComplexArray<B>) -> ComplexArray<B> {
    let packed = array.buffer().clone();
    let (re, im) = layout::split::<B>(packed.data());
    let data = layout::pack::<B>(&B::transpose(&re, None), &B::transpose(&im, None));
    ComplexArray::from_node(Tensor::custom(
        ComplexOp::Transpose.node_name(),
        data,
        vec![packed],
        TransposeRule,
    ))
}

/// Sum of every element, reducing real and imaginary halves independently.
pub fn sum<'a, B: Backend>(operand: impl Into<Operand<'a, B>>) -> Result<ComplexScalar<B>> {
    let operand = operand.into();
    let kind = operand.kind();
    tracing::trace!(op = %ComplexOp::Sum, operand = %kind, "dispatching complex op");

    if unary_output(ComplexOp::Sum, kind).is_none() {
        return Err(ComplexError::UnsupportedOperand {
            op: ComplexOp::Sum,
            operands: kind.to_string(),
        });
    }
    Ok(sum_node(operand.node()))
}

pub(crate) fn sum_node<B: Backend>(packed: Tensor<B>) -> ComplexScalar<B> {
    let (re, im) = layout::split::<B>(packed.data());
    let data = layout::pack::<B>(&B::sum(&re, None, true), &B::sum(&im, None, true));
    ComplexScalar::from_node(Tensor::custom(
        ComplexOp::Sum.node_name(),
        data,
        vec![packed],
        SumRule,
    ))
}
