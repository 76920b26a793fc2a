//! Complex arrays over a packed real buffer.

use std::fmt;
use std::ops::Range;

use cx_tensor::prelude::*;
use rand::Rng;

use crate::dispatch::{self, ComplexOp, OutputKind};
use crate::error::{ComplexError, Result};
use crate::kind::Operand;
use crate::layout::{self, ROW_AXIS};
use crate::scalar::ComplexScalar;

/// A complex array of logical shape (n, m), stored as one real tensor of
/// shape (2n, m) with the real part on top of the imaginary part.
///
/// The buffer is a node of the host graph, so every operation on the array
/// is recorded on the tape and can be differentiated. Operations never
/// mutate their operands; each result owns a new buffer.
///
/// Note that [`shape`](Self::shape) and [`size`](Self::size) report the
/// *packed* shape. Use [`logical_shape`](Self::logical_shape) for (n, m).
#[derive(Clone)]
pub struct ComplexArray<B: Backend> {
    buffer: Tensor<B>,
}

impl<B: Backend> ComplexArray<B> {
    // === Construction ===

    /// Wrap an existing packed buffer. Fails on a non 2-D buffer or an odd
    /// row count.
    pub fn from_packed(buffer: Tensor<B>) -> Result<Self> {
        layout::logical_shape(buffer.shape())?;
        Ok(Self { buffer })
    }

    /// Build from nested rows that are already packed: the first half of
    /// the rows is the real part, the second half the imaginary part.
    pub fn from_packed_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let (data, shape) = flatten_rows(rows)?;
        Self::from_packed(Tensor::from_vec(data, shape))
    }

    /// Build from nested rows of real values; the imaginary part is zero.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let (mut data, shape) = flatten_rows(rows)?;
        data.resize(2 * data.len(), 0.0);
        Ok(Self::from_node(Tensor::from_vec(data, layout::packed_shape(&shape))))
    }

    /// Pack a real and an imaginary part of the same (n, m) shape.
    ///
    /// The parts stay connected to the graph: gradients of the result flow
    /// back into `real` and `imag`.
    pub fn from_parts(real: &Tensor<B>, imag: &Tensor<B>) -> Result<Self> {
        if real.shape() != imag.shape() {
            return Err(ComplexError::shape(format!(
                "real part {} and imaginary part {} differ in shape",
                real.shape(),
                imag.shape()
            )));
        }
        if !real.shape().is_matrix() {
            return Err(ComplexError::shape(format!(
                "complex parts must be 2-D, got {}",
                real.shape()
            )));
        }
        Ok(Self::from_node(real.concat(imag, ROW_AXIS)))
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_node(Tensor::zeros(&Shape::matrix(2 * rows, cols)))
    }

    /// Both halves uniform in [-1, 1).
    pub fn random(rows: usize, cols: usize) -> Self {
        Self::random_with(&mut rand::thread_rng(), rows, cols)
    }

    pub fn random_with<R: Rng>(rng: &mut R, rows: usize, cols: usize) -> Self {
        let shape = Shape::matrix(2 * rows, cols);
        let data: Vec<f32> = (0..shape.numel()).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Self::from_node(Tensor::from_vec(data, shape))
    }

    /// Track gradients: re-create the buffer as a named graph variable.
    ///
    /// The new variable is a leaf. Called on an array produced by an
    /// operation, it detaches the values from that upstream graph.
    pub fn requires_grad(self, name: &str) -> Self {
        Self {
            buffer: Tensor::var(name, B::clone_tensor(self.buffer.data())),
        }
    }

    /// Copy a leaf array into a fresh buffer, keeping its variable name.
    /// Arrays produced by operations are rejected.
    pub fn deep_copy(&self) -> Result<Self> {
        let data = B::clone_tensor(self.buffer.data());
        let buffer = match self.buffer.op() {
            TensorOp::Var { name } => Tensor::var(name, data),
            TensorOp::Const => Tensor::constant(data),
            _ => return Err(ComplexError::NonLeafCopy),
        };
        Ok(Self { buffer })
    }

    /// Replace the whole packed buffer.
    pub fn replace_buffer(&mut self, buffer: Tensor<B>) -> Result<()> {
        layout::logical_shape(buffer.shape())?;
        tracing::debug!(
            from = %self.buffer.shape(),
            to = %buffer.shape(),
            "replacing packed buffer"
        );
        self.buffer = buffer;
        Ok(())
    }

    pub fn with_buffer(mut self, buffer: Tensor<B>) -> Result<Self> {
        self.replace_buffer(buffer)?;
        Ok(self)
    }

    /// Wrap a buffer the crate built itself, already known to be packed.
    pub(crate) fn from_node(buffer: Tensor<B>) -> Self {
        debug_assert!(layout::logical_shape(buffer.shape()).is_ok());
        Self { buffer }
    }

    // === Accessors ===

    /// The packed graph node.
    pub fn buffer(&self) -> &Tensor<B> {
        &self.buffer
    }

    pub fn into_buffer(self) -> Tensor<B> {
        self.buffer
    }

    /// Packed shape (2n, m).
    pub fn shape(&self) -> &Shape {
        self.buffer.shape()
    }

    /// Same as [`shape`](Self::shape): the packed (2n, m).
    pub fn size(&self) -> &Shape {
        self.shape()
    }

    /// Logical shape (n, m).
    pub fn logical_shape(&self) -> Shape {
        Shape::matrix(self.rows(), self.cols())
    }

    /// Logical row count n.
    pub fn rows(&self) -> usize {
        self.shape().dim(ROW_AXIS) / 2
    }

    pub fn cols(&self) -> usize {
        self.shape().dim(1)
    }

    /// Real part as a differentiable (n, m) tensor.
    pub fn real(&self) -> Tensor<B> {
        self.buffer.narrow(ROW_AXIS, 0, self.rows())
    }

    /// Imaginary part as a differentiable (n, m) tensor.
    pub fn imag(&self) -> Tensor<B> {
        self.buffer.narrow(ROW_AXIS, self.rows(), self.rows())
    }

    /// Row-major values of the real half, borrowed from the buffer.
    pub fn real_values(&self) -> &[f32] {
        &self.buffer.as_slice()[layout::real_range(&self.logical_shape())]
    }

    /// Row-major values of the imaginary half, borrowed from the buffer.
    pub fn imag_values(&self) -> &[f32] {
        &self.buffer.as_slice()[layout::imag_range(&self.logical_shape())]
    }

    /// Value at logical position (row, col) as a (re, im) pair.
    pub fn get(&self, row: usize, col: usize) -> Option<(f32, f32)> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        let flat = row * self.cols() + col;
        Some((self.real_values()[flat], self.imag_values()[flat]))
    }

    pub fn is_leaf(&self) -> bool {
        self.buffer.is_leaf()
    }

    /// Variable name when created with [`requires_grad`](Self::requires_grad).
    pub fn var_name(&self) -> Option<&str> {
        self.buffer.var_name()
    }

    // === Arithmetic ===

    pub fn add<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Self> {
        self.binary(ComplexOp::Add, rhs.into())
    }

    pub fn sub<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Self> {
        self.binary(ComplexOp::Sub, rhs.into())
    }

    /// Elementwise product.
    pub fn mul<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Self> {
        self.binary(ComplexOp::Mul, rhs.into())
    }

    /// Matrix product with a complex or real 2-D operand.
    pub fn mm<'a>(&self, rhs: impl Into<Operand<'a, B>>) -> Result<Self> {
        self.binary(ComplexOp::MatMul, rhs.into())
    }

    fn binary(&self, op: ComplexOp, rhs: Operand<'_, B>) -> Result<Self> {
        let (node, kind) = dispatch::binary_node(op, Operand::Complex(self), rhs)?;
        debug_assert_eq!(kind, OutputKind::ComplexTensor);
        Ok(Self::from_node(node))
    }

    /// Elementwise magnitude, a real tensor of the logical shape.
    pub fn abs(&self) -> Tensor<B> {
        dispatch::magnitude(self.buffer.clone())
    }

    /// Transpose both halves; the logical shape becomes (m, n).
    pub fn t(&self) -> Self {
        dispatch::transpose_array(self)
    }

    pub fn transpose(&self) -> Self {
        self.t()
    }

    /// Sum of all elements.
    pub fn sum(&self) -> ComplexScalar<B> {
        dispatch::sum_node(self.buffer.clone())
    }

    pub fn neg(&self) -> Self {
        Self::from_node(self.buffer.neg())
    }

    /// Sub-array over logical `rows` and `cols`, re-packed.
    pub fn slice(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Self> {
        let shape = self.logical_shape();
        if !in_bounds(&rows, shape.dim(0)) || !in_bounds(&cols, shape.dim(1)) {
            return Err(ComplexError::shape(format!(
                "slice [{rows:?}, {cols:?}] is out of bounds for logical shape {shape}"
            )));
        }
        let window = |half: Tensor<B>| {
            half.narrow(0, rows.start, rows.len())
                .narrow(1, cols.start, cols.len())
        };
        let re = window(self.real());
        let im = window(self.imag());
        Ok(Self::from_node(re.concat(&im, ROW_AXIS)))
    }
}

impl<B: Backend> fmt::Debug for ComplexArray<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexArray")
            .field("logical_shape", &self.logical_shape())
            .field("buffer", &self.buffer)
            .finish()
    }
}

/// Flatten nested rows into row-major data, rejecting ragged input.
fn flatten_rows(rows: &[Vec<f32>]) -> Result<(Vec<f32>, Shape)> {
    let cols = rows.first().map_or(0, Vec::len);
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols) {
        return Err(ComplexError::shape(format!(
            "row {index} has {} values, expected {cols}",
            row.len()
        )));
    }
    Ok((rows.concat(), Shape::matrix(rows.len(), cols)))
}

fn in_bounds(range: &Range<usize>, len: usize) -> bool {
    range.start <= range.end && range.end <= len
}
