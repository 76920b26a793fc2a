//! Packed storage convention.
//!
//! A complex array of logical shape (n, m) is stored as one real tensor of
//! shape (2n, m). Rows `[0, n)` hold the real part and rows `[n, 2n)` hold
//! the imaginary part. Both halves are contiguous in row-major order, so the
//! flat data of the real part is the first `n * m` values and the imaginary
//! part the next `n * m`.

use std::ops::Range;

use cx_tensor::prelude::*;

use crate::error::{ComplexError, Result};

/// Axis along which the two halves are stacked.
pub const ROW_AXIS: usize = 0;

/// Logical (n, m) shape of a packed (2n, m) shape.
pub fn logical_shape(packed: &Shape) -> Result<Shape> {
    if !packed.is_matrix() {
        return Err(ComplexError::shape(format!(
            "packed buffer must be 2-D, got shape {packed}"
        )));
    }
    let rows = packed.dim(ROW_AXIS);
    if rows % 2 != 0 {
        return Err(ComplexError::shape(format!(
            "packed buffer {packed} has an odd row count ({rows}); \
             expected real rows on top of the same number of imaginary rows"
        )));
    }
    Ok(Shape::matrix(rows / 2, packed.dim(1)))
}

/// Packed (2n, m) shape for a logical (n, m) shape.
pub fn packed_shape(logical: &Shape) -> Shape {
    Shape::matrix(2 * logical.dim(0), logical.dim(1))
}

/// Flat element range of the real half.
pub fn real_range(logical: &Shape) -> Range<usize> {
    0..logical.numel()
}

/// Flat element range of the imaginary half.
pub fn imag_range(logical: &Shape) -> Range<usize> {
    let len = logical.numel();
    len..2 * len
}

/// Split packed data into its (real, imaginary) halves.
pub fn split<B: Backend>(packed: &B::Tensor) -> (B::Tensor, B::Tensor) {
    let n = packed.shape().dim(ROW_AXIS) / 2;
    (
        B::narrow(packed, ROW_AXIS, 0, n),
        B::narrow(packed, ROW_AXIS, n, n),
    )
}

/// Stack a real part on top of an imaginary part.
pub fn pack<B: Backend>(real: &B::Tensor, imag: &B::Tensor) -> B::Tensor {
    B::concat(real, imag, ROW_AXIS)
}

/// One operand's values split by the packing convention. Real operands
/// have no imaginary part (`im` is `None`, read as zero).
pub struct Parts<T> {
    pub re: T,
    pub im: Option<T>,
}

impl<T> Parts<T> {
    pub fn is_complex(&self) -> bool {
        self.im.is_some()
    }
}

/// Split `data` if it is packed complex data, otherwise take it as the real part.
pub fn unpack<B: Backend>(data: &B::Tensor, complex: bool) -> Parts<B::Tensor> {
    if complex {
        let (re, im) = split::<B>(data);
        Parts { re, im: Some(im) }
    } else {
        Parts {
            re: B::clone_tensor(data),
            im: None,
        }
    }
}

/// Inverse of [`unpack`]: re-pack complex parts, pass real parts through.
pub fn repack<B: Backend>(parts: Parts<B::Tensor>) -> B::Tensor {
    match parts.im {
        Some(im) => pack::<B>(&parts.re, &im),
        None => parts.re,
    }
}
