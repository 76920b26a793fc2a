//! # cx_complex - Complex Tensor Algebra over a Real Autodiff Engine
//!
//! Complex arrays are stored as ordinary real tensors of the host engine
//! (`cx_tensor`): an array of logical shape (n, m) is one (2n, m) tensor
//! with the real part in the top rows and the imaginary part in the bottom
//! rows. The host never sees a complex number.
//!
//! ## Overview
//!
//! - [`ComplexArray`] - packed 2-D complex array and its arithmetic
//! - [`ComplexScalar`] - single complex value produced by reductions
//! - [`OperandKind`] / [`Operand`] - the four argument kinds an op accepts
//! - [`dispatch`] - kind-pair table selecting the complex formula
//! - [`ComplexGradients`] - gradients w.r.t. packed buffers
//!
//! Every operation is registered on the host tape with its own backward
//! rule, so gradients flow through complex arithmetic with respect to the
//! real-valued packed buffers.
//!
//! ## Example
//!
//! ```ignore
//! use cx_complex::prelude::*;
//! use cx_backend_cpu::{constant, CpuBackend};
//!
//! let a = ComplexArray::<CpuBackend>::from_packed_rows(&[
//!     vec![1.0, 1.0, 1.0],
//!     vec![2.0, 2.0, 2.0],
//!     vec![3.0, 3.0, 3.0],
//!     vec![4.0, 4.0, 4.0],
//! ])?
//! .requires_grad("a");
//! let x = constant(vec![3.0, 3.0, 4.0, 4.0, 2.0, 2.0], Shape::matrix(3, 2));
//!
//! let total = a.mm(&x)?.sum();
//! assert_eq!(total.to_string(), "54+126j");
//!
//! let grads = total.backward();
//! let da = grads.wrt(&a).unwrap();
//! ```

pub mod array;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod gradients;
pub mod kind;
pub mod layout;
pub mod ops;
mod rules;
pub mod scalar;

pub use array::ComplexArray;
pub use dispatch::{abs, binary, sum, transpose, ComplexOp, OutputKind, Value};
pub use error::{ComplexError, Result};
pub use gradients::ComplexGradients;
pub use kind::{Operand, OperandKind};
pub use scalar::ComplexScalar;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::array::ComplexArray;
    pub use crate::dispatch::{ComplexOp, Value};
    pub use crate::error::ComplexError;
    pub use crate::gradients::ComplexGradients;
    pub use crate::kind::{Operand, OperandKind};
    pub use crate::scalar::ComplexScalar;
    pub use cx_tensor::prelude::*;
}
