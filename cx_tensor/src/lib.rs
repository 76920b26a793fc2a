//! # cx_tensor - Real Tensor Graph with Reverse-Mode Autodiff
//!
//! The host engine for `cx_complex`. Every value is an `f32` tensor; every
//! gradient is a real gradient. Complex numbers never appear here.
//!
//! ## Building blocks
//!
//! - [`Shape`] / [`Strides`] - dimensions and row-major layout
//! - [`TensorData`] - storage contract of a backend tensor
//! - [`Backend`] - the real kernels a graph is evaluated with
//! - [`Tensor`] - `Arc`-shared graph node; operations build new nodes
//! - [`BackwardRule`] - gradient of a node registered from outside
//! - [`Gradients`] - adjoints produced by [`Tensor::backward`]
//!
//! Built-in nodes cover arithmetic, `matmul`, reductions and the shape
//! operations used for packing (`narrow`, `concat`). Fused operations
//! defined elsewhere enter the graph through [`Tensor::custom`].
//!
//! ## Example
//!
//! ```ignore
//! use cx_tensor::prelude::*;
//! use cx_backend_cpu::{var, CpuBackend};
//!
//! // Two halves stacked along rows, then split again.
//! let top = var("top", vec![1.0, 2.0], Shape::matrix(1, 2));
//! let bottom = var("bottom", vec![3.0, 4.0], Shape::matrix(1, 2));
//! let stacked = top.concat(&bottom, 0);
//!
//! let loss = (&stacked.narrow(0, 1, 1) * &top).sum(None, false);
//! let grads = loss.backward();
//! assert_eq!(grads.by_name("top").unwrap().as_slice(), &[3.0, 4.0]);
//! ```

pub mod backend;
pub mod backward;
pub mod node;
pub mod rule;
pub mod shape;
pub mod tensor;

pub use backend::Backend;
pub use backward::Gradients;
pub use node::{NodeId, Tensor, TensorOp};
pub use rule::BackwardRule;
pub use shape::{Shape, Strides};
pub use tensor::TensorData;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::backward::Gradients;
    pub use crate::node::{NodeId, Tensor, TensorOp};
    pub use crate::rule::BackwardRule;
    pub use crate::shape::{Shape, Strides};
    pub use crate::tensor::TensorData;
}
