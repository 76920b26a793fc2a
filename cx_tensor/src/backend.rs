//! Backend trait - the real-valued kernels the graph is evaluated with.
//!
//! Every operation is real-valued. Anything richer (such as complex
//! arithmetic) is layered on top by composing these kernels.

use crate::shape::Shape;
use crate::tensor::TensorData;

/// Backend trait for tensor computation.
pub trait Backend: Clone + Send + Sync + 'static {
    /// The tensor type for this backend.
    type Tensor: TensorData;

    // === Creation ===

    /// Create a tensor of zeros with the given shape.
    fn zeros(shape: &Shape) -> Self::Tensor;

    /// Create a tensor of ones with the given shape.
    fn ones(shape: &Shape) -> Self::Tensor;

    /// Create a tensor from a flat row-major data vector and shape.
    fn from_vec(data: Vec<f32>, shape: Shape) -> Self::Tensor;

    /// Create a scalar (0-dim) tensor.
    fn scalar(value: f32) -> Self::Tensor;

    // === Element-wise unary operations ===

    /// Negate: -x
    fn neg(x: &Self::Tensor) -> Self::Tensor;

    /// Square root: sqrt(x)
    fn sqrt(x: &Self::Tensor) -> Self::Tensor;

    // === Element-wise binary operations ===
    // These handle broadcasting automatically.

    /// Addition: a + b
    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    /// Subtraction: a - b
    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    /// Multiplication: a * b
    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    /// Guarded division: a / b where b != 0, and 0 where b == 0.
    fn div_or_zero(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    // === Reductions ===

    /// Sum over specified axes (None = all axes -> scalar).
    fn sum(x: &Self::Tensor, axes: Option<&[usize]>, keepdims: bool) -> Self::Tensor;

    // === Linear algebra ===

    /// Matrix multiplication: (M, K) @ (K, N) -> (M, N)
    fn matmul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    // === Shape operations ===

    /// Transpose axes. None = reverse all axes.
    fn transpose(x: &Self::Tensor, axes: Option<&[usize]>) -> Self::Tensor;

    /// Reshape to new shape (must have same numel).
    fn reshape(x: &Self::Tensor, shape: &Shape) -> Self::Tensor;

    /// Broadcast to a larger shape.
    fn broadcast_to(x: &Self::Tensor, shape: &Shape) -> Self::Tensor;

    /// Sum along broadcast axes to reduce shape back.
    /// Used during backward pass for gradient reduction.
    fn sum_to(x: &Self::Tensor, shape: &Shape) -> Self::Tensor;

    /// Take `len` consecutive entries along `axis`, starting at `start`.
    fn narrow(x: &Self::Tensor, axis: usize, start: usize, len: usize) -> Self::Tensor;

    /// Join two tensors along `axis`; every other dimension must agree.
    fn concat(a: &Self::Tensor, b: &Self::Tensor, axis: usize) -> Self::Tensor;

    /// Add a dimension of size 1.
    fn unsqueeze(x: &Self::Tensor, axis: usize) -> Self::Tensor;

    // === Gradient accumulation ===

    /// Accumulate gradient: dst += src
    fn accumulate_grad(dst: &mut Self::Tensor, src: &Self::Tensor);

    /// Clone tensor data.
    fn clone_tensor(x: &Self::Tensor) -> Self::Tensor;
}
