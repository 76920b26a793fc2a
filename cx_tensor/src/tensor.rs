//! TensorData trait - the storage contract every backend tensor satisfies.

use crate::shape::{Shape, Strides};

/// Core trait for tensor data storage.
/// Backends implement this to provide the actual tensor operations.
pub trait TensorData: Clone + Send + Sync + 'static {
    /// Get the shape of this tensor.
    fn shape(&self) -> &Shape;

    /// Get the strides of this tensor.
    fn strides(&self) -> &Strides;

    /// Get the total number of elements.
    fn numel(&self) -> usize {
        self.shape().numel()
    }

    /// Check if this is a scalar (0-dim tensor).
    fn is_scalar(&self) -> bool {
        self.shape().is_scalar()
    }

    /// Get data as a contiguous row-major f32 slice.
    fn as_slice(&self) -> &[f32];

    /// Copy the data out into an owned vector.
    fn to_vec(&self) -> Vec<f32> {
        self.as_slice().to_vec()
    }

    /// Get the single value of a one-element tensor (panics otherwise).
    fn scalar_value(&self) -> f32 {
        assert_eq!(self.numel(), 1, "Expected a one-element tensor");
        self.as_slice()[0]
    }
}
