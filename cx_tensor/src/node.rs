//! Computation graph nodes for tensor autodiff.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::Backend;
use crate::rule::BackwardRule;
use crate::shape::Shape;
use crate::tensor::TensorData;

/// Global counter for unique node IDs.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_node_id() -> u64 {
    NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Unique identifier for a node in the computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u64);

/// Operations in the computation graph.
#[derive(Debug, Clone)]
pub enum TensorOp {
    // === Leaf nodes ===
    /// Constant tensor (gradient is not reported by name).
    Const,
    /// Variable tensor (gradient is tracked).
    Var { name: String },

    // === Element-wise ===
    Neg,
    Add,
    Sub,
    Mul,

    // === Reductions ===
    Sum {
        axes: Option<Vec<usize>>,
        keepdims: bool,
    },

    // === Linear algebra ===
    MatMul,

    // === Shape operations ===
    Transpose {
        axes: Option<Vec<usize>>,
    },
    Reshape {
        original_shape: Shape,
    },
    Narrow {
        axis: usize,
        start: usize,
        original_shape: Shape,
    },
    Concat {
        axis: usize,
        split: usize,
    },

    // === Registered from outside the crate ===
    /// Node whose gradient comes from a [`BackwardRule`].
    Custom { name: &'static str },
}

/// Internal node structure.
pub struct TensorNode<B: Backend> {
    pub id: NodeId,
    pub op: TensorOp,
    pub data: B::Tensor,
    pub children: Vec<Tensor<B>>,
    pub rule: Option<Arc<dyn BackwardRule<B>>>,
}

impl<B: Backend> std::fmt::Debug for TensorNode<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorNode")
            .field("id", &self.id)
            .field("op", &self.op)
            .field("shape", self.data.shape())
            .field("children", &self.children.len())
            .finish()
    }
}

/// A tensor expression in the computation graph.
/// Reference-counted for efficient sharing.
#[derive(Clone)]
pub struct Tensor<B: Backend>(pub(crate) Arc<TensorNode<B>>);

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.0.id)
            .field("op", &self.0.op)
            .field("shape", self.shape())
            .finish()
    }
}

impl<B: Backend> Tensor<B> {
    fn new_node(op: TensorOp, data: B::Tensor, children: Vec<Tensor<B>>) -> Self {
        Tensor(Arc::new(TensorNode {
            id: NodeId(next_node_id()),
            op,
            data,
            children,
            rule: None,
        }))
    }

    // === Constructors ===

    /// Create a variable tensor (tracked for gradients).
    pub fn var(name: &str, data: B::Tensor) -> Self {
        Self::new_node(TensorOp::Var { name: name.to_string() }, data, vec![])
    }

    /// Create a constant tensor.
    pub fn constant(data: B::Tensor) -> Self {
        Self::new_node(TensorOp::Const, data, vec![])
    }

    /// Create a zeros tensor.
    pub fn zeros(shape: &Shape) -> Self {
        Self::constant(B::zeros(shape))
    }

    /// Create a scalar tensor.
    pub fn scalar(value: f32) -> Self {
        Self::constant(B::scalar(value))
    }

    /// Create a tensor from data.
    pub fn from_vec(data: Vec<f32>, shape: Shape) -> Self {
        Self::constant(B::from_vec(data, shape))
    }

    /// Register a node computed outside the graph.
    ///
    /// `data` is the forward value the caller already computed from
    /// `children`; `rule` supplies the gradients during backward.
    pub fn custom(
        name: &'static str,
        data: B::Tensor,
        children: Vec<Tensor<B>>,
        rule: impl BackwardRule<B>,
    ) -> Self {
        Tensor(Arc::new(TensorNode {
            id: NodeId(next_node_id()),
            op: TensorOp::Custom { name },
            data,
            children,
            rule: Some(Arc::new(rule)),
        }))
    }

    // === Accessors ===

    /// Get unique node ID.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Get the operation.
    pub fn op(&self) -> &TensorOp {
        &self.0.op
    }

    /// Get the tensor data.
    pub fn data(&self) -> &B::Tensor {
        &self.0.data
    }

    /// Get child tensors.
    pub fn children(&self) -> &[Tensor<B>] {
        &self.0.children
    }

    /// Backward rule of a custom node.
    pub fn rule(&self) -> Option<&dyn BackwardRule<B>> {
        self.0.rule.as_deref()
    }

    /// Get the shape.
    pub fn shape(&self) -> &Shape {
        self.0.data.shape()
    }

    /// Get number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape().ndim()
    }

    /// Get number of elements.
    pub fn numel(&self) -> usize {
        self.shape().numel()
    }

    /// Check if this node was created directly rather than by an operation.
    pub fn is_leaf(&self) -> bool {
        matches!(self.0.op, TensorOp::Var { .. } | TensorOp::Const)
    }

    /// Get variable name if this is a variable.
    pub fn var_name(&self) -> Option<&str> {
        match &self.0.op {
            TensorOp::Var { name } => Some(name),
            _ => None,
        }
    }

    /// Get data as slice (for reading values).
    pub fn as_slice(&self) -> &[f32] {
        self.0.data.as_slice()
    }

    /// Get scalar value.
    pub fn item(&self) -> f32 {
        self.0.data.scalar_value()
    }

    // === Element-wise ===

    /// Negate: -self
    pub fn neg(&self) -> Self {
        Self::new_node(TensorOp::Neg, B::neg(&self.0.data), vec![self.clone()])
    }

    /// Add: self + other
    pub fn add(&self, other: &Self) -> Self {
        Self::new_node(
            TensorOp::Add,
            B::add(&self.0.data, &other.0.data),
            vec![self.clone(), other.clone()],
        )
    }

    /// Subtract: self - other
    pub fn sub(&self, other: &Self) -> Self {
        Self::new_node(
            TensorOp::Sub,
            B::sub(&self.0.data, &other.0.data),
            vec![self.clone(), other.clone()],
        )
    }

    /// Multiply: self * other
    pub fn mul(&self, other: &Self) -> Self {
        Self::new_node(
            TensorOp::Mul,
            B::mul(&self.0.data, &other.0.data),
            vec![self.clone(), other.clone()],
        )
    }

    // === Reductions ===

    /// Sum over axes (None = all axes -> scalar).
    pub fn sum(&self, axes: Option<&[usize]>, keepdims: bool) -> Self {
        Self::new_node(
            TensorOp::Sum {
                axes: axes.map(|a| a.to_vec()),
                keepdims,
            },
            B::sum(&self.0.data, axes, keepdims),
            vec![self.clone()],
        )
    }

    // === Linear algebra ===

    /// Matrix multiplication: self @ other
    pub fn matmul(&self, other: &Self) -> Self {
        Self::new_node(
            TensorOp::MatMul,
            B::matmul(&self.0.data, &other.0.data),
            vec![self.clone(), other.clone()],
        )
    }

    // === Shape operations ===

    /// Transpose. None = reverse all axes.
    pub fn transpose(&self, axes: Option<&[usize]>) -> Self {
        Self::new_node(
            TensorOp::Transpose {
                axes: axes.map(|a| a.to_vec()),
            },
            B::transpose(&self.0.data, axes),
            vec![self.clone()],
        )
    }

    /// Matrix transpose.
    pub fn t(&self) -> Self {
        self.transpose(None)
    }

    /// Reshape to new shape.
    pub fn reshape(&self, shape: &Shape) -> Self {
        let original_shape = self.shape().clone();
        Self::new_node(
            TensorOp::Reshape { original_shape },
            B::reshape(&self.0.data, shape),
            vec![self.clone()],
        )
    }

    /// Take `len` entries along `axis` starting at `start`.
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Self {
        let original_shape = self.shape().clone();
        Self::new_node(
            TensorOp::Narrow {
                axis,
                start,
                original_shape,
            },
            B::narrow(&self.0.data, axis, start, len),
            vec![self.clone()],
        )
    }

    /// Join `other` after `self` along `axis`.
    pub fn concat(&self, other: &Self, axis: usize) -> Self {
        let split = self.shape().dim(axis);
        Self::new_node(
            TensorOp::Concat { axis, split },
            B::concat(&self.0.data, &other.0.data, axis),
            vec![self.clone(), other.clone()],
        )
    }

    /// Compute gradients via reverse-mode autodiff, seeded with ones.
    pub fn backward(&self) -> crate::backward::Gradients<B> {
        crate::backward::backward(self)
    }

    /// Compute gradients via reverse-mode autodiff from an explicit seed
    /// gradient of this tensor's shape.
    pub fn backward_with(&self, seed: B::Tensor) -> crate::backward::Gradients<B> {
        crate::backward::backward_with(self, seed)
    }
}

// === Operator overloads ===

impl<B: Backend> std::ops::Neg for &Tensor<B> {
    type Output = Tensor<B>;
    fn neg(self) -> Tensor<B> {
        Tensor::neg(self)
    }
}

impl<B: Backend> std::ops::Neg for Tensor<B> {
    type Output = Tensor<B>;
    fn neg(self) -> Tensor<B> {
        Tensor::neg(&self)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        impl<B: Backend> std::ops::$trait for &Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: &Tensor<B>) -> Tensor<B> {
                Tensor::$method(self, rhs)
            }
        }

        impl<B: Backend> std::ops::$trait<Tensor<B>> for &Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: Tensor<B>) -> Tensor<B> {
                Tensor::$method(self, &rhs)
            }
        }

        impl<B: Backend> std::ops::$trait<&Tensor<B>> for Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: &Tensor<B>) -> Tensor<B> {
                Tensor::$method(&self, rhs)
            }
        }

        impl<B: Backend> std::ops::$trait for Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: Tensor<B>) -> Tensor<B> {
                Tensor::$method(&self, &rhs)
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
