//! Reverse-mode automatic differentiation for tensors.

use std::collections::{HashMap, HashSet};

use crate::backend::Backend;
use crate::node::{NodeId, Tensor, TensorOp};
use crate::shape::Shape;
use crate::tensor::TensorData;

/// Container for gradient tensors computed during backward pass.
pub struct Gradients<B: Backend> {
    /// Map from node ID to gradient tensor.
    adjoints: HashMap<NodeId, B::Tensor>,
    /// Map from variable name to (NodeId, gradient) pairs.
    name_to_grads: HashMap<String, Vec<(NodeId, B::Tensor)>>,
}

impl<B: Backend> Gradients<B> {
    /// Get gradient with respect to a tensor expression.
    pub fn wrt(&self, expr: &Tensor<B>) -> Option<&B::Tensor> {
        self.adjoints.get(&expr.id())
    }

    /// Get gradient by variable name (first match if multiple).
    pub fn by_name(&self, name: &str) -> Option<&B::Tensor> {
        self.name_to_grads
            .get(name)
            .and_then(|grads| grads.first().map(|(_, g)| g))
    }
}

/// Compute gradients via reverse-mode autodiff, seeding the output with ones.
pub fn backward<B: Backend>(output: &Tensor<B>) -> Gradients<B> {
    backward_with(output, B::ones(output.shape()))
}

/// Compute gradients via reverse-mode autodiff from an explicit seed.
pub fn backward_with<B: Backend>(output: &Tensor<B>, seed: B::Tensor) -> Gradients<B> {
    assert_eq!(
        seed.shape(),
        output.shape(),
        "Seed gradient shape must match the output shape"
    );

    let topo_order = topological_sort(output);
    tracing::debug!(
        nodes = topo_order.len(),
        output = %output.shape(),
        "running backward pass"
    );

    let mut adjoints: HashMap<NodeId, B::Tensor> = HashMap::new();
    adjoints.insert(output.id(), seed);

    for expr in topo_order.iter().rev() {
        let Some(node_adjoint) = adjoints.get(&expr.id()) else {
            continue;
        };
        let node_adjoint = B::clone_tensor(node_adjoint);

        let child_grads = compute_local_gradients::<B>(expr, &node_adjoint);

        for (child, grad) in expr.children().iter().zip(child_grads.iter()) {
            if let Some(grad) = grad {
                adjoints
                    .entry(child.id())
                    .and_modify(|existing| B::accumulate_grad(existing, grad))
                    .or_insert_with(|| B::clone_tensor(grad));
            }
        }
    }

    let mut name_to_grads: HashMap<String, Vec<(NodeId, B::Tensor)>> = HashMap::new();
    for expr in &topo_order {
        if let TensorOp::Var { name } = expr.op() {
            if let Some(grad) = adjoints.get(&expr.id()) {
                name_to_grads
                    .entry(name.clone())
                    .or_default()
                    .push((expr.id(), B::clone_tensor(grad)));
            }
        }
    }

    Gradients {
        adjoints,
        name_to_grads,
    }
}

/// Compute local gradients for each child of a node.
/// Returns a vector where each element is Option<gradient> for the corresponding child.
fn compute_local_gradients<B: Backend>(
    expr: &Tensor<B>,
    upstream_grad: &B::Tensor,
) -> Vec<Option<B::Tensor>> {
    let children = expr.children();

    match expr.op() {
        TensorOp::Const | TensorOp::Var { .. } => vec![],

        TensorOp::Neg => vec![Some(B::neg(upstream_grad))],

        // === Binary element-wise with broadcasting ===
        TensorOp::Add => {
            let grad_a = B::sum_to(upstream_grad, children[0].shape());
            let grad_b = B::sum_to(upstream_grad, children[1].shape());
            vec![Some(grad_a), Some(grad_b)]
        }

        TensorOp::Sub => {
            let grad_a = B::sum_to(upstream_grad, children[0].shape());
            let neg_upstream = B::neg(upstream_grad);
            let grad_b = B::sum_to(&neg_upstream, children[1].shape());
            vec![Some(grad_a), Some(grad_b)]
        }

        TensorOp::Mul => {
            // d(a*b)/da = b, d(a*b)/db = a
            let local_a = B::mul(upstream_grad, children[1].data());
            let local_b = B::mul(upstream_grad, children[0].data());

            let grad_a = B::sum_to(&local_a, children[0].shape());
            let grad_b = B::sum_to(&local_b, children[1].shape());
            vec![Some(grad_a), Some(grad_b)]
        }

        // === Reductions ===
        TensorOp::Sum { axes, keepdims } => {
            let input_shape = children[0].shape();
            let grad = if *keepdims {
                B::broadcast_to(upstream_grad, input_shape)
            } else {
                let expanded = expand_for_broadcast::<B>(upstream_grad, input_shape, axes.as_deref());
                B::broadcast_to(&expanded, input_shape)
            };
            vec![Some(grad)]
        }

        // === Linear algebra ===
        TensorOp::MatMul => {
            // C = A @ B
            // dL/dA = dL/dC @ B^T
            // dL/dB = A^T @ dL/dC
            let b_t = B::transpose(children[1].data(), None);
            let a_t = B::transpose(children[0].data(), None);

            let grad_a = B::matmul(upstream_grad, &b_t);
            let grad_b = B::matmul(&a_t, upstream_grad);

            vec![Some(grad_a), Some(grad_b)]
        }

        // === Shape operations ===
        TensorOp::Transpose { axes } => {
            let inv_axes = axes.as_ref().map(|axes| {
                let mut inv = vec![0; axes.len()];
                for (i, &ax) in axes.iter().enumerate() {
                    inv[ax] = i;
                }
                inv
            });
            vec![Some(B::transpose(upstream_grad, inv_axes.as_deref()))]
        }

        TensorOp::Reshape { original_shape } => {
            vec![Some(B::reshape(upstream_grad, original_shape))]
        }

        TensorOp::Narrow {
            axis,
            start,
            original_shape,
        } => vec![Some(scatter_narrow::<B>(upstream_grad, original_shape, *axis, *start))],

        TensorOp::Concat { axis, split } => {
            let total = upstream_grad.shape().dim(*axis);
            let grad_a = B::narrow(upstream_grad, *axis, 0, *split);
            let grad_b = B::narrow(upstream_grad, *axis, *split, total - split);
            vec![Some(grad_a), Some(grad_b)]
        }

        TensorOp::Custom { name } => {
            let rule = expr
                .rule()
                .unwrap_or_else(|| panic!("Custom node `{name}` has no backward rule"));
            let grads = rule.backward(children, expr.data(), upstream_grad);
            assert_eq!(
                grads.len(),
                children.len(),
                "Backward rule for `{name}` returned the wrong number of gradients"
            );
            grads
        }
    }
}

/// Place the gradient of a narrowed slice back into a zero tensor of the
/// original shape.
fn scatter_narrow<B: Backend>(
    upstream: &B::Tensor,
    original_shape: &Shape,
    axis: usize,
    start: usize,
) -> B::Tensor {
    let len = upstream.shape().dim(axis);
    let tail = original_shape.dim(axis) - start - len;

    let mut grad = B::clone_tensor(upstream);
    if start > 0 {
        let head = B::zeros(&original_shape.with_dim(axis, start));
        grad = B::concat(&head, &grad, axis);
    }
    if tail > 0 {
        let rest = B::zeros(&original_shape.with_dim(axis, tail));
        grad = B::concat(&grad, &rest, axis);
    }
    grad
}

/// Expand a reduced tensor back to original shape by unsqueezing reduced axes.
fn expand_for_broadcast<B: Backend>(
    tensor: &B::Tensor,
    target_shape: &Shape,
    axes: Option<&[usize]>,
) -> B::Tensor {
    let mut result = B::clone_tensor(tensor);
    match axes {
        Some(axes) => {
            let mut sorted_axes = axes.to_vec();
            sorted_axes.sort_unstable();
            for &ax in &sorted_axes {
                result = B::unsqueeze(&result, ax);
            }
        }
        None => {
            for ax in 0..target_shape.ndim() {
                result = B::unsqueeze(&result, ax);
            }
        }
    }
    result
}

/// Topological sort via DFS postorder.
fn topological_sort<B: Backend>(root: &Tensor<B>) -> Vec<Tensor<B>> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();

    fn dfs<B: Backend>(
        expr: &Tensor<B>,
        visited: &mut HashSet<NodeId>,
        order: &mut Vec<Tensor<B>>,
    ) {
        if !visited.insert(expr.id()) {
            return;
        }

        for child in expr.children() {
            dfs(child, visited, order);
        }
        order.push(expr.clone());
    }

    dfs(root, &mut visited, &mut order);
    order
}
