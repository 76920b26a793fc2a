//! CPU Backend for cx_tensor.

use cx_tensor::prelude::*;

/// CPU tensor storage.
#[derive(Clone, Debug)]
pub struct CpuTensor {
    data: Vec<f32>,
    shape: Shape,
    strides: Strides,
}

impl CpuTensor {
    /// Create a new CPU tensor from data and shape.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        let strides = shape.contiguous_strides();
        assert_eq!(
            data.len(),
            shape.numel(),
            "Data length {} doesn't match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        CpuTensor { data, shape, strides }
    }

    /// Get flat index from multi-dimensional indices.
    pub fn flat_index(&self, indices: &[usize]) -> usize {
        self.strides.index(indices)
    }

    /// Iterate over all indices in the tensor.
    pub fn indices(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        TensorIndices::new(&self.shape)
    }
}

impl TensorData for CpuTensor {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn strides(&self) -> &Strides {
        &self.strides
    }

    fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Iterator over all multi-dimensional indices of a tensor.
struct TensorIndices<'a> {
    shape: &'a Shape,
    current: Vec<usize>,
    done: bool,
}

impl<'a> TensorIndices<'a> {
    fn new(shape: &'a Shape) -> Self {
        let ndim = shape.ndim();
        TensorIndices {
            shape,
            current: vec![0; ndim],
            done: ndim > 0 && shape.numel() == 0,
        }
    }
}

impl Iterator for TensorIndices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.shape.ndim() == 0 {
            self.done = true;
            return Some(vec![]);
        }

        let result = self.current.clone();

        // Increment indices (rightmost first, like odometer)
        let mut i = self.shape.ndim() - 1;
        loop {
            self.current[i] += 1;
            if self.current[i] < self.shape.dim(i) {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
        }

        Some(result)
    }
}

/// CPU backend marker type.
#[derive(Clone, Copy, Debug)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    type Tensor = CpuTensor;

    // === Creation ===

    fn zeros(shape: &Shape) -> CpuTensor {
        CpuTensor::new(vec![0.0; shape.numel()], shape.clone())
    }

    fn ones(shape: &Shape) -> CpuTensor {
        CpuTensor::new(vec![1.0; shape.numel()], shape.clone())
    }

    fn from_vec(data: Vec<f32>, shape: Shape) -> CpuTensor {
        CpuTensor::new(data, shape)
    }

    fn scalar(value: f32) -> CpuTensor {
        CpuTensor::new(vec![value], Shape::scalar())
    }

    // === Unary element-wise ===

    fn neg(x: &CpuTensor) -> CpuTensor {
        unary_op(x, |v| -v)
    }

    fn sqrt(x: &CpuTensor) -> CpuTensor {
        unary_op(x, f32::sqrt)
    }

    // === Binary element-wise with broadcasting ===

    fn add(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x + y)
    }

    fn sub(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x - y)
    }

    fn mul(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x * y)
    }

    fn div_or_zero(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| if y == 0.0 { 0.0 } else { x / y })
    }

    // === Reductions ===

    fn sum(x: &CpuTensor, axes: Option<&[usize]>, keepdims: bool) -> CpuTensor {
        reduce_op(x, axes, keepdims, 0.0, |acc, v| acc + v)
    }

    // === Linear algebra ===

    fn matmul(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        matmul_impl(a, b)
    }

    // === Shape operations ===

    fn transpose(x: &CpuTensor, axes: Option<&[usize]>) -> CpuTensor {
        let ndim = x.shape.ndim();
        if ndim == 0 {
            return x.clone();
        }

        let perm: Vec<usize> = axes.map(|a| a.to_vec()).unwrap_or_else(|| (0..ndim).rev().collect());

        let new_shape = Shape::new(perm.iter().map(|&i| x.shape.dim(i)).collect());
        let new_strides = new_shape.contiguous_strides();
        let mut data = vec![0.0f32; x.shape.numel()];

        for idx in x.indices() {
            let src_flat = x.flat_index(&idx);
            let new_idx: Vec<usize> = perm.iter().map(|&i| idx[i]).collect();
            data[new_strides.index(&new_idx)] = x.data[src_flat];
        }

        CpuTensor::new(data, new_shape)
    }

    fn reshape(x: &CpuTensor, shape: &Shape) -> CpuTensor {
        assert_eq!(
            x.shape.numel(),
            shape.numel(),
            "Cannot reshape from {:?} to {:?}",
            x.shape,
            shape
        );
        CpuTensor::new(x.data.clone(), shape.clone())
    }

    fn broadcast_to(x: &CpuTensor, shape: &Shape) -> CpuTensor {
        if x.shape() == shape {
            return x.clone();
        }

        let x_ndim = x.shape.ndim();
        let offset = shape.ndim() - x_ndim;
        let out_strides = shape.contiguous_strides();

        let mut data = vec![0.0f32; shape.numel()];

        for out_idx in TensorIndices::new(shape) {
            // Size-1 input dimensions always read index 0
            let in_idx: Vec<usize> = (0..x_ndim)
                .map(|i| if x.shape.dim(i) == 1 { 0 } else { out_idx[offset + i] })
                .collect();

            let in_flat = if in_idx.is_empty() { 0 } else { x.strides.index(&in_idx) };
            data[out_strides.index(&out_idx)] = x.data[in_flat];
        }

        CpuTensor::new(data, shape.clone())
    }

    fn sum_to(x: &CpuTensor, shape: &Shape) -> CpuTensor {
        if x.shape() == shape {
            return x.clone();
        }

        let x_ndim = x.shape.ndim();
        let target_ndim = shape.ndim();
        let offset = x_ndim - target_ndim;

        // Leading axes missing from the target, then axes the target holds at
        // size 1. A length-0 axis reduces to zeros.
        let mut axes: Vec<usize> = (0..offset).collect();
        for i in 0..target_ndim {
            if shape.dim(i) == 1 && x.shape.dim(offset + i) != 1 {
                axes.push(offset + i);
            }
        }

        if axes.is_empty() {
            return Self::reshape(x, shape);
        }

        let result = Self::sum(x, Some(&axes), false);
        Self::reshape(&result, shape)
    }

    fn narrow(x: &CpuTensor, axis: usize, start: usize, len: usize) -> CpuTensor {
        let dim = x.shape.dim(axis);
        assert!(
            start + len <= dim,
            "Cannot narrow axis {} of {:?} to {}..{}",
            axis,
            x.shape,
            start,
            start + len
        );

        let outer = x.shape.outer_size(axis);
        let inner = x.shape.inner_size(axis);
        let mut data = Vec::with_capacity(outer * len * inner);
        for o in 0..outer {
            let begin = (o * dim + start) * inner;
            data.extend_from_slice(&x.data[begin..begin + len * inner]);
        }

        CpuTensor::new(data, x.shape.with_dim(axis, len))
    }

    fn concat(a: &CpuTensor, b: &CpuTensor, axis: usize) -> CpuTensor {
        let out_shape = a.shape.concat_with(&b.shape, axis).unwrap_or_else(|| {
            panic!("Cannot concat {:?} and {:?} along axis {}", a.shape, b.shape, axis)
        });

        let outer = a.shape.outer_size(axis);
        let a_chunk = a.shape.dim(axis) * a.shape.inner_size(axis);
        let b_chunk = b.shape.dim(axis) * b.shape.inner_size(axis);
        let mut data = Vec::with_capacity(out_shape.numel());
        for o in 0..outer {
            data.extend_from_slice(&a.data[o * a_chunk..(o + 1) * a_chunk]);
            data.extend_from_slice(&b.data[o * b_chunk..(o + 1) * b_chunk]);
        }

        CpuTensor::new(data, out_shape)
    }

    fn unsqueeze(x: &CpuTensor, axis: usize) -> CpuTensor {
        let mut new_dims = x.shape.dims().to_vec();
        new_dims.insert(axis, 1);
        CpuTensor::new(x.data.clone(), Shape::new(new_dims))
    }

    // === Gradient accumulation ===

    fn accumulate_grad(dst: &mut CpuTensor, src: &CpuTensor) {
        assert_eq!(dst.shape, src.shape);
        for (d, s) in dst.data.iter_mut().zip(src.data.iter()) {
            *d += s;
        }
    }

    fn clone_tensor(x: &CpuTensor) -> CpuTensor {
        x.clone()
    }
}

fn unary_op<F>(x: &CpuTensor, op: F) -> CpuTensor
where
    F: Fn(f32) -> f32,
{
    let data: Vec<f32> = x.data.iter().map(|&v| op(v)).collect();
    CpuTensor::new(data, x.shape.clone())
}

/// Binary operation with broadcasting.
fn binary_op_broadcast<F>(a: &CpuTensor, b: &CpuTensor, op: F) -> CpuTensor
where
    F: Fn(f32, f32) -> f32,
{
    let out_shape = a
        .shape
        .broadcast_with(&b.shape)
        .unwrap_or_else(|| panic!("Shapes {:?} and {:?} are not broadcast compatible", a.shape, b.shape));

    let a_broadcast = CpuBackend::broadcast_to(a, &out_shape);
    let b_broadcast = CpuBackend::broadcast_to(b, &out_shape);

    let data: Vec<f32> = a_broadcast
        .data
        .iter()
        .zip(b_broadcast.data.iter())
        .map(|(&x, &y)| op(x, y))
        .collect();

    CpuTensor::new(data, out_shape)
}

/// Reduction operation over specified axes.
fn reduce_op<F>(
    x: &CpuTensor,
    axes: Option<&[usize]>,
    keepdims: bool,
    init: f32,
    op: F,
) -> CpuTensor
where
    F: Fn(f32, f32) -> f32,
{
    let ndim = x.shape.ndim();
    if ndim == 0 {
        return x.clone();
    }

    let reduce_axes: Vec<usize> = axes
        .map(|a| a.to_vec())
        .unwrap_or_else(|| (0..ndim).collect());

    // Reduced axes become 1 (keepdims) or disappear
    let project = |idx: &[usize]| -> Vec<usize> {
        (0..ndim)
            .filter_map(|i| match (reduce_axes.contains(&i), keepdims) {
                (true, true) => Some(0),
                (true, false) => None,
                (false, _) => Some(idx[i]),
            })
            .collect()
    };

    let out_dims: Vec<usize> = (0..ndim)
        .filter_map(|i| match (reduce_axes.contains(&i), keepdims) {
            (true, true) => Some(1),
            (true, false) => None,
            (false, _) => Some(x.shape.dim(i)),
        })
        .collect();
    let out_shape = Shape::new(out_dims);
    let out_strides = out_shape.contiguous_strides();

    let mut data = vec![init; out_shape.numel()];

    for in_idx in x.indices() {
        let out_idx = project(&in_idx);
        let out_flat = if out_idx.is_empty() { 0 } else { out_strides.index(&out_idx) };
        data[out_flat] = op(data[out_flat], x.data[x.flat_index(&in_idx)]);
    }

    CpuTensor::new(data, out_shape)
}

/// Matrix multiplication: (M, K) @ (K, N) -> (M, N).
fn matmul_impl(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
    assert!(
        a.shape.is_matrix() && b.shape.is_matrix(),
        "matmul requires 2-D tensors, got {:?} and {:?}",
        a.shape,
        b.shape
    );

    let m = a.shape.dim(0);
    let k = a.shape.dim(1);
    let n = b.shape.dim(1);
    assert_eq!(k, b.shape.dim(0), "Matrix dimensions don't match for matmul");

    let mut data = vec![0.0f32; m * n];
    for i in 0..m {
        for l in 0..k {
            let a_il = a.data[i * k + l];
            for j in 0..n {
                data[i * n + j] += a_il * b.data[l * n + j];
            }
        }
    }
    CpuTensor::new(data, Shape::matrix(m, n))
}

/// Type alias for graph tensors using the CPU backend.
pub type CpuExpr = Tensor<CpuBackend>;

/// Create a variable tensor.
pub fn var(name: &str, data: Vec<f32>, shape: Shape) -> CpuExpr {
    Tensor::var(name, CpuBackend::from_vec(data, shape))
}

/// Create a constant tensor.
pub fn constant(data: Vec<f32>, shape: Shape) -> CpuExpr {
    Tensor::constant(CpuBackend::from_vec(data, shape))
}

/// Central finite-difference gradients of a scalar function.
///
/// `f` receives the (perturbed) flat data of every input and builds
/// whatever graph it needs from it. Returns one gradient vector per input,
/// each the length of that input.
pub fn finite_diff_grad<F>(f: F, inputs: &[Vec<f32>], eps: f32) -> Vec<Vec<f32>>
where
    F: Fn(&[Vec<f32>]) -> f32,
{
    let mut perturbed = inputs.to_vec();
    let mut grads = Vec::with_capacity(inputs.len());

    for input_idx in 0..inputs.len() {
        let mut input_grads = Vec::with_capacity(inputs[input_idx].len());

        for elem_idx in 0..inputs[input_idx].len() {
            let original = inputs[input_idx][elem_idx];

            perturbed[input_idx][elem_idx] = original + eps;
            let f_plus = f(&perturbed);

            perturbed[input_idx][elem_idx] = original - eps;
            let f_minus = f(&perturbed);

            perturbed[input_idx][elem_idx] = original;

            input_grads.push((f_plus - f_minus) / (2.0 * eps));
        }

        grads.push(input_grads);
    }

    grads
}

/// Largest absolute element-wise difference between two gradient vectors.
pub fn max_grad_error(grad1: &[f32], grad2: &[f32]) -> f32 {
    assert_eq!(grad1.len(), grad2.len());
    grad1
        .iter()
        .zip(grad2.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(data: Vec<f32>, rows: usize, cols: usize) -> CpuTensor {
        CpuBackend::from_vec(data, Shape::matrix(rows, cols))
    }

    #[test]
    fn test_tensor_creation() {
        let t = CpuBackend::zeros(&Shape::matrix(2, 3));
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.as_slice(), &[0.0; 6]);

        let t2 = CpuBackend::ones(&Shape::matrix(2, 3));
        assert_eq!(t2.as_slice(), &[1.0; 6]);

        let s = CpuBackend::scalar(42.0);
        assert!(s.shape().is_scalar());
        assert_eq!(s.scalar_value(), 42.0);
    }

    #[test]
    fn test_unary_ops() {
        let x = CpuBackend::from_vec(vec![4.0, 9.0, 0.0], Shape::new(vec![3]));
        assert_eq!(CpuBackend::neg(&x).as_slice(), &[-4.0, -9.0, -0.0]);
        assert_eq!(CpuBackend::sqrt(&x).as_slice(), &[2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_binary_ops_broadcast() {
        let a = m(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let b = CpuBackend::from_vec(vec![10.0, 20.0], Shape::new(vec![2]));
        assert_eq!(CpuBackend::add(&a, &b).as_slice(), &[11.0, 22.0, 13.0, 24.0]);
        assert_eq!(CpuBackend::sub(&a, &CpuBackend::scalar(1.0)).as_slice(), &[0.0, 1.0, 2.0, 3.0]);

        let c = m(vec![2.0], 1, 1);
        assert_eq!(CpuBackend::mul(&a, &c).as_slice(), &[2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_div_or_zero() {
        let a = CpuBackend::from_vec(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        let b = CpuBackend::from_vec(vec![2.0, 0.0, -3.0], Shape::new(vec![3]));
        assert_eq!(CpuBackend::div_or_zero(&a, &b).as_slice(), &[0.5, 0.0, -1.0]);
    }

    #[test]
    fn test_sum_reduction() {
        let x = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);

        let total = CpuBackend::sum(&x, None, false);
        assert!(total.shape().is_scalar());
        assert_eq!(total.scalar_value(), 21.0);

        let sum0 = CpuBackend::sum(&x, Some(&[0]), false);
        assert_eq!(sum0.as_slice(), &[5.0, 7.0, 9.0]);

        let sum1 = CpuBackend::sum(&x, Some(&[1]), true);
        assert_eq!(sum1.shape().dims(), &[2, 1]);
        assert_eq!(sum1.as_slice(), &[6.0, 15.0]);
    }

    #[test]
    fn test_sum_to() {
        let x = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        assert_eq!(CpuBackend::sum_to(&x, &Shape::matrix(1, 1)).as_slice(), &[21.0]);
        assert!(CpuBackend::sum_to(&x, &Shape::scalar()).shape().is_scalar());
        assert_eq!(CpuBackend::sum_to(&x, &Shape::matrix(1, 3)).as_slice(), &[5.0, 7.0, 9.0]);

        let empty = m(vec![], 0, 3);
        let folded = CpuBackend::sum_to(&empty, &Shape::matrix(1, 3));
        assert_eq!(folded.shape(), &Shape::matrix(1, 3));
        assert_eq!(folded.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_matmul() {
        let a = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        let b = m(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], 3, 2);

        let c = CpuBackend::matmul(&a, &b);
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_transpose() {
        let x = m(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        let t = CpuBackend::transpose(&x, None);
        assert_eq!(t.shape().dims(), &[3, 2]);
        assert_eq!(t.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_narrow_rows_and_cols() {
        let x = m((0..12).map(|v| v as f32).collect(), 4, 3);

        let bottom = CpuBackend::narrow(&x, 0, 2, 2);
        assert_eq!(bottom.shape().dims(), &[2, 3]);
        assert_eq!(bottom.as_slice(), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);

        let middle = CpuBackend::narrow(&x, 1, 1, 1);
        assert_eq!(middle.shape().dims(), &[4, 1]);
        assert_eq!(middle.as_slice(), &[1.0, 4.0, 7.0, 10.0]);
    }

    #[test]
    fn test_concat_inverts_narrow() {
        let x = m((0..12).map(|v| v as f32).collect(), 4, 3);
        for axis in 0..2 {
            let size = x.shape().dim(axis);
            let head = CpuBackend::narrow(&x, axis, 0, 1);
            let tail = CpuBackend::narrow(&x, axis, 1, size - 1);
            let joined = CpuBackend::concat(&head, &tail, axis);
            assert_eq!(joined.shape(), x.shape());
            assert_eq!(joined.as_slice(), x.as_slice());
        }
    }

    #[test]
    #[should_panic(expected = "Cannot concat")]
    fn test_concat_mismatch_panics() {
        let a = m(vec![1.0; 6], 2, 3);
        let b = m(vec![1.0; 4], 2, 2);
        CpuBackend::concat(&a, &b, 0);
    }

    // === Autodiff tests ===

    fn assert_grad_close(name: &str, autodiff: &[f32], finite_diff: &[f32], tol: f32) {
        let err = max_grad_error(autodiff, finite_diff);
        assert!(
            err < tol,
            "{}: autodiff={:?}, finite_diff={:?}, max err={}",
            name,
            autodiff,
            finite_diff,
            err
        );
    }

    #[test]
    fn test_autodiff_add_mul() {
        let x = var("x", vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        let y = var("y", vec![4.0, 5.0, 6.0], Shape::new(vec![3]));

        let z = (&x * &y + &x).sum(None, false);
        let grads = z.backward();

        assert_eq!(grads.wrt(&x).unwrap().as_slice(), &[5.0, 6.0, 7.0]);
        assert_eq!(grads.wrt(&y).unwrap().as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(grads.by_name("y").unwrap().as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_autodiff_broadcast_grad() {
        let x = var("x", vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        let y = Tensor::<CpuBackend>::var("y", CpuBackend::scalar(10.0));

        let z = (&x - &y).sum(None, false);
        let grads = z.backward();

        assert_eq!(grads.wrt(&x).unwrap().as_slice(), &[1.0, 1.0, 1.0]);
        assert_eq!(grads.wrt(&y).unwrap().as_slice(), &[-3.0]);
    }

    #[test]
    fn test_autodiff_matmul() {
        let a_data = vec![1.0, 2.0, 3.0, 4.0];
        let b_data = vec![5.0, 6.0, 7.0, 8.0];
        let a = var("A", a_data.clone(), Shape::matrix(2, 2));
        let b = var("B", b_data.clone(), Shape::matrix(2, 2));

        let grads = a.matmul(&b).sum(None, false).backward();

        let fd = finite_diff_grad(
            |inputs| {
                let a = constant(inputs[0].clone(), Shape::matrix(2, 2));
                let b = constant(inputs[1].clone(), Shape::matrix(2, 2));
                a.matmul(&b).sum(None, false).item()
            },
            &[a_data, b_data],
            1e-2,
        );

        assert_grad_close("matmul_A", grads.wrt(&a).unwrap().as_slice(), &fd[0], 1e-2);
        assert_grad_close("matmul_B", grads.wrt(&b).unwrap().as_slice(), &fd[1], 1e-2);
    }

    #[test]
    fn test_autodiff_narrow_concat() {
        let x = var("x", (0..6).map(|v| v as f32).collect(), Shape::matrix(3, 2));

        // Keep rows 1..3 twice over: once directly, once after a round trip
        let tail = x.narrow(0, 1, 2);
        let rejoined = x.narrow(0, 0, 1).concat(&tail, 0);
        let z = (&tail.sum(None, false) + &rejoined.sum(None, false)).sum(None, false);

        let grads = z.backward();
        assert_eq!(
            grads.wrt(&x).unwrap().as_slice(),
            &[1.0, 1.0, 2.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn test_autodiff_transpose_reshape() {
        let x = var("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::matrix(2, 3));
        let w = constant(vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0], Shape::matrix(3, 2));

        let z = (&x.t() * &w).reshape(&Shape::new(vec![6])).sum(None, false);
        let grads = z.backward();

        let dx = grads.wrt(&x).unwrap();
        assert_eq!(dx.shape().dims(), &[2, 3]);
        assert_eq!(dx.as_slice(), &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_backward_with_seed() {
        let x = var("x", vec![1.0, 2.0], Shape::matrix(2, 1));
        let y = x.neg();
        let grads = y.backward_with(CpuBackend::from_vec(vec![3.0, -1.0], Shape::matrix(2, 1)));
        assert_eq!(grads.wrt(&x).unwrap().as_slice(), &[-3.0, 1.0]);
    }

    /// Doubles its input: y = 2x.
    struct Doubling;

    impl BackwardRule<CpuBackend> for Doubling {
        fn backward(
            &self,
            _inputs: &[CpuExpr],
            _output: &CpuTensor,
            upstream: &CpuTensor,
        ) -> Vec<Option<CpuTensor>> {
            vec![Some(CpuBackend::add(upstream, upstream))]
        }
    }

    #[test]
    fn test_custom_rule() {
        let x = var("x", vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        let doubled = CpuBackend::add(x.data(), x.data());
        let y = Tensor::custom("double", doubled, vec![x.clone()], Doubling);

        assert!(matches!(y.op(), TensorOp::Custom { name: "double" }));
        assert_eq!(y.as_slice(), &[2.0, 4.0, 6.0]);

        let grads = (&y * &y).sum(None, false).backward();
        // d(sum(4x^2))/dx = 8x
        assert_eq!(grads.wrt(&x).unwrap().as_slice(), &[8.0, 16.0, 24.0]);
    }

    #[test]
    fn test_finite_diff_quadratic() {
        let f = |v: &[Vec<f32>]| v[0][0] * v[0][0] + 2.0 * v[0][0] * v[1][0];
        let grads = finite_diff_grad(f, &[vec![1.0], vec![2.0]], 1e-2);
        assert!((grads[0][0] - 6.0).abs() < 1e-3);
        assert!((grads[1][0] - 2.0).abs() < 1e-3);
    }
}
