//! Backward rules checked against central finite differences.
//!
//! Each check builds a graph from leaf tensors, contracts its output with a
//! random weight tensor and compares the analytic gradient of every leaf
//! with a numerical one.

use cx_backend_cpu::{constant, finite_diff_grad, max_grad_error, var, CpuBackend};
use cx_complex::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type C = ComplexArray<CpuBackend>;
type S = ComplexScalar<CpuBackend>;
type T = Tensor<CpuBackend>;

const EPS: f32 = 1e-2;
const TOL: f32 = 1e-2;

// ============================================================================
// Test Utilities
// ============================================================================

fn uniform(rng: &mut StdRng, shape: &Shape) -> Vec<f32> {
    (0..shape.numel()).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Values with magnitude in [0.5, 1.5), keeping |z| away from 0.
fn away_from_zero(rng: &mut StdRng, shape: &Shape) -> Vec<f32> {
    (0..shape.numel())
        .map(|_| {
            let v: f32 = rng.gen_range(0.5..1.5);
            if rng.gen_bool(0.5) {
                v
            } else {
                -v
            }
        })
        .collect()
}

fn check_gradients<F>(shapes: &[Shape], build: F)
where
    F: Fn(&[T]) -> T,
{
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<Vec<f32>> = shapes.iter().map(|s| uniform(&mut rng, s)).collect();
    check_gradients_at(shapes, data, &mut rng, build);
}

fn check_gradients_at<F>(shapes: &[Shape], data: Vec<Vec<f32>>, rng: &mut StdRng, build: F)
where
    F: Fn(&[T]) -> T,
{
    let leaves: Vec<T> = shapes
        .iter()
        .zip(&data)
        .enumerate()
        .map(|(i, (shape, values))| var(&format!("x{i}"), values.clone(), shape.clone()))
        .collect();

    let output = build(&leaves);
    let weights = uniform(rng, output.shape());
    let grads = output.backward_with(CpuBackend::from_vec(weights.clone(), output.shape().clone()));

    let numeric = finite_diff_grad(
        |inputs| {
            let leaves: Vec<T> = shapes
                .iter()
                .zip(inputs)
                .map(|(shape, values)| constant(values.clone(), shape.clone()))
                .collect();
            build(&leaves)
                .as_slice()
                .iter()
                .zip(&weights)
                .map(|(o, w)| o * w)
                .sum()
        },
        &data,
        EPS,
    );

    for (i, leaf) in leaves.iter().enumerate() {
        let analytic = grads.wrt(leaf).expect("every leaf feeds the output");
        assert_eq!(analytic.shape(), leaf.shape());
        let error = max_grad_error(analytic.as_slice(), &numeric[i]);
        assert!(
            error < TOL,
            "input {i}: analytic {:?} vs numeric {:?} (max error {error})",
            analytic.as_slice(),
            numeric[i]
        );
    }
}

fn complex(leaf: &T) -> C {
    C::from_packed(leaf.clone()).unwrap()
}

// ============================================================================
// Elementwise
// ============================================================================

#[test]
fn test_add_broadcast_gradients() {
    // (2, 3) + (1, 3)
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(2, 3)], |x| {
        (&complex(&x[0]) + &complex(&x[1])).unwrap().into_buffer()
    });
}

#[test]
fn test_empty_broadcast_gradients() {
    // (0, 3) + (1, 3) is an empty (0, 3) array; nothing flows back
    let a = C::zeros(0, 3).requires_grad("a");
    let b = C::zeros(1, 3).requires_grad("b");
    let total = (&a + &b).unwrap().sum();
    assert_eq!(total.to_pair(), (0.0, 0.0));

    let grads = total.backward();
    let da = grads.wrt(&a).unwrap();
    assert_eq!(da.shape(), &Shape::matrix(0, 3));
    let db = grads.wrt(&b).unwrap();
    assert_eq!(db.shape(), &Shape::matrix(2, 3));
    assert!(db.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn test_sub_gradients() {
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(4, 3)], |x| {
        (&complex(&x[0]) - &complex(&x[1])).unwrap().into_buffer()
    });
}

#[test]
fn test_mul_complex_gradients() {
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(4, 3)], |x| {
        (&complex(&x[0]) * &complex(&x[1])).unwrap().into_buffer()
    });
}

#[test]
fn test_mul_real_tensor_gradients() {
    // complex (2, 3) times real (1, 3), then real (2, 3) minus complex
    check_gradients(
        &[Shape::matrix(4, 3), Shape::matrix(1, 3), Shape::matrix(2, 3)],
        |x| {
            let product = (&complex(&x[0]) * &x[1]).unwrap();
            (&x[2] - &product).unwrap().into_buffer()
        },
    );
}

#[test]
fn test_complex_scalar_broadcast_gradients() {
    check_gradients(&[Shape::matrix(2, 1), Shape::matrix(4, 3)], |x| {
        let s = S::from_packed(x[0].clone()).unwrap();
        (&s * &complex(&x[1])).unwrap().into_buffer()
    });
}

#[test]
fn test_real_scalar_gradients() {
    check_gradients(&[Shape::matrix(4, 2)], |x| {
        let a = complex(&x[0]);
        let scaled = (&a * 2.5_f32).unwrap();
        (&scaled - 1.0_f32).unwrap().into_buffer()
    });
}

// ============================================================================
// Matrix Product
// ============================================================================

#[test]
fn test_matmul_complex_gradients() {
    // (2, 3) @ (3, 2)
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(6, 2)], |x| {
        complex(&x[0]).mm(&complex(&x[1])).unwrap().into_buffer()
    });
}

#[test]
fn test_matmul_real_rhs_gradients() {
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(3, 2)], |x| {
        complex(&x[0]).mm(&x[1]).unwrap().into_buffer()
    });
}

#[test]
fn test_matmul_real_lhs_gradients() {
    check_gradients(&[Shape::matrix(2, 3), Shape::matrix(6, 4)], |x| {
        cx_complex::binary(ComplexOp::MatMul, &x[0], &complex(&x[1]))
            .unwrap()
            .buffer()
            .clone()
    });
}

// ============================================================================
// Unary
// ============================================================================

#[test]
fn test_abs_gradients() {
    let shapes = [Shape::matrix(4, 3)];
    let mut rng = StdRng::seed_from_u64(9);
    let data = vec![away_from_zero(&mut rng, &shapes[0])];
    check_gradients_at(&shapes, data, &mut rng, |x| complex(&x[0]).abs());
}

#[test]
fn test_abs_zero_magnitude_gradient() {
    let a = C::from_packed(var("a", vec![0.0, 3.0, 0.0, 4.0], Shape::matrix(4, 1))).unwrap();
    let grads = a.abs().sum(None, false).backward();
    let grad = grads.by_name("a").unwrap();
    assert_eq!(grad.as_slice(), &[0.0, 0.6, 0.0, 0.8]);
    assert!(grad.as_slice().iter().all(|v| v.is_finite()));
}

#[test]
fn test_transpose_gradients() {
    // transpose (2, 3) -> (3, 2), then multiply to make every entry distinct
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(6, 2)], |x| {
        (&complex(&x[0]).t() * &complex(&x[1])).unwrap().into_buffer()
    });
}

#[test]
fn test_sum_gradients() {
    check_gradients(&[Shape::matrix(6, 2)], |x| complex(&x[0]).sum().buffer().clone());
}

#[test]
fn test_scalar_abs_gradients() {
    let shapes = [Shape::matrix(4, 2)];
    let mut rng = StdRng::seed_from_u64(13);
    // positive entries so the sum cannot cancel to 0
    let data = vec![away_from_zero(&mut rng, &shapes[0])
        .into_iter()
        .map(f32::abs)
        .collect()];
    check_gradients_at(&shapes, data, &mut rng, |x| complex(&x[0]).sum().abs());
}

// ============================================================================
// Views and Composition
// ============================================================================

#[test]
fn test_views_and_parts_gradients() {
    check_gradients(&[Shape::matrix(4, 3), Shape::matrix(2, 3), Shape::matrix(2, 3)], |x| {
        let a = complex(&x[0]);
        let b = C::from_parts(&x[1], &x[2]).unwrap();
        let product = (&a * &b).unwrap();
        &product.real() * &product.imag()
    });
}

#[test]
fn test_slice_gradients() {
    check_gradients(&[Shape::matrix(6, 4)], |x| {
        let a = complex(&x[0]);
        let window = a.slice(1..3, 0..2).unwrap();
        (&window * &window).unwrap().into_buffer()
    });
}

#[test]
fn test_chain_gradients() {
    // sum((A @ B) * C)ᵀ with complex A, B and real C
    check_gradients(
        &[Shape::matrix(4, 3), Shape::matrix(6, 2), Shape::matrix(2, 2)],
        |x| {
            let product = complex(&x[0]).mm(&complex(&x[1])).unwrap();
            (&product * &x[2]).unwrap().t().sum().buffer().clone()
        },
    );
}
