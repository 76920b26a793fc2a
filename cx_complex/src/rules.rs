//! Backward rules for the complex operations.
//!
//! Every rule works on packed data: the upstream gradient of a packed
//! output is split into `(gr, gi)` and the formulas are differentiated as
//! ordinary real expressions, so the gradient of an input is taken with
//! respect to its real-valued packed buffer. Real operands only receive the
//! real half; real scalars are constants and receive nothing.

use cx_tensor::prelude::*;

use crate::kind::OperandKind;
use crate::layout::{self, Parts};

/// Which binary formula a node was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryFormula {
    Add,
    Sub,
    Mul,
    MatMul,
}

pub(crate) struct BinaryRule {
    pub formula: BinaryFormula,
    pub lhs: OperandKind,
    pub rhs: OperandKind,
}

impl<B: Backend> BackwardRule<B> for BinaryRule {
    fn backward(
        &self,
        inputs: &[Tensor<B>],
        _output: &B::Tensor,
        upstream: &B::Tensor,
    ) -> Vec<Option<B::Tensor>> {
        let a = layout::unpack::<B>(inputs[0].data(), self.lhs.is_complex());
        let b = layout::unpack::<B>(inputs[1].data(), self.rhs.is_complex());
        let (gr, gi) = layout::split::<B>(upstream);

        let (da, db) = match self.formula {
            BinaryFormula::Add => (pass_through::<B>(&gr, &gi, false), pass_through::<B>(&gr, &gi, false)),
            BinaryFormula::Sub => (pass_through::<B>(&gr, &gi, false), pass_through::<B>(&gr, &gi, true)),
            BinaryFormula::Mul => (mul_grad::<B>(&gr, &gi, &b), mul_grad::<B>(&gr, &gi, &a)),
            BinaryFormula::MatMul => matmul_grads::<B>(&gr, &gi, &a, &b),
        };

        vec![fold::<B>(da, &a, self.lhs), fold::<B>(db, &b, self.rhs)]
    }
}

/// Reduce a full-size gradient to the operand it belongs to: sum over
/// broadcast axes, drop the imaginary half of real operands.
fn fold<B: Backend>(
    grad: Parts<B::Tensor>,
    operand: &Parts<B::Tensor>,
    kind: OperandKind,
) -> Option<B::Tensor> {
    if kind == OperandKind::RealScalar {
        return None;
    }
    let re = B::sum_to(&grad.re, operand.re.shape());
    Some(match (grad.im, &operand.im) {
        (Some(gi), Some(im)) => layout::pack::<B>(&re, &B::sum_to(&gi, im.shape())),
        _ => re,
    })
}

fn pass_through<B: Backend>(gr: &B::Tensor, gi: &B::Tensor, negate: bool) -> Parts<B::Tensor> {
    if negate {
        Parts {
            re: B::neg(gr),
            im: Some(B::neg(gi)),
        }
    } else {
        Parts {
            re: B::clone_tensor(gr),
            im: Some(B::clone_tensor(gi)),
        }
    }
}

/// Gradient of `x * y` with respect to `x`, given `y`.
///
/// `dxr = gr*yr + gi*yi`, `dxi = gi*yr - gr*yi`. Multiplication commutes,
/// so the same form serves both operands.
fn mul_grad<B: Backend>(gr: &B::Tensor, gi: &B::Tensor, other: &Parts<B::Tensor>) -> Parts<B::Tensor> {
    let yr = &other.re;
    match &other.im {
        Some(yi) => Parts {
            re: B::add(&B::mul(gr, yr), &B::mul(gi, yi)),
            im: Some(B::sub(&B::mul(gi, yr), &B::mul(gr, yi))),
        },
        None => Parts {
            re: B::mul(gr, yr),
            im: Some(B::mul(gi, yr)),
        },
    }
}

fn matmul_grads<B: Backend>(
    gr: &B::Tensor,
    gi: &B::Tensor,
    a: &Parts<B::Tensor>,
    b: &Parts<B::Tensor>,
) -> (Parts<B::Tensor>, Parts<B::Tensor>) {
    let t = |x: &B::Tensor| B::transpose(x, None);
    let br_t = t(&b.re);
    let ar_t = t(&a.re);

    // dar = gr@brᵀ + gi@biᵀ, dai = gi@brᵀ - gr@biᵀ
    let da = match &b.im {
        Some(bi) => {
            let bi_t = t(bi);
            Parts {
                re: B::add(&B::matmul(gr, &br_t), &B::matmul(gi, &bi_t)),
                im: Some(B::sub(&B::matmul(gi, &br_t), &B::matmul(gr, &bi_t))),
            }
        }
        None => Parts {
            re: B::matmul(gr, &br_t),
            im: Some(B::matmul(gi, &br_t)),
        },
    };

    // dbr = arᵀ@gr + aiᵀ@gi, dbi = arᵀ@gi - aiᵀ@gr
    let db = match &a.im {
        Some(ai) => {
            let ai_t = t(ai);
            Parts {
                re: B::add(&B::matmul(&ar_t, gr), &B::matmul(&ai_t, gi)),
                im: Some(B::sub(&B::matmul(&ar_t, gi), &B::matmul(&ai_t, gr))),
            }
        }
        None => Parts {
            re: B::matmul(&ar_t, gr),
            im: Some(B::matmul(&ar_t, gi)),
        },
    };

    (da, db)
}

/// `d|z|/dar = ar/|z|`, `d|z|/dai = ai/|z|`, zero where `|z| = 0`.
pub(crate) struct AbsRule;

impl<B: Backend> BackwardRule<B> for AbsRule {
    fn backward(
        &self,
        inputs: &[Tensor<B>],
        output: &B::Tensor,
        upstream: &B::Tensor,
    ) -> Vec<Option<B::Tensor>> {
        let (ar, ai) = layout::split::<B>(inputs[0].data());
        let dar = B::div_or_zero(&B::mul(upstream, &ar), output);
        let dai = B::div_or_zero(&B::mul(upstream, &ai), output);
        vec![Some(layout::pack::<B>(&dar, &dai))]
    }
}

pub(crate) struct TransposeRule;

impl<B: Backend> BackwardRule<B> for TransposeRule {
    fn backward(
        &self,
        _inputs: &[Tensor<B>],
        _output: &B::Tensor,
        upstream: &B::Tensor,
    ) -> Vec<Option<B::Tensor>> {
        let (gr, gi) = layout::split::<B>(upstream);
        let grad = layout::pack::<B>(&B::transpose(&gr, None), &B::transpose(&gi, None));
        vec![Some(grad)]
    }
}

/// Broadcasts the (real, imag) upstream pair back over each half.
pub(crate) struct SumRule;

impl<B: Backend> BackwardRule<B> for SumRule {
    fn backward(
        &self,
        inputs: &[Tensor<B>],
        _output: &B::Tensor,
        upstream: &B::Tensor,
    ) -> Vec<Option<B::Tensor>> {
        let packed = inputs[0].shape();
        let half = Shape::matrix(packed.dim(layout::ROW_AXIS) / 2, packed.dim(1));
        let (gr, gi) = layout::split::<B>(upstream);
        let grad = layout::pack::<B>(&B::broadcast_to(&gr, &half), &B::broadcast_to(&gi, &half));
        vec![Some(grad)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cx_backend_cpu::{constant, CpuBackend};

    #[test]
    fn test_abs_rule_zero_magnitude() {
        // 0+0j and 3+4j in one column
        let packed = constant(vec![0.0, 3.0, 0.0, 4.0], Shape::matrix(4, 1));
        let output = CpuBackend::from_vec(vec![0.0, 5.0], Shape::matrix(2, 1));
        let upstream = CpuBackend::ones(&Shape::matrix(2, 1));

        let grads = AbsRule.backward(&[packed], &output, &upstream);
        let grad = grads[0].as_ref().unwrap();
        assert_eq!(grad.as_slice(), &[0.0, 0.6, 0.0, 0.8]);
    }

    #[test]
    fn test_real_scalar_gets_no_gradient() {
        let array = constant(vec![1.0, 2.0], Shape::matrix(2, 1));
        let scalar = constant(vec![3.0], Shape::scalar());
        let upstream = CpuBackend::ones(&Shape::matrix(2, 1));
        let rule = BinaryRule {
            formula: BinaryFormula::Mul,
            lhs: OperandKind::ComplexTensor,
            rhs: OperandKind::RealScalar,
        };

        let grads = rule.backward(&[array, scalar], &CpuBackend::zeros(&Shape::matrix(2, 1)), &upstream);
        assert_eq!(grads[0].as_ref().unwrap().as_slice(), &[3.0, 3.0]);
        assert!(grads[1].is_none());
    }

    #[test]
    fn test_real_tensor_gets_real_half_only() {
        // (1+2j) + [5], upstream (1, 1)
        let complex = constant(vec![1.0, 2.0], Shape::matrix(2, 1));
        let real = constant(vec![5.0], Shape::matrix(1, 1));
        let upstream = CpuBackend::from_vec(vec![1.0, 1.0], Shape::matrix(2, 1));
        let rule = BinaryRule {
            formula: BinaryFormula::Sub,
            lhs: OperandKind::ComplexTensor,
            rhs: OperandKind::RealTensor,
        };

        let grads = rule.backward(&[complex, real], &CpuBackend::zeros(&Shape::matrix(2, 1)), &upstream);
        assert_eq!(grads[0].as_ref().unwrap().as_slice(), &[1.0, 1.0]);
        let real_grad = grads[1].as_ref().unwrap();
        assert_eq!(real_grad.shape(), &Shape::matrix(1, 1));
        assert_eq!(real_grad.as_slice(), &[-1.0]);
    }

    #[test]
    fn test_sum_rule_broadcasts_each_half() {
        let packed = constant(vec![0.0; 8], Shape::matrix(4, 2));
        let upstream = CpuBackend::from_vec(vec![2.0, -1.0], Shape::matrix(2, 1));

        let grads = SumRule.backward(&[packed], &CpuBackend::zeros(&Shape::matrix(2, 1)), &upstream);
        assert_eq!(
            grads[0].as_ref().unwrap().as_slice(),
            &[2.0, 2.0, 2.0, 2.0, -1.0, -1.0, -1.0, -1.0]
        );
    }
}
