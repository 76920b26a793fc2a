//! Operator overloads.
//!
//! Binary operators return `Result` because the operand shapes are only
//! known at runtime: `(&a + &b)?`. Scalar with scalar yields a
//! [`ComplexScalar`]; any pair involving a tensor yields a [`ComplexArray`].

use std::ops::Neg;

use cx_tensor::prelude::*;

use crate::array::ComplexArray;
use crate::dispatch::{self, ComplexOp};
use crate::error::Result;
use crate::kind::Operand;
use crate::scalar::ComplexScalar;

macro_rules! impl_complex_op {
    ($lhs:ty, $rhs:ty => $out:ident; $($trait:ident, $method:ident, $op:ident);+) => {
        $(
            impl<B: Backend> std::ops::$trait<$rhs> for $lhs {
                type Output = Result<$out<B>>;

                fn $method(self, rhs: $rhs) -> Self::Output {
                    let (node, _) = dispatch::binary_node(
                        ComplexOp::$op,
                        Operand::from(self),
                        Operand::from(rhs),
                    )?;
                    Ok($out::from_node(node))
                }
            }
        )+
    };
}

macro_rules! impl_arith {
    ($lhs:ty, $rhs:ty => $out:ident) => {
        impl_complex_op!($lhs, $rhs => $out; Add, add, Add; Sub, sub, Sub; Mul, mul, Mul);
    };
}

impl_arith!(&ComplexArray<B>, &ComplexArray<B> => ComplexArray);
impl_arith!(&ComplexArray<B>, &Tensor<B> => ComplexArray);
impl_arith!(&ComplexArray<B>, &ComplexScalar<B> => ComplexArray);
impl_arith!(&ComplexArray<B>, f32 => ComplexArray);

impl_arith!(&Tensor<B>, &ComplexArray<B> => ComplexArray);
impl_arith!(&ComplexScalar<B>, &ComplexArray<B> => ComplexArray);
impl_arith!(f32, &ComplexArray<B> => ComplexArray);

impl_arith!(&ComplexScalar<B>, &Tensor<B> => ComplexArray);
impl_arith!(&Tensor<B>, &ComplexScalar<B> => ComplexArray);

impl_arith!(&ComplexScalar<B>, &ComplexScalar<B> => ComplexScalar);
impl_arith!(&ComplexScalar<B>, f32 => ComplexScalar);
impl_arith!(f32, &ComplexScalar<B> => ComplexScalar);

impl<B: Backend> Neg for &ComplexArray<B> {
    type Output = ComplexArray<B>;

    fn neg(self) -> ComplexArray<B> {
        ComplexArray::neg(self)
    }
}

impl<B: Backend> Neg for ComplexArray<B> {
    type Output = ComplexArray<B>;

    fn neg(self) -> ComplexArray<B> {
        ComplexArray::neg(&self)
    }
}
