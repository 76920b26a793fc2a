//! Text rendering of complex values.
//!
//! Elements print as `(R+Ij)` or `(R-Ij)` inside a nested-bracket layout;
//! scalars print bare as `R+Ij`. A formatter precision (`{:.2}`) applies to
//! every component.

use std::fmt;

use cx_tensor::prelude::*;

use crate::array::ComplexArray;
use crate::dispatch::Value;
use crate::scalar::ComplexScalar;

const ARRAY_PREFIX: &str = "ComplexArray(";

fn write_complex(f: &mut fmt::Formatter<'_>, re: f32, im: f32) -> fmt::Result {
    let sign = if im < 0.0 { '-' } else { '+' };
    let im = im.abs();
    match f.precision() {
        Some(precision) => write!(f, "{re:.precision$}{sign}{im:.precision$}j"),
        None => write!(f, "{re}{sign}{im}j"),
    }
}

impl<B: Backend> fmt::Display for ComplexArray<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (re, im) = (self.real_values(), self.imag_values());
        let cols = self.cols();

        f.write_str(ARRAY_PREFIX)?;
        f.write_str("[")?;
        for row in 0..self.rows() {
            if row > 0 {
                // Align continuation rows under the first one.
                write!(f, ",\n{:width$}", "", width = ARRAY_PREFIX.len() + 1)?;
            }
            f.write_str("[")?;
            for col in 0..cols {
                if col > 0 {
                    f.write_str(", ")?;
                }
                let flat = row * cols + col;
                f.write_str("(")?;
                write_complex(f, re[flat], im[flat])?;
                f.write_str(")")?;
            }
            f.write_str("]")?;
        }
        f.write_str("])")
    }
}

impl<B: Backend> fmt::Display for ComplexScalar<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_complex(f, self.real(), self.imag())
    }
}

impl<B: Backend> fmt::Display for Value<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Array(array) => fmt::Display::fmt(array, f),
            Value::Scalar(scalar) => fmt::Display::fmt(scalar, f),
        }
    }
}
