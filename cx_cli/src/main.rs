//! CLI demo for complex tensor arithmetic over the real autodiff engine.
//!
//! Builds a packed complex array, multiplies it with a real matrix, reduces
//! it to a complex scalar and differentiates back to the packed buffer,
//! validating the gradient against finite differences.

use anyhow::{ensure, Context, Result};
use clap::Parser;
use cx_backend_cpu::{constant, finite_diff_grad, max_grad_error, CpuBackend};
use cx_complex::prelude::*;
use tracing_subscriber::EnvFilter;

type C = ComplexArray<CpuBackend>;

#[derive(Parser, Debug)]
#[command(version, about = "Complex tensor walk-through")]
struct Args {
    /// Digits printed after the decimal point.
    #[arg(long, default_value_t = 4)]
    precision: usize,

    /// Tracing filter, e.g. `debug` or `cx_complex=trace`. Falls back to
    /// `RUST_LOG`, then `info`.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let filter = match log_level {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter `{directives}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;
    let p = args.precision;

    println!("=== Complex Tensor Demo ===\n");

    // Rows 0-1 are the real part, rows 2-3 the imaginary part: 1+3j and 2+4j.
    let packed_rows = [
        vec![1.0, 1.0, 1.0],
        vec![2.0, 2.0, 2.0],
        vec![3.0, 3.0, 3.0],
        vec![4.0, 4.0, 4.0],
    ];
    let a = C::from_packed_rows(&packed_rows)?.requires_grad("a");
    let x_data = vec![3.0, 3.0, 4.0, 4.0, 2.0, 2.0];
    let x_shape = Shape::matrix(3, 2);
    let x = constant(x_data.clone(), x_shape.clone());

    println!("a = {a:.p$}");
    println!("a.size()  = {} (packed)", a.size());
    println!("a logical = {}", a.logical_shape());
    println!("|a| = {:.p$?}\n", a.abs().as_slice());

    let product = a.mm(&x)?;
    println!("a @ x = {product:.p$}");

    let total = product.sum();
    println!("sum(a @ x) = {total:.p$}\n");
    tracing::info!(re = total.real(), im = total.imag(), "reduced product");

    // Gradients via autodiff, w.r.t. the packed buffer
    let grads = total.backward();
    let grad = grads.wrt(&a).context("a is not on the path to the sum")?;

    println!("Autodiff gradient of the packed buffer:");
    for row in grad.as_slice().chunks(a.cols()) {
        println!("  {row:.p$?}");
    }

    // Same gradient by central differences on the packed values. The
    // backward pass seeds 1 for both components, i.e. differentiates re + im.
    let f = |inputs: &[Vec<f32>]| -> f32 {
        let buffer = constant(inputs[0].clone(), a.shape().clone());
        let x = constant(x_data.clone(), x_shape.clone());
        match C::from_packed(buffer).and_then(|a| a.mm(&x)) {
            Ok(product) => {
                let total = product.sum();
                total.real() + total.imag()
            }
            Err(_) => f32::NAN,
        }
    };
    let fd_grads = finite_diff_grad(f, &[packed_rows.concat()], 1e-2);

    println!("\nFinite difference gradient (eps=1e-2):");
    for row in fd_grads[0].chunks(a.cols()) {
        println!("  {row:.p$?}");
    }

    let error = max_grad_error(grad.as_slice(), &fd_grads[0]);
    println!("\nMax error: {error:.2e}");
    ensure!(error < 1e-2, "autodiff and finite differences disagree ({error:.2e})");

    println!("\n=== Demo Complete ===");
    Ok(())
}
