//! Solving a small Gaussian Bayes network.
//!
//! Network (elimination order x, y):
//!   x + y = 9
//!       y = 5
//!
//! Square-root information form:
//!   R = [1 1]    d = [9]
//!       [0 1]        [5]
//!
//! Optimum: x = 4, y = 5

use bayesnet_core::{
    BayesNetResult, GaussianBayesNet, GaussianConditional, NoiseScale, VectorValues,
};
use nalgebra::{DMatrix, DVector};

const X: usize = 0;
const Y: usize = 1;

fn scalar(d: f64) -> DVector<f64> {
    DVector::from_element(1, d)
}

fn coeff(c: f64) -> DMatrix<f64> {
    DMatrix::from_element(1, 1, c)
}

fn main() -> BayesNetResult<()> {
    println!("Gaussian Bayes Network - Chain Example");
    println!("======================================");

    let net = GaussianBayesNet::new(vec![
        GaussianConditional::single(
            X,
            scalar(9.0),
            coeff(1.0),
            vec![(Y, coeff(1.0))],
            NoiseScale::Unit,
        )?,
        GaussianConditional::single(Y, scalar(5.0), coeff(1.0), vec![], NoiseScale::Unit)?,
    ])?;

    let sys = net.assemble()?;
    println!("R =\n{}", sys.to_dense_r());
    println!("d = {:?}", sys.d.as_slice());

    let opt = net.optimize()?;
    print_values("optimize", &opt);

    // Same R, different right-hand side
    let rhs = VectorValues::new().with(X, &[4.0])?.with(Y, &[5.0])?;
    print_values("back_substitute [4, 5]", &net.back_substitute(&rhs)?);

    let x = VectorValues::new().with(X, &[2.0])?.with(Y, &[5.0])?;
    print_values("back_substitute_transpose [2, 5]", &net.back_substitute_transpose(&x)?);

    println!("determinant = {}", net.determinant()?);

    let cauchy = net.optimize_gradient_search()?;
    print_values("steepest descent point", &cauchy);
    println!(
        "error: origin {:.4} -> steepest descent {:.4} -> optimum {:.4}",
        net.error(&net.zero())?,
        net.error(&cauchy)?,
        net.error(&opt)?
    );

    Ok(())
}

fn print_values(label: &str, values: &VectorValues) {
    let entries: Vec<String> = values
        .iter()
        .map(|(k, v)| format!("{}: {:?}", k, v.as_slice()))
        .collect();
    println!("{:<34} {{{}}}", label, entries.join(", "));
}
