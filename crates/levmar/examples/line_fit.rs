//! levmar Line Fitting Example
//!
//! This example demonstrates the basic fitting workflow:
//! - Implementing `FitProblem` for a straight-line model
//! - Configuring the solver through the builder
//! - Requesting uncertainties and residuals
//! - Reading the fit report

use levmar::prelude::*;

/// Straight-line model `y = a + b*x` with per-point measurement errors.
struct Line {
    x: Vec<f64>,
    y: Vec<f64>,
    ey: Vec<f64>,
}

impl FitProblem<f64> for Line {
    fn residual_count(&self) -> usize {
        self.x.len()
    }

    fn evaluate(
        &self,
        params: &[f64],
        residuals: &mut [f64],
        _derivs: Option<&mut AnalyticDerivs<'_, f64>>,
    ) -> EvalStatus {
        for i in 0..self.x.len() {
            let model = params[0] + params[1] * self.x[i];
            residuals[i] = (self.y[i] - model) / self.ey[i];
        }
        EvalStatus::Ok
    }
}

fn main() -> Result<(), LevmarError> {
    println!("{}", "=".repeat(80));
    println!("levmar Line Fitting Example");
    println!("{}", "=".repeat(80));
    println!();

    // Synthetic data generated from y = 3.20 + 1.78*x with noise of
    // roughly 0.07 per point.
    let problem = Line {
        x: vec![
            -1.7237128, 1.8712276, -0.96608055, -0.28394297, 1.3416969, 1.3757038, -1.3703436,
            0.042581975, -0.14970151, 0.82065094,
        ],
        y: vec![
            0.19000429, 6.5807428, 1.4582725, 2.7270851, 5.5969253, 5.6249280, 0.787615,
            3.2599759, 2.9771762, 4.5936475,
        ],
        ey: vec![0.07; 10],
    };

    let solver = Levmar::new()
        .return_uncertainties()
        .return_residuals()
        .build()?;

    let mut params = [1.0, 1.0];
    let result = solver.fit(&problem, &mut params)?;

    println!("{}", result);
    println!("Fitted parameters (actual 3.20, 1.78):");
    let errors = result.uncertainties.as_ref().unwrap();
    for (i, (p, e)) in params.iter().zip(errors.iter()).enumerate() {
        println!("  p[{}] = {:.6} +/- {:.6}", i, p, e);
    }

    Ok(())
}
