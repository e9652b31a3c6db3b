//! Numerical settings shared by the network algorithms.

/// Tolerances and reporting options for a [`GaussianBayesNet`](crate::GaussianBayesNet).
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    /// Pivots with `|r_ii| <= pivot_tol` are treated as degenerate. Zero,
    /// subnormal and non-finite pivots are degenerate at any tolerance.
    pub pivot_tol: f64,

    /// Steepest-descent curvature `gᵀRᵀRg` at or below this is degenerate
    pub curvature_tol: f64,

    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        // Allow environment variable overrides, e.g. BAYESNET_PIVOT_TOL=1e-12
        let pivot_tol = env_f64("BAYESNET_PIVOT_TOL").unwrap_or(0.0);
        let curvature_tol = env_f64("BAYESNET_CURVATURE_TOL").unwrap_or(0.0);
        let verbose = std::env::var("BAYESNET_VERBOSE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            pivot_tol,
            curvature_tol,
            verbose,
        }
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}
