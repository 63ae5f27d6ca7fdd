use itertools::{Itertools, MinMaxResult};

/// Smallest and largest entry. NaN entries sort past the infinities, so a NaN
/// anywhere makes one of the two NaN.
pub fn extent(x: &[f64]) -> Option<(f64, f64)> {
    match x.iter().copied().minmax_by(f64::total_cmp) {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(e) => Some((e, e)),
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
    }
}

/// Span seminorm: max(x) - min(x). Zero for constant (and empty) vectors.
pub fn span(x: &[f64]) -> f64 {
    extent(x).map_or(0., |(lo, hi)| hi - lo)
}

/// (max(x) + min(x)) / 2.
pub fn midpoint(x: &[f64]) -> f64 {
    extent(x).map_or(0., |(lo, hi)| (lo + hi) / 2.)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Converged,
    Continue,
    Diverged,
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceChecker {
    pub tolerance: f64,
    pub divergence_threshold: f64,
}

impl ConvergenceChecker {
    pub fn new(tolerance: f64, divergence_threshold: f64) -> Self {
        Self {
            tolerance,
            divergence_threshold,
        }
    }

    /// `residual` is the span of the sweep's change, `gain_drift` how far the
    /// running gain still moved (zero where the gain does not feed back), `v`
    /// the centered vector.
    pub fn assess(&self, residual: f64, gain_drift: f64, v: &[f64]) -> Assessment {
        let blown = |x: f64| !x.is_finite() || x.abs() > self.divergence_threshold;
        if blown(residual) || blown(gain_drift) || v.iter().any(|&x| blown(x)) {
            return Assessment::Diverged;
        }

        if residual < self.tolerance && gain_drift < self.tolerance {
            Assessment::Converged
        } else {
            Assessment::Continue
        }
    }
}
