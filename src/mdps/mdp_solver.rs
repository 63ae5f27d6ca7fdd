use crate::error::Result;

/// A solver that computes optimal values and actions for a model.
pub trait MdpSolver<T> {
    /// Differential value of `s`.
    fn v_star(&self, s: usize) -> f64;

    fn q_star(&self, s: usize, a: usize) -> Option<f64>;

    fn pi_star(&self, s: usize) -> Option<usize>;

    /// Runs until the residual drops below `theta` or `num_iterations` sweeps
    /// have been spent. Returns the terminal state and the sweeps consumed.
    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> Result<(T, usize)>;
}
