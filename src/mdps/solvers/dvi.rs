//! Differential value iteration driver.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::centering::CenteringPolicy;
use super::convergence::{span, Assessment, ConvergenceChecker};
use super::update_rules::SweepParams;
use crate::config::{DviConfig, UpdateRule};
use crate::error::{Error, Result};
use crate::mdps::bellman::{gain_bounds, lookahead, q_value, GainBounds};
use crate::mdps::mdp::{validate, Mdp, PolicyInducedMdp};
use crate::mdps::mdp_solver::MdpSolver;
use crate::mdps::mdp_solver_policy::{extract_policy, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Initializing,
    Sweeping,
    Converged,
    IterationLimitReached,
    Diverged,
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DriverState::Converged | DriverState::IterationLimitReached | DriverState::Diverged
        )
    }
}

/// What a run hands back: the differential values, the gain, the greedy
/// policy and how the run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveResult {
    pub values: Vec<f64>,
    pub gain: f64,
    /// Odoni bracket of the optimal gain at the final values.
    pub gain_bounds: GainBounds,
    pub policy: Policy,
    pub status: DriverState,
    pub sweeps: usize,
    pub residual: f64,
    /// Span residual of every sweep, in order.
    pub residuals: Vec<f64>,
}

impl SolveResult {
    pub fn converged(&self) -> bool {
        self.status == DriverState::Converged
    }
}

pub struct DifferentialValueIteration<'a, M: Mdp + ?Sized> {
    mdp: &'a M,
    config: DviConfig,
    centering: CenteringPolicy,
    v: Vec<f64>,
    scratch: Vec<f64>,
    delta: Vec<f64>,
    // Running gain subtracted inside the sweep.
    gain: f64,
    gain_estimate: Option<f64>,
    state: DriverState,
    sweeps: usize,
    residual: f64,
    residuals: Vec<f64>,
}

impl<'a, M: Mdp + ?Sized> DifferentialValueIteration<'a, M> {
    /// Validates the model and the configuration against it; starts from the
    /// zero vector.
    pub fn new(mdp: &'a M, config: DviConfig) -> Result<Self> {
        validate(mdp)?;
        config.validate_for(mdp.n_s())?;

        let n_s = mdp.n_s();
        debug!(
            model = mdp.name(),
            n_s,
            rule = ?config.update_rule,
            centering = ?config.centering,
            "initialized differential value iteration"
        );

        Ok(Self {
            mdp,
            centering: CenteringPolicy::from_config(&config),
            config,
            v: vec![0.; n_s],
            scratch: Vec::with_capacity(n_s),
            delta: Vec::with_capacity(n_s),
            gain: 0.,
            gain_estimate: None,
            state: DriverState::Initializing,
            sweeps: 0,
            residual: f64::INFINITY,
            residuals: vec![],
        })
    }

    /// Warm start from `values` and running gain `gain`, e.g. those of a run
    /// that hit its sweep limit.
    pub fn with_initial_values(mut self, values: Vec<f64>, gain: f64) -> Result<Self> {
        if values.len() != self.mdp.n_s() {
            return Err(Error::invalid_configuration(format!(
                "initial values cover {} states, model has {}",
                values.len(),
                self.mdp.n_s()
            )));
        }
        if !gain.is_finite() || values.iter().any(|x| !x.is_finite()) {
            return Err(Error::invalid_configuration("initial values and gain must be finite"));
        }

        self.v = values;
        self.gain = if self.centering.is_enabled() { gain } else { 0. };
        Ok(self)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn values(&self) -> &[f64] {
        &self.v
    }

    /// Latest gain estimate; `None` before the first sweep.
    pub fn gain(&self) -> Option<f64> {
        self.gain_estimate
    }

    /// Sweeps until a terminal state under the configured tolerance and limit.
    pub fn run(mut self) -> Result<SolveResult> {
        let (theta, limit) = (self.config.tolerance, self.config.max_sweeps);
        self.exec(theta, Some(limit))?;
        Ok(self.into_result())
    }

    pub fn into_result(self) -> SolveResult {
        let gain_bounds = gain_bounds(self.mdp, &self.v);
        SolveResult {
            policy: extract_policy(self.mdp, &self.v),
            gain: self.gain_estimate.unwrap_or_else(|| gain_bounds.midpoint()),
            gain_bounds,
            values: self.v,
            status: self.state,
            sweeps: self.sweeps,
            residual: self.residual,
            residuals: self.residuals,
        }
    }

    fn sweep(&mut self, checker: &ConvergenceChecker) -> Assessment {
        let alpha = self.config.step_size;
        let centered = self.centering.is_enabled();
        let rho = if centered { self.gain } else { 0. };

        self.delta.clone_from(&self.v);
        let params = SweepParams {
            gain: rho,
            step_size: alpha,
            order: self.config.sweep_order.as_deref(),
            parallel: self.config.parallel,
        };
        self.config
            .update_rule
            .sweep(self.mdp, &mut self.v, &mut self.scratch, &params);

        self.delta.iter_mut().zip(&self.v).for_each(|(d, x)| *d = x - *d);
        let residual = span(&self.delta);
        let out = self.centering.center(&mut self.v, &self.delta);

        let drift = out.shift / alpha;
        self.gain_estimate = Some(rho + drift);
        if centered {
            self.gain += self.config.gain_step_size * drift;
        }
        self.sweeps += 1;
        self.residual = residual;
        self.residuals.push(residual);

        trace!(
            sweep = self.sweeps,
            residual,
            gain = rho + drift,
            offset = out.offset,
            reference = ?out.reference,
            "sweep"
        );

        // In place sweeps only settle once the running gain stops moving.
        let gain_drift = if centered && self.config.update_rule == UpdateRule::GaussSeidel {
            drift.abs()
        } else {
            0.
        };
        checker.assess(residual, gain_drift, &self.v)
    }
}

impl<'a, M: Mdp + ?Sized> MdpSolver<DriverState> for DifferentialValueIteration<'a, M> {
    /// Panics if `s` is not a state of the model.
    fn v_star(&self, s: usize) -> f64 {
        self.v[s]
    }

    fn q_star(&self, s: usize, a: usize) -> Option<f64> {
        (s < self.mdp.n_s() && a < self.mdp.n_a(s)).then(|| q_value(self.mdp, &self.v, s, a))
    }

    fn pi_star(&self, s: usize) -> Option<usize> {
        (s < self.mdp.n_s()).then(|| lookahead(self.mdp, &self.v, s).action)
    }

    /// Sweeps until the residual drops below `theta` or `num_iterations` more
    /// sweeps (default `max_sweeps`) are spent. A run that stopped at its
    /// limit resumes where it left off. Returns the sweeps spent in this call.
    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> Result<(DriverState, usize)> {
        match self.state {
            DriverState::Converged => return Ok((self.state, 0)),
            DriverState::Diverged => {
                return Err(Error::Divergence {
                    sweep: self.sweeps,
                    residual: self.residual,
                })
            }
            _ => {}
        }
        if !(theta.is_finite() && theta > 0.) {
            return Err(Error::invalid_configuration(format!(
                "tolerance must be positive and finite, got {theta}"
            )));
        }

        let checker = ConvergenceChecker::new(theta, self.config.divergence_threshold);
        let limit = num_iterations.unwrap_or(self.config.max_sweeps);
        self.state = DriverState::Sweeping;

        for i in 1..=limit {
            match self.sweep(&checker) {
                Assessment::Continue => {}
                Assessment::Converged => {
                    self.state = DriverState::Converged;
                    info!(
                        model = self.mdp.name(),
                        sweeps = self.sweeps,
                        gain = self.gain_estimate,
                        residual = self.residual,
                        "converged"
                    );
                    return Ok((self.state, i));
                }
                Assessment::Diverged => {
                    self.state = DriverState::Diverged;
                    warn!(
                        model = self.mdp.name(),
                        sweep = self.sweeps,
                        residual = self.residual,
                        "diverged"
                    );
                    return Err(Error::Divergence {
                        sweep: self.sweeps,
                        residual: self.residual,
                    });
                }
            }
        }

        self.state = DriverState::IterationLimitReached;
        warn!(
            model = self.mdp.name(),
            sweeps = self.sweeps,
            residual = self.residual,
            "sweep limit reached before convergence"
        );
        Ok((self.state, limit))
    }
}

/// Runs differential value iteration on `mdp` from the zero vector.
pub fn solve<M: Mdp + ?Sized>(mdp: &M, config: &DviConfig) -> Result<SolveResult> {
    DifferentialValueIteration::new(mdp, config.clone())?.run()
}

/// Gain and differential values of following `policy` on `mdp`. The returned
/// policy is `policy` itself.
pub fn evaluate_policy<M: Mdp + ?Sized>(mdp: &M, policy: &Policy, config: &DviConfig) -> Result<SolveResult> {
    let induced = PolicyInducedMdp::new(mdp, policy)?;
    let mut result = solve(&induced, config)?;
    result.policy = policy.clone();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Centering;
    use crate::envs::micro;
    use crate::error::ModelError;
    use crate::mdps::mdp::{StateAction, TabularMdp};
    use float_eq::*;

    #[test]
    fn chain_converges_to_stationary_gain() {
        let mdp = micro::two_state_chain();

        let result = solve(&mdp, &DviConfig::default()).unwrap();

        assert_eq!(result.status, DriverState::Converged);
        assert!(result.converged());
        assert_float_eq!(result.gain, 2. / 3., abs <= 1e-6);
        assert_float_eq!(result.values, vec![0., -10. / 3.], abs_all <= 1e-6);
        assert_eq!(result.policy.actions(), &[0, 0]);
        assert!(result.residual < 1e-8);
        assert_eq!(result.residuals.len(), result.sweeps);
        assert!(result.gain_bounds.contains(2. / 3.));
    }

    #[test]
    fn driver_walks_its_states() {
        let mdp = micro::two_state_choice();
        let mut dvi = DifferentialValueIteration::new(&mdp, DviConfig::default()).unwrap();
        assert_eq!(dvi.state(), DriverState::Initializing);
        assert_eq!(dvi.gain(), None);

        let (state, n) = dvi.exec(1e-8, Some(1)).unwrap();
        assert_eq!(state, DriverState::IterationLimitReached);
        assert_eq!(n, 1);
        assert!(dvi.gain().is_some());

        let (state, _) = dvi.exec(1e-8, None).unwrap();
        assert_eq!(state, DriverState::Converged);
        assert!(state.is_terminal());
        assert_eq!(dvi.exec(1e-8, None).unwrap(), (DriverState::Converged, 0));
    }

    #[test]
    fn solver_queries() {
        let mdp = micro::two_state_choice();
        let mut dvi = DifferentialValueIteration::new(&mdp, DviConfig::default()).unwrap();
        dvi.exec(1e-10, None).unwrap();

        assert_float_eq!(dvi.v_star(1), 3., abs <= 1e-6);
        assert_eq!(dvi.pi_star(0), Some(1));
        assert_eq!(dvi.pi_star(1), Some(0));
        assert_eq!(dvi.pi_star(2), None);
        assert_eq!(dvi.q_star(0, 2), None);
        assert_eq!(dvi.q_star(2, 0), None);
        // Q(1, 0) - v(1) is the gain at the fixed point.
        assert_float_eq!(dvi.q_star(1, 0).unwrap() - dvi.v_star(1), 1.7, abs <= 1e-6);
    }

    #[test]
    #[should_panic]
    fn v_star_of_unknown_state_panics() {
        let mdp = micro::two_state_chain();
        let dvi = DifferentialValueIteration::new(&mdp, DviConfig::default()).unwrap();
        dvi.v_star(2);
    }

    #[test]
    fn malformed_model_is_rejected_before_any_sweep() {
        let mdp = TabularMdp::new_unchecked(
            "half mass",
            vec![vec![StateAction::new(1., &[(0, 0.25), (1, 0.25)])], vec![StateAction::new(0., &[(0, 1.)])]],
        );

        let err = DifferentialValueIteration::new(&mdp, DviConfig::default()).err().unwrap();

        assert!(matches!(
            err,
            Error::InvalidModel(ModelError::ProbabilitySum { state: 0, action: 0, .. })
        ));
    }

    #[test]
    fn config_is_checked_against_the_model() {
        let mdp = micro::two_state_chain();
        let config = DviConfig {
            reference_state: 2,
            ..Default::default()
        };
        assert!(matches!(
            DifferentialValueIteration::new(&mdp, config),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn uncentered_overflow_diverges() {
        let mdp = micro::three_state_ring(1e307);
        let config = DviConfig {
            centering: Centering::Disabled,
            ..Default::default()
        };
        let mut dvi = DifferentialValueIteration::new(&mdp, config).unwrap();

        let err = dvi.exec(1e-8, None).unwrap_err();

        assert!(err.is_divergence());
        assert_eq!(dvi.state(), DriverState::Diverged);
        assert!(dvi.exec(1e-8, None).unwrap_err().is_divergence());
    }

    #[test]
    fn warm_start_is_checked() {
        let mdp = micro::two_state_chain();
        let dvi = || DifferentialValueIteration::new(&mdp, DviConfig::default()).unwrap();

        assert!(dvi().with_initial_values(vec![0.], 0.).is_err());
        assert!(dvi().with_initial_values(vec![0., f64::NAN], 0.).is_err());
        assert!(dvi().with_initial_values(vec![0., 1.], f64::INFINITY).is_err());
        assert!(dvi().with_initial_values(vec![0., 1.], 0.5).is_ok());
    }

    #[test]
    fn policy_evaluation_of_a_suboptimal_policy() {
        let mdp = micro::two_state_choice();
        let policy = Policy::new(vec![0, 0]);
        let config = DviConfig {
            step_size: 0.5,
            ..Default::default()
        };

        let result = evaluate_policy(&mdp, &policy, &config).unwrap();

        // Stationary distribution (0.5, 0.5), rewards (0, 2).
        assert_eq!(result.status, DriverState::Converged);
        assert_float_eq!(result.gain, 1., abs <= 1e-6);
        assert_eq!(result.policy, policy);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DriverState::IterationLimitReached).unwrap(),
            "\"iteration_limit_reached\""
        );
    }
}
