use rayon::prelude::*;

use crate::config::UpdateRule;
use crate::mdps::bellman::lookahead;
use crate::mdps::mdp::Mdp;

/// Per-sweep inputs shared by both update rules.
#[derive(Debug, Clone, Copy)]
pub struct SweepParams<'a> {
    /// Running gain subtracted from every backup.
    pub gain: f64,
    /// Relaxation factor alpha in (0, 1].
    pub step_size: f64,
    /// Gauss-Seidel visiting order; ascending when `None`.
    pub order: Option<&'a [usize]>,
    /// Run Jacobi sweeps on the rayon pool.
    pub parallel: bool,
}

impl UpdateRule {
    /// Applies one sweep to `v`. `scratch` is the Jacobi double buffer.
    pub fn sweep<M: Mdp + ?Sized>(
        &self,
        mdp: &M,
        v: &mut [f64],
        scratch: &mut Vec<f64>,
        params: &SweepParams,
    ) {
        match self {
            UpdateRule::Jacobi => jacobi_sweep(mdp, v, scratch, params),
            UpdateRule::GaussSeidel => gauss_seidel_sweep(mdp, v, params),
        }
    }
}

#[inline]
fn relax(current: f64, target: f64, step_size: f64) -> f64 {
    if step_size == 1. {
        target
    } else {
        current + step_size * (target - current)
    }
}

/// Every state reads the previous complete vector; all entries are replaced at once.
pub fn jacobi_sweep<M: Mdp + ?Sized>(
    mdp: &M,
    v: &mut [f64],
    next: &mut Vec<f64>,
    params: &SweepParams,
) {
    next.clear();
    next.resize(v.len(), 0.);

    let prev: &[f64] = v;
    let backup = |s: usize| relax(prev[s], lookahead(mdp, prev, s).value - params.gain, params.step_size);
    if params.parallel {
        next.par_iter_mut().enumerate().for_each(|(s, x)| *x = backup(s));
    } else {
        next.iter_mut().enumerate().for_each(|(s, x)| *x = backup(s));
    }

    v.copy_from_slice(next);
}

/// States are updated in place, so later states see this sweep's values of
/// earlier ones.
pub fn gauss_seidel_sweep<M: Mdp + ?Sized>(mdp: &M, v: &mut [f64], params: &SweepParams) {
    let mut backup = |s: usize| {
        let target = lookahead(mdp, v, s).value - params.gain;
        v[s] = relax(v[s], target, params.step_size);
    };

    match params.order {
        Some(order) => order.iter().for_each(|&s| backup(s)),
        None => (0..mdp.n_s()).for_each(backup),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::micro;
    use float_eq::*;

    fn params(gain: f64, step_size: f64) -> SweepParams<'static> {
        SweepParams {
            gain,
            step_size,
            order: None,
            parallel: false,
        }
    }

    #[test]
    fn jacobi_reads_previous_vector() {
        let mdp = micro::deterministic_cycle();
        let v = &mut vec![0., 0.];
        let scratch = &mut vec![];

        jacobi_sweep(&mdp, v, scratch, &params(0., 1.));
        assert_float_eq!(*v, vec![1., 0.], abs_all <= 1e-12);

        jacobi_sweep(&mdp, v, scratch, &params(0., 1.));
        assert_float_eq!(*v, vec![1., 1.], abs_all <= 1e-12);
    }

    #[test]
    fn gauss_seidel_sees_fresh_values() {
        let mdp = micro::deterministic_cycle();
        let v = &mut vec![0., 0.];

        // State 1 moves to state 0 and already sees its new value.
        gauss_seidel_sweep(&mdp, v, &params(0., 1.));
        assert_float_eq!(*v, vec![1., 1.], abs_all <= 1e-12);
    }

    #[test]
    fn custom_order_changes_visibility() {
        let mdp = micro::deterministic_cycle();
        let v = &mut vec![0., 0.];
        let order = [1, 0];
        let p = SweepParams {
            order: Some(&order),
            ..params(0., 1.)
        };

        gauss_seidel_sweep(&mdp, v, &p);
        assert_float_eq!(*v, vec![1., 0.], abs_all <= 1e-12);
    }

    #[test]
    fn gain_and_step_size_shape_the_backup() {
        let mdp = micro::two_state_chain();
        let v = &mut vec![0., 0.];

        jacobi_sweep(&mdp, v, &mut vec![], &params(0.5, 0.5));
        assert_float_eq!(*v, vec![0.25, -0.25], abs_all <= 1e-12);
    }

    #[test]
    fn parallel_jacobi_matches_sequential() {
        let mdp = crate::envs::garet::garet_100().unwrap();
        let seq = &mut vec![0.; 100];
        let par = &mut vec![0.; 100];
        for _ in 0..5 {
            jacobi_sweep(&mdp, seq, &mut vec![], &params(0.1, 1.));
            jacobi_sweep(
                &mdp,
                par,
                &mut vec![],
                &SweepParams {
                    parallel: true,
                    ..params(0.1, 1.)
                },
            );
        }

        assert_eq!(seq, par);
    }

    #[test]
    fn dispatch_follows_rule() {
        let mdp = micro::deterministic_cycle();
        let j = &mut vec![0., 0.];
        let g = &mut vec![0., 0.];
        UpdateRule::Jacobi.sweep(&mdp, j, &mut vec![], &params(0., 1.));
        UpdateRule::GaussSeidel.sweep(&mdp, g, &mut vec![], &params(0., 1.));

        assert_ne!(j, g);
    }
}
