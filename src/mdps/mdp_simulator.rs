use rand::distributions::WeightedIndex;
use rand::prelude::*;

use super::mdp::{Mdp, PolicyInducedMdp, Successor};
use super::mdp_solver_policy::Policy;
use crate::error::{Error, Result};

pub trait Weighted<S> {
    fn s(&self) -> S;

    fn p(&self) -> f64;
}

impl Weighted<usize> for Successor {
    fn s(&self) -> usize {
        self.next_state
    }

    fn p(&self) -> f64 {
        self.probability
    }
}

pub fn pick_next<T, S>(rng: &mut StdRng, ts: &[T]) -> Result<S>
where
    T: Weighted<S>,
{
    let dist = WeightedIndex::new(ts.iter().map(|item| item.p()))?;
    Ok(ts[dist.sample(rng)].s())
}

/// Rolls policies forward on a model to measure empirical reward rates.
pub struct MdpSimulator<'a, M: Mdp + ?Sized> {
    mdp: &'a M,
    rng: StdRng,
}

impl<'a, M: Mdp + ?Sized> MdpSimulator<'a, M> {
    pub fn new(mdp: &'a M, seed: u64) -> Self {
        Self {
            mdp,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Takes `a` in `s`; returns the sampled successor and the expected reward.
    pub fn step(&mut self, s: usize, a: usize) -> Result<(usize, f64)> {
        if s >= self.mdp.n_s() || a >= self.mdp.n_a(s) {
            return Err(Error::invalid_configuration(format!(
                "no action {a} in state {s} of a model of {} states",
                self.mdp.n_s()
            )));
        }
        let next = pick_next(&mut self.rng, self.mdp.successors(s, a))?;
        Ok((next, self.mdp.reward(s, a)))
    }

    /// Mean reward per step over `steps` steps of `policy` from `start`.
    pub fn average_reward(&mut self, policy: &Policy, start: usize, steps: usize) -> Result<f64> {
        PolicyInducedMdp::new(self.mdp, policy)?;
        if start >= self.mdp.n_s() {
            return Err(Error::invalid_configuration(format!(
                "start state {start} does not fit a model of {} states",
                self.mdp.n_s()
            )));
        }
        if steps == 0 {
            return Ok(0.);
        }

        let mut s = start;
        let mut total = 0.;
        for _ in 0..steps {
            let (next, r) = self.step(s, policy.action(s))?;
            total += r;
            s = next;
        }

        Ok(total / steps as f64)
    }
}
