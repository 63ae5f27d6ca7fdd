//! Generic Average Reward Environment Testbed: random sparse models in the
//! style of Bhatnagar et al.'s GARNET.

use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use rand::seq::index;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mdps::mdp::{StateAction, Successor, TabularMdp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaretParams {
    pub seed: u64,
    pub n_s: usize,
    pub n_a: usize,
    /// Distinct successors of every (state, action).
    pub branching: usize,
}

impl GaretParams {
    pub fn new(seed: u64, n_s: usize, n_a: usize, branching: usize) -> Self {
        Self {
            seed,
            n_s,
            n_a,
            branching,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_s == 0 || self.n_a == 0 {
            return Err(Error::invalid_configuration(format!(
                "GARET needs at least one state and one action, got {self}"
            )));
        }
        if self.branching == 0 || self.branching > self.n_s {
            return Err(Error::invalid_configuration(format!(
                "GARET branching factor must be in 1..={}, got {self}",
                self.n_s
            )));
        }
        Ok(())
    }
}

impl fmt::Display for GaretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.seed, self.n_s, self.n_a, self.branching)
    }
}

/// Parses `SEED:STATES:ACTIONS:BRANCHING`.
impl FromStr for GaretParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let bad = || Error::invalid_configuration(format!("expected SEED:STATES:ACTIONS:BRANCHING, got '{s}'"));
        let [seed, n_s, n_a, branching] = parts.as_slice() else {
            return Err(bad());
        };

        let params = Self::new(
            seed.parse().map_err(|_| bad())?,
            n_s.parse().map_err(|_| bad())?,
            n_a.parse().map_err(|_| bad())?,
            branching.parse().map_err(|_| bad())?,
        );
        params.validate()?;

        Ok(params)
    }
}

/// Draws a GARET instance. Every (state, action) gets `branching` distinct
/// successors with uniform random weights normalized to one, and a standard
/// normal reward per branch; the (state, action) reward is their expectation.
pub fn create(params: GaretParams) -> Result<TabularMdp> {
    params.validate()?;
    let GaretParams {
        seed,
        n_s,
        n_a,
        branching,
    } = params;

    let rng = &mut StdRng::seed_from_u64(seed);
    let mut states = Vec::with_capacity(n_s);
    for _ in 0..n_s {
        let mut actions = Vec::with_capacity(n_a);
        for _ in 0..n_a {
            let next_states = index::sample(rng, n_s, branching);
            // (0, 1], so a row never sums to zero.
            let weights: Vec<f64> = (0..branching).map(|_| 1. - rng.gen::<f64>()).collect();
            let total: f64 = weights.iter().sum();

            let mut reward = 0.;
            let mut successors = Vec::with_capacity(branching);
            for (next_state, w) in next_states.iter().zip(weights) {
                let probability = w / total;
                let r: f64 = rng.sample(StandardNormal);
                reward += probability * r;
                successors.push(Successor {
                    next_state,
                    probability,
                });
            }
            successors.sort_by_key(|t| t.next_state);

            actions.push(StateAction { reward, successors });
        }
        states.push(actions);
    }

    TabularMdp::new(format!("GARET S:{n_s} A:{n_a} B:{branching} seed:{seed}"), states)
}

pub fn garet1() -> Result<TabularMdp> {
    create(GaretParams::new(42, 4, 4, 3))
}

pub fn garet2() -> Result<TabularMdp> {
    create(GaretParams::new(42, 4, 20, 3))
}

pub fn garet3() -> Result<TabularMdp> {
    create(GaretParams::new(42, 10, 2, 3))
}

pub fn garet_100() -> Result<TabularMdp> {
    create(GaretParams::new(42, 100, 2, 3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdps::mdp::{validate, Mdp};
    use rstest::rstest;

    #[test]
    fn same_seed_same_model() {
        let p = GaretParams::new(7, 12, 3, 4);
        assert_eq!(create(p).unwrap(), create(p).unwrap());
        assert_ne!(create(p).unwrap(), create(GaretParams { seed: 8, ..p }).unwrap());
    }

    #[rstest]
    #[case(garet1().unwrap(), 4, 4)]
    #[case(garet2().unwrap(), 4, 20)]
    #[case(garet3().unwrap(), 10, 2)]
    #[case(garet_100().unwrap(), 100, 2)]
    fn presets_are_valid(#[case] mdp: TabularMdp, #[case] n_s: usize, #[case] n_a: usize) {
        assert_eq!(validate(&mdp), Ok(()));
        assert_eq!(mdp.n_s(), n_s);
        for s in 0..n_s {
            assert_eq!(mdp.n_a(s), n_a);
            for a in 0..n_a {
                let next: Vec<usize> = mdp.successors(s, a).iter().map(|t| t.next_state).collect();
                assert_eq!(next.len(), 3);
                assert!(next.windows(2).all(|w| w[0] < w[1]), "{next:?}");
            }
        }
    }

    #[test]
    fn full_branching_reaches_every_state() {
        let mdp = create(GaretParams::new(1, 5, 1, 5)).unwrap();
        assert_eq!(mdp.successors(2, 0).len(), 5);
    }

    #[rstest]
    #[case("42:10:2:3", Some(GaretParams::new(42, 10, 2, 3)))]
    #[case(" 1 : 4 : 4 : 4 ", Some(GaretParams::new(1, 4, 4, 4)))]
    #[case("42:10:2", None)]
    #[case("42:10:2:11", None)]
    #[case("42:10:0:3", None)]
    #[case("x:10:2:3", None)]
    fn parse(#[case] input: &str, #[case] expected: Option<GaretParams>) {
        assert_eq!(input.parse::<GaretParams>().ok(), expected);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let p = GaretParams::new(3, 9, 2, 2);
        assert_eq!(p.to_string().parse::<GaretParams>().unwrap(), p);
    }
}
